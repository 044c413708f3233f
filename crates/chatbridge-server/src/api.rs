//! Local HTTP surface: health, message polling and outgoing commands

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chatbridge::poll::DEFAULT_POLL_WAIT;
use chatbridge::{Command, CommandDispatcher, PollBuffer};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<CommandDispatcher>,
    pub poll: Arc<PollBuffer>,
    /// How long `/poll` waits for the first message.
    pub poll_wait: Duration,
}

impl AppState {
    pub fn new(dispatcher: Arc<CommandDispatcher>, poll: Arc<PollBuffer>) -> Self {
        Self {
            dispatcher,
            poll,
            poll_wait: DEFAULT_POLL_WAIT,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/poll", get(poll))
        .route("/command", post(command))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn failure(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "ok": false, "error": code }))).into_response()
}

async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn poll(State(state): State<AppState>) -> impl IntoResponse {
    let messages = state.poll.poll(state.poll_wait).await;
    Json(json!({ "ok": true, "messages": messages }))
}

/// The body is parsed by hand so malformed input maps onto our own error
/// codes instead of axum's extractor rejections.
async fn command(State(state): State<AppState>, body: Bytes) -> Response {
    let command = match Command::from_json(&body) {
        Ok(command) => command,
        Err(rejection) => {
            warn!("command rejected: {}", rejection.code());
            return failure(StatusCode::BAD_REQUEST, rejection.code());
        }
    };
    info!(
        "command for '{}' ({} chars)",
        command.target,
        command.content.chars().count()
    );

    let dispatcher = Arc::clone(&state.dispatcher);
    let outcome = tokio::task::spawn_blocking(move || {
        chatbridge::init_thread()?;
        Ok::<bool, chatbridge::BridgeError>(dispatcher.send(&command))
    })
    .await;

    match outcome {
        Ok(Ok(success)) => Json(json!({ "ok": true, "success": success })).into_response(),
        Ok(Err(e)) => {
            error!("command worker could not start: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, "send_failed")
        }
        Err(e) => {
            error!("command worker panicked: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, "send_failed")
        }
    }
}

async fn not_found() -> Response {
    failure(StatusCode::NOT_FOUND, "not_found")
}
