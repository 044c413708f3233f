//! What the binary can do: run the bridge, or one of the diagnostic modes

use crate::api::{router, AppState};
use anyhow::{Context, Result};
use chatbridge::inspect::inspect_tree;
use chatbridge::{
    create_backend, BridgeConfig, BridgeError, ChatUi, CommandDispatcher, HttpTransport,
    PollBuffer, ReportingPipeline, RetryPolicy, Scanner,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Exit code when the client's main window cannot be found.
pub const EXIT_WINDOW_MISSING: i32 = 2;
const SELF_TEST_DURATION: Duration = Duration::from_secs(3);

fn build_ui(config: &BridgeConfig) -> Result<Arc<ChatUi>, BridgeError> {
    let backend = create_backend()?;
    info!("accessibility backend: {}", backend.platform_name());
    Ok(Arc::new(ChatUi::builder(backend, config).build()))
}

async fn serve(state: AppState, addr: &str, cancel: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("HTTP server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("HTTP server failed")?;
    info!("HTTP server stopped");
    Ok(())
}

/// Scanner thread, reporter task and HTTP server, until `cancel` fires.
pub async fn run_bridge(config: BridgeConfig, cancel: CancellationToken) -> Result<i32> {
    let ui = build_ui(&config)?;
    let poll = Arc::new(PollBuffer::new());

    let transport = HttpTransport::new(
        config.java.receive_url.clone(),
        Duration::from_secs_f64(config.java.timeout_seconds.max(0.1)),
    )?;
    let policy = RetryPolicy::new(
        config.java.retry_max,
        config.java.retry_backoff_base_seconds,
    );
    let (reporter, reporter_task) = ReportingPipeline::spawn(transport, policy);

    let scanner = Scanner::new(Arc::clone(&ui), config.listener.clone())
        .with_cancellation(cancel.clone())
        .add_sink(Arc::new(reporter.clone()))
        .add_sink(poll.clone());
    let scanner_thread = scanner.spawn().context("spawning scanner thread")?;
    info!("bridge started");

    let state = AppState::new(Arc::new(CommandDispatcher::new(ui)), poll);
    let served = serve(state, &config.server_addr(), cancel.clone()).await;

    // The server can also stop on its own (bind failure); take everything down.
    cancel.cancel();
    reporter.stop();
    if let Err(e) = reporter_task.await {
        warn!("reporter task ended abnormally: {}", e);
    }
    match tokio::task::spawn_blocking(move || scanner_thread.join()).await {
        Ok(Ok(())) => {}
        _ => warn!("scanner thread ended abnormally"),
    }
    served?;
    info!("bridge stopped");
    Ok(0)
}

/// Resolve the window once and report what the scanner would see.
pub fn dry_run(config: &BridgeConfig) -> Result<i32> {
    let ui = build_ui(config)?;
    let window = match ui.main_window() {
        Ok(window) => window,
        Err(e) => {
            error!(
                "main window not found ({} / {}): {}",
                config.window.class_name, config.window.name, e
            );
            return Ok(EXIT_WINDOW_MISSING);
        }
    };
    info!(
        "main window found: title={} bounds={}",
        window.name(),
        window
            .bounds()
            .map(|b| b.to_string())
            .unwrap_or_else(|| "?".to_string())
    );
    match ui.find_unread_sessions(config.listener.unread_max_per_round) {
        Ok(unread) => info!("unread sessions this round: {}", unread.len()),
        Err(e) => warn!("unread scan failed: {}", e),
    }
    Ok(0)
}

/// Log the whole window tree, flagging nodes worth writing selectors for.
pub fn inspect_run(config: &BridgeConfig) -> Result<i32> {
    let ui = build_ui(config)?;
    let window = match ui.main_window() {
        Ok(window) => window,
        Err(e) => {
            error!("main window not found: {}", e);
            return Ok(EXIT_WINDOW_MISSING);
        }
    };
    info!("walking the window tree depth-first");
    let _gate = ui.gate().enter("inspect");
    for line in inspect_tree(&window) {
        info!("{}", line);
    }
    Ok(0)
}

/// Serve the HTTP surface briefly, to check the port and routes.
pub async fn self_test(config: &BridgeConfig) -> Result<i32> {
    let ui = match build_ui(config) {
        Ok(ui) => ui,
        Err(BridgeError::UnsupportedPlatform(reason)) => {
            info!("self-test skipped: {}", reason);
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };
    let state = AppState::new(
        Arc::new(CommandDispatcher::new(ui)),
        Arc::new(PollBuffer::new()),
    );
    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(SELF_TEST_DURATION).await;
        stopper.cancel();
    });
    info!(
        "self-test running for {}s; try /health /poll /command",
        SELF_TEST_DURATION.as_secs()
    );
    serve(state, &config.server_addr(), cancel).await?;
    info!("self-test finished");
    Ok(0)
}
