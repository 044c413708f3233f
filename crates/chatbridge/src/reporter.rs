//! Forwarding of extracted messages to the downstream receiver
//!
//! A single tokio task owns the queue and delivers one message at a time, so
//! a slow receiver only ever delays other deliveries, never the scanner.

use crate::extractor::ExtractedMessage;
use crate::scanner::MessageSink;
use crate::BridgeError;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// One attempt. Anything but success is an error.
    async fn deliver(&self, message: &ExtractedMessage) -> Result<(), BridgeError>;

    /// A disabled transport silently drops everything.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// JSON POST to a fixed URL; any 2xx counts as delivered.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Config(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl DeliveryTransport for HttpTransport {
    async fn deliver(&self, message: &ExtractedMessage) -> Result<(), BridgeError> {
        let response = self.client.post(&self.url).json(message).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(BridgeError::Delivery(format!(
            "receiver answered {}: {}",
            status,
            body.chars().take(500).collect::<String>()
        )))
    }

    fn is_enabled(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// `retry_max` extra attempts after the first, with jittered exponential
/// backoff between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub retry_max: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(retry_max: u32, backoff_base_secs: f64) -> Self {
        Self {
            retry_max,
            backoff_base: Duration::from_secs_f64(backoff_base_secs.max(0.0)),
        }
    }

    pub fn total_attempts(&self) -> u32 {
        self.retry_max + 1
    }

    /// Wait after failed attempt number `attempt` (0-based):
    /// `base * 2^attempt * uniform(0.7, 1.3)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = rand::thread_rng().gen_range(0.7..1.3);
        self.backoff_base
            .mul_f64(2f64.powi(attempt.min(16) as i32) * factor)
    }
}

/// Deliver with retries. Returns the number of attempts used.
pub async fn deliver_with_retry(
    transport: &dyn DeliveryTransport,
    policy: &RetryPolicy,
    message: &ExtractedMessage,
) -> Result<u32, BridgeError> {
    let mut last_error = None;
    for attempt in 0..policy.total_attempts() {
        match transport.deliver(message).await {
            Ok(()) => return Ok(attempt + 1),
            Err(e) => {
                warn!("delivery attempt {} failed: {}", attempt + 1, e);
                last_error = Some(e);
            }
        }
        if attempt < policy.retry_max {
            tokio::time::sleep(policy.backoff(attempt)).await;
        }
    }
    Err(last_error.unwrap_or_else(|| BridgeError::Delivery("no attempts made".to_string())))
}

#[derive(Debug, Clone)]
pub enum ReportItem {
    Message(Box<ExtractedMessage>),
    /// Ends the worker once everything queued before it is handled.
    Stop,
}

/// Producer side of the pipeline. Cheap to clone; usable from any thread.
#[derive(Debug, Clone)]
pub struct ReportHandle {
    tx: UnboundedSender<ReportItem>,
}

impl ReportHandle {
    pub fn submit(&self, message: ExtractedMessage) {
        if self.tx.send(ReportItem::Message(Box::new(message))).is_err() {
            debug!("reporter already stopped, message dropped");
        }
    }

    pub fn stop(&self) {
        let _ = self.tx.send(ReportItem::Stop);
    }
}

impl MessageSink for ReportHandle {
    fn accept(&self, message: &ExtractedMessage) {
        self.submit(message.clone());
    }
}

pub struct ReportingPipeline;

impl ReportingPipeline {
    /// Start the worker on the current tokio runtime.
    pub fn spawn<T>(transport: T, policy: RetryPolicy) -> (ReportHandle, JoinHandle<()>)
    where
        T: DeliveryTransport + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(transport, policy, rx));
        (ReportHandle { tx }, worker)
    }
}

async fn run_worker<T>(transport: T, policy: RetryPolicy, mut rx: UnboundedReceiver<ReportItem>)
where
    T: DeliveryTransport,
{
    info!("reporter started");
    while let Some(item) = rx.recv().await {
        let message = match item {
            ReportItem::Message(message) => message,
            ReportItem::Stop => break,
        };
        if !transport.is_enabled() {
            continue;
        }
        match deliver_with_retry(&transport, &policy, &message).await {
            Ok(attempts) => debug!("delivered after {} attempt(s)", attempts),
            Err(e) => warn!(
                "dropping message for '{}' after {} attempts: {}",
                message.contact,
                policy.total_attempts(),
                e
            ),
        }
    }
    info!("reporter stopped");
}
