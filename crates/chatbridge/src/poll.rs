//! Pull-based access to extracted messages for a local consumer

use crate::extractor::ExtractedMessage;
use crate::scanner::MessageSink;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

/// How long `GET /poll` waits for the first message.
pub const DEFAULT_POLL_WAIT: Duration = Duration::from_secs(1);

/// Unbounded FIFO filled by the scanner and drained by pollers.
///
/// Independent of the reporting queue: every message reaches both.
#[derive(Debug)]
pub struct PollBuffer {
    tx: UnboundedSender<ExtractedMessage>,
    rx: Mutex<UnboundedReceiver<ExtractedMessage>>,
}

impl Default for PollBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PollBuffer {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub fn push(&self, message: ExtractedMessage) {
        // The receiver lives as long as `self`, so this cannot fail.
        let _ = self.tx.send(message);
    }

    /// Wait up to `wait` for one message, then take whatever else is already
    /// queued without waiting. Empty when nothing arrived in time.
    pub async fn poll(&self, wait: Duration) -> Vec<ExtractedMessage> {
        let mut rx = self.rx.lock().await;
        let mut messages = Vec::new();
        match tokio::time::timeout(wait, rx.recv()).await {
            Ok(Some(first)) => messages.push(first),
            Ok(None) | Err(_) => return messages,
        }
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

impl MessageSink for PollBuffer {
    fn accept(&self, message: &ExtractedMessage) {
        self.push(message.clone());
    }
}
