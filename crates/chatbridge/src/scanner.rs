//! The periodic scan loop
//!
//! Every cycle looks at the open chat. Less often, on a randomized cadence,
//! it also walks the session list and opens chats with unread markers. New
//! messages go through the deduplicator to every registered sink.

use crate::config::ListenerConfig;
use crate::dedup::{Deduplicator, MessageSignature};
use crate::extractor::ExtractedMessage;
use crate::pacing::{self, DelayRange};
use crate::ui::ChatUi;
use crate::BridgeError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Receives every message that survives deduplication.
pub trait MessageSink: Send + Sync {
    fn accept(&self, message: &ExtractedMessage);
}

/// Startup grace before the first unread pass.
const FIRST_UNREAD_DELAY: DelayRange = DelayRange {
    min: Duration::from_secs(2),
    max: Duration::from_secs(5),
};
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// When the next unread pass is due, plus the dedup state.
#[derive(Debug)]
pub struct ScanSchedule {
    next_unread_scan: Instant,
    processed: Deduplicator,
}

impl Default for ScanSchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanSchedule {
    pub fn new() -> Self {
        Self::starting_at(Instant::now() + FIRST_UNREAD_DELAY.sample())
    }

    pub fn starting_at(next_unread_scan: Instant) -> Self {
        Self {
            next_unread_scan,
            processed: Deduplicator::default(),
        }
    }

    pub fn unread_due(&self, now: Instant) -> bool {
        now >= self.next_unread_scan
    }

    pub fn next_unread_scan(&self) -> Instant {
        self.next_unread_scan
    }

    pub fn reschedule(&mut self, now: Instant, interval: DelayRange) -> Duration {
        let wait = interval.sample();
        self.next_unread_scan = now + wait;
        wait
    }

    pub fn processed(&mut self) -> &mut Deduplicator {
        &mut self.processed
    }
}

/// What one cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub active_contact: Option<String>,
    pub unread_processed: usize,
    pub emitted: usize,
    pub popups_dismissed: usize,
    /// Set when the cycle bailed out before touching the tree.
    pub skipped: Option<String>,
}

pub struct Scanner {
    ui: Arc<ChatUi>,
    config: ListenerConfig,
    schedule: ScanSchedule,
    sinks: Vec<Arc<dyn MessageSink>>,
    cancel: CancellationToken,
}

impl Scanner {
    pub fn new(ui: Arc<ChatUi>, config: ListenerConfig) -> Self {
        Self {
            ui,
            config,
            schedule: ScanSchedule::new(),
            sinks: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_schedule(mut self, schedule: ScanSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sinks are fed in registration order.
    pub fn add_sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn schedule(&self) -> &ScanSchedule {
        &self.schedule
    }

    pub fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        // Resolve (or revalidate) the window before anything walks the tree.
        if let Err(e) = self.ui.main_window() {
            match e {
                BridgeError::Unresponsive(_) => warn!("skipping cycle: {}", e),
                _ => debug!("skipping cycle: {}", e),
            }
            report.skipped = Some(e.to_string());
            return report;
        }

        if self.config.guard_popups {
            match self.ui.guard_popups() {
                Ok(n) => report.popups_dismissed = n,
                Err(e) => debug!("popup guard failed: {}", e),
            }
        }

        self.scan_active(&mut report);

        let now = Instant::now();
        if self.schedule.unread_due(now) {
            self.scan_unread(&mut report);
            let wait = self.schedule.reschedule(now, self.config.unread_interval());
            debug!("next unread scan in {:.2}s", wait.as_secs_f64());
        }
        report
    }

    fn scan_active(&mut self, report: &mut CycleReport) {
        match self.ui.current_contact() {
            Ok(contact) if !contact.is_empty() => {
                report.emitted += self.fetch_and_report(&contact);
                report.active_contact = Some(contact);
            }
            Ok(_) => debug!("no open chat"),
            Err(e) => warn!("active chat scan failed: {}", e),
        }
    }

    fn scan_unread(&mut self, report: &mut CycleReport) {
        let unread = match self.ui.find_unread_sessions(self.config.unread_max_per_round) {
            Ok(unread) => unread,
            Err(e) => {
                warn!("unread scan failed: {}", e);
                return;
            }
        };
        if !unread.is_empty() {
            info!("found {} unread sessions", unread.len());
        }

        for item in unread {
            if self.cancel.is_cancelled() {
                break;
            }
            let ui = Arc::clone(&self.ui);
            let _gate = ui.gate().enter("unread_session");
            let contact = ui
                .click_session_item(&item)
                .unwrap_or_else(|| "unknown".to_string());
            ui.pacer().pause(pacing::READ_TIME);
            report.emitted += self.fetch_and_report(&contact);
            report.unread_processed += 1;
        }
    }

    fn fetch_and_report(&mut self, contact: &str) -> usize {
        let mut emitted = 0;
        for message in self.ui.extract_latest_messages(contact) {
            if !self.schedule.processed().should_emit(MessageSignature::of(&message)) {
                continue;
            }
            info!(
                "new message from '{}': {}",
                message.contact,
                message.content.chars().take(15).collect::<String>()
            );
            for sink in &self.sinks {
                sink.accept(&message);
            }
            emitted += 1;
        }
        emitted
    }

    /// Run cycles until cancelled. A panicking cycle is logged and the loop
    /// carries on.
    pub fn run(mut self) {
        info!("scanner started");
        while !self.cancel.is_cancelled() {
            let outcome = catch_unwind(AssertUnwindSafe(|| self.run_cycle()));
            if let Err(panic) = outcome {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("scan cycle panicked: {}", reason);
            }
            let pause = pacing::jittered(
                self.config.scan_interval_seconds,
                self.config.scan_jitter_seconds,
            );
            self.sleep(pause);
        }
        info!("scanner stopped");
    }

    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }

    /// Run the loop on a dedicated, platform-initialized OS thread.
    pub fn spawn(self) -> std::io::Result<std::thread::JoinHandle<()>> {
        std::thread::Builder::new()
            .name("scanner".to_string())
            .spawn(move || {
                if let Err(e) = crate::platforms::init_thread() {
                    error!("scanner thread init failed: {}", e);
                    return;
                }
                self.run()
            })
    }
}
