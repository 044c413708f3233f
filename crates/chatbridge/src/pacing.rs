//! Human-cadence pauses between UI actions
//!
//! Every wait is drawn uniformly from a bounded range. The [`Pacer`] is
//! injected so tests can run the same flows without sleeping.

use parking_lot::Mutex;
use rand::Rng;
use std::time::Duration;

/// Inclusive range a pause is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    /// Inverted bounds are swapped; negative or non-finite seconds clamp to 0.
    pub fn from_secs(min: f64, max: f64) -> Self {
        let clamp = |s: f64| {
            if s.is_finite() && s > 0.0 {
                Duration::from_secs_f64(s)
            } else {
                Duration::ZERO
            }
        };
        let (a, b) = (clamp(min), clamp(max));
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    pub const fn fixed(duration: Duration) -> Self {
        Self {
            min: duration,
            max: duration,
        }
    }

    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

pub const READ_TIME: DelayRange = DelayRange {
    min: Duration::from_millis(1000),
    max: Duration::from_millis(2500),
};
pub const REACTION: DelayRange = DelayRange {
    min: Duration::from_millis(200),
    max: Duration::from_millis(600),
};
pub const SESSION_SETTLE: DelayRange = DelayRange {
    min: Duration::from_millis(500),
    max: Duration::from_millis(1000),
};
pub const AFTER_CLICK: DelayRange = DelayRange {
    min: Duration::from_millis(200),
    max: Duration::from_millis(500),
};
pub const AFTER_PASTE: DelayRange = DelayRange::fixed(Duration::from_millis(100));
pub const BEFORE_SEND: DelayRange = DelayRange {
    min: Duration::from_millis(300),
    max: Duration::from_millis(800),
};

/// Jittered duration `base + uniform(0, jitter)` in seconds.
pub fn jittered(base_secs: f64, jitter_secs: f64) -> Duration {
    let base = base_secs.max(0.0);
    let jitter = if jitter_secs > 0.0 {
        rand::thread_rng().gen_range(0.0..=jitter_secs)
    } else {
        0.0
    };
    Duration::from_secs_f64(base + jitter)
}

pub trait Pacer: Send + Sync {
    fn pause(&self, range: DelayRange);
}

/// Sleeps the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct HumanPacer;

impl Pacer for HumanPacer {
    fn pause(&self, range: DelayRange) {
        let delay = range.sample();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

/// Records the requested ranges instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<DelayRange>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> Vec<DelayRange> {
        self.pauses.lock().clone()
    }
}

impl Pacer for RecordingPacer {
    fn pause(&self, range: DelayRange) {
        self.pauses.lock().push(range);
    }
}
