//! Single-flight access to the accessibility tree
//!
//! The client's tree is not safe to drive from two threads at once, so the
//! scanner and the command dispatcher both enter one process-wide gate before
//! reading or clicking anything. The gate is reentrant: a composite operation
//! holds it across the whole sequence and the primitives it calls may enter
//! again.

use parking_lot::ReentrantMutex;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Waits longer than this are worth a debug line.
const SLOW_ENTRY: Duration = Duration::from_millis(500);

trait Held {}
impl<T> Held for T {}

/// Proof of being inside the gate. Dropping it leaves.
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct GateGuard<'a> {
    op: &'static str,
    _held: Option<Box<dyn Held + 'a>>,
}

impl<'a> GateGuard<'a> {
    /// Wrap whatever keeps the underlying lock held.
    pub fn holding<T: 'a>(op: &'static str, lock_guard: T) -> Self {
        Self {
            op,
            _held: Some(Box::new(lock_guard)),
        }
    }

    /// A guard that holds nothing.
    pub fn unheld(op: &'static str) -> Self {
        Self { op, _held: None }
    }

    pub fn op(&self) -> &'static str {
        self.op
    }
}

impl std::fmt::Debug for GateGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateGuard").field("op", &self.op).finish()
    }
}

pub trait InteractionGate: Send + Sync {
    /// Block until the caller may touch the tree. `op` names the operation for
    /// diagnostics.
    fn enter(&self, op: &'static str) -> GateGuard<'_>;
}

/// Production gate backed by a reentrant mutex.
#[derive(Default)]
pub struct ReentrantGate {
    lock: ReentrantMutex<()>,
}

impl ReentrantGate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InteractionGate for ReentrantGate {
    fn enter(&self, op: &'static str) -> GateGuard<'_> {
        let started = Instant::now();
        let guard = self.lock.lock();
        let waited = started.elapsed();
        if waited >= SLOW_ENTRY {
            debug!("gate entry for '{}' waited {:?}", op, waited);
        } else {
            trace!("gate entered: {}", op);
        }
        GateGuard::holding(op, guard)
    }
}

/// Gate that never blocks. Only for single-threaded tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGate;

impl InteractionGate for NoopGate {
    fn enter(&self, op: &'static str) -> GateGuard<'_> {
        GateGuard::unheld(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_reentrant_on_same_thread() {
        let gate = ReentrantGate::new();
        let outer = gate.enter("outer");
        let inner = gate.enter("inner");
        assert_eq!(outer.op(), "outer");
        assert_eq!(inner.op(), "inner");
    }

    #[test]
    fn test_excludes_other_threads() {
        let gate = Arc::new(ReentrantGate::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let inside = Arc::clone(&inside);
                let overlapped = Arc::clone(&overlapped);
                thread::spawn(move || {
                    for _ in 0..20 {
                        let _guard = gate.enter("work");
                        if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlapped.store(true, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_micros(200));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert!(!overlapped.load(Ordering::SeqCst));
    }
}
