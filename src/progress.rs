use crate::space::StorageEstimate;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Callbacks into whatever presents the uploader's state.
///
/// Invoked from monitor, orchestrator and worker threads, so implementations
/// must be thread safe. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_log(&self, _message: &str) {}
    fn on_progress(&self, _counters: &CounterSnapshot) {}
    fn on_storage_estimate(&self, _estimate: &StorageEstimate) {}
    fn on_volume_state(&self, _present: bool) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Immutable copy of the session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub detected: u64,
    pub uploaded: u64,
    pub skipped: u64,
    pub remaining: u64,
    pub elapsed: Option<Duration>,
}

impl CounterSnapshot {
    pub fn percent_complete(&self) -> f64 {
        if self.detected == 0 {
            return 0.0;
        }
        self.uploaded as f64 / self.detected as f64 * 100.0
    }

    /// Remaining time extrapolated from the average upload so far.
    pub fn eta(&self) -> Option<Duration> {
        let elapsed = self.elapsed?;
        if self.uploaded == 0 {
            return None;
        }
        Some(elapsed.div_f64(self.uploaded as f64).mul_f64(self.remaining as f64))
    }
}

/// Session-scoped counters. Workers update them concurrently; every update
/// happens under one lock so snapshots are always internally consistent.
#[derive(Default)]
pub struct Counters {
    state: Mutex<CountersState>,
}

#[derive(Default)]
struct CountersState {
    detected: u64,
    uploaded: u64,
    skipped: u64,
    remaining: u64,
    started: Option<Instant>,
}

impl CountersState {
    fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            detected: self.detected,
            uploaded: self.uploaded,
            skipped: self.skipped,
            remaining: self.remaining,
            elapsed: self.started.map(|s| s.elapsed()),
        }
    }
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut CountersState)) -> CounterSnapshot {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state);
        state.snapshot()
    }

    /// Zero everything and restart the session clock.
    pub fn reset(&self) -> CounterSnapshot {
        self.update(|s| {
            *s = CountersState {
                started: Some(Instant::now()),
                ..CountersState::default()
            }
        })
    }

    /// Zero everything and stop the clock, for when no volume is present.
    pub fn clear(&self) -> CounterSnapshot {
        self.update(|s| *s = CountersState::default())
    }

    pub fn record_detected(&self) -> CounterSnapshot {
        self.update(|s| {
            s.detected += 1;
            s.remaining += 1;
        })
    }

    pub fn record_uploaded(&self) -> CounterSnapshot {
        self.update(|s| {
            s.uploaded += 1;
            s.remaining = s.remaining.saturating_sub(1);
        })
    }

    pub fn record_skipped(&self) -> CounterSnapshot {
        self.update(|s| s.skipped += 1)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        self.update(|_| {})
    }
}
