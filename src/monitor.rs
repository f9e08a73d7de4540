use crate::engine::UploadEngine;
use crate::progress::ProgressReporter;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

const STOP_CHECK_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeEvent {
    Inserted,
    Removed,
}

/// Turns presence samples into insertion / removal edges. A volume that stays
/// present yields nothing after its first insertion.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    present: bool,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn sample(&mut self, present: bool) -> Option<VolumeEvent> {
        let event = match (self.present, present) {
            (false, true) => Some(VolumeEvent::Inserted),
            (true, false) => Some(VolumeEvent::Removed),
            _ => None,
        };
        self.present = present;
        event
    }
}

pub fn volume_present(path: &Path) -> bool {
    path.is_dir()
}

/// Polls the engine's configured source path and runs one upload session per
/// insertion. The session runs on the polling thread, so sessions never
/// overlap and a removal is only noticed once the session has finished.
pub struct VolumeMonitor {
    interval: Duration,
    stop: Arc<AtomicBool>,
}

impl VolumeMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the flag ends the loop at its next check.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// The source path is re-read from the engine on every poll, so a replaced
    /// config moves the watch with it.
    pub fn run(&self, engine: &UploadEngine, reporter: &dyn ProgressReporter) {
        info!(
            "Watching {} every {:?}",
            engine.config().source_root.display(),
            self.interval
        );
        self.run_with(
            || volume_present(&engine.config().source_root),
            |event| match event {
                VolumeEvent::Inserted => {
                    let source_root = engine.config().source_root.clone();
                    reporter.on_volume_state(true);
                    reporter.on_log(&format!("SD card detected at {}", source_root.display()));
                    if let Err(e) = engine.run_session(reporter) {
                        warn!("Session for {} ended early: {}", source_root.display(), e);
                    }
                }
                VolumeEvent::Removed => {
                    reporter.on_log("SD card removed.");
                    let snapshot = engine.counters().clear();
                    reporter.on_volume_state(false);
                    reporter.on_progress(&snapshot);
                }
            },
        );
    }

    /// Core loop with the presence probe and event handler supplied by the
    /// caller. Returns once the stop flag is set.
    pub fn run_with<P, H>(&self, mut probe: P, mut on_event: H)
    where
        P: FnMut() -> bool,
        H: FnMut(VolumeEvent),
    {
        let mut detector = EdgeDetector::new();
        while !self.stopped() {
            if let Some(event) = detector.sample(probe()) {
                on_event(event);
            }
            self.sleep_interval();
        }
        info!("Volume monitor stopped");
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn sleep_interval(&self) {
        let mut slept = Duration::ZERO;
        while slept < self.interval && !self.stopped() {
            let slice = STOP_CHECK_SLICE.min(self.interval - slept);
            thread::sleep(slice);
            slept += slice;
        }
    }
}
