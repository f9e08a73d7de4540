use chrono::Local;
use colored::*;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use sd_uploader::{CounterSnapshot, ProgressReporter, StorageEstimate};
use std::time::Duration;
use tracing::debug;

/// Terminal stand-in for the status window: one progress bar for the session
/// counters, with log lines printed above it.
pub struct CliReporter {
    bar: ProgressBar,
}

impl CliReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:30.cyan/dim}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸─")
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(style);
        Self { bar }
    }
}

impl ProgressReporter for CliReporter {
    fn on_log(&self, message: &str) {
        debug!("{}", message);
        self.bar
            .println(format!("{} - {}", Local::now().format("%H:%M:%S"), message));
    }

    fn on_progress(&self, counters: &CounterSnapshot) {
        let eta = match counters.eta() {
            Some(eta) => HumanDuration(eta).to_string(),
            None if counters.detected > 0 => "Calculating...".to_string(),
            None => "N/A".to_string(),
        };
        self.bar.set_length(counters.detected);
        self.bar.set_position(counters.uploaded);
        self.bar.set_message(format!(
            "Uploaded: {} | Skipped: {} | Remaining: {} ({:.1}%) | ETA: {}",
            counters.uploaded,
            counters.skipped,
            counters.remaining,
            counters.percent_complete(),
            eta
        ));
    }

    fn on_storage_estimate(&self, estimate: &StorageEstimate) {
        self.bar.println(format!("Storage: {}", estimate));
    }

    fn on_volume_state(&self, present: bool) {
        if present {
            self.bar.println(format!("SD Card: {}", "Detected".green()));
            self.bar.enable_steady_tick(Duration::from_millis(80));
        } else {
            self.bar.println(format!("SD Card: {}", "Not Detected".red()));
            self.bar.disable_steady_tick();
        }
    }
}
