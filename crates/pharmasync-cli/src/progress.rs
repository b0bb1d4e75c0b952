//! Progress bar for the sweep phase.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use pharmasync_core::{ReconcileProgress, RecordOutcome, RunMode, SourceRecord};

pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    /// A hidden bar when `quiet` is set.
    pub fn new(quiet: bool, mode: RunMode) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };

        let template = match mode {
            RunMode::DryRun => "{spinner:.yellow} (dry-run) {msg} [{bar:40.yellow/blue}] {pos}/{len}",
            RunMode::Apply => "{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}",
        };
        let style = ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");
        bar.set_style(style);

        Self { bar }
    }
}

impl ReconcileProgress for BarProgress {
    fn start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_message("Reconciling pharmacies");
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn record_done(&self, record: &SourceRecord, outcome: RecordOutcome) {
        if outcome == RecordOutcome::Created {
            self.bar.set_message(format!("created {}", record.natural_key));
        }
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_bar_counts_records() {
        let progress = BarProgress::new(true, RunMode::DryRun);
        progress.start(2);
        progress.record_done(&SourceRecord::new("A"), RecordOutcome::Created);
        progress.record_done(&SourceRecord::new("B"), RecordOutcome::Reactivated);
        assert_eq!(progress.bar.position(), 2);
        assert_eq!(progress.bar.length(), Some(2));
        progress.finish();
        assert!(progress.bar.is_finished());
    }
}
