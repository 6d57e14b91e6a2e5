#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the unclaimed property tools.
//!
//! Provides an `indicatif` progress bar behind the [`ProgressObserver`]
//! trait, plus [`init_logger`] which routes `log` output through
//! `indicatif-log-bridge` so log lines don't tear the bars.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use unclaimed_pipeline::{ProgressObserver, ProgressSnapshot};

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] that renders geocoding snapshots.
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style to switch to once a snapshot reports a non-zero total.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Creates a bar that starts as a spinner and switches to a
    /// `pos/len` bar once the first snapshot arrives.
    #[must_use]
    pub fn geocoding_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressObserver> {
        let bar = spinner(multi, message);

        let bar_style = ProgressStyle::with_template(
            "  {prefix} {wide_bar:.yellow/dim} {pos}/{len} {percent}% [{eta}] {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
        bar.set_prefix(message.to_string());

        Arc::new(Self { bar, bar_style })
    }
}

impl ProgressObserver for IndicatifProgress {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        if self.bar.length() != Some(snapshot.total) {
            self.bar.set_length(snapshot.total);
            self.bar.set_style(self.bar_style.clone());
        }
        self.bar.set_position(snapshot.processed);

        let summary = format!(
            "{} geocoded, {} failed",
            snapshot.successful, snapshot.failed
        );
        if snapshot.is_running {
            self.bar.set_message(summary);
        } else {
            self.bar.finish_with_message(summary);
        }
    }
}

/// Adds a steadily ticking spinner to `multi`, for work with no known
/// length (uploads, queries).
#[must_use]
pub fn spinner(multi: &MultiProgress, message: &str) -> ProgressBar {
    let bar = multi.add(ProgressBar::new_spinner());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar
}

/// Initializes the global logger wrapped in `indicatif-log-bridge`.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already set in tests.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
