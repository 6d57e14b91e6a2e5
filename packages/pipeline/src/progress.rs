//! Progress reporting for batch geocoding runs.
//!
//! Defines a [`ProgressObserver`] trait that decouples the pipeline from
//! whatever renders progress (an `indicatif` bar, a log line, an HTTP
//! poller). Observers are called synchronously after every snapshot the
//! pipeline publishes, in order.

use unclaimed_property_models::ProgressSnapshot;

/// Receives progress snapshots from a geocoding run.
///
/// Implementations must be `Send + Sync` so they can be shared with runs
/// spawned onto other tasks.
pub trait ProgressObserver: Send + Sync {
    /// Called at run start, after each record, and once more with
    /// `is_running == false` when the run ends.
    fn on_progress(&self, snapshot: &ProgressSnapshot);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressSnapshot) + Send + Sync,
{
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self(snapshot);
    }
}

/// Logs each snapshot at `info` level.
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        log::info!(
            "Geocoding progress: {}/{} processed, {} successful, {} failed{}",
            snapshot.processed,
            snapshot.total,
            snapshot.successful,
            snapshot.failed,
            if snapshot.is_running { "" } else { " (done)" }
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn closures_are_observers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer: Arc<dyn ProgressObserver> =
            Arc::new(move |s: &ProgressSnapshot| sink.lock().unwrap().push(s.processed));

        for processed in 0..3 {
            observer.on_progress(&ProgressSnapshot {
                total: 3,
                processed,
                ..Default::default()
            });
        }
        LogProgress.on_progress(&ProgressSnapshot::default());

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }
}
