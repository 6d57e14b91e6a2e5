//! Single-run batch geocoding state machine.
//!
//! The controller is either idle or running exactly one run. Starting is
//! split in two phases so callers can report start-time failures
//! synchronously and then drive the run wherever they like:
//!
//! 1. [`GeocodingController::start`] claims the running state and fetches
//!    the page of records to geocode.
//! 2. [`GeocodingRun::process`] geocodes the page record by record.
//!
//! Dropping a [`GeocodingRun`] at any point returns the controller to idle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use unclaimed_geocoder::{AddressResolver, GeocodeResult};
use unclaimed_property_models::{
    GeocodingStats, GeocodingStatus, GeocodingUpdate, ProgressSnapshot, PropertyRecord,
};
use unclaimed_store::{RecordStore, StoreError};

use crate::{PipelineError, ProgressObserver, stats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Running { cancel_requested: bool },
}

#[derive(Debug)]
struct Shared {
    state: Mutex<RunState>,
    progress: watch::Sender<ProgressSnapshot>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the running state for the lifetime of one run.
struct RunGuard {
    shared: Option<Arc<Shared>>,
}

impl RunGuard {
    fn acquire(shared: &Arc<Shared>) -> Result<Self, PipelineError> {
        let mut state = shared.state();
        if matches!(*state, RunState::Running { .. }) {
            return Err(PipelineError::AlreadyRunning);
        }
        *state = RunState::Running {
            cancel_requested: false,
        };
        drop(state);

        Ok(Self {
            shared: Some(Arc::clone(shared)),
        })
    }

    fn cancel_requested(&self) -> bool {
        self.shared.as_ref().is_some_and(|shared| {
            matches!(
                *shared.state(),
                RunState::Running {
                    cancel_requested: true
                }
            )
        })
    }

    fn release(&mut self) {
        if let Some(shared) = self.shared.take() {
            *shared.state() = RunState::Idle;
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Owns the batch geocoding state and starts runs.
///
/// Cloning is cheap and every clone controls the same state, so a clone
/// can be handed to a signal handler or an HTTP handler to call
/// [`stop`](Self::stop).
#[derive(Clone)]
pub struct GeocodingController {
    store: Arc<dyn RecordStore>,
    resolver: Arc<AddressResolver>,
    shared: Arc<Shared>,
}

impl GeocodingController {
    /// Creates an idle controller.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, resolver: Arc<AddressResolver>) -> Self {
        let (progress, _) = watch::channel(ProgressSnapshot::default());

        Self {
            store,
            resolver,
            shared: Arc::new(Shared {
                state: Mutex::new(RunState::Idle),
                progress,
            }),
        }
    }

    /// Claims the running state and fetches up to `page_size` records
    /// whose status is unset, `pending`, or `failed`.
    ///
    /// No progress is published until [`GeocodingRun::process`] is called.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::AlreadyRunning`] if a run is in progress.
    /// * [`PipelineError::PageFetch`] if the page query fails. The
    ///   controller is idle again when this is returned.
    pub async fn start(
        &self,
        page_size: usize,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<GeocodingRun, PipelineError> {
        let guard = RunGuard::acquire(&self.shared)?;

        log::info!("Starting batch geocoding of up to {page_size} records");

        let page = self
            .store
            .fetch_needing_geocoding(page_size)
            .await
            .map_err(|e| {
                log::error!("Failed to fetch records needing geocoding: {e}");
                PipelineError::PageFetch(e)
            })?;

        log::info!("{} records need geocoding", page.len());

        Ok(GeocodingRun {
            guard,
            shared: Arc::clone(&self.shared),
            store: Arc::clone(&self.store),
            resolver: Arc::clone(&self.resolver),
            observer,
            page,
        })
    }

    /// Starts a run and processes it to completion.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`start`](Self::start).
    pub async fn run(
        &self,
        page_size: usize,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<ProgressSnapshot, PipelineError> {
        Ok(self.start(page_size, observer).await?.process().await)
    }

    /// Requests that the current run stop before its next record.
    ///
    /// The record in flight is finished and persisted first. Returns
    /// `false` if no run is in progress.
    pub fn stop(&self) -> bool {
        let mut state = self.shared.state();
        match *state {
            RunState::Running { .. } => {
                *state = RunState::Running {
                    cancel_requested: true,
                };
                log::info!("Stop requested for batch geocoding");
                true
            }
            RunState::Idle => false,
        }
    }

    /// Whether a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(*self.shared.state(), RunState::Running { .. })
    }

    /// The most recently published snapshot.
    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        *self.shared.progress.borrow()
    }

    /// Subscribes to published snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.shared.progress.subscribe()
    }

    /// Computes geocoding statistics over the whole table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any of the count queries fail.
    pub async fn stats(&self) -> Result<GeocodingStats, StoreError> {
        stats::compute_stats(self.store.as_ref()).await
    }
}

/// A claimed run with its page of records, ready to process.
pub struct GeocodingRun {
    guard: RunGuard,
    shared: Arc<Shared>,
    store: Arc<dyn RecordStore>,
    resolver: Arc<AddressResolver>,
    observer: Option<Arc<dyn ProgressObserver>>,
    page: Vec<PropertyRecord>,
}

impl GeocodingRun {
    /// Number of records in the page.
    #[must_use]
    pub fn total(&self) -> usize {
        self.page.len()
    }

    /// Geocodes every record in the page, in order, unless stopped.
    ///
    /// For each record the owner address is resolved, then the holder
    /// address, then the outcome is written back. A snapshot is published
    /// at start, after each record, and once more with `is_running ==
    /// false` after the controller has returned to idle. The returned
    /// value is that final snapshot.
    ///
    /// An empty page publishes only the final all-zero snapshot.
    pub async fn process(mut self) -> ProgressSnapshot {
        let mut snapshot = ProgressSnapshot {
            total: self.page.len() as u64,
            is_running: true,
            ..ProgressSnapshot::default()
        };

        if !self.page.is_empty() {
            self.publish(snapshot);
        }

        for record in &self.page {
            if self.guard.cancel_requested() {
                log::info!(
                    "Batch geocoding stopped after {} of {} records",
                    snapshot.processed,
                    snapshot.total
                );
                break;
            }

            if self.geocode_record(record).await {
                snapshot.successful += 1;
            } else {
                snapshot.failed += 1;
            }
            snapshot.processed += 1;

            self.publish(snapshot);
        }

        self.guard.release();
        snapshot.is_running = false;
        self.publish(snapshot);

        log::info!(
            "Batch geocoding finished: {} processed, {} successful, {} failed",
            snapshot.processed,
            snapshot.successful,
            snapshot.failed
        );

        snapshot
    }

    /// Resolves and persists one record. Returns `true` only if the record
    /// ended `completed` and was stored.
    async fn geocode_record(&self, record: &PropertyRecord) -> bool {
        let started_at = Utc::now();
        log::debug!(
            "Geocoding record {} ({})",
            record.id,
            GeocodingStatus::Processing
        );

        let owner = self.resolver.resolve(&record.owner_address()).await;
        let holder = self.resolver.resolve(&record.holder_address()).await;

        let update = GeocodingUpdate::from_outcomes(
            owner.as_ref().map(GeocodeResult::coordinates),
            holder.as_ref().map(GeocodeResult::coordinates),
            started_at,
        );

        match self.store.update_geocoding(&record.id, &update).await {
            Ok(()) => {
                log::debug!("Record {} geocoding {}", record.id, update.status);
                update.status == GeocodingStatus::Completed
            }
            Err(e) => {
                log::error!(
                    "Failed to save geocoding result for record {}: {e}",
                    record.id
                );
                false
            }
        }
    }

    fn publish(&self, snapshot: ProgressSnapshot) {
        self.shared.progress.send_replace(snapshot);
        if let Some(observer) = &self.observer {
            observer.on_progress(&snapshot);
        }
    }
}
