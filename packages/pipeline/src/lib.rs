#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch geocoding of unclaimed property records.
//!
//! A [`GeocodingController`] owns the single-run state machine: it fetches
//! one page of records that still need coordinates, resolves each record's
//! owner and holder addresses through a shared
//! [`AddressResolver`](unclaimed_geocoder::AddressResolver), persists the
//! outcome per record, and publishes a [`ProgressSnapshot`] after every
//! record. [`stats::compute_stats`] summarizes the table for display.

pub mod controller;
pub mod progress;
pub mod stats;

pub use controller::{GeocodingController, GeocodingRun};
pub use progress::{LogProgress, ProgressObserver};
pub use stats::compute_stats;
pub use unclaimed_property_models::{GeocodingStats, ProgressSnapshot};

use unclaimed_store::StoreError;

/// Default number of records fetched by one run.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Errors that can occur when starting a geocoding run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A run is already in progress.
    #[error("Geocoding is already running")]
    AlreadyRunning,

    /// The page of records to geocode could not be fetched.
    #[error("Failed to fetch records needing geocoding: {0}")]
    PageFetch(#[source] StoreError),
}
