#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record store access for unclaimed property data.
//!
//! The property table is hosted behind a `PostgREST` endpoint (Supabase).
//! Everything the application needs from it is expressed by the
//! [`RecordStore`] trait: filtered reads, a targeted geocoding update,
//! count queries, and batched inserts. [`postgrest::PostgrestStore`] talks
//! to the hosted table over HTTP; [`memory::MemoryStore`] keeps rows in
//! process for tests and local experiments.

pub mod memory;
pub mod postgrest;

use async_trait::async_trait;
use unclaimed_property_models::{
    GeocodingStatus, GeocodingUpdate, NewPropertyRecord, PropertyRecord, SearchFilters,
};

pub use memory::MemoryStore;
pub use postgrest::{PostgrestConfig, PostgrestStore};

/// Default row cap for listing queries.
pub const DEFAULT_LIST_LIMIT: usize = 1000;

/// Errors that can occur during record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("Store returned {status}: {body}")]
    Status {
        /// Response status code.
        status: reqwest::StatusCode,
        /// Response body, for diagnostics.
        body: String,
    },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A targeted update matched no record.
    #[error("No record with id {id}")]
    MissingRecord {
        /// The id that was not found.
        id: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// Required configuration is missing or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what is missing.
        message: String,
    },
}

/// Query and update surface of the property table.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns up to `limit` records whose geocoding status is unset,
    /// `pending`, or `failed`, in the store's natural order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    async fn fetch_needing_geocoding(&self, limit: usize)
    -> Result<Vec<PropertyRecord>, StoreError>;

    /// Writes the outcome of one geocoding attempt to the record `id`.
    /// Only resolved coordinates are written; the others are left as is.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingRecord`] if no record has this id, or
    /// another [`StoreError`] if the update fails.
    async fn update_geocoding(&self, id: &str, update: &GeocodingUpdate)
    -> Result<(), StoreError>;

    /// Counts every record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    async fn count_all(&self) -> Result<u64, StoreError>;

    /// Returns the status of every record whose status is not null.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    async fn geocoding_statuses(&self) -> Result<Vec<GeocodingStatus>, StoreError>;

    /// Counts records missing the owner latitude or owner longitude.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    async fn count_missing_owner_coordinates(&self) -> Result<u64, StoreError>;

    /// Searches records, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    async fn search(
        &self,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<PropertyRecord>, StoreError>;

    /// Returns records with owner coordinates, largest balance first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    async fn geocoded(&self, limit: usize) -> Result<Vec<PropertyRecord>, StoreError>;

    /// Inserts a batch of new records, returning how many were inserted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails. A failed batch inserts
    /// nothing.
    async fn insert_batch(&self, records: &[NewPropertyRecord]) -> Result<u64, StoreError>;
}
