#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the unclaimed property server.
//!
//! Property listings are served as stored rows; everything else the API
//! exchanges is defined here, in camelCase.

use serde::{Deserialize, Serialize};
use unclaimed_property_models::{PropertyRecord, SearchFilters};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Error body returned by every failing route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Query parameters for the property search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyQueryParams {
    pub owner_name: Option<String>,
    pub owner_city: Option<String>,
    pub owner_state: Option<String>,
    pub property_type: Option<String>,
    pub holder_name: Option<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    /// Row cap; clamped to the server maximum.
    pub limit: Option<usize>,
}

impl PropertyQueryParams {
    /// The search filters carried by these parameters.
    #[must_use]
    pub fn filters(&self) -> SearchFilters {
        SearchFilters {
            owner_name: self.owner_name.clone(),
            owner_city: self.owner_city.clone(),
            owner_state: self.owner_state.clone(),
            property_type: self.property_type.clone(),
            holder_name: self.holder_name.clone(),
            min_amount: self.min_amount,
            max_amount: self.max_amount,
        }
    }
}

/// A geocoded property as plotted on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMapProperty {
    pub id: String,
    pub property_id: Option<String>,
    pub owner_name: Option<String>,
    pub owner_city: Option<String>,
    pub owner_state: Option<String>,
    pub holder_name: Option<String>,
    pub current_cash_balance: Option<f64>,
    /// Owner latitude.
    pub latitude: f64,
    /// Owner longitude.
    pub longitude: f64,
    pub holder_latitude: Option<f64>,
    pub holder_longitude: Option<f64>,
}

impl ApiMapProperty {
    /// Builds a marker from a record, or `None` if the owner has no
    /// coordinates.
    #[must_use]
    pub fn from_record(record: PropertyRecord) -> Option<Self> {
        let owner = record.owner_coordinates()?;
        let holder = record.holder_coordinates();

        Some(Self {
            id: record.id,
            property_id: record.property_id,
            owner_name: record.owner_name,
            owner_city: record.owner_city,
            owner_state: record.owner_state,
            holder_name: record.holder_name,
            current_cash_balance: record.current_cash_balance,
            latitude: owner.latitude,
            longitude: owner.longitude,
            holder_latitude: holder.map(|c| c.latitude),
            holder_longitude: holder.map(|c| c.longitude),
        })
    }
}

/// Body of `POST /api/geocoding/start`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StartGeocodingRequest {
    /// Page size for the run.
    pub limit: Option<usize>,
}

/// Response of an accepted `POST /api/geocoding/start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGeocodingStarted {
    /// Records in the page the run will process.
    pub total: u64,
}

/// Response of `POST /api/geocoding/stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiGeocodingStopped {
    /// `false` if no run was in progress.
    pub stopped: bool,
}
