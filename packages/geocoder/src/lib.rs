#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address resolution for unclaimed property records.
//!
//! Converts owner and holder postal addresses to latitude/longitude using
//! the Nominatim / `OpenStreetMap` search API. The public instance allows
//! at most one request per second, so every lookup made through an
//! [`AddressResolver`] goes through a single shared [`RateLimiter`].
//!
//! The HTTP call sits behind the [`GeocodeBackend`] trait so the resolver
//! (and the batch pipeline built on it) can be driven without network
//! access.

pub mod address;
pub mod config;
pub mod nominatim;
pub mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use unclaimed_property_models::{Coordinates, PostalAddress};

pub use address::GeocodeQuery;
pub use config::NominatimConfig;
pub use rate_limit::RateLimiter;

/// A geocoding match.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Canonical address returned by the geocoder.
    pub display_name: String,
}

impl GeocodeResult {
    /// The coordinate pair, without the display name.
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Geocoding request failed: {status}")]
    Status {
        /// Response status code.
        status: reqwest::StatusCode,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },
}

/// The outbound call to an external geocoding service.
///
/// Implementations perform exactly one request per call and do no rate
/// limiting of their own; [`AddressResolver`] owns pacing.
#[async_trait]
pub trait GeocodeBackend: Send + Sync {
    /// Looks up a free-form query.
    ///
    /// Returns `Ok(None)` when the service has no match.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] on transport failure, a non-success
    /// status, or an unparseable body.
    async fn search(&self, query: &GeocodeQuery) -> Result<Option<GeocodeResult>, GeocodeError>;
}

/// Resolves postal addresses to coordinates through a rate-limited
/// [`GeocodeBackend`].
///
/// One resolver is meant to be shared (via `Arc`) by everything that
/// geocodes in the process, so owner and holder lookups draw from the
/// same request budget.
pub struct AddressResolver {
    backend: Arc<dyn GeocodeBackend>,
    limiter: RateLimiter,
}

impl AddressResolver {
    /// Creates a resolver that waits at least `min_interval` between
    /// consecutive backend calls.
    #[must_use]
    pub fn new(backend: Arc<dyn GeocodeBackend>, min_interval: Duration) -> Self {
        Self {
            backend,
            limiter: RateLimiter::new(min_interval),
        }
    }

    /// Creates a resolver backed by the Nominatim HTTP client described by
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn nominatim(config: &NominatimConfig) -> Result<Self, GeocodeError> {
        let client = nominatim::NominatimClient::new(config)?;
        Ok(Self::new(Arc::new(client), config.rate_limit()))
    }

    /// Resolves an address, surfacing backend errors.
    ///
    /// Addresses with fewer than two non-empty components return
    /// `Ok(None)` without touching the backend or the rate limiter.
    ///
    /// # Errors
    ///
    /// Returns the backend's [`GeocodeError`] unchanged.
    pub async fn try_resolve(
        &self,
        address: &PostalAddress,
    ) -> Result<Option<GeocodeResult>, GeocodeError> {
        let Some(query) = GeocodeQuery::from_address(address) else {
            log::trace!("Not enough address information to geocode: {address:?}");
            return Ok(None);
        };

        self.limiter.until_ready().await;
        self.backend.search(&query).await
    }

    /// Resolves an address, treating every failure as "not found".
    ///
    /// Errors are logged and swallowed so that callers processing many
    /// addresses never abort on a single bad lookup.
    pub async fn resolve(&self, address: &PostalAddress) -> Option<GeocodeResult> {
        match self.try_resolve(address).await {
            Ok(Some(result)) => Some(result),
            Ok(None) => {
                log::debug!("No geocoding match for {address:?}");
                None
            }
            Err(e) => {
                log::warn!("Geocoding error for {address:?}: {e}");
                None
            }
        }
    }
}
