//! Geocoding service configuration.
//!
//! The service definition lives in `services/nominatim.toml` and is
//! embedded at compile time. Deployments can point at a different
//! instance or change the pacing through environment variables without
//! rebuilding:
//!
//! - `NOMINATIM_URL` overrides `base_url`
//! - `GEOCODER_RATE_LIMIT_MS` overrides `rate_limit_ms`

use std::time::Duration;

use serde::Deserialize;

const NOMINATIM_TOML: &str = include_str!("../services/nominatim.toml");

/// Nominatim service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct NominatimConfig {
    /// Unique identifier (`"nominatim"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Search endpoint URL.
    pub base_url: String,
    /// Minimum delay between requests in milliseconds.
    pub rate_limit_ms: u64,
    /// Identifying `User-Agent` sent with every request, as required by
    /// the public instance's usage policy.
    pub user_agent: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    30
}

impl NominatimConfig {
    /// Returns the compiled-in configuration.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (this is a compile-time
    /// guarantee since the config is embedded).
    #[must_use]
    pub fn embedded() -> Self {
        toml::de::from_str(NOMINATIM_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse geocoding service 'nominatim': {e}"))
    }

    /// Returns the compiled-in configuration with environment overrides
    /// applied. Unparseable overrides are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::embedded();

        if let Ok(url) = std::env::var("NOMINATIM_URL")
            && !url.trim().is_empty()
        {
            config.base_url = url.trim().to_string();
        }

        if let Ok(raw) = std::env::var("GEOCODER_RATE_LIMIT_MS") {
            match raw.trim().parse() {
                Ok(ms) => config.rate_limit_ms = ms,
                Err(e) => log::warn!("Ignoring GEOCODER_RATE_LIMIT_MS={raw:?}: {e}"),
            }
        }

        config
    }

    /// Minimum delay between requests.
    #[must_use]
    pub const fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
