//! Nominatim / `OpenStreetMap` geocoder client.
//!
//! Nominatim has strict rate limits: **1 request per second** maximum on
//! the public instance, and every request must carry an identifying
//! `User-Agent`. Pacing is handled by
//! [`AddressResolver`](crate::AddressResolver); this client only issues
//! requests.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use async_trait::async_trait;

use crate::{GeocodeBackend, GeocodeError, GeocodeQuery, GeocodeResult, NominatimConfig};

/// HTTP client for a Nominatim search endpoint.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimClient {
    /// Builds a client with the configured `User-Agent` and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the underlying client cannot be
    /// constructed.
    pub fn new(config: &NominatimConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl GeocodeBackend for NominatimClient {
    async fn search(&self, query: &GeocodeQuery) -> Result<Option<GeocodeResult>, GeocodeError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query.text.as_str()),
                ("format", "json"),
                ("limit", "1"),
                ("countrycodes", query.country_code.as_str()),
                ("addressdetails", "1"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeocodeError::Status { status });
        }

        let body: serde_json::Value = resp.json().await?;
        parse_response(&body)
    }
}

/// Parses a Nominatim JSON response, taking the first match.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodeResult>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let latitude = first["lat"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lat in Nominatim response".to_string(),
        })?;

    let longitude = first["lon"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lon in Nominatim response".to_string(),
        })?;

    let display_name = first["display_name"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    Ok(Some(GeocodeResult {
        latitude,
        longitude,
        display_name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_result() {
        let body = serde_json::json!([{
            "lat": "38.5816",
            "lon": "-121.4944",
            "display_name": "Main Street, Sacramento, California, United States"
        }]);
        let result = parse_response(&body).unwrap().unwrap();
        assert!((result.latitude - 38.5816).abs() < 1e-4);
        assert!((result.longitude - -121.4944).abs() < 1e-4);
        assert!(result.display_name.starts_with("Main Street"));
    }

    #[test]
    fn takes_first_of_several() {
        let body = serde_json::json!([
            { "lat": "1.0", "lon": "2.0", "display_name": "first" },
            { "lat": "3.0", "lon": "4.0", "display_name": "second" }
        ]);
        let result = parse_response(&body).unwrap().unwrap();
        assert_eq!(result.display_name, "first");
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn rejects_non_array() {
        let body = serde_json::json!({ "error": "Unable to geocode" });
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_numeric_coordinates() {
        let body = serde_json::json!([{ "lat": 38.5, "lon": "-121.4" }]);
        assert!(parse_response(&body).is_err());
    }

    #[test]
    fn builds_client_from_embedded_config() {
        let client = NominatimClient::new(&NominatimConfig::embedded()).unwrap();
        assert!(client.base_url.contains("nominatim"));
    }
}
