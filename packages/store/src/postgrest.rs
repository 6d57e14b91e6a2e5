//! [`RecordStore`] over a hosted `PostgREST` endpoint (Supabase).
//!
//! Rows live in a single table (`unclaimed_properties` by default) under
//! `{SUPABASE_URL}/rest/v1/`. Filters use `PostgREST` operator syntax
//! (`col=eq.x`, `col=ilike.*x*`, `or=(...)`), counts use
//! `Prefer: count=exact` and read the total from `Content-Range`.

use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use unclaimed_property_models::{
    GeocodingStatus, GeocodingUpdate, NewPropertyRecord, PropertyRecord, SearchFilters,
};

use crate::{RecordStore, StoreError};

/// Default table name.
pub const DEFAULT_TABLE: &str = "unclaimed_properties";

/// Page size used when reading full projections.
///
/// Hosted `PostgREST` caps responses at 1000 rows by default.
const PROJECTION_PAGE: usize = 1000;

/// Filter selecting records that still need geocoding.
const NEEDS_GEOCODING_FILTER: &str =
    "(geocoding_status.is.null,geocoding_status.eq.pending,geocoding_status.eq.failed)";

/// Connection settings for the hosted table.
#[derive(Debug, Clone)]
pub struct PostgrestConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Anonymous (or service) API key.
    pub api_key: String,
    /// Table name.
    pub table: String,
}

impl PostgrestConfig {
    /// Reads `SUPABASE_URL`, `SUPABASE_ANON_KEY` and optionally
    /// `SUPABASE_TABLE` from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL or key is missing.
    pub fn from_env() -> Result<Self, StoreError> {
        let url = required_env("SUPABASE_URL")?;
        let api_key = required_env("SUPABASE_ANON_KEY")?;
        let table = std::env::var("SUPABASE_TABLE")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TABLE.to_string());

        Ok(Self {
            url,
            api_key,
            table,
        })
    }

    /// The REST endpoint for the table.
    #[must_use]
    pub fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), self.table)
    }
}

fn required_env(name: &str) -> Result<String, StoreError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| StoreError::Config {
            message: format!("Missing {name} environment variable"),
        })
}

/// A [`RecordStore`] backed by a hosted `PostgREST` table.
#[derive(Debug, Clone)]
pub struct PostgrestStore {
    client: reqwest::Client,
    table_url: String,
}

impl PostgrestStore {
    /// Creates a store for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the API key is not a valid header value or
    /// the HTTP client cannot be built.
    pub fn new(config: &PostgrestConfig) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key).map_err(|e| StoreError::Config {
            message: format!("Invalid API key: {e}"),
        })?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key)).map_err(|e| {
            StoreError::Config {
                message: format!("Invalid API key: {e}"),
            }
        })?;
        headers.insert("apikey", key);
        headers.insert(reqwest::header::AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            table_url: config.table_url(),
        })
    }

    /// Creates a store from environment configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if required variables are missing.
    pub fn connect_from_env() -> Result<Self, StoreError> {
        let config = PostgrestConfig::from_env()?;
        log::info!("Using record store at {}", config.table_url());
        Self::new(&config)
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        params: &[(String, String)],
    ) -> Result<Vec<T>, StoreError> {
        let resp = self.client.get(&self.table_url).query(params).send().await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }

    async fn count(&self, params: &[(String, String)]) -> Result<u64, StoreError> {
        let resp = self
            .client
            .head(&self.table_url)
            .query(params)
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let resp = ensure_success(resp).await?;

        let range = resp
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StoreError::Conversion {
                message: "Count response has no Content-Range header".to_string(),
            })?;
        parse_content_range_total(range)
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Status { status, body })
}

/// Extracts the total from a `Content-Range` value such as `0-24/3573`
/// or `*/0`.
fn parse_content_range_total(range: &str) -> Result<u64, StoreError> {
    range
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse().ok())
        .ok_or_else(|| StoreError::Conversion {
            message: format!("Unparseable Content-Range: {range:?}"),
        })
}

fn param(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

/// Builds the JSON body for a geocoding update. Unresolved coordinates are
/// omitted so previously stored values survive.
fn update_body(update: &GeocodingUpdate) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    body.insert(
        "geocoding_status".to_string(),
        serde_json::Value::from(update.status.as_ref()),
    );
    body.insert(
        "geocoded_at".to_string(),
        serde_json::Value::from(update.geocoded_at.to_rfc3339()),
    );
    if let Some(owner) = update.owner {
        body.insert("owner_latitude".to_string(), owner.latitude.into());
        body.insert("owner_longitude".to_string(), owner.longitude.into());
    }
    if let Some(holder) = update.holder {
        body.insert("holder_latitude".to_string(), holder.latitude.into());
        body.insert("holder_longitude".to_string(), holder.longitude.into());
    }
    serde_json::Value::Object(body)
}

/// Builds `PostgREST` query parameters for a property search.
fn search_params(filters: &SearchFilters, limit: usize) -> Vec<(String, String)> {
    let mut params = vec![param("select", "*")];

    for (column, needle) in filters.text_filters() {
        // `*` is PostgREST's URL-safe stand-in for `%`.
        let needle = needle.replace(['*', '%'], "");
        params.push(param(column, format!("ilike.*{needle}*")));
    }
    if let Some(min) = filters.min_amount {
        params.push(param("current_cash_balance", format!("gte.{min}")));
    }
    if let Some(max) = filters.max_amount {
        params.push(param("current_cash_balance", format!("lte.{max}")));
    }

    params.push(param("order", "created_at.desc"));
    params.push(param("limit", limit.to_string()));
    params
}

#[derive(Deserialize)]
struct StatusRow {
    geocoding_status: Option<String>,
}

#[async_trait]
impl RecordStore for PostgrestStore {
    async fn fetch_needing_geocoding(
        &self,
        limit: usize,
    ) -> Result<Vec<PropertyRecord>, StoreError> {
        self.get_rows(&[
            param("select", "*"),
            param("or", NEEDS_GEOCODING_FILTER),
            param("limit", limit.to_string()),
        ])
        .await
    }

    async fn update_geocoding(
        &self,
        id: &str,
        update: &GeocodingUpdate,
    ) -> Result<(), StoreError> {
        let resp = self
            .client
            .patch(&self.table_url)
            .query(&[param("id", format!("eq.{id}")), param("select", "id")])
            .header("Prefer", "return=representation")
            .json(&update_body(update))
            .send()
            .await?;
        let resp = ensure_success(resp).await?;

        let updated: Vec<serde_json::Value> = resp.json().await?;
        if updated.is_empty() {
            return Err(StoreError::MissingRecord { id: id.to_string() });
        }
        Ok(())
    }

    async fn count_all(&self) -> Result<u64, StoreError> {
        self.count(&[param("select", "id")]).await
    }

    async fn geocoding_statuses(&self) -> Result<Vec<GeocodingStatus>, StoreError> {
        let mut statuses = Vec::new();
        let mut offset = 0usize;

        loop {
            let rows: Vec<StatusRow> = self
                .get_rows(&[
                    param("select", "geocoding_status"),
                    param("geocoding_status", "not.is.null"),
                    param("order", "id"),
                    param("limit", PROJECTION_PAGE.to_string()),
                    param("offset", offset.to_string()),
                ])
                .await?;
            let fetched = rows.len();

            for row in rows {
                let Some(raw) = row.geocoding_status else {
                    continue;
                };
                match raw.parse::<GeocodingStatus>() {
                    Ok(status) => statuses.push(status),
                    Err(_) => log::debug!("Ignoring unknown geocoding status {raw:?}"),
                }
            }

            if fetched < PROJECTION_PAGE {
                break;
            }
            offset += fetched;
        }

        Ok(statuses)
    }

    async fn count_missing_owner_coordinates(&self) -> Result<u64, StoreError> {
        self.count(&[
            param("select", "id"),
            param("or", "(owner_latitude.is.null,owner_longitude.is.null)"),
        ])
        .await
    }

    async fn search(
        &self,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<PropertyRecord>, StoreError> {
        self.get_rows(&search_params(filters, limit)).await
    }

    async fn geocoded(&self, limit: usize) -> Result<Vec<PropertyRecord>, StoreError> {
        self.get_rows(&[
            param("select", "*"),
            param("owner_latitude", "not.is.null"),
            param("owner_longitude", "not.is.null"),
            param("order", "current_cash_balance.desc"),
            param("limit", limit.to_string()),
        ])
        .await
    }

    async fn insert_batch(&self, records: &[NewPropertyRecord]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let resp = self
            .client
            .post(&self.table_url)
            .header("Prefer", "return=minimal")
            .json(records)
            .send()
            .await?;
        ensure_success(resp).await?;

        Ok(records.len() as u64)
    }
}
