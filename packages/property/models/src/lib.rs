#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Unclaimed property record types and geocoding bookkeeping.
//!
//! This crate defines the shapes shared by every other crate in the
//! workspace: the stored [`PropertyRecord`], the [`NewPropertyRecord`]
//! produced by CSV import, the partial [`GeocodingUpdate`] written back by
//! the batch geocoder, and the [`ProgressSnapshot`] / [`GeocodingStats`]
//! values shown to operators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Country assumed when an owner record has no country code, and always
/// used for holder addresses.
pub const DEFAULT_COUNTRY_CODE: &str = "US";

/// Geocoding lifecycle of a single property record.
///
/// The "unset" state is represented by `Option::None` wherever a status
/// is stored, matching a `NULL` column in the hosted table.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GeocodingStatus {
    /// Queued for geocoding but not yet attempted.
    Pending,
    /// Picked up by a running batch.
    Processing,
    /// At least one of the owner or holder addresses resolved.
    Completed,
    /// Neither address resolved, or the result could not be stored.
    Failed,
}

impl GeocodingStatus {
    /// Statuses (besides unset) that make a record eligible for the next
    /// batch. Failed records are retried; there is no permanent blacklist.
    pub const RETRYABLE: &'static [Self] = &[Self::Pending, Self::Failed];

    /// Returns `true` if a record with the given status should be picked
    /// up by the next geocoding batch.
    #[must_use]
    pub fn needs_geocoding(status: Option<Self>) -> bool {
        status.is_none_or(|s| Self::RETRYABLE.contains(&s))
    }
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
}

/// A postal address in the loose form stored on property records.
///
/// Every component is optional; the geocoder decides whether enough of
/// them are present to be worth a lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostalAddress {
    /// First street line.
    pub street: Option<String>,
    /// City name.
    pub city: Option<String>,
    /// State or region.
    pub state: Option<String>,
    /// ZIP / postal code.
    pub postal_code: Option<String>,
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: Option<String>,
}

/// An unclaimed property record as stored in the hosted table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    /// Opaque primary key assigned by the store.
    pub id: String,
    /// State-assigned property identifier. Not unique across rows.
    #[serde(default)]
    pub property_id: Option<String>,
    /// Property type code (e.g. `"CK15"`).
    #[serde(default)]
    pub property_type: Option<String>,
    /// Cash amount originally reported by the holder.
    #[serde(default)]
    pub cash_reported: Option<f64>,
    /// Number of shares originally reported.
    #[serde(default)]
    pub shares_reported: Option<f64>,
    /// Name of reported securities, if any.
    #[serde(default)]
    pub name_of_securities_reported: Option<String>,
    /// Number of owners, as free text.
    #[serde(default)]
    pub no_of_owners: Option<String>,
    /// Owner name.
    #[serde(default)]
    pub owner_name: Option<String>,
    /// Owner street line 1.
    #[serde(default)]
    pub owner_street_1: Option<String>,
    /// Owner street line 2.
    #[serde(default)]
    pub owner_street_2: Option<String>,
    /// Owner street line 3.
    #[serde(default)]
    pub owner_street_3: Option<String>,
    /// Owner city.
    #[serde(default)]
    pub owner_city: Option<String>,
    /// Owner state.
    #[serde(default)]
    pub owner_state: Option<String>,
    /// Owner ZIP code.
    #[serde(default)]
    pub owner_zip: Option<String>,
    /// Owner country code.
    #[serde(default)]
    pub owner_country_code: Option<String>,
    /// Current unclaimed cash balance.
    #[serde(default)]
    pub current_cash_balance: Option<f64>,
    /// Claims filed but not yet paid.
    #[serde(default)]
    pub number_of_pending_claims: Option<i64>,
    /// Claims already paid.
    #[serde(default)]
    pub number_of_paid_claims: Option<i64>,
    /// Reporting holder (bank, insurer, employer, ...).
    #[serde(default)]
    pub holder_name: Option<String>,
    /// Holder street line 1.
    #[serde(default)]
    pub holder_street_1: Option<String>,
    /// Holder street line 2.
    #[serde(default)]
    pub holder_street_2: Option<String>,
    /// Holder street line 3.
    #[serde(default)]
    pub holder_street_3: Option<String>,
    /// Holder city.
    #[serde(default)]
    pub holder_city: Option<String>,
    /// Holder state.
    #[serde(default)]
    pub holder_state: Option<String>,
    /// Holder ZIP code.
    #[serde(default)]
    pub holder_zip: Option<String>,
    /// CUSIP identifier for securities.
    #[serde(default)]
    pub cusip: Option<String>,
    /// Geocoded owner latitude.
    #[serde(default)]
    pub owner_latitude: Option<f64>,
    /// Geocoded owner longitude.
    #[serde(default)]
    pub owner_longitude: Option<f64>,
    /// Geocoded holder latitude.
    #[serde(default)]
    pub holder_latitude: Option<f64>,
    /// Geocoded holder longitude.
    #[serde(default)]
    pub holder_longitude: Option<f64>,
    /// When the record was last geocoded.
    #[serde(default)]
    pub geocoded_at: Option<DateTime<Utc>>,
    /// Geocoding lifecycle state; `None` means never queued.
    #[serde(default)]
    pub geocoding_status: Option<GeocodingStatus>,
    /// Row creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Row update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PropertyRecord {
    /// The owner's address. A blank country falls back to
    /// [`DEFAULT_COUNTRY_CODE`].
    #[must_use]
    pub fn owner_address(&self) -> PostalAddress {
        let country = self
            .owner_country_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_COUNTRY_CODE);

        PostalAddress {
            street: self.owner_street_1.clone(),
            city: self.owner_city.clone(),
            state: self.owner_state.clone(),
            postal_code: self.owner_zip.clone(),
            country_code: Some(country.to_string()),
        }
    }

    /// The holder's address. Holders are always domestic.
    #[must_use]
    pub fn holder_address(&self) -> PostalAddress {
        PostalAddress {
            street: self.holder_street_1.clone(),
            city: self.holder_city.clone(),
            state: self.holder_state.clone(),
            postal_code: self.holder_zip.clone(),
            country_code: Some(DEFAULT_COUNTRY_CODE.to_string()),
        }
    }

    /// Owner coordinates, if both halves are present.
    #[must_use]
    pub const fn owner_coordinates(&self) -> Option<Coordinates> {
        match (self.owner_latitude, self.owner_longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    /// Holder coordinates, if both halves are present.
    #[must_use]
    pub const fn holder_coordinates(&self) -> Option<Coordinates> {
        match (self.holder_latitude, self.holder_longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    /// Applies a geocoding update in place. Coordinates that were not
    /// resolved are left untouched.
    pub fn apply(&mut self, update: &GeocodingUpdate) {
        if let Some(owner) = update.owner {
            self.owner_latitude = Some(owner.latitude);
            self.owner_longitude = Some(owner.longitude);
        }
        if let Some(holder) = update.holder {
            self.holder_latitude = Some(holder.latitude);
            self.holder_longitude = Some(holder.longitude);
        }
        self.geocoding_status = Some(update.status);
        self.geocoded_at = Some(update.geocoded_at);
    }
}

/// A property record ready for insertion, as produced by CSV import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPropertyRecord {
    pub property_id: String,
    pub property_type: String,
    pub cash_reported: f64,
    pub shares_reported: f64,
    pub name_of_securities_reported: String,
    pub no_of_owners: String,
    pub owner_name: String,
    pub owner_street_1: String,
    pub owner_street_2: String,
    pub owner_street_3: String,
    pub owner_city: String,
    pub owner_state: String,
    pub owner_zip: String,
    pub owner_country_code: String,
    pub current_cash_balance: f64,
    pub number_of_pending_claims: i64,
    pub number_of_paid_claims: i64,
    pub holder_name: String,
    pub holder_street_1: String,
    pub holder_street_2: String,
    pub holder_street_3: String,
    pub holder_city: String,
    pub holder_state: String,
    pub holder_zip: String,
    pub cusip: String,
}

/// Partial field set written back to a record after one geocoding attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeocodingUpdate {
    /// Resolved owner coordinates, if any.
    pub owner: Option<Coordinates>,
    /// Resolved holder coordinates, if any.
    pub holder: Option<Coordinates>,
    /// Final status for this attempt.
    pub status: GeocodingStatus,
    /// When the attempt started.
    pub geocoded_at: DateTime<Utc>,
}

impl GeocodingUpdate {
    /// Builds an update from the two resolution outcomes, deriving the
    /// status: `Completed` if either side resolved, else `Failed`.
    #[must_use]
    pub fn from_outcomes(
        owner: Option<Coordinates>,
        holder: Option<Coordinates>,
        geocoded_at: DateTime<Utc>,
    ) -> Self {
        let status = if owner.is_some() || holder.is_some() {
            GeocodingStatus::Completed
        } else {
            GeocodingStatus::Failed
        };

        Self {
            owner,
            holder,
            status,
            geocoded_at,
        }
    }
}

/// Search criteria for the property listing.
///
/// Text filters are case-insensitive substring matches; amounts bound
/// `current_cash_balance` inclusively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub owner_name: Option<String>,
    pub owner_city: Option<String>,
    pub owner_state: Option<String>,
    pub property_type: Option<String>,
    pub holder_name: Option<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

impl SearchFilters {
    /// Returns the non-blank text filters as `(column, needle)` pairs.
    #[must_use]
    pub fn text_filters(&self) -> Vec<(&'static str, &str)> {
        [
            ("owner_name", self.owner_name.as_deref()),
            ("owner_city", self.owner_city.as_deref()),
            ("owner_state", self.owner_state.as_deref()),
            ("property_type", self.property_type.as_deref()),
            ("holder_name", self.holder_name.as_deref()),
        ]
        .into_iter()
        .filter_map(|(column, value)| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (column, v))
        })
        .collect()
    }
}

/// Aggregate geocoding counts for display.
///
/// `geocoded`, `pending` and `failed` only count records with a non-null
/// status, so they need not sum to `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodingStats {
    /// Every record in the table.
    pub total: u64,
    /// Records with status `completed`.
    pub geocoded: u64,
    /// Records with status `pending` or `processing`.
    pub pending: u64,
    /// Records with status `failed`.
    pub failed: u64,
    /// Records missing owner latitude or owner longitude.
    pub null_coordinates: u64,
}

/// Progress of the current (or last) batch geocoding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Records in the page being processed.
    pub total: u64,
    /// Records finished so far.
    pub processed: u64,
    /// Records that ended `completed` and were stored.
    pub successful: u64,
    /// Records that ended `failed` or could not be stored.
    pub failed: u64,
    /// Whether the run is still going.
    pub is_running: bool,
}
