//! Query construction from loosely-populated postal addresses.
//!
//! Property records are full of blanks: an owner may have only a city, a
//! holder may have nothing at all. A lookup is only worth a request when
//! at least two components survive trimming.

use unclaimed_property_models::{DEFAULT_COUNTRY_CODE, PostalAddress};

/// Minimum number of non-empty components (country included) required to
/// attempt a lookup.
pub const MIN_ADDRESS_PARTS: usize = 2;

/// A normalized free-form geocoding query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeQuery {
    /// Non-empty components joined with `", "`.
    pub text: String,
    /// Lowercased ISO country code used to restrict matches.
    pub country_code: String,
}

impl GeocodeQuery {
    /// Builds a query from the address, or `None` when fewer than
    /// [`MIN_ADDRESS_PARTS`] components are non-empty.
    #[must_use]
    pub fn from_address(address: &PostalAddress) -> Option<Self> {
        let parts: Vec<&str> = [
            address.street.as_deref(),
            address.city.as_deref(),
            address.state.as_deref(),
            address.postal_code.as_deref(),
            address.country_code.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

        if parts.len() < MIN_ADDRESS_PARTS {
            return None;
        }

        let country_code = address
            .country_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_COUNTRY_CODE)
            .to_lowercase();

        Some(Self {
            text: parts.join(", "),
            country_code,
        })
    }
}
