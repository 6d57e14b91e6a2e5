//! Geocoding statistics over the whole property table.

use unclaimed_property_models::{GeocodingStats, GeocodingStatus};
use unclaimed_store::{RecordStore, StoreError};

/// Buckets record statuses into the display counts.
///
/// `processing` records count as pending. Records whose status is null
/// are never passed in, so they contribute to `total` only.
#[must_use]
pub fn tally(total: u64, statuses: &[GeocodingStatus], null_coordinates: u64) -> GeocodingStats {
    let mut stats = GeocodingStats {
        total,
        null_coordinates,
        ..GeocodingStats::default()
    };

    for status in statuses {
        match status {
            GeocodingStatus::Completed => stats.geocoded += 1,
            GeocodingStatus::Pending | GeocodingStatus::Processing => stats.pending += 1,
            GeocodingStatus::Failed => stats.failed += 1,
        }
    }

    stats
}

/// Queries the store and computes [`GeocodingStats`].
///
/// Read-only; calling it twice without intervening writes yields the same
/// result.
///
/// # Errors
///
/// Returns the first [`StoreError`] raised by any of the underlying
/// queries.
pub async fn compute_stats(store: &dyn RecordStore) -> Result<GeocodingStats, StoreError> {
    let (total, statuses, null_coordinates) = tokio::try_join!(
        store.count_all(),
        store.geocoding_statuses(),
        store.count_missing_owner_coordinates(),
    )?;

    Ok(tally(total, &statuses, null_coordinates))
}
