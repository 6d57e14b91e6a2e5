//! In-process [`RecordStore`] backed by a `Vec`.
//!
//! Mirrors the hosted table's semantics closely enough to exercise the
//! geocoding pipeline, stats, search and import without a network:
//! insertion order is the natural order, text filters are
//! case-insensitive substring matches, and ids are random UUIDs.

use std::cmp::Ordering;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use unclaimed_property_models::{
    GeocodingStatus, GeocodingUpdate, NewPropertyRecord, PropertyRecord, SearchFilters,
};

use crate::{RecordStore, StoreError};

/// A [`RecordStore`] that keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<PropertyRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `records`, kept in the given
    /// order.
    #[must_use]
    pub const fn with_records(records: Vec<PropertyRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Returns a copy of every record.
    #[must_use]
    pub fn records(&self) -> Vec<PropertyRecord> {
        self.lock().clone()
    }

    /// Returns a copy of the record with the given id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<PropertyRecord> {
        self.lock().iter().find(|r| r.id == id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PropertyRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}

fn text_value<'a>(record: &'a PropertyRecord, column: &str) -> Option<&'a str> {
    match column {
        "owner_name" => record.owner_name.as_deref(),
        "owner_city" => record.owner_city.as_deref(),
        "owner_state" => record.owner_state.as_deref(),
        "property_type" => record.property_type.as_deref(),
        "holder_name" => record.holder_name.as_deref(),
        _ => None,
    }
}

fn matches_filters(record: &PropertyRecord, filters: &SearchFilters) -> bool {
    let text_ok = filters
        .text_filters()
        .into_iter()
        .all(|(column, needle)| contains_ignore_case(text_value(record, column), needle));

    let balance = record.current_cash_balance;
    let min_ok = filters
        .min_amount
        .is_none_or(|min| balance.is_some_and(|b| b >= min));
    let max_ok = filters
        .max_amount
        .is_none_or(|max| balance.is_some_and(|b| b <= max));

    text_ok && min_ok && max_ok
}

fn to_record(new: &NewPropertyRecord) -> PropertyRecord {
    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    let now = Utc::now();
    PropertyRecord {
        id: uuid::Uuid::new_v4().to_string(),
        property_id: some(&new.property_id),
        property_type: some(&new.property_type),
        cash_reported: Some(new.cash_reported),
        shares_reported: Some(new.shares_reported),
        name_of_securities_reported: some(&new.name_of_securities_reported),
        no_of_owners: some(&new.no_of_owners),
        owner_name: some(&new.owner_name),
        owner_street_1: some(&new.owner_street_1),
        owner_street_2: some(&new.owner_street_2),
        owner_street_3: some(&new.owner_street_3),
        owner_city: some(&new.owner_city),
        owner_state: some(&new.owner_state),
        owner_zip: some(&new.owner_zip),
        owner_country_code: some(&new.owner_country_code),
        current_cash_balance: Some(new.current_cash_balance),
        number_of_pending_claims: Some(new.number_of_pending_claims),
        number_of_paid_claims: Some(new.number_of_paid_claims),
        holder_name: some(&new.holder_name),
        holder_street_1: some(&new.holder_street_1),
        holder_street_2: some(&new.holder_street_2),
        holder_street_3: some(&new.holder_street_3),
        holder_city: some(&new.holder_city),
        holder_state: some(&new.holder_state),
        holder_zip: some(&new.holder_zip),
        cusip: some(&new.cusip),
        created_at: Some(now),
        updated_at: Some(now),
        ..PropertyRecord::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_needing_geocoding(
        &self,
        limit: usize,
    ) -> Result<Vec<PropertyRecord>, StoreError> {
        Ok(self
            .lock()
            .iter()
            .filter(|r| GeocodingStatus::needs_geocoding(r.geocoding_status))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update_geocoding(
        &self,
        id: &str,
        update: &GeocodingUpdate,
    ) -> Result<(), StoreError> {
        let mut records = self.lock();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::MissingRecord { id: id.to_string() })?;
        record.apply(update);
        record.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn count_all(&self) -> Result<u64, StoreError> {
        Ok(self.lock().len() as u64)
    }

    async fn geocoding_statuses(&self) -> Result<Vec<GeocodingStatus>, StoreError> {
        Ok(self
            .lock()
            .iter()
            .filter_map(|r| r.geocoding_status)
            .collect())
    }

    async fn count_missing_owner_coordinates(&self) -> Result<u64, StoreError> {
        Ok(self
            .lock()
            .iter()
            .filter(|r| r.owner_latitude.is_none() || r.owner_longitude.is_none())
            .count() as u64)
    }

    async fn search(
        &self,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<PropertyRecord>, StoreError> {
        let mut found: Vec<PropertyRecord> = self
            .lock()
            .iter()
            .filter(|r| matches_filters(r, filters))
            .cloned()
            .collect();
        // Newest first; records without a timestamp sort last.
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit);
        Ok(found)
    }

    async fn geocoded(&self, limit: usize) -> Result<Vec<PropertyRecord>, StoreError> {
        let mut found: Vec<PropertyRecord> = self
            .lock()
            .iter()
            .filter(|r| r.owner_latitude.is_some() && r.owner_longitude.is_some())
            .cloned()
            .collect();
        found.sort_by(|a, b| match (a.current_cash_balance, b.current_cash_balance) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        found.truncate(limit);
        Ok(found)
    }

    async fn insert_batch(&self, records: &[NewPropertyRecord]) -> Result<u64, StoreError> {
        let mut rows = self.lock();
        rows.extend(records.iter().map(to_record));
        Ok(records.len() as u64)
    }
}
