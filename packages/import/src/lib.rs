#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CSV import of unclaimed property records.
//!
//! The state controller's export is semicolon-delimited with an upper-case
//! header row (`PROPERTY_ID;PROPERTY_TYPE;...`). Rows are parsed into
//! [`CsvRecord`]s, validated, converted to [`NewPropertyRecord`]s, and
//! inserted in batches. Imported rows start with no geocoding status, so
//! the next geocoding run picks them up.

pub mod convert;

use serde::{Deserialize, Serialize};
use unclaimed_property_models::NewPropertyRecord;
use unclaimed_store::{RecordStore, StoreError};

pub use convert::{parse_decimal, parse_int, to_new_record, validate};

/// Number of records sent per insert request.
pub const INSERT_BATCH_SIZE: usize = 100;

/// Errors that can occur while importing a CSV file.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The file could not be read as CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The file has a header but no usable rows.
    #[error("No valid records found in CSV file")]
    NoRecords,

    /// Every row failed validation.
    #[error("No valid records to import ({} rows rejected)", .errors.len())]
    NoValidRecords {
        /// One message per rejected row.
        errors: Vec<String>,
    },

    /// A batch insert failed. Earlier batches stay inserted.
    #[error("Import failed after inserting {inserted} records: {source}")]
    Insert {
        /// Records inserted before the failure.
        inserted: u64,
        /// The store failure.
        source: StoreError,
    },
}

/// One data row, keyed by the export's column names.
///
/// Columns missing from the header are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct CsvRecord {
    pub property_id: String,
    pub property_type: String,
    pub cash_reported: String,
    pub shares_reported: String,
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
    pub current_cash_balance: String,
    pub number_of_pending_claims: String,
    pub number_of_paid_claims: String,
    pub holder_name: String,
    pub holder_street_1: String,
    pub holder_street_2: String,
    pub holder_street_3: String,
    pub holder_city: String,
    pub holder_state: String,
    pub holder_zip: String,
    pub cusip: String,
}

/// Outcome of a completed import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Records inserted.
    pub inserted: u64,
    /// One message per row rejected by validation.
    pub errors: Vec<String>,
}

/// Parses semicolon-delimited text into records.
///
/// The first row is the header. Headers and values are trimmed. Quotes
/// are ordinary characters, so every line is exactly one row. Rows whose
/// field count differs from the header are skipped.
///
/// # Errors
///
/// Returns [`ImportError::Csv`] if the text is not readable as CSV.
pub fn parse_csv(text: &str) -> Result<Vec<CsvRecord>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .quoting(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.trim().as_bytes());

    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    let mut skipped = 0_usize;

    for result in reader.records() {
        let row = result?;
        if row.len() != headers.len() {
            skipped += 1;
            continue;
        }
        records.push(row.deserialize::<CsvRecord>(Some(&headers))?);
    }

    if skipped > 0 {
        log::debug!("Skipped {skipped} rows with a mismatched field count");
    }
    log::info!("Parsed {} records from CSV", records.len());

    Ok(records)
}

/// Parses, validates and inserts every valid row of `text`.
///
/// # Errors
///
/// * [`ImportError::Csv`] if the text is not readable as CSV.
/// * [`ImportError::NoRecords`] if no row could be parsed.
/// * [`ImportError::NoValidRecords`] if every row failed validation.
/// * [`ImportError::Insert`] if a batch insert fails.
pub async fn import_csv(store: &dyn RecordStore, text: &str) -> Result<ImportSummary, ImportError> {
    let records = parse_csv(text)?;
    if records.is_empty() {
        return Err(ImportError::NoRecords);
    }

    let mut valid: Vec<NewPropertyRecord> = Vec::with_capacity(records.len());
    let mut errors = Vec::new();

    for record in &records {
        let problems = validate(record);
        if problems.is_empty() {
            valid.push(to_new_record(record));
        } else {
            errors.push(format!(
                "Row with Property ID {}: {}",
                record.property_id,
                problems.join(", ")
            ));
        }
    }

    if valid.is_empty() {
        return Err(ImportError::NoValidRecords { errors });
    }

    if !errors.is_empty() {
        log::warn!("{} rows failed validation", errors.len());
    }

    let mut inserted = 0;
    for batch in valid.chunks(INSERT_BATCH_SIZE) {
        match store.insert_batch(batch).await {
            Ok(count) => {
                inserted += count;
                log::debug!("Inserted {inserted}/{} records", valid.len());
            }
            Err(source) => {
                log::error!("Batch insert failed after {inserted} records: {source}");
                return Err(ImportError::Insert { inserted, source });
            }
        }
    }

    log::info!("Imported {inserted} records");

    Ok(ImportSummary { inserted, errors })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use unclaimed_property_models::{
        GeocodingStatus, GeocodingUpdate, PropertyRecord, SearchFilters,
    };
    use unclaimed_store::MemoryStore;

    use super::*;

    const HEADER: &str = concat!(
        "PROPERTY_ID;PROPERTY_TYPE;CASH_REPORTED;OWNER_NAME;OWNER_CITY;OWNER_STATE;",
        "CURRENT_CASH_BALANCE;NUMBER_OF_PAID_CLAIMS"
    );

    fn csv_with(rows: &[&str]) -> String {
        let mut text = HEADER.to_string();
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    #[test]
    fn parses_trimmed_semicolon_rows() {
        let text = csv_with(&[
            " 123 ; CK15 ; $1,234.50 ; JANE DOE ; SACRAMENTO ; CA ; 1234.50 ; 2 ",
        ]);
        let records = parse_csv(&text).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.property_id, "123");
        assert_eq!(record.owner_name, "JANE DOE");
        assert_eq!(record.cash_reported, "$1,234.50");
        assert_eq!(record.holder_name, "");
    }

    #[test]
    fn skips_rows_with_wrong_field_count() {
        let text = csv_with(&[
            "1;CK15;10;A;B;CA;10;0",
            "2;CK15;10;A;B",
            "3;CK15;10;A;B;CA;10;0;extra",
            "4;CK15;10;A;B;CA;10;0",
        ]);
        let ids: Vec<String> = parse_csv(&text)
            .unwrap()
            .into_iter()
            .map(|r| r.property_id)
            .collect();
        assert_eq!(ids, ["1", "4"]);
    }

    #[test]
    fn stray_quotes_stay_within_their_line() {
        let text = csv_with(&[
            "1;CK15;10;\"DOC\" SMITH;B;CA;10;0",
            "2;CK15;10;\"ACME;B;CA;10;0",
            "3;CK15;10;JANE DOE;B;CA;10;0",
            "4;CK15;10;JOHN ROE;B;CA;10;0",
        ]);
        let records = parse_csv(&text).unwrap();

        let ids: Vec<&str> = records.iter().map(|r| r.property_id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3", "4"]);
        let names: Vec<&str> = records.iter().map(|r| r.owner_name.as_str()).collect();
        assert_eq!(names, ["\"DOC\" SMITH", "\"ACME", "JANE DOE", "JOHN ROE"]);
    }

    #[test]
    fn header_only_parses_to_nothing() {
        assert!(parse_csv(HEADER).unwrap().is_empty());
        assert!(parse_csv("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn imports_valid_rows_and_reports_invalid_ones() {
        let store = MemoryStore::new();
        let text = csv_with(&[
            "1;CK15;10;JANE DOE;SACRAMENTO;CA;10;0",
            ";CK15;10;;SACRAMENTO;CA;10;0",
            "3;;10;JOHN ROE;FRESNO;CA;10;0",
        ]);

        let summary = import_csv(&store, &text).await.unwrap();

        assert_eq!(summary.inserted, 1);
        assert_eq!(
            summary.errors,
            vec![
                "Row with Property ID : Property ID is required, Owner name is required"
                    .to_string(),
                "Row with Property ID 3: Property type is required".to_string(),
            ]
        );

        let rows = store.records();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].owner_name.as_deref(), Some("JANE DOE"));
        assert_eq!(rows[0].current_cash_balance, Some(10.0));
        assert!(rows[0].geocoding_status.is_none());
    }

    #[tokio::test]
    async fn empty_file_is_no_records() {
        let store = MemoryStore::new();
        assert!(matches!(
            import_csv(&store, HEADER).await,
            Err(ImportError::NoRecords)
        ));
    }

    #[tokio::test]
    async fn all_invalid_is_no_valid_records() {
        let store = MemoryStore::new();
        let text = csv_with(&[";;;;;;;"]);
        match import_csv(&store, &text).await {
            Err(ImportError::NoValidRecords { errors }) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn inserts_in_batches_of_one_hundred() {
        let store = CountingStore::default();
        let rows: Vec<String> = (0..250)
            .map(|i| format!("{i};CK15;1;OWNER {i};CITY;CA;1;0"))
            .collect();
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();

        let summary = import_csv(&store, &csv_with(&rows)).await.unwrap();

        assert_eq!(summary.inserted, 250);
        assert!(summary.errors.is_empty());
        assert_eq!(store.batches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_batch_reports_what_was_inserted() {
        let store = CountingStore {
            fail_on_batch: Some(2),
            ..Default::default()
        };
        let rows: Vec<String> = (0..250)
            .map(|i| format!("{i};CK15;1;OWNER {i};CITY;CA;1;0"))
            .collect();
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();

        match import_csv(&store, &csv_with(&rows)).await {
            Err(ImportError::Insert { inserted, .. }) => assert_eq!(inserted, 100),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(store.inner.records().len(), 100);
    }

    /// Counts insert calls and can fail the n-th (1-based) batch.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        batches: AtomicUsize,
        fail_on_batch: Option<usize>,
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        async fn fetch_needing_geocoding(
            &self,
            limit: usize,
        ) -> Result<Vec<PropertyRecord>, StoreError> {
            self.inner.fetch_needing_geocoding(limit).await
        }

        async fn update_geocoding(
            &self,
            id: &str,
            update: &GeocodingUpdate,
        ) -> Result<(), StoreError> {
            self.inner.update_geocoding(id, update).await
        }

        async fn count_all(&self) -> Result<u64, StoreError> {
            self.inner.count_all().await
        }

        async fn geocoding_statuses(&self) -> Result<Vec<GeocodingStatus>, StoreError> {
            self.inner.geocoding_statuses().await
        }

        async fn count_missing_owner_coordinates(&self) -> Result<u64, StoreError> {
            self.inner.count_missing_owner_coordinates().await
        }

        async fn search(
            &self,
            filters: &SearchFilters,
            limit: usize,
        ) -> Result<Vec<PropertyRecord>, StoreError> {
            self.inner.search(filters, limit).await
        }

        async fn geocoded(&self, limit: usize) -> Result<Vec<PropertyRecord>, StoreError> {
            self.inner.geocoded(limit).await
        }

        async fn insert_batch(
            &self,
            records: &[NewPropertyRecord],
        ) -> Result<u64, StoreError> {
            let batch = self.batches.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_batch == Some(batch) {
                return Err(StoreError::Conversion {
                    message: "insert rejected".to_string(),
                });
            }
            self.inner.insert_batch(records).await
        }
    }
}
