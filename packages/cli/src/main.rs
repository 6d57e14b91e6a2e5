#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the unclaimed property tools.
//!
//! Every command talks to the hosted property table configured by
//! `SUPABASE_URL` / `SUPABASE_ANON_KEY`. Geocoding uses the embedded
//! Nominatim settings, overridable via `NOMINATIM_URL` and
//! `GEOCODER_RATE_LIMIT_MS`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use unclaimed_cli_utils::{IndicatifProgress, MultiProgress, init_logger, spinner};
use unclaimed_geocoder::{AddressResolver, NominatimConfig};
use unclaimed_pipeline::{DEFAULT_PAGE_SIZE, GeocodingController};
use unclaimed_property_models::{PropertyRecord, SearchFilters};
use unclaimed_store::{DEFAULT_LIST_LIMIT, PostgrestStore, RecordStore};

#[derive(Parser)]
#[command(name = "unclaimed", about = "Unclaimed property import, search and geocoding")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a semicolon-delimited CSV export
    Import {
        /// Path to the CSV file
        file: PathBuf,
    },
    /// Search property records
    Search {
        /// Owner name contains
        #[arg(long)]
        owner_name: Option<String>,
        /// Owner city contains
        #[arg(long)]
        owner_city: Option<String>,
        /// Owner state contains
        #[arg(long)]
        owner_state: Option<String>,
        /// Property type contains
        #[arg(long)]
        property_type: Option<String>,
        /// Holder name contains
        #[arg(long)]
        holder_name: Option<String>,
        /// Minimum current cash balance
        #[arg(long)]
        min_amount: Option<f64>,
        /// Maximum current cash balance
        #[arg(long)]
        max_amount: Option<f64>,
        /// Maximum number of rows to print
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },
    /// Geocode one page of records that are missing coordinates.
    /// Press Ctrl-C to stop after the current record.
    Geocode {
        /// Number of records to geocode
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: usize,
    },
    /// Show geocoding statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = init_logger();
    let cli = Cli::parse();

    let store: Arc<dyn RecordStore> = Arc::new(PostgrestStore::connect_from_env()?);

    match cli.command {
        Commands::Import { file } => {
            let text = tokio::fs::read_to_string(&file).await?;
            let bar = spinner(&multi, &format!("Importing {}", file.display()));
            let result = unclaimed_import::import_csv(store.as_ref(), &text).await;
            bar.finish_and_clear();

            let summary = result?;
            println!("Imported {} records", summary.inserted);
            if !summary.errors.is_empty() {
                println!("{} rows skipped:", summary.errors.len());
                for error in &summary.errors {
                    println!("  {error}");
                }
            }
        }
        Commands::Search {
            owner_name,
            owner_city,
            owner_state,
            property_type,
            holder_name,
            min_amount,
            max_amount,
            limit,
        } => {
            let filters = SearchFilters {
                owner_name,
                owner_city,
                owner_state,
                property_type,
                holder_name,
                min_amount,
                max_amount,
            };
            let records = store.search(&filters, limit).await?;
            print_records(&records);
        }
        Commands::Geocode { limit } => {
            geocode(&multi, store, limit).await?;
        }
        Commands::Stats => {
            let stats = unclaimed_pipeline::compute_stats(store.as_ref()).await?;
            println!("Total records:     {}", stats.total);
            println!("Geocoded:          {}", stats.geocoded);
            println!("Pending:           {}", stats.pending);
            println!("Failed:            {}", stats.failed);
            println!("Missing owner location: {}", stats.null_coordinates);
        }
    }

    Ok(())
}

async fn geocode(
    multi: &MultiProgress,
    store: Arc<dyn RecordStore>,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = AddressResolver::nominatim(&NominatimConfig::from_env())?;
    let controller = GeocodingController::new(store, Arc::new(resolver));

    let handle = controller.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping after the current record");
            handle.stop();
        }
    });

    let bar = IndicatifProgress::geocoding_bar(multi, "Geocoding");
    let last = controller.run(limit, Some(bar)).await?;

    println!(
        "Processed {}/{} records: {} geocoded, {} failed",
        last.processed, last.total, last.successful, last.failed
    );

    Ok(())
}

fn print_records(records: &[PropertyRecord]) {
    println!(
        "{:<14} {:<32} {:<20} {:<6} {:>12}",
        "PROPERTY ID", "OWNER", "CITY", "STATE", "BALANCE"
    );
    println!("{}", "-".repeat(88));
    for record in records {
        println!(
            "{:<14} {:<32} {:<20} {:<6} {:>12.2}",
            record.property_id.as_deref().unwrap_or_default(),
            truncate(record.owner_name.as_deref().unwrap_or_default(), 32),
            truncate(record.owner_city.as_deref().unwrap_or_default(), 20),
            record.owner_state.as_deref().unwrap_or_default(),
            record.current_cash_balance.unwrap_or_default(),
        );
    }
    println!("{} records", records.len());
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
