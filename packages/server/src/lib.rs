#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the unclaimed property map.
//!
//! Serves property search and map listings from the hosted table, accepts
//! CSV uploads, and drives the batch geocoder. One
//! [`GeocodingController`] is shared by every worker, so at most one
//! geocoding run exists per process and all progress polls observe it.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use unclaimed_geocoder::{AddressResolver, NominatimConfig};
use unclaimed_pipeline::GeocodingController;
use unclaimed_store::{PostgrestStore, RecordStore};

/// Shared application state.
pub struct AppState {
    /// Property table.
    pub store: Arc<dyn RecordStore>,
    /// The process-wide geocoding controller.
    pub controller: GeocodingController,
    /// Bearer token required by admin routes. Admin routes are open when
    /// unset.
    pub admin_token: Option<String>,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        resolver: Arc<AddressResolver>,
        admin_token: Option<String>,
    ) -> Self {
        Self {
            controller: GeocodingController::new(Arc::clone(&store), resolver),
            store,
            admin_token,
        }
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/properties", web::get().to(handlers::properties))
            .route(
                "/properties/geocoded",
                web::get().to(handlers::geocoded_properties),
            )
            .route("/import", web::post().to(handlers::import))
            .route("/geocoding/start", web::post().to(handlers::start_geocoding))
            .route("/geocoding/stop", web::post().to(handlers::stop_geocoding))
            .route(
                "/geocoding/progress",
                web::get().to(handlers::geocoding_progress),
            )
            .route("/geocoding/stats", web::get().to(handlers::geocoding_stats)),
    );
}

/// Starts the API server.
///
/// Reads the store settings (`SUPABASE_URL`, `SUPABASE_ANON_KEY`,
/// `SUPABASE_TABLE`), geocoder overrides (`NOMINATIM_URL`,
/// `GEOCODER_RATE_LIMIT_MS`), `ADMIN_TOKEN`, and the listen address
/// (`BIND_ADDR`, `PORT`) from the environment.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if the store is not configured or the geocoding HTTP client
/// cannot be built.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Configuring record store...");
    let store = PostgrestStore::connect_from_env().expect("Failed to configure record store");

    let geocoder_config = NominatimConfig::from_env();
    log::info!(
        "Geocoding via {} ({}ms between requests)",
        geocoder_config.base_url,
        geocoder_config.rate_limit_ms
    );
    let resolver =
        AddressResolver::nominatim(&geocoder_config).expect("Failed to build geocoding client");

    let admin_token = std::env::var("ADMIN_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());
    if admin_token.is_none() {
        log::warn!("ADMIN_TOKEN is not set; admin routes are open");
    }

    let state = web::Data::new(AppState::new(
        Arc::new(store),
        Arc::new(resolver),
        admin_token,
    ));

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(handlers::MAX_IMPORT_BYTES))
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
