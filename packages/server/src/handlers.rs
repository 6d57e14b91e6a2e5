//! HTTP handler functions for the unclaimed property API.

use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, http::header, web};
use unclaimed_import::ImportError;
use unclaimed_pipeline::{DEFAULT_PAGE_SIZE, LogProgress, PipelineError};
use unclaimed_server_models::{
    ApiError, ApiGeocodingStarted, ApiGeocodingStopped, ApiHealth, ApiMapProperty,
    PropertyQueryParams, StartGeocodingRequest,
};
use unclaimed_store::DEFAULT_LIST_LIMIT;

use crate::AppState;

/// Largest accepted CSV upload.
pub const MAX_IMPORT_BYTES: usize = 64 * 1024 * 1024;

fn error(message: impl Into<String>) -> ApiError {
    ApiError::new(message)
}

/// Checks the bearer token on admin routes.
fn authorize(req: &HttpRequest, state: &AppState) -> Result<(), HttpResponse> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Ok(());
    };

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if provided == Some(expected) {
        Ok(())
    } else {
        Err(HttpResponse::Unauthorized().json(error("Unauthorized")))
    }
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/properties`
///
/// Searches records, newest first.
pub async fn properties(
    state: web::Data<AppState>,
    params: web::Query<PropertyQueryParams>,
) -> HttpResponse {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(DEFAULT_LIST_LIMIT);

    match state.store.search(&params.filters(), limit).await {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(e) => {
            log::error!("Failed to search properties: {e}");
            HttpResponse::InternalServerError().json(error("Failed to search properties"))
        }
    }
}

/// `GET /api/properties/geocoded`
///
/// Records with owner coordinates, largest balance first.
pub async fn geocoded_properties(state: web::Data<AppState>) -> HttpResponse {
    match state.store.geocoded(DEFAULT_LIST_LIMIT).await {
        Ok(records) => {
            let markers: Vec<ApiMapProperty> = records
                .into_iter()
                .filter_map(ApiMapProperty::from_record)
                .collect();
            HttpResponse::Ok().json(markers)
        }
        Err(e) => {
            log::error!("Failed to query geocoded properties: {e}");
            HttpResponse::InternalServerError()
                .json(error("Failed to query geocoded properties"))
        }
    }
}

/// `POST /api/import`
///
/// Body is the raw semicolon-delimited CSV text.
pub async fn import(req: HttpRequest, state: web::Data<AppState>, body: String) -> HttpResponse {
    if let Err(resp) = authorize(&req, &state) {
        return resp;
    }

    match unclaimed_import::import_csv(state.store.as_ref(), &body).await {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(ImportError::NoValidRecords { errors }) => {
            HttpResponse::BadRequest().json(serde_json::json!({
                "error": "No valid records to import",
                "errors": errors,
            }))
        }
        Err(e @ (ImportError::Csv(_) | ImportError::NoRecords)) => {
            HttpResponse::BadRequest().json(error(e.to_string()))
        }
        Err(ImportError::Insert { inserted, source }) => {
            log::error!("Import failed after {inserted} records: {source}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Import failed after inserting {inserted} records"),
                "inserted": inserted,
            }))
        }
    }
}

/// `POST /api/geocoding/start`
///
/// Fetches the page synchronously so fetch failures are reported to the
/// caller, then processes it in the background. The JSON body is
/// optional; a body that is present must parse.
pub async fn start_geocoding(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> HttpResponse {
    if let Err(resp) = authorize(&req, &state) {
        return resp;
    }

    let request = if body.iter().all(u8::is_ascii_whitespace) {
        StartGeocodingRequest::default()
    } else {
        match serde_json::from_slice::<StartGeocodingRequest>(&body) {
            Ok(request) => request,
            Err(e) => {
                return HttpResponse::BadRequest()
                    .json(error(format!("Invalid request body: {e}")));
            }
        }
    };
    let limit = request.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    match state.controller.start(limit, Some(Arc::new(LogProgress))).await {
        Ok(run) => {
            let total = run.total() as u64;
            actix_rt::spawn(run.process());
            HttpResponse::Accepted().json(ApiGeocodingStarted { total })
        }
        Err(e @ PipelineError::AlreadyRunning) => {
            HttpResponse::Conflict().json(error(e.to_string()))
        }
        Err(e @ PipelineError::PageFetch(_)) => {
            HttpResponse::BadGateway().json(error(e.to_string()))
        }
    }
}

/// `POST /api/geocoding/stop`
pub async fn stop_geocoding(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    if let Err(resp) = authorize(&req, &state) {
        return resp;
    }

    HttpResponse::Ok().json(ApiGeocodingStopped {
        stopped: state.controller.stop(),
    })
}

/// `GET /api/geocoding/progress`
pub async fn geocoding_progress(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.controller.progress())
}

/// `GET /api/geocoding/stats`
pub async fn geocoding_stats(state: web::Data<AppState>) -> HttpResponse {
    match state.controller.stats().await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => {
            log::error!("Failed to compute geocoding stats: {e}");
            HttpResponse::InternalServerError().json(error("Failed to compute geocoding stats"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use actix_web::{App, test};
    use async_trait::async_trait;
    use unclaimed_geocoder::{
        AddressResolver, GeocodeBackend, GeocodeError, GeocodeQuery, GeocodeResult,
    };
    use unclaimed_property_models::{
        GeocodingStats, GeocodingStatus, GeocodingUpdate, NewPropertyRecord, ProgressSnapshot,
        PropertyRecord, SearchFilters,
    };
    use unclaimed_store::{MemoryStore, RecordStore, StoreError};

    use super::*;

    struct AlwaysFound;

    #[async_trait]
    impl GeocodeBackend for AlwaysFound {
        async fn search(
            &self,
            _query: &GeocodeQuery,
        ) -> Result<Option<GeocodeResult>, GeocodeError> {
            Ok(Some(GeocodeResult {
                latitude: 38.5816,
                longitude: -121.4944,
                display_name: "Sacramento".to_string(),
            }))
        }
    }

    /// A store whose every query fails.
    struct DownStore;

    fn down() -> StoreError {
        StoreError::Config {
            message: "store unavailable".to_string(),
        }
    }

    #[async_trait]
    impl RecordStore for DownStore {
        async fn fetch_needing_geocoding(
            &self,
            _limit: usize,
        ) -> Result<Vec<PropertyRecord>, StoreError> {
            Err(down())
        }

        async fn update_geocoding(
            &self,
            _id: &str,
            _update: &GeocodingUpdate,
        ) -> Result<(), StoreError> {
            Err(down())
        }

        async fn count_all(&self) -> Result<u64, StoreError> {
            Err(down())
        }

        async fn geocoding_statuses(&self) -> Result<Vec<GeocodingStatus>, StoreError> {
            Err(down())
        }

        async fn count_missing_owner_coordinates(&self) -> Result<u64, StoreError> {
            Err(down())
        }

        async fn search(
            &self,
            _filters: &SearchFilters,
            _limit: usize,
        ) -> Result<Vec<PropertyRecord>, StoreError> {
            Err(down())
        }

        async fn geocoded(&self, _limit: usize) -> Result<Vec<PropertyRecord>, StoreError> {
            Err(down())
        }

        async fn insert_batch(&self, _records: &[NewPropertyRecord]) -> Result<u64, StoreError> {
            Err(down())
        }
    }

    fn state(store: Arc<dyn RecordStore>, admin_token: Option<&str>) -> web::Data<AppState> {
        let resolver = AddressResolver::new(Arc::new(AlwaysFound), Duration::ZERO);
        web::Data::new(AppState::new(
            store,
            Arc::new(resolver),
            admin_token.map(str::to_string),
        ))
    }

    fn owner(id: &str, name: &str, balance: f64) -> PropertyRecord {
        PropertyRecord {
            id: id.to_string(),
            owner_name: Some(name.to_string()),
            owner_street_1: Some("100 Main St".to_string()),
            owner_city: Some("Sacramento".to_string()),
            owner_state: Some("CA".to_string()),
            current_cash_balance: Some(balance),
            ..Default::default()
        }
    }

    const CSV: &str = "PROPERTY_ID;PROPERTY_TYPE;OWNER_NAME;OWNER_CITY;OWNER_STATE\n\
                       1;CK15;JANE DOE;SACRAMENTO;CA\n\
                       2;CK15;;FRESNO;CA";

    #[actix_web::test]
    async fn health_reports_version() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(MemoryStore::new()), None))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let resp: ApiHealth = test::call_and_read_body_json(&app, req).await;
        assert!(resp.healthy);
        assert_eq!(resp.version, env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn properties_apply_query_filters() {
        let store = Arc::new(MemoryStore::with_records(vec![
            owner("a", "JANE SMITH", 50.0),
            owner("b", "JOHN SMITHERS", 500.0),
            owner("c", "ALEX JONES", 75.0),
        ]));
        let app = test::init_service(
            App::new()
                .app_data(state(store, None))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/properties?ownerName=smith&maxAmount=100")
            .to_request();
        let records: Vec<PropertyRecord> = test::call_and_read_body_json(&app, req).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "a");
    }

    #[actix_web::test]
    async fn geocoded_lists_only_located_owners() {
        let mut located = owner("located", "JANE DOE", 10.0);
        located.owner_latitude = Some(38.58);
        located.owner_longitude = Some(-121.49);
        let store = Arc::new(MemoryStore::with_records(vec![
            owner("missing", "JOHN ROE", 900.0),
            located,
        ]));
        let app = test::init_service(
            App::new()
                .app_data(state(store, None))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/properties/geocoded")
            .to_request();
        let markers: Vec<ApiMapProperty> = test::call_and_read_body_json(&app, req).await;

        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].id, "located");
    }

    #[actix_web::test]
    async fn admin_routes_require_token_when_configured() {
        let store = Arc::new(MemoryStore::new());
        let app = test::init_service(
            App::new()
                .app_data(state(store.clone(), Some("s3cret")))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/import")
            .set_payload(CSV)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);

        let req = test::TestRequest::post()
            .uri("/api/import")
            .insert_header((header::AUTHORIZATION, "Bearer wrong"))
            .set_payload(CSV)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);
        assert!(store.records().is_empty());

        let req = test::TestRequest::post()
            .uri("/api/import")
            .insert_header((header::AUTHORIZATION, "Bearer s3cret"))
            .set_payload(CSV)
            .to_request();
        let summary: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(summary["inserted"], 1);
        assert_eq!(
            summary["errors"][0],
            "Row with Property ID 2: Owner name is required"
        );
        assert_eq!(store.records().len(), 1);
    }

    #[actix_web::test]
    async fn import_without_rows_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(MemoryStore::new()), None))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/import")
            .set_payload("PROPERTY_ID;OWNER_NAME")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: ApiError = test::read_body_json(resp).await;
        assert_eq!(body.error, "No valid records found in CSV file");
    }

    #[actix_web::test]
    async fn start_runs_in_background_and_rejects_overlap() {
        let store = Arc::new(MemoryStore::with_records(vec![
            owner("1", "JANE DOE", 10.0),
            owner("2", "JOHN ROE", 20.0),
        ]));
        let state = state(store.clone(), None);
        let controller = state.controller.clone();
        let app = test::init_service(App::new().app_data(state).configure(crate::configure)).await;

        // Hold the running state so the HTTP start overlaps it.
        let held = controller.start(1, None).await.unwrap();
        let req = test::TestRequest::post()
            .uri("/api/geocoding/start")
            .set_json(StartGeocodingRequest { limit: Some(2) })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 409);
        let body: ApiError = test::read_body_json(resp).await;
        assert_eq!(body.error, "Geocoding is already running");
        drop(held);

        let mut rx = controller.subscribe();
        let req = test::TestRequest::post()
            .uri("/api/geocoding/start")
            .set_json(StartGeocodingRequest { limit: Some(2) })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 202);
        let started: ApiGeocodingStarted = test::read_body_json(resp).await;
        assert_eq!(started.total, 2);

        let last = *rx.wait_for(|s| !s.is_running && s.total > 0).await.unwrap();
        assert_eq!(last.successful, 2);

        let req = test::TestRequest::get()
            .uri("/api/geocoding/progress")
            .to_request();
        let progress: ProgressSnapshot = test::call_and_read_body_json(&app, req).await;
        assert_eq!(progress, last);

        let req = test::TestRequest::get()
            .uri("/api/geocoding/stats")
            .to_request();
        let stats: GeocodingStats = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.geocoded, 2);
        assert_eq!(stats.null_coordinates, 0);
    }

    #[actix_web::test]
    async fn start_reports_page_fetch_failure() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(DownStore), None))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/geocoding/start")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 502);

        let req = test::TestRequest::get()
            .uri("/api/geocoding/stats")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 500);

        let req = test::TestRequest::get().uri("/api/properties").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 500);
    }

    #[actix_web::test]
    async fn start_rejects_malformed_body() {
        let store = MemoryStore::with_records(vec![owner("1", "JANE DOE", 10.0)]);
        let state = state(Arc::new(store), None);
        let controller = state.controller.clone();
        let app = test::init_service(App::new().app_data(state).configure(crate::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/geocoding/start")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload(r#"{"limit":"abc"}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: ApiError = test::read_body_json(resp).await;
        assert!(body.error.starts_with("Invalid request body"));

        assert!(!controller.is_running());
        assert_eq!(controller.progress(), ProgressSnapshot::default());
    }

    #[actix_web::test]
    async fn stop_when_idle_reports_nothing_stopped() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(MemoryStore::new()), None))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/geocoding/stop")
            .to_request();
        let body: ApiGeocodingStopped = test::call_and_read_body_json(&app, req).await;
        assert!(!body.stopped);
    }
}
