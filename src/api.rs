//! HTTP API handlers for Airwatch.
//!
//! All state mutation goes through the shared [`Monitor`] behind a mutex, so
//! a manual check, a scheduled refresh and a position-watch cycle can never
//! interleave mid-pipeline.
//!
//! Fetch failures map to distinct status codes:
//!
//! - no place or coordinates to look up: `400 Bad Request`
//! - provider rejection or transport failure: `502 Bad Gateway`
//! - provider answered but carried no usable value: `404 Not Found`

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::error::FetchError;
use crate::model::{AlertRecord, LocationState, NotificationPermission, ReadingResponse};
use crate::orchestrator::{FetchSource, Monitor, Target};
use crate::ranking::{CityRankingAggregator, RankingSnapshot};
use crate::scheduler::{AutoRefreshScheduler, RefreshStatus};
use crate::storage::StoredReading;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Mutex<Monitor>>,
    pub scheduler: Arc<Mutex<AutoRefreshScheduler>>,
    pub ranking: CityRankingAggregator,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/check", post(post_check))
        .route("/status", get(get_status))
        .route("/history", get(get_history))
        .route("/history/stored", get(get_stored_history))
        .route("/alerts", get(get_alerts))
        .route("/settings", post(post_settings))
        .route("/refresh", post(post_refresh).get(get_refresh))
        .route("/ranking", get(get_ranking))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON error body for failed requests.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn fetch_error_response(e: FetchError) -> (StatusCode, Json<ErrorBody>) {
    let status = match e {
        FetchError::MissingTarget => StatusCode::BAD_REQUEST,
        FetchError::Provider(_) => StatusCode::BAD_GATEWAY,
        FetchError::NoData => StatusCode::NOT_FOUND,
    };
    (status, Json(ErrorBody { error: e.to_string() }))
}

/// Request body for POST /check.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// Place name to check. Omitted or blank means "my current location".
    #[serde(default)]
    pub city: Option<String>,
}

/// Response body for POST /check and the reading half of GET /status.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub reading: ReadingResponse,
    pub location: LocationState,
}

/// POST /check - Run one reading cycle, manually.
///
/// # Request Body
///
/// ```json
/// { "city": "shanghai" }
/// ```
///
/// With `city` omitted or blank, the current resolved coordinates are used.
/// Returns `400` when neither is available.
#[instrument(skip(state))]
pub async fn post_check(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, (StatusCode, Json<ErrorBody>)> {
    let city = request.city.unwrap_or_default();
    let mut monitor = state.monitor.lock().await;

    match monitor
        .fetch_reading(Target::City(city.clone()), FetchSource::Manual, Utc::now())
        .await
    {
        Ok(reading) => {
            info!(value = reading.value, label = %reading.label, "Manual check succeeded");
            Ok(Json(CheckResponse {
                reading: ReadingResponse::from(&reading),
                location: monitor.resolver.state().clone(),
            }))
        }
        Err(e) => {
            warn!(city = %city, error = %e, "Manual check failed");
            Err(fetch_error_response(e))
        }
    }
}

/// Response body for GET /status.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub location: LocationState,
    pub reading: Option<ReadingResponse>,
    pub threshold: i64,
    pub notification_permission: NotificationPermission,
}

/// GET /status - Current location state, latest reading and settings.
#[instrument(skip(state))]
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let monitor = state.monitor.lock().await;
    Json(StatusResponse {
        location: monitor.resolver.state().clone(),
        reading: monitor.last_reading().map(ReadingResponse::from),
        threshold: monitor.threshold(),
        notification_permission: monitor.permission(),
    })
}

/// GET /history - Recent readings, newest first.
#[instrument(skip(state))]
pub async fn get_history(State(state): State<AppState>) -> Json<Vec<ReadingResponse>> {
    let monitor = state.monitor.lock().await;
    Json(monitor.history().iter().map(ReadingResponse::from).collect())
}

/// Query parameters for GET /history/stored.
#[derive(Debug, Deserialize)]
pub struct StoredHistoryQuery {
    /// Maximum rows to return (default: 20).
    #[serde(default = "default_stored_limit")]
    pub limit: u32,
}

fn default_stored_limit() -> u32 {
    20
}

/// GET /history/stored - Persisted readings, newest first.
///
/// Unlike GET /history this survives restarts; it reads from the database
/// log rather than the in-memory window.
#[instrument(skip(state))]
pub async fn get_stored_history(
    State(state): State<AppState>,
    Query(query): Query<StoredHistoryQuery>,
) -> Result<Json<Vec<StoredReading>>, StatusCode> {
    let monitor = state.monitor.lock().await;
    match monitor.stored_history(query.limit).await {
        Ok(rows) => Ok(Json(rows)),
        Err(e) => {
            warn!(error = %e, "Failed to read stored history");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /alerts - Delivered alerts, newest first.
#[instrument(skip(state))]
pub async fn get_alerts(State(state): State<AppState>) -> Json<Vec<AlertRecord>> {
    let monitor = state.monitor.lock().await;
    Json(monitor.alert_records().to_vec())
}

/// Request body for POST /settings. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub threshold: Option<i64>,
    pub notification_permission: Option<NotificationPermission>,
}

/// Response body for POST /settings: the settings now in force.
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub threshold: i64,
    pub notification_permission: NotificationPermission,
}

/// POST /settings - Update the alert threshold and notification permission.
///
/// # Request Body
///
/// ```json
/// { "threshold": 100, "notification_permission": "granted" }
/// ```
#[instrument(skip(state))]
pub async fn post_settings(
    State(state): State<AppState>,
    Json(request): Json<SettingsRequest>,
) -> Json<SettingsResponse> {
    let mut monitor = state.monitor.lock().await;
    if let Some(threshold) = request.threshold {
        monitor.set_threshold(threshold);
    }
    if let Some(permission) = request.notification_permission {
        monitor.set_permission(permission);
    }
    info!(
        threshold = monitor.threshold(),
        permission = ?monitor.permission(),
        "Settings updated"
    );
    Json(SettingsResponse {
        threshold: monitor.threshold(),
        notification_permission: monitor.permission(),
    })
}

/// Request body for POST /refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub enabled: bool,
    /// Minutes between automatic cycles; clamped to at least 1. Defaults
    /// to 10 when omitted.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

fn default_interval_minutes() -> u64 {
    10
}

/// POST /refresh - Enable or disable periodic automatic refresh.
#[instrument(skip(state))]
pub async fn post_refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Json<RefreshStatus> {
    let mut scheduler = state.scheduler.lock().await;
    scheduler.configure(request.enabled, request.interval_minutes);
    info!(
        enabled = request.enabled,
        interval_minutes = request.interval_minutes,
        "Automatic refresh reconfigured"
    );
    Json(scheduler.status())
}

/// GET /refresh - Current automatic-refresh state.
#[instrument(skip(state))]
pub async fn get_refresh(State(state): State<AppState>) -> Json<RefreshStatus> {
    let scheduler = state.scheduler.lock().await;
    Json(scheduler.status())
}

/// GET /ranking - Fetch and rank the reference cities, cleanest first.
///
/// Cities whose fetch fails are dropped from the ranking; the endpoint only
/// fails if it cannot be served at all.
#[instrument(skip(state))]
pub async fn get_ranking(State(state): State<AppState>) -> Json<RankingSnapshot> {
    let snapshot = state.ranking.refresh().await;
    info!(city_count = snapshot.cities.len(), "Ranking refreshed");
    Json(snapshot)
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
