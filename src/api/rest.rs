// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`.  `POST /api/v1/scan` runs a scan to
// completion and answers with its result; a request that is superseded by a
// newer scan while waiting gets 409.
//
// CORS is configured permissively; the scanner exposes no secrets.
// =============================================================================

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::scanner::{ScanError, ScanResult};

type ApiError = (StatusCode, Json<serde_json::Value>);

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/config", get(config))
        .route("/api/v1/scan", post(run_scan))
        .route("/api/v1/scan/latest", get(latest_scan))
        .route("/api/v1/scan/status", get(scan_status))
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

fn error_body(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Configuration
// =============================================================================

async fn config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config.clone())
}

// =============================================================================
// Scans
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct ScanBody {
    #[serde(default)]
    timeframe: Option<String>,
    #[serde(default)]
    quote_suffix: Option<String>,
}

/// An empty body scans with the configured defaults.
async fn run_scan(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ScanResult>, ApiError> {
    let body: ScanBody = if body.iter().all(u8::is_ascii_whitespace) {
        ScanBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            error_body(StatusCode::BAD_REQUEST, format!("invalid scan request: {e}"))
        })?
    };

    let request = state
        .resolve_request(body.timeframe, body.quote_suffix)
        .map_err(|e| error_body(StatusCode::BAD_REQUEST, e.to_string()))?;

    info!(
        timeframe = %request.timeframe,
        quote_suffix = %request.quote_suffix,
        "scan requested via API"
    );

    match state.run_scan(request).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            let status = match &e {
                ScanError::Cancelled => StatusCode::CONFLICT,
                ScanError::UniverseUnavailable(_) => StatusCode::BAD_GATEWAY,
                ScanError::TaskFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!(error = %e, status = status.as_u16(), "scan request did not complete");
            Err(error_body(status, e.to_string()))
        }
    }
}

async fn latest_scan(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScanResult>, ApiError> {
    state
        .latest_result()
        .map(Json)
        .ok_or_else(|| error_body(StatusCode::NOT_FOUND, "no scan has completed yet"))
}

async fn scan_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.status())
}
