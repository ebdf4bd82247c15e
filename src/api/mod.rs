//! Local HTTP API for driving scans from other tools.
//! Start/stop a scan, read collected records, harvest thumbnails, and follow
//! progress over WebSocket.

pub mod ws;

use crate::scan::{harvest, DirectorySink, HarvestReport, PhotoRecord, ScanStatus};
use crate::state::AppState;
use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub type ApiState = Arc<AppState>;

type ApiResult<T> = Result<T, (StatusCode, String)>;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// API key authentication middleware.
/// Skips authentication for GET /api/health so callers can probe the server.
async fn api_key_auth(
    State(expected_key): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if request.uri().path() == "/api/health" {
        return Ok(next.run(request).await);
    }
    let provided = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok());
    match provided {
        Some(k) if k == expected_key => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

fn error_body(status: StatusCode, code: &str, message: impl Into<String>) -> (StatusCode, String) {
    (
        status,
        serde_json::json!({ "error": code, "message": message.into() }).to_string(),
    )
}

fn scan_running() -> (StatusCode, String) {
    error_body(StatusCode::CONFLICT, "scan_running", "A scan is already running")
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/scan", post(start_scan))
        .route("/api/stop", post(stop_scan))
        .route("/api/records", get(list_records).delete(clear_records))
        .route("/api/harvest", post(start_harvest))
        // WebSocket (real-time events)
        .route("/api/ws", get(ws::ws_handler))
        // Utility
        .route("/api/health", get(health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Health and status
// ---------------------------------------------------------------------------

async fn health() -> &'static str {
    "ok"
}

async fn status(State(state): State<ApiState>) -> Json<ScanStatus> {
    Json(state.scan.status())
}

// ---------------------------------------------------------------------------
// Scan control
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    /// Overrides `[scan] max_items` for this run.
    pub max_items: Option<u32>,
}

async fn start_scan(
    State(state): State<ApiState>,
    body: Option<Json<ScanRequest>>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    if state.scan.is_running() {
        return Err(scan_running());
    }

    let mut scan_config = state.config.read().scan.clone();
    if let Some(max_items) = body.and_then(|Json(req)| req.max_items) {
        if max_items == 0 {
            return Err(error_body(
                StatusCode::BAD_REQUEST,
                "invalid_max_items",
                "max_items must be at least 1",
            ));
        }
        scan_config.max_items = max_items;
    }
    let max_items = scan_config.max_items;

    let orchestrator = state.orchestrator(scan_config).await;
    state.broadcast_ws(ws::WsEvent::ScanStarted { max_items });

    let task_state = state.clone();
    tokio::spawn(async move {
        let event = match orchestrator.run().await {
            Ok(outcome) => ws::WsEvent::ScanFinished {
                outcome: Some(outcome),
                error: None,
            },
            Err(e) => ws::WsEvent::ScanFinished {
                outcome: None,
                error: Some(e.to_string()),
            },
        };
        task_state.broadcast_ws(event);
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "started": true, "max_items": max_items })),
    ))
}

async fn stop_scan(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let running = state.scan.is_running();
    if running {
        state.scan.request_stop();
    }
    Json(serde_json::json!({ "stopping": running }))
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOrder {
    /// Newest first, as displayed
    #[default]
    Newest,
    Processing,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordsQuery {
    #[serde(default)]
    pub order: RecordOrder,
}

async fn list_records(
    State(state): State<ApiState>,
    Query(query): Query<RecordsQuery>,
) -> Json<Vec<PhotoRecord>> {
    Json(match query.order {
        RecordOrder::Newest => state.scan.display_order(),
        RecordOrder::Processing => state.scan.records(),
    })
}

async fn clear_records(State(state): State<ApiState>) -> StatusCode {
    state.scan.clear_records();
    state.broadcast_ws(ws::WsEvent::RecordsCleared);
    StatusCode::NO_CONTENT
}

// ---------------------------------------------------------------------------
// Thumbnail harvest
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct HarvestRequest {
    pub output_dir: Option<PathBuf>,
    pub jitter: Option<bool>,
}

async fn start_harvest(
    State(state): State<ApiState>,
    body: Option<Json<HarvestRequest>>,
) -> ApiResult<Json<HarvestReport>> {
    // Harvest reads the same page the scan is steering.
    if state.scan.is_running() {
        return Err(scan_running());
    }

    let req = body.map(|Json(req)| req).unwrap_or_default();
    let defaults = state.config.read().harvest.clone();
    let sink = DirectorySink::new(req.output_dir.unwrap_or(defaults.output_dir));
    let jitter = req.jitter.unwrap_or(defaults.jitter);

    let report = harvest(state.view.as_ref(), state.fetcher.as_ref(), &sink, jitter)
        .await
        .map_err(|e| error_body(StatusCode::INTERNAL_SERVER_ERROR, "harvest_failed", e.to_string()))?;
    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Build the full API app (router + optional API key auth + CORS).
/// Used by run_server and by integration tests to exercise API key middleware.
pub fn app(state: ApiState, api_key: Option<String>) -> Router {
    use tower::limit::ConcurrencyLimitLayer;
    let base_router = router(state);
    if let Some(key) = api_key {
        base_router.route_layer(middleware::from_fn_with_state(key, api_key_auth))
    } else {
        base_router
    }
    .layer(ConcurrencyLimitLayer::new(32))
    .layer(
        tower_http::cors::CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::DELETE,
            ])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::HeaderName::from_static("x-api-key"),
            ]),
    )
}

pub async fn run_server(state: ApiState, port: u16, api_key: Option<String>) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .map_err(|e| format!("Failed to bind API port {}: {}", port, e))?;

    let heartbeat = state.ws_broadcaster.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            interval.tick().await;
            heartbeat.broadcast(ws::WsEvent::Heartbeat);
        }
    });

    let app = app(state, api_key);
    tracing::info!("phAI API listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}
