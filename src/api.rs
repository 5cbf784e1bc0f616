//! ==============================================================================
//! api.rs - http api
//! ==============================================================================
//!
//! endpoints:
//!     GET  /api/sensor/latest    newest reading from the cache (404 before any)
//!     GET  /api/sensor/all       recent readings, ?limit=N (default 50)
//!     GET  /api/sensor/summary   max/min/avg temperature, max humidity, extremes
//!     POST /api/pompa            {"status": "ON" | "OFF"} -> iot/pompa
//!
//! every error body is json with a `message`; storage and transport failures
//! also carry the underlying `error`. cors is open to any origin.
//!
//! ==============================================================================

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::domain::{LatestReading, PumpCommand, RecentReadings, Summary};
use crate::error::{StorageError, TransportError, ValidationError};
use crate::pump::{CommandRelay, RelayError};
use crate::query::QueryService;

pub const NO_DATA_MESSAGE: &str = "No sensor data available yet";

#[derive(Clone)]
pub struct ApiState {
    pub queries: QueryService,
    pub relay: CommandRelay,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/sensor/latest", get(latest_handler))
        .route("/api/sensor/all", get(all_handler))
        .route("/api/sensor/summary", get(summary_handler))
        .route("/api/pompa", post(pump_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// bind `listen` and serve until `shutdown` resolves
pub async fn serve<F>(listen: &str, state: ApiState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!("Server running on http://{}", listener.local_addr()?);
    info!("   - GET  /api/sensor/latest   (real-time data)");
    info!("   - GET  /api/sensor/all      (recent records)");
    info!("   - GET  /api/sensor/summary  (historical summary)");
    info!("   - POST /api/pompa           (pump control)");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ==============================================================================
// errors
// ==============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound(&'static str),
    Validation(ValidationError),
    Storage(StorageError),
    Transport(TransportError),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Validation(e) => Self::Validation(e),
            RelayError::Transport(e) => Self::Transport(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "message": message })),
            Self::Validation(e) => (StatusCode::BAD_REQUEST, json!({ "message": e.to_string() })),
            Self::Storage(e) => {
                error!(error = %e, "Storage failure while serving request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Server error", "error": e.to_string() }),
                )
            }
            Self::Transport(e) => {
                warn!(error = %e, "Pump command not accepted by the broker client");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({ "message": "Command channel unavailable", "error": e.to_string() }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

// ==============================================================================
// handlers
// ==============================================================================

async fn latest_handler(State(state): State<ApiState>) -> Result<Json<LatestReading>, ApiError> {
    state
        .queries
        .latest()
        .await
        .map(Json)
        .ok_or(ApiError::NotFound(NO_DATA_MESSAGE))
}

/// kept as a string so `?limit=abc` falls back to the default instead of a 400
#[derive(Deserialize)]
struct AllParams {
    limit: Option<String>,
}

async fn all_handler(
    State(state): State<ApiState>,
    Query(params): Query<AllParams>,
) -> Result<Json<RecentReadings>, ApiError> {
    Ok(Json(state.queries.all(params.limit.as_deref()).await?))
}

async fn summary_handler(State(state): State<ApiState>) -> Result<Json<Summary>, ApiError> {
    Ok(Json(state.queries.summary().await?))
}

#[derive(Deserialize)]
struct PumpRequest {
    status: Option<Value>,
}

#[derive(Serialize)]
struct PumpResponse {
    message: String,
    status: PumpCommand,
}

async fn pump_handler(
    State(state): State<ApiState>,
    body: Result<Json<PumpRequest>, JsonRejection>,
) -> Result<Json<PumpResponse>, ApiError> {
    let Json(request) =
        body.map_err(|e| ApiError::Validation(ValidationError::Body(e.body_text())))?;

    // a missing or non-string status is just another invalid status
    let status = request.status.as_ref().and_then(Value::as_str).unwrap_or_default();
    let command = state.relay.relay(status)?;

    Ok(Json(PumpResponse {
        message: format!("Pompa turned {command}"),
        status: command,
    }))
}
