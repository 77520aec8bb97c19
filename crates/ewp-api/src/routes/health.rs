//! # Health Endpoints
//!
//! `/healthz` reports service identity plus dispatcher load; the
//! `/health/*` probes are the plain-text liveness and readiness checks
//! used by orchestrators.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::dispatcher::DispatcherStats;
use crate::error::AppError;
use crate::middleware::metrics::MetricsSnapshot;
use crate::state::AppState;

/// Body of `GET /healthz`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthReport {
    /// `ok`, or `draining` during shutdown.
    pub status: String,
    pub version: String,
    pub uptime_sec: u64,
    pub started_at: DateTime<Utc>,
    pub backend: String,
    pub enabled_kinds: Vec<String>,
    pub dispatcher: DispatcherStats,
    pub requests: MetricsSnapshot,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
}

/// GET /healthz: Service identity and dispatcher load.
#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "Service report", body = HealthReport)),
    tag = "health"
)]
pub async fn healthz(State(state): State<AppState>) -> Json<HealthReport> {
    let dispatcher = state.dispatcher();
    let status = if dispatcher.is_draining() { "draining" } else { "ok" };
    Json(HealthReport {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_sec: state.uptime_secs(),
        started_at: state.started_at_utc,
        backend: dispatcher.backend_name().to_string(),
        enabled_kinds: state
            .service
            .router()
            .enabled_kinds()
            .iter()
            .map(|k| k.as_str().to_string())
            .collect(),
        dispatcher: dispatcher.stats(),
        requests: state.metrics.snapshot(),
    })
}

/// Liveness probe: always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health/liveness",
    responses((status = 200, description = "Process is running")),
    tag = "health"
)]
pub async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 503 once the dispatcher has started draining.
#[utoipa::path(
    get,
    path = "/health/readiness",
    responses(
        (status = 200, description = "Accepting proof requests"),
        (status = 503, description = "Draining for shutdown", body = crate::error::ErrorBody),
    ),
    tag = "health"
)]
pub async fn readiness(State(state): State<AppState>) -> Result<&'static str, AppError> {
    if state.dispatcher().is_draining() {
        return Err(AppError::Unavailable("draining proof jobs".to_string()));
    }
    Ok("ready")
}
