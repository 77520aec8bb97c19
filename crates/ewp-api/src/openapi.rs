//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented routes into a single OpenAPI document
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Email Wallet Prover",
        description = "Proof generation service: one endpoint per enabled proof kind, bounded concurrency, structured errors."
    ),
    paths(
        crate::routes::prove::prove,
        crate::routes::health::healthz,
        crate::routes::health::liveness,
        crate::routes::health::readiness,
    ),
    components(schemas(
        crate::routes::prove::ProveRequestBody,
        crate::routes::health::HealthReport,
        crate::dispatcher::DispatcherStats,
        crate::middleware::metrics::MetricsSnapshot,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "prove", description = "Proof generation"),
        (name = "health", description = "Health and readiness"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_proof_and_health_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/prove/{kind}"));
        assert!(paths.iter().any(|p| p.as_str() == "/healthz"));
    }

    #[test]
    fn document_serializes() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        assert!(json.contains("ErrorBody"));
        assert!(json.contains("retryable"));
    }
}
