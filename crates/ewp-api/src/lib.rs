//! # ewp-api: Proof Generation Service
//!
//! Accepts witness payloads for a fixed set of proof kinds, attaches a fresh
//! nonce, runs the proof backend under bounded concurrency, and returns the
//! artifact verbatim.
//!
//! ## API Surface
//!
//! | Route                       | Module              | Purpose                    |
//! |-----------------------------|---------------------|----------------------------|
//! | `POST /prove/<kind>`        | [`routes::prove`]   | Proof generation           |
//! | `GET /healthz`              | [`routes::health`]  | Service report             |
//! | `GET /health/liveness`      | [`routes::health`]  | Liveness probe             |
//! | `GET /health/readiness`     | [`routes::health`]  | Readiness probe            |
//! | `GET /openapi.json`         | [`openapi`]         | OpenAPI document           |
//!
//! ## Request Flow
//!
//! ```text
//! HTTP ─► RequestRouter (validate) ─► NonceSource ─► JobDispatcher ─► ProofBackend
//!                                                        │
//!                              slot pool, admission, timeout, orphan tracking
//! ```
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → CorsLayer → MetricsMiddleware → BodyLimit → Handler
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod router;
pub mod routes;
pub mod service;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::http::Uri;
use axum::middleware::from_fn;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Paths outside the route table land on the JSON 404 fallback; disabled
/// kinds are refused with the same body by the proof handler.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.body_limit;
    let metrics = state.metrics.clone();

    Router::new()
        .merge(routes::prove::router())
        .merge(routes::health::router())
        .merge(openapi::router())
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(axum::Extension(metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}
