//! # Request Metrics
//!
//! In-process request counters using atomics. Client and server errors are
//! counted apart so operators can tell bad callers from a struggling prover.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;
use utoipa::ToSchema;

/// Shared metrics state.
#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    request_count: Arc<AtomicU64>,
    client_error_count: Arc<AtomicU64>,
    server_error_count: Arc<AtomicU64>,
}

/// Snapshot of [`ApiMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub client_errors: u64,
    pub server_errors: u64,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn client_errors(&self) -> u64 {
        self.client_error_count.load(Ordering::Relaxed)
    }

    pub fn server_errors(&self) -> u64 {
        self.server_error_count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests(),
            client_errors: self.client_errors(),
            server_errors: self.server_errors(),
        }
    }

    fn record(&self, status: axum::http::StatusCode) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        if status.is_client_error() {
            self.client_error_count.fetch_add(1, Ordering::Relaxed);
        } else if status.is_server_error() {
            self.server_error_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Middleware that counts every response by status class.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record(response.status());
    }

    response
}
