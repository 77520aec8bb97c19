//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps service and dispatcher errors to HTTP status codes and a JSON body
//! carrying a machine-readable code, a message, and a retry hint.
//!
//! Client-caused failures are 4xx and never retryable as-is. Capacity and
//! timeout failures are 503/504 and retryable. Backend failures are 500 and
//! carry the backend's diagnostic.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::dispatcher::DispatchError;
use crate::service::ServiceError;

/// Seconds suggested in `Retry-After` on a 503.
pub const RETRY_AFTER_SECS: u64 = 1;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "INVALID_REQUEST", "TIMEOUT").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Whether the same request may succeed if retried later.
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed body or envelope (400).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown or disabled route (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Body exceeds the configured limit (413).
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Every slot is busy and the job could not be queued (503).
    #[error("{0}")]
    Overloaded(String),

    /// The service is shutting down (503).
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The job did not finish in time (504).
    #[error("{0}")]
    Timeout(String),

    /// The backend reported a failure (500). The diagnostic is returned.
    #[error("{0}")]
    ProofGenerationFailed(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            Self::Overloaded(_) => (StatusCode::SERVICE_UNAVAILABLE, "OVERLOADED"),
            Self::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            Self::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            Self::ProofGenerationFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PROOF_GENERATION_FAILED",
            ),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Overloaded(_) | Self::Timeout(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                retryable: self.is_retryable(),
                details: None,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(&self, Self::Overloaded(_) | Self::Unavailable(_)) {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(RETRY_AFTER_SECS),
            );
        }
        response
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Overloaded => Self::Overloaded(err.to_string()),
            DispatchError::Timeout(_) => Self::Timeout(err.to_string()),
            DispatchError::ProofGenerationFailed(_) => Self::ProofGenerationFailed(err.to_string()),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidRequest(msg) => Self::InvalidRequest(msg),
            ServiceError::KindDisabled(kind) => Self::NotFound(kind.route_path()),
            ServiceError::Dispatch(e) => e.into(),
        }
    }
}
