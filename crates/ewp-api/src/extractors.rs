//! # Body Extraction
//!
//! Maps Axum's JSON rejections onto [`AppError`] so every malformed body
//! gets the same error envelope as a validation failure.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;

use crate::error::AppError;

/// Extract a JSON body.
///
/// Oversized bodies become [`AppError::PayloadTooLarge`]; anything else the
/// extractor refuses (bad syntax, wrong content type) becomes
/// [`AppError::InvalidRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result.map(|Json(v)| v).map_err(|err| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::InvalidRequest(err.body_text())
        }
    })
}
