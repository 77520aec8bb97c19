//! # Proof Endpoints
//!
//! `POST /prove/<kind>`. The path is resolved against the kind registry
//! before the body is read, so disabled and unknown kinds answer 404 without
//! touching the payload or the backend.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::Uri;
use axum::routing::post;
use axum::{Json, Router};
use ewp_zkp::ProofArtifact;
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{AppError, ErrorBody};
use crate::extractors::extract_json;
use crate::state::AppState;

/// Request envelope for every proof endpoint.
#[derive(Debug, ToSchema)]
pub struct ProveRequestBody {
    /// Witness mapping. Its schema belongs to the circuit for the kind.
    #[schema(value_type = Object)]
    pub input: serde_json::Map<String, Value>,
}

/// Build the proof route.
pub fn router() -> Router<AppState> {
    Router::new().route("/prove/{kind}", post(prove))
}

/// POST /prove/{kind}: Generate a proof for the witness in `input`.
#[utoipa::path(
    post,
    path = "/prove/{kind}",
    params(("kind" = String, Path, description = "Enabled proof kind, e.g. `claim`")),
    request_body = ProveRequestBody,
    responses(
        (status = 200, description = "Proof artifact returned by the backend"),
        (status = 400, description = "Malformed body or missing `input`", body = ErrorBody),
        (status = 404, description = "Unknown or disabled proof kind", body = ErrorBody),
        (status = 413, description = "Body exceeds the configured limit", body = ErrorBody),
        (status = 500, description = "Proof generation failed", body = ErrorBody),
        (status = 503, description = "All proof slots busy", body = ErrorBody),
        (status = 504, description = "Proof generation timed out", body = ErrorBody),
    ),
    tag = "prove"
)]
pub async fn prove(
    State(state): State<AppState>,
    uri: Uri,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ProofArtifact>, AppError> {
    let kind = state
        .service
        .router()
        .resolve(uri.path())
        .ok_or_else(|| AppError::NotFound(format!("no route for {}", uri.path())))?;
    let payload = extract_json(body)?;
    let artifact = state.service.handle(kind, payload).await?;
    Ok(Json(artifact))
}
