//! # Proof Service
//!
//! Composition root: validate with the [`RequestRouter`], mint a nonce,
//! run the job through the [`JobDispatcher`], and hand back the artifact.

use std::sync::Arc;

use ewp_core::{NonceSource, OsNonceSource, ProofKind};
use ewp_zkp::{ProofArtifact, ProofBackend};
use serde_json::Value;

use crate::dispatcher::{DispatchError, DispatcherConfig, JobDispatcher};
use crate::router::RequestRouter;

/// Failure of one [`ProofService::handle`] call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The caller sent a malformed envelope. Never reaches the backend.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The kind exists but has no enabled route.
    #[error("proof kind {0} is not enabled")]
    KindDisabled(ProofKind),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ServiceError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Dispatch(DispatchError::Overloaded | DispatchError::Timeout(_))
        )
    }
}

/// Request → validated witness → nonce → dispatched job → artifact.
pub struct ProofService {
    router: RequestRouter,
    nonces: Arc<dyn NonceSource>,
    dispatcher: JobDispatcher,
}

impl std::fmt::Debug for ProofService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofService")
            .field("router", &self.router)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl ProofService {
    pub fn new(
        router: RequestRouter,
        nonces: Arc<dyn NonceSource>,
        dispatcher: JobDispatcher,
    ) -> Self {
        Self {
            router,
            nonces,
            dispatcher,
        }
    }

    /// Wire a service over `backend` with OS-drawn nonces.
    pub fn with_backend(
        router: RequestRouter,
        backend: Arc<dyn ProofBackend>,
        config: DispatcherConfig,
    ) -> Self {
        Self::new(
            router,
            Arc::new(OsNonceSource),
            JobDispatcher::new(backend, config),
        )
    }

    pub fn router(&self) -> &RequestRouter {
        &self.router
    }

    pub fn dispatcher(&self) -> &JobDispatcher {
        &self.dispatcher
    }

    /// Handle one proof request for `kind`.
    ///
    /// Validation runs before a nonce is drawn or a slot is touched, so a
    /// rejected envelope costs nothing on the proving side.
    pub async fn handle(
        &self,
        kind: ProofKind,
        payload: Value,
    ) -> Result<ProofArtifact, ServiceError> {
        if !self.router.is_enabled(kind) {
            return Err(ServiceError::KindDisabled(kind));
        }
        let request = self.router.validate(kind, payload).map_err(|e| {
            tracing::info!(%kind, outcome = "invalid_request", error = %e, "proof request rejected");
            e
        })?;
        let nonce = self.nonces.next_nonce();
        let artifact = self
            .dispatcher
            .submit(request.kind, nonce, request.witness)
            .await?;
        Ok(artifact)
    }
}
