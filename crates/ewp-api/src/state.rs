//! # Application State
//!
//! Shared state handed to every handler: the proof service, the loaded
//! configuration, request metrics, and the process start time.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use ewp_core::NonceSource;
use ewp_zkp::ProofBackend;

use crate::config::AppConfig;
use crate::dispatcher::JobDispatcher;
use crate::middleware::metrics::ApiMetrics;
use crate::router::RequestRouter;
use crate::service::ProofService;

/// Cloneable handle to everything a handler needs.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<ProofService>,
    pub config: Arc<AppConfig>,
    pub metrics: ApiMetrics,
    pub started_at: Instant,
    pub started_at_utc: DateTime<Utc>,
}

impl AppState {
    /// Build state over `backend` with OS-drawn nonces.
    pub fn new(config: AppConfig, backend: Arc<dyn ProofBackend>) -> Self {
        let service = ProofService::with_backend(
            RequestRouter::new(config.kinds),
            backend,
            config.dispatcher.clone(),
        );
        Self::from_parts(config, service)
    }

    /// Build state with a caller-supplied nonce source.
    pub fn with_nonce_source(
        config: AppConfig,
        backend: Arc<dyn ProofBackend>,
        nonces: Arc<dyn NonceSource>,
    ) -> Self {
        let service = ProofService::new(
            RequestRouter::new(config.kinds),
            nonces,
            JobDispatcher::new(backend, config.dispatcher.clone()),
        );
        Self::from_parts(config, service)
    }

    fn from_parts(config: AppConfig, service: ProofService) -> Self {
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
            metrics: ApiMetrics::new(),
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
        }
    }

    pub fn dispatcher(&self) -> &JobDispatcher {
        self.service.dispatcher()
    }

    /// Whole seconds since the state was built.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ewp_core::{KindRegistry, ProofKind};
    use ewp_zkp::MockBackend;

    #[test]
    fn state_wires_configured_kinds() {
        let config = AppConfig {
            kinds: KindRegistry::with_enabled([ProofKind::Claim]),
            ..AppConfig::default()
        };
        let state = AppState::new(config, Arc::new(MockBackend));
        assert_eq!(state.service.router().enabled_kinds(), vec![ProofKind::Claim]);
    }

    #[test]
    fn state_wires_dispatcher_config() {
        let mut config = AppConfig::default();
        config.dispatcher.max_concurrent_jobs = 3;
        let state = AppState::new(config, Arc::new(MockBackend));
        assert_eq!(state.dispatcher().pool_size(), 3);
        assert_eq!(state.dispatcher().stats().available_slots, 3);
    }

    struct Fixed;

    impl NonceSource for Fixed {
        fn next_nonce(&self) -> ewp_core::Nonce {
            ewp_core::Nonce::new(1234).unwrap()
        }
    }

    #[tokio::test]
    async fn custom_nonce_source_reaches_backend() {
        let state = AppState::with_nonce_source(
            AppConfig::default(),
            Arc::new(MockBackend),
            Arc::new(Fixed),
        );
        let artifact = state
            .service
            .handle(ProofKind::Claim, serde_json::json!({"input": {}}))
            .await
            .unwrap();
        assert_eq!(artifact.as_value()["nonce"], "1234");
    }

    #[test]
    fn clones_share_the_service() {
        let state = AppState::new(AppConfig::default(), Arc::new(MockBackend));
        let clone = state.clone();
        assert!(Arc::ptr_eq(&state.service, &clone.service));
        assert!(clone.uptime_secs() < 60);
    }
}
