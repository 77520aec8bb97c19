//! # ewp-prover: Binary Entry Point
//!
//! Loads configuration from the environment, selects the proof backend,
//! and serves the API until SIGINT/SIGTERM. On shutdown the listener stops
//! accepting connections and in-flight proof jobs are drained.

use std::sync::Arc;

use ewp_api::config::AppConfig;
use ewp_api::state::AppState;
use ewp_zkp::{CommandBackend, MockBackend, ProofBackend};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Configuration error: {e}");
        e
    })?;

    let backend: Arc<dyn ProofBackend> = match config.backend_command.as_deref() {
        Some(program) => {
            let backend = CommandBackend::new(program, config.backend_args.clone())
                .with_max_output(config.backend_max_output);
            tracing::info!(
                program = %backend.program().display(),
                args = ?backend.args(),
                "using external prover command"
            );
            Arc::new(backend)
        }
        None => {
            tracing::warn!("PROVER_BACKEND_CMD not set; using the mock backend (no real proofs)");
            Arc::new(MockBackend)
        }
    };

    let addr = config.bind_address();
    let drain_budget = config.dispatcher.job_timeout;
    tracing::info!(
        pool_size = config.dispatcher.max_concurrent_jobs,
        admission = config.dispatcher.admission.as_str(),
        job_timeout_secs = config.dispatcher.job_timeout.as_secs(),
        enabled_kinds = ?config.kinds.enabled(),
        "prover configured"
    );

    let state = AppState::new(config, backend);
    let service = state.service.clone();
    let app = ewp_api::app(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Prover listening on {}", addr);

    let on_shutdown = service.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            on_shutdown.dispatcher().begin_drain();
        })
        .await?;

    if tokio::time::timeout(drain_budget, service.dispatcher().drain())
        .await
        .is_err()
    {
        let stats = service.dispatcher().stats();
        tracing::warn!(
            in_flight = stats.in_flight,
            orphaned = stats.orphaned,
            "proof jobs still running at exit"
        );
    }

    Ok(())
}

/// `RUST_LOG` filter (default `info`); `LOG_FORMAT=json` for JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
