//! # Service Configuration
//!
//! Environment-driven configuration for the prover service. Every variable
//! is optional; a value that is present but unparseable is a startup error
//! rather than a silent fallback to the default.
//!
//! Variables:
//! - `PROVER_HOST` (default: `0.0.0.0`)
//! - `PROVER_PORT`, then `PORT` (default: `8080`)
//! - `PROVER_MAX_CONCURRENT_JOBS` (default: available parallelism)
//! - `PROVER_ADMISSION`: `queue` or `reject` (default: `queue`)
//! - `PROVER_QUEUE_DEPTH` (default: the slot pool size)
//! - `PROVER_JOB_TIMEOUT_SECS` (default: `300`)
//! - `PROVER_ENABLED_KINDS` (default: `account_creation,claim,email_sender`)
//! - `PROVER_BODY_LIMIT_BYTES` (default: `1048576`)
//! - `PROVER_BACKEND_CMD`: path of the external prover program, taken
//!   verbatim (default: unset, the mock backend is used)
//! - `PROVER_BACKEND_ARGS`: JSON array of arguments for that program, e.g.
//!   `["prove.py", "--zkey", "/srv/my circuits/claim.zkey"]` (default: `[]`)
//! - `PROVER_BACKEND_MAX_OUTPUT_BYTES` (default: `16777216`)

use std::str::FromStr;
use std::time::Duration;

use ewp_core::{KindError, KindRegistry};
use ewp_zkp::command::DEFAULT_MAX_OUTPUT;

use crate::dispatcher::{AdmissionPolicy, DispatcherConfig};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default per-job timeout.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(300);
/// Default request body limit (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Interface to bind the listener to.
    pub host: String,
    /// Port to bind the listener to.
    pub port: u16,
    /// Which proof kinds get a route.
    pub kinds: KindRegistry,
    /// Slot pool, admission policy and timeout for proof jobs.
    pub dispatcher: DispatcherConfig,
    /// Maximum accepted request body, in bytes.
    pub body_limit: usize,
    /// External prover program. `None` selects the mock backend.
    pub backend_command: Option<String>,
    /// Arguments passed to `backend_command`, one element per argument.
    pub backend_args: Vec<String>,
    /// Cap on the external prover's captured stdout, in bytes.
    pub backend_max_output: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            kinds: KindRegistry::default(),
            dispatcher: DispatcherConfig::default(),
            body_limit: DEFAULT_BODY_LIMIT,
            backend_command: None,
            backend_args: Vec::new(),
            backend_max_output: DEFAULT_MAX_OUTPUT,
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for any variable that is set but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Used by [`AppConfig::from_env`] and by tests, which pass a map
    /// instead of mutating the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = get("PROVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = match get("PROVER_PORT") {
            Some(raw) => parse_var("PROVER_PORT", &raw)?,
            None => match get("PORT") {
                Some(raw) => parse_var("PORT", &raw)?,
                None => DEFAULT_PORT,
            },
        };

        let max_concurrent_jobs = match get("PROVER_MAX_CONCURRENT_JOBS") {
            Some(raw) => {
                let n: usize = parse_var("PROVER_MAX_CONCURRENT_JOBS", &raw)?;
                if n == 0 {
                    return Err(ConfigError::Invalid {
                        var: "PROVER_MAX_CONCURRENT_JOBS".to_string(),
                        reason: "must be at least 1".to_string(),
                    });
                }
                n
            }
            None => default_pool_size(),
        };

        let queue_depth = match get("PROVER_QUEUE_DEPTH") {
            Some(raw) => parse_var("PROVER_QUEUE_DEPTH", &raw)?,
            None => max_concurrent_jobs,
        };

        let admission = match get("PROVER_ADMISSION").as_deref().map(str::trim) {
            None | Some("queue") => AdmissionPolicy::Queue { depth: queue_depth },
            Some("reject") => AdmissionPolicy::Reject,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "PROVER_ADMISSION".to_string(),
                    reason: format!("expected `queue` or `reject`, got {other:?}"),
                })
            }
        };

        let job_timeout = match get("PROVER_JOB_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = parse_var("PROVER_JOB_TIMEOUT_SECS", &raw)?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        var: "PROVER_JOB_TIMEOUT_SECS".to_string(),
                        reason: "must be at least 1".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_JOB_TIMEOUT,
        };

        let kinds = match lookup("PROVER_ENABLED_KINDS") {
            Some(raw) => KindRegistry::parse_list(&raw).map_err(|e| ConfigError::Kinds {
                var: "PROVER_ENABLED_KINDS".to_string(),
                source: e,
            })?,
            None => KindRegistry::default(),
        };

        let body_limit = match get("PROVER_BODY_LIMIT_BYTES") {
            Some(raw) => parse_var("PROVER_BODY_LIMIT_BYTES", &raw)?,
            None => DEFAULT_BODY_LIMIT,
        };

        let backend_args = match get("PROVER_BACKEND_ARGS") {
            Some(raw) => serde_json::from_str::<Vec<String>>(&raw).map_err(|e| {
                ConfigError::Invalid {
                    var: "PROVER_BACKEND_ARGS".to_string(),
                    reason: format!("expected a JSON array of strings: {e}"),
                }
            })?,
            None => Vec::new(),
        };

        let backend_max_output = match get("PROVER_BACKEND_MAX_OUTPUT_BYTES") {
            Some(raw) => parse_var("PROVER_BACKEND_MAX_OUTPUT_BYTES", &raw)?,
            None => DEFAULT_MAX_OUTPUT,
        };

        Ok(Self {
            host,
            port,
            kinds,
            dispatcher: DispatcherConfig {
                max_concurrent_jobs,
                admission,
                job_timeout,
            },
            body_limit,
            backend_command: get("PROVER_BACKEND_CMD"),
            backend_args,
            backend_max_output,
        })
    }

    /// `host:port` string for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Pool size when none is configured: one slot per available core.
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn parse_var<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var: var.to_string(),
        reason: format!("{raw:?}: {e}"),
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: String, reason: String },
    #[error("invalid value for {var}: {source}")]
    Kinds {
        var: String,
        #[source]
        source: KindError,
    },
}
