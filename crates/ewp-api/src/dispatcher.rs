//! # Job Dispatcher
//!
//! Runs proof jobs on the blocking thread pool under a fixed number of
//! concurrency slots.
//!
//! ## Lifecycle of a job
//!
//! ```text
//! submit ─► acquire slot ─► spawn_blocking(backend) ─► await (deadline) ─► result
//!              │                                            │
//!              ├─ pool full, Reject ─► Overloaded           └─ deadline hit ─► Timeout
//!              ├─ pool full, queue full ─► Overloaded            (job orphaned, slot held
//!              └─ queued past deadline ─► Timeout                 until the backend returns)
//! ```
//!
//! ## Slot accounting
//!
//! A slot is a semaphore permit moved into the blocking closure inside a
//! [`JobSlot`]. The permit is released when that closure ends, whether it
//! returns, errors, or panics, and never by the waiting caller. A job that
//! times out therefore keeps its slot until the backend actually stops, so
//! the number of backend calls in flight can never exceed the pool size.
//!
//! Each permit increments `acquired` exactly once when taken and `released`
//! exactly once when the [`JobSlot`] drops.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ewp_core::{Nonce, ProofKind};
use ewp_zkp::{CancelSignal, ProofArtifact, ProofBackend, Witness};
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{default_pool_size, DEFAULT_JOB_TIMEOUT};

/// What happens to a job that arrives while every slot is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Fail immediately with [`DispatchError::Overloaded`].
    Reject,
    /// Wait for a slot, with at most `depth` jobs waiting at once. Time spent
    /// waiting counts against the job timeout.
    Queue { depth: usize },
}

impl AdmissionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Queue { .. } => "queue",
        }
    }
}

/// Dispatcher tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Slot pool size. Values below 1 are raised to 1.
    pub max_concurrent_jobs: usize,
    pub admission: AdmissionPolicy,
    /// Wall-clock budget per job, measured from submission.
    pub job_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        let pool = default_pool_size();
        Self {
            max_concurrent_jobs: pool,
            admission: AdmissionPolicy::Queue { depth: pool },
            job_timeout: DEFAULT_JOB_TIMEOUT,
        }
    }
}

/// Why a submitted job produced no artifact.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// No slot is free and the job could not be queued.
    #[error("all proof slots are busy; retry later")]
    Overloaded,
    /// The job did not finish within its budget.
    #[error("proof generation exceeded the {0:?} timeout")]
    Timeout(Duration),
    /// The backend returned an error or panicked.
    #[error("proof generation failed: {0}")]
    ProofGenerationFailed(String),
}

impl DispatchError {
    /// Short outcome label for log events.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Overloaded => "overloaded",
            Self::Timeout(_) => "timeout",
            Self::ProofGenerationFailed(_) => "failed",
        }
    }
}

/// Point-in-time view of the dispatcher, reported by `/healthz`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DispatcherStats {
    pub pool_size: usize,
    pub available_slots: usize,
    /// Backend calls currently holding a slot, orphans included.
    pub in_flight: u64,
    pub queued: usize,
    /// Jobs whose caller gave up but whose backend call is still running.
    pub orphaned: u64,
    pub acquired: u64,
    pub released: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub rejected: u64,
    pub admission: String,
}

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    rejected: AtomicU64,
    orphaned: AtomicU64,
    queued: AtomicUsize,
}

const RUNNING: u8 = 0;
const DONE: u8 = 1;
const ABANDONED: u8 = 2;

/// Owns one slot for the lifetime of a backend call.
struct JobSlot {
    _permit: OwnedSemaphorePermit,
    state: Arc<AtomicU8>,
    counters: Arc<Counters>,
    job_id: Uuid,
}

impl Drop for JobSlot {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::AcqRel);
        if self.state.swap(DONE, Ordering::AcqRel) == ABANDONED {
            self.counters.orphaned.fetch_sub(1, Ordering::AcqRel);
            tracing::debug!(job_id = %self.job_id, "reclaimed slot from abandoned proof job");
        }
    }
}

/// Caller-side guard. If the caller stops waiting (timeout or a dropped
/// request future) while the backend is still running, the job is marked
/// abandoned and its cancel signal raised.
struct InFlight {
    state: Arc<AtomicU8>,
    cancel: CancelSignal,
    counters: Arc<Counters>,
    job_id: Uuid,
    kind: ProofKind,
    armed: bool,
}

impl InFlight {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.cancel.cancel();
        // Count first so a concurrent JobSlot drop never decrements below zero.
        self.counters.orphaned.fetch_add(1, Ordering::AcqRel);
        if self
            .state
            .compare_exchange(RUNNING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::warn!(
                job_id = %self.job_id,
                kind = %self.kind,
                "proof job abandoned; slot stays held until the backend returns"
            );
        } else {
            self.counters.orphaned.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// Holds a place in the wait queue.
struct QueueTicket<'a>(&'a AtomicUsize);

impl<'a> QueueTicket<'a> {
    fn reserve(queued: &'a AtomicUsize, depth: usize) -> Option<Self> {
        queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < depth).then_some(n + 1)
            })
            .ok()
            .map(|_| Self(queued))
    }
}

impl Drop for QueueTicket<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Bounded executor for proof jobs.
pub struct JobDispatcher {
    backend: Arc<dyn ProofBackend>,
    slots: Arc<Semaphore>,
    pool_size: usize,
    config: DispatcherConfig,
    counters: Arc<Counters>,
    draining: AtomicBool,
}

impl std::fmt::Debug for JobDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDispatcher")
            .field("backend", &self.backend.name())
            .field("pool_size", &self.pool_size)
            .field("config", &self.config)
            .finish()
    }
}

impl JobDispatcher {
    pub fn new(backend: Arc<dyn ProofBackend>, config: DispatcherConfig) -> Self {
        let pool_size = config.max_concurrent_jobs.max(1);
        Self {
            backend,
            slots: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            config,
            counters: Arc::new(Counters::default()),
            draining: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Run one proof job to completion, failure, or timeout.
    ///
    /// The witness is handed to the backend untouched, together with the
    /// decimal-encoded nonce and `is_prover = true`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Overloaded`] when no slot can be obtained.
    /// - [`DispatchError::Timeout`] when the budget elapses first.
    /// - [`DispatchError::ProofGenerationFailed`] when the backend errors
    ///   or panics.
    pub async fn submit(
        &self,
        kind: ProofKind,
        nonce: Nonce,
        witness: Witness,
    ) -> Result<ProofArtifact, DispatchError> {
        let job_id = Uuid::new_v4();
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.config.job_timeout;

        let result = self.run(job_id, kind, nonce, witness, deadline).await;

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &result {
            Ok(_) => tracing::info!(%job_id, %kind, elapsed_ms, outcome = "ok", "proof job finished"),
            Err(e) => tracing::warn!(
                %job_id,
                %kind,
                elapsed_ms,
                outcome = e.outcome(),
                error = %e,
                "proof job finished"
            ),
        }
        result
    }

    async fn run(
        &self,
        job_id: Uuid,
        kind: ProofKind,
        nonce: Nonce,
        witness: Witness,
        deadline: tokio::time::Instant,
    ) -> Result<ProofArtifact, DispatchError> {
        let permit = self.acquire(deadline).await?;
        self.counters.acquired.fetch_add(1, Ordering::AcqRel);

        let state = Arc::new(AtomicU8::new(RUNNING));
        let cancel = CancelSignal::new();
        let slot = JobSlot {
            _permit: permit,
            state: state.clone(),
            counters: self.counters.clone(),
            job_id,
        };
        let mut guard = InFlight {
            state,
            cancel: cancel.clone(),
            counters: self.counters.clone(),
            job_id,
            kind,
            armed: true,
        };

        let backend = self.backend.clone();
        let nonce = nonce.to_decimal();
        let handle = tokio::task::spawn_blocking(move || {
            let _slot = slot;
            backend.generate_proof(kind, &nonce, true, &witness, &cancel)
        });

        match tokio::time::timeout_at(deadline, handle).await {
            Ok(Ok(Ok(artifact))) => {
                guard.disarm();
                self.counters.succeeded.fetch_add(1, Ordering::AcqRel);
                Ok(artifact)
            }
            Ok(Ok(Err(e))) => {
                guard.disarm();
                self.counters.failed.fetch_add(1, Ordering::AcqRel);
                Err(DispatchError::ProofGenerationFailed(e.to_string()))
            }
            Ok(Err(join_err)) => {
                guard.disarm();
                self.counters.failed.fetch_add(1, Ordering::AcqRel);
                let msg = if join_err.is_panic() {
                    "proof backend panicked".to_string()
                } else {
                    format!("proof task did not complete: {join_err}")
                };
                Err(DispatchError::ProofGenerationFailed(msg))
            }
            Err(_elapsed) => {
                self.counters.timed_out.fetch_add(1, Ordering::AcqRel);
                drop(guard);
                Err(DispatchError::Timeout(self.config.job_timeout))
            }
        }
    }

    async fn acquire(
        &self,
        deadline: tokio::time::Instant,
    ) -> Result<OwnedSemaphorePermit, DispatchError> {
        if self.is_draining() {
            self.counters.rejected.fetch_add(1, Ordering::AcqRel);
            return Err(DispatchError::Overloaded);
        }

        match self.slots.clone().try_acquire_owned() {
            Ok(permit) => return Ok(permit),
            Err(TryAcquireError::Closed) => return Err(DispatchError::Overloaded),
            Err(TryAcquireError::NoPermits) => {}
        }

        let depth = match self.config.admission {
            AdmissionPolicy::Reject => {
                self.counters.rejected.fetch_add(1, Ordering::AcqRel);
                return Err(DispatchError::Overloaded);
            }
            AdmissionPolicy::Queue { depth } => depth,
        };

        let Some(_ticket) = QueueTicket::reserve(&self.counters.queued, depth) else {
            self.counters.rejected.fetch_add(1, Ordering::AcqRel);
            return Err(DispatchError::Overloaded);
        };

        match tokio::time::timeout_at(deadline, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_closed)) => Err(DispatchError::Overloaded),
            Err(_elapsed) => {
                self.counters.timed_out.fetch_add(1, Ordering::AcqRel);
                Err(DispatchError::Timeout(self.config.job_timeout))
            }
        }
    }

    pub fn stats(&self) -> DispatcherStats {
        let c = &self.counters;
        let acquired = c.acquired.load(Ordering::Acquire);
        let released = c.released.load(Ordering::Acquire);
        DispatcherStats {
            pool_size: self.pool_size,
            available_slots: self.slots.available_permits(),
            in_flight: acquired.saturating_sub(released),
            queued: c.queued.load(Ordering::Acquire),
            orphaned: c.orphaned.load(Ordering::Acquire),
            acquired,
            released,
            succeeded: c.succeeded.load(Ordering::Acquire),
            failed: c.failed.load(Ordering::Acquire),
            timed_out: c.timed_out.load(Ordering::Acquire),
            rejected: c.rejected.load(Ordering::Acquire),
            admission: self.config.admission.as_str().to_string(),
        }
    }

    /// Wait until every slot is free, orphaned jobs included.
    pub async fn wait_idle(&self) {
        let all = u32::try_from(self.pool_size).unwrap_or(u32::MAX);
        // Closed only if the semaphore is closed, which this type never does.
        if let Ok(permits) = self.slots.acquire_many(all).await {
            drop(permits);
        }
    }

    /// Stop admitting new jobs. Jobs already holding or queued for a slot
    /// are unaffected.
    pub fn begin_drain(&self) {
        self.draining.store(true, Ordering::Release);
    }

    /// Stop admitting jobs and wait for the ones in flight.
    pub async fn drain(&self) {
        self.begin_drain();
        let stats = self.stats();
        tracing::info!(
            in_flight = stats.in_flight,
            queued = stats.queued,
            "draining proof jobs"
        );
        self.wait_idle().await;
        tracing::info!("proof dispatcher drained");
    }
}
