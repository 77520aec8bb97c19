//! # Proof Backend Trait
//!
//! The core abstraction over proof generation. The orchestration layer never
//! looks inside a witness or an artifact: it hands the witness through and
//! returns whatever the backend produced.
//!
//! Unlike a sealed proof-system trait, [`ProofBackend`] is open. Operators
//! substitute their own circuit toolchain, and tests inject stubs that
//! count, fail, panic, or hang.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ewp_core::ProofKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Caller-supplied witness: a mapping of field names to values. The schema
/// belongs to the backend; the orchestration layer only checks the shape.
pub type Witness = serde_json::Map<String, Value>;

/// The opaque output of a successful proof generation.
///
/// Serialized transparently, so the HTTP response body is exactly what the
/// backend returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofArtifact(Value);

impl ProofArtifact {
    /// Wrap a backend result.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the underlying JSON.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Take the underlying JSON.
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for ProofArtifact {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Error reported by a proof backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// The witness is well-formed JSON but not what the circuit expects.
    #[error("invalid witness: {0}")]
    InvalidWitness(String),
    /// The backend failed while computing the proof.
    #[error("proof generation failed: {0}")]
    Failed(String),
    /// The backend ran but produced output that is not a proof artifact.
    #[error("malformed backend output: {0}")]
    MalformedOutput(String),
    /// The backend observed the cancel signal and stopped early.
    #[error("proof generation cancelled")]
    Cancelled,
}

/// Cooperative cancellation flag shared between the dispatcher and one
/// in-flight backend call.
///
/// Backends that can stop early poll [`CancelSignal::is_cancelled`];
/// backends that cannot simply ignore it and run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    /// A fresh, unraised signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the signal has been raised.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Opaque proof generation function.
///
/// Implementations run on a blocking thread and may take seconds. They must
/// hold no mutable state shared between calls: two calls with the same
/// arguments are independent and may run concurrently.
pub trait ProofBackend: Send + Sync + 'static {
    /// Short name used in logs and the health report.
    fn name(&self) -> &str;

    /// Generate a proof.
    ///
    /// * `kind`: the circuit to use.
    /// * `nonce`: the request nonce, decimal-encoded.
    /// * `is_prover`: always `true` when called by the dispatcher.
    /// * `witness`: the caller's input mapping, untouched.
    /// * `cancel`: raised when the caller has stopped waiting.
    ///
    /// # Errors
    ///
    /// Any [`ProofError`]; the dispatcher surfaces it to the caller with
    /// its message attached.
    fn generate_proof(
        &self,
        kind: ProofKind,
        nonce: &str,
        is_prover: bool,
        witness: &Witness,
        cancel: &CancelSignal,
    ) -> Result<ProofArtifact, ProofError>;
}

impl<B: ProofBackend + ?Sized> ProofBackend for Arc<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn generate_proof(
        &self,
        kind: ProofKind,
        nonce: &str,
        is_prover: bool,
        witness: &Witness,
        cancel: &CancelSignal,
    ) -> Result<ProofArtifact, ProofError> {
        (**self).generate_proof(kind, nonce, is_prover, witness, cancel)
    }
}
