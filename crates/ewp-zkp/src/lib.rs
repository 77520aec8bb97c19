//! # ewp-zkp: Proof Backend Boundary
//!
//! The cryptography that turns a witness into a proof lives outside this
//! workspace. This crate pins down the contract the orchestration layer
//! consumes:
//!
//! ```text
//! GenerateProof(kind, nonce, is_prover, witness) -> ProofArtifact | ProofError
//! ```
//!
//! expressed as the [`ProofBackend`] trait. Implementations must be pure
//! functions of their inputs and safe to call from many worker threads at
//! once; the dispatcher in `ewp-api` runs each call on a blocking thread.
//!
//! ## Backends
//!
//! - [`MockBackend`]: deterministic SHA-256 digest "proofs" for development
//!   and tests. No zero-knowledge guarantees. Behind the default `mock`
//!   feature.
//! - [`CommandBackend`]: runs an external prover program per job, speaking
//!   JSON over stdin/stdout. This is how a real circuit toolchain is plugged
//!   in without touching the orchestration code.

pub mod backend;
pub mod command;
#[cfg(feature = "mock")]
pub mod mock;

pub use backend::{CancelSignal, ProofArtifact, ProofBackend, ProofError, Witness};
pub use command::CommandBackend;
#[cfg(feature = "mock")]
pub use mock::MockBackend;
