//! # ewp-core: Foundational Types for the Email-Wallet Prover
//!
//! Leaf crate of the workspace. Defines the vocabulary shared by the proof
//! backends and the HTTP service:
//!
//! - [`ProofKind`]: which circuit a request targets. The enum is total:
//!   disabled kinds still exist so every dispatch `match` stays exhaustive.
//! - [`KindRegistry`]: enabled/disabled flag per kind. Route exposure is
//!   driven by this data, not by conditional compilation.
//! - [`Nonce`] and [`NonceSource`]: the single-use random value bound to
//!   each proof request.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `ewp-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod kind;
pub mod nonce;

pub use error::KindError;
pub use kind::{KindRegistry, ProofKind, PROOF_KIND_COUNT};
pub use nonce::{Nonce, NonceSource, OsNonceSource};
