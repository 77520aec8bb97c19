//! # Error Types
//!
//! Errors raised while resolving proof kinds from their wire names.

use thiserror::Error;

/// Failure to resolve a [`ProofKind`](crate::ProofKind).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KindError {
    /// The string does not name any proof kind.
    #[error("unknown proof kind: {0:?}")]
    Unknown(String),
}
