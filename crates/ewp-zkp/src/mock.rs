//! # Mock Backend
//!
//! A deterministic, transparent backend for development and testing.
//! Produces SHA-256 digests over the canonical (RFC 8785) encoding of the
//! request. Provides no zero-knowledge guarantees.

use ewp_core::ProofKind;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::backend::{CancelSignal, ProofArtifact, ProofBackend, ProofError, Witness};

/// Canonical preimage of a mock proof.
#[derive(Serialize)]
struct MockStatement<'a> {
    kind: ProofKind,
    nonce: &'a str,
    is_prover: bool,
    input: &'a Witness,
}

/// Deterministic digest-based backend.
///
/// The artifact has the shape
/// `{"proof": "0x…", "public_signals": [nonce, witness_digest], "kind", "nonce"}`
/// so consumers can exercise the same fields a real prover returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockBackend;

impl MockBackend {
    fn digest_hex(bytes: &[u8]) -> String {
        Sha256::digest(bytes)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    fn canonical(value: &impl Serialize) -> Result<Vec<u8>, ProofError> {
        serde_jcs::to_vec(value).map_err(|e| ProofError::InvalidWitness(e.to_string()))
    }
}

impl ProofBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn generate_proof(
        &self,
        kind: ProofKind,
        nonce: &str,
        is_prover: bool,
        witness: &Witness,
        cancel: &CancelSignal,
    ) -> Result<ProofArtifact, ProofError> {
        if cancel.is_cancelled() {
            return Err(ProofError::Cancelled);
        }

        let statement = MockStatement {
            kind,
            nonce,
            is_prover,
            input: witness,
        };
        let proof = Self::digest_hex(&Self::canonical(&statement)?);
        let witness_digest = Self::digest_hex(&Self::canonical(witness)?);

        tracing::trace!(%kind, nonce, "mock proof generated");

        Ok(json!({
            "proof": format!("0x{proof}"),
            "public_signals": [nonce, witness_digest],
            "kind": kind,
            "nonce": nonce,
        })
        .into())
    }
}
