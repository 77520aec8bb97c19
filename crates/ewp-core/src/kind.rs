//! # Proof Kinds: Single Source of Truth
//!
//! Defines the [`ProofKind`] enum naming every circuit the prover knows
//! about, and the [`KindRegistry`] that decides which of them are exposed.
//!
//! `AccountInit` and `AccountTransport` are modelled even though they are
//! disabled by default: the dispatch table stays total, and re-enabling one
//! is a change to registry data rather than to the route structure.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KindError;

/// Identifies which circuit/backend entry point a proof request targets.
///
/// The wire name ([`ProofKind::as_str`]) is both the serde representation
/// and the trailing path segment of the HTTP route (`/prove/<name>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofKind {
    /// Account creation from an inbound email.
    AccountCreation,
    /// Claim of an unclaimed fund or state.
    Claim,
    /// Email-sender authenticity (DKIM-backed sender proof).
    EmailSender,
    /// Account initialization. Disabled by default.
    AccountInit,
    /// Account transport between relayers. Disabled by default.
    AccountTransport,
}

/// Number of proof kinds. Sizes the registry's flag table.
pub const PROOF_KIND_COUNT: usize = 5;

impl ProofKind {
    /// All proof kinds in canonical order.
    pub fn all() -> &'static [ProofKind] {
        &[
            Self::AccountCreation,
            Self::Claim,
            Self::EmailSender,
            Self::AccountInit,
            Self::AccountTransport,
        ]
    }

    /// The snake_case wire name. Matches the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountCreation => "account_creation",
            Self::Claim => "claim",
            Self::EmailSender => "email_sender",
            Self::AccountInit => "account_init",
            Self::AccountTransport => "account_transport",
        }
    }

    /// The HTTP route serving this kind.
    pub fn route_path(&self) -> String {
        format!("/prove/{}", self.as_str())
    }

    /// Kinds enabled in a default deployment.
    pub fn default_enabled(&self) -> bool {
        match self {
            Self::AccountCreation | Self::Claim | Self::EmailSender => true,
            Self::AccountInit | Self::AccountTransport => false,
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::AccountCreation => 0,
            Self::Claim => 1,
            Self::EmailSender => 2,
            Self::AccountInit => 3,
            Self::AccountTransport => 4,
        }
    }
}

impl fmt::Display for ProofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProofKind {
    type Err = KindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == trimmed)
            .ok_or_else(|| KindError::Unknown(s.to_string()))
    }
}

/// Enabled/disabled flag for every [`ProofKind`].
///
/// The HTTP layer registers one route per enabled kind; a disabled kind has
/// no route at all and therefore answers with the router's 404 fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindRegistry {
    enabled: [bool; PROOF_KIND_COUNT],
}

impl KindRegistry {
    /// A registry with every kind disabled.
    pub fn none() -> Self {
        Self {
            enabled: [false; PROOF_KIND_COUNT],
        }
    }

    /// A registry enabling exactly the given kinds.
    pub fn with_enabled(kinds: impl IntoIterator<Item = ProofKind>) -> Self {
        let mut registry = Self::none();
        for kind in kinds {
            registry.enable(kind);
        }
        registry
    }

    /// Parse a comma-separated list of wire names (e.g. `"claim,email_sender"`).
    ///
    /// Empty segments are ignored, so a trailing comma is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`KindError::Unknown`] for the first name that is not a kind.
    pub fn parse_list(list: &str) -> Result<Self, KindError> {
        let mut registry = Self::none();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            registry.enable(name.parse()?);
        }
        Ok(registry)
    }

    /// Enable a kind.
    pub fn enable(&mut self, kind: ProofKind) {
        self.enabled[kind.index()] = true;
    }

    /// Disable a kind.
    pub fn disable(&mut self, kind: ProofKind) {
        self.enabled[kind.index()] = false;
    }

    /// Whether the kind is exposed.
    pub fn is_enabled(&self, kind: ProofKind) -> bool {
        self.enabled[kind.index()]
    }

    /// Enabled kinds in canonical order.
    pub fn enabled(&self) -> Vec<ProofKind> {
        ProofKind::all()
            .iter()
            .copied()
            .filter(|k| self.is_enabled(*k))
            .collect()
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::with_enabled(
            ProofKind::all()
                .iter()
                .copied()
                .filter(ProofKind::default_enabled),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_kinds_has_expected_count() {
        assert_eq!(ProofKind::all().len(), PROOF_KIND_COUNT);
    }

    #[test]
    fn indices_are_unique_and_dense() {
        let mut seen = [false; PROOF_KIND_COUNT];
        for kind in ProofKind::all() {
            assert!(!seen[kind.index()], "duplicate index for {kind}");
            seen[kind.index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn as_str_matches_serde() {
        for kind in ProofKind::all() {
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            let back: ProofKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, *kind);
        }
    }

    #[test]
    fn from_str_accepts_wire_names() {
        assert_eq!("claim".parse::<ProofKind>().unwrap(), ProofKind::Claim);
        assert_eq!(
            " account_transport ".parse::<ProofKind>().unwrap(),
            ProofKind::AccountTransport
        );
    }

    #[test]
    fn from_str_rejects_unknown() {
        let err = "Claim".parse::<ProofKind>().unwrap_err();
        assert_eq!(err, KindError::Unknown("Claim".to_string()));
    }

    #[test]
    fn route_path_uses_wire_name() {
        assert_eq!(
            ProofKind::AccountCreation.route_path(),
            "/prove/account_creation"
        );
        assert_eq!(ProofKind::EmailSender.route_path(), "/prove/email_sender");
    }

    #[test]
    fn default_registry_disables_init_and_transport() {
        let registry = KindRegistry::default();
        assert_eq!(
            registry.enabled(),
            vec![
                ProofKind::AccountCreation,
                ProofKind::Claim,
                ProofKind::EmailSender
            ]
        );
        assert!(!registry.is_enabled(ProofKind::AccountInit));
        assert!(!registry.is_enabled(ProofKind::AccountTransport));
    }

    #[test]
    fn reenabling_is_a_data_change() {
        let mut registry = KindRegistry::default();
        registry.enable(ProofKind::AccountInit);
        assert!(registry.is_enabled(ProofKind::AccountInit));
        registry.disable(ProofKind::Claim);
        assert!(!registry.is_enabled(ProofKind::Claim));
    }

    #[test]
    fn parse_list_round_trips_default() {
        let registry = KindRegistry::parse_list("account_creation, claim,email_sender,").unwrap();
        assert_eq!(registry, KindRegistry::default());
    }

    #[test]
    fn parse_list_empty_is_none() {
        assert_eq!(KindRegistry::parse_list("").unwrap(), KindRegistry::none());
    }

    #[test]
    fn parse_list_rejects_unknown_name() {
        assert!(KindRegistry::parse_list("claim,bogus").is_err());
    }
}
