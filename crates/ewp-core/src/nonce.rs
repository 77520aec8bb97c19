//! # Per-Request Nonces
//!
//! Every proof request carries a fresh random integer. The backend receives
//! it as a decimal string and binds it into the proof, so two concurrent
//! requests with identical witnesses still produce distinguishable artifacts.
//!
//! The value range is `[0, i64::MAX]`: the full positive range of the
//! platform's native signed integer, which is what downstream circuits and
//! relayer tooling already accept.

use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// A single-use random value bound to one proof request.
///
/// # Invariants
///
/// - `0 <= value <= i64::MAX`.
/// - Never persisted; lives exactly as long as its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce(u64);

impl Nonce {
    /// Largest representable nonce.
    pub const MAX: u64 = i64::MAX as u64;

    /// Wrap a raw value, or `None` if it exceeds [`Nonce::MAX`].
    pub fn new(value: u64) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    /// The raw integer value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Decimal encoding handed to the proof backend.
    pub fn to_decimal(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Produces nonces. Implementations must be safe to call concurrently and
/// must not hand out the same value twice within any practical window.
pub trait NonceSource: Send + Sync {
    /// Mint the nonce for one request.
    fn next_nonce(&self) -> Nonce;
}

/// Draws nonces from the operating system's CSPRNG.
///
/// Stateless: every call is an independent 63-bit draw, so no locking or
/// shared counter is involved.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsNonceSource;

impl NonceSource for OsNonceSource {
    fn next_nonce(&self) -> Nonce {
        // Dropping the top bit maps a uniform u64 onto a uniform [0, i64::MAX].
        Nonce(OsRng.next_u64() >> 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn new_accepts_bounds() {
        assert_eq!(Nonce::new(0).map(|n| n.value()), Some(0));
        assert_eq!(
            Nonce::new(i64::MAX as u64).map(|n| n.value()),
            Some(i64::MAX as u64)
        );
    }

    #[test]
    fn new_rejects_above_signed_range() {
        assert!(Nonce::new(i64::MAX as u64 + 1).is_none());
        assert!(Nonce::new(u64::MAX).is_none());
    }

    #[test]
    fn decimal_encoding() {
        let nonce = Nonce::new(9_223_372_036_854_775_807).unwrap();
        assert_eq!(nonce.to_decimal(), "9223372036854775807");
        assert_eq!(nonce.to_string(), nonce.to_decimal());
    }

    #[test]
    fn os_source_draws_are_distinct() {
        let source = OsNonceSource;
        let draws: HashSet<u64> = (0..10_000).map(|_| source.next_nonce().value()).collect();
        assert_eq!(draws.len(), 10_000, "collision in 10k draws from a 63-bit space");
    }

    #[test]
    fn os_source_uses_high_range() {
        // With 1000 uniform draws, at least one lands above 2^62 with
        // probability 1 - 2^-1000.
        let source = OsNonceSource;
        assert!((0..1000).any(|_| source.next_nonce().value() > (1u64 << 62)));
    }

    #[test]
    fn os_source_is_shareable_across_threads() {
        let source = std::sync::Arc::new(OsNonceSource);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let source = source.clone();
                std::thread::spawn(move || {
                    (0..1000)
                        .map(|_| source.next_nonce().value())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all = HashSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(all.insert(value));
            }
        }
        assert_eq!(all.len(), 4000);
    }
}
