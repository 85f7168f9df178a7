//! Registry identity and version stamps.
//!
//! Every `RegistryContext` gets a fresh process-local token, and every
//! mutation bumps its generation. Certificates carry the `(token, generation)`
//! pair they were produced under, so a caller holding a certificate can tell
//! whether the rules, edges or classifications it relied on have changed.
//!
//! The token is **not** serialized; only the generation number travels with
//! a serialized certificate.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_REGISTRY_TOKEN: AtomicU64 = AtomicU64::new(1);

/// A process-local token identifying one `RegistryContext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryToken(NonZeroU64);

impl RegistryToken {
    pub fn new() -> Self {
        let raw = NEXT_REGISTRY_TOKEN.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(raw).expect("NEXT_REGISTRY_TOKEN starts at 1"))
    }

    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

impl Default for RegistryToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry state a proof was produced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryStamp {
    pub token: RegistryToken,
    pub generation: u64,
}

impl RegistryStamp {
    pub fn check(&self, current: RegistryStamp) -> Result<(), RegistryStampMismatch> {
        if *self != current {
            return Err(RegistryStampMismatch {
                expected: *self,
                actual: current,
            });
        }
        Ok(())
    }
}

/// A certificate checked against a registry other than (or newer than) the
/// one it was produced under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStampMismatch {
    pub expected: RegistryStamp,
    pub actual: RegistryStamp,
}

impl std::fmt::Display for RegistryStampMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.expected.token != self.actual.token {
            write!(
                f,
                "registry mismatch (expected registry#{}, got registry#{})",
                self.expected.token.raw(),
                self.actual.token.raw()
            )
        } else {
            write!(
                f,
                "registry changed since proof (generation {} → {})",
                self.expected.generation, self.actual.generation
            )
        }
    }
}

impl std::error::Error for RegistryStampMismatch {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique() {
        assert_ne!(RegistryToken::new(), RegistryToken::new());
    }

    #[test]
    fn generation_change_is_reported() {
        let token = RegistryToken::new();
        let old = RegistryStamp { token, generation: 1 };
        let new = RegistryStamp { token, generation: 2 };
        let err = old.check(new).expect_err("stale");
        assert!(err.to_string().contains("generation 1 → 2"));
        assert!(old.check(old).is_ok());
    }
}
