//! Trust evaluation: integrity states, the key ring of trusted roots, and
//! the recursive trust chain verifier.
//!
//! The trust module provides:
//! - [`IntegrityState`], the outcome of identity and link verification
//! - [`KeyRing`], the shared set of trusted root identities and clock policy
//! - chain verification from a leaf identity up to a root or an explicitly
//!   trusted identity

pub mod keyring;
pub mod verify;

use std::fmt;

pub use keyring::{KeyRing, KeyRingSnapshot};
pub use verify::verify_identity;

/// Outcome of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegrityState {
    /// Signatures hold all the way to a trusted root in the key ring.
    Complete,
    /// Signatures hold up to an explicitly trusted identity, or linked
    /// items are unchanged.
    Intact,
    /// Outside the validity window, here or further up the chain.
    Expired,
    /// Internally consistent but not anchored in anything trusted.
    Untrusted,
    /// Structurally unusable: unsealed, missing claims, broken chain links.
    Invalid,
    /// A signature did not verify.
    SignatureError,
}

impl IntegrityState {
    /// `Complete` or `Intact`.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Complete | Self::Intact)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Intact => "intact",
            Self::Expired => "expired",
            Self::Untrusted => "untrusted",
            Self::Invalid => "invalid",
            Self::SignatureError => "signature-error",
        }
    }
}

impl fmt::Display for IntegrityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
