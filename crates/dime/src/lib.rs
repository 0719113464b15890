//! DiME: Data Integrity Message Envelope.
//!
//! Self-describing, signed items (keys, identities, identity issuing
//! requests, messages) carried in envelopes, with cross-item integrity
//! links, capability-gated identity issuance and trust chain verification
//! against a key ring of trusted roots.

pub mod base58;
pub mod capability;
pub mod claims;
pub mod codec;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod item;
pub mod link;
pub mod time;
pub mod trust;

// Re-export primary types
pub use capability::{Capability, KeyCapability};
pub use claims::{Claim, ClaimValue, ClaimsStore};
pub use crypto::{CryptoSuite, DEFAULT_SUITE, LEGACY_SUITE};
pub use envelope::Envelope;
pub use error::{DimeError, Result};
pub use item::{DimeItem, Identity, IdentityIssuingRequest, IssuePolicy, Item, Key, Message};
pub use link::ItemLink;
pub use time::ClockPolicy;
pub use trust::{IntegrityState, KeyRing, KeyRingSnapshot};
