//! Identity and key capabilities.
//!
//! Identity capabilities are permission grants carried in the `cap` claim
//! of an identity (e.g. `issue`, `generic`, `self`). Key capabilities
//! describe what a key may be used for (`sign`, `exchange`, `encrypt`).
//! Both are written to claims as lowercase names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DimeError;

/// A named permission grant on an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Set after a simple registration; limited assurance.
    Generic,
    /// The identity was verified with a higher level of assurance.
    Identify,
    /// May sign and issue other identities.
    Issue,
    /// May be used to prove ownership of something.
    Prove,
    /// May seal artifacts, builds or documents.
    Seal,
    /// Self-issued identity, usually a trust root.
    #[serde(rename = "self")]
    SelfIssued,
    /// May lock a moment in time, notary style.
    Timestamp,
}

impl Capability {
    /// Return the stable claim name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Identify => "identify",
            Self::Issue => "issue",
            Self::Prove => "prove",
            Self::Seal => "seal",
            Self::SelfIssued => "self",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = DimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Ok(Self::Generic),
            "identify" => Ok(Self::Identify),
            "issue" => Ok(Self::Issue),
            "prove" => Ok(Self::Prove),
            "seal" => Ok(Self::Seal),
            "self" => Ok(Self::SelfIssued),
            "timestamp" => Ok(Self::Timestamp),
            other => Err(DimeError::InvalidArgument(format!(
                "unknown capability: {other}"
            ))),
        }
    }
}

/// What a key may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyCapability {
    /// Digital signatures.
    Sign,
    /// Key agreement.
    Exchange,
    /// Symmetric encryption.
    Encrypt,
}

impl KeyCapability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sign => "sign",
            Self::Exchange => "exchange",
            Self::Encrypt => "encrypt",
        }
    }

    /// Type bits used when packing key material. The lowest bit is left
    /// free for the key variant.
    pub(crate) fn type_bits(&self) -> u8 {
        match self {
            Self::Sign => 0x10,
            Self::Exchange => 0x20,
            Self::Encrypt => 0x40,
        }
    }

    pub(crate) fn from_type_bits(bits: u8) -> Option<Self> {
        match bits & 0xFE {
            0x10 => Some(Self::Sign),
            0x20 => Some(Self::Exchange),
            0x40 => Some(Self::Encrypt),
            _ => None,
        }
    }
}

impl fmt::Display for KeyCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyCapability {
    type Err = DimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sign" => Ok(Self::Sign),
            "exchange" => Ok(Self::Exchange),
            "encrypt" => Ok(Self::Encrypt),
            other => Err(DimeError::InvalidArgument(format!(
                "unknown key capability: {other}"
            ))),
        }
    }
}

/// Check whether a set of granted capabilities contains a requested one.
pub fn capabilities_cover(granted: &[Capability], requested: Capability) -> bool {
    granted.contains(&requested)
}

/// Check whether a set of granted capabilities contains ALL requested ones.
pub fn capabilities_cover_all(granted: &[Capability], requested: &[Capability]) -> bool {
    requested.iter().all(|req| capabilities_cover(granted, *req))
}

/// Render a capability set as claim names.
pub(crate) fn to_names(capabilities: &[Capability]) -> Vec<String> {
    capabilities.iter().map(|c| c.as_str().to_string()).collect()
}
