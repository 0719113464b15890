//! Error types for DiME.
//!
//! All errors are strongly typed and propagated without panicking.
//! Private key material is never included in error messages.

/// Error types covering encoding, integrity, issuance and key handling.
#[derive(Debug, thiserror::Error)]
pub enum DimeError {
    /// Malformed header, wrong component count, undecodable base64/Base58
    /// or a checksum mismatch.
    #[error("Invalid format: {0}")]
    Format(String),

    /// A signature or thumbprint did not verify.
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// A capability was requested that the issuer is not allowed to grant,
    /// or the issuer lacks a required capability.
    #[error("Capability error: {0}")]
    Capability(String),

    /// A precondition on the item or envelope lifecycle was violated.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A timestamp is outside its validity window.
    #[error("Expired: {0}")]
    Expired(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key mismatch: {0}")]
    KeyMismatch(String),

    #[error("Unsupported cryptographic suite: {0}")]
    UnsupportedSuite(String),

    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<serde_json::Error> for DimeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, DimeError>;
