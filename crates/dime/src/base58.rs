//! Base58 encoding with a trailing 4-byte checksum.
//!
//! The checksum is the first four bytes of SHA-256(SHA-256(data)). The
//! alphabet is the Bitcoin alphabet, which leaves out `0`, `O`, `I` and `l`.

use crate::error::{DimeError, Result};

/// Encode `data` as checksummed Base58. Empty input encodes to an empty
/// string.
pub fn encode(data: &[u8]) -> String {
    if data.is_empty() {
        return String::new();
    }
    bs58::encode(data).with_check().into_string()
}

/// Decode a checksummed Base58 string.
///
/// Fails with [`DimeError::Format`] on characters outside the alphabet or
/// when the trailing checksum does not match the preceding bytes.
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    if encoded.is_empty() {
        return Ok(Vec::new());
    }
    bs58::decode(encoded)
        .with_check(None)
        .into_vec()
        .map_err(|e| DimeError::Format(format!("invalid base58 data: {e}")))
}
