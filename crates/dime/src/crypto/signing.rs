//! Ed25519 signing and verification over raw key bytes.

use ed25519_dalek::{Signature, Signer, Verifier};

use crate::error::{DimeError, Result};

use super::keys::Ed25519KeyPair;

/// Sign a message with raw Ed25519 signing key bytes.
///
/// Returns the signature as 64 bytes.
pub fn sign(secret_key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let key_pair = Ed25519KeyPair::from_signing_key_bytes(secret_key)?;
    Ok(key_pair.signing_key().sign(message).to_bytes().to_vec())
}

/// Verify an Ed25519 signature against raw public key bytes.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    let verifying_key = Ed25519KeyPair::verifying_key_from_bytes(public_key)?;
    let sig_array: [u8; 64] = signature
        .try_into()
        .map_err(|_| DimeError::Integrity("signature must be 64 bytes".into()))?;
    verifying_key
        .verify(message, &Signature::from_bytes(&sig_array))
        .map_err(|_| DimeError::Integrity("signature verification failed".into()))
}
