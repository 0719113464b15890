//! Symmetric encryption using ChaCha20-Poly1305.
//!
//! Ciphertexts are written as `nonce (12 bytes) || ciphertext+tag`.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

use crate::error::{DimeError, Result};

const NONCE_LENGTH: usize = 12;

/// Generate a fresh random symmetric key.
pub fn generate_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Encrypt plaintext with ChaCha20-Poly1305 under a random nonce.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    if plaintext.is_empty() {
        return Err(DimeError::InvalidArgument(
            "plain text to encrypt must not be empty".into(),
        ));
    }
    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| DimeError::Crypto(format!("cipher init: {e}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| DimeError::Crypto(format!("encrypt: {e}")))?;
    let mut out = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a `nonce || ciphertext` buffer produced by [`encrypt`].
pub fn decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() <= NONCE_LENGTH {
        return Err(DimeError::Crypto("cipher text too short".into()));
    }
    let (nonce, ciphertext) = data.split_at(NONCE_LENGTH);
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| DimeError::Crypto(format!("cipher init: {e}")))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| DimeError::Crypto("decryption failed".into()))
}
