//! Ed25519 and X25519 key pairs over raw key bytes.
//!
//! Ed25519 is used for item signatures, X25519 for key agreement.

use ed25519_dalek::{SigningKey, VerifyingKey};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::error::{DimeError, Result};

const KEY_LENGTH: usize = 32;

fn to_array(bytes: &[u8], what: &str) -> Result<[u8; KEY_LENGTH]> {
    bytes.try_into().map_err(|_| {
        DimeError::InvalidKey(format!(
            "{what} must be {KEY_LENGTH} bytes, got {}",
            bytes.len()
        ))
    })
}

/// An Ed25519 key pair for signing operations.
///
/// The signing key is zeroized on drop to prevent private key leakage.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Ed25519KeyPair {
    /// Generate a new random Ed25519 key pair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Reconstruct a key pair from raw signing key bytes.
    pub fn from_signing_key_bytes(bytes: &[u8]) -> Result<Self> {
        let mut raw = to_array(bytes, "signing key")?;
        let signing_key = SigningKey::from_bytes(&raw);
        raw.zeroize();
        let verifying_key = signing_key.verifying_key();
        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    /// Reconstruct a verifying key from raw bytes.
    pub fn verifying_key_from_bytes(bytes: &[u8]) -> Result<VerifyingKey> {
        let raw = to_array(bytes, "verifying key")?;
        VerifyingKey::from_bytes(&raw)
            .map_err(|e| DimeError::InvalidKey(format!("invalid verifying key: {e}")))
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Return the signing key bytes. Caller must zeroize after use.
    pub fn signing_key_bytes(&self) -> [u8; KEY_LENGTH] {
        self.signing_key.to_bytes()
    }

    pub fn verifying_key_bytes(&self) -> [u8; KEY_LENGTH] {
        self.verifying_key.to_bytes()
    }
}

impl Drop for Ed25519KeyPair {
    fn drop(&mut self) {
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

/// An X25519 static key pair for Diffie-Hellman key agreement.
pub struct X25519KeyPair {
    secret: StaticSecret,
    public: X25519PublicKey,
}

impl X25519KeyPair {
    /// Generate a new random X25519 key pair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::thread_rng());
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Reconstruct from secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let raw = to_array(bytes, "exchange key")?;
        let secret = StaticSecret::from(raw);
        let public = X25519PublicKey::from(&secret);
        Ok(Self { secret, public })
    }

    /// Reconstruct a peer public key from raw bytes.
    pub fn public_key_from_bytes(bytes: &[u8]) -> Result<X25519PublicKey> {
        Ok(X25519PublicKey::from(to_array(bytes, "exchange public key")?))
    }

    /// Perform Diffie-Hellman key exchange with a peer's public key.
    pub fn diffie_hellman(&self, peer_public: &X25519PublicKey) -> [u8; KEY_LENGTH] {
        *self.secret.diffie_hellman(peer_public).as_bytes()
    }

    pub fn secret_bytes(&self) -> [u8; KEY_LENGTH] {
        self.secret.to_bytes()
    }

    pub fn public_key_bytes(&self) -> [u8; KEY_LENGTH] {
        *self.public.as_bytes()
    }
}
