//! Cryptographic suites for DiME.
//!
//! Every signature, thumbprint and link is tagged with the name of the
//! suite that produced it, so algorithms can change without breaking
//! existing items. This module provides:
//! - the [`CryptoSuite`] trait the rest of the crate calls into
//! - the built-in `DSC` (default) and `STN` suites
//! - Ed25519 signing, X25519 + HKDF-SHA256 key agreement,
//!   ChaCha20-Poly1305 encryption

pub mod derivation;
pub mod encryption;
pub mod keys;
pub mod signing;

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::capability::KeyCapability;
use crate::error::{DimeError, Result};

use keys::{Ed25519KeyPair, X25519KeyPair};

/// Name of the suite used when none is given.
pub const DEFAULT_SUITE: &str = "DSC";

/// Name of the legacy suite, which hashes with SHA-256.
pub const LEGACY_SUITE: &str = "STN";

/// Raw key material produced by a suite.
pub struct RawKey {
    pub secret: Zeroizing<Vec<u8>>,
    /// `None` for symmetric keys.
    pub public: Option<Vec<u8>>,
}

/// A named set of cryptographic primitives.
pub trait CryptoSuite: Send + Sync {
    /// Suite name embedded alongside signatures and links.
    fn name(&self) -> &'static str;

    /// Profile byte written into packed key material.
    fn profile(&self) -> u8;

    fn generate_key(&self, capability: KeyCapability) -> Result<RawKey>;

    fn sign(&self, data: &[u8], secret_key: &[u8]) -> Result<Vec<u8>>;

    /// Returns `true` iff `signature` is valid for `data` under `public_key`.
    fn verify(&self, data: &[u8], signature: &[u8], public_key: &[u8]) -> bool;

    fn hash(&self, data: &[u8]) -> Vec<u8>;

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>>;

    /// Agree on a symmetric key from a local exchange secret and a remote
    /// exchange public key.
    fn generate_shared_secret(
        &self,
        local_secret: &[u8],
        remote_public: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>>;
}

#[derive(Debug, Clone, Copy)]
enum HashAlgorithm {
    Blake3,
    Sha256,
}

/// Ed25519 / X25519 / ChaCha20-Poly1305 with a configurable hash.
struct StandardSuite {
    name: &'static str,
    profile: u8,
    hash: HashAlgorithm,
}

impl CryptoSuite for StandardSuite {
    fn name(&self) -> &'static str {
        self.name
    }

    fn profile(&self) -> u8 {
        self.profile
    }

    fn generate_key(&self, capability: KeyCapability) -> Result<RawKey> {
        Ok(match capability {
            KeyCapability::Sign => {
                let kp = Ed25519KeyPair::generate();
                RawKey {
                    secret: Zeroizing::new(kp.signing_key_bytes().to_vec()),
                    public: Some(kp.verifying_key_bytes().to_vec()),
                }
            }
            KeyCapability::Exchange => {
                let kp = X25519KeyPair::generate();
                RawKey {
                    secret: Zeroizing::new(kp.secret_bytes().to_vec()),
                    public: Some(kp.public_key_bytes().to_vec()),
                }
            }
            KeyCapability::Encrypt => RawKey {
                secret: Zeroizing::new(encryption::generate_key().to_vec()),
                public: None,
            },
        })
    }

    fn sign(&self, data: &[u8], secret_key: &[u8]) -> Result<Vec<u8>> {
        signing::sign(secret_key, data)
    }

    fn verify(&self, data: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        signing::verify(public_key, data, signature).is_ok()
    }

    fn hash(&self, data: &[u8]) -> Vec<u8> {
        match self.hash {
            HashAlgorithm::Blake3 => blake3::hash(data).as_bytes().to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        }
    }

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        encryption::encrypt(key, plaintext)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        encryption::decrypt(key, ciphertext)
    }

    fn generate_shared_secret(
        &self,
        local_secret: &[u8],
        remote_public: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        let key = derivation::shared_secret(local_secret, remote_public)?;
        Ok(Zeroizing::new(key.to_vec()))
    }
}

static DSC: StandardSuite = StandardSuite {
    name: DEFAULT_SUITE,
    profile: 1,
    hash: HashAlgorithm::Blake3,
};

static STN: StandardSuite = StandardSuite {
    name: LEGACY_SUITE,
    profile: 2,
    hash: HashAlgorithm::Sha256,
};

static SUITES: [&StandardSuite; 2] = [&DSC, &STN];

/// Look up a suite by name.
pub fn suite(name: &str) -> Result<&'static dyn CryptoSuite> {
    SUITES
        .iter()
        .find(|s| s.name == name)
        .map(|s| *s as &'static dyn CryptoSuite)
        .ok_or_else(|| DimeError::UnsupportedSuite(name.to_string()))
}

/// Look up a suite by the profile byte found in packed key material.
pub fn suite_for_profile(profile: u8) -> Result<&'static dyn CryptoSuite> {
    SUITES
        .iter()
        .find(|s| s.profile == profile)
        .map(|s| *s as &'static dyn CryptoSuite)
        .ok_or_else(|| DimeError::UnsupportedSuite(format!("profile {profile}")))
}

/// The default suite.
pub fn default_suite() -> &'static dyn CryptoSuite {
    &DSC
}

/// Hash `data` under the named suite and return lowercase hex.
pub fn thumbprint(suite_name: &str, data: &[u8]) -> Result<String> {
    Ok(hex::encode(suite(suite_name)?.hash(data)))
}
