//! Shared-secret derivation using X25519 and HKDF-SHA256.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{DimeError, Result};

use super::keys::X25519KeyPair;

/// HKDF info string binding derived keys to their purpose.
const SHARED_SECRET_CONTEXT: &str = "dime/key-agreement/encrypt";

/// Derive a 32-byte key from input key material and a context string.
///
/// Uses HKDF-SHA256 (RFC 5869) with the input as IKM and the context as
/// info.
pub fn derive_key(ikm: &[u8], context: &str) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut output = [0u8; 32];
    hk.expand(context.as_bytes(), &mut output)
        .map_err(|e| DimeError::Crypto(format!("HKDF expand failed: {e}")))?;
    Ok(output)
}

/// Agree on a symmetric key from a local X25519 secret and a remote
/// X25519 public key. Both sides arrive at the same key.
pub fn shared_secret(local_secret: &[u8], remote_public: &[u8]) -> Result<[u8; 32]> {
    let local = X25519KeyPair::from_secret_bytes(local_secret)?;
    let remote = X25519KeyPair::public_key_from_bytes(remote_public)?;
    let mut shared = local.diffie_hellman(&remote);
    let derived = derive_key(&shared, SHARED_SECRET_CONTEXT);
    shared.zeroize();
    derived
}
