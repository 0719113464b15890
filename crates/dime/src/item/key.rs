//! Key items.
//!
//! A key carries packed key material in its `key` (secret) and `pub`
//! (public) claims. Packing prefixes the raw bytes with
//! `{0x04, profile, type | variant, 0x00}` and writes the result as
//! checksummed Base58, so a packed key names its own suite and purpose.

use chrono::{DateTime, Utc};
use log::debug;
use zeroize::Zeroizing;

use crate::base58;
use crate::capability::KeyCapability;
use crate::claims::{Claim, KeyMaterial};
use crate::codec::{self, COMPONENT_DELIMITER};
use crate::crypto::{self, CryptoSuite};
use crate::error::{DimeError, Result};
use crate::time;

use super::{DimeItem, ItemCore};

pub const HEADER: &str = "KEY";

const KEY_MARKER: u8 = 0x04;
const VARIANT_SECRET: u8 = 0x00;
const VARIANT_PUBLIC: u8 = 0x01;
const PREFIX_LENGTH: usize = 4;

/// Key material unpacked from its Base58 form.
struct Unpacked {
    suite: &'static dyn CryptoSuite,
    capability: KeyCapability,
    variant: u8,
    bytes: Zeroizing<Vec<u8>>,
}

fn pack(suite: &dyn CryptoSuite, capability: KeyCapability, variant: u8, raw: &[u8]) -> String {
    let mut data = Zeroizing::new(Vec::with_capacity(PREFIX_LENGTH + raw.len()));
    data.extend_from_slice(&[
        KEY_MARKER,
        suite.profile(),
        capability.type_bits() | variant,
        0x00,
    ]);
    data.extend_from_slice(raw);
    base58::encode(&data)
}

fn unpack(encoded: &str) -> Result<Unpacked> {
    let data = Zeroizing::new(base58::decode(encoded)?);
    if data.len() <= PREFIX_LENGTH || data[0] != KEY_MARKER {
        return Err(DimeError::InvalidKey("unrecognized key packing".into()));
    }
    let suite = crypto::suite_for_profile(data[1])?;
    let capability = KeyCapability::from_type_bits(data[2])
        .ok_or_else(|| DimeError::InvalidKey(format!("unknown key type 0x{:02x}", data[2])))?;
    Ok(Unpacked {
        suite,
        capability,
        variant: data[2] & 0x01,
        bytes: Zeroizing::new(data[PREFIX_LENGTH..].to_vec()),
    })
}

/// A key item.
#[derive(Debug, Clone)]
pub struct Key {
    core: ItemCore,
}

impl Key {
    /// Generate a new key under the default suite.
    pub fn generate(capability: KeyCapability) -> Result<Self> {
        Self::generate_with_suite(capability, crypto::DEFAULT_SUITE)
    }

    pub fn generate_with_suite(capability: KeyCapability, suite_name: &str) -> Result<Self> {
        let suite = crypto::suite(suite_name)?;
        let raw = suite.generate_key(capability)?;
        let mut core = ItemCore::new()?;
        let claims = core.claims_mut();
        claims.put(Claim::IssuedAt, time::now())?;
        claims.put(
            Claim::Key,
            KeyMaterial(pack(suite, capability, VARIANT_SECRET, &raw.secret)),
        )?;
        if let Some(public) = &raw.public {
            claims.put(
                Claim::PublicKey,
                KeyMaterial(pack(suite, capability, VARIANT_PUBLIC, public)),
            )?;
        }
        debug!("Generated {capability} key ({})", suite.name());
        Ok(Self { core })
    }

    /// Build a public-only key from packed public material.
    pub fn from_public(packed: &str) -> Result<Self> {
        let unpacked = unpack(packed)?;
        if unpacked.variant != VARIANT_PUBLIC {
            return Err(DimeError::InvalidKey("expected public key material".into()));
        }
        let mut core = ItemCore::new()?;
        core.claims_mut()
            .put(Claim::PublicKey, KeyMaterial(packed.to_string()))?;
        Ok(Self { core })
    }

    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let components = codec::split_item(encoded, HEADER, 2, 3)?;
        let claims = codec::decode_claims(components[1])?;
        let (unsigned, signature) = match components.len() {
            3 => codec::split_last(encoded, COMPONENT_DELIMITER)
                .map(|(u, s)| (u, Some(s)))
                .ok_or_else(|| DimeError::Format("missing key signature".into()))?,
            _ => (encoded, None),
        };
        let key = Self {
            core: ItemCore::decoded(claims, unsigned, signature),
        };
        key.validate()?;
        Ok(key)
    }

    /// What this key may be used for.
    pub fn capability(&self) -> Result<KeyCapability> {
        Ok(self.any_material()?.capability)
    }

    /// Name of the suite the key material belongs to.
    pub fn suite_name(&self) -> Result<&'static str> {
        Ok(self.any_material()?.suite.name())
    }

    /// Packed secret material, if this key holds it.
    pub fn secret(&self) -> Result<Option<String>> {
        Ok(self
            .core
            .claims()
            .get::<KeyMaterial>(Claim::Key)?
            .map(|k| k.0))
    }

    /// Packed public material. Symmetric keys have none.
    pub fn public(&self) -> Result<Option<String>> {
        Ok(self
            .core
            .claims()
            .get::<KeyMaterial>(Claim::PublicKey)?
            .map(|k| k.0))
    }

    pub fn has_secret(&self) -> bool {
        self.core.claims().has(Claim::Key)
    }

    pub fn issued_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.core.claims().get(Claim::IssuedAt)
    }

    /// A copy holding only the public part, under the same unique id.
    pub fn public_copy(&self) -> Result<Self> {
        let public = self
            .public()?
            .ok_or_else(|| DimeError::InvalidKey("key has no public part".into()))?;
        let mut core = ItemCore::with_claims(Default::default());
        let claims = core.claims_mut();
        claims.put(Claim::UniqueId, self.unique_id()?)?;
        if let Some(iat) = self.issued_at()? {
            claims.put(Claim::IssuedAt, iat)?;
        }
        claims.put(Claim::PublicKey, KeyMaterial(public))?;
        Ok(Self { core })
    }

    /// Sign raw data with the secret part of a `sign` key.
    ///
    /// The signature is prefixed with the profile byte of the key's suite.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let secret = self.secret_material(KeyCapability::Sign)?;
        let raw = secret.suite.sign(data, &secret.bytes)?;
        let mut signature = Vec::with_capacity(1 + raw.len());
        signature.push(secret.suite.profile());
        signature.extend_from_slice(&raw);
        Ok(signature)
    }

    /// Verify a suite-prefixed signature with the public part of a `sign`
    /// key. The signature's suite must be the key's suite.
    pub fn verify_data(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let public = self.public_material(KeyCapability::Sign)?;
        let (&profile, raw) = signature
            .split_first()
            .ok_or_else(|| DimeError::Format("empty signature".into()))?;
        let suite = crypto::suite_for_profile(profile)?;
        if suite.name() != public.suite.name() {
            return Err(DimeError::KeyMismatch(format!(
                "signature suite {} does not match key suite {}",
                suite.name(),
                public.suite.name()
            )));
        }
        if public.suite.verify(data, raw, &public.bytes) {
            Ok(())
        } else {
            Err(DimeError::Integrity("signature verification failed".into()))
        }
    }

    /// Agree on an `encrypt` key from this `exchange` key's secret and a
    /// remote `exchange` key's public part.
    pub fn generate_shared_secret(&self, remote: &Key) -> Result<Key> {
        let local = self.secret_material(KeyCapability::Exchange)?;
        let remote = remote.public_material(KeyCapability::Exchange)?;
        if local.suite.name() != remote.suite.name() {
            return Err(DimeError::KeyMismatch(format!(
                "cannot agree between suites {} and {}",
                local.suite.name(),
                remote.suite.name()
            )));
        }
        let shared = local
            .suite
            .generate_shared_secret(&local.bytes, &remote.bytes)?;
        let mut core = ItemCore::new()?;
        let claims = core.claims_mut();
        claims.put(Claim::IssuedAt, time::now())?;
        claims.put(
            Claim::Key,
            KeyMaterial(pack(
                local.suite,
                KeyCapability::Encrypt,
                VARIANT_SECRET,
                &shared,
            )),
        )?;
        Ok(Key { core })
    }

    /// Encrypt with an `encrypt` key.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let secret = self.secret_material(KeyCapability::Encrypt)?;
        secret.suite.encrypt(plaintext, &secret.bytes)
    }

    /// Decrypt with an `encrypt` key.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let secret = self.secret_material(KeyCapability::Encrypt)?;
        secret.suite.decrypt(ciphertext, &secret.bytes)
    }

    fn any_material(&self) -> Result<Unpacked> {
        match (self.public()?, self.secret()?) {
            (Some(packed), _) | (None, Some(packed)) => unpack(&packed),
            (None, None) => Err(DimeError::InvalidKey("key holds no material".into())),
        }
    }

    fn secret_material(&self, capability: KeyCapability) -> Result<Unpacked> {
        let packed = self
            .secret()?
            .ok_or_else(|| DimeError::InvalidKey("key has no secret part".into()))?;
        Self::expect_material(unpack(&packed)?, capability, VARIANT_SECRET)
    }

    fn public_material(&self, capability: KeyCapability) -> Result<Unpacked> {
        let packed = self
            .public()?
            .ok_or_else(|| DimeError::InvalidKey("key has no public part".into()))?;
        Self::expect_material(unpack(&packed)?, capability, VARIANT_PUBLIC)
    }

    fn expect_material(unpacked: Unpacked, capability: KeyCapability, variant: u8) -> Result<Unpacked> {
        if unpacked.capability != capability {
            return Err(DimeError::InvalidKey(format!(
                "key is a {} key, {capability} required",
                unpacked.capability
            )));
        }
        if unpacked.variant != variant {
            return Err(DimeError::InvalidKey("key variant mismatch".into()));
        }
        Ok(unpacked)
    }
}

impl DimeItem for Key {
    fn header(&self) -> &'static str {
        HEADER
    }

    fn core(&self) -> &ItemCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ItemCore {
        &mut self.core
    }

    fn encode_unsigned(&self) -> Result<String> {
        Ok(format!(
            "{HEADER}{COMPONENT_DELIMITER}{}",
            codec::encode_claims(self.core.claims())?
        ))
    }

    fn validate(&self) -> Result<()> {
        self.any_material()?;
        if let (Some(secret), Some(public)) = (self.secret()?, self.public()?) {
            let secret = unpack(&secret)?;
            let public = unpack(&public)?;
            if secret.capability != public.capability || secret.suite.name() != public.suite.name()
            {
                return Err(DimeError::InvalidKey(
                    "secret and public parts do not belong together".into(),
                ));
            }
        }
        Ok(())
    }
}
