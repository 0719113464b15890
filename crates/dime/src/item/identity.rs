//! Identity items.
//!
//! An identity binds a subject id to a public key and a capability set for
//! a validity window. When the issuer is not a trusted root, the issuer's
//! own identity is embedded as the trust chain, recursively.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::capability::Capability;
use crate::claims::{Claim, ClaimsStore, KeyMaterial};
use crate::codec::{self, COMPONENT_DELIMITER};
use crate::error::{DimeError, Result};
use crate::trust::{verify, IntegrityState, KeyRing};

use super::key::Key;
use super::{DimeItem, ItemCore};

pub const HEADER: &str = "ID";

/// A signed identity.
#[derive(Debug, Clone)]
pub struct Identity {
    core: ItemCore,
    trust_chain: Option<Box<Identity>>,
}

impl Identity {
    pub(crate) fn unsigned(claims: ClaimsStore, trust_chain: Option<Identity>) -> Self {
        Self {
            core: ItemCore::with_claims(claims),
            trust_chain: trust_chain.map(Box::new),
        }
    }

    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let components = codec::split_item(encoded, HEADER, 3, 4)?;
        let claims = codec::decode_claims(components[1])?;
        let trust_chain = match components.len() {
            4 => {
                let chain = codec::decode_b64(components[2])?;
                let chain = String::from_utf8(chain)
                    .map_err(|_| DimeError::Format("trust chain is not UTF-8".into()))?;
                Some(Box::new(Identity::from_encoded(&chain)?))
            }
            _ => None,
        };
        let (unsigned, signature) = codec::split_last(encoded, COMPONENT_DELIMITER)
            .ok_or_else(|| DimeError::Format("identity without signature".into()))?;
        let identity = Self {
            core: ItemCore::decoded(claims, unsigned, Some(signature)),
            trust_chain,
        };
        identity.validate()?;
        Ok(identity)
    }

    pub fn subject_id(&self) -> Result<Uuid> {
        self.required(Claim::Subject)
    }

    pub fn issuer_id(&self) -> Result<Uuid> {
        self.required(Claim::Issuer)
    }

    pub fn issued_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.core.claims().get(Claim::IssuedAt)
    }

    pub fn expires_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.core.claims().get(Claim::ExpiresAt)
    }

    /// Packed public key material.
    pub fn public_key_material(&self) -> Result<String> {
        Ok(self.required::<KeyMaterial>(Claim::PublicKey)?.0)
    }

    /// The identity's public key as a key item.
    pub fn public_key(&self) -> Result<Key> {
        Key::from_public(&self.public_key_material()?)
    }

    pub fn capabilities(&self) -> Result<Vec<Capability>> {
        self.core
            .claims()
            .get::<Vec<String>>(Claim::Capabilities)?
            .unwrap_or_default()
            .iter()
            .map(|name| name.parse())
            .collect()
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities()
            .map(|caps| caps.contains(&capability))
            .unwrap_or(false)
    }

    pub fn ambits(&self) -> Result<Vec<String>> {
        Ok(self
            .core
            .claims()
            .get::<Vec<String>>(Claim::Ambits)?
            .unwrap_or_default())
    }

    pub fn has_ambit(&self, ambit: &str) -> bool {
        self.ambits()
            .map(|ambits| ambits.iter().any(|a| a == ambit))
            .unwrap_or(false)
    }

    pub fn methods(&self) -> Result<Vec<String>> {
        Ok(self
            .core
            .claims()
            .get::<Vec<String>>(Claim::Methods)?
            .unwrap_or_default())
    }

    pub fn principals(&self) -> Result<Option<Map<String, Value>>> {
        self.core.claims().get(Claim::Principals)
    }

    pub fn system_name(&self) -> Result<Option<String>> {
        self.core.claims().get(Claim::SystemName)
    }

    /// The issuer's identity, when embedded.
    pub fn trust_chain(&self) -> Option<&Identity> {
        self.trust_chain.as_deref()
    }

    /// Subject and issuer coincide and the identity carries `self`.
    pub fn is_self_signed(&self) -> bool {
        match (self.subject_id(), self.issuer_id()) {
            (Ok(subject), Ok(issuer)) => {
                subject == issuer && self.has_capability(Capability::SelfIssued)
            }
            _ => false,
        }
    }

    /// Evaluate the trust state of this identity.
    ///
    /// With `trusted` set, the chain is walked until an identity issued by
    /// `trusted` is found. Otherwise the chain must end at a root held by
    /// `key_ring`.
    pub fn verify(&self, key_ring: &KeyRing, trusted: Option<&Identity>) -> IntegrityState {
        verify::verify_identity(self, key_ring, trusted)
    }

    fn required<T: crate::claims::FromClaimValue>(&self, claim: Claim) -> Result<T> {
        self.core
            .claims()
            .get::<T>(claim)?
            .ok_or_else(|| DimeError::Format(format!("identity is missing claim '{claim}'")))
    }
}

impl DimeItem for Identity {
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
        let mut encoded = format!(
            "{HEADER}{COMPONENT_DELIMITER}{}",
            codec::encode_claims(self.core.claims())?
        );
        if let Some(chain) = &self.trust_chain {
            encoded.push(COMPONENT_DELIMITER);
            encoded.push_str(&codec::encode_b64(chain.to_encoded()?.as_bytes()));
        }
        Ok(encoded)
    }

    fn validate(&self) -> Result<()> {
        self.unique_id()?;
        self.subject_id()?;
        self.issuer_id()?;
        self.public_key_material()?;
        self.capabilities()?;
        Ok(())
    }
}
