//! Envelopes: the ordered, optionally signed container that is actually
//! transmitted or stored.
//!
//! Encoded as `Di[.claims]:item:item...[:signature]`. An envelope with
//! claims names an issuer and must be signed before export; an anonymous
//! envelope has no claims and can never be signed.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use log::debug;
use uuid::Uuid;

use crate::claims::{Claim, ClaimsStore};
use crate::codec::{self, COMPONENT_DELIMITER, SECTION_DELIMITER};
use crate::crypto::DEFAULT_SUITE;
use crate::error::{DimeError, Result};
use crate::item::{DimeItem, Item, Key};
use crate::time;

pub const HEADER: &str = "Di";

#[derive(Debug, Clone, Default)]
pub struct Envelope {
    claims: Option<ClaimsStore>,
    items: Vec<Item>,
    /// Base64url signature section, kept verbatim.
    signature: Option<String>,
    /// Encoding without the signature section.
    encoded: OnceLock<String>,
}

impl Envelope {
    /// An envelope without issuer. It cannot be signed.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An envelope issued by `issuer_id`. It must be signed before export.
    pub fn new(issuer_id: Uuid, context: Option<&str>) -> Result<Self> {
        let mut claims = ClaimsStore::new();
        claims.put(Claim::Issuer, issuer_id)?;
        claims.put(Claim::IssuedAt, time::now())?;
        if let Some(context) = context {
            claims.put(Claim::Context, context)?;
        }
        Ok(Self {
            claims: Some(claims),
            ..Self::default()
        })
    }

    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let sections: Vec<&str> = encoded.split(SECTION_DELIMITER).collect();
        let header: Vec<&str> = sections[0].split(COMPONENT_DELIMITER).collect();
        if header[0] != HEADER {
            return Err(DimeError::Format(format!(
                "unexpected envelope header '{}'",
                header[0]
            )));
        }
        let claims = match header.len() {
            1 => None,
            2 => Some(codec::decode_claims(header[1])?),
            n => {
                return Err(DimeError::Format(format!(
                    "unexpected number of envelope header components: {n}"
                )));
            }
        };

        let (item_sections, unsigned, signature) = if claims.is_some() {
            if sections.len() < 3 {
                return Err(DimeError::Format(
                    "issued envelope must hold items and a signature".into(),
                ));
            }
            let (unsigned, signature) = codec::split_last(encoded, SECTION_DELIMITER)
                .ok_or_else(|| DimeError::Format("missing envelope signature".into()))?;
            (&sections[1..sections.len() - 1], unsigned, Some(signature))
        } else {
            if sections.len() < 2 {
                return Err(DimeError::Format("envelope holds no items".into()));
            }
            (&sections[1..], encoded, None)
        };

        let items = item_sections
            .iter()
            .map(|section| Item::from_encoded(section))
            .collect::<Result<Vec<_>>>()?;
        let mut claims = claims;
        if signature.is_some() {
            if let Some(claims) = claims.as_mut() {
                claims.seal();
            }
        }
        let envelope = Self {
            claims,
            items,
            signature: signature.map(str::to_string),
            encoded: OnceLock::new(),
        };
        let _ = envelope.encoded.set(unsigned.to_string());
        debug!("Decoded envelope with {} item(s)", envelope.items.len());
        Ok(envelope)
    }

    pub fn is_anonymous(&self) -> bool {
        self.claims.is_none()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn issuer_id(&self) -> Result<Option<Uuid>> {
        self.claim(Claim::Issuer)
    }

    pub fn issued_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.claim(Claim::IssuedAt)
    }

    pub fn context(&self) -> Result<Option<String>> {
        self.claim(Claim::Context)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    /// Append an item. Fails once the envelope is signed.
    pub fn add_item(&mut self, item: impl Into<Item>) -> Result<()> {
        self.ensure_unsigned()?;
        self.encoded.take();
        self.items.push(item.into());
        Ok(())
    }

    /// Remove the item with `unique_id`. Fails once the envelope is signed.
    pub fn remove_item(&mut self, unique_id: Uuid) -> Result<Option<Item>> {
        self.ensure_unsigned()?;
        let position = self
            .items
            .iter()
            .position(|item| item.unique_id().map(|id| id == unique_id).unwrap_or(false));
        Ok(position.map(|index| {
            self.encoded.take();
            self.items.remove(index)
        }))
    }

    /// Sign the envelope, freezing its item list.
    pub fn sign(&mut self, key: &Key) -> Result<()> {
        if self.is_anonymous() {
            return Err(DimeError::IllegalState(
                "an anonymous envelope cannot be signed".into(),
            ));
        }
        if self.items.is_empty() {
            return Err(DimeError::IllegalState(
                "an empty envelope cannot be signed".into(),
            ));
        }
        self.ensure_unsigned()?;
        let signature = key.sign_data(self.encoded()?.as_bytes())?;
        self.signature = Some(codec::encode_b64(&signature));
        if let Some(claims) = self.claims.as_mut() {
            claims.seal();
        }
        debug!("Signed envelope with {} item(s)", self.items.len());
        Ok(())
    }

    /// Verify the envelope signature.
    pub fn verify(&self, key: &Key) -> Result<()> {
        let signature = self
            .signature
            .as_deref()
            .ok_or_else(|| DimeError::Integrity("envelope is not signed".into()))?;
        key.verify_data(self.encoded()?.as_bytes(), &codec::decode_b64(signature)?)
    }

    /// The signed text: everything before the signature section.
    pub fn encoded(&self) -> Result<&str> {
        if let Some(encoded) = self.encoded.get() {
            return Ok(encoded);
        }
        let value = self.encode_unsigned()?;
        Ok(self.encoded.get_or_init(|| value))
    }

    /// Full canonical encoding. An issued envelope must be signed first.
    pub fn to_encoded(&self) -> Result<String> {
        if !self.is_anonymous() && !self.is_signed() {
            return Err(DimeError::IllegalState(
                "an issued envelope must be signed before export".into(),
            ));
        }
        let encoded = self.encoded()?;
        Ok(match &self.signature {
            Some(signature) => format!("{encoded}{SECTION_DELIMITER}{signature}"),
            None => encoded.to_string(),
        })
    }

    pub fn thumbprint(&self) -> Result<String> {
        crate::crypto::thumbprint(DEFAULT_SUITE, self.to_encoded()?.as_bytes())
    }

    fn encode_unsigned(&self) -> Result<String> {
        if self.items.is_empty() {
            return Err(DimeError::IllegalState("envelope holds no items".into()));
        }
        let mut encoded = HEADER.to_string();
        if let Some(claims) = &self.claims {
            encoded.push(COMPONENT_DELIMITER);
            encoded.push_str(&codec::encode_claims(claims)?);
        }
        for item in &self.items {
            encoded.push(SECTION_DELIMITER);
            encoded.push_str(&item.to_encoded()?);
        }
        Ok(encoded)
    }

    fn claim<T: crate::claims::FromClaimValue>(&self, claim: Claim) -> Result<Option<T>> {
        match &self.claims {
            Some(claims) => claims.get(claim),
            None => Ok(None),
        }
    }

    fn ensure_unsigned(&self) -> Result<()> {
        if self.is_signed() {
            return Err(DimeError::IllegalState("envelope is signed".into()));
        }
        Ok(())
    }
}
