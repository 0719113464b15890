//! Message items: a payload plus issuer, audience and validity claims.
//!
//! Encoded as `MSG.claims.payload[.signature]`. The payload may be
//! encrypted with an `encrypt` key before it is set.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::claims::Claim;
use crate::codec::{self, COMPONENT_DELIMITER};
use crate::error::{DimeError, Result};
use crate::time::{self, ClockPolicy};

use super::key::Key;
use super::{DimeItem, ItemCore};

pub const HEADER: &str = "MSG";

#[derive(Debug, Clone)]
pub struct Message {
    core: ItemCore,
    /// Base64url payload component.
    payload: Option<String>,
}

impl Message {
    /// Create an unsigned message. `valid_for` is in seconds.
    pub fn new(issuer_id: Uuid, audience_id: Option<Uuid>, valid_for: Option<i64>) -> Result<Self> {
        Self::with_clock(issuer_id, audience_id, valid_for, &ClockPolicy::default())
    }

    /// Like [`Message::new`], stamped with `clock`.
    pub fn with_clock(
        issuer_id: Uuid,
        audience_id: Option<Uuid>,
        valid_for: Option<i64>,
        clock: &ClockPolicy,
    ) -> Result<Self> {
        let issued_at = clock.now();
        let expires_at = valid_for
            .map(|seconds| time::offset(&issued_at, seconds))
            .transpose()?;
        let mut core = ItemCore::new()?;
        let claims = core.claims_mut();
        claims.put(Claim::Issuer, issuer_id)?;
        claims.put(Claim::IssuedAt, issued_at)?;
        if let Some(audience) = audience_id {
            claims.put(Claim::Audience, audience)?;
        }
        if let Some(expires_at) = expires_at {
            claims.put(Claim::ExpiresAt, expires_at)?;
        }
        Ok(Self { core, payload: None })
    }

    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let components = codec::split_item(encoded, HEADER, 3, 4)?;
        let claims = codec::decode_claims(components[1])?;
        let (unsigned, signature) = match components.len() {
            4 => codec::split_last(encoded, COMPONENT_DELIMITER)
                .map(|(u, s)| (u, Some(s)))
                .ok_or_else(|| DimeError::Format("missing message signature".into()))?,
            _ => (encoded, None),
        };
        let message = Self {
            core: ItemCore::decoded(claims, unsigned, signature),
            payload: Some(components[2].to_string()),
        };
        message.validate()?;
        Ok(message)
    }

    pub fn issuer_id(&self) -> Result<Option<Uuid>> {
        self.core.claims().get(Claim::Issuer)
    }

    pub fn audience_id(&self) -> Result<Option<Uuid>> {
        self.core.claims().get(Claim::Audience)
    }

    pub fn issued_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.core.claims().get(Claim::IssuedAt)
    }

    pub fn expires_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.core.claims().get(Claim::ExpiresAt)
    }

    pub fn context(&self) -> Result<Option<String>> {
        self.core.claims().get(Claim::Context)
    }

    pub fn set_context(&mut self, context: &str) -> Result<()> {
        self.core.claims_mut().put(Claim::Context, context)
    }

    pub fn mime_type(&self) -> Result<Option<String>> {
        self.core.claims().get(Claim::MimeType)
    }

    pub fn set_mime_type(&mut self, mime_type: &str) -> Result<()> {
        self.core.claims_mut().put(Claim::MimeType, mime_type)
    }

    pub fn set_payload(&mut self, payload: &[u8]) -> Result<()> {
        if self.is_sealed() {
            return Err(DimeError::IllegalState(
                "unable to set payload, message is sealed".into(),
            ));
        }
        if payload.is_empty() {
            return Err(DimeError::InvalidArgument("payload must not be empty".into()));
        }
        self.core.invalidate();
        self.payload = Some(codec::encode_b64(payload));
        Ok(())
    }

    /// Encrypt `payload` with an `encrypt` key and set the result.
    pub fn set_encrypted_payload(&mut self, payload: &[u8], key: &Key) -> Result<()> {
        let sealed = key.encrypt(payload)?;
        self.set_payload(&sealed)
    }

    pub fn payload(&self) -> Result<Vec<u8>> {
        let payload = self
            .payload
            .as_deref()
            .ok_or_else(|| DimeError::IllegalState("message has no payload".into()))?;
        codec::decode_b64(payload)
    }

    pub fn decrypted_payload(&self, key: &Key) -> Result<Vec<u8>> {
        key.decrypt(&self.payload()?)
    }

    /// Check the validity window against `clock`.
    pub fn verify_validity(&self, clock: &ClockPolicy) -> Result<()> {
        clock.check_validity(self.issued_at()?.as_ref(), self.expires_at()?.as_ref())
    }

    /// Check the validity window and the signature.
    pub fn verify(&self, key: &Key, clock: &ClockPolicy) -> Result<()> {
        self.verify_validity(clock)?;
        self.verify_signature(key)
    }
}

impl DimeItem for Message {
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
        let payload = self
            .payload
            .as_deref()
            .ok_or_else(|| DimeError::IllegalState("message has no payload".into()))?;
        Ok(format!(
            "{HEADER}{COMPONENT_DELIMITER}{}{COMPONENT_DELIMITER}{payload}",
            codec::encode_claims(self.core.claims())?
        ))
    }

    fn validate(&self) -> Result<()> {
        self.unique_id()?;
        if self.payload.is_none() {
            return Err(DimeError::IllegalState("message has no payload".into()));
        }
        if let (Some(iat), Some(exp)) = (self.issued_at()?, self.expires_at()?) {
            if exp < iat {
                return Err(DimeError::Format("message expires before it is issued".into()));
            }
        }
        Ok(())
    }
}
