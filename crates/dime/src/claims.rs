//! Claims: the named, typed attributes of an item.
//!
//! Every reserved claim has a short tag (`iss`, `sub`, `uid`, ...) and an
//! expected value type. The [`ClaimsStore`] enforces the type table on
//! every `put`, refuses mutation once its owning item is sealed, and never
//! lets a unique id be reassigned. Claims with names outside the reserved
//! vocabulary are kept opaquely so that they survive a decode/encode round
//! trip untouched.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{DimeError, Result};
use crate::time;

/// The reserved claim vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Claim {
    Ambits,
    Audience,
    Capabilities,
    CommonName,
    Context,
    ExpiresAt,
    IssuedAt,
    Issuer,
    IssuerUrl,
    Key,
    KeyId,
    Links,
    Methods,
    MimeType,
    Principals,
    PublicKey,
    Subject,
    SystemName,
    UniqueId,
}

/// Value type a reserved claim must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimType {
    Text,
    Uuid,
    Timestamp,
    List,
    KeyMaterial,
    Map,
}

/// Mutability and typing rule for a reserved claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimRule {
    pub kind: ClaimType,
    /// Whether the claim may be overwritten or removed once set on an
    /// unsealed item. No claim may change after sealing.
    pub reassignable: bool,
}

const ALL_CLAIMS: [Claim; 19] = [
    Claim::Ambits,
    Claim::Audience,
    Claim::Capabilities,
    Claim::CommonName,
    Claim::Context,
    Claim::ExpiresAt,
    Claim::IssuedAt,
    Claim::Issuer,
    Claim::IssuerUrl,
    Claim::Key,
    Claim::KeyId,
    Claim::Links,
    Claim::Methods,
    Claim::MimeType,
    Claim::Principals,
    Claim::PublicKey,
    Claim::Subject,
    Claim::SystemName,
    Claim::UniqueId,
];

impl Claim {
    /// Short tag used as the JSON member name.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ambits => "amb",
            Self::Audience => "aud",
            Self::Capabilities => "cap",
            Self::CommonName => "cmn",
            Self::Context => "ctx",
            Self::ExpiresAt => "exp",
            Self::IssuedAt => "iat",
            Self::Issuer => "iss",
            Self::IssuerUrl => "isu",
            Self::Key => "key",
            Self::KeyId => "kid",
            Self::Links => "lnk",
            Self::Methods => "mtd",
            Self::MimeType => "mim",
            Self::Principals => "pri",
            Self::PublicKey => "pub",
            Self::Subject => "sub",
            Self::SystemName => "sys",
            Self::UniqueId => "uid",
        }
    }

    /// Resolve a tag to a reserved claim.
    pub fn from_tag(tag: &str) -> Option<Self> {
        ALL_CLAIMS.iter().copied().find(|c| c.tag() == tag)
    }

    pub fn rule(&self) -> ClaimRule {
        let kind = match self {
            Self::Audience | Self::Issuer | Self::KeyId | Self::Subject | Self::UniqueId => {
                ClaimType::Uuid
            }
            Self::ExpiresAt | Self::IssuedAt => ClaimType::Timestamp,
            Self::Ambits | Self::Capabilities | Self::Methods => ClaimType::List,
            Self::Key | Self::PublicKey => ClaimType::KeyMaterial,
            Self::Principals => ClaimType::Map,
            Self::CommonName
            | Self::Context
            | Self::IssuerUrl
            | Self::Links
            | Self::MimeType
            | Self::SystemName => ClaimType::Text,
        };
        ClaimRule {
            kind,
            reassignable: !matches!(self, Self::UniqueId),
        }
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Encoded key material (packed Base58), kept distinct from plain text so
/// that it cannot be confused with other string claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial(pub String);

/// A typed claim value.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimValue {
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    List(Vec<String>),
    KeyMaterial(String),
    Map(Map<String, Value>),
    /// Value of a claim outside the reserved vocabulary.
    Other(Value),
}

impl ClaimValue {
    fn kind(&self) -> Option<ClaimType> {
        match self {
            Self::Text(_) => Some(ClaimType::Text),
            Self::Uuid(_) => Some(ClaimType::Uuid),
            Self::Timestamp(_) => Some(ClaimType::Timestamp),
            Self::List(_) => Some(ClaimType::List),
            Self::KeyMaterial(_) => Some(ClaimType::KeyMaterial),
            Self::Map(_) => Some(ClaimType::Map),
            Self::Other(_) => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Text(s) | Self::KeyMaterial(s) => Value::String(s.clone()),
            Self::Uuid(u) => Value::String(u.to_string()),
            Self::Timestamp(t) => Value::String(time::to_timestamp(t)),
            Self::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
            Self::Map(map) => Value::Object(map.clone()),
            Self::Other(v) => v.clone(),
        }
    }

    fn from_json(claim: Claim, value: Value) -> Result<Self> {
        let mismatch = || {
            DimeError::Format(format!(
                "claim '{}' does not hold a {:?} value",
                claim.tag(),
                claim.rule().kind
            ))
        };
        Ok(match (claim.rule().kind, value) {
            (ClaimType::Text, Value::String(s)) => Self::Text(s),
            (ClaimType::KeyMaterial, Value::String(s)) => Self::KeyMaterial(s),
            (ClaimType::Uuid, Value::String(s)) => {
                Self::Uuid(Uuid::parse_str(&s).map_err(|_| mismatch())?)
            }
            (ClaimType::Timestamp, Value::String(s)) => Self::Timestamp(time::from_timestamp(&s)?),
            (ClaimType::List, Value::Array(items)) => Self::List(
                items
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => Ok(s),
                        _ => Err(mismatch()),
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            (ClaimType::Map, Value::Object(map)) => Self::Map(map),
            _ => return Err(mismatch()),
        })
    }
}

impl fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            Value::String(s) => f.write_str(&s),
            other => write!(f, "{other}"),
        }
    }
}

impl From<String> for ClaimValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for ClaimValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Uuid> for ClaimValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<DateTime<Utc>> for ClaimValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Vec<String>> for ClaimValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}

impl From<KeyMaterial> for ClaimValue {
    fn from(v: KeyMaterial) -> Self {
        Self::KeyMaterial(v.0)
    }
}

impl From<Map<String, Value>> for ClaimValue {
    fn from(v: Map<String, Value>) -> Self {
        Self::Map(v)
    }
}

/// Types that can be read back out of a claim.
pub trait FromClaimValue: Sized {
    fn from_claim_value(value: &ClaimValue) -> Option<Self>;
}

impl FromClaimValue for String {
    fn from_claim_value(value: &ClaimValue) -> Option<Self> {
        match value {
            ClaimValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromClaimValue for Uuid {
    fn from_claim_value(value: &ClaimValue) -> Option<Self> {
        match value {
            ClaimValue::Uuid(u) => Some(*u),
            _ => None,
        }
    }
}

impl FromClaimValue for DateTime<Utc> {
    fn from_claim_value(value: &ClaimValue) -> Option<Self> {
        match value {
            ClaimValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

impl FromClaimValue for Vec<String> {
    fn from_claim_value(value: &ClaimValue) -> Option<Self> {
        match value {
            ClaimValue::List(items) => Some(items.clone()),
            _ => None,
        }
    }
}

impl FromClaimValue for KeyMaterial {
    fn from_claim_value(value: &ClaimValue) -> Option<Self> {
        match value {
            ClaimValue::KeyMaterial(s) => Some(KeyMaterial(s.clone())),
            _ => None,
        }
    }
}

impl FromClaimValue for Map<String, Value> {
    fn from_claim_value(value: &ClaimValue) -> Option<Self> {
        match value {
            ClaimValue::Map(map) => Some(map.clone()),
            _ => None,
        }
    }
}

/// An ordered mapping of claim name to typed value, owned by one item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimsStore {
    claims: BTreeMap<String, ClaimValue>,
    sealed: bool,
}

impl ClaimsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a reserved claim.
    ///
    /// Fails with [`DimeError::IllegalState`] once sealed or when
    /// reassigning a unique id, and with [`DimeError::InvalidArgument`]
    /// when the value type does not match the claim's type.
    pub fn put(&mut self, claim: Claim, value: impl Into<ClaimValue>) -> Result<()> {
        self.ensure_mutable(claim)?;
        let value = value.into();
        let rule = claim.rule();
        if value.kind() != Some(rule.kind) {
            return Err(DimeError::InvalidArgument(format!(
                "claim '{}' expects a {:?} value",
                claim.tag(),
                rule.kind
            )));
        }
        self.claims.insert(claim.tag().to_string(), value);
        Ok(())
    }

    /// Read a reserved claim.
    ///
    /// Returns `Ok(None)` when unset and fails when the stored value is not
    /// of the requested type.
    pub fn get<T: FromClaimValue>(&self, claim: Claim) -> Result<Option<T>> {
        match self.claims.get(claim.tag()) {
            None => Ok(None),
            Some(value) => T::from_claim_value(value).map(Some).ok_or_else(|| {
                DimeError::InvalidArgument(format!(
                    "claim '{}' holds a value of a different type",
                    claim.tag()
                ))
            }),
        }
    }

    /// Remove a reserved claim, returning its previous value.
    pub fn remove(&mut self, claim: Claim) -> Result<Option<ClaimValue>> {
        self.ensure_mutable(claim)?;
        Ok(self.claims.remove(claim.tag()))
    }

    pub fn has(&self, claim: Claim) -> bool {
        self.claims.contains_key(claim.tag())
    }

    /// Set a claim outside the reserved vocabulary.
    pub fn put_extension(&mut self, name: &str, value: Value) -> Result<()> {
        if Claim::from_tag(name).is_some() {
            return Err(DimeError::InvalidArgument(format!(
                "'{name}' is a reserved claim name"
            )));
        }
        if self.sealed {
            return Err(DimeError::IllegalState(format!(
                "unable to set claim '{name}', item is sealed"
            )));
        }
        self.claims.insert(name.to_string(), ClaimValue::Other(value));
        Ok(())
    }

    /// Read a claim outside the reserved vocabulary.
    pub fn extension(&self, name: &str) -> Option<&Value> {
        match self.claims.get(name) {
            Some(ClaimValue::Other(v)) => Some(v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Iterate over `(tag, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClaimValue)> {
        self.claims.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    /// Serialize to the canonical claims JSON.
    pub fn to_json(&self) -> Result<String> {
        let object: Map<String, Value> = self
            .claims
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Ok(serde_json::to_string(&Value::Object(object))?)
    }

    /// Parse claims JSON. Reserved claims are type-checked; anything else is
    /// preserved as-is.
    pub fn from_json(json: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(json)
            .map_err(|e| DimeError::Format(format!("invalid claims JSON: {e}")))?;
        let Value::Object(object) = value else {
            return Err(DimeError::Format("claims must be a JSON object".into()));
        };
        let mut claims = BTreeMap::new();
        for (name, value) in object {
            let parsed = match Claim::from_tag(&name) {
                Some(claim) => ClaimValue::from_json(claim, value)?,
                None => ClaimValue::Other(value),
            };
            claims.insert(name, parsed);
        }
        Ok(Self {
            claims,
            sealed: false,
        })
    }

    fn ensure_mutable(&self, claim: Claim) -> Result<()> {
        if self.sealed {
            return Err(DimeError::IllegalState(format!(
                "unable to change claim '{}', item is sealed",
                claim.tag()
            )));
        }
        if !claim.rule().reassignable && self.has(claim) {
            return Err(DimeError::IllegalState(format!(
                "claim '{}' cannot be reassigned",
                claim.tag()
            )));
        }
        Ok(())
    }
}
