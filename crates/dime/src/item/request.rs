//! Identity issuing requests and identity issuance.
//!
//! A request carries the public key and requested capabilities of a
//! would-be identity. It is self-signed on creation, proving possession of
//! the secret key. An issuer turns a verified request into a signed
//! [`Identity`], either self-issued (a root) or issued under an existing
//! identity that holds the `issue` capability.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::capability::{self, Capability, KeyCapability};
use crate::claims::{Claim, ClaimsStore, KeyMaterial};
use crate::codec::{self, COMPONENT_DELIMITER};
use crate::error::{DimeError, Result};
use crate::time::{self, ClockPolicy};
use crate::trust::{IntegrityState, KeyRing};

use super::identity::Identity;
use super::key::Key;
use super::{DimeItem, ItemCore};

pub const HEADER: &str = "IIR";

/// Rules applied when issuing an identity under another identity.
///
/// Built builder-style:
///
/// ```
/// use dime::{Capability, IssuePolicy};
///
/// let policy = IssuePolicy::new(&[Capability::Generic, Capability::Identify])
///     .ambits(&["global"]);
/// ```
#[derive(Debug, Clone)]
pub struct IssuePolicy<'a> {
    allowed: Vec<Capability>,
    required: Vec<Capability>,
    key_ring: Option<&'a KeyRing>,
    ambits: Option<Vec<String>>,
    methods: Option<Vec<String>>,
}

impl<'a> IssuePolicy<'a> {
    /// Allow the given capabilities to be granted. The issuer must hold
    /// `issue` unless [`IssuePolicy::require`] says otherwise.
    pub fn new(allowed: &[Capability]) -> Self {
        Self {
            allowed: allowed.to_vec(),
            required: vec![Capability::Issue],
            key_ring: None,
            ambits: None,
            methods: None,
        }
    }

    /// Replace the capabilities the issuer must hold.
    pub fn require(mut self, required: &[Capability]) -> Self {
        self.required = required.to_vec();
        self
    }

    /// Use this key ring for root detection and its clock for validity.
    pub fn key_ring(mut self, key_ring: &'a KeyRing) -> Self {
        self.key_ring = Some(key_ring);
        self
    }

    pub fn ambits(mut self, ambits: &[&str]) -> Self {
        self.ambits = Some(ambits.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn methods(mut self, methods: &[&str]) -> Self {
        self.methods = Some(methods.iter().map(|m| m.to_string()).collect());
        self
    }

    fn clock(&self) -> ClockPolicy {
        self.key_ring.map(KeyRing::clock).unwrap_or_default()
    }
}

/// A self-signed request for an identity.
#[derive(Debug, Clone)]
pub struct IdentityIssuingRequest {
    core: ItemCore,
}

impl IdentityIssuingRequest {
    /// Create and self-sign a request for `key`.
    ///
    /// An empty capability list requests `generic`.
    pub fn generate(
        key: &Key,
        capabilities: &[Capability],
        principals: Option<Map<String, Value>>,
    ) -> Result<Self> {
        Self::generate_with_clock(key, capabilities, principals, &ClockPolicy::default())
    }

    /// Like [`IdentityIssuingRequest::generate`], stamped with `clock`.
    pub fn generate_with_clock(
        key: &Key,
        capabilities: &[Capability],
        principals: Option<Map<String, Value>>,
        clock: &ClockPolicy,
    ) -> Result<Self> {
        if key.capability()? != KeyCapability::Sign || !key.has_secret() {
            return Err(DimeError::InvalidKey(
                "an identity request needs a secret sign key".into(),
            ));
        }
        let public = key
            .public()?
            .ok_or_else(|| DimeError::InvalidKey("key has no public part".into()))?;
        let capabilities = if capabilities.is_empty() {
            vec![Capability::Generic]
        } else {
            capabilities.to_vec()
        };

        let mut core = ItemCore::new()?;
        let claims = core.claims_mut();
        claims.put(Claim::IssuedAt, clock.now())?;
        claims.put(Claim::PublicKey, KeyMaterial(public))?;
        claims.put(Claim::Capabilities, capability::to_names(&capabilities))?;
        if let Some(principals) = principals {
            claims.put(Claim::Principals, principals)?;
        }
        let mut request = Self { core };
        request.sign(key)?;
        debug!("Generated identity issuing request");
        Ok(request)
    }

    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let components = codec::split_item(encoded, HEADER, 3, 3)?;
        let claims = codec::decode_claims(components[1])?;
        let (unsigned, signature) = codec::split_last(encoded, COMPONENT_DELIMITER)
            .ok_or_else(|| DimeError::Format("request without signature".into()))?;
        let request = Self {
            core: ItemCore::decoded(claims, unsigned, Some(signature)),
        };
        request.validate()?;
        Ok(request)
    }

    pub fn issued_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.core.claims().get(Claim::IssuedAt)
    }

    pub fn public_key_material(&self) -> Result<String> {
        self.core
            .claims()
            .get::<KeyMaterial>(Claim::PublicKey)?
            .map(|k| k.0)
            .ok_or_else(|| DimeError::Format("request is missing its public key".into()))
    }

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

    pub fn principals(&self) -> Result<Option<Map<String, Value>>> {
        self.core.claims().get(Claim::Principals)
    }

    /// Check the self-signature and that the request is not from the
    /// future.
    pub fn verify(&self) -> Result<()> {
        self.verify_with_clock(&ClockPolicy::default())
    }

    pub fn verify_with_clock(&self, clock: &ClockPolicy) -> Result<()> {
        clock.check_validity(self.issued_at()?.as_ref(), None)?;
        self.verify_signature(&self.public_key()?)
    }

    /// Issue a root identity signed by the requester's own key.
    pub fn self_issue(
        &self,
        subject_id: Uuid,
        valid_for: i64,
        key: &Key,
        system_name: &str,
        ambits: Option<&[String]>,
        methods: Option<&[String]>,
    ) -> Result<Identity> {
        self.self_issue_with_clock(
            subject_id,
            valid_for,
            key,
            system_name,
            ambits,
            methods,
            &ClockPolicy::default(),
        )
    }

    /// Like [`IdentityIssuingRequest::self_issue`], checked and stamped
    /// with `clock`.
    #[allow(clippy::too_many_arguments)]
    pub fn self_issue_with_clock(
        &self,
        subject_id: Uuid,
        valid_for: i64,
        key: &Key,
        system_name: &str,
        ambits: Option<&[String]>,
        methods: Option<&[String]>,
        clock: &ClockPolicy,
    ) -> Result<Identity> {
        if system_name.is_empty() {
            return Err(DimeError::InvalidArgument(
                "system name must not be empty".into(),
            ));
        }
        self.verify_with_clock(clock)?;
        self.check_key(key)?;
        let mut capabilities = self.capabilities()?;
        if !capabilities.contains(&Capability::SelfIssued) {
            capabilities.push(Capability::SelfIssued);
        }
        let claims = self.identity_claims(
            clock,
            subject_id,
            subject_id,
            valid_for,
            &capabilities,
            Some(system_name),
            ambits,
            methods,
        )?;
        let mut identity = Identity::unsigned(claims, None);
        identity.sign(key)?;
        debug!("Self-issued identity {subject_id}");
        Ok(identity)
    }

    /// Issue an identity signed by `issuer_key` on behalf of `issuer`.
    ///
    /// The issuer must be within its validity window and verify against the
    /// policy's key ring, or against its own embedded chain when no ring is
    /// set. Claims are stamped with the key ring clock.
    pub fn issue(
        &self,
        subject_id: Uuid,
        valid_for: i64,
        issuer_key: &Key,
        issuer: &Identity,
        include_chain: bool,
        policy: &IssuePolicy<'_>,
    ) -> Result<Identity> {
        let clock = policy.clock();
        self.verify_with_clock(&clock)?;

        let requested = self.capabilities()?;
        if let Some(denied) = requested.iter().find(|c| !policy.allowed.contains(*c)) {
            warn!("Refused to issue identity: capability '{denied}' not allowed");
            return Err(DimeError::Capability(format!(
                "requested capability '{denied}' is not allowed"
            )));
        }
        let issuer_capabilities = issuer.capabilities()?;
        if !capability::capabilities_cover_all(&issuer_capabilities, &policy.required) {
            warn!("Refused to issue identity: issuer lacks required capabilities");
            return Err(DimeError::Capability(format!(
                "issuer lacks required capabilities [{}]",
                capability::to_names(&policy.required).join(", ")
            )));
        }
        if issuer_key.public()?.as_deref() != Some(issuer.public_key_material()?.as_str()) {
            return Err(DimeError::KeyMismatch(
                "issuer key does not match issuer identity".into(),
            ));
        }
        clock.check_validity(issuer.issued_at()?.as_ref(), issuer.expires_at()?.as_ref())?;
        verify_issuer(issuer, policy.key_ring)?;

        let is_root = match policy.key_ring {
            Some(ring) => ring.is_trusted_root(issuer),
            None => issuer.is_self_signed(),
        };
        let trust_chain = (include_chain && !is_root).then(|| issuer.clone());
        let system_name = issuer.system_name()?;
        let claims = self.identity_claims(
            &clock,
            subject_id,
            issuer.subject_id()?,
            valid_for,
            &requested,
            system_name.as_deref(),
            policy.ambits.as_deref(),
            policy.methods.as_deref(),
        )?;
        let mut identity = Identity::unsigned(claims, trust_chain);
        identity.sign(issuer_key)?;
        debug!(
            "Issued identity {subject_id} under {} (chain embedded: {})",
            issuer.subject_id()?,
            identity.trust_chain().is_some()
        );
        Ok(identity)
    }

    fn check_key(&self, key: &Key) -> Result<()> {
        if key.public()?.as_deref() != Some(self.public_key_material()?.as_str()) {
            return Err(DimeError::KeyMismatch(
                "key does not match the request's public key".into(),
            ));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn identity_claims(
        &self,
        clock: &ClockPolicy,
        subject_id: Uuid,
        issuer_id: Uuid,
        valid_for: i64,
        capabilities: &[Capability],
        system_name: Option<&str>,
        ambits: Option<&[String]>,
        methods: Option<&[String]>,
    ) -> Result<ClaimsStore> {
        if valid_for <= 0 {
            return Err(DimeError::InvalidArgument(
                "validity must be a positive number of seconds".into(),
            ));
        }
        let issued_at = clock.now();
        let expires_at = time::offset(&issued_at, valid_for)?;
        let mut claims = ClaimsStore::new();
        claims.put(Claim::UniqueId, Uuid::new_v4())?;
        claims.put(Claim::Subject, subject_id)?;
        claims.put(Claim::Issuer, issuer_id)?;
        claims.put(Claim::IssuedAt, issued_at)?;
        claims.put(Claim::ExpiresAt, expires_at)?;
        claims.put(Claim::PublicKey, KeyMaterial(self.public_key_material()?))?;
        claims.put(Claim::Capabilities, capability::to_names(capabilities))?;
        if let Some(system_name) = system_name {
            claims.put(Claim::SystemName, system_name)?;
        }
        if let Some(ambits) = ambits {
            claims.put(Claim::Ambits, ambits.to_vec())?;
        }
        if let Some(methods) = methods {
            claims.put(Claim::Methods, methods.to_vec())?;
        }
        if let Some(principals) = self.principals()? {
            claims.put(Claim::Principals, principals)?;
        }
        Ok(claims)
    }
}

/// Check the issuer's own signatures before it signs or is embedded.
///
/// With a key ring the issuer must verify against it. Without one, it must
/// verify against the top of its embedded chain; a bare identity that is
/// neither self-signed nor chained has nothing to check against.
fn verify_issuer(issuer: &Identity, key_ring: Option<&KeyRing>) -> Result<()> {
    let state = match key_ring {
        Some(ring) => issuer.verify(ring, None),
        None => {
            let mut anchor = issuer;
            while let Some(chain) = anchor.trust_chain() {
                anchor = chain;
            }
            if std::ptr::eq(anchor, issuer) && !issuer.is_self_signed() {
                debug!("Issuer {} has no chain to verify", issuer.subject_id()?);
                return Ok(());
            }
            issuer.verify(&KeyRing::new(), Some(anchor))
        }
    };
    match state {
        state if state.is_valid() => Ok(()),
        IntegrityState::Expired => Err(DimeError::Expired("issuer trust chain has expired".into())),
        state => {
            warn!("Refused to issue identity: issuer verified as {state}");
            Err(DimeError::Integrity(format!(
                "issuer identity did not verify: {state}"
            )))
        }
    }
}

impl DimeItem for IdentityIssuingRequest {
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
        self.unique_id()?;
        self.public_key_material()?;
        self.capabilities()?;
        Ok(())
    }
}
