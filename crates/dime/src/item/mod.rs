//! Items: the signed units carried in envelopes.
//!
//! Every item owns a [`ClaimsStore`], an optional signature and a memoized
//! canonical encoding. Kind-specific behaviour (header, body components,
//! validation) is supplied through the [`DimeItem`] trait; [`Item`] is the
//! closed union used wherever the kind is only known at runtime.

pub mod identity;
pub mod key;
pub mod message;
pub mod request;

use std::sync::OnceLock;

use log::debug;
use uuid::Uuid;

use crate::claims::{Claim, ClaimsStore};
use crate::codec::{self, COMPONENT_DELIMITER};
use crate::crypto::DEFAULT_SUITE;
use crate::envelope::Envelope;
use crate::error::{DimeError, Result};
use crate::link::ItemLink;
use crate::trust::IntegrityState;

pub use identity::Identity;
pub use key::Key;
pub use message::Message;
pub use request::{IdentityIssuingRequest, IssuePolicy};

/// State shared by every item kind.
#[derive(Debug, Clone, Default)]
pub struct ItemCore {
    claims: ClaimsStore,
    /// Base64url signature component, kept verbatim.
    signature: Option<String>,
    /// Canonical encoding without the signature component.
    encoded: OnceLock<String>,
}

impl ItemCore {
    /// A fresh, unsealed core with a newly assigned unique id.
    pub(crate) fn new() -> Result<Self> {
        let mut claims = ClaimsStore::new();
        claims.put(Claim::UniqueId, Uuid::new_v4())?;
        Ok(Self::with_claims(claims))
    }

    pub(crate) fn with_claims(claims: ClaimsStore) -> Self {
        Self {
            claims,
            signature: None,
            encoded: OnceLock::new(),
        }
    }

    /// A core rebuilt from received text. `unsigned` is stored as the
    /// memoized encoding so the signed bytes are never re-serialized.
    pub(crate) fn decoded(
        mut claims: ClaimsStore,
        unsigned: &str,
        signature: Option<&str>,
    ) -> Self {
        if signature.is_some() {
            claims.seal();
        }
        let encoded = OnceLock::new();
        let _ = encoded.set(unsigned.to_string());
        Self {
            claims,
            signature: signature.map(str::to_string),
            encoded,
        }
    }

    pub fn claims(&self) -> &ClaimsStore {
        &self.claims
    }

    /// Mutable access to the claims. Drops the memoized encoding unless
    /// sealed, in which case the store rejects every change.
    pub(crate) fn claims_mut(&mut self) -> &mut ClaimsStore {
        if !self.is_sealed() {
            self.invalidate();
        }
        &mut self.claims
    }

    pub(crate) fn invalidate(&mut self) {
        self.encoded.take();
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn is_sealed(&self) -> bool {
        self.signature.is_some()
    }

    fn memoized(&self, build: impl FnOnce() -> Result<String>) -> Result<&str> {
        if let Some(encoded) = self.encoded.get() {
            return Ok(encoded);
        }
        let value = build()?;
        Ok(self.encoded.get_or_init(|| value))
    }

    fn seal(&mut self, signature: String) {
        self.signature = Some(signature);
        self.claims.seal();
    }
}

/// Behaviour common to every item kind.
pub trait DimeItem {
    /// Short kind tag written as the first component.
    fn header(&self) -> &'static str;

    fn core(&self) -> &ItemCore;

    fn core_mut(&mut self) -> &mut ItemCore;

    /// Build the encoding without the signature component.
    fn encode_unsigned(&self) -> Result<String>;

    /// Kind-specific checks run before signing.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn claims(&self) -> &ClaimsStore {
        self.core().claims()
    }

    fn unique_id(&self) -> Result<Uuid> {
        self.claims()
            .get::<Uuid>(Claim::UniqueId)?
            .ok_or_else(|| DimeError::Format(format!("{} item without unique id", self.header())))
    }

    fn is_sealed(&self) -> bool {
        self.core().is_sealed()
    }

    /// The signed text: the canonical encoding minus the signature.
    fn encoded(&self) -> Result<&str> {
        self.core().memoized(|| self.encode_unsigned())
    }

    /// Full canonical encoding, signature included when present.
    fn to_encoded(&self) -> Result<String> {
        let encoded = self.encoded()?;
        Ok(match self.core().signature() {
            Some(sig) => format!("{encoded}{COMPONENT_DELIMITER}{sig}"),
            None => encoded.to_string(),
        })
    }

    /// Hash of the full encoding under the default suite.
    fn thumbprint(&self) -> Result<String> {
        self.thumbprint_with(DEFAULT_SUITE)
    }

    fn thumbprint_with(&self, suite_name: &str) -> Result<String> {
        crate::crypto::thumbprint(suite_name, self.to_encoded()?.as_bytes())
    }

    /// Sign the item, sealing its claims.
    fn sign(&mut self, key: &Key) -> Result<()> {
        if self.is_sealed() {
            return Err(DimeError::IllegalState(format!(
                "{} item is already signed",
                self.header()
            )));
        }
        self.validate()?;
        let signature = key.sign_data(self.encoded()?.as_bytes())?;
        self.core_mut().seal(codec::encode_b64(&signature));
        debug!("Sealed {} item", self.header());
        Ok(())
    }

    /// Verify the item signature against a key holding public sign material.
    fn verify_signature(&self, key: &Key) -> Result<()> {
        let signature = self
            .core()
            .signature()
            .ok_or_else(|| DimeError::Integrity(format!("{} item is not signed", self.header())))?;
        key.verify_data(self.encoded()?.as_bytes(), &codec::decode_b64(signature)?)
    }

    /// Link another item into this one's `lnk` claim.
    fn add_item_link(&mut self, item: &dyn DimeItem) -> Result<()> {
        let link = ItemLink::new(item, None)?;
        let mut links = self.item_links()?;
        links.push(link);
        self.core_mut()
            .claims_mut()
            .put(Claim::Links, ItemLink::to_encoded_list(&links))
    }

    fn item_links(&self) -> Result<Vec<ItemLink>> {
        match self.claims().get::<String>(Claim::Links)? {
            Some(encoded) => ItemLink::from_encoded_list(&encoded),
            None => Ok(Vec::new()),
        }
    }

    /// Check every linked item against `items`.
    fn verify_links(&self, items: &[Item]) -> IntegrityState {
        match self.item_links() {
            Ok(links) => ItemLink::verify_all(items, &links),
            Err(_) => IntegrityState::Invalid,
        }
    }
}

/// Any item, dispatched on its header.
#[derive(Debug, Clone)]
pub enum Item {
    Key(Key),
    Identity(Identity),
    IssuingRequest(IdentityIssuingRequest),
    Message(Message),
}

impl Item {
    /// Decode an item, selecting the kind from its header.
    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let item = match codec::header_of(encoded) {
            key::HEADER => Self::Key(Key::from_encoded(encoded)?),
            identity::HEADER => Self::Identity(Identity::from_encoded(encoded)?),
            request::HEADER => Self::IssuingRequest(IdentityIssuingRequest::from_encoded(encoded)?),
            message::HEADER => Self::Message(Message::from_encoded(encoded)?),
            other => {
                return Err(DimeError::Format(format!("unknown item header '{other}'")));
            }
        };
        debug!("Decoded {} item", item.header());
        Ok(item)
    }

    /// Wrap this item in an anonymous envelope and encode it.
    pub fn export(&self) -> Result<String> {
        let mut envelope = Envelope::anonymous();
        envelope.add_item(self.clone())?;
        envelope.to_encoded()
    }

    /// Reverse of [`Item::export`]: decode an envelope holding one item.
    pub fn import(exported: &str) -> Result<Self> {
        let envelope = Envelope::from_encoded(exported)?;
        let mut items = envelope.into_items();
        if items.len() != 1 {
            return Err(DimeError::Format(format!(
                "expected a single item, found {}",
                items.len()
            )));
        }
        Ok(items.remove(0))
    }

    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Self::Key(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_identity(&self) -> Option<&Identity> {
        match self {
            Self::Identity(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_request(&self) -> Option<&IdentityIssuingRequest> {
        match self {
            Self::IssuingRequest(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn DimeItem {
        match self {
            Self::Key(k) => k,
            Self::Identity(i) => i,
            Self::IssuingRequest(r) => r,
            Self::Message(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn DimeItem {
        match self {
            Self::Key(k) => k,
            Self::Identity(i) => i,
            Self::IssuingRequest(r) => r,
            Self::Message(m) => m,
        }
    }
}

impl DimeItem for Item {
    fn header(&self) -> &'static str {
        self.inner().header()
    }

    fn core(&self) -> &ItemCore {
        self.inner().core()
    }

    fn core_mut(&mut self) -> &mut ItemCore {
        self.inner_mut().core_mut()
    }

    fn encode_unsigned(&self) -> Result<String> {
        self.inner().encode_unsigned()
    }

    fn validate(&self) -> Result<()> {
        self.inner().validate()
    }
}

impl From<Key> for Item {
    fn from(v: Key) -> Self {
        Self::Key(v)
    }
}

impl From<Identity> for Item {
    fn from(v: Identity) -> Self {
        Self::Identity(v)
    }
}

impl From<IdentityIssuingRequest> for Item {
    fn from(v: IdentityIssuingRequest) -> Self {
        Self::IssuingRequest(v)
    }
}

impl From<Message> for Item {
    fn from(v: Message) -> Self {
        Self::Message(v)
    }
}
