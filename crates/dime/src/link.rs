//! Item links: detached integrity references between items.
//!
//! A link records an item's kind, unique id and thumbprint under a named
//! suite. It is evidence of the item's content at link time; verification
//! recomputes the thumbprint and compares.
//!
//! Encoded as `kind.uid.thumbprint.suite`. Links written before the suite
//! component existed carry only three components and are read as `STN`.

use std::fmt;
use std::str::FromStr;

use log::warn;
use uuid::Uuid;

use crate::codec::{COMPONENT_DELIMITER, SECTION_DELIMITER};
use crate::crypto::{DEFAULT_SUITE, LEGACY_SUITE};
use crate::error::{DimeError, Result};
use crate::item::{DimeItem, Item};
use crate::trust::IntegrityState;

/// An immutable reference to an item's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemLink {
    item_identifier: String,
    unique_id: Uuid,
    thumbprint: String,
    suite_name: String,
}

impl ItemLink {
    /// Capture the current state of `item`. `suite_name` defaults to the
    /// default suite.
    pub fn new(item: &dyn DimeItem, suite_name: Option<&str>) -> Result<Self> {
        let suite_name = suite_name.unwrap_or(DEFAULT_SUITE);
        Ok(Self {
            item_identifier: item.header().to_string(),
            unique_id: item.unique_id()?,
            thumbprint: item.thumbprint_with(suite_name)?,
            suite_name: suite_name.to_string(),
        })
    }

    pub fn item_identifier(&self) -> &str {
        &self.item_identifier
    }

    pub fn unique_id(&self) -> Uuid {
        self.unique_id
    }

    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    pub fn suite_name(&self) -> &str {
        &self.suite_name
    }

    /// `true` iff `item` has the linked kind and id and its thumbprint
    /// under the link's suite is unchanged.
    pub fn verify(&self, item: &dyn DimeItem) -> bool {
        self.matches(item)
            && item
                .thumbprint_with(&self.suite_name)
                .map(|t| t == self.thumbprint)
                .unwrap_or(false)
    }

    /// Verify a set of links against a set of candidate items.
    ///
    /// Every link must match exactly one item and verify. An empty side
    /// against a non-empty one fails.
    pub fn verify_all(items: &[Item], links: &[ItemLink]) -> IntegrityState {
        if items.is_empty() != links.is_empty() {
            warn!("Link verification failed: nothing to verify against");
            return IntegrityState::Invalid;
        }
        for link in links {
            let mut candidates = items.iter().filter(|item| link.matches(*item));
            let item = match (candidates.next(), candidates.next()) {
                (Some(item), None) => item,
                _ => {
                    warn!(
                        "Link verification failed: no unique {} item {}",
                        link.item_identifier, link.unique_id
                    );
                    return IntegrityState::Invalid;
                }
            };
            if !link.verify(item) {
                warn!(
                    "Link verification failed: thumbprint mismatch for {}",
                    link.unique_id
                );
                return IntegrityState::Invalid;
            }
        }
        IntegrityState::Intact
    }

    pub fn to_encoded(&self) -> String {
        format!(
            "{}{d}{}{d}{}{d}{}",
            self.item_identifier,
            self.unique_id,
            self.thumbprint,
            self.suite_name,
            d = COMPONENT_DELIMITER
        )
    }

    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let components: Vec<&str> = encoded.split(COMPONENT_DELIMITER).collect();
        if components.len() < 3 || components.len() > 4 {
            return Err(DimeError::Format(format!(
                "item link must have 3 or 4 components, got {}",
                components.len()
            )));
        }
        if components.iter().any(|c| c.is_empty()) {
            return Err(DimeError::Format("item link has an empty component".into()));
        }
        let unique_id = Uuid::parse_str(components[1])
            .map_err(|e| DimeError::Format(format!("invalid item link id: {e}")))?;
        Ok(Self {
            item_identifier: components[0].to_string(),
            unique_id,
            thumbprint: components[2].to_string(),
            suite_name: components.get(3).unwrap_or(&LEGACY_SUITE).to_string(),
        })
    }

    pub fn to_encoded_list(links: &[ItemLink]) -> String {
        links
            .iter()
            .map(ItemLink::to_encoded)
            .collect::<Vec<_>>()
            .join(&SECTION_DELIMITER.to_string())
    }

    pub fn from_encoded_list(encoded: &str) -> Result<Vec<Self>> {
        encoded
            .split(SECTION_DELIMITER)
            .map(ItemLink::from_encoded)
            .collect()
    }

    fn matches(&self, item: &dyn DimeItem) -> bool {
        item.header() == self.item_identifier
            && item.unique_id().map(|id| id == self.unique_id).unwrap_or(false)
    }
}

impl fmt::Display for ItemLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_encoded())
    }
}

impl FromStr for ItemLink {
    type Err = DimeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_encoded(s)
    }
}
