//! Canonical text encoding helpers.
//!
//! Items are written as `HEADER.component[.component...]` and envelopes as
//! `Di[.claims]:item:item[:signature]`. Every component is base64url
//! without padding, which can never contain either delimiter.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::claims::ClaimsStore;
use crate::error::{DimeError, Result};

/// Separates the components of one item.
pub const COMPONENT_DELIMITER: char = '.';

/// Separates the sections (header, items, signature) of an envelope.
pub const SECTION_DELIMITER: char = ':';

pub fn encode_b64(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn decode_b64(component: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(component)
        .map_err(|e| DimeError::Format(format!("invalid base64url component: {e}")))
}

/// Encode a claims store as a base64url component.
pub fn encode_claims(claims: &ClaimsStore) -> Result<String> {
    Ok(encode_b64(claims.to_json()?.as_bytes()))
}

/// Decode a base64url claims component.
pub fn decode_claims(component: &str) -> Result<ClaimsStore> {
    ClaimsStore::from_json(&decode_b64(component)?)
}

/// Return the header (everything before the first component delimiter).
pub fn header_of(encoded: &str) -> &str {
    encoded
        .split_once(COMPONENT_DELIMITER)
        .map_or(encoded, |(header, _)| header)
}

/// Split an encoded item into its components, checking the header and
/// that the component count (header included) lies in `min..=max`.
pub fn split_item<'a>(
    encoded: &'a str,
    header: &str,
    min: usize,
    max: usize,
) -> Result<Vec<&'a str>> {
    let components: Vec<&str> = encoded.split(COMPONENT_DELIMITER).collect();
    if components[0] != header {
        return Err(DimeError::Format(format!(
            "unexpected item header '{}', expected '{header}'",
            components[0]
        )));
    }
    if components.len() < min || components.len() > max {
        return Err(DimeError::Format(format!(
            "unexpected number of components for '{header}': {} (expected {min}..={max})",
            components.len()
        )));
    }
    if components.iter().any(|c| c.is_empty()) {
        return Err(DimeError::Format(format!("empty component in '{header}' item")));
    }
    Ok(components)
}

/// Split off the last component, returning `(payload, last)`. The payload
/// is exactly the signed text.
pub fn split_last(encoded: &str, delimiter: char) -> Option<(&str, &str)> {
    encoded.rsplit_once(delimiter)
}
