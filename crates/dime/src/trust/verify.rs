//! Trust chain verification.
//!
//! Verification of an identity checks, in order:
//! 1. Validity window against the key ring clock
//! 2. The identity is sealed and carries an issuer
//! 3. The signature, against the trusted identity when it issued this one,
//!    or against a key ring root when no trusted identity is given
//! 4. Otherwise the embedded chain, recursively: the chain identity must be
//!    the issuer, hold `issue`, and verify itself before its key is used
//!
//! An expired ancestor makes the whole chain `Expired`.

use log::{debug, warn};

use crate::capability::Capability;
use crate::item::{DimeItem, Identity};

use super::keyring::{KeyRing, KeyRingSnapshot};
use super::IntegrityState;

/// Verify `identity` against a point-in-time snapshot of `key_ring`.
///
/// With `trusted` set, the walk stops at the identity `trusted` issued and
/// success is [`IntegrityState::Intact`]. Without it, the walk must end at
/// a key ring root and success is [`IntegrityState::Complete`].
pub fn verify_identity(
    identity: &Identity,
    key_ring: &KeyRing,
    trusted: Option<&Identity>,
) -> IntegrityState {
    let snapshot = key_ring.snapshot();
    let state = verify_with(identity, &snapshot, trusted);
    debug!("Identity verification finished: {state}");
    state
}

fn verify_with(
    identity: &Identity,
    snapshot: &KeyRingSnapshot,
    trusted: Option<&Identity>,
) -> IntegrityState {
    let (issued_at, expires_at) = match (identity.issued_at(), identity.expires_at()) {
        (Ok(iat), Ok(exp)) => (iat, exp),
        _ => return IntegrityState::Invalid,
    };
    if let Err(e) = snapshot
        .clock()
        .check_validity(issued_at.as_ref(), expires_at.as_ref())
    {
        warn!("Identity verification failed: {e}");
        return IntegrityState::Expired;
    }
    if !identity.is_sealed() {
        return IntegrityState::Invalid;
    }
    let Ok(issuer_id) = identity.issuer_id() else {
        return IntegrityState::Invalid;
    };

    let anchor = match trusted {
        Some(trusted) => trusted
            .subject_id()
            .ok()
            .filter(|subject| *subject == issuer_id)
            .map(|_| (trusted, IntegrityState::Intact)),
        None => snapshot
            .roots()
            .iter()
            .find(|root| root.subject_id().map(|s| s == issuer_id).unwrap_or(false))
            .map(|root| (root, IntegrityState::Complete)),
    };
    if let Some((anchor, success)) = anchor {
        return check_signature(identity, anchor, success);
    }

    match identity.trust_chain() {
        Some(chain) => verify_chain_link(identity, chain, snapshot, trusted),
        None => {
            warn!("Identity verification failed: issuer {issuer_id} is not trusted");
            IntegrityState::Untrusted
        }
    }
}

fn verify_chain_link(
    identity: &Identity,
    chain: &Identity,
    snapshot: &KeyRingSnapshot,
    trusted: Option<&Identity>,
) -> IntegrityState {
    let issuer_matches = match (chain.subject_id(), identity.issuer_id()) {
        (Ok(subject), Ok(issuer)) => subject == issuer,
        _ => false,
    };
    if !issuer_matches {
        warn!("Identity verification failed: trust chain is not the issuer");
        return IntegrityState::Invalid;
    }
    if !chain.has_capability(Capability::Issue) {
        warn!("Identity verification failed: issuer lacks the issue capability");
        return IntegrityState::Invalid;
    }
    match verify_with(chain, snapshot, trusted) {
        IntegrityState::Expired => IntegrityState::Expired,
        state if state.is_valid() => check_signature(identity, chain, state),
        _ => IntegrityState::Untrusted,
    }
}

fn check_signature(identity: &Identity, signer: &Identity, success: IntegrityState) -> IntegrityState {
    let verified = signer
        .public_key()
        .and_then(|key| identity.verify_signature(&key));
    match verified {
        Ok(()) => success,
        Err(e) => {
            warn!("Identity verification failed: {e}");
            IntegrityState::SignatureError
        }
    }
}
