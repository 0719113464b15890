//! Edge case tests: malformed input, tampering, sealed immutability and
//! clock skew across item kinds and envelopes.

use dime::base58;
use dime::claims::{Claim, KeyMaterial};
use dime::codec;
use dime::{
    Capability, DimeError, DimeItem, Envelope, Identity, IdentityIssuingRequest, IntegrityState,
    IssuePolicy, Item, Key, KeyCapability, KeyRing, Message,
};
use proptest::prelude::*;
use uuid::Uuid;

const HOUR: i64 = 60 * 60;

fn self_issued(valid_for: i64) -> (Key, Identity) {
    let key = Key::generate(KeyCapability::Sign).unwrap();
    let identity = IdentityIssuingRequest::generate(&key, &[Capability::Generic, Capability::Issue], None)
        .unwrap()
        .self_issue(Uuid::new_v4(), valid_for, &key, "edge-cases", None, None)
        .unwrap();
    (key, identity)
}

// === Format Edge Cases ===

#[test]
fn edge_wrong_headers_rejected() {
    let key = Key::generate(KeyCapability::Sign).unwrap();
    let encoded = key.to_encoded().unwrap();
    assert!(matches!(Message::from_encoded(&encoded), Err(DimeError::Format(_))));
    assert!(matches!(Identity::from_encoded(&encoded), Err(DimeError::Format(_))));
    assert!(matches!(
        IdentityIssuingRequest::from_encoded(&encoded),
        Err(DimeError::Format(_))
    ));
    assert!(Item::from_encoded(&encoded.replacen("KEY", "key", 1)).is_err());
}

#[test]
fn edge_wrong_component_counts_rejected() {
    let (_, identity) = self_issued(HOUR);
    let encoded = identity.to_encoded().unwrap();
    let (unsigned, _) = encoded.rsplit_once('.').unwrap();
    // Identity without its signature component.
    assert!(Identity::from_encoded(unsigned).is_err());
    assert!(Identity::from_encoded(&format!("{encoded}.extra.extra")).is_err());
    assert!(Item::from_encoded("IIR.abc").is_err());
    assert!(Item::from_encoded("").is_err());
}

#[test]
fn edge_undecodable_components_rejected() {
    assert!(matches!(
        Item::from_encoded("KEY.!!!"),
        Err(DimeError::Format(_))
    ));
    let not_json = codec::encode_b64(b"not json");
    assert!(Item::from_encoded(&format!("KEY.{not_json}")).is_err());
    assert!(Envelope::from_encoded("Di:KEY.!!!").is_err());
}

#[test]
fn edge_unknown_claims_survive_roundtrip() {
    let claims = r#"{"uid":"5e2c8d5b-7bb1-4c57-a0c3-7a1c1fd3a4e0","x-custom":{"n":[1,2.5,"three"]},"iss":"5e2c8d5b-7bb1-4c57-a0c3-7a1c1fd3a4e1"}"#;
    let payload = codec::encode_b64(b"payload");
    let encoded = format!("MSG.{}.{payload}", codec::encode_b64(claims.as_bytes()));
    let message = Message::from_encoded(&encoded).unwrap();
    assert_eq!(message.to_encoded().unwrap(), encoded);
    assert_eq!(
        message.claims().extension("x-custom").unwrap()["n"][1],
        serde_json::json!(2.5)
    );
}

// === Tampering ===

#[test]
fn edge_tampered_identity_claims_fail_signature() {
    let (_, root) = self_issued(HOUR);
    let ring = KeyRing::new();
    ring.init(vec![root.clone()]);

    let key = Key::generate(KeyCapability::Sign).unwrap();
    let encoded = root.to_encoded().unwrap();
    let parts: Vec<&str> = encoded.split('.').collect();
    let mut claims = codec::decode_claims(parts[1]).unwrap();
    claims.remove(Claim::PublicKey).unwrap();
    claims
        .put(Claim::PublicKey, KeyMaterial(key.public().unwrap().unwrap()))
        .unwrap();
    let forged = format!(
        "{}.{}.{}",
        parts[0],
        codec::encode_claims(&claims).unwrap(),
        parts[2]
    );
    let forged = Identity::from_encoded(&forged).unwrap();
    assert_eq!(forged.verify(&ring, None), IntegrityState::SignatureError);
}

#[test]
fn edge_leaf_of_foreign_root() {
    let ring = KeyRing::new();
    let (_, root) = self_issued(HOUR);
    ring.init(vec![root.clone()]);
    let (key, impostor) = self_issued(HOUR);
    let iir = IdentityIssuingRequest::generate(&key, &[Capability::Generic], None).unwrap();
    let policy = IssuePolicy::new(&[Capability::Generic]).require(&[]);
    let leaf = iir
        .issue(Uuid::new_v4(), HOUR, &key, &impostor, false, &policy)
        .unwrap();
    assert_eq!(leaf.verify(&ring, None), IntegrityState::Untrusted);
    assert_eq!(leaf.verify(&ring, Some(&impostor)), IntegrityState::Intact);
}

// === Sealed Immutability ===

#[test]
fn edge_sealed_identity_rejects_link() {
    let (key, mut root) = self_issued(HOUR);
    let before = root.to_encoded().unwrap();
    assert!(matches!(
        root.add_item_link(&key),
        Err(DimeError::IllegalState(_))
    ));
    assert!(matches!(root.sign(&key), Err(DimeError::IllegalState(_))));
    assert_eq!(root.to_encoded().unwrap(), before);
}

#[test]
fn edge_signed_envelope_rejects_items() {
    let (key, root) = self_issued(HOUR);
    let mut envelope = Envelope::new(root.subject_id().unwrap(), None).unwrap();
    envelope.add_item(root.clone()).unwrap();
    envelope.sign(&key).unwrap();
    let before = envelope.to_encoded().unwrap();
    assert!(matches!(
        envelope.add_item(key.public_copy().unwrap()),
        Err(DimeError::IllegalState(_))
    ));
    assert_eq!(envelope.to_encoded().unwrap(), before);

    let mut decoded = Envelope::from_encoded(&before).unwrap();
    assert!(decoded.add_item(key.public_copy().unwrap()).is_err());
}

// === Clock Skew ===

#[test]
fn edge_grace_period_window() {
    let ring = KeyRing::new();
    let (_, root) = self_issued(60);
    ring.init(vec![root.clone()]);

    // now ∈ [T, T+G] is tolerated, now > T+G is not.
    ring.set_grace_period(120);
    ring.set_time_modifier(90);
    assert_eq!(root.verify(&ring, None), IntegrityState::Complete);
    ring.set_time_modifier(170);
    assert_eq!(root.verify(&ring, None), IntegrityState::Complete);
    ring.set_time_modifier(300);
    assert_eq!(root.verify(&ring, None), IntegrityState::Expired);
}

#[test]
fn edge_issued_in_future_is_expired() {
    let ring = KeyRing::new();
    let (_, root) = self_issued(HOUR);
    ring.init(vec![root.clone()]);
    ring.set_time_modifier(-600);
    assert_eq!(root.verify(&ring, None), IntegrityState::Expired);
    ring.set_grace_period(900);
    assert_eq!(root.verify(&ring, None), IntegrityState::Complete);
}

// === Base58 ===

#[test]
fn edge_packed_key_corruption_detected() {
    let key = Key::generate(KeyCapability::Sign).unwrap();
    let public = key.public().unwrap().unwrap();
    let mut chars: Vec<char> = public.chars().collect();
    chars[10] = if chars[10] == '2' { '3' } else { '2' };
    let corrupted: String = chars.into_iter().collect();
    assert!(base58::decode(&corrupted).is_err());
    assert!(Key::from_public(&corrupted).is_err());
}

proptest! {
    #[test]
    fn prop_message_roundtrip(payload in proptest::collection::vec(any::<u8>(), 1..512), context in "[a-zA-Z0-9 .:_-]{0,40}") {
        let key = Key::generate(KeyCapability::Sign).unwrap();
        let mut message = Message::new(Uuid::new_v4(), Some(Uuid::new_v4()), Some(60)).unwrap();
        message.set_payload(&payload).unwrap();
        message.set_context(&context).unwrap();
        message.sign(&key).unwrap();
        let encoded = message.to_encoded().unwrap();
        prop_assert_eq!(message.to_encoded().unwrap(), encoded.clone());

        let decoded = Message::from_encoded(&encoded).unwrap();
        prop_assert_eq!(decoded.claims(), message.claims());
        prop_assert_eq!(decoded.core().signature(), message.core().signature());
        prop_assert_eq!(decoded.payload().unwrap(), payload);
        prop_assert!(decoded.verify_signature(&key).is_ok());
    }
}
