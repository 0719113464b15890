//! Integration test: full end-to-end workflow.
//!
//! Tests the complete lifecycle:
//! 1. Create a root identity and trust it
//! 2. Issue an intermediate and a leaf identity
//! 3. Exchange keys and send an encrypted, linked message in an envelope
//! 4. Decode everything on the receiving side
//! 5. Verify signatures, links and the trust chain

use dime::{
    Capability, DimeItem, Envelope, IdentityIssuingRequest, IntegrityState, IssuePolicy, Item,
    Key, KeyCapability, KeyRing, Message,
};
use uuid::Uuid;

const YEAR: i64 = 365 * 24 * 60 * 60;

#[test]
fn full_workflow_issue_send_verify() {
    // ── Step 1: Root identity ───────────────────────────────────────────
    let ring = KeyRing::new();
    let root_key = Key::generate(KeyCapability::Sign).expect("root key");
    let root = IdentityIssuingRequest::generate(&root_key, &[Capability::Generic, Capability::Issue], None)
        .expect("root request")
        .self_issue(Uuid::new_v4(), 10 * YEAR, &root_key, "dime-workflow", None, None)
        .expect("root identity");
    ring.init(vec![root.clone()]);
    assert_eq!(root.verify(&ring, None), IntegrityState::Complete);

    // ── Step 2: Intermediate and leaf ───────────────────────────────────
    let policy = IssuePolicy::new(&[Capability::Generic, Capability::Identify, Capability::Issue])
        .key_ring(&ring)
        .ambits(&["global"]);
    let intermediate_key = Key::generate(KeyCapability::Sign).expect("intermediate key");
    let intermediate = IdentityIssuingRequest::generate(
        &intermediate_key,
        &[Capability::Generic, Capability::Issue],
        None,
    )
    .expect("intermediate request")
    .issue(Uuid::new_v4(), YEAR, &root_key, &root, true, &policy)
    .expect("intermediate identity");
    assert!(
        intermediate.trust_chain().is_none(),
        "root is in the key ring, so no chain is embedded"
    );

    let alice_id = Uuid::new_v4();
    let alice_key = Key::generate(KeyCapability::Sign).expect("alice key");
    let alice = IdentityIssuingRequest::generate(&alice_key, &[Capability::Generic, Capability::Identify], None)
        .expect("alice request")
        .issue(alice_id, YEAR, &intermediate_key, &intermediate, true, &policy)
        .expect("alice identity");
    assert_eq!(alice.subject_id().unwrap(), alice_id);
    assert!(alice.trust_chain().is_some());
    assert!(alice.has_ambit("global"));
    assert_eq!(alice.system_name().unwrap().as_deref(), Some("dime-workflow"));

    // ── Step 3: Key agreement and message ───────────────────────────────
    let alice_exchange = Key::generate(KeyCapability::Exchange).expect("alice exchange");
    let bob_exchange = Key::generate(KeyCapability::Exchange).expect("bob exchange");
    let alice_shared = alice_exchange
        .generate_shared_secret(&bob_exchange.public_copy().unwrap())
        .expect("shared secret");

    let mut message = Message::new(alice_id, None, Some(300)).expect("message");
    message.set_mime_type("text/plain").unwrap();
    message
        .set_encrypted_payload(b"Racecar is racecar backwards.", &alice_shared)
        .expect("encrypt payload");
    message.add_item_link(&alice).expect("link identity");
    message.sign(&alice_key).expect("sign message");

    let mut envelope = Envelope::new(alice_id, Some("workflow")).expect("envelope");
    envelope.add_item(alice.clone()).unwrap();
    envelope
        .add_item(alice_exchange.public_copy().unwrap())
        .unwrap();
    envelope.add_item(message).unwrap();
    envelope.sign(&alice_key).expect("sign envelope");
    let wire = envelope.to_encoded().expect("encode envelope");

    // ── Step 4: Receive ─────────────────────────────────────────────────
    let received = Envelope::from_encoded(&wire).expect("decode envelope");
    assert_eq!(received.to_encoded().unwrap(), wire);
    assert_eq!(received.issuer_id().unwrap(), Some(alice_id));
    assert_eq!(received.items().len(), 3);

    let sender = received.items()[0].as_identity().expect("identity first");
    let sender_exchange = received.items()[1].as_key().expect("key second");
    let received_message = received.items()[2].as_message().expect("message third");

    // ── Step 5: Verify ──────────────────────────────────────────────────
    assert_eq!(sender.verify(&ring, None), IntegrityState::Complete);
    assert_eq!(sender.verify(&ring, Some(&intermediate)), IntegrityState::Intact);
    let sender_key = sender.public_key().expect("sender public key");
    received.verify(&sender_key).expect("envelope signature");
    received_message
        .verify_signature(&sender_key)
        .expect("message signature");
    assert_eq!(
        received_message.verify_links(&[Item::from(sender.clone())]),
        IntegrityState::Intact
    );

    let bob_shared = bob_exchange
        .generate_shared_secret(sender_exchange)
        .expect("shared secret");
    assert_eq!(
        received_message.decrypted_payload(&bob_shared).unwrap(),
        b"Racecar is racecar backwards."
    );
}

#[test]
fn full_workflow_request_travels_in_envelope() {
    let ring = KeyRing::new();
    let root_key = Key::generate(KeyCapability::Sign).unwrap();
    let root = IdentityIssuingRequest::generate(&root_key, &[Capability::Issue], None)
        .unwrap()
        .self_issue(Uuid::new_v4(), YEAR, &root_key, "dime-workflow", None, None)
        .unwrap();
    ring.init(vec![root.clone()]);

    // Requester side: export the request.
    let key = Key::generate(KeyCapability::Sign).unwrap();
    let request = IdentityIssuingRequest::generate(&key, &[Capability::Generic], None).unwrap();
    let exported = Item::from(request).export().unwrap();

    // Issuer side: import, verify and issue.
    let imported = Item::import(&exported).unwrap();
    let request = imported.as_request().expect("request");
    request.verify().expect("request verifies");
    let identity = request
        .issue(
            Uuid::new_v4(),
            YEAR,
            &root_key,
            &root,
            true,
            &IssuePolicy::new(&[Capability::Generic]).key_ring(&ring),
        )
        .unwrap();

    // Requester side again.
    let returned = Item::import(&Item::from(identity).export().unwrap()).unwrap();
    let identity = returned.as_identity().expect("identity");
    assert_eq!(identity.public_key_material().unwrap(), key.public().unwrap().unwrap());
    assert_eq!(identity.verify(&ring, None), IntegrityState::Complete);
}

#[test]
fn full_workflow_legacy_suite_interop() {
    let ring = KeyRing::new();
    let key = Key::generate_with_suite(KeyCapability::Sign, dime::LEGACY_SUITE).unwrap();
    let root = IdentityIssuingRequest::generate(&key, &[Capability::Issue], None)
        .unwrap()
        .self_issue(Uuid::new_v4(), YEAR, &key, "legacy", None, None)
        .unwrap();
    ring.init(vec![root.clone()]);
    let decoded = dime::Identity::from_encoded(&root.to_encoded().unwrap()).unwrap();
    assert_eq!(decoded.public_key().unwrap().suite_name().unwrap(), dime::LEGACY_SUITE);
    assert_eq!(decoded.verify(&ring, None), IntegrityState::Complete);
    assert_ne!(
        decoded.thumbprint().unwrap(),
        decoded.thumbprint_with(dime::LEGACY_SUITE).unwrap()
    );
}
