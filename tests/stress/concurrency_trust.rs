//! Concurrency test: parallel verification against a shared key ring.
//!
//! Validates that verification is thread-safe and always observes one
//! complete key ring state.

use std::sync::{Arc, Mutex};
use std::thread;

use dime::{
    Capability, DimeItem, Identity, IdentityIssuingRequest, IntegrityState, IssuePolicy, Key,
    KeyCapability, KeyRing, Message,
};
use uuid::Uuid;

const DAY: i64 = 24 * 60 * 60;

fn root() -> (Key, Identity) {
    let key = Key::generate(KeyCapability::Sign).expect("key generation should succeed");
    let identity = IdentityIssuingRequest::generate(&key, &[Capability::Issue], None)
        .expect("request should succeed")
        .self_issue(Uuid::new_v4(), DAY, &key, "concurrency", None, None)
        .expect("self-issue should succeed");
    (key, identity)
}

fn leaf_under(root_key: &Key, root: &Identity, ring: &KeyRing) -> Identity {
    let key = Key::generate(KeyCapability::Sign).expect("key generation should succeed");
    IdentityIssuingRequest::generate(&key, &[Capability::Generic], None)
        .expect("request should succeed")
        .issue(
            Uuid::new_v4(),
            DAY,
            root_key,
            root,
            true,
            &IssuePolicy::new(&[Capability::Generic]).key_ring(ring),
        )
        .expect("issue should succeed")
}

#[test]
fn stress_50_concurrent_verifiers() {
    let ring = KeyRing::new();
    let (root_key, root) = root();
    ring.init(vec![root.clone()]);
    let leaf = Arc::new(leaf_under(&root_key, &root, &ring));

    let mut handles = Vec::new();
    for _ in 0..50 {
        let ring = ring.clone();
        let leaf = Arc::clone(&leaf);
        handles.push(thread::spawn(move || {
            for _ in 0..20 {
                assert_eq!(leaf.verify(&ring, None), IntegrityState::Complete);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn stress_verify_while_ring_changes() {
    let ring = KeyRing::new();
    let (root_key, root) = root();
    ring.init(vec![root.clone()]);
    let leaf = Arc::new(leaf_under(&root_key, &root, &ring));
    let observed = Arc::new(Mutex::new(Vec::new()));

    let writer = {
        let ring = ring.clone();
        let root = root.clone();
        thread::spawn(move || {
            for i in 0..200 {
                if i % 2 == 0 {
                    ring.clear();
                } else {
                    ring.init(vec![root.clone()]);
                }
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..8 {
        let ring = ring.clone();
        let leaf = Arc::clone(&leaf);
        let observed = Arc::clone(&observed);
        readers.push(thread::spawn(move || {
            for _ in 0..50 {
                let state = leaf.verify(&ring, None);
                observed.lock().unwrap().push(state);
            }
        }));
    }

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }

    let observed = observed.lock().unwrap();
    assert_eq!(observed.len(), 400);
    assert!(observed
        .iter()
        .all(|s| matches!(s, IntegrityState::Complete | IntegrityState::Untrusted)));
}

#[test]
fn stress_concurrent_signing_shared_key() {
    let key = Arc::new(Key::generate(KeyCapability::Sign).expect("key generation should succeed"));
    let encoded = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for thread_id in 0..20 {
        let key = Arc::clone(&key);
        let encoded = Arc::clone(&encoded);
        handles.push(thread::spawn(move || {
            for i in 0..25 {
                let mut message = Message::new(Uuid::new_v4(), None, Some(60)).unwrap();
                message
                    .set_payload(format!("thread {thread_id} message {i}").as_bytes())
                    .unwrap();
                message.sign(&key).expect("signing should succeed");
                encoded.lock().unwrap().push(message.to_encoded().unwrap());
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let encoded = encoded.lock().unwrap();
    assert_eq!(encoded.len(), 500);
    for text in encoded.iter() {
        let message = Message::from_encoded(text).expect("decode should succeed");
        assert!(message.verify_signature(&key).is_ok());
    }
}

#[test]
fn stress_shared_sealed_identity_encoding() {
    let (_, root) = root();
    let root = Arc::new(root);
    let expected = root.to_encoded().unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let root = Arc::clone(&root);
            thread::spawn(move || root.to_encoded().unwrap())
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), expected);
    }
}
