//! Stress test: multi-hop issuance chains and their trust states.

use dime::{
    Capability, DimeItem, Identity, IdentityIssuingRequest, IntegrityState, IssuePolicy, Key,
    KeyCapability, KeyRing,
};
use uuid::Uuid;

const YEAR: i64 = 365 * 24 * 60 * 60;

struct Node {
    key: Key,
    identity: Identity,
}

fn root(name: &str) -> Node {
    let key = Key::generate(KeyCapability::Sign).expect("key generation should succeed");
    let identity = IdentityIssuingRequest::generate(&key, &[Capability::Generic, Capability::Issue], None)
        .expect("request should succeed")
        .self_issue(Uuid::new_v4(), 10 * YEAR, &key, name, None, None)
        .expect("self-issue should succeed");
    Node { key, identity }
}

fn issue(issuer: &Node, ring: &KeyRing, caps: &[Capability]) -> Node {
    let key = Key::generate(KeyCapability::Sign).expect("key generation should succeed");
    let policy = IssuePolicy::new(&[Capability::Generic, Capability::Issue]).key_ring(ring);
    let identity = IdentityIssuingRequest::generate(&key, caps, None)
        .expect("request should succeed")
        .issue(Uuid::new_v4(), YEAR, &issuer.key, &issuer.identity, true, &policy)
        .expect("issue should succeed");
    Node { key, identity }
}

/// root → node1 → node2 → node3 → leaf
fn four_hop_chain(ring: &KeyRing) -> (Node, Vec<Node>, Node) {
    let root = root("chain-test");
    ring.init(vec![root.identity.clone()]);
    let caps = [Capability::Generic, Capability::Issue];
    let mut nodes: Vec<Node> = Vec::new();
    for _ in 0..3 {
        let issuer = nodes.last().unwrap_or(&root);
        let node = issue(issuer, ring, &caps);
        nodes.push(node);
    }
    let leaf = issue(&nodes[2], ring, &[Capability::Generic]);
    (root, nodes, leaf)
}

#[test]
fn stress_four_hop_chain_complete_with_root_in_ring() {
    let ring = KeyRing::new();
    let (_, _, leaf) = four_hop_chain(&ring);
    assert_eq!(leaf.identity.verify(&ring, None), IntegrityState::Complete);
}

#[test]
fn stress_four_hop_chain_intact_against_intermediates() {
    let ring = KeyRing::new();
    let (root, nodes, leaf) = four_hop_chain(&ring);
    for node in &nodes {
        assert_eq!(
            leaf.identity.verify(&ring, Some(&node.identity)),
            IntegrityState::Intact,
            "leaf should be intact against {}",
            node.identity.subject_id().unwrap()
        );
    }
    assert_eq!(
        leaf.identity.verify(&ring, Some(&root.identity)),
        IntegrityState::Intact
    );
}

#[test]
fn stress_four_hop_chain_untrusted_against_unrelated() {
    let ring = KeyRing::new();
    let (_, _, leaf) = four_hop_chain(&ring);
    let unrelated = root("unrelated");
    assert_eq!(
        leaf.identity.verify(&ring, Some(&unrelated.identity)),
        IntegrityState::Untrusted
    );
    ring.clear();
    assert_eq!(leaf.identity.verify(&ring, None), IntegrityState::Untrusted);
}

#[test]
fn stress_four_hop_chain_survives_export() {
    let ring = KeyRing::new();
    let (_, nodes, leaf) = four_hop_chain(&ring);
    let exported = dime::Item::from(leaf.identity.clone())
        .export()
        .expect("export should succeed");
    let imported = dime::Item::import(&exported).expect("import should succeed");
    let identity = imported.as_identity().expect("should be an identity");
    assert_eq!(
        identity.to_encoded().unwrap(),
        leaf.identity.to_encoded().unwrap()
    );
    assert_eq!(identity.verify(&ring, None), IntegrityState::Complete);

    let mut depth = 0;
    let mut current = identity.trust_chain();
    while let Some(chain) = current {
        depth += 1;
        current = chain.trust_chain();
    }
    // node1 was issued by a ring root, so the chain stops there.
    assert_eq!(depth, nodes.len());
}

#[test]
fn stress_chain_depth_20() {
    let ring = KeyRing::new();
    let root = root("deep-chain");
    ring.init(vec![root.identity.clone()]);
    let caps = [Capability::Generic, Capability::Issue];
    let mut current = issue(&root, &ring, &caps);
    for _ in 0..20 {
        current = issue(&current, &ring, &caps);
    }
    assert_eq!(current.identity.verify(&ring, None), IntegrityState::Complete);
}

#[test]
fn stress_chain_broken_by_missing_issue_capability() {
    let ring = KeyRing::new();
    let root = root("broken-chain");
    ring.init(vec![root.identity.clone()]);
    let node = issue(&root, &ring, &[Capability::Generic]);
    let key = Key::generate(KeyCapability::Sign).unwrap();
    let policy = IssuePolicy::new(&[Capability::Generic])
        .require(&[Capability::Generic])
        .key_ring(&ring);
    let leaf = IdentityIssuingRequest::generate(&key, &[], None)
        .unwrap()
        .issue(Uuid::new_v4(), YEAR, &node.key, &node.identity, true, &policy)
        .unwrap();
    assert_eq!(leaf.verify(&ring, None), IntegrityState::Invalid);
}
