//! Trust Chain: build root → intermediate → leaf and verify the leaf
//! against the key ring and against each ancestor.
//!
//! Run with:
//!   cargo run --example trust_chain -p dime

use dime::{
    Capability, DimeItem, Identity, IdentityIssuingRequest, IssuePolicy, Key, KeyCapability,
    KeyRing,
};
use uuid::Uuid;

const YEAR: i64 = 365 * 24 * 60 * 60;

fn request(caps: &[Capability]) -> (Key, IdentityIssuingRequest) {
    let key = Key::generate(KeyCapability::Sign).expect("key");
    let request = IdentityIssuingRequest::generate(&key, caps, None).expect("request");
    (key, request)
}

fn main() {
    let key_ring = KeyRing::new();
    let policy = IssuePolicy::new(&[Capability::Generic, Capability::Issue]);

    let (root_key, root_request) = request(&[Capability::Issue]);
    let root = root_request
        .self_issue(Uuid::new_v4(), 10 * YEAR, &root_key, "example", None, None)
        .expect("root");

    let (mid_key, mid_request) = request(&[Capability::Issue]);
    let mid = mid_request
        .issue(Uuid::new_v4(), YEAR, &root_key, &root, true, &policy)
        .expect("intermediate");

    let (_, leaf_request) = request(&[Capability::Generic]);
    let leaf = leaf_request
        .issue(Uuid::new_v4(), YEAR, &mid_key, &mid, true, &policy)
        .expect("leaf");

    let mut depth = 0;
    let mut current: Option<&Identity> = leaf.trust_chain();
    while let Some(link) = current {
        depth += 1;
        current = link.trust_chain();
    }
    println!("Leaf {} embeds {depth} ancestor(s)", leaf.subject_id().unwrap());
    println!("  Encoded size: {} bytes", leaf.to_encoded().unwrap().len());
    println!();

    println!("Empty key ring:        {}", leaf.verify(&key_ring, None));
    key_ring.init(vec![root.clone()]);
    println!("Root in key ring:      {}", leaf.verify(&key_ring, None));
    println!("Against intermediate:  {}", leaf.verify(&key_ring, Some(&mid)));
    key_ring.set_time_modifier(2 * YEAR);
    println!("Two years from now:    {}", leaf.verify(&key_ring, None));
}
