//! Issue Identity: self-issue a root, issue a leaf and verify it.
//!
//! Run with:
//!   cargo run --example issue_identity -p dime

use dime::{
    Capability, DimeItem, IdentityIssuingRequest, IssuePolicy, Item, Key, KeyCapability, KeyRing,
};
use uuid::Uuid;

const DAY: i64 = 24 * 60 * 60;

fn main() {
    // ── 1. Root identity ────────────────────────────────────────────────────
    //
    // A root is issued by its own key and carries the `self` capability.
    let root_key = Key::generate(KeyCapability::Sign).expect("root key");
    let root = IdentityIssuingRequest::generate(&root_key, &[Capability::Generic, Capability::Issue], None)
        .expect("root request")
        .self_issue(Uuid::new_v4(), 365 * DAY, &root_key, "example", None, None)
        .expect("root identity");
    println!("Root identity");
    println!("  Subject:     {}", root.subject_id().unwrap());
    println!("  Self-signed: {}", root.is_self_signed());
    println!("  Thumbprint:  {}", root.thumbprint().unwrap());
    println!();

    let key_ring = KeyRing::new();
    key_ring.init(vec![root.clone()]);

    // ── 2. Request and issue ────────────────────────────────────────────────
    //
    // The requester proves possession of its key by signing the request.
    let key = Key::generate(KeyCapability::Sign).expect("leaf key");
    let request = IdentityIssuingRequest::generate(&key, &[Capability::Generic], None)
        .expect("leaf request");
    let exported = Item::from(request).export().expect("export request");
    println!("Request (exported):");
    println!("  {exported}");
    println!();

    let request = Item::import(&exported).expect("import request");
    let policy = IssuePolicy::new(&[Capability::Generic, Capability::Identify]).key_ring(&key_ring);
    let leaf = request
        .as_request()
        .expect("request item")
        .issue(Uuid::new_v4(), 30 * DAY, &root_key, &root, true, &policy)
        .expect("issue identity");

    // ── 3. Verify ───────────────────────────────────────────────────────────
    println!("Issued identity");
    println!("  Subject: {}", leaf.subject_id().unwrap());
    println!("  Issuer:  {}", leaf.issuer_id().unwrap());
    println!("  State:   {}", leaf.verify(&key_ring, None));
}
