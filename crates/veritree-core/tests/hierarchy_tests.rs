//! End-to-end hierarchy scenarios over a directory-backed store
//!
//! These tests drive the public API the way the CLI does: build a hierarchy,
//! reload it, tamper with the persisted records, and check which
//! verification paths survive.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use veritree_core::{
    NodeId, TokenNetwork, VerificationPath, VerifyFailure, TOKEN_FILE_SUFFIX,
};

fn id(s: &str) -> NodeId {
    NodeId::parse(s).unwrap()
}

fn token_file(dir: &Path, node: &str) -> std::path::PathBuf {
    dir.join(format!("{node}{TOKEN_FILE_SUFFIX}"))
}

/// Edit one field of a persisted token record, as an attacker would
fn tamper(dir: &Path, node: &str, key: &str, value: serde_json::Value) {
    let path = token_file(dir, node);
    let content = fs::read_to_string(&path).unwrap();
    let mut record: serde_json::Value = serde_json::from_str(&content).unwrap();
    record[key] = value;
    fs::write(&path, serde_json::to_string_pretty(&record).unwrap()).unwrap();
}

fn build_three_level(dir: &Path) {
    let mut network = TokenNetwork::open(dir).unwrap();
    network.create_master(id("root")).unwrap();
    network.issue(&id("root"), id("mid"), None).unwrap();
    network.issue(&id("mid"), id("leaf"), None).unwrap();
}

#[test]
fn chain_verifies_three_level_hierarchy() {
    let dir = TempDir::new().unwrap();
    build_three_level(dir.path());

    let network = TokenNetwork::open(dir.path()).unwrap();
    let report = network.verify_chain(&id("leaf")).unwrap();
    assert!(report.valid, "trace: {:?}", report.trace);
    assert_eq!(report.trace.len(), 3);
}

#[test]
fn master_direct_works_without_intermediates() {
    let dir = TempDir::new().unwrap();
    build_three_level(dir.path());

    // Remove the intermediate; only leaf, root, and keys remain
    fs::remove_file(token_file(dir.path(), "mid")).unwrap();

    let network = TokenNetwork::open(dir.path()).unwrap();
    let chain = network.verify_chain(&id("leaf")).unwrap();
    assert!(!chain.valid);
    assert_eq!(chain.failure, Some(VerifyFailure::IssuerNotFound(id("mid"))));

    let direct = network.verify_master_direct(&id("leaf")).unwrap();
    assert!(direct.valid, "trace: {:?}", direct.trace);
}

#[test]
fn verify_as_issuer_walks_to_indirect_ancestor() {
    let dir = TempDir::new().unwrap();
    build_three_level(dir.path());

    let network = TokenNetwork::open(dir.path()).unwrap();
    let report = network.verify_as_issuer(&id("root"), &id("leaf")).unwrap();
    assert!(report.valid, "trace: {:?}", report.trace);
    assert!(report
        .trace
        .iter()
        .any(|step| step.contains("issuer found")));
}

#[test]
fn altered_issuer_hash_breaks_the_chain() {
    let dir = TempDir::new().unwrap();
    build_three_level(dir.path());

    tamper(
        dir.path(),
        "leaf",
        "issuer_token_hash",
        serde_json::Value::String("ab".repeat(32)),
    );

    let network = TokenNetwork::open(dir.path()).unwrap();
    let report = network.verify_chain(&id("leaf")).unwrap();
    assert!(!report.valid);
    assert_eq!(report.failure, Some(VerifyFailure::HashChainBroken(id("leaf"))));
}

#[test]
fn corrupted_master_signature_fails_master_direct() {
    let dir = TempDir::new().unwrap();
    build_three_level(dir.path());

    // Valid base64, wrong bytes
    tamper(
        dir.path(),
        "leaf",
        "master_signature",
        serde_json::Value::String("AAAA".repeat(16)),
    );

    let network = TokenNetwork::open(dir.path()).unwrap();
    let report = network.verify_master_direct(&id("leaf")).unwrap();
    assert!(!report.valid);
    assert_eq!(report.failure, Some(VerifyFailure::SignatureInvalid));

    // The other evidence still carries the hybrid verdict
    let hybrid = network.verify_hybrid(&id("leaf")).unwrap();
    assert!(hybrid.valid);
}

#[test]
fn hybrid_reports_every_attempted_method() {
    let dir = TempDir::new().unwrap();
    build_three_level(dir.path());

    let network = TokenNetwork::open(dir.path()).unwrap();
    let report = network.verify_hybrid(&id("leaf")).unwrap();
    assert!(report.valid);
    assert_eq!(report.results.len(), 3);
    for path in [
        VerificationPath::Chain,
        VerificationPath::MasterDirect,
        VerificationPath::IssuerDirect,
    ] {
        assert!(report.results[&path].valid, "{path} should be valid");
    }
}

#[test]
fn two_loads_agree_on_tokens_and_root() {
    let dir = TempDir::new().unwrap();
    build_three_level(dir.path());

    let first = TokenNetwork::open(dir.path()).unwrap();
    let second = TokenNetwork::open(dir.path()).unwrap();

    let first_ids: Vec<_> = first.list().map(|t| t.node_id().clone()).collect();
    let second_ids: Vec<_> = second.list().map(|t| t.node_id().clone()).collect();
    assert_eq!(first_ids, second_ids);
    assert_eq!(first.root_id(), second.root_id());

    let first_hashes: Vec<_> = first.list().map(|t| *t.token_hash()).collect();
    let second_hashes: Vec<_> = second.list().map(|t| *t.token_hash()).collect();
    assert_eq!(first_hashes, second_hashes);
}

#[test]
fn foreign_root_tree_fails_against_registered_root() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();

    // "alfa" sorts before "zeta", so alfa stays the active root
    {
        let mut network = TokenNetwork::open(dir_a.path()).unwrap();
        network.create_master(id("alfa")).unwrap();
        network.issue(&id("alfa"), id("alfa-child"), None).unwrap();
    }
    {
        let mut network = TokenNetwork::open(dir_b.path()).unwrap();
        network.create_master(id("zeta")).unwrap();
        network.issue(&id("zeta"), id("zeta-child"), None).unwrap();
    }

    // Simulated tamper: graft the foreign tree into store A
    for node in ["zeta", "zeta-child"] {
        fs::copy(token_file(dir_b.path(), node), token_file(dir_a.path(), node)).unwrap();
    }

    let network = TokenNetwork::open(dir_a.path()).unwrap();
    assert_eq!(network.root_id(), Some(&id("alfa")));

    // The grafted root is present but not registered
    let foreign_root = network.verify_chain(&id("zeta")).unwrap();
    assert!(!foreign_root.valid);
    assert_eq!(foreign_root.failure, Some(VerifyFailure::RootMismatch(id("zeta"))));

    // Its descendants fail the same walk
    let foreign_child = network.verify_chain(&id("zeta-child")).unwrap();
    assert!(!foreign_child.valid);

    // The native tree is unaffected
    assert!(network.verify_chain(&id("alfa-child")).unwrap().valid);
}

#[test]
fn foreign_children_without_their_root_report_missing_issuer() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();

    {
        let mut network = TokenNetwork::open(dir_a.path()).unwrap();
        network.create_master(id("alfa")).unwrap();
    }
    {
        let mut network = TokenNetwork::open(dir_b.path()).unwrap();
        network.create_master(id("zeta")).unwrap();
        network.issue(&id("zeta"), id("orphan"), None).unwrap();
    }

    fs::copy(
        token_file(dir_b.path(), "orphan"),
        token_file(dir_a.path(), "orphan"),
    )
    .unwrap();

    let network = TokenNetwork::open(dir_a.path()).unwrap();
    let report = network.verify_chain(&id("orphan")).unwrap();
    assert!(!report.valid);
    assert_eq!(report.failure, Some(VerifyFailure::IssuerNotFound(id("zeta"))));
}

#[test]
fn injected_cycle_terminates_with_distinct_failure() {
    let dir = TempDir::new().unwrap();
    {
        let mut network = TokenNetwork::open(dir.path()).unwrap();
        network.create_master(id("root")).unwrap();
        network.issue(&id("root"), id("a"), None).unwrap();
        network.issue(&id("a"), id("b"), None).unwrap();
    }

    // Rewire a's issuer linkage to point at its own descendant
    let b_record: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(token_file(dir.path(), "b")).unwrap(),
    )
    .unwrap();
    let b_hash = b_record["token_hash"].clone();
    tamper(dir.path(), "a", "issuer_id", serde_json::Value::String("b".into()));
    tamper(dir.path(), "a", "issuer_token_hash", b_hash);

    let network = TokenNetwork::open(dir.path()).unwrap();
    let report = network.verify_chain(&id("b")).unwrap();
    assert!(!report.valid);
    assert_eq!(report.failure, Some(VerifyFailure::CycleDetected));
}

#[test]
fn verification_paths_round_trip_through_store() {
    let dir = TempDir::new().unwrap();
    build_three_level(dir.path());

    let network = TokenNetwork::open(dir.path()).unwrap();
    let leaf = network.get(&id("leaf")).unwrap();
    for path in [
        VerificationPath::Chain,
        VerificationPath::MasterDirect,
        VerificationPath::IssuerDirect,
    ] {
        assert!(leaf.supports(path), "leaf should support {path}");
    }
}
