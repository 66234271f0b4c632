//! Property-based tests for veritree-core using proptest
//!
//! These tests verify invariants that should hold for all valid inputs.

use proptest::prelude::*;
use veritree_core::{NodeId, SignatureBytes, Token, TokenHash};

// ============================================
// Arbitrary Implementations
// ============================================

fn arb_node_id() -> impl Strategy<Value = NodeId> {
    "[A-Za-z0-9._-]{1,64}".prop_map(|s| NodeId::parse(&s).unwrap())
}

fn arb_token_hash() -> impl Strategy<Value = TokenHash> {
    any::<[u8; 32]>().prop_map(TokenHash::new)
}

fn arb_token() -> impl Strategy<Value = Token> {
    (
        arb_node_id(),
        prop::option::of((arb_token_hash(), arb_node_id())),
        prop::option::of("[a-zA-Z0-9 ]{0,100}"),
        prop::option::of(arb_node_id()),
        0u32..=32,
    )
        .prop_map(|(node_id, issuer, data, master_id, level)| {
            let (issuer_hash, issuer_id) = match issuer {
                Some((hash, id)) => (Some(hash), Some(id)),
                None => (None, None),
            };
            Token::build(node_id, issuer_hash, issuer_id, data, master_id, level)
        })
}

// ============================================
// Property Tests
// ============================================

proptest! {
    // ----------------------------------------
    // NodeId Properties
    // ----------------------------------------

    #[test]
    fn node_id_accepts_entire_allowed_alphabet(s in "[A-Za-z0-9._-]{1,64}") {
        let id = NodeId::parse(&s).unwrap();
        prop_assert_eq!(id.as_str(), s);
    }

    #[test]
    fn node_id_rejects_overlong(s in "[A-Za-z0-9._-]{65,80}") {
        prop_assert!(NodeId::parse(&s).is_err());
    }

    #[test]
    fn node_id_rejects_disallowed_char(
        prefix in "[A-Za-z0-9._-]{0,30}",
        bad in "[ :/+*!@#$%^&()=]",
        suffix in "[A-Za-z0-9._-]{0,30}",
    ) {
        let s = format!("{prefix}{bad}{suffix}");
        prop_assert!(NodeId::parse(&s).is_err());
    }

    // ----------------------------------------
    // TokenHash / SignatureBytes Properties
    // ----------------------------------------

    #[test]
    fn token_hash_hex_roundtrip(hash in arb_token_hash()) {
        let hex = hash.to_hex();
        let recovered = TokenHash::from_hex(&hex).unwrap();
        prop_assert_eq!(hash, recovered);
    }

    #[test]
    fn token_hash_short_is_prefix(hash in arb_token_hash()) {
        prop_assert!(hash.to_hex().starts_with(&hash.short()));
    }

    #[test]
    fn signature_bytes_base64_roundtrip(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let sig = SignatureBytes::new(bytes);
        let encoded = sig.to_base64();
        let recovered = SignatureBytes::from_base64(&encoded).unwrap();
        prop_assert_eq!(sig, recovered);
    }

    // ----------------------------------------
    // Token Properties
    // ----------------------------------------

    #[test]
    fn token_json_roundtrip(token in arb_token()) {
        let json = serde_json::to_string(&token).unwrap();
        let recovered: Token = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(token, recovered);
    }

    #[test]
    fn token_root_shape_matches_linkage(token in arb_token()) {
        prop_assert_eq!(token.is_root(), token.issuer_token_hash().is_none());
    }

    #[test]
    fn token_defaults_master_id_for_roots(node_id in arb_node_id()) {
        let token = Token::build(node_id.clone(), None, None, None, None, 0);
        prop_assert_eq!(token.master_id(), Some(&node_id));
    }

    #[test]
    fn token_hash_stable_across_serialization(token in arb_token()) {
        let before = *token.token_hash();
        let json = serde_json::to_string(&token).unwrap();
        let recovered: Token = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(before, *recovered.token_hash());
    }

    #[test]
    fn issued_level_is_issuer_level_plus_one(
        issuer in arb_token(),
        node_id in arb_node_id(),
    ) {
        let token = Token::build(
            node_id,
            Some(*issuer.token_hash()),
            Some(issuer.node_id().clone()),
            None,
            None,
            issuer.hierarchy_level() + 1,
        );
        prop_assert_eq!(token.hierarchy_level(), issuer.hierarchy_level() + 1);
        prop_assert_eq!(token.issuer_token_hash(), Some(issuer.token_hash()));
    }
}
