#![no_main]

use libfuzzer_sys::fuzz_target;
use veritree_core::Token;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    // Parsing an arbitrary record must never panic, and every accepted
    // record must survive a serialize/deserialize round trip unchanged.
    if let Ok(token) = serde_json::from_str::<Token>(s) {
        assert_eq!(token.is_root(), token.issuer_token_hash().is_none());

        let json = serde_json::to_string(&token).unwrap();
        let again: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(token, again);
    }
});
