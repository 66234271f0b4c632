#![no_main]

use libfuzzer_sys::fuzz_target;
use veritree_core::NodeId;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(id) = NodeId::parse(s) {
        // Accepted ids satisfy the documented invariant
        assert!(!id.as_str().is_empty());
        assert!(id.as_str().chars().count() <= veritree_core::MAX_NODE_ID_LEN);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));

        // Round-trip through the string form
        let again = NodeId::parse(id.as_str()).unwrap();
        assert_eq!(id, again);
    }
});
