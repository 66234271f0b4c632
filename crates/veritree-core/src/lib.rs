//! Veritree Core - Token data model, key management, and verification engine
//!
//! A hierarchical trust engine: a root authority (the "master") issues
//! cryptographically linked tokens to subordinate nodes, who may in turn
//! issue tokens to further descendants. Any token holder can prove legitimate
//! issuance through several independent mechanisms: walking the hash chain
//! back to the root, checking the master's cascaded signature, or checking a
//! specific issuer's signature.

pub mod error;
pub mod keys;
pub mod network;
pub mod store;
pub mod token;
pub mod types;
pub mod verify;

pub use error::{InvalidNodeId, IssuanceError, StoreError, VerificationError};
pub use keys::{KeyManager, KeyPair, MASTER_KEY_NAME};
pub use network::TokenNetwork;
pub use store::{TokenStore, TOKEN_FILE_SUFFIX};
pub use token::Token;
pub use types::{NodeId, SignatureBytes, TokenHash, VerificationPath};
pub use verify::{HybridReport, VerifyFailure, VerifyReport};

/// Maximum length of a node identifier
pub const MAX_NODE_ID_LEN: usize = 64;
