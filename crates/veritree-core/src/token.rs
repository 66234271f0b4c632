//! Token data model
//!
//! A token is immutable after construction: its `token_hash` is computed once
//! over the identity fields and never recomputed. Signature attachment only
//! adds material that is itself bound to the already-fixed hash, so a later
//! mutation of any hashed field shows up as tamper evidence during
//! verification instead of being silently repaired.

use std::collections::BTreeSet;

use chrono::{SecondsFormat, Utc};
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use crate::types::{NodeId, SignatureBytes, TokenHash, VerificationPath};

fn default_paths() -> BTreeSet<VerificationPath> {
    BTreeSet::from([VerificationPath::Chain])
}

/// One node's credential in the hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    node_id: NodeId,
    issuer_token_hash: Option<TokenHash>,
    issuer_id: Option<NodeId>,
    timestamp: String,
    token_id: String,
    token_data: String,
    token_hash: TokenHash,
    #[serde(default)]
    master_id: Option<NodeId>,
    #[serde(default)]
    hierarchy_level: u32,
    #[serde(default)]
    master_signature: Option<SignatureBytes>,
    #[serde(default)]
    issuer_signature: Option<SignatureBytes>,
    /// Reserved for future delegation proofs; always null today
    #[serde(default)]
    delegation_proof: Option<String>,
    /// Reserved for future Merkle proofs; always null today
    #[serde(default)]
    merkle_proof: Option<serde_json::Value>,
    #[serde(default = "default_paths")]
    verification_paths: BTreeSet<VerificationPath>,
}

impl Token {
    /// Construct a root-shaped token with no issuer linkage
    pub fn new(node_id: NodeId) -> Self {
        Self::build(node_id, None, None, None, None, 0)
    }

    /// Construct a token with full issuer linkage
    ///
    /// The timestamp, nonce, and content hash are fixed here; `master_id`
    /// defaults to the node's own id for root-shaped tokens.
    pub fn build(
        node_id: NodeId,
        issuer_token_hash: Option<TokenHash>,
        issuer_id: Option<NodeId>,
        token_data: Option<String>,
        master_id: Option<NodeId>,
        hierarchy_level: u32,
    ) -> Self {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let token_id = Uuid::new_v4().to_string();
        let token_data = token_data.unwrap_or_else(|| format!("token_for_{node_id}"));
        let master_id = master_id.or_else(|| {
            if issuer_token_hash.is_none() {
                Some(node_id.clone())
            } else {
                None
            }
        });

        let token_hash = content_digest(
            &node_id,
            issuer_token_hash.as_ref(),
            issuer_id.as_ref(),
            &timestamp,
            &token_id,
            &token_data,
        );

        Self {
            node_id,
            issuer_token_hash,
            issuer_id,
            timestamp,
            token_id,
            token_data,
            token_hash,
            master_id,
            hierarchy_level,
            master_signature: None,
            issuer_signature: None,
            delegation_proof: None,
            merkle_proof: None,
            verification_paths: default_paths(),
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn issuer_token_hash(&self) -> Option<&TokenHash> {
        self.issuer_token_hash.as_ref()
    }

    pub fn issuer_id(&self) -> Option<&NodeId> {
        self.issuer_id.as_ref()
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    pub fn token_data(&self) -> &str {
        &self.token_data
    }

    pub fn token_hash(&self) -> &TokenHash {
        &self.token_hash
    }

    pub fn master_id(&self) -> Option<&NodeId> {
        self.master_id.as_ref()
    }

    pub fn hierarchy_level(&self) -> u32 {
        self.hierarchy_level
    }

    pub fn master_signature(&self) -> Option<&SignatureBytes> {
        self.master_signature.as_ref()
    }

    pub fn issuer_signature(&self) -> Option<&SignatureBytes> {
        self.issuer_signature.as_ref()
    }

    pub fn verification_paths(&self) -> &BTreeSet<VerificationPath> {
        &self.verification_paths
    }

    /// A token is a root iff it carries no issuer token hash
    pub fn is_root(&self) -> bool {
        self.issuer_token_hash.is_none()
    }

    /// Whether this token supports the given verification path
    pub fn supports(&self, path: VerificationPath) -> bool {
        self.verification_paths.contains(&path)
    }

    /// Content covered by master/issuer signatures
    fn signing_content(&self, signer_id: &NodeId) -> String {
        format!(
            "{}:{}:{}:{}",
            self.node_id,
            self.token_hash.to_hex(),
            signer_id,
            self.timestamp
        )
    }

    /// Attach the master signature, enabling master-direct verification
    ///
    /// Best-effort: a signing failure leaves the token usable with the
    /// remaining paths.
    pub(crate) fn add_master_signature(&mut self, key: &SigningKey, master_id: &NodeId) {
        let content = self.signing_content(master_id);
        let signed: Result<EcdsaSignature, _> = key.try_sign(content.as_bytes());
        match signed {
            Ok(signature) => {
                self.master_signature = Some(SignatureBytes::new(signature.to_bytes().to_vec()));
                self.master_id = Some(master_id.clone());
                self.verification_paths.insert(VerificationPath::MasterDirect);
            }
            Err(err) => {
                warn!("master signature unavailable for {}: {err}", self.node_id);
            }
        }
    }

    /// Attach the issuer signature, enabling issuer-direct verification
    pub(crate) fn add_issuer_signature(&mut self, key: &SigningKey, issuer_id: &NodeId) {
        let content = self.signing_content(issuer_id);
        let signed: Result<EcdsaSignature, _> = key.try_sign(content.as_bytes());
        match signed {
            Ok(signature) => {
                self.issuer_signature = Some(SignatureBytes::new(signature.to_bytes().to_vec()));
                self.verification_paths.insert(VerificationPath::IssuerDirect);
            }
            Err(err) => {
                warn!("issuer signature unavailable for {}: {err}", self.node_id);
            }
        }
    }

    /// Check the master signature against the master public key
    pub fn verify_master_signature(&self, master_key: &VerifyingKey) -> bool {
        let (Some(signature), Some(master_id)) = (&self.master_signature, &self.master_id) else {
            return false;
        };
        let Ok(signature) = EcdsaSignature::from_slice(signature.as_bytes()) else {
            return false;
        };
        let content = self.signing_content(master_id);
        master_key.verify(content.as_bytes(), &signature).is_ok()
    }

    /// Check the issuer signature against the given issuer's public key
    pub fn verify_issuer_signature(&self, issuer_key: &VerifyingKey, issuer_id: &NodeId) -> bool {
        let Some(signature) = &self.issuer_signature else {
            return false;
        };
        let Ok(signature) = EcdsaSignature::from_slice(signature.as_bytes()) else {
            return false;
        };
        let content = self.signing_content(issuer_id);
        issuer_key.verify(content.as_bytes(), &signature).is_ok()
    }
}

/// SHA-256 over the identity fields, computed once at construction
fn content_digest(
    node_id: &NodeId,
    issuer_token_hash: Option<&TokenHash>,
    issuer_id: Option<&NodeId>,
    timestamp: &str,
    token_id: &str,
    token_data: &str,
) -> TokenHash {
    let issuer_hash = issuer_token_hash
        .map(TokenHash::to_hex)
        .unwrap_or_else(|| "none".to_string());
    let issuer = issuer_id
        .map(|id| id.as_str().to_string())
        .unwrap_or_else(|| "none".to_string());
    let content = format!("{node_id}:{issuer_hash}:{issuer}:{timestamp}:{token_id}:{token_data}");

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    TokenHash::new(hasher.finalize().into())
}
