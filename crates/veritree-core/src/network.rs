//! In-memory network state and token issuance
//!
//! One [`TokenNetwork`] instance owns the token table, the root reference,
//! and the key material for a single store directory. It is populated from
//! disk at open, mutated only by issuance, and read by the verification
//! engine. Execution is single-threaded and synchronous; concurrent
//! processes sharing a directory must reload to observe each other's writes.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::{IssuanceError, StoreError};
use crate::keys::KeyManager;
use crate::store::TokenStore;
use crate::token::Token;
use crate::types::NodeId;

/// The aggregate state of one token hierarchy
pub struct TokenNetwork {
    pub(crate) store: TokenStore,
    pub(crate) keys: KeyManager,
    pub(crate) tokens: BTreeMap<NodeId, Token>,
    pub(crate) root: Option<NodeId>,
}

impl TokenNetwork {
    /// Open a store directory and load all persisted tokens and keys
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = TokenStore::open(dir)?;
        let keys = KeyManager::open(store.keys_dir())?;
        let loaded = store.load_all()?;

        Ok(Self {
            store,
            keys,
            tokens: loaded.tokens,
            root: loaded.root,
        })
    }

    /// Create the master (root) token for this hierarchy
    ///
    /// Fails if a root already exists or the id is taken. The master
    /// self-signs its token so even the root supports master-direct
    /// verification.
    pub fn create_master(&mut self, master_id: NodeId) -> Result<Token, IssuanceError> {
        if let Some(root) = &self.root {
            return Err(IssuanceError::DuplicateRoot(root.clone()));
        }
        if self.tokens.contains_key(&master_id) {
            return Err(IssuanceError::DuplicateNode(master_id));
        }

        let mut token = Token::build(
            master_id.clone(),
            None,
            None,
            None,
            Some(master_id.clone()),
            0,
        );
        let pair = self.keys.ensure_master();
        token.add_master_signature(&pair.signing, &master_id);

        self.store.save(&token)?;
        info!("created master token for {master_id}");

        self.root = Some(master_id.clone());
        self.tokens.insert(master_id, token.clone());
        Ok(token)
    }

    /// Issue a token to a new node on behalf of an existing issuer
    ///
    /// The new token links to its issuer by token hash and carries the
    /// master signature cascade, so every token, however deep, has a direct
    /// path back to the root. Signature attachment is best-effort: an
    /// unavailable key only omits that verification path.
    pub fn issue(
        &mut self,
        issuer_id: &NodeId,
        new_node_id: NodeId,
        token_data: Option<String>,
    ) -> Result<Token, IssuanceError> {
        let Some(root_id) = self.root.clone() else {
            return Err(IssuanceError::MissingRoot);
        };
        let issuer = self
            .tokens
            .get(issuer_id)
            .ok_or_else(|| IssuanceError::IssuerNotFound(issuer_id.clone()))?;
        if *issuer_id == new_node_id {
            return Err(IssuanceError::SelfIssuance);
        }
        if self.tokens.contains_key(&new_node_id) {
            return Err(IssuanceError::DuplicateNode(new_node_id));
        }

        let hierarchy_level = issuer.hierarchy_level() + 1;
        let issuer_hash = *issuer.token_hash();

        let mut token = Token::build(
            new_node_id.clone(),
            Some(issuer_hash),
            Some(issuer_id.clone()),
            token_data,
            Some(root_id.clone()),
            hierarchy_level,
        );

        // Master signature cascade
        match self.keys.master() {
            Some(master) => token.add_master_signature(&master.signing, &root_id),
            None => warn!("master key unavailable; {new_node_id} gets no master signature"),
        }

        // Issuer signature, generating the issuer's keys on first use
        let issuer_pair = self.keys.ensure_node(issuer_id);
        token.add_issuer_signature(&issuer_pair.signing, issuer_id);

        // Keys for the new node so it can issue later
        self.keys.ensure_node(&new_node_id);

        self.store.save(&token)?;
        info!("issued token to {new_node_id} (issuer {issuer_id}, level {hierarchy_level})");

        self.tokens.insert(new_node_id, token.clone());
        Ok(token)
    }

    /// Look up a token by node id
    pub fn get(&self, node_id: &NodeId) -> Option<&Token> {
        self.tokens.get(node_id)
    }

    /// The active root token, if one exists
    pub fn root(&self) -> Option<&Token> {
        self.root.as_ref().and_then(|id| self.tokens.get(id))
    }

    /// The active root's node id
    pub fn root_id(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    /// Iterate over all tokens in node-id order
    pub fn list(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    /// Number of tokens in the network
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the network holds no tokens
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// SPKI PEM export of a node's public key, for packaging collaborators
    ///
    /// The root resolves to the master public key; other nodes resolve to
    /// their own pair, present only once they have issued.
    pub fn public_key_pem(&self, node_id: &NodeId) -> Option<String> {
        if self.root.as_ref() == Some(node_id) {
            self.keys.master_public_pem()
        } else {
            self.keys.node_public_pem(node_id)
        }
    }
}
