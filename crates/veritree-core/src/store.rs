//! Directory-backed token persistence
//!
//! One JSON file per token, named by node id. The store is the sole source
//! of truth at process start; after that the network state is
//! memory-resident and writes go through [`TokenStore::save`]. A corrupt
//! record excludes only that entry from the load, never the whole store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::token::Token;
use crate::types::NodeId;

/// Suffix of persisted token files
pub const TOKEN_FILE_SUFFIX: &str = "_token.json";

/// Persists and reloads the token set for one store directory
pub struct TokenStore {
    dir: PathBuf,
}

/// Result of loading a store directory
pub struct LoadedTokens {
    /// All readable tokens, keyed by node id
    pub tokens: BTreeMap<NodeId, Token>,
    /// The active root: first root-shaped record in file-name order
    pub root: Option<NodeId>,
}

impl TokenStore {
    /// Open (creating if needed) a store directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The store directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The key material subdirectory
    pub fn keys_dir(&self) -> PathBuf {
        self.dir.join("keys")
    }

    fn token_path(&self, node_id: &NodeId) -> PathBuf {
        self.dir.join(format!("{node_id}{TOKEN_FILE_SUFFIX}"))
    }

    /// Persist one token, written atomically via temp file and rename
    pub fn save(&self, token: &Token) -> Result<(), StoreError> {
        let path = self.token_path(token.node_id());
        let content = serde_json::to_string_pretty(token)?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &path)?;

        debug!("saved token for {} to {}", token.node_id(), path.display());
        Ok(())
    }

    /// Load every readable token from the directory
    ///
    /// Files without the token suffix are skipped silently; unreadable or
    /// schema-invalid token files are skipped with a warning. Root selection
    /// is deterministic: files are visited in lexicographic name order and
    /// the first root-shaped record wins; later ones are reported.
    pub fn load_all(&self) -> Result<LoadedTokens, StoreError> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_token_file = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.ends_with(TOKEN_FILE_SUFFIX))
                .unwrap_or(false);
            if path.is_file() && is_token_file {
                paths.push(path);
            }
        }
        paths.sort();

        let mut tokens = BTreeMap::new();
        let mut root: Option<NodeId> = None;
        for path in paths {
            let token = match read_token(&path) {
                Ok(token) => token,
                Err(err) => {
                    warn!("skipping {err}");
                    continue;
                }
            };

            if token.is_root() {
                match &root {
                    None => root = Some(token.node_id().clone()),
                    Some(active) => warn!(
                        "ignoring extra root-shaped token {} (active root is {active})",
                        token.node_id()
                    ),
                }
            }
            tokens.insert(token.node_id().clone(), token);
        }

        debug!("loaded {} tokens from {}", tokens.len(), self.dir.display());
        Ok(LoadedTokens { tokens, root })
    }
}

fn read_token(path: &Path) -> Result<Token, StoreError> {
    let content = fs::read_to_string(path).map_err(|err| StoreError::CorruptRecord {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|err| StoreError::CorruptRecord {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}
