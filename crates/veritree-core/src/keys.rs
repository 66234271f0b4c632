//! Key generation, persistence, and lookup
//!
//! Key pairs are persisted as PEM: PKCS#8 for private keys, SPKI for public
//! keys, one pair per node under the store's `keys/` directory. Private keys
//! are stored unencrypted on the local filesystem; this is a documented
//! limitation of the on-disk format, not an oversight. Missing or corrupt key
//! files only disable the affected signing capability.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::rand_core::OsRng;
use k256::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding,
};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::StoreError;
use crate::types::NodeId;

/// Reserved file-name stem for the master key pair
pub const MASTER_KEY_NAME: &str = "master";

/// An asymmetric key pair held in memory
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Private signing key
    pub signing: SigningKey,
    /// Public verification key
    pub verifying: VerifyingKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the OS RNG
    ///
    /// No side effects; persistence is the caller's responsibility.
    pub fn generate() -> Self {
        let signing = SigningKey::random(&mut OsRng);
        let verifying = VerifyingKey::from(&signing);
        Self { signing, verifying }
    }
}

/// Produces and retrieves key material for the master and for issuing nodes
pub struct KeyManager {
    keys_dir: PathBuf,
    master: Option<KeyPair>,
    nodes: HashMap<NodeId, KeyPair>,
}

impl KeyManager {
    /// Open the key directory and load every readable pair
    pub fn open(keys_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let keys_dir = keys_dir.into();
        fs::create_dir_all(&keys_dir)?;

        let mut manager = Self {
            keys_dir,
            master: None,
            nodes: HashMap::new(),
        };
        manager.load_all()?;
        Ok(manager)
    }

    fn load_all(&mut self) -> Result<(), StoreError> {
        for entry in fs::read_dir(&self.keys_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(stem) = name.strip_suffix("_private.pem") else {
                continue;
            };

            if stem == MASTER_KEY_NAME {
                self.master = load_pair(&self.keys_dir, MASTER_KEY_NAME);
                continue;
            }
            match NodeId::parse(stem) {
                Ok(node_id) => {
                    if let Some(pair) = load_pair(&self.keys_dir, stem) {
                        self.nodes.insert(node_id, pair);
                    }
                }
                Err(err) => {
                    warn!("skipping key file {name} with invalid node id: {err}");
                }
            }
        }
        debug!(
            "loaded {} node key pairs (master: {})",
            self.nodes.len(),
            self.master.is_some()
        );
        Ok(())
    }

    /// Master key pair, if available
    pub fn master(&self) -> Option<&KeyPair> {
        self.master.as_ref()
    }

    /// Master verification key, if available
    pub fn master_verifying(&self) -> Option<&VerifyingKey> {
        self.master.as_ref().map(|pair| &pair.verifying)
    }

    /// A node's key pair, if it has ever signed
    pub fn node(&self, node_id: &NodeId) -> Option<&KeyPair> {
        self.nodes.get(node_id)
    }

    /// A node's verification key, if available
    pub fn node_verifying(&self, node_id: &NodeId) -> Option<&VerifyingKey> {
        self.nodes.get(node_id).map(|pair| &pair.verifying)
    }

    /// Idempotently load or generate the master key pair
    ///
    /// Persistence failures degrade to an in-memory pair so issuance can
    /// still sign within the session.
    pub fn ensure_master(&mut self) -> &KeyPair {
        let keys_dir = &self.keys_dir;
        self.master.get_or_insert_with(|| {
            let pair = KeyPair::generate();
            if let Err(err) = save_pair(keys_dir, MASTER_KEY_NAME, &pair) {
                warn!("failed to persist master key pair: {err}");
            }
            pair
        })
    }

    /// Idempotently load or generate a node's key pair
    ///
    /// Invoked lazily the first time a node needs to sign.
    pub fn ensure_node(&mut self, node_id: &NodeId) -> &KeyPair {
        match self.nodes.entry(node_id.clone()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let pair = KeyPair::generate();
                if let Err(err) = save_pair(&self.keys_dir, node_id.as_str(), &pair) {
                    warn!("failed to persist key pair for {node_id}: {err}");
                }
                vacant.insert(pair)
            }
        }
    }

    /// SPKI PEM export of the master public key
    pub fn master_public_pem(&self) -> Option<String> {
        let pair = self.master.as_ref()?;
        pair.verifying.to_public_key_pem(LineEnding::LF).ok()
    }

    /// SPKI PEM export of a node's public key, for packaging collaborators
    pub fn node_public_pem(&self, node_id: &NodeId) -> Option<String> {
        let pair = self.nodes.get(node_id)?;
        pair.verifying.to_public_key_pem(LineEnding::LF).ok()
    }
}

fn private_key_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}_private.pem"))
}

fn public_key_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}_public.pem"))
}

/// Load a PEM pair from disk; unreadable material is reported and skipped
fn load_pair(dir: &Path, name: &str) -> Option<KeyPair> {
    let private_path = private_key_path(dir, name);
    let public_path = public_key_path(dir, name);
    if !private_path.exists() || !public_path.exists() {
        return None;
    }

    let private_pem = match fs::read_to_string(&private_path) {
        Ok(pem) => Zeroizing::new(pem),
        Err(err) => {
            warn!("failed to read {}: {err}", private_path.display());
            return None;
        }
    };
    let signing = match SigningKey::from_pkcs8_pem(&private_pem) {
        Ok(key) => key,
        Err(err) => {
            warn!("corrupt private key {}: {err}", private_path.display());
            return None;
        }
    };

    let public_pem = match fs::read_to_string(&public_path) {
        Ok(pem) => pem,
        Err(err) => {
            warn!("failed to read {}: {err}", public_path.display());
            return None;
        }
    };
    let verifying = match VerifyingKey::from_public_key_pem(&public_pem) {
        Ok(key) => key,
        Err(err) => {
            warn!("corrupt public key {}: {err}", public_path.display());
            return None;
        }
    };

    Some(KeyPair { signing, verifying })
}

/// Persist a PEM pair, private key written atomically with mode 0600
fn save_pair(dir: &Path, name: &str, pair: &KeyPair) -> Result<(), StoreError> {
    let private_pem = pair
        .signing
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|err| StoreError::Key(err.to_string()))?;
    let public_pem = pair
        .verifying
        .to_public_key_pem(LineEnding::LF)
        .map_err(|err| StoreError::Key(err.to_string()))?;

    let private_path = private_key_path(dir, name);
    let temp_path = private_path.with_extension("pem.tmp");
    fs::write(&temp_path, private_pem.as_bytes())?;
    fs::rename(&temp_path, &private_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&private_path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(&private_path, perms)?;
    }

    let public_path = public_key_path(dir, name);
    let temp_path = public_path.with_extension("pem.tmp");
    fs::write(&temp_path, public_pem.as_bytes())?;
    fs::rename(&temp_path, &public_path)?;

    Ok(())
}
