//! Multi-path token verification
//!
//! Four independent algorithms over the in-memory network state, all
//! read-only. Each returns a [`VerifyReport`]: a boolean verdict, a
//! human-readable trace of the steps taken (diagnostics and audit, never
//! control flow), and the specific check that failed. Hybrid verification
//! aggregates every applicable method and accepts if any one succeeds,
//! which keeps tokens verifiable when some intermediate data is missing.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::VerificationError;
use crate::network::TokenNetwork;
use crate::token::Token;
use crate::types::{NodeId, VerificationPath};

/// The specific check a verification run failed on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyFailure {
    /// An issuer named in the chain has no token in the store
    IssuerNotFound(NodeId),
    /// A token's recorded issuer hash does not match its issuer's token
    HashChainBroken(NodeId),
    /// A root-shaped token that is not the registered root
    RootMismatch(NodeId),
    /// Issuer traversal exceeded the token count
    CycleDetected,
    /// The token does not carry the requested verification path
    SignatureUnavailable,
    /// The public key needed for the check is not loaded
    KeyUnavailable,
    /// The signature is present but does not verify
    SignatureInvalid,
    /// The claimed issuer is not among the token's ancestors
    IssuerNotInChain(NodeId),
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyFailure::IssuerNotFound(id) => write!(f, "issuer {id} not found"),
            VerifyFailure::HashChainBroken(id) => write!(f, "hash chain broken at {id}"),
            VerifyFailure::RootMismatch(id) => write!(f, "{id} is not the registered root"),
            VerifyFailure::CycleDetected => write!(f, "issuer cycle detected"),
            VerifyFailure::SignatureUnavailable => write!(f, "signature path unavailable"),
            VerifyFailure::KeyUnavailable => write!(f, "verification key unavailable"),
            VerifyFailure::SignatureInvalid => write!(f, "signature invalid"),
            VerifyFailure::IssuerNotInChain(id) => write!(f, "issuer {id} not in chain"),
        }
    }
}

/// Outcome of a single verification algorithm
#[derive(Debug, Clone)]
pub struct VerifyReport {
    /// Whether the token passed this method
    pub valid: bool,
    /// Steps taken, for diagnostics and audit
    pub trace: Vec<String>,
    /// First failed check, when invalid
    pub failure: Option<VerifyFailure>,
}

impl VerifyReport {
    fn pass(trace: Vec<String>) -> Self {
        Self {
            valid: true,
            trace,
            failure: None,
        }
    }

    fn fail(trace: Vec<String>, failure: VerifyFailure) -> Self {
        Self {
            valid: false,
            trace,
            failure: Some(failure),
        }
    }
}

/// Aggregate outcome of hybrid verification
#[derive(Debug, Clone)]
pub struct HybridReport {
    /// Logical OR of all attempted methods
    pub valid: bool,
    /// Per-method reports, keyed by verification path
    pub results: BTreeMap<VerificationPath, VerifyReport>,
}

impl TokenNetwork {
    /// Validate a token by walking issuer links back to the registered root
    ///
    /// Each step checks hash-chain continuity: the issuer's token hash must
    /// equal the hash the current token recorded at issuance. Traversal is
    /// bounded by the token count, so injected cycles terminate with a
    /// distinct failure instead of looping.
    pub fn verify_chain(&self, node_id: &NodeId) -> Result<VerifyReport, VerificationError> {
        let mut current = self
            .tokens
            .get(node_id)
            .ok_or_else(|| VerificationError::TokenNotFound(node_id.clone()))?;

        let mut trace = Vec::new();
        let max_steps = self.tokens.len();
        for _ in 0..max_steps {
            trace.push(format!(
                "{} -> {}...",
                current.node_id(),
                current.token_hash().short()
            ));

            let Some(expected_hash) = current.issuer_token_hash() else {
                // Root-shaped: valid only if this is the active root
                if self.root.as_ref() == Some(current.node_id()) {
                    return Ok(VerifyReport::pass(trace));
                }
                trace.push(format!("{} is not the registered root", current.node_id()));
                return Ok(VerifyReport::fail(
                    trace,
                    VerifyFailure::RootMismatch(current.node_id().clone()),
                ));
            };

            let Some(issuer_id) = current.issuer_id() else {
                // Linkage invariant violated; treat as tampered chain data
                trace.push(format!("{} names no issuer", current.node_id()));
                return Ok(VerifyReport::fail(
                    trace,
                    VerifyFailure::HashChainBroken(current.node_id().clone()),
                ));
            };

            let Some(issuer) = self.tokens.get(issuer_id) else {
                trace.push(format!("issuer {issuer_id} not found"));
                return Ok(VerifyReport::fail(
                    trace,
                    VerifyFailure::IssuerNotFound(issuer_id.clone()),
                ));
            };

            if issuer.token_hash() != expected_hash {
                trace.push("hash chain broken: issuer token hash mismatch".to_string());
                return Ok(VerifyReport::fail(
                    trace,
                    VerifyFailure::HashChainBroken(current.node_id().clone()),
                ));
            }

            current = issuer;
        }

        trace.push("issuer chain longer than token count".to_string());
        Ok(VerifyReport::fail(trace, VerifyFailure::CycleDetected))
    }

    /// Validate a token using only the master signature
    ///
    /// Needs nothing but the target token and the master public key, so it
    /// works when intermediate tokens are absent from the store.
    pub fn verify_master_direct(
        &self,
        node_id: &NodeId,
    ) -> Result<VerifyReport, VerificationError> {
        let token = self
            .tokens
            .get(node_id)
            .ok_or_else(|| VerificationError::TokenNotFound(node_id.clone()))?;

        if !token.supports(VerificationPath::MasterDirect) {
            return Ok(VerifyReport::fail(
                vec!["master signature not available for this token".to_string()],
                VerifyFailure::SignatureUnavailable,
            ));
        }
        let Some(master_key) = self.keys.master_verifying() else {
            return Ok(VerifyReport::fail(
                vec!["master public key not available".to_string()],
                VerifyFailure::KeyUnavailable,
            ));
        };

        if token.verify_master_signature(master_key) {
            Ok(VerifyReport::pass(vec![format!(
                "master signature verified for {node_id}"
            )]))
        } else {
            Ok(VerifyReport::fail(
                vec!["master signature verification failed".to_string()],
                VerifyFailure::SignatureInvalid,
            ))
        }
    }

    /// Validate that a specific node issued a token, directly or transitively
    ///
    /// The direct case prefers the issuer's signature and falls back to the
    /// hash-chain equality check when signature material is unavailable. The
    /// indirect case walks ancestors looking for the claimed issuer.
    pub fn verify_as_issuer(
        &self,
        issuer_id: &NodeId,
        descendant_id: &NodeId,
    ) -> Result<VerifyReport, VerificationError> {
        let descendant = self
            .tokens
            .get(descendant_id)
            .ok_or_else(|| VerificationError::TokenNotFound(descendant_id.clone()))?;
        let issuer = self
            .tokens
            .get(issuer_id)
            .ok_or_else(|| VerificationError::UnknownIssuer(issuer_id.clone()))?;

        if descendant.issuer_id() == Some(issuer_id) {
            // Direct issuance: signature check when possible
            if descendant.supports(VerificationPath::IssuerDirect) {
                if let Some(issuer_key) = self.keys.node_verifying(issuer_id) {
                    return Ok(if descendant.verify_issuer_signature(issuer_key, issuer_id) {
                        VerifyReport::pass(vec![format!(
                            "direct issuer signature verified: {issuer_id} -> {descendant_id}"
                        )])
                    } else {
                        VerifyReport::fail(
                            vec!["direct issuer signature verification failed".to_string()],
                            VerifyFailure::SignatureInvalid,
                        )
                    });
                }
            }

            // Fall back to hash-chain continuity
            return Ok(
                if descendant.issuer_token_hash() == Some(issuer.token_hash()) {
                    VerifyReport::pass(vec![format!(
                        "hash chain verified: {issuer_id} -> {descendant_id}"
                    )])
                } else {
                    VerifyReport::fail(
                        vec!["hash chain verification failed".to_string()],
                        VerifyFailure::HashChainBroken(descendant_id.clone()),
                    )
                },
            );
        }

        Ok(self.verify_indirect_issuance(issuer_id, descendant))
    }

    /// Walk ancestors of `descendant` looking for `issuer_id`
    fn verify_indirect_issuance(&self, issuer_id: &NodeId, descendant: &Token) -> VerifyReport {
        let mut trace = Vec::new();
        let mut current = descendant;
        let max_steps = self.tokens.len();
        let mut steps = 0;

        while let Some(parent_id) = current.issuer_id() {
            if steps >= max_steps {
                trace.push("issuer chain longer than token count".to_string());
                return VerifyReport::fail(trace, VerifyFailure::CycleDetected);
            }
            steps += 1;
            trace.push(current.node_id().to_string());

            if parent_id == issuer_id {
                trace.push(format!("{issuer_id} (issuer found)"));
                return VerifyReport::pass(trace);
            }

            let Some(parent) = self.tokens.get(parent_id) else {
                trace.push(format!("missing issuer: {parent_id}"));
                return VerifyReport::fail(trace, VerifyFailure::IssuerNotFound(parent_id.clone()));
            };
            current = parent;
        }

        trace.push(format!("issuer {issuer_id} not found in chain"));
        VerifyReport::fail(trace, VerifyFailure::IssuerNotInChain(issuer_id.clone()))
    }

    /// Run every applicable method and accept if any one succeeds
    ///
    /// Chain verification always runs; master-direct runs when the token
    /// carries that path; issuer-direct runs against the token's own
    /// declared issuer when that issuer is present in the store.
    pub fn verify_hybrid(&self, node_id: &NodeId) -> Result<HybridReport, VerificationError> {
        let token = self
            .tokens
            .get(node_id)
            .ok_or_else(|| VerificationError::TokenNotFound(node_id.clone()))?;

        let mut results = BTreeMap::new();
        results.insert(VerificationPath::Chain, self.verify_chain(node_id)?);

        if token.supports(VerificationPath::MasterDirect) {
            results.insert(
                VerificationPath::MasterDirect,
                self.verify_master_direct(node_id)?,
            );
        }

        if let Some(issuer_id) = token.issuer_id() {
            if self.tokens.contains_key(issuer_id) {
                results.insert(
                    VerificationPath::IssuerDirect,
                    self.verify_as_issuer(issuer_id, node_id)?,
                );
            }
        }

        let valid = results.values().any(|report| report.valid);
        Ok(HybridReport { valid, results })
    }
}
