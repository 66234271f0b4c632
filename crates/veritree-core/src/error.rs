//! Error types for the Veritree library

use std::path::PathBuf;

use thiserror::Error;

use crate::types::NodeId;

/// Rejected node identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidNodeId {
    #[error("node id must be a non-empty string")]
    Empty,

    #[error("node id must be {max} characters or less (got {0})", max = crate::MAX_NODE_ID_LEN)]
    TooLong(usize),

    #[error("node id contains disallowed character {0:?}")]
    DisallowedChar(char),
}

/// Errors raised while creating or issuing tokens
#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("invalid node id: {0}")]
    InvalidNodeId(#[from] InvalidNodeId),

    #[error("a master token already exists for node {0}")]
    DuplicateRoot(NodeId),

    #[error("node {0} already has a token")]
    DuplicateNode(NodeId),

    #[error("issuer and new node cannot be the same")]
    SelfIssuance,

    #[error("no master token exists; create a master token first")]
    MissingRoot,

    #[error("issuer node {0} not found")]
    IssuerNotFound(NodeId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised for malformed verification queries
///
/// Failed checks are not errors: they come back as an invalid
/// [`VerifyReport`](crate::verify::VerifyReport) with a trace.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("token for node {0} not found")]
    TokenNotFound(NodeId),

    #[error("issuer node {0} not found")]
    UnknownIssuer(NodeId),
}

/// Errors raised by the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt record {}: {reason}", path.display())]
    CorruptRecord { path: PathBuf, reason: String },

    #[error("key error: {0}")]
    Key(String),
}
