//! Vote protocol errors.
//!
//! The variants follow the control plane's error taxonomy: validation and
//! authorization errors are rejected synchronously with no state change,
//! conflicts are logged-and-ignored by callers, and signature failures
//! reject an inbound message outright.

use pact_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("unknown vote type: {0}")]
    UnknownType(String),

    #[error("invalid vote request: {0}")]
    Validation(String),

    #[error("no counterpart voters for this request")]
    NoCounterpart,

    #[error("vote {0} not found")]
    NotFound(String),

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("signature verification failed: {0}")]
    BadSignature(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(String),
}
