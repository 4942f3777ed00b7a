//! Fundamental types for the DataPact control plane.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: node/project/vote identifiers, timestamps, vote and sync state
//! enums, and key/signature types.

pub mod error;
pub mod id;
pub mod keys;
pub mod sync;
pub mod time;
pub mod vote;

pub use error::IdError;
pub use id::{InstitutionId, NodeId, ProjectId, VoteId};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use sync::{SyncAction, SyncDataType};
pub use time::Timestamp;
pub use vote::{ExecuteStatus, VoteAction, VoteStatus, VoteType};
