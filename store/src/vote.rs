//! Vote storage trait.
//!
//! Vote requests, invites, and type-specific configs are stored as opaque
//! serialized blobs keyed by their natural keys; the vote crate owns the
//! concrete aggregate types and their encoding. Blobs keep this trait free
//! of a dependency on the vote crate (which itself depends on the store).

use crate::StoreError;
use pact_types::{NodeId, VoteId};

/// Trait for storing approval state (requests, invites, configs).
///
/// All `put_*` operations are upserts: writing an existing key replaces the
/// stored blob. Redelivered change events therefore apply cleanly.
pub trait VoteStore {
    /// Store (or replace) a vote request.
    fn put_request(&self, vote_id: &VoteId, data: &[u8]) -> Result<(), StoreError>;

    /// Get a vote request by id.
    fn get_request(&self, vote_id: &VoteId) -> Result<Vec<u8>, StoreError>;

    /// List every stored vote request.
    fn iter_requests(&self) -> Result<Vec<Vec<u8>>, StoreError>;

    /// Store (or replace) a voter's invite for a vote.
    fn put_invite(&self, vote_id: &VoteId, voter: &NodeId, data: &[u8]) -> Result<(), StoreError>;

    /// Get a specific voter's invite for a vote.
    fn get_invite(&self, vote_id: &VoteId, voter: &NodeId) -> Result<Vec<u8>, StoreError>;

    /// All invites addressed to one voter (its pending-work discovery query).
    fn invites_for_voter(&self, voter: &NodeId) -> Result<Vec<Vec<u8>>, StoreError>;

    /// Store the immutable type-specific config for a vote.
    fn put_config(&self, vote_id: &VoteId, data: &[u8]) -> Result<(), StoreError>;

    /// Get the type-specific config for a vote.
    fn get_config(&self, vote_id: &VoteId) -> Result<Vec<u8>, StoreError>;
}
