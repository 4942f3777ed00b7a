//! Node directory storage trait.
//!
//! The directory resolves a node id to its display name, address,
//! institution, and public key. It is the authority collaborators consult
//! when building vote invites and when verifying a signed request body.

use crate::StoreError;
use pact_types::{InstitutionId, NodeId, PublicKey};
use serde::{Deserialize, Serialize};

/// Directory entry for one node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    /// Host:port the node's API is reachable at.
    pub address: String,
    pub institution_id: InstitutionId,
    pub public_key: PublicKey,
}

/// Trait for the node directory.
pub trait NodeDirectoryStore {
    /// Insert or update a node entry.
    fn put_node(&self, info: &NodeInfo) -> Result<(), StoreError>;

    /// Resolve a node id.
    fn get_node(&self, id: &NodeId) -> Result<NodeInfo, StoreError>;

    /// Whether a node id is known.
    fn node_exists(&self, id: &NodeId) -> Result<bool, StoreError>;

    /// All known nodes.
    fn iter_nodes(&self) -> Result<Vec<NodeInfo>, StoreError>;

    /// All nodes belonging to one institution.
    fn nodes_for_institution(&self, inst: &InstitutionId) -> Result<Vec<NodeInfo>, StoreError>;
}
