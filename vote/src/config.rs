//! Type-specific approval configs.
//!
//! The config is the immutable business payload of a vote: it carries the
//! operation's pre-conditions and everything needed to replay the approved
//! or rejected callback. Persisted once at creation, referenced by vote id,
//! never mutated.

use pact_types::{InstitutionId, NodeId, ProjectId};
use serde::{Deserialize, Serialize};

use crate::VoteError;

/// One participating party in a project-create request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectParty {
    pub node_id: NodeId,
    pub institution_id: InstitutionId,
}

/// Config for creating a shared project across institutions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCreateConfig {
    pub project_id: ProjectId,
    pub name: String,
    pub description: String,
    /// Full participant graph, including the initiator's own node.
    pub parties: Vec<ProjectParty>,
}

/// Config for archiving an existing project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectArchiveConfig {
    pub project_id: ProjectId,
}

/// Config for establishing a network route between two nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRouteConfig {
    pub src_node_id: NodeId,
    pub src_address: String,
    pub dst_node_id: NodeId,
    pub dst_address: String,
}

/// Config for exporting a resource out of a TEE.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeeDownloadConfig {
    pub project_id: ProjectId,
    pub resource_id: String,
    pub requester_node_id: NodeId,
}

/// The type-specific payload of an approval request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteConfig {
    ProjectCreate(ProjectCreateConfig),
    ProjectArchive(ProjectArchiveConfig),
    NodeRoute(NodeRouteConfig),
    TeeDownload(TeeDownloadConfig),
}

impl VoteConfig {
    pub fn to_bytes(&self) -> Result<Vec<u8>, VoteError> {
        bincode::serialize(self).map_err(|e| VoteError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VoteError> {
        bincode::deserialize(bytes).map_err(|e| VoteError::Serialization(e.to_string()))
    }
}
