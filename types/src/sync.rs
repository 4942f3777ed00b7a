//! Enums describing cross-node change propagation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to the source aggregate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

/// The synchronizable aggregate kinds.
///
/// Every aggregate that crosses a node boundary is one of these; the peer
/// applies each as an idempotent upsert keyed by the aggregate's natural key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncDataType {
    VoteRequest,
    VoteInvite,
    VoteConfig,
    Project,
    ProjectNode,
    ProjectInstitution,
}

impl SyncDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VoteRequest => "vote-request",
            Self::VoteInvite => "vote-invite",
            Self::VoteConfig => "vote-config",
            Self::Project => "project",
            Self::ProjectNode => "project-node",
            Self::ProjectInstitution => "project-inst",
        }
    }
}

impl fmt::Display for SyncDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
