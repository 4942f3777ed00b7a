//! Pre-computed resolution actions.
//!
//! When a vote is created, its strategy builds both the approved and the
//! rejected action as complete, serialized payloads and seals them into the
//! signed request body. Executor nodes replay the stored action when the
//! vote resolves; they never re-derive it from live data.

use pact_store::{NodeInfo, Project, ProjectInstitution, ProjectNode, TeeGrant};
use pact_types::ProjectId;
use serde::{Deserialize, Serialize};

use crate::VoteError;

/// A callback payload run by every executor node when a vote resolves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ResolutionAction {
    /// Activate a project with its full membership graph.
    ApproveProject {
        project: Project,
        nodes: Vec<ProjectNode>,
        institutions: Vec<ProjectInstitution>,
    },
    /// Mark a reviewing project as rejected.
    RejectProject { project_id: ProjectId },
    /// Archive an approved project.
    ArchiveProject { project_id: ProjectId },
    /// Each route endpoint learns the other endpoint's directory entry.
    EstablishRoute { src: NodeInfo, dst: NodeInfo },
    /// Record an approved TEE export on every participant node.
    GrantTeeDownload { grant: TeeGrant },
    /// Nothing to do (e.g. rejection of an operation that pre-created no
    /// state).
    NoOp,
}

impl ResolutionAction {
    pub fn to_bytes(&self) -> Result<Vec<u8>, VoteError> {
        bincode::serialize(self).map_err(|e| VoteError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VoteError> {
        bincode::deserialize(bytes).map_err(|e| VoteError::Serialization(e.to_string()))
    }
}
