//! Project storage trait.

use crate::StoreError;
use pact_types::{InstitutionId, NodeId, ProjectId};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a shared project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectStatus {
    /// Creation approval is still pending.
    Reviewing,
    /// Approved and active.
    Approved,
    /// Creation approval was rejected; the row stays for audit.
    Rejected,
    /// Archived after an approved archive vote.
    Archived,
}

/// A cross-party project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    /// The institution that initiated the project.
    pub owner: InstitutionId,
}

/// Membership of one node in a project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectNode {
    pub project_id: ProjectId,
    pub node_id: NodeId,
}

/// Membership of one institution in a project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInstitution {
    pub project_id: ProjectId,
    pub institution_id: InstitutionId,
}

/// A recorded export grant out of a trusted execution environment.
///
/// Written on every participant node once a tee-download vote resolves
/// approved; the key is the full (project, resource, requester) triple.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeeGrant {
    pub project_id: ProjectId,
    pub resource_id: String,
    pub requester: NodeId,
}

/// Trait for project storage operations.
///
/// `put_project` is an upsert keyed by project id; the membership and grant
/// writers are upserts keyed by their full natural key, so re-inserting an
/// existing row is a no-op.
pub trait ProjectStore {
    fn put_project(&self, project: &Project) -> Result<(), StoreError>;
    fn get_project(&self, id: &ProjectId) -> Result<Project, StoreError>;
    fn project_exists(&self, id: &ProjectId) -> Result<bool, StoreError>;
    fn iter_projects(&self) -> Result<Vec<Project>, StoreError>;

    fn put_project_node(&self, member: &ProjectNode) -> Result<(), StoreError>;
    fn delete_project_node(&self, member: &ProjectNode) -> Result<(), StoreError>;
    fn project_nodes(&self, id: &ProjectId) -> Result<Vec<ProjectNode>, StoreError>;

    fn put_project_institution(&self, member: &ProjectInstitution) -> Result<(), StoreError>;
    fn delete_project_institution(&self, member: &ProjectInstitution) -> Result<(), StoreError>;
    fn project_institutions(&self, id: &ProjectId) -> Result<Vec<ProjectInstitution>, StoreError>;

    fn put_grant(&self, grant: &TeeGrant) -> Result<(), StoreError>;
    fn grants_for_project(&self, id: &ProjectId) -> Result<Vec<TeeGrant>, StoreError>;
}
