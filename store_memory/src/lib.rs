//! In-memory implementation of the DataPact storage traits.
//!
//! Backs every store trait with `RwLock<HashMap>` tables. This is the
//! default backend for the control plane: the durable state that matters
//! across restarts (pending change events) lives in the sync layer's
//! checkpoint files, and vote/project state is re-synced from peers.
//! It is also what every test in the workspace runs against.

use std::collections::HashMap;
use std::sync::RwLock;

use pact_store::{
    NodeDirectoryStore, NodeInfo, Project, ProjectInstitution, ProjectNode, ProjectStore,
    StoreError, TeeGrant, VoteStore,
};
use pact_types::{InstitutionId, NodeId, ProjectId, VoteId};

/// All control-plane tables in one struct.
///
/// Each table has its own lock; writers never take two locks at once.
pub struct MemoryStore {
    requests: RwLock<HashMap<VoteId, Vec<u8>>>,
    invites: RwLock<HashMap<(VoteId, NodeId), Vec<u8>>>,
    configs: RwLock<HashMap<VoteId, Vec<u8>>>,
    projects: RwLock<HashMap<ProjectId, Project>>,
    project_nodes: RwLock<HashMap<(ProjectId, NodeId), ProjectNode>>,
    project_insts: RwLock<HashMap<(ProjectId, InstitutionId), ProjectInstitution>>,
    grants: RwLock<HashMap<(ProjectId, String, NodeId), TeeGrant>>,
    nodes: RwLock<HashMap<NodeId, NodeInfo>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
            invites: RwLock::new(HashMap::new()),
            configs: RwLock::new(HashMap::new()),
            projects: RwLock::new(HashMap::new()),
            project_nodes: RwLock::new(HashMap::new()),
            project_insts: RwLock::new(HashMap::new()),
            grants: RwLock::new(HashMap::new()),
            nodes: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VoteStore for MemoryStore {
    fn put_request(&self, vote_id: &VoteId, data: &[u8]) -> Result<(), StoreError> {
        let mut table = self.requests.write().expect("lock poisoned");
        table.insert(vote_id.clone(), data.to_vec());
        Ok(())
    }

    fn get_request(&self, vote_id: &VoteId) -> Result<Vec<u8>, StoreError> {
        let table = self.requests.read().expect("lock poisoned");
        table
            .get(vote_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("vote request {vote_id}")))
    }

    fn iter_requests(&self) -> Result<Vec<Vec<u8>>, StoreError> {
        let table = self.requests.read().expect("lock poisoned");
        Ok(table.values().cloned().collect())
    }

    fn put_invite(&self, vote_id: &VoteId, voter: &NodeId, data: &[u8]) -> Result<(), StoreError> {
        let mut table = self.invites.write().expect("lock poisoned");
        table.insert((vote_id.clone(), voter.clone()), data.to_vec());
        Ok(())
    }

    fn get_invite(&self, vote_id: &VoteId, voter: &NodeId) -> Result<Vec<u8>, StoreError> {
        let table = self.invites.read().expect("lock poisoned");
        table
            .get(&(vote_id.clone(), voter.clone()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("invite {vote_id}/{voter}")))
    }

    fn invites_for_voter(&self, voter: &NodeId) -> Result<Vec<Vec<u8>>, StoreError> {
        let table = self.invites.read().expect("lock poisoned");
        Ok(table
            .iter()
            .filter(|((_, v), _)| v == voter)
            .map(|(_, data)| data.clone())
            .collect())
    }

    fn put_config(&self, vote_id: &VoteId, data: &[u8]) -> Result<(), StoreError> {
        let mut table = self.configs.write().expect("lock poisoned");
        table.insert(vote_id.clone(), data.to_vec());
        Ok(())
    }

    fn get_config(&self, vote_id: &VoteId) -> Result<Vec<u8>, StoreError> {
        let table = self.configs.read().expect("lock poisoned");
        table
            .get(vote_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("vote config {vote_id}")))
    }
}

impl ProjectStore for MemoryStore {
    fn put_project(&self, project: &Project) -> Result<(), StoreError> {
        let mut table = self.projects.write().expect("lock poisoned");
        table.insert(project.id.clone(), project.clone());
        Ok(())
    }

    fn get_project(&self, id: &ProjectId) -> Result<Project, StoreError> {
        let table = self.projects.read().expect("lock poisoned");
        table
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("project {id}")))
    }

    fn project_exists(&self, id: &ProjectId) -> Result<bool, StoreError> {
        let table = self.projects.read().expect("lock poisoned");
        Ok(table.contains_key(id))
    }

    fn iter_projects(&self) -> Result<Vec<Project>, StoreError> {
        let table = self.projects.read().expect("lock poisoned");
        Ok(table.values().cloned().collect())
    }

    fn put_project_node(&self, member: &ProjectNode) -> Result<(), StoreError> {
        let mut table = self.project_nodes.write().expect("lock poisoned");
        table.insert(
            (member.project_id.clone(), member.node_id.clone()),
            member.clone(),
        );
        Ok(())
    }

    fn delete_project_node(&self, member: &ProjectNode) -> Result<(), StoreError> {
        let mut table = self.project_nodes.write().expect("lock poisoned");
        table.remove(&(member.project_id.clone(), member.node_id.clone()));
        Ok(())
    }

    fn project_nodes(&self, id: &ProjectId) -> Result<Vec<ProjectNode>, StoreError> {
        let table = self.project_nodes.read().expect("lock poisoned");
        Ok(table
            .iter()
            .filter(|((pid, _), _)| pid == id)
            .map(|(_, m)| m.clone())
            .collect())
    }

    fn put_project_institution(&self, member: &ProjectInstitution) -> Result<(), StoreError> {
        let mut table = self.project_insts.write().expect("lock poisoned");
        table.insert(
            (member.project_id.clone(), member.institution_id.clone()),
            member.clone(),
        );
        Ok(())
    }

    fn delete_project_institution(&self, member: &ProjectInstitution) -> Result<(), StoreError> {
        let mut table = self.project_insts.write().expect("lock poisoned");
        table.remove(&(member.project_id.clone(), member.institution_id.clone()));
        Ok(())
    }

    fn project_institutions(&self, id: &ProjectId) -> Result<Vec<ProjectInstitution>, StoreError> {
        let table = self.project_insts.read().expect("lock poisoned");
        Ok(table
            .iter()
            .filter(|((pid, _), _)| pid == id)
            .map(|(_, m)| m.clone())
            .collect())
    }

    fn put_grant(&self, grant: &TeeGrant) -> Result<(), StoreError> {
        let mut table = self.grants.write().expect("lock poisoned");
        table.insert(
            (
                grant.project_id.clone(),
                grant.resource_id.clone(),
                grant.requester.clone(),
            ),
            grant.clone(),
        );
        Ok(())
    }

    fn grants_for_project(&self, id: &ProjectId) -> Result<Vec<TeeGrant>, StoreError> {
        let table = self.grants.read().expect("lock poisoned");
        Ok(table
            .iter()
            .filter(|((pid, _, _), _)| pid == id)
            .map(|(_, g)| g.clone())
            .collect())
    }
}

impl NodeDirectoryStore for MemoryStore {
    fn put_node(&self, info: &NodeInfo) -> Result<(), StoreError> {
        let mut table = self.nodes.write().expect("lock poisoned");
        table.insert(info.id.clone(), info.clone());
        Ok(())
    }

    fn get_node(&self, id: &NodeId) -> Result<NodeInfo, StoreError> {
        let table = self.nodes.read().expect("lock poisoned");
        table
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("node {id}")))
    }

    fn node_exists(&self, id: &NodeId) -> Result<bool, StoreError> {
        let table = self.nodes.read().expect("lock poisoned");
        Ok(table.contains_key(id))
    }

    fn iter_nodes(&self) -> Result<Vec<NodeInfo>, StoreError> {
        let table = self.nodes.read().expect("lock poisoned");
        Ok(table.values().cloned().collect())
    }

    fn nodes_for_institution(&self, inst: &InstitutionId) -> Result<Vec<NodeInfo>, StoreError> {
        let table = self.nodes.read().expect("lock poisoned");
        Ok(table
            .values()
            .filter(|n| &n.institution_id == inst)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pact_store::ProjectStatus;
    use pact_types::PublicKey;

    fn node_id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn project(id: &str) -> Project {
        Project {
            id: ProjectId::new(id).unwrap(),
            name: format!("project {id}"),
            description: String::new(),
            status: ProjectStatus::Reviewing,
            owner: InstitutionId::new("inst-a").unwrap(),
        }
    }

    #[test]
    fn request_upsert_replaces_blob() {
        let store = MemoryStore::new();
        let id = VoteId::new("v1");
        store.put_request(&id, b"first").unwrap();
        store.put_request(&id, b"second").unwrap();
        assert_eq!(store.get_request(&id).unwrap(), b"second");
        assert_eq!(store.iter_requests().unwrap().len(), 1);
    }

    #[test]
    fn missing_request_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get_request(&VoteId::new("missing")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn invites_keyed_by_vote_and_voter() {
        let store = MemoryStore::new();
        let v1 = VoteId::new("v1");
        let v2 = VoteId::new("v2");
        store.put_invite(&v1, &node_id("b"), b"inv-1b").unwrap();
        store.put_invite(&v2, &node_id("b"), b"inv-2b").unwrap();
        store.put_invite(&v1, &node_id("c"), b"inv-1c").unwrap();

        assert_eq!(store.get_invite(&v1, &node_id("b")).unwrap(), b"inv-1b");
        assert_eq!(store.invites_for_voter(&node_id("b")).unwrap().len(), 2);
        assert_eq!(store.invites_for_voter(&node_id("c")).unwrap().len(), 1);
    }

    #[test]
    fn project_membership_upsert_is_idempotent() {
        let store = MemoryStore::new();
        let p = project("p1");
        store.put_project(&p).unwrap();

        let member = ProjectNode {
            project_id: p.id.clone(),
            node_id: node_id("alice"),
        };
        store.put_project_node(&member).unwrap();
        store.put_project_node(&member).unwrap();

        assert_eq!(store.project_nodes(&p.id).unwrap().len(), 1);
    }

    #[test]
    fn directory_filters_by_institution() {
        let store = MemoryStore::new();
        for (id, inst) in [("a1", "inst-a"), ("a2", "inst-a"), ("b1", "inst-b")] {
            store
                .put_node(&NodeInfo {
                    id: node_id(id),
                    name: id.to_string(),
                    address: format!("{id}.example:8080"),
                    institution_id: InstitutionId::new(inst).unwrap(),
                    public_key: PublicKey([0u8; 32]),
                })
                .unwrap();
        }

        let inst_a = InstitutionId::new("inst-a").unwrap();
        assert_eq!(store.nodes_for_institution(&inst_a).unwrap().len(), 2);
        assert!(store.node_exists(&node_id("b1")).unwrap());
        assert!(!store.node_exists(&node_id("zz")).unwrap());
    }
}
