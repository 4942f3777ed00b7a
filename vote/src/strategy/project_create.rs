//! Approval strategy for creating a shared project.
//!
//! The initiator persists the project graph in `Reviewing` status when the
//! vote is opened, so every participant sees the pending project while the
//! vote runs. Approval flips it to `Approved`; rejection marks it
//! `Rejected` (the row stays for audit).

use pact_store::{
    NodeDirectoryStore, Project, ProjectInstitution, ProjectNode, ProjectStatus, ProjectStore,
};
use pact_types::{NodeId, SyncAction, SyncDataType, VoteId, VoteType};

use crate::strategy::{distinct, reviewing_vote_exists, VoteContext, VoteStrategy};
use crate::{ProjectCreateConfig, ResolutionAction, SyncRecord, VoteConfig, VoteError};

pub struct ProjectCreateStrategy;

fn config_of(config: &VoteConfig) -> Result<&ProjectCreateConfig, VoteError> {
    match config {
        VoteConfig::ProjectCreate(c) => Ok(c),
        _ => Err(VoteError::Validation(
            "project-create vote requires a project-create config".into(),
        )),
    }
}

/// Build the full membership graph from the config.
fn graph(config: &ProjectCreateConfig) -> (Vec<ProjectNode>, Vec<ProjectInstitution>) {
    let nodes = config
        .parties
        .iter()
        .map(|p| ProjectNode {
            project_id: config.project_id.clone(),
            node_id: p.node_id.clone(),
        })
        .collect();

    let mut institutions: Vec<ProjectInstitution> = Vec::new();
    for party in &config.parties {
        let member = ProjectInstitution {
            project_id: config.project_id.clone(),
            institution_id: party.institution_id.clone(),
        };
        if !institutions.contains(&member) {
            institutions.push(member);
        }
    }
    (nodes, institutions)
}

impl VoteStrategy for ProjectCreateStrategy {
    fn vote_type(&self) -> VoteType {
        VoteType::ProjectCreate
    }

    fn pre_check(&self, ctx: &VoteContext, config: &VoteConfig) -> Result<(), VoteError> {
        let config = config_of(config)?;
        if config.parties.len() < 2 {
            return Err(VoteError::Validation(
                "a shared project needs at least two parties".into(),
            ));
        }
        if !config.parties.iter().any(|p| p.node_id == ctx.node_id) {
            return Err(VoteError::Validation(
                "the initiator must be one of the project parties".into(),
            ));
        }
        for party in &config.parties {
            if !ctx.store.node_exists(&party.node_id)? {
                return Err(VoteError::Validation(format!(
                    "unknown party node {}",
                    party.node_id
                )));
            }
        }
        // The reviewing-vote check comes first: the vote that is already
        // open created the project row in Reviewing status, so the
        // existence check alone would misreport the duplicate.
        if reviewing_vote_exists(ctx, VoteType::ProjectCreate, |c| {
            matches!(c, VoteConfig::ProjectCreate(other) if other.project_id == config.project_id)
        })? {
            return Err(VoteError::Conflict(format!(
                "a create vote for project {} is already reviewing",
                config.project_id
            )));
        }
        if ctx.store.project_exists(&config.project_id)? {
            return Err(VoteError::Validation(format!(
                "project {} already exists",
                config.project_id
            )));
        }
        Ok(())
    }

    fn build_config(
        &self,
        ctx: &VoteContext,
        _vote_id: &VoteId,
        config: &VoteConfig,
    ) -> Result<Vec<SyncRecord>, VoteError> {
        let config = config_of(config)?;
        let owner = ctx.store.get_node(&ctx.node_id)?.institution_id;
        let project = Project {
            id: config.project_id.clone(),
            name: config.name.clone(),
            description: config.description.clone(),
            status: ProjectStatus::Reviewing,
            owner,
        };
        let (nodes, institutions) = graph(config);

        ctx.store.put_project(&project)?;
        let mut records = vec![SyncRecord {
            data_type: SyncDataType::Project,
            action: SyncAction::Create,
            source_id: project.id.to_string(),
            payload: bincode::serialize(&project)
                .map_err(|e| VoteError::Serialization(e.to_string()))?,
        }];
        for member in &nodes {
            ctx.store.put_project_node(member)?;
            records.push(SyncRecord {
                data_type: SyncDataType::ProjectNode,
                action: SyncAction::Create,
                source_id: format!("{}/{}", member.project_id, member.node_id),
                payload: bincode::serialize(member)
                    .map_err(|e| VoteError::Serialization(e.to_string()))?,
            });
        }
        for member in &institutions {
            ctx.store.put_project_institution(member)?;
            records.push(SyncRecord {
                data_type: SyncDataType::ProjectInstitution,
                action: SyncAction::Create,
                source_id: format!("{}/{}", member.project_id, member.institution_id),
                payload: bincode::serialize(member)
                    .map_err(|e| VoteError::Serialization(e.to_string()))?,
            });
        }
        Ok(records)
    }

    fn compute_voters(
        &self,
        _ctx: &VoteContext,
        initiator: &NodeId,
        config: &VoteConfig,
    ) -> Result<Vec<NodeId>, VoteError> {
        let config = config_of(config)?;
        Ok(distinct(
            config
                .parties
                .iter()
                .map(|p| p.node_id.clone())
                .filter(|n| n != initiator)
                .collect(),
        ))
    }

    fn compute_executors(
        &self,
        _ctx: &VoteContext,
        _initiator: &NodeId,
        config: &VoteConfig,
    ) -> Result<Vec<NodeId>, VoteError> {
        let config = config_of(config)?;
        Ok(distinct(
            config.parties.iter().map(|p| p.node_id.clone()).collect(),
        ))
    }

    fn approved_action(
        &self,
        ctx: &VoteContext,
        config: &VoteConfig,
    ) -> Result<ResolutionAction, VoteError> {
        let config = config_of(config)?;
        let owner = ctx.store.get_node(&ctx.node_id)?.institution_id;
        let (nodes, institutions) = graph(config);
        Ok(ResolutionAction::ApproveProject {
            project: Project {
                id: config.project_id.clone(),
                name: config.name.clone(),
                description: config.description.clone(),
                status: ProjectStatus::Approved,
                owner,
            },
            nodes,
            institutions,
        })
    }

    fn rejected_action(
        &self,
        _ctx: &VoteContext,
        config: &VoteConfig,
    ) -> Result<ResolutionAction, VoteError> {
        let config = config_of(config)?;
        Ok(ResolutionAction::RejectProject {
            project_id: config.project_id.clone(),
        })
    }

    fn on_approved(&self, ctx: &VoteContext, action: &ResolutionAction) -> Result<(), VoteError> {
        let ResolutionAction::ApproveProject {
            project,
            nodes,
            institutions,
        } = action
        else {
            return Err(VoteError::ExecutionFailed(
                "project-create resolution carried a foreign action".into(),
            ));
        };

        match ctx.store.get_project(&project.id) {
            Ok(existing) if existing.status == ProjectStatus::Approved => {
                // Re-run after a crash: the mutation already applied.
                return Ok(());
            }
            Ok(existing) if existing.status == ProjectStatus::Rejected => {
                return Err(VoteError::ExecutionFailed(format!(
                    "project {} was rejected locally",
                    project.id
                )));
            }
            _ => {}
        }

        ctx.store.put_project(project)?;
        for member in nodes {
            ctx.store.put_project_node(member)?;
        }
        for member in institutions {
            ctx.store.put_project_institution(member)?;
        }
        tracing::info!(project = %project.id, "project approved and activated");
        Ok(())
    }

    fn on_rejected(&self, ctx: &VoteContext, action: &ResolutionAction) -> Result<(), VoteError> {
        let ResolutionAction::RejectProject { project_id } = action else {
            return Err(VoteError::ExecutionFailed(
                "project-create resolution carried a foreign action".into(),
            ));
        };

        match ctx.store.get_project(project_id) {
            Ok(mut project) if project.status == ProjectStatus::Reviewing => {
                project.status = ProjectStatus::Rejected;
                ctx.store.put_project(&project)?;
                tracing::info!(project = %project_id, "project creation rejected");
                Ok(())
            }
            // Already marked, or the reviewing row never reached this node.
            _ => Ok(()),
        }
    }
}
