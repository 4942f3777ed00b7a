//! Approval strategy for archiving a shared project.

use pact_store::{ProjectStatus, ProjectStore};
use pact_types::{NodeId, VoteId, VoteType};

use crate::strategy::{distinct, reviewing_vote_exists, VoteContext, VoteStrategy};
use crate::{ProjectArchiveConfig, ResolutionAction, SyncRecord, VoteConfig, VoteError};

pub struct ProjectArchiveStrategy;

fn config_of(config: &VoteConfig) -> Result<&ProjectArchiveConfig, VoteError> {
    match config {
        VoteConfig::ProjectArchive(c) => Ok(c),
        _ => Err(VoteError::Validation(
            "project-archive vote requires a project-archive config".into(),
        )),
    }
}

impl VoteStrategy for ProjectArchiveStrategy {
    fn vote_type(&self) -> VoteType {
        VoteType::ProjectArchive
    }

    fn pre_check(&self, ctx: &VoteContext, config: &VoteConfig) -> Result<(), VoteError> {
        let config = config_of(config)?;
        let project = ctx
            .store
            .get_project(&config.project_id)
            .map_err(|_| VoteError::Validation(format!("unknown project {}", config.project_id)))?;
        if project.status != ProjectStatus::Approved {
            return Err(VoteError::Validation(format!(
                "project {} is not active (status {:?})",
                config.project_id, project.status
            )));
        }
        let members = ctx.store.project_nodes(&config.project_id)?;
        if !members.iter().any(|m| m.node_id == ctx.node_id) {
            return Err(VoteError::Authorization(format!(
                "node {} is not a member of project {}",
                ctx.node_id, config.project_id
            )));
        }
        if reviewing_vote_exists(ctx, VoteType::ProjectArchive, |c| {
            matches!(c, VoteConfig::ProjectArchive(other) if other.project_id == config.project_id)
        })? {
            return Err(VoteError::Conflict(format!(
                "an archive vote for project {} is already reviewing",
                config.project_id
            )));
        }
        Ok(())
    }

    fn build_config(
        &self,
        _ctx: &VoteContext,
        _vote_id: &VoteId,
        _config: &VoteConfig,
    ) -> Result<Vec<SyncRecord>, VoteError> {
        // The archive vote carries no aggregates beyond its config.
        Ok(Vec::new())
    }

    fn compute_voters(
        &self,
        ctx: &VoteContext,
        initiator: &NodeId,
        config: &VoteConfig,
    ) -> Result<Vec<NodeId>, VoteError> {
        let config = config_of(config)?;
        let members = ctx.store.project_nodes(&config.project_id)?;
        Ok(distinct(
            members
                .into_iter()
                .map(|m| m.node_id)
                .filter(|n| n != initiator)
                .collect(),
        ))
    }

    fn compute_executors(
        &self,
        ctx: &VoteContext,
        _initiator: &NodeId,
        config: &VoteConfig,
    ) -> Result<Vec<NodeId>, VoteError> {
        let config = config_of(config)?;
        let members = ctx.store.project_nodes(&config.project_id)?;
        Ok(distinct(members.into_iter().map(|m| m.node_id).collect()))
    }

    fn approved_action(
        &self,
        _ctx: &VoteContext,
        config: &VoteConfig,
    ) -> Result<ResolutionAction, VoteError> {
        let config = config_of(config)?;
        Ok(ResolutionAction::ArchiveProject {
            project_id: config.project_id.clone(),
        })
    }

    fn rejected_action(
        &self,
        _ctx: &VoteContext,
        _config: &VoteConfig,
    ) -> Result<ResolutionAction, VoteError> {
        // Rejecting an archive leaves the project untouched.
        Ok(ResolutionAction::NoOp)
    }

    fn on_approved(&self, ctx: &VoteContext, action: &ResolutionAction) -> Result<(), VoteError> {
        let ResolutionAction::ArchiveProject { project_id } = action else {
            return Err(VoteError::ExecutionFailed(
                "project-archive resolution carried a foreign action".into(),
            ));
        };

        let mut project = ctx.store.get_project(project_id).map_err(|_| {
            VoteError::ExecutionFailed(format!("project {project_id} no longer present"))
        })?;
        match project.status {
            ProjectStatus::Archived => Ok(()), // already applied
            ProjectStatus::Approved => {
                project.status = ProjectStatus::Archived;
                ctx.store.put_project(&project)?;
                tracing::info!(project = %project_id, "project archived");
                Ok(())
            }
            other => Err(VoteError::ExecutionFailed(format!(
                "project {project_id} is {other:?}, cannot archive"
            ))),
        }
    }

    fn on_rejected(&self, _ctx: &VoteContext, _action: &ResolutionAction) -> Result<(), VoteError> {
        Ok(())
    }
}
