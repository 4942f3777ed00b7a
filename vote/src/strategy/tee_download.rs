//! Approval strategy for exporting a resource out of a TEE.
//!
//! Every project participant must approve; once approved, each participant
//! records the grant for audit. Driving the actual export in the compute
//! engine happens downstream of the recorded grant.

use pact_store::{ProjectStatus, ProjectStore, TeeGrant};
use pact_types::{NodeId, VoteId, VoteType};

use crate::strategy::{distinct, VoteContext, VoteStrategy};
use crate::{ResolutionAction, SyncRecord, TeeDownloadConfig, VoteConfig, VoteError};

pub struct TeeDownloadStrategy;

fn config_of(config: &VoteConfig) -> Result<&TeeDownloadConfig, VoteError> {
    match config {
        VoteConfig::TeeDownload(c) => Ok(c),
        _ => Err(VoteError::Validation(
            "tee-download vote requires a tee-download config".into(),
        )),
    }
}

impl VoteStrategy for TeeDownloadStrategy {
    fn vote_type(&self) -> VoteType {
        VoteType::TeeDownload
    }

    fn pre_check(&self, ctx: &VoteContext, config: &VoteConfig) -> Result<(), VoteError> {
        let config = config_of(config)?;
        if config.resource_id.is_empty() {
            return Err(VoteError::Validation("resource id missing".into()));
        }
        if config.requester_node_id != ctx.node_id {
            return Err(VoteError::Authorization(format!(
                "only the requester may open a tee-download vote, not {}",
                ctx.node_id
            )));
        }
        let project = ctx
            .store
            .get_project(&config.project_id)
            .map_err(|_| VoteError::Validation(format!("unknown project {}", config.project_id)))?;
        if project.status != ProjectStatus::Approved {
            return Err(VoteError::Validation(format!(
                "project {} is not active",
                config.project_id
            )));
        }
        let members = ctx.store.project_nodes(&config.project_id)?;
        if !members.iter().any(|m| m.node_id == config.requester_node_id) {
            return Err(VoteError::Authorization(format!(
                "requester {} is not a member of project {}",
                config.requester_node_id, config.project_id
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
        Ok(ResolutionAction::GrantTeeDownload {
            grant: TeeGrant {
                project_id: config.project_id.clone(),
                resource_id: config.resource_id.clone(),
                requester: config.requester_node_id.clone(),
            },
        })
    }

    fn rejected_action(
        &self,
        _ctx: &VoteContext,
        _config: &VoteConfig,
    ) -> Result<ResolutionAction, VoteError> {
        Ok(ResolutionAction::NoOp)
    }

    fn on_approved(&self, ctx: &VoteContext, action: &ResolutionAction) -> Result<(), VoteError> {
        let ResolutionAction::GrantTeeDownload { grant } = action else {
            return Err(VoteError::ExecutionFailed(
                "tee-download resolution carried a foreign action".into(),
            ));
        };

        // Precondition: the project must still be active.
        let project = ctx.store.get_project(&grant.project_id).map_err(|_| {
            VoteError::ExecutionFailed(format!("project {} no longer present", grant.project_id))
        })?;
        if project.status != ProjectStatus::Approved {
            return Err(VoteError::ExecutionFailed(format!(
                "project {} is no longer active",
                grant.project_id
            )));
        }

        ctx.store.put_grant(grant)?;
        tracing::info!(
            project = %grant.project_id,
            resource = %grant.resource_id,
            requester = %grant.requester,
            "tee export granted"
        );
        Ok(())
    }

    fn on_rejected(&self, _ctx: &VoteContext, _action: &ResolutionAction) -> Result<(), VoteError> {
        Ok(())
    }
}
