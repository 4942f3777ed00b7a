//! Approval strategy for establishing a route between two nodes.
//!
//! "Establishing a route" means each endpoint admits the other into its
//! node directory with the address agreed in the config. The requesting
//! side initiates; the counterpart is the sole voter.

use pact_store::{NodeDirectoryStore, NodeInfo};
use pact_types::{NodeId, VoteId, VoteType};

use crate::strategy::{VoteContext, VoteStrategy};
use crate::{NodeRouteConfig, ResolutionAction, SyncRecord, VoteConfig, VoteError};

pub struct NodeRouteStrategy;

fn config_of(config: &VoteConfig) -> Result<&NodeRouteConfig, VoteError> {
    match config {
        VoteConfig::NodeRoute(c) => Ok(c),
        _ => Err(VoteError::Validation(
            "node-route vote requires a node-route config".into(),
        )),
    }
}

/// The directory entry for one endpoint, with the address the config
/// agreed on (which may differ from the previously known one).
fn endpoint(ctx: &VoteContext, node_id: &NodeId, address: &str) -> Result<NodeInfo, VoteError> {
    let mut info = ctx
        .store
        .get_node(node_id)
        .map_err(|_| VoteError::Validation(format!("unknown route endpoint {node_id}")))?;
    info.address = address.to_string();
    Ok(info)
}

impl VoteStrategy for NodeRouteStrategy {
    fn vote_type(&self) -> VoteType {
        VoteType::NodeRoute
    }

    fn pre_check(&self, ctx: &VoteContext, config: &VoteConfig) -> Result<(), VoteError> {
        let config = config_of(config)?;
        if config.src_node_id == config.dst_node_id {
            return Err(VoteError::Validation(
                "a route needs two distinct endpoints".into(),
            ));
        }
        if config.src_address.is_empty() || config.dst_address.is_empty() {
            return Err(VoteError::Validation("route endpoint address missing".into()));
        }
        if ctx.node_id != config.src_node_id {
            return Err(VoteError::Authorization(format!(
                "route requests originate from their source node, not {}",
                ctx.node_id
            )));
        }
        // Both endpoints must already be known to the directory; routing is
        // about trust, not discovery.
        for endpoint in [&config.src_node_id, &config.dst_node_id] {
            if !ctx.store.node_exists(endpoint)? {
                return Err(VoteError::Validation(format!(
                    "unknown route endpoint {endpoint}"
                )));
            }
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
        _ctx: &VoteContext,
        initiator: &NodeId,
        config: &VoteConfig,
    ) -> Result<Vec<NodeId>, VoteError> {
        let config = config_of(config)?;
        // The counterpart endpoint is the sole voter.
        Ok([config.src_node_id.clone(), config.dst_node_id.clone()]
            .into_iter()
            .filter(|n| n != initiator)
            .collect())
    }

    fn compute_executors(
        &self,
        _ctx: &VoteContext,
        _initiator: &NodeId,
        config: &VoteConfig,
    ) -> Result<Vec<NodeId>, VoteError> {
        let config = config_of(config)?;
        Ok(vec![config.src_node_id.clone(), config.dst_node_id.clone()])
    }

    fn approved_action(
        &self,
        ctx: &VoteContext,
        config: &VoteConfig,
    ) -> Result<ResolutionAction, VoteError> {
        let config = config_of(config)?;
        Ok(ResolutionAction::EstablishRoute {
            src: endpoint(ctx, &config.src_node_id, &config.src_address)?,
            dst: endpoint(ctx, &config.dst_node_id, &config.dst_address)?,
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
        let ResolutionAction::EstablishRoute { src, dst } = action else {
            return Err(VoteError::ExecutionFailed(
                "node-route resolution carried a foreign action".into(),
            ));
        };

        // Each endpoint records the counterpart; an upsert, so re-running
        // after a crash changes nothing.
        if ctx.node_id == src.id {
            ctx.store.put_node(dst)?;
            tracing::info!(src = %src.id, dst = %dst.id, "route established (forward)");
        } else if ctx.node_id == dst.id {
            ctx.store.put_node(src)?;
            tracing::info!(src = %src.id, dst = %dst.id, "route established (reverse)");
        }
        Ok(())
    }

    fn on_rejected(&self, _ctx: &VoteContext, _action: &ResolutionAction) -> Result<(), VoteError> {
        Ok(())
    }
}
