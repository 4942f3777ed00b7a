//! Per-vote-type strategy dispatch.
//!
//! Each vote type implements the same fixed capability set; the engine
//! looks strategies up in a [`StrategyRegistry`] keyed by [`VoteType`].

use std::collections::HashMap;
use std::sync::Arc;

use pact_store::{ControlStore, VoteStore};
use pact_types::{NodeId, VoteId, VoteType};

use crate::{ResolutionAction, SyncRecord, VoteConfig, VoteError, VoteRequest};

mod node_route;
mod project_archive;
mod project_create;
mod tee_download;

pub use node_route::NodeRouteStrategy;
pub use project_archive::ProjectArchiveStrategy;
pub use project_create::ProjectCreateStrategy;
pub use tee_download::TeeDownloadStrategy;

/// Explicit call context: the principal node the call runs as, plus the
/// store it operates on. Passed as a parameter through the whole chain —
/// there is no ambient "current user" state anywhere.
#[derive(Clone)]
pub struct VoteContext {
    pub node_id: NodeId,
    pub store: Arc<dyn ControlStore>,
}

impl VoteContext {
    pub fn new(node_id: NodeId, store: Arc<dyn ControlStore>) -> Self {
        Self { node_id, store }
    }
}

/// The capability set every vote type implements.
pub trait VoteStrategy: Send + Sync {
    fn vote_type(&self) -> VoteType;

    /// Type-specific invariant validation, run before anything is
    /// persisted. A failure here leaves no partial state behind.
    fn pre_check(&self, ctx: &VoteContext, config: &VoteConfig) -> Result<(), VoteError>;

    /// Persist any aggregates the vote carries beyond its config (e.g. the
    /// reviewing project graph), returning sync records for them.
    fn build_config(
        &self,
        ctx: &VoteContext,
        vote_id: &VoteId,
        config: &VoteConfig,
    ) -> Result<Vec<SyncRecord>, VoteError>;

    /// The nodes asked to approve. Must not contain the initiator.
    fn compute_voters(
        &self,
        ctx: &VoteContext,
        initiator: &NodeId,
        config: &VoteConfig,
    ) -> Result<Vec<NodeId>, VoteError>;

    /// The nodes that run the resolution callback.
    fn compute_executors(
        &self,
        ctx: &VoteContext,
        initiator: &NodeId,
        config: &VoteConfig,
    ) -> Result<Vec<NodeId>, VoteError>;

    /// The callback payload to replay if the vote is approved, built now
    /// from current data and sealed into the signed request body.
    fn approved_action(
        &self,
        ctx: &VoteContext,
        config: &VoteConfig,
    ) -> Result<ResolutionAction, VoteError>;

    /// The callback payload to replay if the vote is rejected.
    fn rejected_action(
        &self,
        ctx: &VoteContext,
        config: &VoteConfig,
    ) -> Result<ResolutionAction, VoteError>;

    /// How many distinct voter approvals resolve the vote. Defaults to
    /// unanimity; no shipped type overrides it.
    fn approved_threshold(&self, voters: &[NodeId]) -> u32 {
        voters.len() as u32
    }

    /// Run the approved callback on an executor node. Must be idempotent:
    /// implementations check their precondition before mutating and write
    /// through upserts, so re-running after a crash is a no-op.
    fn on_approved(&self, ctx: &VoteContext, action: &ResolutionAction) -> Result<(), VoteError>;

    /// Run the rejected callback on an executor node. Same idempotency
    /// contract as [`on_approved`](Self::on_approved).
    fn on_rejected(&self, ctx: &VoteContext, action: &ResolutionAction) -> Result<(), VoteError>;
}

/// Registry mapping each vote type to its strategy.
pub struct StrategyRegistry {
    strategies: HashMap<VoteType, Arc<dyn VoteStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    pub fn register(&mut self, strategy: Arc<dyn VoteStrategy>) {
        self.strategies.insert(strategy.vote_type(), strategy);
    }

    pub fn get(&self, vote_type: VoteType) -> Result<Arc<dyn VoteStrategy>, VoteError> {
        self.strategies
            .get(&vote_type)
            .cloned()
            .ok_or_else(|| VoteError::UnknownType(vote_type.as_str().to_string()))
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with every shipped vote type registered.
pub fn default_registry() -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();
    registry.register(Arc::new(ProjectCreateStrategy));
    registry.register(Arc::new(ProjectArchiveStrategy));
    registry.register(Arc::new(NodeRouteStrategy));
    registry.register(Arc::new(TeeDownloadStrategy));
    registry
}

/// Whether an unresolved vote of `vote_type` whose config satisfies
/// `matches` already exists. Used by pre-checks to refuse duplicate votes
/// for the same logical resource.
pub(crate) fn reviewing_vote_exists(
    ctx: &VoteContext,
    vote_type: VoteType,
    matches: impl Fn(&VoteConfig) -> bool,
) -> Result<bool, VoteError> {
    for blob in ctx.store.iter_requests()? {
        let request = VoteRequest::from_bytes(&blob)?;
        if request.vote_type != vote_type || request.status.is_resolved() {
            continue;
        }
        let config_blob = match ctx.store.get_config(&request.vote_id) {
            Ok(blob) => blob,
            // A request without its config is half-synced; it cannot match.
            Err(_) => continue,
        };
        if matches(&VoteConfig::from_bytes(&config_blob)?) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Deduplicate a node list, preserving first-seen order.
pub(crate) fn distinct(nodes: Vec<NodeId>) -> Vec<NodeId> {
    let mut seen = Vec::with_capacity(nodes.len());
    for node in nodes {
        if !seen.contains(&node) {
            seen.push(node);
        }
    }
    seen
}
