//! The DataPact node — composes storage, sync, transport, and votes.

use std::sync::Arc;
use std::time::Duration;

use pact_crypto::{generate_keypair, keypair_from_seed};
use pact_network::{Outbound, PeerChannels, SyncTransport};
use pact_store::{ControlStore, NodeDirectoryStore, NodeInfo};
use pact_store_memory::MemoryStore;
use pact_sync::{ChangeEvent, SyncDispatcher};
use pact_types::{
    ExecuteStatus, InstitutionId, KeyPair, NodeId, PublicKey, Timestamp, VoteAction, VoteId,
};
use pact_vote::{
    default_registry, Propagation, SyncRecord, VoteConfig, VoteContext, VoteEngine, VoteError,
    VoteInvite, VoteRequest,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{FanOutExecutor, NodeConfig, NodeError, NodeMetrics, ShutdownController};

/// One running control-plane node.
pub struct PactNode {
    config: NodeConfig,
    node_id: NodeId,
    store: Arc<MemoryStore>,
    dispatcher: Arc<SyncDispatcher>,
    transport: Arc<SyncTransport>,
    engine: VoteEngine,
    fanout: FanOutExecutor,
    metrics: Arc<NodeMetrics>,
    shutdown: ShutdownController,
    /// Consumed by [`start`](Self::start) when the drain loop spawns.
    notify_rx: Option<mpsc::UnboundedReceiver<NodeId>>,
    task_handles: Vec<JoinHandle<()>>,
}

impl PactNode {
    /// Build a node from its configuration: identity, directory seeding,
    /// queue recovery, transport, and the vote engine.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let node_id = NodeId::new(config.node_id.clone())
            .map_err(|e| NodeError::Config(e.to_string()))?;
        let institution_id = InstitutionId::new(config.institution_id.clone())
            .map_err(|e| NodeError::Config(e.to_string()))?;
        let vote_counter = NodeId::new(config.vote_counter.clone())
            .map_err(|e| NodeError::Config(e.to_string()))?;

        let keypair = load_identity(&config)?;

        let store = Arc::new(MemoryStore::new());
        store.put_node(&NodeInfo {
            id: node_id.clone(),
            name: if config.name.is_empty() {
                config.node_id.clone()
            } else {
                config.name.clone()
            },
            address: config.address.clone(),
            institution_id,
            public_key: keypair.public.clone(),
        })?;
        for peer in &config.peers {
            store.put_node(&peer_info(peer)?)?;
        }

        let (dispatcher, notify_rx) = SyncDispatcher::new(&config.sync_dir())?;
        let dispatcher = Arc::new(dispatcher);
        let transport = Arc::new(SyncTransport::new(
            Arc::clone(&dispatcher),
            Arc::new(PeerChannels::new()),
        ));

        let engine = VoteEngine::new(default_registry(), vote_counter, keypair);
        let fanout = FanOutExecutor::new(config.fanout_concurrency);

        Ok(Self {
            node_id,
            store,
            dispatcher,
            transport,
            engine,
            fanout,
            metrics: Arc::new(NodeMetrics::new()),
            shutdown: ShutdownController::new(),
            notify_rx: Some(notify_rx),
            task_handles: Vec::new(),
            config,
        })
    }

    /// Spawn the background tasks: queue drain and keepalive ping.
    pub fn start(&mut self) {
        let notify_rx = self
            .notify_rx
            .take()
            .expect("start() called twice on the same node");

        self.task_handles
            .push(self.transport.spawn_drain_loop(notify_rx, self.shutdown.subscribe()));
        self.task_handles.push(self.transport.spawn_ping_loop(
            Duration::from_secs(self.config.ping_interval_secs),
            self.shutdown.subscribe(),
        ));

        tracing::info!(
            node = %self.node_id,
            peers = self.config.peers.len(),
            "node started"
        );
    }

    /// Signal every background task to stop and wait for them.
    pub async fn stop(&mut self) {
        self.shutdown.shutdown();
        for handle in self.task_handles.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
        tracing::info!(node = %self.node_id, "node stopped");
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.metrics
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    /// The call context for operations this node performs as itself.
    pub fn ctx(&self) -> VoteContext {
        let store: Arc<dyn ControlStore> = self.store.clone();
        VoteContext::new(self.node_id.clone(), store)
    }

    // ── Approvals ──────────────────────────────────────────────────────

    /// Open an approval. `initiator` must be this node.
    pub async fn create_approval(
        &self,
        initiator: &NodeId,
        config: VoteConfig,
    ) -> Result<VoteId, NodeError> {
        if initiator != &self.node_id {
            return Err(VoteError::Authorization(format!(
                "this node is {}, not {initiator}",
                self.node_id
            ))
            .into());
        }
        let (vote_id, propagation) =
            self.engine
                .create_approval(&self.ctx(), config, Timestamp::now())?;
        self.metrics.votes_created.inc();
        self.propagate(propagation).await;
        Ok(vote_id)
    }

    /// Record this node's reply to an invite and run the resolution
    /// callback if the reply settles the vote.
    pub async fn reply(
        &self,
        voter: &NodeId,
        vote_id: &VoteId,
        action: VoteAction,
        reason: Option<String>,
    ) -> Result<VoteRequest, NodeError> {
        let (request, propagation) =
            self.engine
                .reply(&self.ctx(), vote_id, voter, action, reason)?;
        self.metrics.replies_recorded.inc();

        if request.status.is_resolved() {
            self.metrics.votes_resolved.inc();
            let status = self.engine.try_execute(&self.ctx(), vote_id)?;
            tracing::debug!(vote = %vote_id, execute = ?status, "resolution executed after reply");
        }

        self.propagate(propagation).await;
        Ok(request)
    }

    /// Load one vote request (status queries).
    pub fn vote_status(&self, vote_id: &VoteId) -> Result<VoteRequest, NodeError> {
        Ok(self.engine.request(&self.ctx(), vote_id)?)
    }

    /// Invites still awaiting this node's reply.
    pub fn pending_invites(&self) -> Result<Vec<VoteInvite>, NodeError> {
        Ok(self.engine.pending_invites(&self.ctx())?)
    }

    // ── Change sync ────────────────────────────────────────────────────

    /// Apply a batch of change entries pushed by `from`.
    ///
    /// All-or-nothing: the first failing entry aborts the batch with an
    /// error so the sender keeps everything queued and redelivers — safe,
    /// because application is idempotent.
    pub fn apply_sync(&self, from: &NodeId, entries: &[SyncRecord]) -> Result<usize, NodeError> {
        let ctx = self.ctx();
        for entry in entries {
            self.engine.apply_remote(
                &ctx,
                entry.data_type,
                entry.action,
                &entry.source_id,
                &entry.payload,
            )?;
            self.metrics.sync_applied.inc();
        }
        tracing::debug!(peer = %from, entries = entries.len(), "applied sync batch");
        Ok(entries.len())
    }

    /// Commit entries a peer has confirmed applying.
    pub fn ack_sync(&self, from: &NodeId, entries: &[SyncRecord]) -> Result<(), NodeError> {
        let events: Vec<ChangeEvent> = entries
            .iter()
            .map(|entry| ChangeEvent {
                data_type: entry.data_type,
                action: entry.action,
                source_id: entry.source_id.clone(),
                payload: entry.payload.clone(),
                destination: from.clone(),
            })
            .collect();
        self.dispatcher.commit(from, &events)?;
        self.metrics.events_committed.inc_by(events.len() as u64);
        self.refresh_pending_gauge();
        Ok(())
    }

    /// Register a peer's sync subscription, flushing its backlog.
    pub async fn subscribe(&self, peer: &NodeId) -> Result<mpsc::Receiver<Outbound>, NodeError> {
        if !self.store.node_exists(peer)? {
            return Err(VoteError::Authorization(format!("unknown peer {peer}")).into());
        }
        let rx = self.transport.subscribe(peer.clone()).await;
        self.metrics
            .connected_peers
            .set(self.transport.channels().connected().await.len() as i64);
        Ok(rx)
    }

    /// Pending-queue depths for every known destination.
    pub fn queue_depths(&self) -> Vec<(NodeId, usize)> {
        self.dispatcher.queue_depths()
    }

    /// Pending events for one destination, in delivery order.
    pub fn queue_pending(&self, peer: &NodeId) -> Vec<ChangeEvent> {
        self.dispatcher.pending(peer)
    }

    /// Whether this node has executed a given resolved vote.
    pub fn execute_status(&self, vote_id: &VoteId) -> Result<ExecuteStatus, NodeError> {
        Ok(self.vote_status(vote_id)?.execute_status)
    }

    /// Queue a propagation's records for every destination, then nudge all
    /// destinations in parallel with a hard per-node timeout so one stuck
    /// peer channel cannot stall the operation.
    async fn propagate(&self, propagation: Propagation) {
        if propagation.is_empty() {
            return;
        }

        for destination in &propagation.destinations {
            for record in &propagation.records {
                let event = ChangeEvent {
                    data_type: record.data_type,
                    action: record.action,
                    source_id: record.source_id.clone(),
                    payload: record.payload.clone(),
                    destination: destination.clone(),
                };
                match self.dispatcher.dispatch(event) {
                    Ok(true) => self.metrics.events_queued.inc(),
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(peer = %destination, error = %e, "failed to enqueue change event");
                    }
                }
            }
        }
        self.refresh_pending_gauge();

        let transport = Arc::clone(&self.transport);
        let report = self
            .fanout
            .run(
                propagation.destinations,
                Duration::from_secs(self.config.fanout_timeout_secs),
                move |peer| {
                    let transport = Arc::clone(&transport);
                    async move {
                        transport.flush(&peer).await;
                        Ok(())
                    }
                },
            )
            .await;
        if !report.all_succeeded() {
            // Not fatal: events stay durably queued for the failed peers.
            tracing::warn!(
                failed = report.failures.len(),
                "some peers could not be flushed; their events stay queued"
            );
        }
    }

    fn refresh_pending_gauge(&self) {
        let total: usize = self.dispatcher.queue_depths().iter().map(|(_, n)| n).sum();
        self.metrics.pending_events.set(total as i64);
    }
}

/// Load or generate this node's signing identity.
fn load_identity(config: &NodeConfig) -> Result<KeyPair, NodeError> {
    match &config.identity_seed {
        Some(seed_hex) => {
            let bytes = hex::decode(seed_hex)
                .map_err(|e| NodeError::Identity(format!("identity seed is not hex: {e}")))?;
            let seed: [u8; 32] = bytes
                .try_into()
                .map_err(|_| NodeError::Identity("identity seed must be 32 bytes".into()))?;
            Ok(keypair_from_seed(&seed))
        }
        None => {
            tracing::warn!("no identity seed configured, generating an ephemeral key");
            Ok(generate_keypair())
        }
    }
}

/// Directory entry for a statically configured peer.
fn peer_info(peer: &crate::config::PeerConfig) -> Result<NodeInfo, NodeError> {
    let id = NodeId::new(peer.node_id.clone()).map_err(|e| NodeError::Config(e.to_string()))?;
    let institution_id = InstitutionId::new(peer.institution_id.clone())
        .map_err(|e| NodeError::Config(e.to_string()))?;
    let key_bytes = hex::decode(&peer.public_key)
        .map_err(|e| NodeError::Config(format!("peer {id} public key is not hex: {e}")))?;
    let public_key: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| NodeError::Config(format!("peer {id} public key must be 32 bytes")))?;
    Ok(NodeInfo {
        id: id.clone(),
        name: if peer.name.is_empty() {
            peer.node_id.clone()
        } else {
            peer.name.clone()
        },
        address: peer.address.clone(),
        institution_id,
        public_key: PublicKey(public_key),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeerConfig;
    use pact_vote::{ProjectCreateConfig, ProjectParty};
    use pact_types::{ProjectId, SyncDataType, VoteStatus};
    use tempfile::TempDir;

    fn peer_entry(id: &str, inst: &str, seed: u8) -> PeerConfig {
        PeerConfig {
            node_id: id.into(),
            name: String::new(),
            address: format!("{id}.example:7410"),
            institution_id: inst.into(),
            public_key: hex::encode(keypair_from_seed(&[seed; 32]).public.0),
        }
    }

    fn node_config(id: &str, inst: &str, seed: u8, dir: &TempDir, peers: Vec<PeerConfig>) -> NodeConfig {
        NodeConfig {
            node_id: id.into(),
            institution_id: inst.into(),
            vote_counter: "alpha".into(),
            data_dir: dir.path().to_path_buf(),
            identity_seed: Some(hex::encode([seed; 32])),
            peers,
            ..Default::default()
        }
    }

    /// Two fully wired nodes that know each other, with isolated data dirs.
    fn two_nodes() -> (PactNode, PactNode, TempDir, TempDir) {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();

        let config_a = node_config("alpha", "inst-a", 1, &dir_a, vec![peer_entry("bravo", "inst-b", 2)]);
        let config_b = node_config("bravo", "inst-b", 2, &dir_b, vec![peer_entry("alpha", "inst-a", 1)]);

        (
            PactNode::new(config_a).unwrap(),
            PactNode::new(config_b).unwrap(),
            dir_a,
            dir_b,
        )
    }

    fn project_config() -> VoteConfig {
        VoteConfig::ProjectCreate(ProjectCreateConfig {
            project_id: ProjectId::new("joint-study").unwrap(),
            name: "joint study".into(),
            description: String::new(),
            parties: vec![
                ProjectParty {
                    node_id: NodeId::new("alpha").unwrap(),
                    institution_id: InstitutionId::new("inst-a").unwrap(),
                },
                ProjectParty {
                    node_id: NodeId::new("bravo").unwrap(),
                    institution_id: InstitutionId::new("inst-b").unwrap(),
                },
            ],
        })
    }

    /// Move every event queued on `from` for `to` across, applying and
    /// acking like the sync channel would.
    fn ship(from: &PactNode, to: &PactNode) {
        let pending = from.queue_pending(to.node_id());
        if pending.is_empty() {
            return;
        }
        let records: Vec<SyncRecord> = pending
            .iter()
            .map(|e| SyncRecord {
                data_type: e.data_type,
                action: e.action,
                source_id: e.source_id.clone(),
                payload: e.payload.clone(),
            })
            .collect();
        to.apply_sync(from.node_id(), &records).unwrap();
        from.ack_sync(to.node_id(), &records).unwrap();
    }

    #[tokio::test]
    async fn approval_crosses_nodes_and_resolves() {
        let (alpha, bravo, _da, _db) = two_nodes();
        let alpha_id = alpha.node_id().clone();
        let bravo_id = bravo.node_id().clone();

        let vote_id = alpha
            .create_approval(&alpha_id, project_config())
            .await
            .unwrap();
        let pending = alpha.queue_pending(&bravo_id);
        assert!(pending.iter().any(|e| e.data_type == SyncDataType::VoteRequest));
        assert!(pending.iter().any(|e| e.data_type == SyncDataType::VoteInvite));
        assert!(pending.iter().any(|e| e.data_type == SyncDataType::VoteConfig));

        ship(&alpha, &bravo);
        assert!(alpha.queue_pending(&bravo_id).is_empty());
        assert_eq!(bravo.pending_invites().unwrap().len(), 1);

        let request = bravo
            .reply(&bravo_id, &vote_id, VoteAction::Approved, None)
            .await
            .unwrap();
        assert_eq!(request.status, VoteStatus::Approved);
        assert_eq!(
            bravo.execute_status(&vote_id).unwrap(),
            ExecuteStatus::Success
        );

        ship(&bravo, &alpha);
        assert_eq!(
            alpha.execute_status(&vote_id).unwrap(),
            ExecuteStatus::Success
        );
        assert_eq!(alpha.vote_status(&vote_id).unwrap().status, VoteStatus::Approved);
    }

    #[tokio::test]
    async fn create_for_foreign_initiator_is_rejected() {
        let (alpha, _bravo, _da, _db) = two_nodes();
        let bravo_id = NodeId::new("bravo").unwrap();
        let err = alpha
            .create_approval(&bravo_id, project_config())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Vote(VoteError::Authorization(_))));
    }

    #[tokio::test]
    async fn subscription_flushes_queued_events() {
        let (alpha, _bravo, _da, _db) = two_nodes();
        let alpha_id = alpha.node_id().clone();
        let bravo_id = NodeId::new("bravo").unwrap();

        alpha
            .create_approval(&alpha_id, project_config())
            .await
            .unwrap();

        let mut rx = alpha.subscribe(&bravo_id).await.unwrap();
        match rx.recv().await.unwrap() {
            Outbound::Events(events) => {
                assert!(events.iter().any(|e| e.data_type == SyncDataType::VoteRequest));
            }
            other => panic!("expected events, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_peer_cannot_subscribe() {
        let (alpha, _bravo, _da, _db) = two_nodes();
        let stranger = NodeId::new("mallory").unwrap();
        assert!(alpha.subscribe(&stranger).await.is_err());
    }

    #[tokio::test]
    async fn queued_events_survive_node_restart() {
        let dir = TempDir::new().unwrap();
        let config = node_config("alpha", "inst-a", 1, &dir, vec![peer_entry("bravo", "inst-b", 2)]);
        let alpha_id = NodeId::new("alpha").unwrap();
        let bravo_id = NodeId::new("bravo").unwrap();

        let pending_before = {
            let alpha = PactNode::new(config.clone()).unwrap();
            alpha
                .create_approval(&alpha_id, project_config())
                .await
                .unwrap();
            let pending = alpha.queue_pending(&bravo_id).len();
            assert!(pending > 0);
            pending
            // Node dropped without bravo ever acking.
        };

        // A fresh node over the same data dir recovers the queue.
        let alpha = PactNode::new(config).unwrap();
        assert_eq!(alpha.queue_pending(&bravo_id).len(), pending_before);
    }
}
