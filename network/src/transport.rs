//! Drives queued change events onto open peer channels.

use std::sync::Arc;
use std::time::Duration;

use pact_sync::SyncDispatcher;
use pact_types::NodeId;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::{Outbound, PeerChannels};

/// The delivery side of the change-sync channel.
///
/// Owns no queue state of its own: the durable queues stay authoritative in
/// the dispatcher, and the transport only copies pending events onto open
/// channels. Commit happens elsewhere, when the peer's apply-ack arrives.
pub struct SyncTransport {
    dispatcher: Arc<SyncDispatcher>,
    channels: Arc<PeerChannels>,
}

impl SyncTransport {
    pub fn new(dispatcher: Arc<SyncDispatcher>, channels: Arc<PeerChannels>) -> Self {
        Self {
            dispatcher,
            channels,
        }
    }

    pub fn channels(&self) -> &Arc<PeerChannels> {
        &self.channels
    }

    /// Register a (re)connecting peer and immediately flush everything
    /// queued for it. Returns the receiving end the stream handler drains.
    pub async fn subscribe(&self, node_id: NodeId) -> mpsc::Receiver<Outbound> {
        let rx = self.channels.subscribe(node_id.clone()).await;
        self.flush(&node_id).await;
        rx
    }

    /// Copy the peer's pending events onto its channel, if one is open.
    /// Queued events are untouched either way.
    pub async fn flush(&self, node_id: &NodeId) {
        let pending = self.dispatcher.pending(node_id);
        if pending.is_empty() {
            return;
        }
        let count = pending.len();
        match self.channels.send(node_id, Outbound::Events(pending)).await {
            Ok(()) => {
                tracing::debug!(peer = %node_id, events = count, "flushed pending events to peer");
            }
            Err(e) => {
                tracing::trace!(peer = %node_id, events = count, reason = %e, "events stay queued");
            }
        }
    }

    /// Background task: drain new-work signals from the dispatcher and
    /// flush the named peer's queue on each one.
    pub fn spawn_drain_loop(
        self: &Arc<Self>,
        mut notify_rx: mpsc::UnboundedReceiver<NodeId>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let transport = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::info!("sync drain task shutting down");
                        break;
                    }
                    signal = notify_rx.recv() => {
                        match signal {
                            Some(node_id) => transport.flush(&node_id).await,
                            None => break,
                        }
                    }
                }
            }
        })
    }

    /// Background task: ping every open channel at a fixed interval.
    ///
    /// A failed ping only drops the channel when the receiver is gone;
    /// reconnecting is the peer's responsibility and queued events are
    /// unaffected either way.
    pub fn spawn_ping_loop(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let transport = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::info!("sync ping task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        for node_id in transport.channels.connected().await {
                            if let Err(e) = transport.channels.send(&node_id, Outbound::Ping).await {
                                tracing::debug!(peer = %node_id, error = %e, "keepalive ping failed");
                            }
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pact_sync::ChangeEvent;
    use pact_types::{SyncAction, SyncDataType};
    use tempfile::tempdir;

    fn peer(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn event(dest: &str, source_id: &str) -> ChangeEvent {
        ChangeEvent {
            data_type: SyncDataType::VoteRequest,
            action: SyncAction::Update,
            source_id: source_id.to_string(),
            payload: vec![7],
            destination: peer(dest),
        }
    }

    fn transport_over(dir: &std::path::Path) -> (Arc<SyncTransport>, Arc<SyncDispatcher>, mpsc::UnboundedReceiver<NodeId>) {
        let (dispatcher, notify_rx) = SyncDispatcher::new(dir).unwrap();
        let dispatcher = Arc::new(dispatcher);
        let transport = Arc::new(SyncTransport::new(
            Arc::clone(&dispatcher),
            Arc::new(PeerChannels::new()),
        ));
        (transport, dispatcher, notify_rx)
    }

    #[tokio::test]
    async fn subscribe_flushes_backlog() {
        let dir = tempdir().unwrap();
        let (transport, dispatcher, _notify) = transport_over(dir.path());

        // Events queued while the peer was offline.
        dispatcher.dispatch(event("b", "v1")).unwrap();
        dispatcher.dispatch(event("b", "v2")).unwrap();

        let mut rx = transport.subscribe(peer("b")).await;
        match rx.recv().await.unwrap() {
            Outbound::Events(events) => {
                assert_eq!(events.len(), 2);
                assert_eq!(events[0].source_id, "v1");
            }
            other => panic!("expected events, got {other:?}"),
        }

        // Delivery is not commit: the queue still holds both.
        assert_eq!(dispatcher.pending(&peer("b")).len(), 2);
    }

    #[tokio::test]
    async fn drain_loop_forwards_new_work() {
        let dir = tempdir().unwrap();
        let (transport, dispatcher, notify_rx) = transport_over(dir.path());
        let (shutdown_tx, _) = broadcast::channel(1);

        let mut rx = transport.subscribe(peer("b")).await;
        let handle = transport.spawn_drain_loop(notify_rx, shutdown_tx.subscribe());

        dispatcher.dispatch(event("b", "v1")).unwrap();

        match rx.recv().await.unwrap() {
            Outbound::Events(events) => assert_eq!(events[0].source_id, "v1"),
            other => panic!("expected events, got {other:?}"),
        }

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn events_for_offline_peer_stay_queued() {
        let dir = tempdir().unwrap();
        let (transport, dispatcher, _notify) = transport_over(dir.path());

        dispatcher.dispatch(event("offline", "v1")).unwrap();
        transport.flush(&peer("offline")).await;

        assert_eq!(dispatcher.pending(&peer("offline")).len(), 1);
    }

    #[tokio::test]
    async fn ping_loop_probes_connected_peers() {
        let dir = tempdir().unwrap();
        let (transport, _dispatcher, _notify) = transport_over(dir.path());
        let (shutdown_tx, _) = broadcast::channel(1);

        let mut rx = transport.subscribe(peer("b")).await;
        let handle = transport.spawn_ping_loop(Duration::from_millis(10), shutdown_tx.subscribe());

        assert_eq!(rx.recv().await.unwrap(), Outbound::Ping);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
