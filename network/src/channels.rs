//! Registry of open outbound channels, one per connected peer.

use std::collections::HashMap;

use pact_sync::ChangeEvent;
use pact_types::NodeId;
use tokio::sync::{mpsc, RwLock};

use crate::NetworkError;

/// Buffered capacity of one peer's outbound channel.
const CHANNEL_BUFFER: usize = 64;

/// What flows over a peer channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// A batch of pending change events for the peer to apply.
    Events(Vec<ChangeEvent>),
    /// Liveness probe keeping the stream open through idle periods.
    Ping,
}

/// Maps peer node ids to their open outbound channels.
///
/// The event-stream handler registers a channel when a peer connects and
/// holds the receiving end; the transport looks senders up here. A peer
/// reconnecting replaces its previous channel (the old receiver closes).
pub struct PeerChannels {
    channels: RwLock<HashMap<NodeId, mpsc::Sender<Outbound>>>,
}

impl PeerChannels {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Open a fresh channel for `node_id`, returning the receiving end.
    /// Any previous channel for the peer is dropped.
    pub async fn subscribe(&self, node_id: NodeId) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
        let mut channels = self.channels.write().await;
        if channels.insert(node_id.clone(), tx).is_some() {
            tracing::debug!(peer = %node_id, "replaced existing peer channel");
        }
        rx
    }

    /// Drop the channel for `node_id`, if any.
    pub async fn remove(&self, node_id: &NodeId) {
        let mut channels = self.channels.write().await;
        channels.remove(node_id);
    }

    /// Send to a peer's channel without waiting: a full buffer is reported
    /// as backpressure (the events stay in the durable queue), and a
    /// channel whose receiving stream has gone away is evicted and
    /// reported as closed. Never blocks the caller on a stuck peer.
    pub async fn send(&self, node_id: &NodeId, outbound: Outbound) -> Result<(), NetworkError> {
        let sender = {
            let channels = self.channels.read().await;
            channels.get(node_id).cloned()
        };
        let Some(sender) = sender else {
            return Err(NetworkError::NotConnected(node_id.to_string()));
        };
        match sender.try_send(outbound) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(NetworkError::Backpressure(node_id.to_string()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(peer = %node_id, "peer channel closed, removing");
                self.remove(node_id).await;
                Err(NetworkError::ChannelClosed(node_id.to_string()))
            }
        }
    }

    /// Node ids with an open channel.
    pub async fn connected(&self) -> Vec<NodeId> {
        let channels = self.channels.read().await;
        channels.keys().cloned().collect()
    }

    pub async fn is_connected(&self, node_id: &NodeId) -> bool {
        let channels = self.channels.read().await;
        channels.contains_key(node_id)
    }
}

impl Default for PeerChannels {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    #[tokio::test]
    async fn send_without_channel_reports_disconnected() {
        let channels = PeerChannels::new();
        let err = channels.send(&peer("b"), Outbound::Ping).await.unwrap_err();
        assert!(matches!(err, NetworkError::NotConnected(_)));
    }

    #[tokio::test]
    async fn subscribe_then_send_delivers() {
        let channels = PeerChannels::new();
        let mut rx = channels.subscribe(peer("b")).await;

        channels.send(&peer("b"), Outbound::Ping).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Outbound::Ping);
    }

    #[tokio::test]
    async fn resubscribe_replaces_channel() {
        let channels = PeerChannels::new();
        let mut old_rx = channels.subscribe(peer("b")).await;
        let mut new_rx = channels.subscribe(peer("b")).await;

        channels.send(&peer("b"), Outbound::Ping).await.unwrap();
        assert!(old_rx.recv().await.is_none()); // old sender dropped
        assert_eq!(new_rx.recv().await.unwrap(), Outbound::Ping);
    }

    #[tokio::test]
    async fn full_channel_reports_backpressure() {
        let channels = PeerChannels::new();
        let _rx = channels.subscribe(peer("b")).await; // never drained

        for _ in 0..CHANNEL_BUFFER {
            channels.send(&peer("b"), Outbound::Ping).await.unwrap();
        }
        let err = channels.send(&peer("b"), Outbound::Ping).await.unwrap_err();
        assert!(matches!(err, NetworkError::Backpressure(_)));
        // The channel is not evicted: the peer is alive, just slow.
        assert!(channels.is_connected(&peer("b")).await);
    }

    #[tokio::test]
    async fn dropped_receiver_evicts_channel() {
        let channels = PeerChannels::new();
        let rx = channels.subscribe(peer("b")).await;
        drop(rx);

        let err = channels.send(&peer("b"), Outbound::Ping).await.unwrap_err();
        assert!(matches!(err, NetworkError::ChannelClosed(_)));
        assert!(!channels.is_connected(&peer("b")).await);
    }
}
