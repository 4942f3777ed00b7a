//! Fans aggregate mutations out to per-peer queues.
//!
//! There is exactly one consumer of change events (the queue layer), so
//! propagation is a direct function call: whoever mutates a synchronizable
//! aggregate builds the per-destination events and hands them to
//! [`SyncDispatcher::dispatch_all`]. The dispatcher owns every peer queue,
//! restores them from checkpoints at startup, and signals the transport
//! (via an mpsc channel) whenever a destination gains new work.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use pact_types::NodeId;
use tokio::sync::mpsc;

use crate::queue::CHECKPOINT_EXT;
use crate::{ChangeEvent, PeerQueue, SyncError};

/// Owner of all per-peer queues on this node.
pub struct SyncDispatcher {
    sync_dir: PathBuf,
    queues: RwLock<HashMap<NodeId, Arc<PeerQueue>>>,
    /// Signals the transport that the named destination has new work.
    notify_tx: mpsc::UnboundedSender<NodeId>,
}

impl SyncDispatcher {
    /// Create a dispatcher over `sync_dir` and recover every checkpoint
    /// found there. Returns the dispatcher and the receiver the transport
    /// drains for new-work signals.
    ///
    /// Recovery happens here, before the dispatcher is handed to anyone,
    /// so no push can be accepted ahead of the reload.
    pub fn new(sync_dir: &Path) -> Result<(Self, mpsc::UnboundedReceiver<NodeId>), SyncError> {
        std::fs::create_dir_all(sync_dir)?;
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        let dispatcher = Self {
            sync_dir: sync_dir.to_path_buf(),
            queues: RwLock::new(HashMap::new()),
            notify_tx,
        };
        dispatcher.recover()?;

        Ok((dispatcher, notify_rx))
    }

    /// Reload one queue per checkpoint file under the sync directory.
    fn recover(&self) -> Result<(), SyncError> {
        let mut queues = self.queues.write().expect("queue map lock poisoned");
        for entry in std::fs::read_dir(&self.sync_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CHECKPOINT_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(node_id) = NodeId::new(stem) else {
                tracing::warn!(file = %path.display(), "skipping checkpoint with malformed node id");
                continue;
            };
            let queue = Arc::new(PeerQueue::open(&self.sync_dir, node_id.clone()));
            tracing::info!(peer = %node_id, pending = queue.size(), "recovered peer queue");
            queues.insert(node_id, queue);
        }
        Ok(())
    }

    /// The queue for `node_id`, created on first use.
    pub fn queue(&self, node_id: &NodeId) -> Arc<PeerQueue> {
        if let Some(queue) = self.queues.read().expect("queue map lock poisoned").get(node_id) {
            return Arc::clone(queue);
        }
        let mut queues = self.queues.write().expect("queue map lock poisoned");
        Arc::clone(
            queues
                .entry(node_id.clone())
                .or_insert_with(|| Arc::new(PeerQueue::open(&self.sync_dir, node_id.clone()))),
        )
    }

    /// Enqueue one event for its destination and signal the transport.
    ///
    /// Returns `true` if the event was enqueued (not a duplicate).
    pub fn dispatch(&self, event: ChangeEvent) -> Result<bool, SyncError> {
        let destination = event.destination.clone();
        let queue = self.queue(&destination);
        let enqueued = queue.push(event)?;
        if enqueued {
            // The transport may be gone during shutdown; events stay queued.
            let _ = self.notify_tx.send(destination);
        }
        Ok(enqueued)
    }

    /// Enqueue a batch of events (typically one mutation fanned out to
    /// several destinations).
    pub fn dispatch_all(&self, events: Vec<ChangeEvent>) -> Result<(), SyncError> {
        for event in events {
            self.dispatch(event)?;
        }
        Ok(())
    }

    /// Remove events a peer has acknowledged applying.
    pub fn commit(&self, node_id: &NodeId, events: &[ChangeEvent]) -> Result<(), SyncError> {
        let queue = self.queue(node_id);
        for event in events {
            if !queue.commit(event)? {
                tracing::debug!(peer = %node_id, row = %event.source_id, "ack for already-committed event");
            }
        }
        Ok(())
    }

    /// Snapshot of everything pending for one peer, in delivery order.
    pub fn pending(&self, node_id: &NodeId) -> Vec<ChangeEvent> {
        self.queue(node_id).pending()
    }

    /// Every destination with a queue, with its pending depth.
    pub fn queue_depths(&self) -> Vec<(NodeId, usize)> {
        let queues = self.queues.read().expect("queue map lock poisoned");
        queues
            .iter()
            .map(|(id, q)| (id.clone(), q.size()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pact_types::{SyncAction, SyncDataType};
    use tempfile::tempdir;

    fn event(dest: &str, source_id: &str) -> ChangeEvent {
        ChangeEvent {
            data_type: SyncDataType::VoteRequest,
            action: SyncAction::Update,
            source_id: source_id.to_string(),
            payload: vec![1, 2, 3],
            destination: NodeId::new(dest).unwrap(),
        }
    }

    #[tokio::test]
    async fn dispatch_signals_transport() {
        let dir = tempdir().unwrap();
        let (dispatcher, mut rx) = SyncDispatcher::new(dir.path()).unwrap();

        dispatcher.dispatch(event("peer-b", "v1")).unwrap();

        let signalled = rx.recv().await.unwrap();
        assert_eq!(signalled.as_str(), "peer-b");
        assert_eq!(dispatcher.pending(&signalled).len(), 1);
    }

    #[tokio::test]
    async fn duplicate_dispatch_does_not_signal() {
        let dir = tempdir().unwrap();
        let (dispatcher, mut rx) = SyncDispatcher::new(dir.path()).unwrap();

        assert!(dispatcher.dispatch(event("peer-b", "v1")).unwrap());
        assert!(!dispatcher.dispatch(event("peer-b", "v1")).unwrap());

        rx.recv().await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn fan_out_reaches_every_destination() {
        let dir = tempdir().unwrap();
        let (dispatcher, _rx) = SyncDispatcher::new(dir.path()).unwrap();

        dispatcher
            .dispatch_all(vec![
                event("peer-b", "v1"),
                event("peer-c", "v1"),
                event("peer-d", "v1"),
            ])
            .unwrap();

        let mut depths = dispatcher.queue_depths();
        depths.sort();
        assert_eq!(depths.len(), 3);
        assert!(depths.iter().all(|(_, size)| *size == 1));
    }

    #[tokio::test]
    async fn startup_recovers_checkpointed_queues() {
        let dir = tempdir().unwrap();
        {
            let (dispatcher, _rx) = SyncDispatcher::new(dir.path()).unwrap();
            dispatcher.dispatch(event("peer-b", "v1")).unwrap();
            dispatcher.dispatch(event("peer-c", "v2")).unwrap();
        }

        let (recovered, _rx) = SyncDispatcher::new(dir.path()).unwrap();
        let mut depths = recovered.queue_depths();
        depths.sort();
        assert_eq!(depths.len(), 2);
        assert_eq!(
            recovered.pending(&NodeId::new("peer-b").unwrap())[0].source_id,
            "v1"
        );
    }

    #[tokio::test]
    async fn commit_drains_acknowledged_events() {
        let dir = tempdir().unwrap();
        let (dispatcher, _rx) = SyncDispatcher::new(dir.path()).unwrap();
        let dest = NodeId::new("peer-b").unwrap();

        let e = event("peer-b", "v1");
        dispatcher.dispatch(e.clone()).unwrap();
        dispatcher.commit(&dest, &[e]).unwrap();

        assert!(dispatcher.pending(&dest).is_empty());
    }
}
