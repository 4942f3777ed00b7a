//! Durable, deduplicating FIFO queue of change events for one peer.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use pact_types::{NodeId, SyncAction};

use crate::checkpoint::{decode_queue, encode_queue};
use crate::{ChangeEvent, SyncError};

/// File extension of per-peer checkpoint files under the sync directory.
pub const CHECKPOINT_EXT: &str = "queue";

/// Mailbox of change events awaiting acknowledgment by one peer.
///
/// All mutation goes through a single per-queue mutex; the checkpoint file
/// is rewritten synchronously under that same lock, so push latency is
/// bounded by one file write and queues for different peers never contend.
///
/// Events stay queued across delivery — only [`commit`](Self::commit)
/// (called once the peer acknowledges applying the event) removes them
/// durably. A crash between delivery and commit therefore redelivers.
pub struct PeerQueue {
    node_id: NodeId,
    checkpoint_path: PathBuf,
    entries: Mutex<VecDeque<ChangeEvent>>,
}

impl PeerQueue {
    /// Open the queue for `node_id`, reloading a checkpoint if one exists.
    ///
    /// A corrupt or unreadable checkpoint degrades to an empty queue: the
    /// loss is logged, and the remote peer remains the source of truth for
    /// anything dropped.
    pub fn open(sync_dir: &Path, node_id: NodeId) -> Self {
        let checkpoint_path = sync_dir.join(format!("{node_id}.{CHECKPOINT_EXT}"));
        let entries = match std::fs::read(&checkpoint_path) {
            Ok(bytes) => match decode_queue(&bytes) {
                Ok(events) => {
                    tracing::debug!(
                        peer = %node_id,
                        pending = events.len(),
                        "reloaded peer queue from checkpoint"
                    );
                    events.into()
                }
                Err(e) => {
                    tracing::warn!(
                        peer = %node_id,
                        error = %e,
                        "checkpoint corrupt, starting with empty queue (pending events lost)"
                    );
                    VecDeque::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => VecDeque::new(),
            Err(e) => {
                tracing::warn!(
                    peer = %node_id,
                    error = %e,
                    "checkpoint unreadable, starting with empty queue"
                );
                VecDeque::new()
            }
        };
        Self {
            node_id,
            checkpoint_path,
            entries: Mutex::new(entries),
        }
    }

    /// The destination this queue belongs to.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Enqueue an event, applying the deduplication rules:
    ///
    /// - an UPDATE supersedes any pending UPDATE for the same
    ///   `(data_type, source_id)` row (the older entry is dropped);
    /// - an event equal to one already queued is rejected outright.
    ///
    /// CREATE and DELETE entries are never coalesced. Returns `true` if the
    /// event was enqueued, `false` if it was a duplicate.
    pub fn push(&self, event: ChangeEvent) -> Result<bool, SyncError> {
        let mut entries = self.entries.lock().expect("queue lock poisoned");

        if event.action == SyncAction::Update {
            let before = entries.len();
            entries.retain(|e| !(e.action == SyncAction::Update && e.same_row(&event)));
            if entries.len() < before {
                tracing::trace!(
                    peer = %self.node_id,
                    row = %event.source_id,
                    "superseded stale update"
                );
            }
        }

        if entries.contains(&event) {
            return Ok(false);
        }

        entries.push_back(event);
        self.checkpoint(&entries)?;
        Ok(true)
    }

    /// The oldest pending event, if any (non-destructive).
    pub fn peek(&self) -> Option<ChangeEvent> {
        let entries = self.entries.lock().expect("queue lock poisoned");
        entries.front().cloned()
    }

    /// Remove and return the oldest pending event.
    ///
    /// This is a destructive read: the event is gone from the checkpoint
    /// too, so responsibility for it passes to the caller. The delivery
    /// path does not use it — it snapshots [`pending`](Self::pending) and
    /// removes via [`commit`](Self::commit) once the peer has acknowledged.
    pub fn poll(&self) -> Result<Option<ChangeEvent>, SyncError> {
        let mut entries = self.entries.lock().expect("queue lock poisoned");
        let event = entries.pop_front();
        if event.is_some() {
            self.checkpoint(&entries)?;
        }
        Ok(event)
    }

    /// Remove an event the peer has acknowledged. Returns `false` if the
    /// event was not queued (already committed — a redelivered ack).
    pub fn commit(&self, event: &ChangeEvent) -> Result<bool, SyncError> {
        let mut entries = self.entries.lock().expect("queue lock poisoned");
        let Some(pos) = entries.iter().position(|e| e == event) else {
            return Ok(false);
        };
        let _ = entries.remove(pos);
        self.checkpoint(&entries)?;
        Ok(true)
    }

    /// Snapshot of every pending event in delivery order.
    pub fn pending(&self) -> Vec<ChangeEvent> {
        let entries = self.entries.lock().expect("queue lock poisoned");
        entries.iter().cloned().collect()
    }

    /// Number of pending events.
    pub fn size(&self) -> usize {
        let entries = self.entries.lock().expect("queue lock poisoned");
        entries.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Rewrite the checkpoint file from the current entries.
    ///
    /// Writes to a sibling temp file first and renames over the target, so
    /// a crash mid-write leaves the previous checkpoint intact.
    fn checkpoint(&self, entries: &VecDeque<ChangeEvent>) -> Result<(), SyncError> {
        let events: Vec<ChangeEvent> = entries.iter().cloned().collect();
        let bytes = encode_queue(&events)?;
        let tmp = self.checkpoint_path.with_extension("queue.tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, &self.checkpoint_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pact_types::SyncDataType;
    use tempfile::tempdir;

    fn peer() -> NodeId {
        NodeId::new("peer-n").unwrap()
    }

    fn update(source_id: &str, payload: &[u8]) -> ChangeEvent {
        ChangeEvent {
            data_type: SyncDataType::VoteRequest,
            action: SyncAction::Update,
            source_id: source_id.to_string(),
            payload: payload.to_vec(),
            destination: peer(),
        }
    }

    fn create(source_id: &str, payload: &[u8]) -> ChangeEvent {
        ChangeEvent {
            action: SyncAction::Create,
            ..update(source_id, payload)
        }
    }

    #[test]
    fn second_update_supersedes_first() {
        let dir = tempdir().unwrap();
        let queue = PeerQueue::open(dir.path(), peer());

        assert!(queue.push(update("v1", b"old")).unwrap());
        assert!(queue.push(update("v1", b"new")).unwrap());

        assert_eq!(queue.size(), 1);
        assert_eq!(queue.peek().unwrap().payload, b"new");
    }

    #[test]
    fn byte_identical_event_rejected() {
        let dir = tempdir().unwrap();
        let queue = PeerQueue::open(dir.path(), peer());

        assert!(queue.push(create("v1", b"x")).unwrap());
        assert!(!queue.push(create("v1", b"x")).unwrap());
        assert_eq!(queue.size(), 1);
    }

    #[test]
    fn creates_and_deletes_never_coalesced() {
        let dir = tempdir().unwrap();
        let queue = PeerQueue::open(dir.path(), peer());

        assert!(queue.push(create("v1", b"a")).unwrap());
        assert!(queue.push(create("v1", b"b")).unwrap());
        // A later update must not touch the pending creates.
        assert!(queue.push(update("v1", b"c")).unwrap());
        assert_eq!(queue.size(), 3);
    }

    #[test]
    fn deletes_never_coalesced() {
        let dir = tempdir().unwrap();
        let queue = PeerQueue::open(dir.path(), peer());

        let delete = |payload: &[u8]| ChangeEvent {
            action: SyncAction::Delete,
            ..update("v1", payload)
        };
        assert!(queue.push(delete(b"a")).unwrap());
        assert!(queue.push(update("v1", b"b")).unwrap());
        assert!(queue.push(delete(b"c")).unwrap());
        assert_eq!(queue.size(), 3);
    }

    #[test]
    fn update_does_not_supersede_other_rows() {
        let dir = tempdir().unwrap();
        let queue = PeerQueue::open(dir.path(), peer());

        queue.push(update("v1", b"a")).unwrap();
        queue.push(update("v2", b"b")).unwrap();
        assert_eq!(queue.size(), 2);
    }

    #[test]
    fn fifo_order_preserved() {
        let dir = tempdir().unwrap();
        let queue = PeerQueue::open(dir.path(), peer());

        queue.push(create("v1", b"a")).unwrap();
        queue.push(create("v2", b"b")).unwrap();
        queue.push(create("v3", b"c")).unwrap();

        assert_eq!(queue.poll().unwrap().unwrap().source_id, "v1");
        assert_eq!(queue.poll().unwrap().unwrap().source_id, "v2");
        assert_eq!(queue.poll().unwrap().unwrap().source_id, "v3");
        assert!(queue.poll().unwrap().is_none());
    }

    #[test]
    fn commit_removes_acknowledged_event() {
        let dir = tempdir().unwrap();
        let queue = PeerQueue::open(dir.path(), peer());

        let e1 = create("v1", b"a");
        let e2 = create("v2", b"b");
        queue.push(e1.clone()).unwrap();
        queue.push(e2.clone()).unwrap();

        assert!(queue.commit(&e1).unwrap());
        assert_eq!(queue.size(), 1);
        assert_eq!(queue.peek().unwrap(), e2);

        // Redelivered ack is a no-op.
        assert!(!queue.commit(&e1).unwrap());
    }

    #[test]
    fn uncommitted_event_survives_restart() {
        let dir = tempdir().unwrap();
        let event = create("v1", b"payload");

        {
            let queue = PeerQueue::open(dir.path(), peer());
            queue.push(event.clone()).unwrap();
            // Simulated crash: queue dropped without commit.
        }

        let reloaded = PeerQueue::open(dir.path(), peer());
        assert_eq!(reloaded.size(), 1);
        assert_eq!(reloaded.peek().unwrap(), event);
    }

    #[test]
    fn committed_event_not_redelivered_after_restart() {
        let dir = tempdir().unwrap();
        let event = create("v1", b"payload");

        {
            let queue = PeerQueue::open(dir.path(), peer());
            queue.push(event.clone()).unwrap();
            queue.commit(&event).unwrap();
        }

        let reloaded = PeerQueue::open(dir.path(), peer());
        assert!(reloaded.is_empty());
    }

    #[test]
    fn restart_preserves_order_and_size() {
        let dir = tempdir().unwrap();
        {
            let queue = PeerQueue::open(dir.path(), peer());
            for n in 0..5 {
                queue.push(create(&format!("v{n}"), &[n as u8])).unwrap();
            }
        }

        let reloaded = PeerQueue::open(dir.path(), peer());
        assert_eq!(reloaded.size(), 5);
        let order: Vec<String> = reloaded
            .pending()
            .into_iter()
            .map(|e| e.source_id)
            .collect();
        assert_eq!(order, vec!["v0", "v1", "v2", "v3", "v4"]);
    }

    #[test]
    fn corrupt_checkpoint_degrades_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(format!("{}.{CHECKPOINT_EXT}", peer()));
        std::fs::write(&path, b"not a checkpoint").unwrap();

        let queue = PeerQueue::open(dir.path(), peer());
        assert!(queue.is_empty());

        // The queue must still accept and persist new work.
        queue.push(create("v1", b"a")).unwrap();
        let reloaded = PeerQueue::open(dir.path(), peer());
        assert_eq!(reloaded.size(), 1);
    }
}
