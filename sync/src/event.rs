//! Change events — one aggregate mutation addressed to one peer.

use pact_types::{NodeId, SyncAction, SyncDataType};
use serde::{Deserialize, Serialize};

/// A record of one aggregate mutation destined for one peer.
///
/// Equality is full structural equality; the peer queue uses it both for
/// set-like rejection of byte-identical re-enqueues and for locating an
/// entry at commit time. The `(data_type, source_id)` pair identifies the
/// logical row for the supersede-on-update rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Which aggregate kind changed.
    pub data_type: SyncDataType,
    /// What happened to it.
    pub action: SyncAction,
    /// The aggregate's natural key (vote id, "voteid/voter", project id, …).
    pub source_id: String,
    /// The serialized aggregate after the mutation (empty for deletes).
    pub payload: Vec<u8>,
    /// The peer this copy of the event is addressed to.
    pub destination: NodeId,
}

impl ChangeEvent {
    /// Whether `other` targets the same logical row.
    pub fn same_row(&self, other: &ChangeEvent) -> bool {
        self.data_type == other.data_type && self.source_id == other.source_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(source_id: &str, payload: &[u8]) -> ChangeEvent {
        ChangeEvent {
            data_type: SyncDataType::VoteRequest,
            action: SyncAction::Update,
            source_id: source_id.to_string(),
            payload: payload.to_vec(),
            destination: NodeId::new("peer-b").unwrap(),
        }
    }

    #[test]
    fn same_row_ignores_payload() {
        let a = event("v1", b"old");
        let b = event("v1", b"new");
        assert!(a.same_row(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn different_rows_are_distinct() {
        let a = event("v1", b"x");
        let b = event("v2", b"x");
        assert!(!a.same_row(&b));
    }
}
