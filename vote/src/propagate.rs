//! What a vote mutation must tell the rest of the network.

use pact_types::{NodeId, SyncAction, SyncDataType};

/// One aggregate mutation in storage-neutral form.
///
/// The node layer crosses records with destinations to build the per-peer
/// change events the sync dispatcher queues.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncRecord {
    pub data_type: SyncDataType,
    pub action: SyncAction,
    /// The aggregate's natural key.
    pub source_id: String,
    /// The serialized aggregate after the mutation.
    pub payload: Vec<u8>,
}

/// The full outward effect of one engine call: which records changed and
/// which peers must learn about them.
#[derive(Clone, Debug, Default)]
pub struct Propagation {
    pub records: Vec<SyncRecord>,
    pub destinations: Vec<NodeId>,
}

impl Propagation {
    /// A mutation with nothing to tell anyone (e.g. a local-only change).
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() || self.destinations.is_empty()
    }
}
