//! Prometheus metrics for the DataPact node.
//!
//! Covers the approval protocol and the change-sync pipeline. The
//! [`NodeMetrics`] struct owns a dedicated [`Registry`] that the HTTP
//! `/metrics` endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Opts, Registry, TextEncoder,
};

/// Central collection of all node-level Prometheus metrics.
pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Total approvals created on this node.
    pub votes_created: IntCounter,
    /// Total vote replies recorded on this node (own and applied remote).
    pub replies_recorded: IntCounter,
    /// Total votes that reached a terminal status on this node.
    pub votes_resolved: IntCounter,
    /// Total change events enqueued for peers.
    pub events_queued: IntCounter,
    /// Total change events committed after peer acknowledgment.
    pub events_committed: IntCounter,
    /// Total inbound sync entries applied.
    pub sync_applied: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Change events currently pending across all peer queues.
    pub pending_events: IntGauge,
    /// Peers with an open sync channel.
    pub connected_peers: IntGauge,
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let votes_created = register_int_counter_with_registry!(
            Opts::new("pact_votes_created_total", "Total approvals created"),
            registry
        )
        .expect("failed to register votes_created counter");

        let replies_recorded = register_int_counter_with_registry!(
            Opts::new("pact_replies_recorded_total", "Total vote replies recorded"),
            registry
        )
        .expect("failed to register replies_recorded counter");

        let votes_resolved = register_int_counter_with_registry!(
            Opts::new(
                "pact_votes_resolved_total",
                "Total votes that reached a terminal status"
            ),
            registry
        )
        .expect("failed to register votes_resolved counter");

        let events_queued = register_int_counter_with_registry!(
            Opts::new(
                "pact_events_queued_total",
                "Total change events enqueued for peers"
            ),
            registry
        )
        .expect("failed to register events_queued counter");

        let events_committed = register_int_counter_with_registry!(
            Opts::new(
                "pact_events_committed_total",
                "Total change events committed after peer acknowledgment"
            ),
            registry
        )
        .expect("failed to register events_committed counter");

        let sync_applied = register_int_counter_with_registry!(
            Opts::new("pact_sync_applied_total", "Total inbound sync entries applied"),
            registry
        )
        .expect("failed to register sync_applied counter");

        let pending_events = register_int_gauge_with_registry!(
            Opts::new(
                "pact_pending_events",
                "Change events currently pending across all peer queues"
            ),
            registry
        )
        .expect("failed to register pending_events gauge");

        let connected_peers = register_int_gauge_with_registry!(
            Opts::new("pact_connected_peers", "Peers with an open sync channel"),
            registry
        )
        .expect("failed to register connected_peers gauge");

        Self {
            registry,
            votes_created,
            replies_recorded,
            votes_resolved,
            events_queued,
            events_committed,
            sync_applied,
            pending_events,
            connected_peers,
        }
    }

    /// Encode every metric in the Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_appear_in_exposition() {
        let metrics = NodeMetrics::new();
        metrics.votes_created.inc();
        metrics.pending_events.set(3);

        let text = metrics.encode();
        assert!(text.contains("pact_votes_created_total 1"));
        assert!(text.contains("pact_pending_events 3"));
    }
}
