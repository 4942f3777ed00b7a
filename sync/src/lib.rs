//! Durable, deduplicating change propagation between DataPact nodes.
//!
//! Every mutation of a synchronizable aggregate (vote request, invite,
//! config, project membership) produces a [`ChangeEvent`] addressed to each
//! peer that must learn about it. Events wait in one [`PeerQueue`] per
//! destination — an in-memory FIFO checkpointed to disk after every
//! mutation — until the peer acknowledges having applied them. Delivery is
//! therefore at-least-once; consumers apply events as idempotent upserts.
//!
//! The [`SyncDispatcher`] owns all queues, fans mutations out to them, and
//! signals the transport layer when a destination has new work.

pub mod checkpoint;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod queue;

pub use checkpoint::{decode_queue, encode_queue};
pub use dispatcher::SyncDispatcher;
pub use error::SyncError;
pub use event::ChangeEvent;
pub use queue::PeerQueue;
