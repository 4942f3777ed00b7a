//! Delivery transport for the change-sync channel.
//!
//! Each connected peer holds one long-lived outbound channel (in practice
//! the server side of an event stream the peer opened). The transport
//! drains a peer's durable queue onto its channel whenever the dispatcher
//! signals new work, flushes the whole backlog when a peer (re)connects,
//! and pings every open channel at a fixed interval. Events stay in the
//! durable queue until the peer's apply-acknowledgment arrives out-of-band;
//! writing to the channel is not delivery confirmation.

pub mod channels;
pub mod error;
pub mod transport;

pub use channels::{Outbound, PeerChannels};
pub use error::NetworkError;
pub use transport::SyncTransport;
