//! HTTP API for the DataPact node.
//!
//! Thin layer over [`pact_node::PactNode`]: approval creation and replies,
//! vote/queue status queries, the inbound change-sync push endpoint, the
//! outbound change-sync event stream, and Prometheus metrics.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use server::RpcServer;
