//! DataPact control-plane node — wires every subsystem together.
//!
//! The node owns:
//! - the storage backend and the node directory,
//! - the sync dispatcher with its durable per-peer queues,
//! - the delivery transport (peer channels, drain loop, keepalive ping),
//! - the vote engine with the registered approval strategies,
//! - the bounded cross-node fan-out executor,
//! - configuration, logging, metrics, and graceful shutdown.

pub mod config;
pub mod error;
pub mod fanout;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod shutdown;

pub use config::{NodeConfig, PeerConfig};
pub use error::NodeError;
pub use fanout::{FanOutExecutor, FanOutReport};
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::PactNode;
pub use shutdown::ShutdownController;
