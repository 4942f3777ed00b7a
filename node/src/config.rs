//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::NodeError;

/// Configuration for a DataPact node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). The voter set of a deployment
/// is fixed and pre-agreed, so peers are listed statically here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's id within the collaboration network.
    pub node_id: String,

    /// The institution this node belongs to.
    pub institution_id: String,

    /// Display name for the directory.
    #[serde(default)]
    pub name: String,

    /// Host:port this node's API is reachable at.
    #[serde(default = "default_address")]
    pub address: String,

    /// The deployment's fixed vote counter (tally-keeper) node id.
    pub vote_counter: String,

    /// Data directory; peer-queue checkpoints live in `<data_dir>/sync`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Port for the HTTP API.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Hex-encoded 32-byte seed for this node's signing key. A missing
    /// seed generates an ephemeral key at startup (development only —
    /// peers verify signatures against the directory, so a restart with a
    /// fresh key invalidates this node's open requests).
    #[serde(default)]
    pub identity_seed: Option<String>,

    /// Seconds between keepalive pings on open sync channels.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Per-node timeout for cross-node fan-out operations, in seconds.
    #[serde(default = "default_fanout_timeout")]
    pub fanout_timeout_secs: u64,

    /// Upper bound on concurrent fan-out operations.
    #[serde(default = "default_fanout_concurrency")]
    pub fanout_concurrency: usize,

    /// The other nodes of this deployment, seeded into the directory.
    #[serde(default)]
    pub peers: Vec<PeerConfig>,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// A statically configured peer node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerConfig {
    pub node_id: String,
    #[serde(default)]
    pub name: String,
    pub address: String,
    pub institution_id: String,
    /// Hex-encoded Ed25519 public key used to verify this peer's signed
    /// vote requests.
    pub public_key: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_address() -> String {
    "127.0.0.1:7410".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./pact_data")
}

fn default_api_port() -> u16 {
    7410
}

fn default_ping_interval() -> u64 {
    15
}

fn default_fanout_timeout() -> u64 {
    10
}

fn default_fanout_concurrency() -> usize {
    16
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    /// The directory peer-queue checkpoints are written to.
    pub fn sync_dir(&self) -> PathBuf {
        self.data_dir.join("sync")
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "local".to_string(),
            institution_id: "local-inst".to_string(),
            name: String::new(),
            address: default_address(),
            vote_counter: "local".to_string(),
            data_dir: default_data_dir(),
            api_port: default_api_port(),
            identity_seed: None,
            ping_interval_secs: default_ping_interval(),
            fanout_timeout_secs: default_fanout_timeout(),
            fanout_concurrency: default_fanout_concurrency(),
            peers: Vec::new(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string();
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.api_port, config.api_port);
        assert_eq!(parsed.node_id, config.node_id);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let toml = r#"
            node_id = "alpha"
            institution_id = "inst-a"
            vote_counter = "alpha"
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.api_port, 7410);
        assert_eq!(config.ping_interval_secs, 15);
        assert_eq!(config.log_format, "human");
        assert!(config.peers.is_empty());
    }

    #[test]
    fn peers_parse_from_toml() {
        let toml = r#"
            node_id = "alpha"
            institution_id = "inst-a"
            vote_counter = "alpha"

            [[peers]]
            node_id = "bravo"
            address = "bravo.example:7410"
            institution_id = "inst-b"
            public_key = "aa11"
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.peers.len(), 1);
        assert_eq!(config.peers[0].node_id, "bravo");
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file("/nonexistent/pact.toml");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }

    #[test]
    fn sync_dir_is_under_data_dir() {
        let config = NodeConfig {
            data_dir: PathBuf::from("/var/lib/pact"),
            ..Default::default()
        };
        assert_eq!(config.sync_dir(), PathBuf::from("/var/lib/pact/sync"));
    }
}
