//! DataPact daemon — entry point for running a control-plane node.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use pact_node::{init_logging, LogFormat, NodeConfig, PactNode};
use pact_rpc::RpcServer;

#[derive(Parser)]
#[command(name = "pact-daemon", about = "DataPact control-plane node daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "PACT_CONFIG")]
    config: Option<PathBuf>,

    /// This node's id (overrides the config file).
    #[arg(long, env = "PACT_NODE_ID")]
    node_id: Option<String>,

    /// Data directory for peer-queue checkpoints.
    #[arg(long, env = "PACT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// HTTP API port.
    #[arg(long, env = "PACT_API_PORT")]
    api_port: Option<u16>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "PACT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "PACT_LOG_FORMAT")]
    log_format: Option<String>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Start the node.
    Run,
    /// Validate the configuration and print it back.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(&path.display().to_string())?,
        None => NodeConfig::default(),
    };
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(api_port) = cli.api_port {
        config.api_port = api_port;
    }
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level;
    }
    if let Some(log_format) = cli.log_format {
        config.log_format = log_format;
    }

    match cli.command {
        Command::CheckConfig => {
            println!("{}", config.to_toml_string());
            Ok(())
        }
        Command::Run => run(config).await,
    }
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    init_logging(LogFormat::from_config(&config.log_format), &config.log_level);

    tracing::info!(
        node = %config.node_id,
        api_port = config.api_port,
        peers = config.peers.len(),
        "starting DataPact node"
    );

    let api_port = config.api_port;
    let mut node = PactNode::new(config)?;
    node.start();

    let shutdown_rx = node.shutdown_controller().subscribe();
    let node = Arc::new(node);

    let server = RpcServer::new(api_port);
    let server_node = Arc::clone(&node);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.start(server_node, shutdown_rx).await {
            tracing::error!(error = %e, "rpc server exited with error");
        }
    });

    node.shutdown_controller().wait_for_signal().await;

    server_handle.await?;
    match Arc::try_unwrap(node) {
        Ok(mut node) => node.stop().await,
        Err(_) => tracing::warn!("node still referenced at shutdown, skipping join"),
    }

    tracing::info!("DataPact daemon exited cleanly");
    Ok(())
}
