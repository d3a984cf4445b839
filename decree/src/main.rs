//! Agreement service node.
//!
//! Runs one node of the decree network with a fixed role and membership.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use decree::{Node, NodeConfig, Role, StoreConfig};
use tracing::info;

/// Run a decree agreement node
#[derive(Parser, Debug)]
#[command(name = "decree")]
#[command(about = "Run one node of a decree agreement network")]
struct Args {
    /// Role of this node: proposer, acceptor or learner
    #[arg(short, long)]
    role: Role,

    /// Address to listen on (host:port); must appear in the membership
    #[arg(short, long)]
    listen: String,

    /// Peer membership entry as addr=role; repeat for every other node
    #[arg(short, long = "peer", value_name = "ADDR=ROLE")]
    peers: Vec<String>,

    /// Directory for the durable state file
    #[arg(long, default_value = "nodes")]
    node_dir: PathBuf,

    /// Disable durable state entirely
    #[arg(long)]
    no_persist: bool,

    /// Ignore any existing state file on startup
    #[arg(long)]
    no_restore: bool,

    /// Keep the state file across a clean shutdown
    #[arg(long)]
    keep_state: bool,
}

fn parse_peer(entry: &str) -> Result<(String, Role), String> {
    let (addr, role) = entry
        .split_once('=')
        .ok_or_else(|| format!("expected ADDR=ROLE, got [{entry}]"))?;
    let role = role.parse::<Role>().map_err(|err| err.to_string())?;
    Ok((addr.to_owned(), role))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut membership = BTreeMap::new();
    membership.insert(args.listen.clone(), args.role);
    for entry in &args.peers {
        let (addr, role) = parse_peer(entry)?;
        membership.insert(addr, role);
    }

    let config = NodeConfig {
        store: StoreConfig {
            persist: !args.no_persist,
            restore: !args.no_restore,
            keep_on_shutdown: args.keep_state,
            dir: args.node_dir,
        },
        ..NodeConfig::default()
    };

    let node = Node::new(args.role, args.listen, membership, &config).await?;
    let handle = node.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    handle.shutdown().await?;

    Ok(())
}
