//! Submit a value to a decree proposer from the command line.

use std::path::PathBuf;

use clap::Parser;
use decree_client::DecreeClient;
use tracing::{error, info};

/// Submit a candidate value to a decree proposer
#[derive(Parser, Debug)]
#[command(name = "decree-client")]
#[command(about = "Submit a value to a decree proposer")]
struct Args {
    /// Resolvable hostname of a proposer
    #[arg(long)]
    host: String,

    /// Port of the proposer process on --host
    #[arg(long)]
    port: u16,

    /// The value to propose
    #[arg(long, conflicts_with = "value_file")]
    value: Option<String>,

    /// Path to a file holding the value to propose
    #[arg(long)]
    value_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let value = match (&args.value, &args.value_file) {
        (Some(value), _) => value.clone(),
        (None, Some(path)) => match std::fs::read_to_string(path) {
            Ok(contents) => contents.trim().to_owned(),
            Err(err) => {
                error!(path = %path.display(), %err, "could not read value file");
                std::process::exit(1);
            }
        },
        (None, None) => {
            error!("one of --value or --value-file is required");
            std::process::exit(1);
        }
    };

    let client = DecreeClient::new(&args.host, args.port);
    match client.propose(&value).await {
        Ok(chosen) => {
            info!(value = %chosen.value, ballot = %chosen.accepted, "proposal committed");
        }
        Err(err) => {
            error!(%err, "proposal failed");
            std::process::exit(1);
        }
    }
}
