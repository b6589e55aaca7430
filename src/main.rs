mod cli;
mod client;
mod daemon;
mod history;
mod ipc;
mod poller;
mod resolver;
mod storage;

use std::time::Duration;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Daemon {
            history_limit,
            expire,
            data_dir,
            poll_interval_ms,
        } => {
            let options = daemon::DaemonOptions {
                data_dir,
                history_limit: history_limit.map(|n| n as usize),
                expiration: expire,
                poll_interval: Duration::from_millis(poll_interval_ms),
            };
            if let Err(e) = daemon::run(options).await {
                tracing::error!(error = %e, "daemon failed");
                eprintln!("clipkeepd daemon: {e}");
                std::process::exit(1);
            }
        }
        Command::Client { action } => {
            if let Err(e) = client::run(action).await {
                tracing::error!(error = %e, "client failed");
                eprintln!("clipkeepd client: {e}");
                std::process::exit(1);
            }
        }
    }
}
