//! CLI client for daemon operations.
//!
//! One-shot commands that connect to the daemon, perform a single
//! request, print the result, and exit. `watch` is the exception: it
//! subscribes and prints a line per history change until the daemon
//! goes away or the user interrupts.

mod daemon_client;
mod format;

use crate::cli::ClientAction;
use crate::history::{TimeFormat, epoch_millis};
use daemon_client::DaemonClient;

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("daemon: {0}")]
    Daemon(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the client command.
///
/// Called from `main.rs` for `Command::Client`.
pub async fn run(action: ClientAction) -> Result<(), ClientError> {
    let mut daemon = DaemonClient::connect().await?;

    match action {
        ClientAction::List { limit } => {
            let time_format = display_format(&mut daemon).await?;
            let entries = daemon.list(limit).await?;
            format::print_entries(&entries, time_format);
        }
        ClientAction::Get { index } => {
            let time_format = display_format(&mut daemon).await?;
            let entry = daemon.get(index).await?;
            format::print_entry(index, &entry, time_format, epoch_millis())?;
        }
        ClientAction::Copy { index } => {
            daemon.copy(index).await?;
            println!("Copied entry {index} to the clipboard");
        }
        ClientAction::Delete { index } => {
            daemon.delete(index).await?;
            println!("Deleted entry {index}");
        }
        ClientAction::Clear => {
            daemon.clear().await?;
            println!("History cleared");
        }
        ClientAction::Config {
            history_limit,
            expire,
            time_format,
        } => {
            let config = daemon
                .configure(
                    history_limit,
                    expire.map(|policy| policy.to_string()),
                    time_format.map(|format| format.to_string()),
                )
                .await?;
            format::print_config(&config);
        }
        ClientAction::Watch => {
            daemon.subscribe().await?;
            while let Some(count) = daemon.next_change().await? {
                println!("history changed: {count} entries");
            }
        }
    }

    Ok(())
}

/// The daemon's configured time format. Patterns this client does not
/// know fall back to the default.
async fn display_format(daemon: &mut DaemonClient) -> Result<TimeFormat, ClientError> {
    let config = daemon.configure(None, None, None).await?;
    Ok(config.time_format.parse().unwrap_or_else(|e| {
        tracing::debug!(error = %e, "using default time format");
        TimeFormat::default()
    }))
}
