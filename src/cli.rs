use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::history::{ExpirationPolicy, TimeFormat};
use crate::poller::DEFAULT_POLL_INTERVAL;

#[derive(Parser)]
#[command(name = "clipkeepd", about = "Clipboard history daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the history daemon
    Daemon {
        /// Maximum number of entries kept [default: persisted setting, else 50]
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        history_limit: Option<u32>,

        /// Drop entries older than this at startup: never, hour, day,
        /// week, month or <n>[smhdw] [default: persisted setting, else never]
        #[arg(long)]
        expire: Option<ExpirationPolicy>,

        /// Directory for the history snapshot and settings
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Clipboard sampling interval in milliseconds
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64, value_parser = clap::value_parser!(u64).range(10..))]
        poll_interval_ms: u64,
    },

    /// Query or modify the history of a running daemon
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },
}

#[derive(Subcommand)]
pub enum ClientAction {
    /// List entries, newest first
    List {
        /// Show at most this many entries
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Write an entry's content to stdout (metadata to stderr)
    Get {
        /// Entry index (0 = most recent)
        index: u32,
    },

    /// Put an entry back on the clipboard
    Copy {
        /// Entry index (0 = most recent)
        index: u32,
    },

    /// Remove an entry
    Delete {
        /// Entry index (0 = most recent)
        index: u32,
    },

    /// Remove every entry
    Clear,

    /// Show settings, or change them when flags are given
    Config {
        /// New maximum number of entries
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        history_limit: Option<u32>,

        /// New expiration policy: never, hour, day, week, month or <n>[smhdw]
        #[arg(long)]
        expire: Option<ExpirationPolicy>,

        /// How capture times are shown: "HH:mm", "HH:mm:ss", "yyyy-MM-dd",
        /// "yyyy-MM-dd HH:mm", "MMM d, yyyy" or "MMM d, yyyy HH:mm"
        #[arg(long)]
        time_format: Option<TimeFormat>,
    },

    /// Print a line on every history change
    Watch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("clipkeepd").chain(args.iter().copied()))
    }

    #[test]
    fn daemon_defaults() {
        let Command::Daemon {
            history_limit,
            expire,
            data_dir,
            poll_interval_ms,
        } = parse(&["daemon"]).unwrap().command
        else {
            panic!("expected daemon");
        };
        assert_eq!(history_limit, None);
        assert_eq!(expire, None);
        assert_eq!(data_dir, None);
        assert_eq!(poll_interval_ms, 1000);
    }

    #[test]
    fn daemon_flags() {
        let Command::Daemon {
            history_limit,
            expire,
            ..
        } = parse(&["daemon", "--history-limit", "20", "--expire", "week"])
            .unwrap()
            .command
        else {
            panic!("expected daemon");
        };
        assert_eq!(history_limit, Some(20));
        assert_eq!(
            expire,
            Some(ExpirationPolicy::OlderThan(Duration::from_secs(7 * 86400)))
        );
    }

    #[test]
    fn zero_limit_rejected() {
        assert!(parse(&["daemon", "--history-limit", "0"]).is_err());
        assert!(parse(&["client", "config", "--history-limit", "0"]).is_err());
    }

    #[test]
    fn bad_expiration_rejected() {
        assert!(parse(&["daemon", "--expire", "fortnight"]).is_err());
    }

    #[test]
    fn config_time_format() {
        let Command::Client { action } = parse(&["client", "config", "--time-format", "yyyy-MM-dd HH:mm"])
            .unwrap()
            .command
        else {
            panic!("expected client");
        };
        assert!(matches!(
            action,
            ClientAction::Config {
                time_format: Some(TimeFormat::DateTime),
                ..
            }
        ));
        assert!(parse(&["client", "config", "--time-format", "%H:%M"]).is_err());
    }

    #[test]
    fn client_get_takes_index() {
        let Command::Client { action } = parse(&["client", "get", "3"]).unwrap().command else {
            panic!("expected client");
        };
        assert!(matches!(action, ClientAction::Get { index: 3 }));
    }
}
