//! History daemon: clipboard capture, history ownership, client IPC.
//!
//! Listens on a Unix domain socket and serves history queries and
//! mutations to `client` invocations, while the clipboard poller feeds
//! newly copied content into the store.
//!
//! Architecture: channel-based actor. A single daemon loop owns all
//! mutable state ([`state::DaemonState`]), including the
//! [`HistoryStore`], which therefore has exactly one writer. Poller
//! captures, client requests and disconnect notices all arrive over
//! mpsc channels; history changes fan out to subscribed connections
//! through per-connection push channels.

mod connection;
mod handler;
mod settings;
mod sink;
pub mod state;

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{mpsc, watch};

use connection::{ClientRequest, ConnectionClosed};
use handler::SideEffect;
use state::{ConnectionId, DaemonState};

use crate::history::{ClipboardEntry, ExpirationPolicy, HistoryStore};
use crate::ipc::protocol::Message;
use crate::poller::ClipboardPoller;
use crate::resolver::x11::clipboard::X11ClipboardProvider;
use crate::resolver::{ClipboardProvider, ResolverError};
use crate::storage::{self, FileStore, KeyValueStore, StorageError};

/// Daemon startup/runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("$XDG_RUNTIME_DIR is not set")]
    NoRuntimeDir,
    #[error("daemon already running at {0}")]
    AlreadyRunning(PathBuf),
    #[error("failed to create directory {path}: {source}")]
    MkdirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to bind socket {path}: {source}")]
    BindFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("clipboard access: {0}")]
    Resolver(#[from] ResolverError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Startup options from the command line. `None` defers to persisted
/// settings, then defaults.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub data_dir: Option<PathBuf>,
    pub history_limit: Option<usize>,
    pub expiration: Option<ExpirationPolicy>,
    pub poll_interval: Duration,
}

/// Run the daemon until SIGTERM or SIGINT.
///
/// - Socket at `$XDG_RUNTIME_DIR/clipkeep/daemon.sock` (directory mode 0700)
/// - Stale socket detection and cleanup
/// - SIGTERM/SIGINT: graceful shutdown, socket file removed
///
/// # Errors
///
/// Returns `DaemonError` if `$XDG_RUNTIME_DIR` is unset, the data
/// directory or display cannot be opened, socket bind fails, or another
/// daemon is already running.
pub async fn run(options: DaemonOptions) -> Result<(), DaemonError> {
    let socket_path = crate::ipc::socket_path().ok_or(DaemonError::NoRuntimeDir)?;
    let data_dir = match options.data_dir {
        Some(dir) => dir,
        None => storage::default_data_dir()?,
    };

    let files = FileStore::open(&data_dir)?;
    tracing::debug!(dir = %files.dir().display(), "data directory ready");
    let kv: Arc<dyn KeyValueStore> = Arc::new(files);
    let provider: Arc<dyn ClipboardProvider> = Arc::new(X11ClipboardProvider::connect()?);

    let config = settings::resolve(
        settings::load(kv.as_ref()),
        options.history_limit,
        options.expiration,
    );
    tracing::info!(
        data_dir = %data_dir.display(),
        history_limit = config.history_limit,
        expiration = %config.expiration,
        "settings resolved"
    );
    let (config_tx, config_rx) = watch::channel(config);
    let store = HistoryStore::load(Arc::clone(&kv), config_rx);

    let listener = bind_socket(&socket_path).await?;
    tracing::info!(path = %socket_path.display(), "daemon listening");

    let (captured_tx, captured_rx) = mpsc::unbounded_channel();
    let mut poller = ClipboardPoller::new(Arc::clone(&provider), captured_tx, options.poll_interval);
    poller.start();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        }
    };

    serve(
        listener,
        DaemonState::new(store, config_tx),
        captured_rx,
        provider,
        kv,
        shutdown,
    )
    .await;
    poller.stop();

    if let Err(e) = std::fs::remove_file(&socket_path) {
        tracing::warn!(error = %e, path = %socket_path.display(), "failed to remove socket");
    }
    tracing::info!("daemon stopped");
    Ok(())
}

/// The daemon loop. Returns when `shutdown` resolves; the listener is
/// dropped on return.
async fn serve(
    listener: UnixListener,
    mut state: DaemonState,
    mut captured_rx: mpsc::UnboundedReceiver<ClipboardEntry>,
    provider: Arc<dyn ClipboardProvider>,
    kv: Arc<dyn KeyValueStore>,
    shutdown: impl Future<Output = ()>,
) {
    let (request_tx, mut request_rx) = mpsc::unbounded_channel::<ClientRequest>();
    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel::<ConnectionClosed>();
    let mut push_senders: HashMap<ConnectionId, mpsc::UnboundedSender<Message>> = HashMap::new();
    let mut history_rx = state.store.subscribe();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // -- New connection --
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        accept_connection(stream, &request_tx, &closed_tx, &mut push_senders);
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                }
            }

            // -- Request from a connection task --
            Some(request) = request_rx.recv() => {
                let (mut response, effect) =
                    handler::handle_message(&mut state, request.message, request.conn_id);
                if let Some(effect) = effect
                    && let Err(reason) = apply_effect(effect, &provider, kv.as_ref()).await
                {
                    response = Message::error(response.id(), reason);
                }
                let _ = request.reply.send(response);
            }

            // -- Captured by the poller --
            Some(entry) = captured_rx.recv() => {
                state.store.upsert(entry);
                tracing::debug!(entries = state.store.len(), "capture stored");
            }

            // -- History changed --
            Ok(()) = history_rx.changed() => {
                let count = history_rx.borrow_and_update().len();
                notify_subscribers(&state, &push_senders, count);
            }

            // -- Connection disconnected --
            Some(ConnectionClosed(conn_id)) = closed_rx.recv() => {
                push_senders.remove(&conn_id);
                state.unsubscribe(conn_id);
                tracing::debug!(?conn_id, "connection cleaned up");
            }

            () = &mut shutdown => break,
        }
    }
}

/// Accept a new connection: create channels and spawn handler task.
fn accept_connection(
    stream: UnixStream,
    request_tx: &mpsc::UnboundedSender<ClientRequest>,
    closed_tx: &mpsc::UnboundedSender<ConnectionClosed>,
    push_senders: &mut HashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
) {
    let conn_id = ConnectionId::new();
    let (push_tx, push_rx) = mpsc::unbounded_channel();
    push_senders.insert(conn_id, push_tx);

    connection::spawn_connection(
        stream,
        conn_id,
        request_tx.clone(),
        push_rx,
        closed_tx.clone(),
    );

    tracing::debug!(?conn_id, "accepted connection");
}

/// Carry out a handler side effect. Returns the error string for the
/// response on failure.
async fn apply_effect(
    effect: SideEffect,
    provider: &Arc<dyn ClipboardProvider>,
    kv: &dyn KeyValueStore,
) -> Result<(), &'static str> {
    match effect {
        SideEffect::WriteClipboard(content) => {
            sink::deliver_clipboard(provider, content)
                .await
                .map_err(|e| {
                    tracing::warn!(error = %e, "clipboard write failed");
                    "clipboard_failed"
                })
        }
        SideEffect::Configure(config) => {
            settings::save(kv, &config);
            Ok(())
        }
    }
}

/// Push `history_changed` to every subscribed connection.
fn notify_subscribers(
    state: &DaemonState,
    push_senders: &HashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
    count: usize,
) {
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    for conn_id in state.subscribers() {
        let Some(tx) = push_senders.get(&conn_id) else {
            continue;
        };
        if tx.send(Message::HistoryChanged { id: 0, count }).is_err() {
            tracing::debug!(?conn_id, "subscriber gone before notification");
        }
    }
}

// -- Socket setup --

/// Create the socket directory and bind the Unix listener.
///
/// Handles stale socket detection: if EADDRINUSE, attempts to connect
/// to the existing socket. If the connection succeeds, another daemon
/// is running. If it fails, the socket is stale and is removed.
async fn bind_socket(path: &Path) -> Result<UnixListener, DaemonError> {
    let parent = path.parent().unwrap_or(Path::new("/"));
    if !parent.exists() {
        std::fs::create_dir_all(parent).map_err(|e| DaemonError::MkdirFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    // Enforce 0700 even on a pre-existing directory.
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700)).map_err(|e| {
            DaemonError::MkdirFailed {
                path: parent.to_path_buf(),
                source: e,
            }
        })?;
    }

    let bind_failed = |source: std::io::Error| DaemonError::BindFailed {
        path: path.to_path_buf(),
        source,
    };
    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            if UnixStream::connect(path).await.is_ok() {
                return Err(DaemonError::AlreadyRunning(path.to_path_buf()));
            }
            tracing::info!(path = %path.display(), "removing stale socket");
            std::fs::remove_file(path).map_err(bind_failed)?;
            UnixListener::bind(path).map_err(bind_failed)
        }
        Err(e) => Err(bind_failed(e)),
    }
}
