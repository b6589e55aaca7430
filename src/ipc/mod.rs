//! IPC codec and wire protocol: MessagePack framing over a Unix socket.

pub mod codec;
pub mod protocol;

use std::path::PathBuf;

/// Daemon socket path: `$XDG_RUNTIME_DIR/clipkeep/daemon.sock`.
///
/// Returns `None` when `$XDG_RUNTIME_DIR` is unset or empty.
pub fn socket_path() -> Option<PathBuf> {
    let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR").filter(|v| !v.is_empty())?;
    Some(PathBuf::from(runtime_dir).join("clipkeep").join("daemon.sock"))
}
