//! X11 clipboard provider: change detection via XFixes, transfer via
//! `xclip`.
//!
//! Text is requested as `UTF8_STRING`; images as `image/png`, the one
//! image encoding the history keeps. The image target is only requested
//! when the owner advertises it in `TARGETS`.

use std::io::Write;
use std::process::{Command, Stdio};

use super::SelectionWatcher;
use crate::history::ClipboardContent;
use crate::resolver::{ClipboardProvider, ResolverError};

const TEXT_TARGET: &str = "UTF8_STRING";
const IMAGE_TARGET: &str = "image/png";

/// X11 implementation of `ClipboardProvider`.
#[derive(Debug)]
pub struct X11ClipboardProvider {
    watcher: SelectionWatcher,
}

impl X11ClipboardProvider {
    /// Connect to the display and start tracking the selection owner.
    pub fn connect() -> Result<Self, ResolverError> {
        Ok(Self {
            watcher: SelectionWatcher::connect()?,
        })
    }

    /// Read the clipboard converted to `target`.
    ///
    /// A non-zero xclip exit means the owner refused the conversion
    /// (target not offered, or the clipboard is empty), which is `None`
    /// rather than an error.
    fn read_target(&self, target: &str) -> Result<Option<Vec<u8>>, ResolverError> {
        let output = Command::new("xclip")
            .args(["-selection", "clipboard", "-o", "-t", target])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| ResolverError::Clipboard(format!("failed to spawn xclip -o: {e}")))?;

        if !output.status.success() {
            tracing::trace!(target, status = %output.status, "conversion refused");
            return Ok(None);
        }
        if output.stdout.is_empty() {
            return Ok(None);
        }
        Ok(Some(output.stdout))
    }

    fn offers_target(&self, target: &str) -> Result<bool, ResolverError> {
        let targets = self.read_target("TARGETS")?.unwrap_or_default();
        Ok(parse_targets(&targets).any(|t| t == target))
    }
}

impl ClipboardProvider for X11ClipboardProvider {
    fn change_count(&self) -> Result<u64, ResolverError> {
        self.watcher.sample()
    }

    fn read_text(&self) -> Result<Option<String>, ResolverError> {
        Ok(self
            .read_target(TEXT_TARGET)?
            .and_then(|bytes| String::from_utf8(bytes).ok()))
    }

    fn read_image(&self) -> Result<Option<Vec<u8>>, ResolverError> {
        if !self.offers_target(IMAGE_TARGET)? {
            return Ok(None);
        }
        self.read_target(IMAGE_TARGET)
    }

    fn write(&self, content: &ClipboardContent) -> Result<(), ResolverError> {
        let target = match content {
            ClipboardContent::Text(_) => TEXT_TARGET,
            ClipboardContent::Image(_) => IMAGE_TARGET,
        };

        let mut child = Command::new("xclip")
            .args(["-selection", "clipboard", "-t", target, "-i"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ResolverError::Clipboard(format!("failed to spawn xclip: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(content.as_bytes())
                .map_err(|e| ResolverError::Clipboard(format!("failed to write to xclip: {e}")))?;
            // Drop stdin to close the pipe so xclip can finish.
        }

        let status = child
            .wait()
            .map_err(|e| ResolverError::Clipboard(format!("failed to wait for xclip: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(ResolverError::Clipboard(format!(
                "xclip exited with status {status}"
            )))
        }
    }
}

/// Split `xclip -t TARGETS` output (one atom name per line).
fn parse_targets(raw: &[u8]) -> impl Iterator<Item = &str> {
    std::str::from_utf8(raw)
        .unwrap_or("")
        .lines()
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
