//! Resolver abstraction: pluggable platform clipboard adapters.
//!
//! Extracts all platform-specific clipboard behavior (change detection,
//! content extraction, write-back) behind [`ClipboardProvider`]. The
//! poller and the daemon only ever talk to the trait.

pub mod clipboard;
pub mod x11;

pub use clipboard::ClipboardProvider;

/// Errors returned by resolver adapters.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// Display connection or extension setup failed (e.g. no `$DISPLAY`,
    /// XFixes missing).
    #[error("display: {0}")]
    Display(String),

    /// Clipboard transfer failed (e.g. xclip not found, pipe error).
    #[error("clipboard: {0}")]
    Clipboard(String),
}
