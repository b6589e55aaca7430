//! ClipboardProvider trait: OS clipboard read/write abstraction.

use super::ResolverError;
use crate::history::ClipboardContent;

/// Reads and writes the system clipboard.
///
/// The model is pull-only: callers sample [`change_count`] periodically
/// and extract content when it moves. Adapters for platforms with push
/// notifications fold them into the counter.
///
/// `Send + Sync` is required because reads run on tokio's blocking pool
/// while the daemon loop holds the same provider for write-back.
///
/// [`change_count`]: ClipboardProvider::change_count
pub trait ClipboardProvider: Send + Sync {
    /// Opaque counter that changes whenever the clipboard content is
    /// replaced. Only equality between samples is meaningful.
    fn change_count(&self) -> Result<u64, ResolverError>;

    /// Current clipboard content as text, or `None` if the clipboard
    /// holds no (non-empty) text.
    fn read_text(&self) -> Result<Option<String>, ResolverError>;

    /// Current clipboard content as encoded image bytes, or `None` if no
    /// image representation is offered.
    fn read_image(&self) -> Result<Option<Vec<u8>>, ResolverError>;

    /// Replace the clipboard with exactly one representation matching
    /// the content variant.
    fn write(&self, content: &ClipboardContent) -> Result<(), ResolverError>;
}
