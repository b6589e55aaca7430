//! Clipboard entries: the unit of history.
//!
//! Content is a sum type over the two representations the daemon
//! understands. Identity for dedup purposes is the content alone; the
//! capture timestamp never participates in equality.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Content captured from the OS clipboard.
///
/// Image bytes are an opaque encoded blob (PNG on X11). Nothing in the
/// history engine decodes them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum ClipboardContent {
    Text(String),
    Image(#[serde(with = "serde_bytes")] Vec<u8>),
}

impl ClipboardContent {
    /// Short label for the variant, used on the wire and in listings.
    pub fn kind(&self) -> &'static str {
        match self {
            ClipboardContent::Text(_) => "text",
            ClipboardContent::Image(_) => "image",
        }
    }

    /// Payload size in bytes (UTF-8 length for text).
    pub fn byte_len(&self) -> usize {
        match self {
            ClipboardContent::Text(text) => text.len(),
            ClipboardContent::Image(bytes) => bytes.len(),
        }
    }

    /// Raw payload bytes as they would be written back to the clipboard.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ClipboardContent::Text(text) => text.as_bytes(),
            ClipboardContent::Image(bytes) => bytes,
        }
    }

    /// One-line preview: the first line of text cut to `max_chars`
    /// characters, or a size summary for images.
    pub fn preview(&self, max_chars: usize) -> String {
        match self {
            ClipboardContent::Text(text) => {
                let first_line = text.lines().next().unwrap_or("");
                let mut chars = first_line.chars();
                let cut: String = chars.by_ref().take(max_chars).collect();
                let more_lines = text.lines().nth(1).is_some();
                if chars.next().is_some() || more_lines {
                    format!("{cut}…")
                } else {
                    cut
                }
            }
            ClipboardContent::Image(bytes) => format!("image ({} bytes)", bytes.len()),
        }
    }
}

/// A clipboard capture plus the time it was taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipboardEntry {
    pub content: ClipboardContent,
    /// Unix epoch milliseconds at capture.
    pub captured_at: u64,
}

impl ClipboardEntry {
    pub fn new(content: ClipboardContent, captured_at: u64) -> Self {
        Self {
            content,
            captured_at,
        }
    }

    /// Capture `content` stamped with the current wall-clock time.
    pub fn now(content: ClipboardContent) -> Self {
        Self::new(content, super::epoch_millis())
    }
}

impl PartialEq for ClipboardEntry {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
    }
}

impl Eq for ClipboardEntry {}

impl Hash for ClipboardEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.content.hash(state);
    }
}
