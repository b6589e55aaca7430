//! Clipboard history engine: entries, configuration, snapshot codec
//! and the store that ties them together.

pub mod entry;
pub mod policy;
pub mod snapshot;
pub mod store;

use std::time::{SystemTime, UNIX_EPOCH};

pub use entry::{ClipboardContent, ClipboardEntry};
pub use policy::{ExpirationPolicy, HistoryConfig, TimeFormat};
pub use store::HistoryStore;

/// Current time as Unix epoch milliseconds.
///
/// A clock set before 1970 reads as 0 rather than panicking; such
/// entries simply look ancient to the expiration policy.
pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
