//! Snapshot codec: the persisted form of the history list.
//!
//! Layout: a MessagePack map `{version, items}` where each item is
//! `{content: {kind, payload}, captured_at}`. Encoded with named fields
//! so that new optional fields can be added without breaking readers.

use serde::{Deserialize, Serialize};

use super::entry::ClipboardEntry;

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors decoding or encoding a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("MessagePack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("unsupported snapshot version {found} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion { found: u32 },
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    items: Vec<&'a ClipboardEntry>,
}

#[derive(Deserialize)]
struct SnapshotOwned {
    version: u32,
    items: Vec<ClipboardEntry>,
}

/// Encode entries (newest first) into snapshot bytes.
pub fn encode<'a, I>(items: I) -> Result<Vec<u8>, SnapshotError>
where
    I: IntoIterator<Item = &'a ClipboardEntry>,
{
    let snapshot = SnapshotRef {
        version: SNAPSHOT_VERSION,
        items: items.into_iter().collect(),
    };
    Ok(rmp_serde::to_vec_named(&snapshot)?)
}

/// Decode snapshot bytes, rejecting unknown versions.
pub fn decode(bytes: &[u8]) -> Result<Vec<ClipboardEntry>, SnapshotError> {
    let snapshot: SnapshotOwned = rmp_serde::from_slice(bytes)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: snapshot.version,
        });
    }
    Ok(snapshot.items)
}
