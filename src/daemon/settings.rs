//! Persisted settings: the `settings` key of the data directory.
//!
//! Precedence at startup: command-line flags, then persisted settings,
//! then defaults. Flags apply to the running daemon only; `configure`
//! requests are what get written back.

use crate::history::{ExpirationPolicy, HistoryConfig};
use crate::storage::KeyValueStore;

pub const SETTINGS_KEY: &str = "settings";

/// Read persisted settings. Absent or unreadable settings yield `None`.
pub fn load(kv: &dyn KeyValueStore) -> Option<HistoryConfig> {
    let bytes = match kv.get(SETTINGS_KEY) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read settings, using defaults");
            return None;
        }
    };
    match rmp_serde::from_slice(&bytes) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(error = %e, "discarding unreadable settings");
            None
        }
    }
}

/// Persist settings. Best-effort: failures are logged.
pub fn save(kv: &dyn KeyValueStore, config: &HistoryConfig) {
    let bytes = match rmp_serde::to_vec_named(config) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode settings");
            return;
        }
    };
    if let Err(e) = kv.set(SETTINGS_KEY, &bytes) {
        tracing::warn!(error = %e, "failed to persist settings");
    }
}

/// Layer command-line overrides over persisted settings.
pub fn resolve(
    persisted: Option<HistoryConfig>,
    history_limit: Option<usize>,
    expiration: Option<ExpirationPolicy>,
) -> HistoryConfig {
    let base = persisted.unwrap_or_default();
    HistoryConfig {
        history_limit: history_limit.unwrap_or(base.history_limit),
        expiration: expiration.unwrap_or(base.expiration),
        ..base
    }
}
