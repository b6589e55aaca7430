//! History store: the single source of truth for clipboard history.
//!
//! Owns the ordered list (newest first) and enforces, after every call:
//! - no two entries share equal content,
//! - `len <= history_limit` as configured at the time of the call.
//!
//! Expiration is applied only in [`HistoryStore::load`]. Configuration
//! changes take effect on the next upsert or load; the in-memory list
//! is never re-filtered retroactively.
//!
//! Not internally synchronized. The daemon loop is the only writer;
//! observers get snapshots through [`HistoryStore::subscribe`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use super::entry::ClipboardEntry;
use super::policy::HistoryConfig;
use super::snapshot::{self, SnapshotError};
use crate::storage::{KeyValueStore, StorageError};

/// Key the snapshot is stored under.
pub const HISTORY_KEY: &str = "clipboard_history";

/// Immutable view of the history published to observers.
pub type HistoryView = Arc<Vec<ClipboardEntry>>;

/// Why a snapshot could not be written. Logged, never propagated.
#[derive(Debug, thiserror::Error)]
enum PersistError {
    #[error("encode: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("write: {0}")]
    Storage(#[from] StorageError),
}

pub struct HistoryStore {
    items: VecDeque<ClipboardEntry>,
    kv: Arc<dyn KeyValueStore>,
    config: watch::Receiver<HistoryConfig>,
    observers: watch::Sender<HistoryView>,
}

impl fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryStore")
            .field("len", &self.items.len())
            .field("config", &*self.config.borrow())
            .finish_non_exhaustive()
    }
}

impl HistoryStore {
    /// Restore the history from `kv`, using the current time for
    /// expiration.
    pub fn load(kv: Arc<dyn KeyValueStore>, config: watch::Receiver<HistoryConfig>) -> Self {
        Self::load_at(kv, config, super::epoch_millis())
    }

    /// Restore the history from `kv` as of `now_millis`.
    ///
    /// A missing, corrupt or unsupported snapshot yields an empty
    /// history. After decoding, entries older than the expiration window
    /// are dropped and the list is capped to `history_limit`. Nothing is
    /// written back; the next mutation persists the filtered list.
    pub fn load_at(
        kv: Arc<dyn KeyValueStore>,
        config: watch::Receiver<HistoryConfig>,
        now_millis: u64,
    ) -> Self {
        let items = dedup(read_snapshot(kv.as_ref()));
        let (observers, _) = watch::channel(HistoryView::default());

        let mut store = Self {
            items,
            kv,
            config,
            observers,
        };

        let restored = store.items.len();
        store.expire(now_millis);
        store.cap();
        tracing::info!(restored, kept = store.items.len(), "history loaded");

        store.publish();
        store
    }

    /// Insert `entry` at the front, removing any entry with equal
    /// content first (so re-copying promotes instead of duplicating),
    /// then cap and persist.
    ///
    /// With `history_limit == 0` the list ends up empty.
    pub fn upsert(&mut self, entry: ClipboardEntry) {
        if let Some(pos) = self.items.iter().position(|e| *e == entry) {
            self.items.remove(pos);
            tracing::debug!(from = pos, "promoting existing entry");
        }
        self.items.push_front(entry);
        self.cap();
        self.commit();
    }

    /// Remove the first entry whose content equals `entry`'s.
    ///
    /// Returns whether anything was removed. Absent entries are a no-op
    /// and write nothing.
    pub fn delete(&mut self, entry: &ClipboardEntry) -> bool {
        match self.items.iter().position(|e| e == entry) {
            Some(pos) => {
                self.items.remove(pos);
                self.commit();
                true
            }
            None => false,
        }
    }

    /// Remove every entry and persist the empty list. Clearing an
    /// already empty history writes nothing.
    pub fn clear(&mut self) {
        if self.is_empty() {
            return;
        }
        self.items.clear();
        self.commit();
    }

    /// Write the current list to the key-value slot.
    ///
    /// Best-effort: failures are logged and the in-memory list stays
    /// authoritative. The next mutation tries again.
    pub fn persist(&self) {
        if let Err(e) = self.try_persist() {
            tracing::warn!(error = %e, entries = self.items.len(), "failed to persist history");
        }
    }

    /// Entry at `index` (0 = most recent).
    pub fn get(&self, index: usize) -> Option<&ClipboardEntry> {
        self.items.get(index)
    }

    /// Iterate entries newest-first.
    pub fn entries(&self) -> impl Iterator<Item = &ClipboardEntry> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Observe the list. The receiver holds the current view and is
    /// marked changed after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<HistoryView> {
        self.observers.subscribe()
    }

    fn expire(&mut self, now_millis: u64) {
        let policy = self.config.borrow().expiration;
        if let Some(cutoff) = policy.cutoff(now_millis) {
            let before = self.items.len();
            self.items.retain(|e| e.captured_at >= cutoff);
            let dropped = before - self.items.len();
            if dropped > 0 {
                tracing::debug!(dropped, %policy, "expired entries dropped");
            }
        }
    }

    fn cap(&mut self) {
        let limit = self.config.borrow().history_limit;
        if self.items.len() > limit {
            self.items.truncate(limit);
        }
    }

    fn commit(&mut self) {
        self.persist();
        self.publish();
    }

    fn publish(&self) {
        let view: Vec<ClipboardEntry> = self.items.iter().cloned().collect();
        self.observers.send_replace(Arc::new(view));
    }

    fn try_persist(&self) -> Result<(), PersistError> {
        let bytes = snapshot::encode(&self.items)?;
        self.kv.set(HISTORY_KEY, &bytes)?;
        tracing::trace!(entries = self.items.len(), bytes = bytes.len(), "history persisted");
        Ok(())
    }
}

/// Keep the first (newest) occurrence of each content.
fn dedup(entries: Vec<ClipboardEntry>) -> VecDeque<ClipboardEntry> {
    let mut kept = VecDeque::with_capacity(entries.len());
    for entry in entries {
        if !kept.contains(&entry) {
            kept.push_back(entry);
        }
    }
    kept
}

fn read_snapshot(kv: &dyn KeyValueStore) -> Vec<ClipboardEntry> {
    let bytes = match kv.get(HISTORY_KEY) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::debug!("no persisted history, starting empty");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to read persisted history, starting empty");
            return Vec::new();
        }
    };
    match snapshot::decode(&bytes) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(error = %e, bytes = bytes.len(), "discarding unreadable history snapshot");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::history::entry::ClipboardContent;
    use crate::history::policy::ExpirationPolicy;
    use crate::storage::memory::MemoryStore;

    const HOUR_MS: u64 = 3_600_000;
    const NOW: u64 = 1_700_000_000_000;

    fn config(limit: usize) -> watch::Receiver<HistoryConfig> {
        watch::channel(HistoryConfig {
            history_limit: limit,
            expiration: ExpirationPolicy::Never,
            ..HistoryConfig::default()
        })
        .1
    }

    fn text(s: &str) -> ClipboardEntry {
        ClipboardEntry::new(ClipboardContent::Text(s.into()), NOW)
    }

    fn texts(store: &HistoryStore) -> Vec<String> {
        store
            .entries()
            .map(|e| match &e.content {
                ClipboardContent::Text(t) => t.clone(),
                ClipboardContent::Image(b) => format!("<image {}>", b.len()),
            })
            .collect()
    }

    fn empty_store(limit: usize) -> (HistoryStore, Arc<MemoryStore>) {
        let kv = Arc::new(MemoryStore::new());
        let store = HistoryStore::load_at(kv.clone(), config(limit), NOW);
        (store, kv)
    }

    fn persisted(kv: &MemoryStore) -> Vec<ClipboardEntry> {
        snapshot::decode(&kv.raw(HISTORY_KEY).expect("snapshot written")).unwrap()
    }

    // -- Upsert --

    #[test]
    fn cap_keeps_newest_three() {
        let (mut store, _) = empty_store(3);
        for s in ["a", "b", "c", "d"] {
            store.upsert(text(s));
        }
        assert_eq!(texts(&store), ["d", "c", "b"]);
    }

    #[test]
    fn reupsert_promotes_without_duplicating() {
        let (mut store, _) = empty_store(50);
        store.upsert(text("a"));
        store.upsert(text("b"));
        store.upsert(text("a"));
        assert_eq!(texts(&store), ["a", "b"]);
    }

    #[test]
    fn promotion_moves_to_front_and_keeps_count() {
        let (mut store, _) = empty_store(50);
        for s in ["a", "b", "c", "d"] {
            store.upsert(text(s));
        }
        store.upsert(text("b"));
        assert_eq!(texts(&store), ["b", "d", "c", "a"]);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn promotion_takes_new_timestamp() {
        let (mut store, _) = empty_store(50);
        store.upsert(ClipboardEntry::new(ClipboardContent::Text("a".into()), 1));
        store.upsert(ClipboardEntry::new(ClipboardContent::Text("a".into()), 2));
        assert_eq!(store.get(0).unwrap().captured_at, 2);
    }

    #[test]
    fn text_and_image_with_same_bytes_coexist() {
        let (mut store, _) = empty_store(50);
        store.upsert(text("abc"));
        store.upsert(ClipboardEntry::new(
            ClipboardContent::Image(b"abc".to_vec()),
            NOW,
        ));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn uniqueness_and_cap_hold_for_mixed_sequences() {
        let (mut store, _) = empty_store(5);
        // Deterministic pseudo-random sequence over a small alphabet so
        // that repeats are frequent.
        let mut x: u32 = 7;
        for _ in 0..500 {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12345);
            let key = format!("k{}", (x >> 16) % 9);
            store.upsert(text(&key));

            assert!(store.len() <= 5);
            assert_eq!(texts(&store)[0], key);
            let mut seen = std::collections::HashSet::new();
            for e in store.entries() {
                assert!(seen.insert(e.clone()), "duplicate content in history");
            }
        }
    }

    #[test]
    fn truncation_drops_only_the_rearmost() {
        let (mut store, _) = empty_store(4);
        for s in ["a", "b", "c", "d"] {
            store.upsert(text(s));
        }
        let before = texts(&store);
        store.upsert(text("e"));
        let after = texts(&store);
        assert_eq!(after[0], "e");
        assert_eq!(&after[1..], &before[..3]);
    }

    #[test]
    fn zero_limit_leaves_history_empty() {
        let (mut store, kv) = empty_store(0);
        store.upsert(text("a"));
        assert!(store.is_empty());
        assert!(persisted(&kv).is_empty());
    }

    #[test]
    fn upsert_persists_every_time() {
        let (mut store, kv) = empty_store(50);
        store.upsert(text("a"));
        store.upsert(text("b"));
        assert_eq!(kv.writes(), 2);
        let saved = persisted(&kv);
        assert_eq!(saved, vec![text("b"), text("a")]);
    }

    #[test]
    fn limit_change_applies_on_next_upsert_only() {
        let kv = Arc::new(MemoryStore::new());
        let (tx, rx) = watch::channel(HistoryConfig {
            history_limit: 10,
            expiration: ExpirationPolicy::Never,
            ..HistoryConfig::default()
        });
        let mut store = HistoryStore::load_at(kv, rx, NOW);
        for s in ["a", "b", "c", "d", "e"] {
            store.upsert(text(s));
        }

        tx.send_modify(|c| c.history_limit = 2);
        // Not retroactive.
        assert_eq!(store.len(), 5);

        store.upsert(text("f"));
        assert_eq!(texts(&store), ["f", "e"]);
    }

    // -- Delete / Clear --

    #[test]
    fn delete_removes_matching_content() {
        let (mut store, kv) = empty_store(50);
        store.upsert(text("a"));
        store.upsert(text("b"));
        assert!(store.delete(&ClipboardEntry::new(
            ClipboardContent::Text("a".into()),
            0
        )));
        assert_eq!(texts(&store), ["b"]);
        assert_eq!(persisted(&kv), vec![text("b")]);
    }

    #[test]
    fn delete_absent_is_noop() {
        let (mut store, kv) = empty_store(50);
        store.upsert(text("a"));
        let writes = kv.writes();
        assert!(!store.delete(&text("zzz")));
        assert_eq!(texts(&store), ["a"]);
        assert_eq!(kv.writes(), writes);
    }

    #[test]
    fn clear_empties_memory_and_snapshot() {
        let (mut store, kv) = empty_store(50);
        for s in ["a", "b", "c", "d", "e"] {
            store.upsert(text(s));
        }
        assert_eq!(store.len(), 5);
        store.clear();
        assert!(store.is_empty());
        assert!(persisted(&kv).is_empty());
    }

    #[test]
    fn clear_of_empty_history_is_noop() {
        let (mut store, kv) = empty_store(50);
        let mut rx = store.subscribe();
        rx.borrow_and_update();
        let writes = kv.writes();

        store.clear();
        assert_eq!(kv.writes(), writes);
        assert!(!rx.has_changed().unwrap());
    }

    // -- Persistence failures --

    #[test]
    fn write_failure_keeps_memory_authoritative() {
        let (mut store, kv) = empty_store(50);
        store.upsert(text("a"));
        kv.set_fail_writes(true);
        store.upsert(text("b"));
        assert_eq!(texts(&store), ["b", "a"]);
        // Last good snapshot is still the one before the failure.
        assert_eq!(persisted(&kv), vec![text("a")]);

        kv.set_fail_writes(false);
        store.upsert(text("c"));
        assert_eq!(persisted(&kv), vec![text("c"), text("b"), text("a")]);
    }

    // -- Load --

    fn seeded(entries: &[ClipboardEntry]) -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_value(
            HISTORY_KEY,
            snapshot::encode(entries).unwrap(),
        ))
    }

    fn expiring(window: Duration, limit: usize) -> watch::Receiver<HistoryConfig> {
        watch::channel(HistoryConfig {
            history_limit: limit,
            expiration: ExpirationPolicy::OlderThan(window),
            ..HistoryConfig::default()
        })
        .1
    }

    #[test]
    fn load_restores_order() {
        let kv = seeded(&[text("c"), text("b"), text("a")]);
        let store = HistoryStore::load_at(kv, config(50), NOW);
        assert_eq!(texts(&store), ["c", "b", "a"]);
    }

    #[test]
    fn load_drops_entries_past_expiration() {
        let old = ClipboardEntry::new(ClipboardContent::Text("old".into()), NOW - 2 * HOUR_MS);
        let kv = seeded(&[old]);
        let store = HistoryStore::load_at(kv, expiring(Duration::from_secs(3600), 50), NOW);
        assert!(store.is_empty());
    }

    #[test]
    fn load_keeps_fresh_and_boundary_entries() {
        let fresh = ClipboardEntry::new(ClipboardContent::Text("fresh".into()), NOW - 10);
        let boundary = ClipboardEntry::new(ClipboardContent::Text("edge".into()), NOW - HOUR_MS);
        let stale = ClipboardEntry::new(ClipboardContent::Text("stale".into()), NOW - HOUR_MS - 1);
        let kv = seeded(&[fresh, boundary, stale]);
        let store = HistoryStore::load_at(kv, expiring(Duration::from_secs(3600), 50), NOW);
        assert_eq!(texts(&store), ["fresh", "edge"]);
    }

    #[test]
    fn never_policy_keeps_ancient_entries() {
        let ancient = ClipboardEntry::new(ClipboardContent::Text("ancient".into()), 1);
        let kv = seeded(&[ancient]);
        let store = HistoryStore::load_at(kv, config(50), NOW);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn load_caps_after_expiring() {
        let entries: Vec<ClipboardEntry> = (0..6)
            .map(|i| {
                ClipboardEntry::new(ClipboardContent::Text(format!("e{i}")), NOW - i * HOUR_MS)
            })
            .collect();
        let kv = seeded(&entries);
        // Window keeps e0..e3 (0-3 hours old); cap keeps the newest two.
        let store = HistoryStore::load_at(kv, expiring(Duration::from_secs(3 * 3600), 2), NOW);
        assert_eq!(texts(&store), ["e0", "e1"]);
    }

    #[test]
    fn load_is_idempotent_without_mutation() {
        let entries = vec![
            ClipboardEntry::new(ClipboardContent::Text("new".into()), NOW - 1000),
            ClipboardEntry::new(ClipboardContent::Text("old".into()), NOW - 5 * HOUR_MS),
        ];
        let kv = seeded(&entries);
        let first = HistoryStore::load_at(kv.clone(), expiring(Duration::from_secs(3600), 50), NOW);
        let second = HistoryStore::load_at(kv.clone(), expiring(Duration::from_secs(3600), 50), NOW);
        assert_eq!(texts(&first), texts(&second));
        assert_eq!(texts(&first), ["new"]);
        assert_eq!(kv.writes(), 0, "load must not write");
    }

    #[test]
    fn load_collapses_duplicate_content() {
        let kv = seeded(&[
            ClipboardEntry::new(ClipboardContent::Text("x".into()), NOW),
            text("y"),
            ClipboardEntry::new(ClipboardContent::Text("x".into()), NOW - 5),
        ]);
        let store = HistoryStore::load_at(kv, config(50), NOW);
        assert_eq!(texts(&store), ["x", "y"]);
        assert_eq!(store.get(0).unwrap().captured_at, NOW);
    }

    #[test]
    fn malformed_snapshot_loads_empty() {
        let kv = Arc::new(MemoryStore::with_value(HISTORY_KEY, b"\x00garbage\xff".to_vec()));
        let store = HistoryStore::load_at(kv, config(50), NOW);
        assert!(store.is_empty());
    }

    #[test]
    fn absent_snapshot_loads_empty() {
        let (store, kv) = empty_store(50);
        assert!(store.is_empty());
        assert_eq!(kv.writes(), 0);
    }

    #[test]
    fn load_from_file_store_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let kv: Arc<dyn KeyValueStore> =
            Arc::new(crate::storage::FileStore::open(dir.path()).unwrap());
        {
            let mut store = HistoryStore::load_at(kv.clone(), config(50), NOW);
            store.upsert(text("persisted"));
            store.upsert(ClipboardEntry::new(
                ClipboardContent::Image(vec![0x89, b'P', b'N', b'G']),
                NOW,
            ));
        }
        let store = HistoryStore::load_at(kv, config(50), NOW);
        assert_eq!(store.len(), 2);
        assert_eq!(texts(&store), ["<image 4>", "persisted"]);
    }

    // -- Observers --

    #[test]
    fn subscribers_see_each_mutation() {
        let (mut store, _) = empty_store(50);
        let mut rx = store.subscribe();
        assert!(rx.borrow_and_update().is_empty());

        store.upsert(text("a"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);

        store.clear();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_empty());
    }

    #[test]
    fn absent_delete_does_not_notify() {
        let (mut store, _) = empty_store(50);
        store.upsert(text("a"));
        let mut rx = store.subscribe();
        rx.borrow_and_update();
        store.delete(&text("missing"));
        assert!(!rx.has_changed().unwrap());
    }
}
