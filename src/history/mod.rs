//! Bounded, persisted history of generated prompts.
//!
//! The in-memory list is newest-first and never longer than the cache's
//! capacity. Every mutation writes the complete list back to the store in a
//! single `save`, so the stored value is always a full snapshot. Storage
//! trouble is logged and otherwise ignored: a corrupt value loads as an empty
//! history, and a failed write leaves the in-memory list authoritative for
//! the rest of the session.

mod entry;

pub use self::entry::{EntryId, HistoryEntry, IdGenerator};

use std::collections::HashSet;

use chrono::{SecondsFormat, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::service::models::GenerationResult;
use crate::storage::{HistoryStore, StoreError};

/// Default number of entries kept.
pub const HISTORY_CAPACITY: usize = 20;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to encode history: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to persist history: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
enum SnapshotError {
    #[error("not a history array: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate entry id {0}")]
    DuplicateId(EntryId),

    #[error("entry id {0} out of range")]
    IdOutOfRange(EntryId),
}

pub struct HistoryCache {
    entries: Vec<HistoryEntry>,
    capacity: usize,
    store: Box<dyn HistoryStore>,
    ids: IdGenerator,
    durable: bool,
}

impl HistoryCache {
    /// Load whatever the store holds. Never fails: a missing, unreadable or
    /// malformed value yields an empty history.
    pub fn initialize(store: Box<dyn HistoryStore>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut cache = Self {
            entries: Vec::new(),
            capacity,
            store,
            ids: IdGenerator::default(),
            durable: true,
        };

        let raw = match cache.store.load() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("no stored history, starting empty");
                return cache;
            }
            Err(e) => {
                warn!(error = %e, "could not read stored history, starting empty");
                return cache;
            }
        };

        match parse_snapshot(&raw) {
            Ok(mut entries) => {
                let oversized = entries.len() > capacity;
                if oversized {
                    warn!(
                        stored = entries.len(),
                        capacity, "stored history over capacity, dropping oldest"
                    );
                    entries.truncate(capacity);
                }
                cache.ids = IdGenerator::after(entries.iter().map(|e| e.id).max());
                cache.entries = entries;
                if oversized {
                    cache.persist_logged();
                }
                info!(entries = cache.entries.len(), "loaded history");
            }
            Err(e) => {
                warn!(error = %e, bytes = raw.len(), "discarding malformed stored history");
                cache.persist_logged();
            }
        }

        cache
    }

    /// Add a new entry at the front, evict past capacity, persist.
    pub fn record(&mut self, prompt: &str, result: GenerationResult) -> HistoryEntry {
        let now = Utc::now();
        let entry = HistoryEntry {
            id: self.ids.next_at(now.timestamp_millis()),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            prompt: prompt.to_string(),
            result,
        };

        self.entries.insert(0, entry.clone());
        if self.entries.len() > self.capacity {
            let evicted = self.entries.len() - self.capacity;
            self.entries.truncate(self.capacity);
            debug!(evicted, "evicted oldest history entries");
        }

        debug!(id = %entry.id, "recorded history entry");
        self.persist_logged();
        entry
    }

    /// Drop the entry with `id`. Returns whether anything was removed;
    /// an unknown id changes nothing and writes nothing.
    pub fn remove(&mut self, id: EntryId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        if self.entries.len() == before {
            debug!(%id, "remove: no such history entry");
            return false;
        }

        debug!(%id, "removed history entry");
        self.persist_logged();
        true
    }

    /// Newest first.
    pub fn list(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// False while the last write to the store has failed.
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// Write the current snapshot again and report the outcome.
    pub fn flush(&mut self) -> Result<(), HistoryError> {
        let result = self.persist();
        self.durable = result.is_ok();
        result
    }

    fn persist(&mut self) -> Result<(), HistoryError> {
        let snapshot = serde_json::to_string(&self.entries)?;
        self.store.save(&snapshot)?;
        Ok(())
    }

    fn persist_logged(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "history kept in memory only");
        }
    }
}

fn parse_snapshot(raw: &str) -> Result<Vec<HistoryEntry>, SnapshotError> {
    let entries: Vec<HistoryEntry> = serde_json::from_str(raw)?;
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in &entries {
        if !entry.id.is_plausible() {
            return Err(SnapshotError::IdOutOfRange(entry.id));
        }
        if !seen.insert(entry.id) {
            return Err(SnapshotError::DuplicateId(entry.id));
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn result(tag: &str) -> GenerationResult {
        GenerationResult {
            original_prompt: tag.to_string(),
            enhanced_prompt: format!("enhanced {}", tag),
            intent: "general".to_string(),
            ..Default::default()
        }
    }

    fn cache_on(store: &MemoryStore) -> HistoryCache {
        HistoryCache::initialize(Box::new(store.clone()), HISTORY_CAPACITY)
    }

    #[test]
    fn test_initialize_absent_is_empty() {
        let store = MemoryStore::new();
        let cache = cache_on(&store);
        assert!(cache.is_empty());
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_record_prepends_and_persists() {
        let store = MemoryStore::new();
        let mut cache = cache_on(&store);

        cache.record("first", result("first"));
        let second = cache.record("second", result("second"));

        assert_eq!(cache.list()[0], second);
        assert_eq!(cache.list()[1].prompt, "first");
        assert!(cache.list()[0].id > cache.list()[1].id);

        let stored: Vec<HistoryEntry> = serde_json::from_str(&store.value().unwrap()).unwrap();
        assert_eq!(stored, cache.list());
    }

    #[test]
    fn test_capacity_keeps_newest() {
        let store = MemoryStore::new();
        let mut cache = cache_on(&store);

        for i in 0..25 {
            cache.record(&format!("p{}", i), result("x"));
            assert!(cache.len() <= HISTORY_CAPACITY);
        }

        assert_eq!(cache.len(), HISTORY_CAPACITY);
        assert_eq!(cache.list()[0].prompt, "p24");
        assert_eq!(cache.list()[HISTORY_CAPACITY - 1].prompt, "p5");

        let stored: Vec<HistoryEntry> = serde_json::from_str(&store.value().unwrap()).unwrap();
        assert_eq!(stored.len(), HISTORY_CAPACITY);
    }

    #[test]
    fn test_ids_unique_under_burst() {
        let store = MemoryStore::new();
        let mut cache = cache_on(&store);
        for i in 0..HISTORY_CAPACITY {
            cache.record(&i.to_string(), result("x"));
        }
        let ids: HashSet<EntryId> = cache.list().iter().map(|e| e.id).collect();
        assert_eq!(ids.len(), HISTORY_CAPACITY);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let store = MemoryStore::new();
        let mut cache = cache_on(&store);
        cache.record("a", result("a"));
        let before = cache.list().to_vec();
        let writes = store.writes();

        assert!(!cache.remove(EntryId(-1)));
        assert_eq!(cache.list(), before.as_slice());
        assert_eq!(store.writes(), writes);
    }

    #[test]
    fn test_remove_persists() {
        let store = MemoryStore::new();
        let mut cache = cache_on(&store);
        let a = cache.record("a", result("a"));
        cache.record("b", result("b"));

        assert!(cache.remove(a.id));
        assert!(cache.get(a.id).is_none());

        let stored: Vec<HistoryEntry> = serde_json::from_str(&store.value().unwrap()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].prompt, "b");
    }

    #[test]
    fn test_round_trip_through_store() {
        let store = MemoryStore::new();
        let mut cache = cache_on(&store);
        for p in ["one", "two", "three"] {
            cache.record(p, result(p));
        }

        let reloaded = cache_on(&store);
        assert_eq!(reloaded.list(), cache.list());
    }

    #[test]
    fn test_reloaded_ids_continue_past_stored() {
        let store = MemoryStore::new();
        let mut cache = cache_on(&store);
        let old = cache.record("old", result("old"));

        let mut reloaded = cache_on(&store);
        let new = reloaded.record("new", result("new"));
        assert!(new.id > old.id);
    }

    #[test]
    fn test_non_json_resets_to_empty() {
        let store = MemoryStore::with_value("{not json");
        let cache = cache_on(&store);
        assert!(cache.is_empty());
        assert_eq!(store.value().as_deref(), Some("[]"));
    }

    #[test]
    fn test_schema_mismatch_resets_to_empty() {
        let store = MemoryStore::with_value(r#"[{"id": "x", "prompt": 3}]"#);
        assert!(cache_on(&store).is_empty());

        let store = MemoryStore::with_value(r#"{"entries": []}"#);
        assert!(cache_on(&store).is_empty());
    }

    #[test]
    fn test_duplicate_ids_treated_as_corrupt() {
        let entry = HistoryEntry {
            id: EntryId(7),
            timestamp: "2026-10-16T08:00:00.000Z".to_string(),
            prompt: "dup".to_string(),
            result: result("dup"),
        };
        let raw = serde_json::to_string(&vec![entry.clone(), entry]).unwrap();
        let store = MemoryStore::with_value(raw);
        assert!(cache_on(&store).is_empty());
    }

    #[test]
    fn test_oversized_store_truncated_on_load() {
        let entries: Vec<HistoryEntry> = (0..30)
            .map(|i| HistoryEntry {
                id: EntryId(100 - i),
                timestamp: "2026-10-16T08:00:00.000Z".to_string(),
                prompt: format!("p{}", i),
                result: result("x"),
            })
            .collect();
        let store = MemoryStore::with_value(serde_json::to_string(&entries).unwrap());

        let cache = cache_on(&store);
        assert_eq!(cache.len(), HISTORY_CAPACITY);
        assert_eq!(cache.list()[0].prompt, "p0");

        let stored: Vec<HistoryEntry> = serde_json::from_str(&store.value().unwrap()).unwrap();
        assert_eq!(stored, cache.list());
    }

    #[test]
    fn test_within_capacity_load_does_not_write() {
        let store = MemoryStore::new();
        cache_on(&store).record("a", result("a"));
        let writes = store.writes();

        cache_on(&store);
        assert_eq!(store.writes(), writes);
    }

    #[test]
    fn test_out_of_range_id_resets_and_records() {
        for id in [i64::MAX, -5] {
            let raw = format!(
                r#"[{{"id":{},"timestamp":"2026-10-16T08:00:00.000Z","prompt":"p","result":{{}}}}]"#,
                id
            );
            let store = MemoryStore::with_value(raw);
            let mut cache = cache_on(&store);
            assert!(cache.is_empty());

            let entry = cache.record("next", result("next"));
            assert!(entry.id.is_plausible());
            assert_eq!(cache.list()[0], entry);
        }
    }

    #[test]
    fn test_partial_stored_result_still_loads() {
        let raw = r#"[{"id":1729000000000,"timestamp":"2026-10-16T08:00:00.000Z","prompt":"cat on a roof","result":{"enhanced_prompt":"A cat..."}}]"#;
        let store = MemoryStore::with_value(raw);
        let cache = cache_on(&store);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.list()[0].result.enhanced_prompt, "A cat...");
        assert!(cache.list()[0].result.intent.is_empty());
    }

    #[test]
    fn test_failed_write_keeps_memory() {
        let store = MemoryStore::new();
        let mut cache = cache_on(&store);
        store.set_fail_writes(true);

        let entry = cache.record("offline", result("offline"));
        assert_eq!(cache.list()[0], entry);
        assert!(!cache.is_durable());
        assert!(store.value().is_none());
        assert!(cache.flush().is_err());

        store.set_fail_writes(false);
        cache.flush().unwrap();
        assert!(cache.is_durable());
        let stored: Vec<HistoryEntry> = serde_json::from_str(&store.value().unwrap()).unwrap();
        assert_eq!(stored, cache.list());
    }
}
