//! Persisted last-pull timestamps for the checker image.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use stylewatch_utils::{atomic_write, recover_bak_file};

/// Key-value store of `cache key -> last successful pull`.
pub trait FreshnessStore: Send + Sync {
    fn last_pull(&self, key: &str) -> Option<SystemTime>;
    fn record_pull(&self, key: &str, at: SystemTime) -> io::Result<()>;
    fn forget(&self, key: &str) -> io::Result<()>;
}

fn to_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// `None` when the platform's `SystemTime` cannot represent `millis`.
fn from_millis(millis: u64) -> Option<SystemTime> {
    UNIX_EPOCH.checked_add(Duration::from_millis(millis))
}

/// Timestamps stored as a JSON object of unix milliseconds.
///
/// ```json
/// { "lastImagePull": 1760780000000 }
/// ```
#[derive(Debug)]
pub struct JsonFreshnessStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFreshnessStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> BTreeMap<String, u64> {
        recover_bak_file(&self.path);
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Failed to read state file: {e}");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), "Ignoring corrupt state file: {e}");
            BTreeMap::new()
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, u64>) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(entries).map_err(io::Error::other)?;
        atomic_write(&self.path, &json)
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, u64>)) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries();
        apply(&mut entries);
        self.write_entries(&entries)
    }
}

impl FreshnessStore for JsonFreshnessStore {
    fn last_pull(&self, key: &str) -> Option<SystemTime> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_entries().get(key).copied().and_then(from_millis)
    }

    fn record_pull(&self, key: &str, at: SystemTime) -> io::Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), to_millis(at));
        })
    }

    fn forget(&self, key: &str) -> io::Result<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

/// Process-lifetime store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryFreshnessStore {
    entries: Mutex<HashMap<String, SystemTime>>,
}

impl MemoryFreshnessStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FreshnessStore for MemoryFreshnessStore {
    fn last_pull(&self, key: &str) -> Option<SystemTime> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }

    fn record_pull(&self, key: &str, at: SystemTime) -> io::Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), at);
        Ok(())
    }

    fn forget(&self, key: &str) -> io::Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(millis)
    }

    #[test]
    fn json_store_round_trips_millis() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFreshnessStore::new(dir.path().join("state.json"));
        assert!(store.last_pull("lastImagePull").is_none());

        let stamp = at(1_760_780_000_123);
        store.record_pull("lastImagePull", stamp).unwrap();
        assert_eq!(store.last_pull("lastImagePull"), Some(stamp));

        let reopened = JsonFreshnessStore::new(dir.path().join("state.json"));
        assert_eq!(reopened.last_pull("lastImagePull"), Some(stamp));
    }

    #[test]
    fn json_store_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFreshnessStore::new(dir.path().join("state.json"));
        store.record_pull("a", at(1)).unwrap();
        store.record_pull("b", at(2)).unwrap();
        store.forget("a").unwrap();
        assert!(store.last_pull("a").is_none());
        assert_eq!(store.last_pull("b"), Some(at(2)));
    }

    #[test]
    fn corrupt_state_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        let store = JsonFreshnessStore::new(&path);
        assert!(store.last_pull("lastImagePull").is_none());

        store.record_pull("lastImagePull", at(5)).unwrap();
        assert_eq!(store.last_pull("lastImagePull"), Some(at(5)));
    }

    #[test]
    fn state_file_is_plain_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        JsonFreshnessStore::new(&path)
            .record_pull("lastImagePull", at(42))
            .unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({ "lastImagePull": 42 }));
    }

    #[test]
    fn unrepresentable_timestamp_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, format!("{{\"lastImagePull\": {}}}", u64::MAX)).unwrap();

        let store = JsonFreshnessStore::new(&path);
        let expected = UNIX_EPOCH.checked_add(Duration::from_millis(u64::MAX));
        assert_eq!(store.last_pull("lastImagePull"), expected);
        assert_eq!(from_millis(u64::MAX), expected);
        assert_eq!(from_millis(42), Some(at(42)));
    }

    #[test]
    fn memory_store() {
        let store = MemoryFreshnessStore::new();
        let now = SystemTime::now();
        store.record_pull("k", now).unwrap();
        assert_eq!(store.last_pull("k"), Some(now));
        store.forget("k").unwrap();
        assert!(store.last_pull("k").is_none());
    }
}
