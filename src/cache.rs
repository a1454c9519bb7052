//! Per-file incremental cache keyed by path, validated by content digest and modification time.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::types::StaleCommentItem;

const SNAPSHOT_VERSION: u32 = 1;

/// Hex blake3 digest of file contents.
pub fn content_digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Scored items for one file, valid while `digest` and `mtime` still match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub digest: String,
    pub mtime: DateTime<Utc>,
    pub items: Vec<StaleCommentItem>,
}

impl CacheEntry {
    pub fn new(digest: String, mtime: DateTime<Utc>, items: Vec<StaleCommentItem>) -> Self {
        Self {
            digest,
            mtime,
            items,
        }
    }

    /// An entry is usable only if its digest looks like one and every item belongs to `path`.
    fn is_well_formed(&self, path: &Path) -> bool {
        self.digest.len() == 64
            && self.digest.bytes().all(|b| b.is_ascii_hexdigit())
            && self.items.iter().all(|item| item.file_path == path)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    path: PathBuf,
    #[serde(flatten)]
    entry: CacheEntry,
}

/// Bounded map from file path to [`CacheEntry`], least recently used entries evicted first.
///
/// Entries are stored behind `Arc` and swapped whole, so readers never see a partially
/// written entry.
#[derive(Debug)]
pub struct IncrementalCache {
    entries: Mutex<LruCache<PathBuf, Arc<CacheEntry>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for IncrementalCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl IncrementalCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached entry when both digest and modification time match.
    ///
    /// Stale or malformed entries count as a miss; malformed ones are evicted.
    pub fn lookup(&self, path: &Path, digest: &str, mtime: DateTime<Utc>) -> Option<Arc<CacheEntry>> {
        let mut entries = self.entries.lock();
        let found = match entries.get(path).map(Arc::clone) {
            Some(entry) if !entry.is_well_formed(path) => {
                warn!(path = %path.display(), "discarding malformed cache entry");
                entries.pop(path);
                None
            }
            Some(entry) if entry.digest == digest && entry.mtime == mtime => Some(entry),
            _ => None,
        };
        drop(entries);

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Replace the entry for `path` in a single step.
    pub fn store(&self, path: PathBuf, entry: CacheEntry) {
        if let Some((evicted, _)) = self.entries.lock().push(path.clone(), Arc::new(entry)) {
            if evicted != path {
                debug!(path = %evicted.display(), "evicted least recently used cache entry");
            }
        }
    }

    pub fn invalidate(&self, path: &Path) -> bool {
        self.entries.lock().pop(path).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            entries: entries.len(),
            capacity: entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Write every entry to `path` as JSON, via a temporary file renamed into place.
    pub fn save_snapshot(&self, path: &Path) -> Result<usize, CacheError> {
        let entries: Vec<serde_json::Value> = {
            let guard = self.entries.lock();
            guard
                .iter()
                .map(|(key, entry)| {
                    serde_json::to_value(SnapshotEntry {
                        path: key.clone(),
                        entry: entry.as_ref().clone(),
                    })
                })
                .collect::<Result<_, _>>()?
        };
        let count = entries.len();
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            entries,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(&snapshot)?)?;
        std::fs::rename(&tmp, path)?;

        info!(path = %path.display(), entries = count, "saved cache snapshot");
        Ok(count)
    }

    /// Load entries from a snapshot written by [`Self::save_snapshot`].
    ///
    /// A missing file loads nothing. Individual entries that fail to decode or are malformed
    /// are skipped, so they behave as misses on the next scan.
    pub fn load_snapshot(&self, path: &Path) -> Result<usize, CacheError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| CacheError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CacheError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("unsupported snapshot version {}", snapshot.version),
            });
        }

        let mut loaded = 0;
        let mut skipped = 0;
        for value in snapshot.entries {
            match serde_json::from_value::<SnapshotEntry>(value) {
                Ok(SnapshotEntry { path, entry }) if entry.is_well_formed(&path) => {
                    self.store(path, entry);
                    loaded += 1;
                }
                Ok(_) | Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(path = %path.display(), skipped, "dropped corrupt cache snapshot entries");
        }
        debug!(path = %path.display(), loaded, "loaded cache snapshot");
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemId, Status, TextRange};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn mtime() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn item(path: &str) -> StaleCommentItem {
        let range = TextRange::lines(0, 0, 0, 10);
        StaleCommentItem {
            id: ItemId::compute(Path::new(path), &range, "// old"),
            file_path: PathBuf::from(path),
            range,
            original_comment_text: "// old".into(),
            surrounding_code: "fn f() {}".into(),
            score: 60.0,
            reasons: Vec::new(),
            language_id: "rust".into(),
            status: Status::Detected,
            regenerated_text: None,
            last_modified: mtime(),
        }
    }

    fn entry(path: &str, contents: &str) -> CacheEntry {
        CacheEntry::new(content_digest(contents.as_bytes()), mtime(), vec![item(path)])
    }

    #[test]
    fn test_hit_requires_matching_digest_and_mtime() {
        let cache = IncrementalCache::new(8);
        let path = PathBuf::from("src/a.rs");
        cache.store(path.clone(), entry("src/a.rs", "v1"));

        let digest = content_digest(b"v1");
        assert!(cache.lookup(&path, &digest, mtime()).is_some());
        assert!(cache.lookup(&path, &content_digest(b"v2"), mtime()).is_none());
        let later = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        assert!(cache.lookup(&path, &digest, later).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn test_identical_content_at_two_paths_is_independent() {
        let cache = IncrementalCache::new(8);
        cache.store(PathBuf::from("a.rs"), entry("a.rs", "same"));
        cache.store(PathBuf::from("b.rs"), entry("b.rs", "same"));
        assert_eq!(cache.len(), 2);

        cache.invalidate(Path::new("a.rs"));
        let digest = content_digest(b"same");
        assert!(cache.lookup(Path::new("a.rs"), &digest, mtime()).is_none());
        assert!(cache.lookup(Path::new("b.rs"), &digest, mtime()).is_some());
    }

    #[test]
    fn test_malformed_entry_is_a_miss() {
        let cache = IncrementalCache::new(8);
        // Items that belong to a different file
        cache.store(PathBuf::from("a.rs"), entry("other.rs", "x"));
        assert!(cache.lookup(Path::new("a.rs"), &content_digest(b"x"), mtime()).is_none());
        assert!(!cache.contains(Path::new("a.rs")));
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let cache = IncrementalCache::new(2);
        cache.store(PathBuf::from("a.rs"), entry("a.rs", "a"));
        cache.store(PathBuf::from("b.rs"), entry("b.rs", "b"));
        cache.lookup(Path::new("a.rs"), &content_digest(b"a"), mtime());
        cache.store(PathBuf::from("c.rs"), entry("c.rs", "c"));

        assert!(cache.contains(Path::new("a.rs")));
        assert!(!cache.contains(Path::new("b.rs")));
        assert!(cache.contains(Path::new("c.rs")));
    }

    #[test]
    fn test_snapshot_round_trip_drops_corrupt_entries() {
        let dir = TempDir::new().unwrap();
        let snapshot_path = dir.path().join("cache.json");

        let cache = IncrementalCache::new(8);
        cache.store(PathBuf::from("a.rs"), entry("a.rs", "a"));
        assert_eq!(cache.save_snapshot(&snapshot_path).unwrap(), 1);

        // Append a bogus entry by hand
        let mut raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&snapshot_path).unwrap()).unwrap();
        raw["entries"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({ "path": "b.rs", "digest": 7 }));
        std::fs::write(&snapshot_path, serde_json::to_vec(&raw).unwrap()).unwrap();

        let restored = IncrementalCache::new(8);
        assert_eq!(restored.load_snapshot(&snapshot_path).unwrap(), 1);
        assert!(restored
            .lookup(Path::new("a.rs"), &content_digest(b"a"), mtime())
            .is_some());
        assert!(!restored.contains(Path::new("b.rs")));
    }

    #[test]
    fn test_missing_snapshot_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let cache = IncrementalCache::default();
        assert_eq!(cache.load_snapshot(&dir.path().join("absent.json")).unwrap(), 0);
    }

    #[test]
    fn test_unreadable_snapshot_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            IncrementalCache::default().load_snapshot(&path),
            Err(CacheError::Corrupt { .. })
        ));
    }
}
