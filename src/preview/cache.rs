//! Bounded LRU caches for the expensive preview paths.
//!
//! Keys carry every input that affects the cached value, so a changed file,
//! option or repository state is always a miss. Directory listings also
//! keep the mtime of each directory they read and are rebuilt when one
//! moves.

use std::fs::Metadata;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use lru::LruCache;
use tracing::trace;

use crate::preview::PreviewOptions;

pub const DEFAULT_CAPACITY: usize = 128;

/// Identity of a file's content as far as the filesystem reports it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileSignature {
    pub path: PathBuf,
    /// Modification time in nanoseconds since the epoch, 0 when unknown.
    pub mtime_ns: u128,
    pub size: u64,
}

/// Modification time in nanoseconds since the epoch, 0 when unknown.
pub fn mtime_ns(meta: &Metadata) -> u128 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

impl FileSignature {
    pub fn of(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            mtime_ns: mtime_ns(&meta),
            size: meta.len(),
        })
    }
}

/// Composite key for directory, diff and scope entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    pub file: FileSignature,
    pub options: PreviewOptions,
    /// Repository state for diff and badge dependent entries.
    pub vcs_signature: u64,
    /// Listing state of the watched directories, for directory entries.
    pub tree_signature: u64,
}

/// Strict least-recently-used store with hit/miss counters.
pub struct PreviewCache<K: Hash + Eq, V: Clone> {
    name: &'static str,
    inner: LruCache<K, V>,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq, V: Clone> PreviewCache<K, V> {
    /// A capacity of 0 falls back to [`DEFAULT_CAPACITY`].
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = if capacity == 0 { DEFAULT_CAPACITY } else { capacity };
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            inner: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Cloned value for `key`; a hit refreshes its recency.
    pub fn get(&mut self, key: &K) -> Option<V> {
        match self.inner.get(key) {
            Some(value) => {
                self.hits += 1;
                trace!(cache = self.name, hits = self.hits, "hit");
                Some(value.clone())
            }
            None => {
                self.misses += 1;
                trace!(cache = self.name, misses = self.misses, "miss");
                None
            }
        }
    }

    /// Insert, evicting the least recently used entry when full.
    pub fn put(&mut self, key: K, value: V) {
        if self.inner.len() == self.capacity() && !self.inner.contains(&key) {
            trace!(cache = self.name, "evict");
        }
        self.inner.put(key, value);
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        trace!(cache = self.name, "remove");
        self.inner.pop(key)
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn zero_capacity_uses_default() {
        let cache: PreviewCache<u32, u32> = PreviewCache::new("t", 0);
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn eviction_keeps_most_recent() {
        let mut cache = PreviewCache::new("t", 3);
        for k in 0..4 {
            cache.put(k, k * 10);
        }
        assert_eq!(cache.inner.len(), 3);
        assert_eq!(cache.get(&0), None);
        for k in 1..4 {
            assert_eq!(cache.get(&k), Some(k * 10));
        }
    }

    #[test]
    fn hit_refreshes_recency() {
        let mut cache = PreviewCache::new("t", 2);
        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.put("c", 3);
        assert!(cache.inner.contains(&"a"));
        assert!(!cache.inner.contains(&"b"));
        assert_eq!((cache.hits, cache.misses), (1, 0));
    }

    #[test]
    fn reinserting_same_key_replaces_value() {
        let mut cache = PreviewCache::new("t", 2);
        cache.put(1, "old");
        cache.put(1, "new");
        assert_eq!(cache.inner.len(), 1);
        assert_eq!(cache.get(&1), Some("new"));
    }

    #[test]
    fn size_change_changes_signature() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.txt");
        fs::write(&path, "abc").unwrap();
        let before = FileSignature::of(&path).unwrap();
        fs::write(&path, "abcdef").unwrap();
        let after = FileSignature::of(&path).unwrap();
        assert_ne!(before, after);
        assert_eq!(after.size, 6);
    }

    #[test]
    fn option_flags_are_part_of_the_key() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.txt");
        fs::write(&path, "abc").unwrap();
        let file = FileSignature::of(&path).unwrap();
        let key = |options: PreviewOptions| DocumentKey {
            file: file.clone(),
            options,
            vcs_signature: 0,
            tree_signature: 0,
        };
        let mut cache = PreviewCache::new("t", 4);
        cache.put(key(PreviewOptions::default()), 1);
        let nocolor = PreviewOptions {
            colorize: false,
            ..PreviewOptions::default()
        };
        assert_eq!(cache.get(&key(nocolor)), None);
        assert_eq!(cache.get(&key(PreviewOptions::default())), Some(1));
    }

    #[test]
    fn missing_file_has_no_signature() {
        assert!(FileSignature::of(Path::new("/definitely/not/here")).is_err());
    }
}
