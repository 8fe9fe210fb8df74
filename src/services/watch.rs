//! Polling watch signatures.
//!
//! The scheduler compares these hashes every few idle ticks; nothing here
//! registers for filesystem events.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::services::Watch;

pub struct PollingWatch {
    git_dir: Option<PathBuf>,
}

impl PollingWatch {
    pub fn new(git_dir: Option<&Path>) -> Self {
        Self {
            git_dir: git_dir.map(Path::to_path_buf),
        }
    }
}

fn mtime_ns(meta: &fs::Metadata) -> u128 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

fn hash_listing(dir: &Path, hasher: &mut DefaultHasher) {
    dir.hash(hasher);
    let Ok(read) = fs::read_dir(dir) else {
        "<unreadable>".hash(hasher);
        return;
    };
    let mut entries: Vec<(String, bool, u128, u64)> = read
        .filter_map(|e| e.ok())
        .map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            match e.metadata() {
                Ok(meta) => (name, meta.is_dir(), mtime_ns(&meta), meta.len()),
                Err(_) => (name, false, 0, 0),
            }
        })
        .collect();
    entries.sort();
    entries.hash(hasher);
}

impl Watch for PollingWatch {
    fn tree_signature(&self, watched: &[PathBuf]) -> u64 {
        let mut hasher = DefaultHasher::new();
        for dir in watched {
            hash_listing(dir, &mut hasher);
        }
        hasher.finish()
    }

    fn vcs_signature(&self) -> u64 {
        let Some(git_dir) = &self.git_dir else {
            return 0;
        };
        let mut hasher = DefaultHasher::new();
        for name in ["HEAD", "index"] {
            match fs::metadata(git_dir.join(name)) {
                Ok(meta) => (name, mtime_ns(&meta), meta.len()).hash(&mut hasher),
                Err(_) => (name, 0u128, 0u64).hash(&mut hasher),
            }
        }
        hasher.finish()
    }
}
