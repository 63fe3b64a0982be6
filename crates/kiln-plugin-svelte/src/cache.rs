//! Per-build caches owned by the bridge
//!
//! - [`StylesheetCache`]: component path → the stylesheet its most recent
//!   successful compile produced. Read when the synthetic stylesheet module
//!   is loaded.
//! - [`CompileCache`]: component path → the last successful load result, reused
//!   while none of its watch files changed.
//!
//! Keys are forward-slash normalized so the synthetic path round-trips to the
//! same key on every platform.

use crate::bridge::LoadResult;
use crate::compiler::CompiledCode;
use crate::paths;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Stylesheet produced by a component compile
pub type CachedStylesheet = CompiledCode;

/// Stylesheets keyed by original component path
#[derive(Debug, Default)]
pub struct StylesheetCache {
    entries: RwLock<FxHashMap<String, CachedStylesheet>>,
}

impl StylesheetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the stylesheet for `original`, replacing any previous one
    pub fn insert(&self, original: &str, stylesheet: CachedStylesheet) {
        self.entries
            .write()
            .insert(paths::normalize(original), stylesheet);
    }

    pub fn remove(&self, original: &str) -> Option<CachedStylesheet> {
        self.entries.write().remove(&paths::normalize(original))
    }

    pub fn get(&self, original: &str) -> Option<CachedStylesheet> {
        self.entries.read().get(&paths::normalize(original)).cloned()
    }

    pub fn contains(&self, original: &str) -> bool {
        self.entries
            .read()
            .contains_key(&paths::normalize(original))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Modification time of one watched file at compile time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl Fingerprint {
    /// `None` when the file is gone or the platform has no mtimes
    pub async fn of(path: &Path) -> Option<Self> {
        let metadata = tokio::fs::metadata(path).await.ok()?;
        Some(Self {
            path: path.to_path_buf(),
            modified: metadata.modified().ok()?,
        })
    }

    async fn is_current(&self) -> bool {
        Self::of(&self.path).await.as_ref() == Some(self)
    }
}

#[derive(Debug, Clone)]
struct CompileEntry {
    fingerprints: Vec<Fingerprint>,
    result: LoadResult,
}

/// Successful load results keyed by component path
#[derive(Debug, Default)]
pub struct CompileCache {
    entries: RwLock<FxHashMap<String, CompileEntry>>,
}

impl CompileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprints every watch file of `result` and stores it.
    ///
    /// Results that cannot be fingerprinted completely are not stored, so a
    /// later load always recompiles them.
    pub async fn store(&self, path: &Path, result: &LoadResult) {
        let mut fingerprints = Vec::with_capacity(result.watch_files.len());
        for file in &result.watch_files {
            match Fingerprint::of(file).await {
                Some(fingerprint) => fingerprints.push(fingerprint),
                None => {
                    self.evict(path);
                    return;
                }
            }
        }

        self.entries.write().insert(
            key(path),
            CompileEntry {
                fingerprints,
                result: result.clone(),
            },
        );
    }

    /// Returns the stored result if none of its watch files changed
    pub async fn get_fresh(&self, path: &Path) -> Option<LoadResult> {
        let entry = self.entries.read().get(&key(path)).cloned()?;
        for fingerprint in &entry.fingerprints {
            if !fingerprint.is_current().await {
                tracing::debug!(
                    path = %path.display(),
                    changed = %fingerprint.path.display(),
                    "compile cache entry is stale"
                );
                return None;
            }
        }
        Some(entry.result)
    }

    pub fn evict(&self, path: &Path) {
        self.entries.write().remove(&key(path));
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn key(path: &Path) -> String {
    paths::normalize(&path.to_string_lossy())
}
