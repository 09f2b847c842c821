//! On-disk cache of per-file facts, keyed by `(path, mtime)`.
//!
//! Each entry is one JSON file named by the SHA-256 of the path, the
//! modification time and a fingerprint of the extractor configuration. The
//! directory loader passes absolute paths, so two projects with the same
//! relative layout never share entries.
//!
//! - **Read-through / write-through**: [`FactsCache::get_or_extract`] returns
//!   a stored entry or runs the extractor and stores its result
//! - **No in-place merge**: a changed mtime produces a different key, so a
//!   fresh entry is always written next to the stale one
//! - **Self-healing**: entries that fail to parse, carry another schema
//!   version or belong to another path are treated as misses
//! - **Atomic writes**: temp file plus rename, safe under concurrent writers

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{ModernizeError, ModernizeResult};
use crate::facts::{UnitFacts, FACTS_SCHEMA_VERSION};

/// Directory name used when the caller does not choose one.
pub const DEFAULT_CACHE_DIR: &str = ".modernize-cache";

const ENTRY_EXTENSION: &str = "json";

/// SHA-256 hex digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// One stored entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    schema_version: u32,
    path: String,
    mtime_nanos: u128,
    fingerprint: String,
    cached_at: String,
    unit: UnitFacts,
}

/// Entry count and size of a cache directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: u64,
}

/// Per-file facts cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct FactsCache {
    dir: PathBuf,
    fingerprint: String,
}

impl FactsCache {
    /// Open (creating if needed) a cache directory.
    ///
    /// `fingerprint` identifies the extractor configuration; entries written
    /// under another fingerprint are never returned.
    pub fn open(dir: impl Into<PathBuf>, fingerprint: impl Into<String>) -> ModernizeResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            ModernizeError::cache(format!("cannot create {}: {}", dir.display(), e))
        })?;
        Ok(FactsCache {
            dir,
            fingerprint: fingerprint.into(),
        })
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, path: &str, mtime_nanos: u128) -> PathBuf {
        let key = sha256_hex(format!("{}\0{}\0{}", path, mtime_nanos, self.fingerprint).as_bytes());
        self.dir.join(format!("{key}.{ENTRY_EXTENSION}"))
    }

    /// Look up the facts of `path` at `mtime`.
    pub fn get(&self, path: &str, mtime: SystemTime) -> Option<UnitFacts> {
        let nanos = mtime_nanos(mtime);
        let entry_path = self.entry_path(path, nanos);
        let bytes = match fs::read(&entry_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path, "cache miss");
                return None;
            }
            Err(err) => {
                warn!(path, error = %err, "unreadable cache entry");
                return None;
            }
        };
        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(path, entry = %entry_path.display(), error = %err, "corrupt cache entry");
                return None;
            }
        };
        if entry.schema_version != FACTS_SCHEMA_VERSION
            || entry.path != path
            || entry.mtime_nanos != nanos
            || entry.fingerprint != self.fingerprint
        {
            debug!(path, "stale cache entry");
            return None;
        }
        debug!(path, "cache hit");
        Some(entry.unit)
    }

    /// Store the facts of `path` at `mtime`.
    pub fn put(&self, path: &str, mtime: SystemTime, unit: &UnitFacts) -> ModernizeResult<()> {
        let nanos = mtime_nanos(mtime);
        let entry = CacheEntry {
            schema_version: FACTS_SCHEMA_VERSION,
            path: path.to_string(),
            mtime_nanos: nanos,
            fingerprint: self.fingerprint.clone(),
            cached_at: format_timestamp(SystemTime::now()),
            unit: unit.clone(),
        };
        let json = serde_json::to_vec(&entry)?;
        atomic_write(&self.entry_path(path, nanos), &json)
            .map_err(|e| ModernizeError::cache(format!("cannot write entry for {path}: {e}")))
    }

    /// Return the cached facts or run `extract` and store its result.
    ///
    /// Without an mtime nothing is cached. A failed write is logged and the
    /// freshly extracted facts are returned anyway.
    pub fn get_or_extract(
        &self,
        path: &str,
        mtime: Option<SystemTime>,
        extract: impl FnOnce() -> UnitFacts,
    ) -> UnitFacts {
        let Some(mtime) = mtime else {
            return extract();
        };
        if let Some(unit) = self.get(path, mtime) {
            return unit;
        }
        let unit = extract();
        if let Err(err) = self.put(path, mtime, &unit) {
            warn!(path, error = %err, "cache write failed");
        }
        unit
    }

    /// Delete every entry; returns how many were removed.
    pub fn clean(&self) -> ModernizeResult<usize> {
        let mut removed = 0;
        for path in self.entry_files()? {
            fs::remove_file(&path).map_err(|e| {
                ModernizeError::cache(format!("cannot remove {}: {}", path.display(), e))
            })?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Count entries and their total size.
    pub fn stats(&self) -> ModernizeResult<CacheStats> {
        let mut stats = CacheStats::default();
        for path in self.entry_files()? {
            stats.entries += 1;
            stats.bytes += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        }
        Ok(stats)
    }

    fn entry_files(&self) -> ModernizeResult<Vec<PathBuf>> {
        let read_dir = fs::read_dir(&self.dir).map_err(|e| {
            ModernizeError::cache(format!("cannot list {}: {}", self.dir.display(), e))
        })?;
        Ok(read_dir
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == ENTRY_EXTENSION))
            .collect())
    }
}

fn mtime_nanos(mtime: SystemTime) -> u128 {
    mtime
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

/// Format a timestamp for JSON output (ISO 8601).
fn format_timestamp(time: SystemTime) -> String {
    use chrono::{DateTime, Utc};

    let datetime: DateTime<Utc> = time.into();
    datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Write a file atomically using a temp file and rename.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    // PID + timestamp keeps temp names unique across concurrent processes.
    let pid = std::process::id();
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let temp_path = path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        pid,
        timestamp
    ));
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::Language;
    use std::cell::Cell;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_unit() -> UnitFacts {
        UnitFacts::new("uClientes", "src/uClientes.pas", Language::Pascal)
    }

    fn t(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    mod roundtrip_tests {
        use super::*;

        #[test]
        fn put_then_get_hits() {
            let dir = TempDir::new().unwrap();
            let cache = FactsCache::open(dir.path(), "cfg").unwrap();
            cache.put("src/uClientes.pas", t(100), &sample_unit()).unwrap();
            assert_eq!(cache.get("src/uClientes.pas", t(100)), Some(sample_unit()));
        }

        #[test]
        fn changed_mtime_is_a_miss_and_adds_entry() {
            let dir = TempDir::new().unwrap();
            let cache = FactsCache::open(dir.path(), "cfg").unwrap();
            cache.put("src/uClientes.pas", t(100), &sample_unit()).unwrap();
            assert_eq!(cache.get("src/uClientes.pas", t(101)), None);

            cache.put("src/uClientes.pas", t(101), &sample_unit()).unwrap();
            assert_eq!(cache.stats().unwrap().entries, 2);
        }

        #[test]
        fn other_fingerprint_is_a_miss() {
            let dir = TempDir::new().unwrap();
            FactsCache::open(dir.path(), "a")
                .unwrap()
                .put("x.pas", t(1), &sample_unit())
                .unwrap();
            let other = FactsCache::open(dir.path(), "b").unwrap();
            assert_eq!(other.get("x.pas", t(1)), None);
        }
    }

    mod read_through_tests {
        use super::*;

        #[test]
        fn extractor_runs_once() {
            let dir = TempDir::new().unwrap();
            let cache = FactsCache::open(dir.path(), "cfg").unwrap();
            let calls = Cell::new(0);
            let extract = || {
                calls.set(calls.get() + 1);
                sample_unit()
            };

            let first = cache.get_or_extract("src/uClientes.pas", Some(t(5)), extract);
            let second = cache.get_or_extract("src/uClientes.pas", Some(t(5)), || {
                calls.set(calls.get() + 1);
                sample_unit()
            });
            assert_eq!(first, second);
            assert_eq!(calls.get(), 1);
        }

        #[test]
        fn no_mtime_never_cached() {
            let dir = TempDir::new().unwrap();
            let cache = FactsCache::open(dir.path(), "cfg").unwrap();
            cache.get_or_extract("a.pas", None, sample_unit);
            assert_eq!(cache.stats().unwrap().entries, 0);
        }

        #[test]
        fn corrupt_entry_is_a_miss_and_rewritten() {
            let dir = TempDir::new().unwrap();
            let cache = FactsCache::open(dir.path(), "cfg").unwrap();
            cache.put("a.pas", t(9), &sample_unit()).unwrap();
            let entry = cache.entry_files().unwrap().pop().unwrap();
            fs::write(&entry, b"{not json").unwrap();

            assert_eq!(cache.get("a.pas", t(9)), None);
            let unit = cache.get_or_extract("a.pas", Some(t(9)), sample_unit);
            assert_eq!(unit, sample_unit());
            assert_eq!(cache.get("a.pas", t(9)), Some(sample_unit()));
        }
    }

    mod maintenance_tests {
        use super::*;

        #[test]
        fn clean_removes_entries() {
            let dir = TempDir::new().unwrap();
            let cache = FactsCache::open(dir.path().join("nested"), "cfg").unwrap();
            cache.put("a.pas", t(1), &sample_unit()).unwrap();
            cache.put("b.pas", t(1), &sample_unit()).unwrap();
            assert_eq!(cache.clean().unwrap(), 2);
            assert_eq!(cache.stats().unwrap(), CacheStats::default());
        }

        #[test]
        fn sha256_is_hex() {
            let digest = sha256_hex(b"abc");
            assert_eq!(digest.len(), 64);
            assert!(digest.starts_with("ba7816bf"));
        }
    }
}
