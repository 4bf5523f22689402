//! Verification cache
//!
//! Persists definite verification results (proven / disproven) across runs,
//! one JSON record per contract hash:
//!
//! ```text
//! <dir>/entries/<hash>.json
//! <dir>/statistics.json
//! ```
//!
//! A record is only reused when its cache format version and solver build
//! match the running session. Writes go through a temporary file and a
//! rename, so readers never observe partial records. Cache problems never
//! fail verification; they are counted and logged.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::hash::ContractHash;
use super::outcome::VerificationOutcome;
use crate::config::CacheConfig;
use crate::error::{CovenantError, Result};

/// Bumped whenever the record layout or hashing scheme changes
pub const CACHE_FORMAT_VERSION: u32 = 2;

const ENTRIES_DIR: &str = "entries";
const STATISTICS_FILE: &str = "statistics.json";
/// Eviction shrinks the cache to this share of the maximum
const EVICTION_TARGET_PERCENT: u64 = 80;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Cached outcome of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachedOutcome {
    Proven,
    Disproven,
}

/// One persisted verification result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub format_version: u32,
    pub solver_build_id: String,
    /// Hex digest; must equal the file's key
    pub contract_hash: String,
    pub outcome: CachedOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterexample: Option<String>,
    /// Size of the serialized record
    pub size_bytes: u64,
    pub written_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn to_outcome(&self) -> VerificationOutcome {
        match self.outcome {
            CachedOutcome::Proven => VerificationOutcome::Proven,
            CachedOutcome::Disproven => {
                VerificationOutcome::disproven(self.counterexample.clone().unwrap_or_default())
            }
        }
    }
}

/// Only the version field, read first so that records written by another
/// format are a plain miss rather than a corrupt entry
#[derive(Deserialize)]
struct EntryHeader {
    format_version: u32,
}

/// Session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub evictions: u64,
    pub errors: u64,
}

impl CacheStatistics {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Hits as a fraction of lookups (0.0 when nothing was looked up)
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            n => self.hits as f64 / n as f64,
        }
    }
}

/// Contents of `statistics.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatistics {
    pub solver_build_id: String,
    pub closed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub statistics: CacheStatistics,
}

impl SessionStatistics {
    /// Statistics of the last session that used the cache in `dir`, if any
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(STATISTICS_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CovenantError::io(&path, e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CovenantError::cache(format!("{}: {e}", path.display())))
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStatistics {
        CacheStatistics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

struct EntryFile {
    path: PathBuf,
    len: u64,
    modified: SystemTime,
}

/// Session-scoped handle on the on-disk cache.
///
/// Shareable across worker threads. Statistics are flushed exactly once,
/// by [`VerificationCache::close`] or on drop.
#[derive(Debug)]
pub struct VerificationCache {
    enabled: bool,
    root: PathBuf,
    entries_dir: PathBuf,
    max_size_bytes: u64,
    solver_build_id: String,
    counters: Counters,
    /// Serializes the evict-then-write section
    write_lock: Mutex<()>,
    flushed: AtomicBool,
}

impl VerificationCache {
    /// Open (creating if needed) the cache described by `config`.
    ///
    /// A disabled configuration yields a handle that never touches the
    /// filesystem. An unusable directory is logged and counted as an error;
    /// the session then continues with caching turned off.
    pub fn open(config: &CacheConfig, solver_build_id: impl Into<String>) -> Self {
        let mut cache = Self {
            enabled: config.enabled,
            root: config.directory.clone(),
            entries_dir: config.directory.join(ENTRIES_DIR),
            max_size_bytes: config.max_size_bytes,
            solver_build_id: solver_build_id.into(),
            counters: Counters::default(),
            write_lock: Mutex::new(()),
            flushed: AtomicBool::new(false),
        };
        if !cache.enabled {
            debug!("verification cache disabled");
            return cache;
        }

        if let Err(e) = fs::create_dir_all(&cache.entries_dir) {
            Counters::bump(&cache.counters.errors);
            warn!(dir = %cache.entries_dir.display(), error = %e, "verification cache unusable, continuing without it");
            cache.enabled = false;
            return cache;
        }
        if config.clear_before_run {
            match cache.clear() {
                Ok(removed) => info!(removed, "cleared verification cache"),
                Err(e) => {
                    Counters::bump(&cache.counters.errors);
                    warn!(error = %e, "could not clear verification cache");
                }
            }
        }
        info!(
            dir = %cache.root.display(),
            solver = %cache.solver_build_id,
            max_size_bytes = cache.max_size_bytes,
            "opened verification cache"
        );
        cache
    }

    /// A handle that caches nothing
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            root: PathBuf::new(),
            entries_dir: PathBuf::new(),
            max_size_bytes: 0,
            solver_build_id: String::new(),
            counters: Counters::default(),
            write_lock: Mutex::new(()),
            flushed: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn solver_build_id(&self) -> &str {
        &self.solver_build_id
    }

    fn entry_path(&self, key: &ContractHash) -> PathBuf {
        self.entries_dir.join(format!("{}.json", key.to_hex()))
    }

    /// Look up a valid record for `key`.
    ///
    /// Records from another format version or solver build are a miss.
    /// Unreadable or unparsable records are a miss and count as an error.
    pub fn lookup(&self, key: &ContractHash) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Counters::bump(&self.counters.misses);
                debug!(key = %key.short(), "cache miss");
                return None;
            }
            Err(e) => {
                Counters::bump(&self.counters.misses);
                Counters::bump(&self.counters.errors);
                warn!(path = %path.display(), error = %e, "unreadable cache entry");
                return None;
            }
        };

        let entry = match serde_json::from_slice::<EntryHeader>(&bytes) {
            Ok(header) if header.format_version != CACHE_FORMAT_VERSION => {
                Counters::bump(&self.counters.misses);
                debug!(key = %key.short(), version = header.format_version, "cache entry from other format");
                return None;
            }
            Ok(_) => serde_json::from_slice::<CacheEntry>(&bytes),
            Err(e) => Err(e),
        };
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                Counters::bump(&self.counters.misses);
                Counters::bump(&self.counters.errors);
                warn!(path = %path.display(), error = %e, "corrupt cache entry");
                return None;
            }
        };

        if entry.solver_build_id != self.solver_build_id || entry.contract_hash != key.to_hex() {
            Counters::bump(&self.counters.misses);
            debug!(
                key = %key.short(),
                cached_solver = %entry.solver_build_id,
                "stale cache entry"
            );
            return None;
        }

        Counters::bump(&self.counters.hits);
        debug!(key = %key.short(), outcome = ?entry.outcome, "cache hit");
        Some(entry)
    }

    /// Persist `outcome` under `key`. Returns whether a record was written.
    ///
    /// Non-definite outcomes are never written. Write failures are counted
    /// and logged, never returned.
    pub fn store(&self, key: &ContractHash, outcome: &VerificationOutcome) -> bool {
        if !self.enabled {
            return false;
        }
        let (cached, counterexample) = match outcome {
            VerificationOutcome::Proven => (CachedOutcome::Proven, None),
            VerificationOutcome::Disproven { counterexample } => {
                (CachedOutcome::Disproven, Some(counterexample.clone()))
            }
            _ => return false,
        };
        let mut entry = CacheEntry {
            format_version: CACHE_FORMAT_VERSION,
            solver_build_id: self.solver_build_id.clone(),
            contract_hash: key.to_hex(),
            outcome: cached,
            counterexample,
            size_bytes: 0,
            written_at: Utc::now(),
        };
        let bytes = match encode_entry(&mut entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                Counters::bump(&self.counters.errors);
                warn!(key = %key.short(), error = %e, "could not encode cache entry");
                return false;
            }
        };

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let target = self.entry_path(key);
        if let Err(e) = self.evict_for(&target, bytes.len() as u64) {
            Counters::bump(&self.counters.errors);
            warn!(error = %e, "cache eviction failed");
        }
        match self.write_atomic(key, &target, &bytes) {
            Ok(()) => {
                Counters::bump(&self.counters.writes);
                debug!(key = %key.short(), bytes = bytes.len(), "cache write");
                true
            }
            Err(e) => {
                Counters::bump(&self.counters.errors);
                warn!(path = %target.display(), error = %e, "cache write failed");
                false
            }
        }
    }

    /// Delete oldest entries until the incoming record fits.
    fn evict_for(&self, target: &Path, incoming: u64) -> io::Result<()> {
        if self.max_size_bytes == 0 {
            return Ok(());
        }
        let mut files = self.entry_files()?;
        // The record being replaced does not count against the budget
        files.retain(|f| f.path != target);
        let mut total: u64 = files.iter().map(|f| f.len).sum();
        if total + incoming <= self.max_size_bytes {
            return Ok(());
        }

        let goal = self.max_size_bytes * EVICTION_TARGET_PERCENT / 100;
        files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        let mut evicted = 0u64;
        for file in files {
            if total + incoming <= goal {
                break;
            }
            match fs::remove_file(&file.path) {
                Ok(()) => {
                    evicted += 1;
                    Counters::bump(&self.counters.evictions);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
            total -= file.len;
        }
        debug!(evicted, remaining_bytes = total, "cache eviction");
        Ok(())
    }

    fn write_atomic(&self, key: &ContractHash, target: &Path, bytes: &[u8]) -> io::Result<()> {
        let temp = self.entries_dir.join(format!(
            ".{}.{}.{}.tmp",
            key.to_hex(),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&temp, bytes)?;
        fs::rename(&temp, target).inspect_err(|_| {
            let _ = fs::remove_file(&temp);
        })
    }

    fn entry_files(&self) -> io::Result<Vec<EntryFile>> {
        scan_entries(&self.entries_dir)
    }

    /// Remove every entry. Returns the number of files removed.
    pub fn clear(&self) -> Result<usize> {
        if !self.enabled {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        clear_entries(&self.entries_dir)
    }

    /// Number of entries on disk
    pub fn len(&self) -> usize {
        if !self.enabled {
            return 0;
        }
        self.entry_files().map(|files| files.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes of entries on disk
    pub fn total_size(&self) -> u64 {
        if !self.enabled {
            return 0;
        }
        self.entry_files()
            .map(|files| files.iter().map(|f| f.len).sum())
            .unwrap_or(0)
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.counters.snapshot()
    }

    /// End the session: flush statistics and return them.
    pub fn close(self) -> CacheStatistics {
        self.flush();
        self.statistics()
    }

    fn flush(&self) {
        if !self.enabled || self.flushed.swap(true, Ordering::SeqCst) {
            return;
        }
        let record = SessionStatistics {
            solver_build_id: self.solver_build_id.clone(),
            closed_at: Utc::now(),
            statistics: self.statistics(),
        };
        let path = self.root.join(STATISTICS_FILE);
        let written = serde_json::to_vec_pretty(&record)
            .map_err(io::Error::other)
            .and_then(|json| fs::write(&path, json));
        match written {
            Ok(()) => debug!(path = %path.display(), "flushed cache statistics"),
            Err(e) => warn!(path = %path.display(), error = %e, "could not write cache statistics"),
        }
    }
}

impl Drop for VerificationCache {
    fn drop(&mut self) {
        self.flush();
    }
}

fn scan_entries(entries_dir: &Path) -> io::Result<Vec<EntryFile>> {
    let mut files = Vec::new();
    for dirent in fs::read_dir(entries_dir)? {
        let dirent = dirent?;
        let path = dirent.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let meta = match dirent.metadata() {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => continue,
            // Raced with a concurrent eviction
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        files.push(EntryFile {
            path,
            len: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
    Ok(files)
}

/// Contents of a cache directory, read without opening a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheSummary {
    pub directory: PathBuf,
    pub entries: usize,
    pub total_bytes: u64,
    pub last_session: Option<SessionStatistics>,
}

impl CacheSummary {
    pub fn inspect(dir: &Path) -> Result<Self> {
        let entries_dir = dir.join(ENTRIES_DIR);
        let files = match scan_entries(&entries_dir) {
            Ok(files) => files,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(CovenantError::io(&entries_dir, e)),
        };
        Ok(Self {
            directory: dir.to_path_buf(),
            entries: files.len(),
            total_bytes: files.iter().map(|f| f.len).sum(),
            last_session: SessionStatistics::load(dir)?,
        })
    }
}

/// Remove every entry of the cache in `dir` without opening a session.
pub fn clear_directory(dir: &Path) -> Result<usize> {
    clear_entries(&dir.join(ENTRIES_DIR))
}

fn clear_entries(entries_dir: &Path) -> Result<usize> {
    let read_dir = match fs::read_dir(entries_dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(CovenantError::io(entries_dir, e)),
    };
    let mut removed = 0;
    for dirent in read_dir {
        let path = dirent.map_err(|e| CovenantError::io(entries_dir, e))?.path();
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| CovenantError::io(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Serialize `entry`, recording the final record size in `size_bytes`.
fn encode_entry(entry: &mut CacheEntry) -> serde_json::Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(entry)?;
    // The size field is part of the record; settle it in a few passes
    for _ in 0..4 {
        if bytes.len() as u64 == entry.size_bytes {
            break;
        }
        entry.size_bytes = bytes.len() as u64;
        bytes = serde_json::to_vec_pretty(entry)?;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn key(n: u8) -> ContractHash {
        ContractHash::of_canonical(&format!("(PRE INT:{n})"))
    }

    fn open(dir: &TempDir, build: &str) -> VerificationCache {
        VerificationCache::open(&CacheConfig::at(dir.path()), build)
    }

    #[test]
    fn test_store_then_lookup() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "4.12.0");
        assert!(cache.lookup(&key(1)).is_none());
        assert!(cache.store(&key(1), &VerificationOutcome::Proven));

        let entry = cache.lookup(&key(1)).unwrap();
        assert_eq!(entry.outcome, CachedOutcome::Proven);
        assert_eq!(entry.format_version, CACHE_FORMAT_VERSION);
        assert_eq!(entry.contract_hash, key(1).to_hex());

        let stats = cache.statistics();
        assert_eq!((stats.hits, stats.misses, stats.writes), (1, 1, 1));
    }

    #[test]
    fn test_disproven_keeps_counterexample() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "4.12.0");
        cache.store(&key(2), &VerificationOutcome::disproven("x = -1"));
        assert_eq!(
            cache.lookup(&key(2)).unwrap().to_outcome(),
            VerificationOutcome::disproven("x = -1")
        );
    }

    #[test]
    fn test_size_field_matches_file() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "4.12.0");
        cache.store(&key(3), &VerificationOutcome::Proven);
        let entry = cache.lookup(&key(3)).unwrap();
        assert_eq!(entry.size_bytes, cache.total_size());
    }

    #[test]
    fn test_non_definite_outcomes_not_written() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "4.12.0");
        assert!(!cache.store(&key(1), &VerificationOutcome::Unproven { elapsed: Duration::from_secs(1) }));
        assert!(!cache.store(&key(1), &VerificationOutcome::unsupported("strings")));
        assert!(!cache.store(&key(1), &VerificationOutcome::Skipped));
        assert!(cache.is_empty());
        assert_eq!(cache.statistics().writes, 0);
    }

    #[test]
    fn test_solver_build_mismatch_is_miss_not_error() {
        let dir = TempDir::new().unwrap();
        open(&dir, "4.12.0").store(&key(1), &VerificationOutcome::Proven);

        let cache = open(&dir, "4.13.0");
        assert!(cache.lookup(&key(1)).is_none());
        let stats = cache.statistics();
        assert_eq!((stats.misses, stats.errors), (1, 0));
    }

    #[test]
    fn test_other_format_version_is_miss_not_error() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "4.12.0");
        let path = dir.path().join(ENTRIES_DIR).join(format!("{}.json", key(1).to_hex()));
        fs::write(&path, r#"{"format_version": 999, "layout": "future"}"#).unwrap();
        assert!(cache.lookup(&key(1)).is_none());
        assert_eq!(cache.statistics().errors, 0);
    }

    #[test]
    fn test_corrupt_entry_counts_error() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "4.12.0");
        let path = dir.path().join(ENTRIES_DIR).join(format!("{}.json", key(1).to_hex()));
        fs::write(&path, b"{ not json").unwrap();
        assert!(cache.lookup(&key(1)).is_none());
        let stats = cache.statistics();
        assert_eq!((stats.misses, stats.errors), (1, 1));

        // A fresh result replaces the corrupt record
        assert!(cache.store(&key(1), &VerificationOutcome::Proven));
        assert!(cache.lookup(&key(1)).is_some());
    }

    #[test]
    fn test_disabled_cache_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("never");
        let config = CacheConfig {
            enabled: false,
            directory: root.clone(),
            ..CacheConfig::default()
        };
        let cache = VerificationCache::open(&config, "4.12.0");
        assert!(!cache.store(&key(1), &VerificationOutcome::Proven));
        assert!(cache.lookup(&key(1)).is_none());
        assert_eq!(cache.close(), CacheStatistics::default());
        assert!(!root.exists());
    }

    #[test]
    fn test_unusable_directory_degrades_to_disabled() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not_a_dir");
        fs::write(&file, b"x").unwrap();

        let cache = VerificationCache::open(&CacheConfig::at(&file), "4.12.0");
        assert!(!cache.is_enabled());
        assert!(cache.lookup(&key(1)).is_none());
        assert!(!cache.store(&key(1), &VerificationOutcome::Proven));
        let stats = cache.close();
        assert_eq!(stats.errors, 1);
        assert_eq!((stats.misses, stats.writes), (0, 0));
    }

    #[test]
    fn test_eviction_removes_oldest_first() {
        let dir = TempDir::new().unwrap();
        let probe = open(&dir, "b");
        probe.store(&key(0), &VerificationOutcome::Proven);
        let entry_size = probe.total_size();
        probe.clear().unwrap();
        drop(probe);

        // Room for four entries; the fifth write must evict down to 80%
        let max = entry_size * 4 + entry_size / 2;
        let config = CacheConfig::at(dir.path()).with_max_size(max);
        let cache = VerificationCache::open(&config, "b");
        let base = SystemTime::now() - Duration::from_secs(100);
        for n in 1..=4u8 {
            cache.store(&key(n), &VerificationOutcome::Proven);
            let path = cache.entry_path(&key(n));
            let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
            file.set_modified(base + Duration::from_secs(n as u64)).unwrap();
        }
        cache.store(&key(5), &VerificationOutcome::Proven);

        assert!(cache.total_size() <= max * EVICTION_TARGET_PERCENT / 100);
        assert!(cache.lookup(&key(1)).is_none());
        assert!(cache.lookup(&key(2)).is_none());
        assert!(cache.lookup(&key(4)).is_some());
        assert!(cache.lookup(&key(5)).is_some());
        assert_eq!(cache.statistics().evictions, 2);
    }

    #[test]
    fn test_rewrite_does_not_evict_itself() {
        let dir = TempDir::new().unwrap();
        let probe = open(&dir, "b");
        probe.store(&key(0), &VerificationOutcome::Proven);
        let entry_size = probe.total_size();
        probe.clear().unwrap();
        drop(probe);

        let config = CacheConfig::at(dir.path()).with_max_size(entry_size + entry_size / 2);
        let cache = VerificationCache::open(&config, "b");
        assert!(cache.store(&key(1), &VerificationOutcome::Proven));
        assert!(cache.store(&key(1), &VerificationOutcome::Proven));
        assert_eq!(cache.statistics().evictions, 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unbounded_never_evicts() {
        let dir = TempDir::new().unwrap();
        let cache = VerificationCache::open(&CacheConfig::at(dir.path()).with_max_size(0), "b");
        for n in 0..20u8 {
            cache.store(&key(n), &VerificationOutcome::Proven);
        }
        assert_eq!(cache.len(), 20);
        assert_eq!(cache.statistics().evictions, 0);
    }

    #[test]
    fn test_close_flushes_statistics_once() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, "4.12.0");
        cache.lookup(&key(1));
        cache.store(&key(1), &VerificationOutcome::Proven);
        let stats = cache.close();

        let saved = SessionStatistics::load(dir.path()).unwrap().unwrap();
        assert_eq!(saved.statistics, stats);
        assert_eq!(saved.solver_build_id, "4.12.0");
    }

    #[test]
    fn test_drop_flushes_statistics() {
        let dir = TempDir::new().unwrap();
        {
            let cache = open(&dir, "4.12.0");
            cache.lookup(&key(9));
        }
        let saved = SessionStatistics::load(dir.path()).unwrap().unwrap();
        assert_eq!(saved.statistics.misses, 1);
    }

    #[test]
    fn test_clear_before_run() {
        let dir = TempDir::new().unwrap();
        open(&dir, "b").store(&key(1), &VerificationOutcome::Proven);
        let config = CacheConfig {
            clear_before_run: true,
            ..CacheConfig::at(dir.path())
        };
        let cache = VerificationCache::open(&config, "b");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStatistics {
            hits: 3,
            misses: 1,
            ..CacheStatistics::default()
        };
        assert_eq!(stats.lookups(), 4);
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStatistics::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_inspect_and_clear_without_session() {
        let dir = TempDir::new().unwrap();
        let empty = CacheSummary::inspect(dir.path()).unwrap();
        assert_eq!((empty.entries, empty.total_bytes), (0, 0));
        assert!(empty.last_session.is_none());

        let cache = open(&dir, "4.12.0");
        cache.store(&key(1), &VerificationOutcome::Proven);
        cache.store(&key(2), &VerificationOutcome::Proven);
        let size = cache.total_size();
        cache.close();

        let summary = CacheSummary::inspect(dir.path()).unwrap();
        assert_eq!(summary.entries, 2);
        assert_eq!(summary.total_bytes, size);
        assert_eq!(summary.last_session.unwrap().statistics.writes, 2);

        assert_eq!(clear_directory(dir.path()).unwrap(), 2);
        assert_eq!(CacheSummary::inspect(dir.path()).unwrap().entries, 0);
        // Statistics of the last session survive a clear
        assert!(SessionStatistics::load(dir.path()).unwrap().is_some());
    }
}
