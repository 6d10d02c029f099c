//! Persistent tag cache using redb.
//!
//! Strategy: cache extracted tags per file, keyed by the composite string
//! `"<abs_path>|<mtime_nanos>"`. A file edit changes the mtime and therefore
//! the key, so stale entries are simply never read again; no eviction is
//! needed for correctness.
//!
//! Cache structure:
//! - Database: `<root>/.repomap.tags.cache.v<N>/tags.redb`
//! - Key: composite path+mtime string
//! - Value: bincode-serialized `Vec<Tag>`
//!
//! The version integer `N` is part of the directory name; bumping it
//! abandons the old directory wholesale.
//!
//! Failure policy: the cache never raises. Open failures disable it for the
//! run, read errors count as misses, and write errors are warned about once
//! and then suppressed. Only the compute closure's own errors propagate.

use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use anyhow::Result;
use redb::{Database, TableDefinition};

use crate::types::Tag;

/// Table definition for tag cache.
/// Key = "<abs_path>|<mtime_nanos>", Value = bincode Vec<Tag>
const TAGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tags");

/// Cache location and format version, passed in explicitly by the pipeline.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Format version embedded in the directory name. Bump on any change to
    /// the serialized Tag layout.
    pub version: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { version: 1 }
    }
}

impl CacheConfig {
    /// Directory name under the repository root.
    pub fn dir_name(&self) -> String {
        format!(".repomap.tags.cache.v{}", self.version)
    }
}

/// Persistent tag cache backed by redb.
///
/// Single-process use: reads are safe concurrently, writes are serialized by
/// redb's write transaction. Two processes sharing a cache directory is
/// unsupported.
pub struct TagCache {
    /// None when the cache could not be opened; every lookup then misses.
    db: Option<Database>,
    /// Set after the first write failure so later failures stay quiet.
    write_warned: Cell<bool>,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

/// Hit/miss counters for one run, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

impl TagCache {
    /// Open or create the cache database under `root`.
    ///
    /// Never fails: if the directory or database cannot be created, the
    /// cache is disabled for this run and every lookup recomputes.
    pub fn open(root: &Path, config: &CacheConfig) -> Self {
        let cache_dir = root.join(config.dir_name());

        let db = fs::create_dir_all(&cache_dir)
            .map_err(|e| {
                eprintln!(
                    "Warning: cannot create cache directory {}: {}",
                    cache_dir.display(),
                    e
                )
            })
            .ok()
            .and_then(|_| {
                let db_path = cache_dir.join("tags.redb");
                Database::create(&db_path)
                    .map_err(|e| {
                        eprintln!("Warning: cannot open cache database {}: {}", db_path.display(), e)
                    })
                    .ok()
            });

        Self { db, write_warned: Cell::new(false), hits: Cell::new(0), misses: Cell::new(0) }
    }

    /// A cache that never hits; used when callers opt out of persistence.
    pub fn disabled() -> Self {
        Self {
            db: None,
            write_warned: Cell::new(false),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    /// Hit/miss counters accumulated since this handle was opened.
    pub fn stats(&self) -> CacheStats {
        CacheStats { hits: self.hits.get(), misses: self.misses.get() }
    }

    /// Composite cache key. None when the mtime predates the epoch, in which
    /// case the entry is simply not cached.
    fn key_for(abs_path: &str, mtime: SystemTime) -> Option<String> {
        let nanos = mtime.duration_since(SystemTime::UNIX_EPOCH).ok()?.as_nanos();
        Some(format!("{}|{}", abs_path, nanos))
    }

    /// Look up tags, treating every internal error as a miss.
    fn read(&self, key: &str) -> Option<Vec<Tag>> {
        let db = self.db.as_ref()?;
        let txn = db.begin_read().ok()?;
        let table = txn.open_table(TAGS_TABLE).ok()?;
        let guard = table.get(key).ok()??;
        bincode::deserialize(guard.value()).ok()
    }

    /// Store tags, warning once per run if the write fails.
    fn write(&self, key: &str, tags: &[Tag]) {
        let Some(db) = self.db.as_ref() else { return };

        let result = (|| -> Result<()> {
            let bytes = bincode::serialize(tags)?;
            let txn = db.begin_write()?;
            {
                let mut table = txn.open_table(TAGS_TABLE)?;
                table.insert(key, bytes.as_slice())?;
            }
            txn.commit()?;
            Ok(())
        })();

        if let Err(e) = result {
            if !self.write_warned.get() {
                self.write_warned.set(true);
                eprintln!("Warning: tag cache write failed, continuing without cache: {}", e);
            }
        }
    }

    /// Return cached tags for `(abs_path, mtime)`, computing and storing on a
    /// miss. `force_refresh` bypasses the lookup but still writes, replacing
    /// whatever was stored under the key.
    ///
    /// Only `compute`'s error propagates; cache failures are invisible here.
    pub fn get_or_compute<F>(
        &self,
        abs_path: &str,
        mtime: SystemTime,
        force_refresh: bool,
        compute: F,
    ) -> Result<Vec<Tag>>
    where
        F: FnOnce() -> Result<Vec<Tag>>,
    {
        let key = Self::key_for(abs_path, mtime);

        if !force_refresh {
            if let Some(key) = key.as_deref() {
                if let Some(tags) = self.read(key) {
                    self.hits.set(self.hits.get() + 1);
                    return Ok(tags);
                }
            }
        }

        self.misses.set(self.misses.get() + 1);
        let tags = compute()?;
        if let Some(key) = key.as_deref() {
            self.write(key, &tags);
        }
        Ok(tags)
    }
}
