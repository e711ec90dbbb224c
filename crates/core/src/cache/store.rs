//! File-per-query result cache.
//!
//! Each entry lives at `<dir>/<key>.json` and holds a JSON array of books.
//! The file modification time is both the store time and the last access
//! time: TTL checks and LRU eviction read it, and successful loads bump it.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;

use super::hash::is_valid_key;
use crate::{Book, Error};

/// File extension of cache entries.
pub const ENTRY_EXTENSION: &str = "json";

/// Handle to a cache directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

/// Read-only summary of the cache directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub count: usize,
    pub total_bytes: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// A cache file found on disk.
#[derive(Debug, Clone)]
pub(crate) struct EntryFile {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

/// Time elapsed since `modified`; timestamps in the future count as fresh.
pub(crate) fn age_at(now: SystemTime, modified: SystemTime) -> Duration {
    now.duration_since(modified).unwrap_or(Duration::ZERO)
}

impl CacheStore {
    /// Open a cache directory, creating it (and parents) if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the entry for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{ENTRY_EXTENSION}"))
    }

    /// Load the books cached under `key` if the entry is younger than `ttl`.
    ///
    /// Missing, expired, unreadable and corrupt entries all come back as
    /// `None`. Corrupt entries are deleted so the next fetch can replace them.
    pub fn load(&self, key: &str, ttl: Duration) -> Option<Vec<Book>> {
        if !is_valid_key(key) {
            tracing::warn!(key, "ignoring cache lookup with malformed key");
            return None;
        }

        let path = self.path_for(key);
        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), "cache read failed: {}", e);
                return None;
            }
        };

        if age_at(SystemTime::now(), modified) >= ttl {
            tracing::debug!(key, "cache entry expired");
            return None;
        }

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path.display(), "cache read failed: {}", e);
                return None;
            }
        };

        match serde_json::from_slice::<Vec<Book>>(&bytes) {
            Ok(books) if !books.is_empty() => {
                if let Err(e) = touch(&path) {
                    tracing::warn!(path = %path.display(), "failed to refresh cache entry time: {}", e);
                }
                Some(books)
            }
            Ok(_) => {
                tracing::warn!(path = %path.display(), "empty cache entry, clearing it");
                discard(&path);
                None
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "cache entry corrupted, clearing it: {}", e);
                discard(&path);
                None
            }
        }
    }

    /// Persist `books` under `key`.
    ///
    /// Empty result sets are never stored. The payload is written to a
    /// temporary file in the cache directory and renamed into place, so
    /// readers see either the old entry or the complete new one.
    pub fn save(&self, key: &str, books: &[Book]) -> Result<(), Error> {
        if books.is_empty() {
            return Ok(());
        }
        if !is_valid_key(key) {
            return Err(Error::Cache(format!("malformed key: {key}")));
        }

        let json = serde_json::to_vec(books)?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(key)).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(key, count = books.len(), bytes = json.len(), "cached search results");
        Ok(())
    }

    /// Count and size of the entries currently on disk.
    pub fn stats(&self) -> Result<CacheStats, Error> {
        let entries = self.entries()?;

        Ok(CacheStats {
            count: entries.len(),
            total_bytes: entries.iter().map(|e| e.size).sum(),
            oldest: entries.iter().map(|e| e.modified).min().map(DateTime::<Utc>::from),
            newest: entries.iter().map(|e| e.modified).max().map(DateTime::<Utc>::from),
        })
    }

    /// Delete every entry. Returns the number of deleted entries.
    pub fn clear(&self) -> Result<u64, Error> {
        let mut deleted = 0;
        for entry in self.entries()? {
            if remove_entry(&entry.path)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// All entry files in the directory. Files that are not named like a
    /// cache key (temporary files, stray files) are skipped.
    pub(crate) fn entries(&self) -> Result<Vec<EntryFile>, Error> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for dir_entry in read_dir {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();

            let is_entry = path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
                && path.file_stem().and_then(|s| s.to_str()).is_some_and(is_valid_key);
            if !is_entry {
                continue;
            }

            // another process may delete the file between listing and stat
            let Ok(meta) = dir_entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }

            entries.push(EntryFile { path, modified: meta.modified()?, size: meta.len() });
        }

        Ok(entries)
    }
}

/// Set the modification time of `path` to now.
fn touch(path: &Path) -> io::Result<()> {
    fs::OpenOptions::new().write(true).open(path)?.set_modified(SystemTime::now())
}

/// Remove an entry, treating "already gone" as success. Returns whether this
/// call deleted the file.
pub(crate) fn remove_entry(path: &Path) -> Result<bool, Error> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn discard(path: &Path) {
    if let Err(e) = remove_entry(path) {
        tracing::warn!(path = %path.display(), "failed to delete cache entry: {}", e);
    }
}
