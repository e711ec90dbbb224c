//! Expiry and size-bound sweep for the file cache.
//!
//! Order of the sweep:
//! 1. delete entries whose age is at least the TTL
//! 2. delete least recently touched entries until at most `max_entries` remain
//! 3. delete least recently touched entries until the total size fits `max_bytes`

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use rand::Rng;
use serde::Serialize;

use super::store::{CacheStore, EntryFile, age_at, remove_entry};
use crate::Error;

/// Limits applied by [`CacheStore::cleanup`].
#[derive(Debug, Clone, Copy)]
pub struct CleanupPolicy {
    pub ttl: Duration,
    pub max_entries: usize,
    pub max_bytes: u64,
    /// Chance that a call to `cleanup` actually sweeps.
    pub probability: f64,
}

/// What a sweep deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// False when the probability roll skipped the sweep.
    pub ran: bool,
    pub expired: u64,
    pub evicted_for_count: u64,
    pub evicted_for_size: u64,
    /// Entries that could not be deleted and are still on disk.
    pub failed: u64,
}

impl CleanupReport {
    pub fn deleted(&self) -> u64 {
        self.expired + self.evicted_for_count + self.evicted_for_size
    }
}

fn roll(probability: f64) -> bool {
    if probability >= 1.0 {
        return true;
    }
    probability > 0.0 && rand::thread_rng().r#gen::<f64>() < probability
}

impl CacheStore {
    /// Run [`CacheStore::sweep`] with probability `policy.probability`.
    pub fn cleanup(&self, policy: &CleanupPolicy) -> Result<CleanupReport, Error> {
        if !roll(policy.probability) {
            return Ok(CleanupReport::default());
        }
        self.sweep(policy.ttl, policy.max_entries, policy.max_bytes)
    }

    /// Delete expired entries, then evict the oldest entries until both the
    /// count and size limits hold.
    pub fn sweep(&self, ttl: Duration, max_entries: usize, max_bytes: u64) -> Result<CleanupReport, Error> {
        let now = SystemTime::now();
        let (expired, live): (Vec<_>, Vec<_>) =
            self.entries()?.into_iter().partition(|entry| age_at(now, entry.modified) >= ttl);

        let report = enforce_limits(expired, live, max_entries, max_bytes, delete);

        if report.deleted() > 0 || report.failed > 0 {
            tracing::debug!(
                expired = report.expired,
                evicted_for_count = report.evicted_for_count,
                evicted_for_size = report.evicted_for_size,
                failed = report.failed,
                "cache sweep finished"
            );
        }

        Ok(report)
    }
}

/// Apply the sweep to a listing. Entries that `remove` fails to delete stay on
/// disk, so they keep counting against both limits.
fn enforce_limits(
    expired: Vec<EntryFile>, mut live: Vec<EntryFile>, max_entries: usize, max_bytes: u64,
    mut remove: impl FnMut(&EntryFile) -> bool,
) -> CleanupReport {
    let mut report = CleanupReport { ran: true, ..Default::default() };
    let mut stuck_count = 0usize;
    let mut stuck_bytes = 0u64;

    for entry in expired {
        if remove(&entry) {
            report.expired += 1;
        } else {
            report.failed += 1;
            stuck_count += 1;
            stuck_bytes += entry.size;
        }
    }

    live.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
    let mut live: VecDeque<EntryFile> = live.into();

    while live.len() + stuck_count > max_entries {
        let Some(entry) = live.pop_front() else { break };
        if remove(&entry) {
            report.evicted_for_count += 1;
        } else {
            report.failed += 1;
            stuck_count += 1;
            stuck_bytes += entry.size;
        }
    }

    let mut total: u64 = live.iter().map(|e| e.size).sum::<u64>() + stuck_bytes;
    while total > max_bytes {
        let Some(entry) = live.pop_front() else { break };
        if remove(&entry) {
            total = total.saturating_sub(entry.size);
            report.evicted_for_size += 1;
        } else {
            report.failed += 1;
        }
    }

    report
}

fn delete(entry: &EntryFile) -> bool {
    match remove_entry(&entry.path) {
        Ok(deleted) => deleted,
        Err(e) => {
            tracing::warn!(path = %entry.path.display(), "failed to evict cache entry: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash::query_key;
    use crate::cache::store::tests::{book, set_mtime};
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn store() -> (TempDir, CacheStore) {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        (dir, store)
    }

    /// Save one entry per query, the first one oldest, one minute apart.
    fn populate(store: &CacheStore, queries: &[String]) {
        let base = SystemTime::now() - Duration::from_secs(30 * 60);
        for (i, q) in queries.iter().enumerate() {
            let key = query_key(q);
            store.save(&key, &[book(q, 1)]).unwrap();
            set_mtime(&store.path_for(&key), base + Duration::from_secs(60 * i as u64));
        }
    }

    fn queries(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("query {i}")).collect()
    }

    #[test]
    fn test_sweep_removes_expired() {
        let (_dir, store) = store();
        let qs = queries(3);
        populate(&store, &qs);
        set_mtime(&store.path_for(&query_key(&qs[0])), SystemTime::now() - HOUR - Duration::from_secs(5));

        let report = store.sweep(HOUR, 100, u64::MAX).unwrap();

        assert!(report.ran);
        assert_eq!(report.expired, 1);
        assert!(!store.path_for(&query_key(&qs[0])).exists());
        assert_eq!(store.stats().unwrap().count, 2);
    }

    #[test]
    fn test_count_eviction_removes_oldest() {
        let (_dir, store) = store();
        let qs = queries(7);
        populate(&store, &qs);

        let report = store.sweep(HOUR, 4, u64::MAX).unwrap();

        assert_eq!(report.evicted_for_count, 3);
        assert_eq!(store.stats().unwrap().count, 4);
        for q in &qs[..3] {
            assert!(!store.path_for(&query_key(q)).exists(), "{q} should be evicted");
        }
        for q in &qs[3..] {
            assert!(store.path_for(&query_key(q)).exists(), "{q} should survive");
        }
    }

    #[test]
    fn test_size_eviction_removes_oldest_until_under_limit() {
        let (_dir, store) = store();
        let qs = queries(5);
        populate(&store, &qs);

        let sizes: Vec<u64> =
            qs.iter().map(|q| fs::metadata(store.path_for(&query_key(q))).unwrap().len()).collect();
        let total: u64 = sizes.iter().sum();
        // room for roughly the newest two entries
        let max_bytes = sizes[3] + sizes[4];
        assert!(total > max_bytes);

        let report = store.sweep(HOUR, 100, max_bytes).unwrap();

        let stats = store.stats().unwrap();
        assert!(stats.total_bytes <= max_bytes);
        assert_eq!(report.evicted_for_size, 3);
        assert!(!store.path_for(&query_key(&qs[0])).exists());
        assert!(store.path_for(&query_key(&qs[4])).exists());
    }

    #[test]
    fn test_sweep_within_limits_is_noop() {
        let (_dir, store) = store();
        populate(&store, &queries(3));

        let report = store.sweep(HOUR, 10, u64::MAX).unwrap();

        assert_eq!(report.deleted(), 0);
        assert_eq!(store.stats().unwrap().count, 3);
    }

    #[test]
    fn test_sweep_ignores_foreign_files() {
        let (_dir, store) = store();
        populate(&store, &queries(2));
        fs::write(store.dir().join("README"), b"not a cache file").unwrap();

        store.sweep(HOUR, 1, u64::MAX).unwrap();

        assert!(store.dir().join("README").exists());
        assert_eq!(store.stats().unwrap().count, 1);
    }

    fn listed(name: &str, age_secs: u64, size: u64) -> EntryFile {
        EntryFile {
            path: PathBuf::from(name),
            modified: SystemTime::now() - Duration::from_secs(age_secs),
            size,
        }
    }

    #[test]
    fn test_undeletable_entries_still_count_against_limits() {
        let live = vec![listed("a", 40, 10), listed("b", 30, 10), listed("c", 20, 10), listed("d", 10, 10)];

        // "a" is oldest but cannot be removed, so two newer entries go instead
        let mut removed = Vec::new();
        let report = enforce_limits(Vec::new(), live, 2, u64::MAX, |entry| {
            if entry.path == Path::new("a") {
                return false;
            }
            removed.push(entry.path.clone());
            true
        });

        assert_eq!(report.failed, 1);
        assert_eq!(report.evicted_for_count, 2);
        assert_eq!(removed, vec![PathBuf::from("b"), PathBuf::from("c")]);
    }

    #[test]
    fn test_failed_size_eviction_keeps_bytes_counted() {
        let expired = vec![listed("old", 7200, 50)];
        let live = vec![listed("a", 30, 20), listed("b", 20, 20), listed("c", 10, 20)];

        let report = enforce_limits(expired, live, 100, 80, |entry| entry.path != Path::new("old"));

        // 50 stuck bytes + 60 live bytes: two live entries must go to fit 80
        assert_eq!(report.failed, 1);
        assert_eq!(report.expired, 0);
        assert_eq!(report.evicted_for_size, 2);
    }

    #[test]
    fn test_cleanup_probability_zero_never_runs() {
        let (_dir, store) = store();
        populate(&store, &queries(5));
        let policy = CleanupPolicy { ttl: HOUR, max_entries: 1, max_bytes: u64::MAX, probability: 0.0 };

        for _ in 0..20 {
            let report = store.cleanup(&policy).unwrap();
            assert!(!report.ran);
        }
        assert_eq!(store.stats().unwrap().count, 5);
    }

    #[test]
    fn test_cleanup_probability_one_always_runs() {
        let (_dir, store) = store();
        populate(&store, &queries(5));
        let policy = CleanupPolicy { ttl: HOUR, max_entries: 2, max_bytes: u64::MAX, probability: 1.0 };

        let report = store.cleanup(&policy).unwrap();

        assert!(report.ran);
        assert_eq!(report.evicted_for_count, 3);
        assert_eq!(store.stats().unwrap().count, 2);
    }
}
