//! On-disk cache for search results.
//!
//! This module provides a fingerprint-keyed file cache. It supports:
//!
//! - SHA-256 query fingerprints as keys
//! - Lazy TTL expiry on read
//! - Atomic writes (temp file + rename)
//! - A probabilistic sweep bounded by age, entry count and total size

pub mod eviction;
pub mod hash;
pub mod store;

pub use crate::Error;

pub use eviction::{CleanupPolicy, CleanupReport};
pub use hash::query_key;
pub use store::{CacheStats, CacheStore};
