//! Query fingerprints used as cache keys.

use sha2::{Digest, Sha256};

use crate::query::normalize_query;

/// Compute the cache key for a search query.
///
/// The query is normalized first, so `"ruby  programming "` and
/// `"ruby programming"` share an entry.
pub fn query_key(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_query(query).as_bytes());
    hex::encode(hasher.finalize())
}

/// True if `s` has the shape of a key produced by [`query_key`].
pub fn is_valid_key(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
