//! Search query validation and normalization.

use crate::Error;

/// Maximum query length in characters.
pub const MAX_QUERY_CHARS: usize = 200;

/// Characters that are never accepted in a query: markup and shell metacharacters.
const FORBIDDEN: &[char] = &['<', '>', ';', '&', '|', '`', '$', '(', ')', '{', '}', '[', ']'];

/// Validate a search query before any cache or network access.
///
/// # Errors
///
/// Returns `Error::InvalidQuery` if the query is blank, longer than
/// [`MAX_QUERY_CHARS`], or contains a forbidden or control character.
pub fn validate_query(query: &str) -> Result<(), Error> {
    if query.trim().is_empty() {
        return Err(Error::InvalidQuery("query cannot be empty".into()));
    }

    let len = query.chars().count();
    if len > MAX_QUERY_CHARS {
        return Err(Error::InvalidQuery(format!("query too long: {len} chars (max {MAX_QUERY_CHARS})")));
    }

    if let Some(c) = query.chars().find(|c| FORBIDDEN.contains(c)) {
        return Err(Error::InvalidQuery(format!("query contains forbidden character {c:?}")));
    }

    if query.chars().any(char::is_control) {
        return Err(Error::InvalidQuery("query contains control characters".into()));
    }

    Ok(())
}

/// Normalize a query for fingerprinting: trim and collapse whitespace runs.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}
