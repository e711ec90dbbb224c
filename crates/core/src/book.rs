//! The book record produced by extraction and stored in the cache.

use serde::{Deserialize, Serialize};

/// One structured search result.
///
/// `position` is the 1-based index of the source block in the result page,
/// counting blocks that were discarded during extraction. It is only stable
/// within a single extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub filetype: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub position: usize,
}
