//! Book extraction from archive search pages.
//!
//! ### Blocks
//! - A `DocumentQuery` splits the page into `ResultBlock`s (the scraper-backed `HtmlQuery` by default).
//!
//! ### Field rules
//! - Blocks containing the ad marker are skipped.
//! - `title` is the second non-empty line, falling back to the first.
//! - `author` comes from the author link and is required.
//! - `date` and `filetype` come from ordered pattern lists (see [`patterns`]).
//! - `url` is the result link resolved against the base URL.
//! - `position` is the 1-based block index, counting skipped blocks.

pub mod blocks;
pub mod patterns;

pub use blocks::{DocumentQuery, HtmlQuery, ResultBlock};
pub use patterns::{Pattern, PatternList};

use shelf_core::{AppConfig, Book, Error};
use url::Url;

use crate::fetch::{parse_base_url, resolve_link};

/// Turns a search page into books.
pub struct Extractor {
    query: Box<dyn DocumentQuery>,
    base_url: Url,
    ad_marker: String,
    dates: PatternList,
    filetypes: PatternList,
}

impl Extractor {
    pub fn new(
        query: Box<dyn DocumentQuery>, base_url: Url, ad_marker: impl Into<String>, dates: PatternList,
        filetypes: PatternList,
    ) -> Self {
        Self { query, base_url, ad_marker: ad_marker.into(), dates, filetypes }
    }

    /// Build the scraper-backed extractor, compiling every selector and pattern up front.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let query = HtmlQuery::new(&config.result_selector, &config.author_selector, &config.link_selector)?;
        let base_url = parse_base_url(&config.base_url).map_err(|e| Error::Extract(format!("base_url: {e}")))?;
        let dates = PatternList::compile("date", &config.date_patterns)?;
        let filetypes = PatternList::compile("filetype", &config.filetype_patterns)?;

        Ok(Self::new(Box::new(query), base_url, config.ad_marker.clone(), dates, filetypes))
    }

    pub fn extract(&self, html: &str) -> Vec<Book> {
        let blocks = self.query.blocks(html);
        let total = blocks.len();
        let books: Vec<Book> =
            blocks.iter().enumerate().filter_map(|(index, block)| self.build_book(block, index)).collect();

        tracing::debug!(blocks = total, books = books.len(), "extracted search results");
        books
    }

    fn build_book(&self, block: &ResultBlock, index: usize) -> Option<Book> {
        if !self.ad_marker.is_empty() && block.text.contains(&self.ad_marker) {
            tracing::trace!(index, "skipping ad block");
            return None;
        }

        let lines: Vec<&str> = block.text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let title = lines.get(1).or_else(|| lines.first())?.to_string();

        let author = block.author.as_deref().map(str::trim).filter(|a| !a.is_empty())?.to_string();

        let date = self.dates.first_match(&block.text).map(|(_, value)| value.to_string());
        let filetype = self.filetypes.first_match(&block.text).map(|(_, value)| value.to_uppercase());
        let url = block.href.as_deref().and_then(|href| resolve_link(&self.base_url, href));

        Some(Book { title, author, date, filetype, url, position: index + 1 })
    }
}
