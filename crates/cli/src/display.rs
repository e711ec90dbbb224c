//! Plain-text rendering and the interactive selection prompt.

use std::fmt::Write as _;

use async_trait::async_trait;
use shelf_client::{SearchOutcome, SelectionPrompt};
use shelf_core::{Book, CacheStats, Error};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// One numbered line per book: `1. Title - Author (date, TYPE)`.
pub(crate) fn render_books(books: &[Book]) -> String {
    let mut out = String::new();
    for (i, book) in books.iter().enumerate() {
        let _ = write!(out, "{:>3}. {} - {}", i + 1, book.title, book.author);
        let details: Vec<&str> = [book.date.as_deref(), book.filetype.as_deref()].into_iter().flatten().collect();
        if !details.is_empty() {
            let _ = write!(out, " ({})", details.join(", "));
        }
        out.push('\n');
    }
    out
}

pub(crate) fn render_outcome(outcome: &SearchOutcome, listed: bool) -> String {
    if outcome.books.is_empty() {
        return "No books found.\n".to_string();
    }

    let mut out = if listed { String::new() } else { render_books(&outcome.books) };
    if outcome.cache_hit {
        out.push_str("(cached results)\n");
    }
    for &index in &outcome.chosen {
        let book = &outcome.books[index];
        let verb = if outcome.opened.contains(&index) { "Opened" } else { "Selected" };
        let _ = writeln!(out, "{verb}: {} - {}", book.title, book.url.as_deref().unwrap_or("(no link)"));
    }
    out
}

pub(crate) fn render_stats(stats: &CacheStats) -> String {
    let mut out = format!("entries: {}\nsize: {} bytes\n", stats.count, stats.total_bytes);
    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        let _ = writeln!(out, "oldest: {}\nnewest: {}", oldest.to_rfc3339(), newest.to_rfc3339());
    }
    out
}

/// Reads the selection from stdin after listing the books.
///
/// When stdin is not a terminal nothing is read and nothing gets selected.
pub(crate) struct StdinPrompt {
    interactive: bool,
}

impl StdinPrompt {
    pub(crate) fn new(interactive: bool) -> Self {
        Self { interactive }
    }
}

#[async_trait]
impl SelectionPrompt for StdinPrompt {
    async fn prompt(&self, books: &[Book]) -> Result<String, Error> {
        let mut stdout = tokio::io::stdout();
        let listing = render_books(books);
        stdout.write_all(listing.as_bytes()).await.map_err(|e| Error::Prompt(e.to_string()))?;

        if !self.interactive {
            stdout.flush().await.map_err(|e| Error::Prompt(e.to_string()))?;
            return Ok(String::new());
        }

        stdout
            .write_all(b"Open which books? (e.g. 1,3 or all): ")
            .await
            .map_err(|e| Error::Prompt(e.to_string()))?;
        stdout.flush().await.map_err(|e| Error::Prompt(e.to_string()))?;

        let mut line = Vec::new();
        BufReader::new(tokio::io::stdin())
            .read_until(b'\n', &mut line)
            .await
            .map_err(|e| Error::Prompt(e.to_string()))?;
        Ok(String::from_utf8_lossy(&line).trim().to_string())
    }
}
