//! Splitting a search page into result blocks.

use scraper::{ElementRef, Html, Selector};
use shelf_core::Error;

/// Raw pieces of one search result, before any field rules are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultBlock {
    /// Flattened text content, one line per text node
    pub text: String,
    /// Text of the first author link, if any
    pub author: Option<String>,
    /// `href` of the first result link, if any
    pub href: Option<String>,
}

/// Yields the result blocks of a document in document order.
pub trait DocumentQuery: Send + Sync {
    fn blocks(&self, html: &str) -> Vec<ResultBlock>;
}

/// scraper-backed [`DocumentQuery`] driven by CSS selectors.
#[derive(Debug)]
pub struct HtmlQuery {
    result: Selector,
    author: Selector,
    link: Selector,
}

fn parse_selector(field: &str, css: &str) -> Result<Selector, Error> {
    Selector::parse(css).map_err(|e| Error::Extract(format!("invalid {field} selector {css:?}: {e}")))
}

/// Concatenate descendant text nodes, one per line.
fn flatten_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).filter(|t| !t.is_empty()).collect::<Vec<_>>().join("\n")
}

impl HtmlQuery {
    pub fn new(result: &str, author: &str, link: &str) -> Result<Self, Error> {
        Ok(Self {
            result: parse_selector("result", result)?,
            author: parse_selector("author", author)?,
            link: parse_selector("link", link)?,
        })
    }
}

impl DocumentQuery for HtmlQuery {
    fn blocks(&self, html: &str) -> Vec<ResultBlock> {
        let document = Html::parse_document(html);

        document
            .select(&self.result)
            .map(|element| {
                let author = element.select(&self.author).next().map(|a| a.text().collect::<String>());
                let href = element.select(&self.link).next().and_then(|a| a.value().attr("href")).map(String::from);
                ResultBlock { text: flatten_text(element), author, href }
            })
            .collect()
    }
}
