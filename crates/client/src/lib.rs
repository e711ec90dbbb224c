//! Client code for shelf.
//!
//! This crate provides the HTTP fetch pipeline, search result extraction,
//! book opening and the search orchestrator used by the CLI.

pub mod extract;
pub mod fetch;
pub mod open;
pub mod pipeline;

pub use extract::{DocumentQuery, Extractor, HtmlQuery, Pattern, PatternList, ResultBlock};
pub use fetch::{FetchConfig, FetchError, Fetcher, HttpTransport, RawDocument, RetryPolicy, Transport, search_url};
pub use open::{AvailabilityCache, CommandOpener, DryRunOpener, Opener};
pub use pipeline::{PipelineSettings, SearchOutcome, SearchPipeline, SelectionPrompt};
