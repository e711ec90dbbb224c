//! Search orchestration: validate, consult the cache, fetch, extract, select, open.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use shelf_core::selection::resolve;
use shelf_core::{AppConfig, Book, CacheStore, CleanupPolicy, Error, query_key, validate_query};
use url::Url;

use crate::extract::Extractor;
use crate::fetch::{FetchConfig, FetchError, Fetcher, HttpTransport, RetryPolicy, Transport, parse_base_url, search_url};
use crate::open::Opener;

/// Supplies selection text when none was given up front.
#[async_trait]
pub trait SelectionPrompt: Send + Sync {
    async fn prompt(&self, books: &[Book]) -> Result<String, Error>;
}

/// What one search produced.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub books: Vec<Book>,
    /// Zero-based indices into `books`, in the order they were selected
    pub chosen: Vec<usize>,
    pub cache_hit: bool,
    /// Indices from `chosen` whose open call succeeded
    pub opened: Vec<usize>,
}

/// Knobs the pipeline reads on every search.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub base_url: Url,
    pub ttl: Duration,
    pub cleanup: CleanupPolicy,
    /// Skip the cache lookup; fresh results are still written back.
    pub force_refresh: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let base_url = parse_base_url(&config.base_url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        Ok(Self {
            base_url,
            ttl: config.cache_ttl(),
            cleanup: CleanupPolicy {
                ttl: config.cache_ttl(),
                max_entries: config.max_entries,
                max_bytes: config.max_bytes,
                probability: config.cleanup_probability,
            },
            force_refresh: false,
        })
    }
}

pub struct SearchPipeline<T: Transport = HttpTransport> {
    settings: PipelineSettings,
    cache: Option<CacheStore>,
    fetcher: Fetcher<T>,
    extractor: Extractor,
    opener: Box<dyn Opener>,
    prompt: Box<dyn SelectionPrompt>,
}

impl SearchPipeline<HttpTransport> {
    /// Wire the HTTP transport, cache and extractor from configuration.
    ///
    /// A cache directory that cannot be opened disables caching rather than failing.
    pub fn from_config(
        config: &AppConfig, opener: Box<dyn Opener>, prompt: Box<dyn SelectionPrompt>,
    ) -> Result<Self, Error> {
        let cache = match CacheStore::open(&config.cache_dir) {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!(dir = %config.cache_dir.display(), "cache unavailable, continuing without it: {}", e);
                None
            }
        };

        let transport = HttpTransport::new(FetchConfig::from_app_config(config))?;
        let policy = RetryPolicy {
            max_retries: config.max_retries,
            base_delay: config.retry_base(),
            max_delay: config.retry_max_delay(),
        };

        Ok(Self::new(
            PipelineSettings::from_config(config)?,
            cache,
            Fetcher::new(transport, policy),
            Extractor::from_config(config)?,
            opener,
            prompt,
        ))
    }
}

impl<T: Transport> SearchPipeline<T> {
    pub fn new(
        settings: PipelineSettings, cache: Option<CacheStore>, fetcher: Fetcher<T>, extractor: Extractor,
        opener: Box<dyn Opener>, prompt: Box<dyn SelectionPrompt>,
    ) -> Self {
        Self { settings, cache, fetcher, extractor, opener, prompt }
    }

    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.settings.force_refresh = force_refresh;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref()
    }

    pub fn fetcher(&self) -> &Fetcher<T> {
        &self.fetcher
    }

    /// Run one search. Only validation and network failures are returned as errors.
    pub async fn search(&self, query: &str, selection: Option<&str>) -> Result<SearchOutcome, Error> {
        validate_query(query)?;
        let key = query_key(query);

        self.run_cleanup();

        let cached = match (&self.cache, self.settings.force_refresh) {
            (Some(cache), false) => cache.load(&key, self.settings.ttl),
            _ => None,
        };
        let cache_hit = cached.is_some();

        let books = match cached {
            Some(books) => {
                tracing::debug!(key = %key, count = books.len(), "cache hit");
                books
            }
            None => {
                tracing::debug!(key = %key, refresh = self.settings.force_refresh, "cache miss");
                let books = self.fetch_books(query).await?;
                self.store(&key, &books);
                books
            }
        };

        if books.is_empty() {
            tracing::info!(query, "no books found");
            return Ok(SearchOutcome { books, chosen: Vec::new(), cache_hit, opened: Vec::new() });
        }

        let input = match selection {
            Some(selection) => selection.to_string(),
            None => match self.prompt.prompt(&books).await {
                Ok(input) => input,
                Err(e) => {
                    tracing::warn!("selection prompt failed, nothing selected: {}", e);
                    String::new()
                }
            },
        };
        let chosen = resolve(&input, books.len());

        let mut opened = Vec::with_capacity(chosen.len());
        for &index in &chosen {
            if self.opener.open(&books[index]).await {
                opened.push(index);
            }
        }

        tracing::info!(
            query,
            books = books.len(),
            chosen = chosen.len(),
            opened = opened.len(),
            cache_hit,
            "search done"
        );

        Ok(SearchOutcome { books, chosen, cache_hit, opened })
    }

    async fn fetch_books(&self, query: &str) -> Result<Vec<Book>, Error> {
        let url = search_url(&self.settings.base_url, query);
        let doc = self.fetcher.fetch(&url).await?;
        Ok(self.extractor.extract(&doc.text()))
    }

    fn run_cleanup(&self) {
        let Some(cache) = &self.cache else { return };
        if let Err(e) = cache.cleanup(&self.settings.cleanup) {
            tracing::warn!("cache cleanup failed: {}", e);
        }
    }

    fn store(&self, key: &str, books: &[Book]) {
        if let Some(cache) = &self.cache
            && let Err(e) = cache.save(key, books)
        {
            tracing::warn!(key, "failed to cache search results: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::ScriptedTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const RUBY_PAGE: &str = r#"
        <html><body>
            <div class="flex pt-3 pb-3">
                <div>Your ad here.</div>
                <a href="/search?q=Sponsor">Sponsor</a>
            </div>
            <div class="flex pt-3 pb-3">
                <a class="js-vim-focus" href="/md5/aaa">
                    <div>English [en] · PDF · 3.0MB · 2004</div>
                    <h3>Programming Ruby</h3>
                </a>
                <a href="/search?q=Dave+Thomas">Dave Thomas</a>
            </div>
            <div class="flex pt-3 pb-3">
                <a class="js-vim-focus" href="/md5/bbb">
                    <div>English [en] · EPUB · 1.1MB · 2011</div>
                    <h3>Eloquent Ruby</h3>
                </a>
                <a href="/search?q=Russ+Olsen">Russ Olsen</a>
            </div>
        </body></html>
    "#;

    #[derive(Clone, Default)]
    struct RecordingOpener {
        opened: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Opener for RecordingOpener {
        async fn open(&self, book: &Book) -> bool {
            self.opened.lock().unwrap().push(book.title.clone());
            book.url.is_some()
        }
    }

    #[derive(Clone)]
    struct FixedPrompt {
        answer: &'static str,
        asked: Arc<AtomicUsize>,
    }

    impl FixedPrompt {
        fn new(answer: &'static str) -> Self {
            Self { answer, asked: Arc::new(AtomicUsize::new(0)) }
        }
    }

    #[async_trait]
    impl SelectionPrompt for FixedPrompt {
        async fn prompt(&self, _books: &[Book]) -> Result<String, Error> {
            self.asked.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.to_string())
        }
    }

    struct Harness {
        _dir: TempDir,
        pipeline: SearchPipeline<ScriptedTransport>,
        opener: RecordingOpener,
        prompt: FixedPrompt,
    }

    fn harness(script: Vec<Result<&'static str, FetchError>>, answer: &'static str) -> Harness {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            cache_dir: dir.path().to_path_buf(),
            base_url: "https://example.com".into(),
            cleanup_probability: 0.0,
            ..Default::default()
        };
        let opener = RecordingOpener::default();
        let prompt = FixedPrompt::new(answer);
        let policy =
            RetryPolicy { max_retries: 2, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(2) };

        let pipeline = SearchPipeline::new(
            PipelineSettings::from_config(&config).unwrap(),
            Some(CacheStore::open(dir.path()).unwrap()),
            Fetcher::new(ScriptedTransport::new(script), policy),
            Extractor::from_config(&config).unwrap(),
            Box::new(opener.clone()),
            Box::new(prompt.clone()),
        );

        Harness { _dir: dir, pipeline, opener, prompt }
    }

    #[tokio::test]
    async fn test_ruby_programming_end_to_end() {
        let h = harness(vec![Ok(RUBY_PAGE)], "all");

        let outcome = h.pipeline.search("ruby programming", None).await.unwrap();

        assert!(!outcome.cache_hit);
        assert_eq!(outcome.books.len(), 2);
        assert_eq!(outcome.books[0].title, "Programming Ruby");
        assert_eq!(outcome.books[0].position, 2);
        assert_eq!(outcome.books[1].title, "Eloquent Ruby");
        assert_eq!(outcome.books[1].position, 3);
        assert_eq!(outcome.chosen, vec![0, 1]);
        assert_eq!(outcome.opened, vec![0, 1]);
        assert_eq!(*h.opener.opened.lock().unwrap(), vec!["Programming Ruby", "Eloquent Ruby"]);
        assert_eq!(h.prompt.asked.load(Ordering::SeqCst), 1);

        let url = h.pipeline.fetcher().transport().last_url().unwrap();
        assert_eq!(url.as_str(), "https://example.com/search?q=ruby+programming");

        let cache = h.pipeline.cache().unwrap();
        let saved = cache.load(&query_key("ruby programming"), Duration::from_secs(60)).unwrap();
        assert_eq!(saved, outcome.books);
    }

    #[tokio::test]
    async fn test_second_search_hits_cache() {
        let h = harness(vec![Ok(RUBY_PAGE)], "1");

        let first = h.pipeline.search("ruby programming", Some("1")).await.unwrap();
        let second = h.pipeline.search("  ruby   programming ", Some("2")).await.unwrap();

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(second.books, first.books);
        assert_eq!(second.chosen, vec![1]);
        assert_eq!(h.pipeline.fetcher().transport().calls(), 1);
        assert_eq!(h.prompt.asked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let h = harness(vec![Ok(RUBY_PAGE), Ok(RUBY_PAGE)], "1");
        h.pipeline.search("ruby", Some("1")).await.unwrap();

        let pipeline = h.pipeline.with_force_refresh(true);
        let outcome = pipeline.search("ruby", Some("1")).await.unwrap();

        assert!(!outcome.cache_hit);
        assert_eq!(pipeline.fetcher().transport().calls(), 2);
    }

    #[tokio::test]
    async fn test_invalid_query_never_fetches() {
        let h = harness(vec![Ok(RUBY_PAGE)], "all");

        let err = h.pipeline.search("<script>", None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));

        let err = h.pipeline.search("   ", None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));

        assert_eq!(h.pipeline.fetcher().transport().calls(), 0);
    }

    #[tokio::test]
    async fn test_network_failure_after_retries() {
        let h = harness(
            vec![
                Err(FetchError::HttpStatus { status: 503 }),
                Err(FetchError::HttpStatus { status: 503 }),
                Err(FetchError::HttpStatus { status: 503 }),
            ],
            "all",
        );

        let err = h.pipeline.search("ruby", None).await.unwrap_err();
        assert!(matches!(err, Error::Network { class: shelf_core::FailureClass::Transient, .. }));
        assert_eq!(h.pipeline.fetcher().transport().calls(), 3);
        assert!(h.opener.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_failure_not_cached() {
        let h = harness(vec![Err(FetchError::HttpStatus { status: 404 })], "all");

        let err = h.pipeline.search("ruby", None).await.unwrap_err();
        assert!(matches!(err, Error::Network { class: shelf_core::FailureClass::Terminal, .. }));
        assert_eq!(h.pipeline.cache().unwrap().stats().unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_no_results_skips_prompt_and_cache() {
        let h = harness(vec![Ok("<html><body><p>nothing</p></body></html>")], "all");

        let outcome = h.pipeline.search("obscure title", None).await.unwrap();

        assert!(outcome.books.is_empty());
        assert!(outcome.chosen.is_empty());
        assert_eq!(h.prompt.asked.load(Ordering::SeqCst), 0);
        assert_eq!(h.pipeline.cache().unwrap().stats().unwrap().count, 0);
    }

    struct FailingPrompt;

    #[async_trait]
    impl SelectionPrompt for FailingPrompt {
        async fn prompt(&self, _books: &[Book]) -> Result<String, Error> {
            Err(Error::Prompt("stream did not contain valid UTF-8".into()))
        }
    }

    #[tokio::test]
    async fn test_prompt_failure_selects_nothing() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            cache_dir: dir.path().to_path_buf(),
            base_url: "https://example.com".into(),
            cleanup_probability: 0.0,
            ..Default::default()
        };
        let opener = RecordingOpener::default();
        let pipeline = SearchPipeline::new(
            PipelineSettings::from_config(&config).unwrap(),
            Some(CacheStore::open(dir.path()).unwrap()),
            Fetcher::new(ScriptedTransport::new(vec![Ok(RUBY_PAGE)]), RetryPolicy::default()),
            Extractor::from_config(&config).unwrap(),
            Box::new(opener.clone()),
            Box::new(FailingPrompt),
        );

        let outcome = pipeline.search("ruby programming", None).await.unwrap();

        assert_eq!(outcome.books.len(), 2);
        assert!(outcome.chosen.is_empty());
        assert!(outcome.opened.is_empty());
        assert!(opener.opened.lock().unwrap().is_empty());
        assert_eq!(pipeline.cache().unwrap().stats().unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_invalid_selection_opens_nothing() {
        let h = harness(vec![Ok(RUBY_PAGE)], "abc, 9");

        let outcome = h.pipeline.search("ruby", None).await.unwrap();

        assert_eq!(outcome.books.len(), 2);
        assert!(outcome.chosen.is_empty());
        assert!(h.opener.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_works_without_cache() {
        let config = AppConfig { base_url: "https://example.com".into(), ..Default::default() };
        let opener = RecordingOpener::default();
        let pipeline = SearchPipeline::new(
            PipelineSettings::from_config(&config).unwrap(),
            None,
            Fetcher::new(ScriptedTransport::new(vec![Ok(RUBY_PAGE)]), RetryPolicy::default()),
            Extractor::from_config(&config).unwrap(),
            Box::new(opener.clone()),
            Box::new(FixedPrompt::new("2")),
        );

        let outcome = pipeline.search("ruby", None).await.unwrap();
        assert!(!outcome.cache_hit);
        assert_eq!(outcome.opened, vec![1]);
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = SearchOutcome { books: Vec::new(), chosen: vec![0], cache_hit: true, opened: vec![] };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["cache_hit"], true);
        assert_eq!(json["chosen"], serde_json::json!([0]));
        assert!(json["books"].as_array().unwrap().is_empty());
    }
}
