//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::frontier::{derive_main_domain, FrontierEntry, FrontierStats, NewFrontierEntry, UrlStatus, UrlType};
use crate::orchestrator::{CrawlEvent, CrawlReporter};
use crate::store::{BatchInsertReport, FrontierStore, InsertOutcome};
use crate::traits::{Fetcher, LabeledLink, LinkExtractor, SemanticExtractor};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher with a queue of scripted responses. Each call pops the
/// first element; once the queue is empty every call returns a default
/// link-free page.
#[derive(Clone)]
pub struct MockFetcher {
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Number of fetches performed so far.
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, AppError> {
        *self.calls.lock().unwrap() += 1;
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockLinkExtractor
// ---------------------------------------------------------------------------

/// Naive href scanner, good enough for test fixtures. Relative hrefs are
/// resolved against the page URL.
#[derive(Clone, Copy)]
pub struct MockLinkExtractor;

impl LinkExtractor for MockLinkExtractor {
    fn extract_links(&self, html: &str, base_url: &str) -> Result<Vec<String>, AppError> {
        let base = url::Url::parse(base_url)
            .map_err(|e| AppError::ValidationError(format!("invalid base url: {e}")))?;
        let mut links = Vec::new();
        for chunk in html.split("href=\"").skip(1) {
            if let Some(raw) = chunk.split('"').next() {
                if let Ok(resolved) = base.join(raw) {
                    links.push(resolved.to_string());
                }
            }
        }
        Ok(links)
    }
}

// ---------------------------------------------------------------------------
// MockSemanticExtractor
// ---------------------------------------------------------------------------

/// Mock semantic extractor returning a fixed labeling or an error.
#[derive(Clone)]
pub struct MockSemanticExtractor {
    links: Arc<Mutex<Vec<LabeledLink>>>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockSemanticExtractor {
    pub fn empty() -> Self {
        Self::with_links(Vec::new())
    }

    pub fn with_links(links: Vec<LabeledLink>) -> Self {
        Self {
            links: Arc::new(Mutex::new(links)),
            error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            links: Arc::new(Mutex::new(Vec::new())),
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl SemanticExtractor for MockSemanticExtractor {
    async fn label_links(
        &self,
        _content: &str,
        _base_url: &str,
    ) -> Result<Vec<LabeledLink>, AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(self.links.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryFrontierStore
// ---------------------------------------------------------------------------

/// In-memory [`FrontierStore`] backed by a Vec, preserving insertion
/// order so claims come back oldest first like the SQL implementation.
#[derive(Clone)]
pub struct MemoryFrontierStore {
    entries: Arc<Mutex<Vec<FrontierEntry>>>,
}

impl MemoryFrontierStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all stored entries.
    pub fn entries(&self) -> Vec<FrontierEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn get_entry(&self, url: &str) -> Option<FrontierEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.url == url)
            .cloned()
    }
}

impl Default for MemoryFrontierStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FrontierStore for MemoryFrontierStore {
    async fn insert(&self, entry: &NewFrontierEntry) -> Result<InsertOutcome, AppError> {
        let mut entries = self.entries.lock().unwrap();
        if entries.iter().any(|e| e.url == entry.url) {
            return Ok(InsertOutcome::Duplicate);
        }
        let id = Uuid::new_v4();
        let now = Utc::now();
        entries.push(FrontierEntry {
            id,
            category: entry.category.clone(),
            url: entry.url.clone(),
            url_type: entry.url_type,
            depth: entry.depth,
            main_domain: entry.main_domain.clone(),
            target_patterns: entry.target_patterns.clone(),
            seed_pattern: entry.seed_pattern.clone(),
            max_depth: entry.max_depth,
            is_target: entry.is_target,
            parent_url: entry.parent_url.clone(),
            status: UrlStatus::Pending,
            error_message: None,
            insert_date: now,
            last_update: now,
        });
        Ok(InsertOutcome::Inserted(id))
    }

    async fn insert_batch(
        &self,
        entries: &[NewFrontierEntry],
    ) -> Result<BatchInsertReport, AppError> {
        let mut report = BatchInsertReport::default();
        for entry in entries {
            match self.insert(entry).await? {
                InsertOutcome::Inserted(_) => report.inserted += 1,
                InsertOutcome::Duplicate => report.skipped += 1,
            }
        }
        Ok(report)
    }

    async fn claim_pending(
        &self,
        category: &str,
        url_type: Option<UrlType>,
        limit: usize,
    ) -> Result<Vec<FrontierEntry>, AppError> {
        let mut entries = self.entries.lock().unwrap();
        let mut claimed = Vec::new();
        for entry in entries.iter_mut() {
            if claimed.len() >= limit {
                break;
            }
            if entry.category == category
                && entry.status == UrlStatus::Pending
                && url_type.is_none_or(|t| entry.url_type == t)
            {
                entry.status = UrlStatus::Processing;
                entry.last_update = Utc::now();
                claimed.push(entry.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_result(
        &self,
        id: Uuid,
        status: UrlStatus,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
            if entry.status.is_terminal() {
                return Ok(());
            }
            entry.status = status;
            entry.error_message = error_message.map(str::to_string);
            entry.last_update = Utc::now();
        }
        Ok(())
    }

    async fn exists(&self, url: &str) -> Result<bool, AppError> {
        Ok(self.entries.lock().unwrap().iter().any(|e| e.url == url))
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<FrontierEntry>, AppError> {
        Ok(self.get_entry(url))
    }

    async fn reset_abandoned(&self, category: &str) -> Result<u64, AppError> {
        let mut entries = self.entries.lock().unwrap();
        let mut count = 0;
        for entry in entries.iter_mut() {
            if entry.category == category && entry.status == UrlStatus::Processing {
                entry.status = UrlStatus::Pending;
                entry.last_update = Utc::now();
                count += 1;
            }
        }
        Ok(count)
    }

    async fn statistics(&self, category: &str) -> Result<Option<FrontierStats>, AppError> {
        let entries = self.entries.lock().unwrap();
        let in_category: Vec<_> = entries.iter().filter(|e| e.category == category).collect();
        if in_category.is_empty() {
            return Ok(None);
        }
        let count = |s: UrlStatus| in_category.iter().filter(|e| e.status == s).count() as i64;
        let domains: std::collections::HashSet<_> =
            in_category.iter().map(|e| e.main_domain.as_str()).collect();
        Ok(Some(FrontierStats {
            category: category.to_string(),
            total_urls: in_category.len() as i64,
            target_urls: in_category.iter().filter(|e| e.is_target).count() as i64,
            pending_urls: count(UrlStatus::Pending),
            processed_urls: count(UrlStatus::Processed),
            failed_urls: count(UrlStatus::Failed),
            skipped_urls: count(UrlStatus::Skipped),
            unique_domains: domains.len() as i64,
            max_reached_depth: in_category.iter().map(|e| e.depth as i64).max().unwrap_or(0),
        }))
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Crawl reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CrawlReporter for MockReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        let label = match &event {
            CrawlEvent::RunStarted { .. } => "RunStarted",
            CrawlEvent::AbandonedReset { .. } => "AbandonedReset",
            CrawlEvent::RootSeeded { .. } => "RootSeeded",
            CrawlEvent::RootSkipped { .. } => "RootSkipped",
            CrawlEvent::BatchClaimed { .. } => "BatchClaimed",
            CrawlEvent::EntryStarted { .. } => "EntryStarted",
            CrawlEvent::EntryProcessed { .. } => "EntryProcessed",
            CrawlEvent::EntryRetrying { .. } => "EntryRetrying",
            CrawlEvent::EntryFailed { .. } => "EntryFailed",
            CrawlEvent::RunFinished { .. } => "RunFinished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Build a frontier entry as if it had been claimed for processing.
/// Target patterns match `*.pdf`, the seed pattern matches `/list/`
/// paths on the same fixture host.
pub fn make_entry(url: &str, url_type: UrlType, depth: u32, max_depth: u32) -> FrontierEntry {
    let now = Utc::now();
    FrontierEntry {
        id: Uuid::new_v4(),
        category: "docs".to_string(),
        url: url.to_string(),
        url_type,
        depth,
        main_domain: derive_main_domain(url).unwrap_or_else(|_| "x".to_string()),
        target_patterns: vec![r".*\.pdf$".to_string()],
        seed_pattern: Some(r"https://x/list/.*".to_string()),
        max_depth,
        is_target: url_type == UrlType::DirectTarget,
        parent_url: None,
        status: UrlStatus::Processing,
        error_message: None,
        insert_date: now,
        last_update: now,
    }
}
