//! Crawl run coordination: seeding, claiming, retrying, accounting.
//!
//! The orchestrator drives a whole category crawl. Roots are crawled in
//! plan order; for each root it seeds the frontier, then drains pending
//! entries in claimed batches, processing each batch concurrently
//! through the [`StrategyDispatcher`]. Audit rows go to a
//! [`RunLogStore`], progress events to a [`CrawlReporter`].

use std::sync::Mutex;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::dispatcher::StrategyDispatcher;
use crate::error::AppError;
use crate::frontier::{FrontierEntry, NewFrontierEntry, RetryConfig, UrlStatus};
use crate::run_log::{RunCounters, RunLogStore, RunStatus};
use crate::store::FrontierStore;
use crate::traits::{Fetcher, LinkExtractor, SemanticExtractor};

/// Events emitted during a crawl run for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CrawlEvent<'a> {
    RunStarted {
        category: &'a str,
        roots: usize,
    },
    AbandonedReset {
        count: u64,
    },
    RootSeeded {
        url: &'a str,
    },
    /// The root URL was already in the frontier (resumed run).
    RootSkipped {
        url: &'a str,
    },
    BatchClaimed {
        count: usize,
    },
    EntryStarted {
        id: Uuid,
        url: &'a str,
    },
    EntryProcessed {
        id: Uuid,
        targets: usize,
        seeds: usize,
    },
    EntryRetrying {
        url: &'a str,
        attempt: u32,
        delay_ms: u64,
        error: &'a str,
    },
    EntryFailed {
        id: Uuid,
        url: &'a str,
        error: &'a str,
    },
    RunFinished {
        category: &'a str,
        counters: RunCounters,
    },
}

/// Trait for receiving crawl events (decoupled logging).
pub trait CrawlReporter: Send + Sync {
    fn report(&self, event: CrawlEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCrawlReporter;

impl CrawlReporter for TracingCrawlReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        match event {
            CrawlEvent::RunStarted { category, roots } => {
                tracing::info!(%category, %roots, "Crawl run started");
            }
            CrawlEvent::AbandonedReset { count } => {
                if count > 0 {
                    tracing::warn!(%count, "Reset abandoned entries back to pending");
                }
            }
            CrawlEvent::RootSeeded { url } => {
                tracing::info!(%url, "Root URL seeded");
            }
            CrawlEvent::RootSkipped { url } => {
                tracing::info!(%url, "Root URL already in frontier, resuming");
            }
            CrawlEvent::BatchClaimed { count } => {
                tracing::debug!(%count, "Batch claimed");
            }
            CrawlEvent::EntryStarted { id, url } => {
                tracing::debug!(%id, %url, "Processing entry");
            }
            CrawlEvent::EntryProcessed { id, targets, seeds } => {
                tracing::info!(%id, %targets, %seeds, "Entry processed");
            }
            CrawlEvent::EntryRetrying {
                url,
                attempt,
                delay_ms,
                error,
            } => {
                tracing::warn!(%url, %attempt, %delay_ms, %error, "Transient failure, retrying");
            }
            CrawlEvent::EntryFailed { id, url, error } => {
                tracing::warn!(%id, %url, %error, "Entry failed");
            }
            CrawlEvent::RunFinished { category, counters } => {
                tracing::info!(
                    %category,
                    targets = counters.target_urls,
                    seeds = counters.seed_urls,
                    failed = counters.failed_urls,
                    "Crawl run finished"
                );
            }
        }
    }
}

/// Tuning knobs for a crawl run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Entries claimed from the frontier per round.
    pub batch_size: usize,
    /// Entries processed concurrently within a batch.
    pub max_concurrent_pages: usize,
    /// In-process retry policy for transient fetch/extractor failures.
    pub retry: RetryConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_concurrent_pages: 5,
            retry: RetryConfig::default(),
        }
    }
}

/// Drives a category crawl to completion.
pub struct CrawlOrchestrator<F, L, X, S, R>
where
    F: Fetcher,
    L: LinkExtractor,
    X: SemanticExtractor,
    S: FrontierStore,
    R: RunLogStore,
{
    dispatcher: StrategyDispatcher<F, L, X, S>,
    store: S,
    run_log: R,
    config: CrawlConfig,
}

impl<F, L, X, S, R> CrawlOrchestrator<F, L, X, S, R>
where
    F: Fetcher,
    L: LinkExtractor,
    X: SemanticExtractor,
    S: FrontierStore,
    R: RunLogStore,
{
    pub fn new(
        dispatcher: StrategyDispatcher<F, L, X, S>,
        store: S,
        run_log: R,
        config: CrawlConfig,
    ) -> Self {
        Self {
            dispatcher,
            store,
            run_log,
            config,
        }
    }

    /// Run the crawl for one category. Roots are seeded and drained in
    /// order; entries left `processing` by an earlier crash are reset to
    /// `pending` first, so interrupted runs resume cleanly.
    pub async fn run<CR: CrawlReporter>(
        &self,
        category: &str,
        roots: &[NewFrontierEntry],
        cancel_token: CancellationToken,
        reporter: &CR,
    ) -> Result<RunCounters, AppError> {
        reporter.report(CrawlEvent::RunStarted {
            category,
            roots: roots.len(),
        });

        let reset = self.store.reset_abandoned(category).await?;
        reporter.report(CrawlEvent::AbandonedReset { count: reset });

        let mut totals = RunCounters::default();

        for root in roots {
            if cancel_token.is_cancelled() {
                break;
            }

            let log_id = self
                .run_log
                .create(category, &root.url, root.url_type, root.max_depth)
                .await?;

            if self.store.insert(root).await?.is_duplicate() {
                reporter.report(CrawlEvent::RootSkipped { url: &root.url });
            } else {
                reporter.report(CrawlEvent::RootSeeded { url: &root.url });
            }
            self.run_log.start(log_id).await?;

            let counters = match self.drain(category, &cancel_token, reporter).await {
                Ok(counters) => counters,
                Err(e) => {
                    self.run_log
                        .finish(log_id, RunStatus::Failed, Some(&e.to_string()))
                        .await?;
                    return Err(e);
                }
            };
            self.run_log.add_counters(log_id, counters).await?;

            let (status, note) = if cancel_token.is_cancelled() {
                (RunStatus::Failed, Some("crawl cancelled"))
            } else {
                (RunStatus::Completed, None)
            };
            self.run_log.finish(log_id, status, note).await?;

            totals.target_urls += counters.target_urls;
            totals.seed_urls += counters.seed_urls;
            totals.failed_urls += counters.failed_urls;
        }

        // Entries reclaimed from an aborted run may not belong to any of
        // the roots above (e.g. an empty or reordered plan); pick them up
        // with a final drain.
        if !cancel_token.is_cancelled() {
            let leftovers = self.drain(category, &cancel_token, reporter).await?;
            totals.target_urls += leftovers.target_urls;
            totals.seed_urls += leftovers.seed_urls;
            totals.failed_urls += leftovers.failed_urls;
        }

        reporter.report(CrawlEvent::RunFinished {
            category,
            counters: totals,
        });
        Ok(totals)
    }

    /// Claim-and-process rounds until the frontier has no pending entries
    /// for this category or the run is cancelled.
    ///
    /// A store error aborts the current batch: rows already committed
    /// stay committed, entries not yet marked stay `processing` and are
    /// reclaimed by `reset_abandoned` on the next run.
    async fn drain<CR: CrawlReporter>(
        &self,
        category: &str,
        cancel_token: &CancellationToken,
        reporter: &CR,
    ) -> Result<RunCounters, AppError> {
        let counters = Mutex::new(RunCounters::default());

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            let batch = self
                .store
                .claim_pending(category, None, self.config.batch_size)
                .await?;
            if batch.is_empty() {
                break;
            }
            reporter.report(CrawlEvent::BatchClaimed { count: batch.len() });

            let store_failure = Mutex::new(None::<AppError>);
            futures::stream::iter(batch.iter())
                .for_each_concurrent(self.config.max_concurrent_pages, |entry| {
                    let counters = &counters;
                    let store_failure = &store_failure;
                    async move {
                        if let Err(e) = self.process_entry(entry, counters, reporter).await {
                            tracing::error!(url = %entry.url, error = %e, "Store error, aborting batch");
                            if let Ok(mut slot) = store_failure.lock() {
                                slot.get_or_insert(e);
                            }
                        }
                    }
                })
                .await;

            if let Some(e) = store_failure.into_inner().unwrap_or(None) {
                return Err(e);
            }
        }

        Ok(counters.into_inner().unwrap_or_default())
    }

    /// One entry end to end: dispatch with bounded retries, enqueue its
    /// children, then mark the terminal status. A dispatch failure marks
    /// the entry failed and never aborts the batch; a store failure is
    /// returned before the entry turns terminal, so nothing discovered on
    /// the page is lost or counted.
    async fn process_entry<CR: CrawlReporter>(
        &self,
        entry: &FrontierEntry,
        counters: &Mutex<RunCounters>,
        reporter: &CR,
    ) -> Result<(), AppError> {
        reporter.report(CrawlEvent::EntryStarted {
            id: entry.id,
            url: &entry.url,
        });

        match self.dispatch_with_retry(entry, reporter).await {
            Ok(children) => {
                let targets = children.iter().filter(|c| c.is_target).count();
                let seeds = children.len() - targets;

                // Children land in the frontier before the parent turns
                // terminal, so an abort in between re-runs the parent
                // instead of losing its links.
                if !children.is_empty() {
                    let report = self.store.insert_batch(&children).await?;
                    if report.skipped > 0 {
                        tracing::debug!(
                            parent = %entry.url,
                            skipped = report.skipped,
                            "Duplicate children skipped"
                        );
                    }
                }

                self.store
                    .mark_result(entry.id, UrlStatus::Processed, None)
                    .await?;

                reporter.report(CrawlEvent::EntryProcessed {
                    id: entry.id,
                    targets,
                    seeds,
                });
                if let Ok(mut c) = counters.lock() {
                    c.target_urls += targets as i64;
                    c.seed_urls += seeds as i64;
                }
            }
            Err(e) => {
                let error_msg = e.to_string();
                reporter.report(CrawlEvent::EntryFailed {
                    id: entry.id,
                    url: &entry.url,
                    error: &error_msg,
                });
                self.store
                    .mark_result(entry.id, UrlStatus::Failed, Some(&error_msg))
                    .await?;
                if let Ok(mut c) = counters.lock() {
                    c.failed_urls += 1;
                }
            }
        }
        Ok(())
    }

    /// Retry transient failures with exponential backoff; permanent
    /// failures and exhausted budgets return the last error.
    async fn dispatch_with_retry<CR: CrawlReporter>(
        &self,
        entry: &FrontierEntry,
        reporter: &CR,
    ) -> Result<Vec<NewFrontierEntry>, AppError> {
        let mut attempt = 0;
        loop {
            match self.dispatcher.process(entry).await {
                Ok(children) => return Ok(children),
                Err(e) if e.is_retryable() && attempt < self.config.retry.max_retries => {
                    attempt += 1;
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    reporter.report(CrawlEvent::EntryRetrying {
                        url: &entry.url,
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                        error: &e.to_string(),
                    });
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
