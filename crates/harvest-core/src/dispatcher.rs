//! The five-strategy crawl state machine.
//!
//! One operation: [`StrategyDispatcher::process`] takes a claimed frontier
//! entry, decides whether to fetch it, derives child entries from its
//! links, and returns the children. The variant is keyed on
//! `(url_type, depth)`:
//!
//! | Type | Depth            | Link handling                          |
//! |------|------------------|----------------------------------------|
//! | 0    | 0                | none (the entry is the document)       |
//! | 1    | 0                | regex, targets only                    |
//! | 2    | 0                | regex, targets + one level of seeds    |
//! | 2    | 1                | regex, targets only                    |
//! | 3    | 0                | regex, targets + seeds                 |
//! | 3    | 1                | semantic extractor, targets + seeds    |
//! | 3    | 2                | regex, targets only                    |
//! | 4    | < max_depth      | semantic extractor, targets + seeds    |
//! | 4    | max_depth        | regex, targets only                    |

use std::collections::HashSet;

use crate::classifier::{classify, CompiledRules};
use crate::error::AppError;
use crate::frontier::{FrontierEntry, NewFrontierEntry, UrlType};
use crate::store::FrontierStore;
use crate::traits::{Fetcher, LinkExtractor, LinkLabel, SemanticExtractor};

/// Decides, per frontier entry, what to fetch and what children to
/// enqueue. Generic over all external dependencies via traits, so it can
/// be unit-tested with a fake store and fake fetcher.
pub struct StrategyDispatcher<F, L, X, S>
where
    F: Fetcher,
    L: LinkExtractor,
    X: SemanticExtractor,
    S: FrontierStore,
{
    fetcher: F,
    links: L,
    semantic: X,
    store: S,
}

impl<F, L, X, S> StrategyDispatcher<F, L, X, S>
where
    F: Fetcher,
    L: LinkExtractor,
    X: SemanticExtractor,
    S: FrontierStore,
{
    pub fn new(fetcher: F, links: L, semantic: X, store: S) -> Self {
        Self {
            fetcher,
            links,
            semantic,
            store,
        }
    }

    /// Process one claimed entry. `Ok` means the entry is `processed` and
    /// carries the children to enqueue; `Err` means the entry failed
    /// (fetch, pattern, or extractor fault) without affecting siblings.
    pub async fn process(
        &self,
        entry: &FrontierEntry,
    ) -> Result<Vec<NewFrontierEntry>, AppError> {
        // Targets are documents: terminal, never fetched as pages.
        if entry.is_target || entry.url_type == UrlType::DirectTarget {
            tracing::debug!(url = %entry.url, "Target entry, no fetch");
            return Ok(vec![]);
        }

        // Compiled once per entry, reused for every link on the page.
        let rules = CompiledRules::compile(entry)?;

        let html = self.fetcher.fetch(&entry.url).await?;
        tracing::debug!(url = %entry.url, bytes = html.len(), "Page fetched");

        let children = match (entry.url_type, entry.depth) {
            (UrlType::SinglePage, _) => self.regex_targets(entry, &html, &rules)?,
            (UrlType::SeedTarget, 0) | (UrlType::ComplexAi, 0) => {
                self.regex_targets_and_seeds(entry, &html, &rules).await?
            }
            (UrlType::SeedTarget, _) => self.regex_targets(entry, &html, &rules)?,
            (UrlType::ComplexAi, 1) => self.semantic_targets_and_seeds(entry, &html).await?,
            (UrlType::ComplexAi, _) => self.regex_targets(entry, &html, &rules)?,
            (UrlType::FullAi, _) if entry.below_max_depth() => {
                self.semantic_targets_and_seeds(entry, &html).await?
            }
            (UrlType::FullAi, _) => self.regex_targets(entry, &html, &rules)?,
            (UrlType::DirectTarget, _) => unreachable!("handled above"),
        };

        tracing::info!(
            url = %entry.url,
            url_type = %entry.url_type,
            depth = entry.depth,
            targets = children.iter().filter(|c| c.is_target).count(),
            seeds = children.iter().filter(|c| !c.is_target).count(),
            "Entry processed"
        );

        Ok(children)
    }

    /// Terminal-depth handling: classify links against target patterns
    /// only, no recursion.
    fn regex_targets(
        &self,
        entry: &FrontierEntry,
        html: &str,
        rules: &CompiledRules,
    ) -> Result<Vec<NewFrontierEntry>, AppError> {
        let links = self.links.extract_links(html, &entry.url)?;
        let classified = classify(links, rules, &entry.url);

        let mut children = Vec::new();
        for url in dedup(classified.targets) {
            push_target(&mut children, &url, entry);
        }
        Ok(children)
    }

    /// Depth-0 handling for types 2 and 3: both pattern kinds, with
    /// target classification winning on a double match. Seeds already in
    /// the frontier are skipped before an entry is even constructed.
    async fn regex_targets_and_seeds(
        &self,
        entry: &FrontierEntry,
        html: &str,
        rules: &CompiledRules,
    ) -> Result<Vec<NewFrontierEntry>, AppError> {
        let links = self.links.extract_links(html, &entry.url)?;
        let classified = classify(links, rules, &entry.url);

        let mut children = Vec::new();
        for url in dedup(classified.targets) {
            push_target(&mut children, &url, entry);
        }
        for url in dedup(classified.seeds) {
            if self.store.exists(&url).await? {
                tracing::debug!(url = %url, "Seed already in frontier, skipping");
                continue;
            }
            push_seed(&mut children, &url, entry);
        }
        Ok(children)
    }

    /// AI-assisted depths (type 3 depth 1, type 4 below max_depth): the
    /// semantic extractor labels links, regexes are not consulted.
    async fn semantic_targets_and_seeds(
        &self,
        entry: &FrontierEntry,
        html: &str,
    ) -> Result<Vec<NewFrontierEntry>, AppError> {
        let labeled = self.semantic.label_links(html, &entry.url).await?;

        let mut children = Vec::new();
        let mut seen = HashSet::new();
        for link in labeled {
            if link.url == entry.url || !seen.insert(link.url.clone()) {
                continue;
            }
            match link.label {
                LinkLabel::Target => push_target(&mut children, &link.url, entry),
                LinkLabel::Seed => {
                    if self.store.exists(&link.url).await? {
                        tracing::debug!(url = %link.url, "Seed already in frontier, skipping");
                        continue;
                    }
                    push_seed(&mut children, &link.url, entry);
                }
            }
        }
        Ok(children)
    }
}

/// A child that fails per-entry validation (bad host, depth overflow) is
/// dropped with a warning rather than failing the whole page.
fn push_target(children: &mut Vec<NewFrontierEntry>, url: &str, parent: &FrontierEntry) {
    match NewFrontierEntry::child_target(url, parent) {
        Ok(child) => children.push(child),
        Err(e) => tracing::warn!(url = %url, error = %e, "Dropping invalid target child"),
    }
}

fn push_seed(children: &mut Vec<NewFrontierEntry>, url: &str, parent: &FrontierEntry) {
    match NewFrontierEntry::child_seed(url, parent) {
        Ok(child) => children.push(child),
        Err(e) => tracing::warn!(url = %url, error = %e, "Dropping invalid seed child"),
    }
}

fn dedup(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}
