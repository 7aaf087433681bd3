//! Crawl plan (YAML) and runtime settings (environment).
//!
//! The plan file declares categories and their root URLs:
//!
//! ```yaml
//! crawler:
//!   categories:
//!     - name: legislation
//!       description: National gazette documents
//!       urls:
//!         - url: https://gazette.example/acts
//!           type: 2
//!           target_patterns: ['.*\.pdf$']
//!           seed_pattern: '.*/acts/page/\d+'
//!           max_depth: 1
//! ```
//!
//! Loading is fail-fast: one invalid root URL rejects the whole plan, so
//! a bad config never produces a half-seeded frontier.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;
use crate::frontier::{NewFrontierEntry, RetryConfig, UrlType};
use crate::orchestrator::CrawlConfig;
use crate::throttle::ThrottleConfig;

#[derive(Debug, Clone, Deserialize)]
struct PlanFile {
    crawler: PlanBody,
}

#[derive(Debug, Clone, Deserialize)]
struct PlanBody {
    categories: Vec<CategoryPlan>,
}

/// One category block from the plan file.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryPlan {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub urls: Vec<UrlPlan>,
}

/// One root URL declaration within a category.
#[derive(Debug, Clone, Deserialize)]
pub struct UrlPlan {
    pub url: String,
    #[serde(rename = "type")]
    pub url_type: UrlType,
    #[serde(default)]
    pub target_patterns: Vec<String>,
    #[serde(default)]
    pub seed_pattern: Option<String>,
    /// Optional for types with a fixed depth requirement, mandatory for
    /// type 4.
    #[serde(default)]
    pub max_depth: Option<u32>,
}

/// The whole validated crawl plan.
#[derive(Debug, Clone)]
pub struct CrawlPlan {
    pub categories: Vec<CategoryPlan>,
}

impl CrawlPlan {
    pub fn from_yaml(yaml: &str) -> Result<Self, AppError> {
        let file: PlanFile = serde_yaml::from_str(yaml)
            .map_err(|e| AppError::ValidationError(format!("Invalid crawl plan: {e}")))?;
        let plan = Self {
            categories: file.crawler.categories,
        };
        plan.validate()?;
        Ok(plan)
    }

    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            AppError::ValidationError(format!("Cannot read crawl plan {}: {e}", path.display()))
        })?;
        Self::from_yaml(&yaml)
    }

    /// Build every root entry up front so invalid declarations surface
    /// before anything touches the database.
    fn validate(&self) -> Result<(), AppError> {
        if self.categories.is_empty() {
            return Err(AppError::ValidationError(
                "Crawl plan has no categories".into(),
            ));
        }
        for category in &self.categories {
            category.roots()?;
        }
        Ok(())
    }

    pub fn category(&self, name: &str) -> Option<&CategoryPlan> {
        self.categories.iter().find(|c| c.name == name)
    }
}

impl CategoryPlan {
    /// Root frontier entries for this category, in plan order.
    pub fn roots(&self) -> Result<Vec<NewFrontierEntry>, AppError> {
        self.urls
            .iter()
            .map(|u| {
                let max_depth = match (u.max_depth, u.url_type.required_max_depth()) {
                    (Some(d), _) => d,
                    (None, Some(d)) => d,
                    (None, None) => {
                        return Err(AppError::ValidationError(format!(
                            "max_depth is required for type {} URL '{}'",
                            u.url_type.as_u8(),
                            u.url
                        )));
                    }
                };
                NewFrontierEntry::root(
                    &self.name,
                    &u.url,
                    u.url_type,
                    u.target_patterns.clone(),
                    u.seed_pattern.clone(),
                    max_depth,
                )
            })
            .collect()
    }
}

/// Runtime knobs read from the environment.
#[derive(Debug, Clone)]
pub struct CrawlerSettings {
    /// Per-host delay between requests (`REQUEST_DELAY_MS`, default 1000).
    pub request_delay: Duration,
    /// HTTP timeout per fetch (`FETCH_TIMEOUT_SECS`, default 30).
    pub fetch_timeout: Duration,
    /// Concurrent pages per batch (`MAX_CONCURRENT_PAGES`, default 5).
    pub max_concurrent_pages: usize,
    /// Frontier entries claimed per round (`BATCH_SIZE`, default 50).
    pub batch_size: usize,
    /// API key for the semantic extractor (`HARVEST_API_KEY`).
    pub api_key: Option<String>,
    /// Model for the semantic extractor (`HARVEST_MODEL`).
    pub model: String,
    /// OpenAI-compatible endpoint (`HARVEST_BASE_URL`).
    pub base_url: String,
}

impl CrawlerSettings {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse settings through a lookup function, so tests can inject
    /// values without touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        Ok(Self {
            request_delay: Duration::from_millis(parse_or(&lookup, "REQUEST_DELAY_MS", 1000)?),
            fetch_timeout: Duration::from_secs(parse_or(&lookup, "FETCH_TIMEOUT_SECS", 30)?),
            max_concurrent_pages: parse_nonzero_or(&lookup, "MAX_CONCURRENT_PAGES", 5)?,
            batch_size: parse_nonzero_or(&lookup, "BATCH_SIZE", 50)?,
            api_key: lookup("HARVEST_API_KEY"),
            model: lookup("HARVEST_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            base_url: lookup("HARVEST_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        })
    }

    pub fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            batch_size: self.batch_size,
            max_concurrent_pages: self.max_concurrent_pages,
            retry: RetryConfig::default(),
        }
    }

    pub fn throttle_config(&self) -> ThrottleConfig {
        ThrottleConfig::new(self.request_delay).with_jitter(self.request_delay / 2)
    }
}

fn parse_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, AppError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            AppError::ConfigError(format!("Invalid {key} '{raw}': must be a non-negative integer"))
        }),
    }
}

fn parse_nonzero_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: usize,
) -> Result<usize, AppError> {
    let value = parse_or(lookup, key, default as u64)? as usize;
    if value == 0 {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(value)
}
