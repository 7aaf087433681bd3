use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::AppError;

/// Crawl strategy selected by a frontier entry. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum UrlType {
    /// Type 0: the URL is itself the document. Never fetched.
    DirectTarget,
    /// Type 1: a single page whose outbound links are matched against
    /// target patterns.
    SinglePage,
    /// Type 2: seed + target page, one level of recursion.
    SeedTarget,
    /// Type 3: regex at depth 0, semantic extraction at depth 1, targets
    /// only at depth 2.
    ComplexAi,
    /// Type 4: semantic extraction at every depth below the last.
    FullAi,
}

impl UrlType {
    pub fn as_u8(self) -> u8 {
        match self {
            UrlType::DirectTarget => 0,
            UrlType::SinglePage => 1,
            UrlType::SeedTarget => 2,
            UrlType::ComplexAi => 3,
            UrlType::FullAi => 4,
        }
    }

    /// The max_depth this type requires, or `None` when the bound is
    /// configurable (type 4 accepts any max_depth >= 2).
    pub fn required_max_depth(self) -> Option<u32> {
        match self {
            UrlType::DirectTarget | UrlType::SinglePage => Some(0),
            UrlType::SeedTarget => Some(1),
            UrlType::ComplexAi => Some(2),
            UrlType::FullAi => None,
        }
    }

    pub fn requires_seed_pattern(self) -> bool {
        matches!(self, UrlType::SeedTarget | UrlType::ComplexAi)
    }
}

impl TryFrom<u8> for UrlType {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(UrlType::DirectTarget),
            1 => Ok(UrlType::SinglePage),
            2 => Ok(UrlType::SeedTarget),
            3 => Ok(UrlType::ComplexAi),
            4 => Ok(UrlType::FullAi),
            other => Err(format!("Unknown url type: {}", other)),
        }
    }
}

impl From<UrlType> for u8 {
    fn from(t: UrlType) -> u8 {
        t.as_u8()
    }
}

impl fmt::Display for UrlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Lifecycle status of a frontier entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlStatus {
    Pending,
    Processing,
    Processed,
    Failed,
    Skipped,
}

impl UrlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlStatus::Pending => "pending",
            UrlStatus::Processing => "processing",
            UrlStatus::Processed => "processed",
            UrlStatus::Failed => "failed",
            UrlStatus::Skipped => "skipped",
        }
    }

    /// Terminal states never transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UrlStatus::Processed | UrlStatus::Failed | UrlStatus::Skipped
        )
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UrlStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(UrlStatus::Pending),
            "processing" => Ok(UrlStatus::Processing),
            "processed" => Ok(UrlStatus::Processed),
            "failed" => Ok(UrlStatus::Failed),
            "skipped" => Ok(UrlStatus::Skipped),
            _ => Err(format!("Unknown url status: {}", s)),
        }
    }
}

/// A persisted frontier entry: the unit of work and of audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub id: Uuid,
    pub category: String,
    pub url: String,
    pub url_type: UrlType,
    pub depth: u32,
    pub main_domain: String,
    pub target_patterns: Vec<String>,
    pub seed_pattern: Option<String>,
    pub max_depth: u32,
    pub is_target: bool,
    pub parent_url: Option<String>,
    pub status: UrlStatus,
    pub error_message: Option<String>,
    pub insert_date: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl FrontierEntry {
    /// Whether this entry may still spawn seed children.
    pub fn below_max_depth(&self) -> bool {
        self.depth < self.max_depth
    }
}

/// DTO for inserting a new frontier entry. Validated on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFrontierEntry {
    pub category: String,
    pub url: String,
    pub url_type: UrlType,
    pub depth: u32,
    pub main_domain: String,
    pub target_patterns: Vec<String>,
    pub seed_pattern: Option<String>,
    pub max_depth: u32,
    pub is_target: bool,
    pub parent_url: Option<String>,
}

impl NewFrontierEntry {
    /// Build a category root entry from its plan declaration.
    ///
    /// Fails with [`AppError::ValidationError`] when the declaration
    /// violates the per-type invariants (fail-fast, before any crawl
    /// starts).
    pub fn root(
        category: impl Into<String>,
        url: impl Into<String>,
        url_type: UrlType,
        target_patterns: Vec<String>,
        seed_pattern: Option<String>,
        max_depth: u32,
    ) -> Result<Self, AppError> {
        let url = url.into();
        let entry = Self {
            category: category.into(),
            main_domain: derive_main_domain(&url)?,
            url,
            url_type,
            depth: 0,
            target_patterns,
            seed_pattern,
            max_depth,
            is_target: url_type == UrlType::DirectTarget,
            parent_url: None,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Build a target child discovered on `parent`'s page.
    ///
    /// Target children are normalized to type 0 at depth 0 with
    /// max_depth 0: they are documents, terminal on their next claim,
    /// never fetched as pages.
    pub fn child_target(url: impl Into<String>, parent: &FrontierEntry) -> Result<Self, AppError> {
        let url = url.into();
        let entry = Self {
            category: parent.category.clone(),
            main_domain: derive_main_domain(&url)?,
            url,
            url_type: UrlType::DirectTarget,
            depth: 0,
            target_patterns: parent.target_patterns.clone(),
            seed_pattern: None,
            max_depth: 0,
            is_target: true,
            parent_url: Some(parent.url.clone()),
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Build a seed child one level below `parent`, inheriting its
    /// strategy and patterns.
    pub fn child_seed(url: impl Into<String>, parent: &FrontierEntry) -> Result<Self, AppError> {
        let url = url.into();
        let entry = Self {
            category: parent.category.clone(),
            main_domain: derive_main_domain(&url)?,
            url,
            url_type: parent.url_type,
            depth: parent.depth + 1,
            target_patterns: parent.target_patterns.clone(),
            seed_pattern: parent.seed_pattern.clone(),
            max_depth: parent.max_depth,
            is_target: false,
            parent_url: Some(parent.url.clone()),
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Enforce the per-type invariant table. Fatal when violated.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.depth > self.max_depth {
            return Err(AppError::ValidationError(format!(
                "depth {} exceeds max_depth {} for {}",
                self.depth, self.max_depth, self.url
            )));
        }

        if let Some(required) = self.url_type.required_max_depth() {
            if self.max_depth != required {
                return Err(AppError::ValidationError(format!(
                    "url type {} requires max_depth {}, got {} for {}",
                    self.url_type, required, self.max_depth, self.url
                )));
            }
        } else if self.max_depth < 2 {
            return Err(AppError::ValidationError(format!(
                "url type {} requires max_depth >= 2, got {} for {}",
                self.url_type, self.max_depth, self.url
            )));
        }

        match self.url_type {
            UrlType::DirectTarget => {
                // Discovered children inherit their parent's patterns and
                // may have none (semantic labeling); configured roots must
                // say what they point at.
                if self.target_patterns.is_empty() && self.parent_url.is_none() {
                    return Err(AppError::ValidationError(format!(
                        "type 0 entry requires target patterns: {}",
                        self.url
                    )));
                }
                if !self.is_target {
                    return Err(AppError::ValidationError(format!(
                        "type 0 entry must be a target: {}",
                        self.url
                    )));
                }
            }
            UrlType::SinglePage => {
                if self.target_patterns.is_empty() {
                    return Err(AppError::ValidationError(format!(
                        "type 1 entry requires target patterns: {}",
                        self.url
                    )));
                }
            }
            UrlType::SeedTarget | UrlType::ComplexAi | UrlType::FullAi => {}
        }

        if self.url_type.requires_seed_pattern() && self.seed_pattern.is_none() {
            return Err(AppError::ValidationError(format!(
                "type {} entry requires a seed pattern: {}",
                self.url_type, self.url
            )));
        }

        Ok(())
    }
}

/// Extract the host of an absolute http(s) URL.
pub fn derive_main_domain(url: &str) -> Result<String, AppError> {
    let parsed = Url::parse(url)
        .map_err(|e| AppError::ValidationError(format!("Invalid URL '{}': {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::ValidationError(format!(
                "URL scheme '{}' is not allowed for {} (only http/https)",
                scheme, url
            )));
        }
    }
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| AppError::ValidationError(format!("URL has no host: {}", url)))
}

/// Retry configuration for transient fetch/extractor failures.
///
/// Delay schedule: 1s, 2s, 4s, ... doubling, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Backoff delay before a given attempt number (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = Duration::from_secs(1 << exp);
        std::cmp::min(delay, self.max_delay)
    }
}

/// Aggregate counts for one category's crawl.
#[derive(Debug, Clone, Serialize)]
pub struct FrontierStats {
    pub category: String,
    pub total_urls: i64,
    pub target_urls: i64,
    pub pending_urls: i64,
    pub processed_urls: i64,
    pub failed_urls: i64,
    pub skipped_urls: i64,
    pub unique_domains: i64,
    pub max_reached_depth: i64,
}

impl FrontierStats {
    /// processed / (processed + failed), as a percentage. 0 when nothing
    /// has reached a terminal fetch outcome yet.
    pub fn success_rate(&self) -> f64 {
        let done = self.processed_urls + self.failed_urls;
        if done == 0 {
            0.0
        } else {
            self.processed_urls as f64 / done as f64 * 100.0
        }
    }
}
