use std::fmt;
use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::frontier::UrlType;

/// Status of one configured root URL's crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(format!("Unknown run status: {}", s)),
        }
    }
}

/// Audit row for one configured root URL: what was crawled, how it went,
/// and how many URLs each outcome produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunLog {
    pub id: Uuid,
    pub category: String,
    pub url: String,
    pub url_type: UrlType,
    pub max_depth: u32,
    pub status: RunStatus,
    pub target_urls_found: i64,
    pub seed_urls_found: i64,
    pub failed_urls: i64,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Counter deltas accumulated while a root URL's tree is processed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunCounters {
    pub target_urls: i64,
    pub seed_urls: i64,
    pub failed_urls: i64,
}

impl RunCounters {
    pub fn is_empty(&self) -> bool {
        self.target_urls == 0 && self.seed_urls == 0 && self.failed_urls == 0
    }
}

/// Persists per-root-URL audit rows.
pub trait RunLogStore: Send + Sync + Clone {
    /// Create a `pending` log row for a root URL, returning its id.
    fn create(
        &self,
        category: &str,
        url: &str,
        url_type: UrlType,
        max_depth: u32,
    ) -> impl Future<Output = Result<Uuid, AppError>> + Send;

    /// Mark the run `running` and stamp started_at.
    fn start(&self, id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Add URL counters to the run.
    fn add_counters(
        &self,
        id: Uuid,
        counters: RunCounters,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Finish the run with a terminal status and stamp finished_at.
    fn finish(
        &self,
        id: Uuid,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A no-op RunLogStore for callers that do not need the audit trail.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRunLog;

impl RunLogStore for NullRunLog {
    async fn create(
        &self,
        _category: &str,
        _url: &str,
        _url_type: UrlType,
        _max_depth: u32,
    ) -> Result<Uuid, AppError> {
        Ok(Uuid::nil())
    }

    async fn start(&self, _id: Uuid) -> Result<(), AppError> {
        Ok(())
    }

    async fn add_counters(&self, _id: Uuid, _counters: RunCounters) -> Result<(), AppError> {
        Ok(())
    }

    async fn finish(
        &self,
        _id: Uuid,
        _status: RunStatus,
        _error_message: Option<&str>,
    ) -> Result<(), AppError> {
        Ok(())
    }
}
