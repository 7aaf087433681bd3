use std::future::Future;

use uuid::Uuid;

use crate::error::AppError;
use crate::frontier::{FrontierEntry, FrontierStats, NewFrontierEntry, UrlStatus, UrlType};

/// Result of inserting one entry into the frontier.
///
/// A duplicate url is expected, not exceptional: the store keeps exactly
/// one row per url and reports rediscoveries as `Duplicate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Uuid),
    Duplicate,
}

impl InsertOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, InsertOutcome::Duplicate)
    }
}

/// Per-batch insert accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchInsertReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Durable, deduplicated record of every URL ever seen.
///
/// Implementations must claim atomically (`FOR UPDATE SKIP LOCKED` or
/// equivalent) so two concurrent workers never process the same entry,
/// and must enforce uniqueness on url at the storage layer rather than
/// with client-side locking.
pub trait FrontierStore: Send + Sync + Clone {
    /// Insert a new entry with status `pending`. A url already present
    /// yields `Duplicate`, never an error.
    fn insert(
        &self,
        entry: &NewFrontierEntry,
    ) -> impl Future<Output = Result<InsertOutcome, AppError>> + Send;

    /// Insert entries in bounded-size chunks. A failure in one chunk must
    /// not roll back chunks already committed; partial progress is
    /// expected and fine.
    fn insert_batch(
        &self,
        entries: &[NewFrontierEntry],
    ) -> impl Future<Output = Result<BatchInsertReport, AppError>> + Send;

    /// Atomically claim up to `limit` pending entries for a category,
    /// marking them `processing`. Oldest first.
    fn claim_pending(
        &self,
        category: &str,
        url_type: Option<UrlType>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<FrontierEntry>, AppError>> + Send;

    /// Transition an entry to a terminal status. Idempotent: re-marking
    /// an already-terminal entry is a logged no-op.
    fn mark_result(
        &self,
        id: Uuid,
        status: UrlStatus,
        error_message: Option<&str>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Cheap existence check, used to skip seed candidates before even
    /// constructing an entry.
    fn exists(&self, url: &str) -> impl Future<Output = Result<bool, AppError>> + Send;

    fn get_by_url(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<FrontierEntry>, AppError>> + Send;

    /// Reset entries stranded in `processing` (a previous run aborted)
    /// back to `pending`. Returns the number reclaimed.
    fn reset_abandoned(
        &self,
        category: &str,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Aggregate counts for a category, `None` when the category has no
    /// entries at all.
    fn statistics(
        &self,
        category: &str,
    ) -> impl Future<Output = Result<Option<FrontierStats>, AppError>> + Send;
}
