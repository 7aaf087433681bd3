use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use harvest_core::error::AppError;
use harvest_core::frontier::UrlType;
use harvest_core::run_log::{RunCounters, RunLog, RunLogStore, RunStatus};

#[derive(sqlx::FromRow)]
struct RunLogRow {
    id: Uuid,
    category: String,
    url: String,
    url_type: i16,
    max_depth: i32,
    status: String,
    target_urls_found: i64,
    seed_urls_found: i64,
    failed_urls: i64,
    error_message: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<RunLogRow> for RunLog {
    fn from(row: RunLogRow) -> Self {
        RunLog {
            id: row.id,
            category: row.category,
            url: row.url,
            // Both columns are CHECK-constrained, so a parse failure
            // would mean the schema drifted.
            url_type: UrlType::try_from(row.url_type as u8)
                .unwrap_or(UrlType::SinglePage),
            max_depth: row.max_depth as u32,
            status: row.status.parse().unwrap_or(RunStatus::Pending),
            target_urls_found: row.target_urls_found,
            seed_urls_found: row.seed_urls_found,
            failed_urls: row.failed_urls,
            error_message: row.error_message,
            started_at: row.started_at,
            finished_at: row.finished_at,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL-backed audit log, one row per root URL per crawl run.
#[derive(Clone)]
pub struct RunLogRepository {
    pool: Pool<Postgres>,
}

impl RunLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recent runs for a category, newest first.
    pub async fn recent(&self, category: &str, limit: i64) -> Result<Vec<RunLog>, AppError> {
        let rows: Vec<RunLogRow> = sqlx::query_as(
            r#"
            SELECT * FROM crawl_run_logs
            WHERE category = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(category)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(RunLog::from).collect())
    }
}

impl RunLogStore for RunLogRepository {
    async fn create(
        &self,
        category: &str,
        url: &str,
        url_type: UrlType,
        max_depth: u32,
    ) -> Result<Uuid, AppError> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO crawl_run_logs (category, url, url_type, max_depth)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(category)
        .bind(url)
        .bind(url_type.as_u8() as i16)
        .bind(max_depth as i32)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(id)
    }

    async fn start(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE crawl_run_logs
            SET status = 'running', started_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn add_counters(&self, id: Uuid, counters: RunCounters) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE crawl_run_logs
            SET target_urls_found = target_urls_found + $2,
                seed_urls_found = seed_urls_found + $3,
                failed_urls = failed_urls + $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(counters.target_urls)
        .bind(counters.seed_urls)
        .bind(counters.failed_urls)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn finish(
        &self,
        id: Uuid,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE crawl_run_logs
            SET status = $2, error_message = $3, finished_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}
