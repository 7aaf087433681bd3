use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use harvest_core::error::AppError;
use harvest_core::frontier::{FrontierEntry, FrontierStats, NewFrontierEntry, UrlStatus, UrlType};
use harvest_core::store::{BatchInsertReport, FrontierStore, InsertOutcome};

/// PostgreSQL-backed frontier using `SELECT FOR UPDATE SKIP LOCKED` for
/// claims and a unique index on url for dedup.
#[derive(Clone)]
pub struct FrontierRepository {
    pool: Pool<Postgres>,
}

impl FrontierRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct FrontierRow {
    id: Uuid,
    category: String,
    url: String,
    url_type: i16,
    depth: i32,
    main_domain: String,
    target_patterns: Vec<String>,
    seed_pattern: Option<String>,
    max_depth: i32,
    is_target: bool,
    parent_url: Option<String>,
    status: String,
    error_message: Option<String>,
    insert_date: DateTime<Utc>,
    last_update: DateTime<Utc>,
}

impl From<FrontierRow> for FrontierEntry {
    fn from(row: FrontierRow) -> Self {
        FrontierEntry {
            id: row.id,
            category: row.category,
            url: row.url,
            // A CHECK constraint keeps url_type in 0..=4.
            url_type: UrlType::try_from(row.url_type as u8).unwrap_or(UrlType::SinglePage),
            depth: row.depth as u32,
            main_domain: row.main_domain,
            target_patterns: row.target_patterns,
            seed_pattern: row.seed_pattern,
            max_depth: row.max_depth as u32,
            is_target: row.is_target,
            parent_url: row.parent_url,
            status: row.status.parse().unwrap_or(UrlStatus::Pending),
            error_message: row.error_message,
            insert_date: row.insert_date,
            last_update: row.last_update,
        }
    }
}

impl FrontierStore for FrontierRepository {
    async fn insert(&self, entry: &NewFrontierEntry) -> Result<InsertOutcome, AppError> {
        let id: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO url_frontier
                (category, url, url_type, depth, main_domain, target_patterns,
                 seed_pattern, max_depth, is_target, parent_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&entry.category)
        .bind(&entry.url)
        .bind(entry.url_type.as_u8() as i16)
        .bind(entry.depth as i32)
        .bind(&entry.main_domain)
        .bind(&entry.target_patterns)
        .bind(&entry.seed_pattern)
        .bind(entry.max_depth as i32)
        .bind(entry.is_target)
        .bind(&entry.parent_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        match id {
            Some((id,)) => Ok(InsertOutcome::Inserted(id)),
            None => Ok(InsertOutcome::Duplicate),
        }
    }

    /// Row-at-a-time inserts: each row commits on its own, so a bad row
    /// late in the batch never rolls back the rows before it.
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
        let rows = sqlx::query_as::<_, FrontierRow>(
            r#"
            UPDATE url_frontier
            SET status = 'processing', last_update = NOW()
            WHERE id IN (
                SELECT id FROM url_frontier
                WHERE category = $1
                  AND status = 'pending'
                  AND ($2::smallint IS NULL OR url_type = $2)
                ORDER BY insert_date ASC
                FOR UPDATE SKIP LOCKED
                LIMIT $3
            )
            RETURNING *
            "#,
        )
        .bind(category)
        .bind(url_type.map(|t| t.as_u8() as i16))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        // RETURNING order is unspecified; restore claim order.
        let mut entries: Vec<FrontierEntry> = rows.into_iter().map(Into::into).collect();
        entries.sort_by_key(|e| e.insert_date);
        Ok(entries)
    }

    async fn mark_result(
        &self,
        id: Uuid,
        status: UrlStatus,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE url_frontier
            SET status = $2, error_message = $3, last_update = NOW()
            WHERE id = $1
              AND status NOT IN ('processed', 'failed', 'skipped')
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            tracing::debug!(%id, %status, "mark_result was a no-op (already terminal or unknown id)");
        }
        Ok(())
    }

    async fn exists(&self, url: &str) -> Result<bool, AppError> {
        let (exists,): (bool,) =
            sqlx::query_as(r#"SELECT EXISTS(SELECT 1 FROM url_frontier WHERE url = $1)"#)
                .bind(url)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(exists)
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<FrontierEntry>, AppError> {
        let row = sqlx::query_as::<_, FrontierRow>(r#"SELECT * FROM url_frontier WHERE url = $1"#)
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(row.map(Into::into))
    }

    async fn reset_abandoned(&self, category: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE url_frontier
            SET status = 'pending', last_update = NOW()
            WHERE category = $1 AND status = 'processing'
            "#,
        )
        .bind(category)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn statistics(&self, category: &str) -> Result<Option<FrontierStats>, AppError> {
        let row: (i64, i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE is_target),
                COUNT(*) FILTER (WHERE status = 'pending'),
                COUNT(*) FILTER (WHERE status = 'processed'),
                COUNT(*) FILTER (WHERE status = 'failed'),
                COUNT(*) FILTER (WHERE status = 'skipped'),
                COUNT(DISTINCT main_domain),
                COALESCE(MAX(depth), 0)::bigint
            FROM url_frontier
            WHERE category = $1
            "#,
        )
        .bind(category)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let (total, targets, pending, processed, failed, skipped, domains, max_depth) = row;
        if total == 0 {
            return Ok(None);
        }
        Ok(Some(FrontierStats {
            category: category.to_string(),
            total_urls: total,
            target_urls: targets,
            pending_urls: pending,
            processed_urls: processed,
            failed_urls: failed,
            skipped_urls: skipped,
            unique_domains: domains,
            max_reached_depth: max_depth,
        }))
    }
}
