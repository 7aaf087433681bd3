use chrono::{DateTime, Utc};
use harvest_core::frontier::UrlType;
use harvest_core::run_log::{RunCounters, RunLogStore, RunStatus};
use harvest_db::RunLogRepository;
use sqlx::PgPool;
use uuid::Uuid;

use crate::integration::common::setup_test_db;

#[derive(sqlx::FromRow)]
struct LogRow {
    status: String,
    target_urls_found: i64,
    seed_urls_found: i64,
    failed_urls: i64,
    error_message: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

async fn fetch_log(pool: &PgPool, id: Uuid) -> LogRow {
    sqlx::query_as::<_, LogRow>(r#"SELECT * FROM crawl_run_logs WHERE id = $1"#)
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn full_run_lifecycle() {
    let (pool, _container) = setup_test_db().await;
    let repo = RunLogRepository::new(pool.clone());

    let id = repo
        .create("legislation", "https://gazette.example/acts", UrlType::SeedTarget, 1)
        .await
        .unwrap();

    let row = fetch_log(&pool, id).await;
    assert_eq!(row.status, "pending");
    assert!(row.started_at.is_none());

    repo.start(id).await.unwrap();
    let row = fetch_log(&pool, id).await;
    assert_eq!(row.status, "running");
    assert!(row.started_at.is_some());

    repo.add_counters(
        id,
        RunCounters {
            target_urls: 12,
            seed_urls: 3,
            failed_urls: 1,
        },
    )
    .await
    .unwrap();
    // Counters accumulate across batches.
    repo.add_counters(
        id,
        RunCounters {
            target_urls: 2,
            seed_urls: 0,
            failed_urls: 0,
        },
    )
    .await
    .unwrap();

    repo.finish(id, RunStatus::Completed, None).await.unwrap();

    let row = fetch_log(&pool, id).await;
    assert_eq!(row.status, "completed");
    assert_eq!(row.target_urls_found, 14);
    assert_eq!(row.seed_urls_found, 3);
    assert_eq!(row.failed_urls, 1);
    assert!(row.error_message.is_none());
    assert!(row.finished_at.is_some());
}

#[tokio::test]
async fn failed_run_records_the_error() {
    let (pool, _container) = setup_test_db().await;
    let repo = RunLogRepository::new(pool.clone());

    let id = repo
        .create("reports", "https://agency.example/reports", UrlType::FullAi, 3)
        .await
        .unwrap();
    repo.start(id).await.unwrap();
    repo.finish(id, RunStatus::Failed, Some("crawl cancelled"))
        .await
        .unwrap();

    let row = fetch_log(&pool, id).await;
    assert_eq!(row.status, "failed");
    assert_eq!(row.error_message.as_deref(), Some("crawl cancelled"));
}

#[tokio::test]
async fn recent_returns_newest_first_scoped_to_category() {
    let (pool, _container) = setup_test_db().await;
    let repo = RunLogRepository::new(pool.clone());

    let first = repo
        .create("reports", "https://agency.example/2023", UrlType::SinglePage, 0)
        .await
        .unwrap();
    let second = repo
        .create("reports", "https://agency.example/2024", UrlType::SinglePage, 0)
        .await
        .unwrap();
    repo.create("legislation", "https://gazette.example/acts", UrlType::SeedTarget, 1)
        .await
        .unwrap();
    repo.finish(second, RunStatus::Completed, None).await.unwrap();

    let runs = repo.recent("reports", 10).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].id, second);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[1].id, first);
    assert_eq!(runs[1].status, RunStatus::Pending);

    let capped = repo.recent("reports", 1).await.unwrap();
    assert_eq!(capped.len(), 1);
}
