use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// SQL migration statements, executed one at a time.
const MIGRATIONS: &[&str] = &[
    // 001_url_frontier.sql
    r#"CREATE TABLE IF NOT EXISTS url_frontier (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        category VARCHAR(255) NOT NULL,
        url TEXT NOT NULL,
        url_type SMALLINT NOT NULL,
        depth INTEGER NOT NULL DEFAULT 0,
        main_domain VARCHAR(255) NOT NULL,
        target_patterns TEXT[] NOT NULL DEFAULT '{}',
        seed_pattern TEXT,
        max_depth INTEGER NOT NULL DEFAULT 0,
        is_target BOOLEAN NOT NULL DEFAULT FALSE,
        parent_url TEXT,
        status VARCHAR(20) NOT NULL DEFAULT 'pending',
        error_message TEXT,
        insert_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        last_update TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT uq_url_frontier_url UNIQUE (url),
        CONSTRAINT chk_url_frontier_type CHECK (url_type BETWEEN 0 AND 4),
        CONSTRAINT chk_url_frontier_depth CHECK (depth >= 0 AND depth <= max_depth),
        CONSTRAINT chk_url_frontier_status CHECK (
            status IN ('pending', 'processing', 'processed', 'failed', 'skipped')
        )
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_url_frontier_pending
        ON url_frontier(category, insert_date) WHERE status = 'pending'"#,
    r#"CREATE INDEX IF NOT EXISTS idx_url_frontier_status
        ON url_frontier(category, status)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_url_frontier_domain
        ON url_frontier(main_domain)"#,
    // 002_crawl_run_logs.sql
    r#"CREATE TABLE IF NOT EXISTS crawl_run_logs (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        category VARCHAR(255) NOT NULL,
        url TEXT NOT NULL,
        url_type SMALLINT NOT NULL,
        max_depth INTEGER NOT NULL DEFAULT 0,
        status VARCHAR(20) NOT NULL DEFAULT 'pending',
        target_urls_found BIGINT NOT NULL DEFAULT 0,
        seed_urls_found BIGINT NOT NULL DEFAULT 0,
        failed_urls BIGINT NOT NULL DEFAULT 0,
        error_message TEXT,
        started_at TIMESTAMPTZ,
        finished_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT chk_crawl_run_logs_status CHECK (
            status IN ('pending', 'running', 'completed', 'failed')
        )
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_crawl_run_logs_category
        ON crawl_run_logs(category, created_at DESC)"#,
];

/// Spins up a PostgreSQL container and returns a connected pool.
///
/// The `ContainerAsync` must be kept in scope for the test duration;
/// dropping it will stop the container.
pub async fn setup_test_db() -> (PgPool, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "harvest_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string = format!("postgresql://postgres:postgres@{host}:{port}/harvest_test");

    // Retry connection until container is fully ready
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to database after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    // Run migrations one statement at a time
    for migration in MIGRATIONS {
        sqlx::query(migration)
            .execute(&pool)
            .await
            .expect("Failed to run migration");
    }

    (pool, container)
}
