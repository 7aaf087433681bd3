use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use harvest_client::{OpenAiLinkLabeler, ReqwestFetcher, ScraperLinkExtractor};
use harvest_core::FrontierStore;
use harvest_core::config::{CategoryPlan, CrawlPlan, CrawlerSettings};
use harvest_core::dispatcher::StrategyDispatcher;
use harvest_core::frontier::UrlType;
use harvest_core::orchestrator::{CrawlOrchestrator, TracingCrawlReporter};
use harvest_core::throttle::ThrottledFetcher;
use harvest_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "docharvest", version, about = "Frontier-based document harvester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the crawl described by a plan file
    Crawl {
        /// Path to the YAML crawl plan
        #[arg(short, long, default_value = "crawler_config.yaml")]
        config: PathBuf,

        /// Only crawl this category (default: all categories in the plan)
        #[arg(long)]
        category: Option<String>,
    },

    /// Show frontier statistics for a category
    Stats {
        #[arg(long)]
        category: String,
    },

    /// Check a crawl plan without touching the database
    Validate {
        #[arg(short, long, default_value = "crawler_config.yaml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("docharvest=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl { config, category } => cmd_crawl(&config, category.as_deref()).await?,
        Commands::Stats { category } => cmd_stats(&category).await?,
        Commands::Validate { config } => cmd_validate(&config)?,
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and run migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db)
}

/// Types 3 and 4 call out to the semantic extractor; plain regex plans
/// run without an API key.
fn plan_needs_semantic(categories: &[&CategoryPlan]) -> bool {
    categories.iter().any(|c| {
        c.urls
            .iter()
            .any(|u| matches!(u.url_type, UrlType::ComplexAi | UrlType::FullAi))
    })
}

async fn cmd_crawl(config: &PathBuf, only_category: Option<&str>) -> Result<()> {
    let plan = CrawlPlan::from_path(config).map_err(|e| anyhow::anyhow!(e))?;
    let settings = CrawlerSettings::from_env().map_err(|e| anyhow::anyhow!(e))?;

    let categories: Vec<&CategoryPlan> = match only_category {
        Some(name) => {
            let category = plan
                .category(name)
                .with_context(|| format!("Category '{name}' not found in {}", config.display()))?;
            vec![category]
        }
        None => plan.categories.iter().collect(),
    };

    let api_key = match &settings.api_key {
        Some(key) => key.clone(),
        None if plan_needs_semantic(&categories) => {
            bail!("HARVEST_API_KEY not set. Required for type 3/4 URLs in the plan.");
        }
        None => String::new(),
    };
    let labeler =
        OpenAiLinkLabeler::with_base_url(&api_key, &settings.model, &settings.base_url)
            .map_err(|e| anyhow::anyhow!(e))?;

    let fetcher = ThrottledFetcher::new(
        ReqwestFetcher::with_timeout(settings.fetch_timeout).map_err(|e| anyhow::anyhow!(e))?,
        settings.throttle_config(),
    );

    let db = connect_db().await?;
    let store = db.frontier_repo();
    let dispatcher = StrategyDispatcher::new(
        fetcher,
        ScraperLinkExtractor::new(),
        labeler,
        store.clone(),
    );
    let orchestrator = CrawlOrchestrator::new(
        dispatcher,
        store,
        db.run_log_repo(),
        settings.crawl_config(),
    );

    // Ctrl-C finishes the current batch, then stops cleanly.
    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current batch");
            signal_token.cancel();
        }
    });

    for category in categories {
        if cancel_token.is_cancelled() {
            break;
        }
        let roots = category.roots().map_err(|e| anyhow::anyhow!(e))?;
        let counters = orchestrator
            .run(
                &category.name,
                &roots,
                cancel_token.clone(),
                &TracingCrawlReporter,
            )
            .await
            .map_err(|e| anyhow::anyhow!(e))?;

        println!(
            "{}: {} targets, {} seeds, {} failed",
            category.name, counters.target_urls, counters.seed_urls, counters.failed_urls
        );
    }

    Ok(())
}

async fn cmd_stats(category: &str) -> Result<()> {
    let db = connect_db().await?;
    let stats = db
        .frontier_repo()
        .statistics(category)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let Some(stats) = stats else {
        println!("No frontier entries for category '{category}'");
        return Ok(());
    };

    println!("Frontier statistics for '{}':", stats.category);
    println!("  total URLs:     {}", stats.total_urls);
    println!("  targets:        {}", stats.target_urls);
    println!("  pending:        {}", stats.pending_urls);
    println!("  processed:      {}", stats.processed_urls);
    println!("  failed:         {}", stats.failed_urls);
    println!("  skipped:        {}", stats.skipped_urls);
    println!("  unique domains: {}", stats.unique_domains);
    println!("  max depth:      {}", stats.max_reached_depth);
    println!("  success rate:   {:.1}%", stats.success_rate());

    let runs = db
        .run_log_repo()
        .recent(category, 10)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    if !runs.is_empty() {
        println!("Recent runs:");
        for run in &runs {
            println!(
                "  {} {:>9}  {} targets, {} seeds, {} failed  {}",
                run.created_at.format("%Y-%m-%d %H:%M"),
                run.status,
                run.target_urls_found,
                run.seed_urls_found,
                run.failed_urls,
                run.url
            );
        }
    }

    Ok(())
}

fn cmd_validate(config: &PathBuf) -> Result<()> {
    let plan = CrawlPlan::from_path(config).map_err(|e| anyhow::anyhow!(e))?;

    for category in &plan.categories {
        let roots = category.roots().map_err(|e| anyhow::anyhow!(e))?;
        println!("{}: {} root URLs", category.name, roots.len());
        for root in &roots {
            println!(
                "  type {} depth 0..{}  {}",
                root.url_type, root.max_depth, root.url
            );
        }
    }
    println!("Plan OK: {}", config.display());

    Ok(())
}
