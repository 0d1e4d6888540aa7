//! murmur — crawl mirror endpoints and reply to what was found.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use headless_client::{CdpDriver, DEFAULT_USER_AGENT};
use murmur_common::{CancelToken, Config};
use murmur_crawler::failover::SourceFailover;
use murmur_crawler::{CrawlOptions, Crawler, Pacing, RecordStore, SearchQuery, Snapshots};
use murmur_reply::{
    OpenAiComposer, ReplyProcessor, ReplyStatus, TestComposer, TestPoster, XPoster,
};

#[derive(Parser)]
#[command(name = "murmur", about = "Mirror-endpoint content crawler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search mirror endpoints and collect matching posts.
    Crawl {
        /// Keyword to search for.
        #[arg(long)]
        keyword: Option<String>,
        /// Location term added to the search.
        #[arg(long)]
        location: Option<String>,
        /// Restrict to posts from one account.
        #[arg(long)]
        from_user: Option<String>,
        /// How many new posts to collect.
        #[arg(long, default_value_t = 15)]
        limit: usize,
        /// Delete the persisted store before crawling.
        #[arg(long)]
        fresh_start: bool,
        /// Re-collect posts the store already knows about.
        #[arg(long)]
        ignore_existing: bool,
        /// Run the browser with a visible window.
        #[arg(long)]
        headed: bool,
    },
    /// Compose and post replies to previously crawled posts.
    Reply {
        /// Records file to reply to; defaults to the crawl store.
        #[arg(long)]
        input: Option<PathBuf>,
        /// Seconds to wait between posts.
        #[arg(long, default_value_t = 30)]
        delay_secs: u64,
        /// Use offline stand-ins instead of the real APIs.
        #[arg(long)]
        test_mode: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Crawl {
            keyword,
            location,
            from_user,
            limit,
            fresh_start,
            ignore_existing,
            headed,
        } => {
            let query = SearchQuery {
                keyword,
                location,
                from_user,
                ..SearchQuery::default()
            };
            crawl(query, limit, fresh_start, ignore_existing, headed).await
        }
        Command::Reply {
            input,
            delay_secs,
            test_mode,
        } => reply(input, delay_secs, test_mode).await,
    }
}

async fn crawl(
    query: SearchQuery,
    limit: usize,
    fresh_start: bool,
    ignore_existing: bool,
    headed: bool,
) -> anyhow::Result<()> {
    if query.is_empty() {
        bail!("nothing to search for: pass --keyword, --location, or --from-user");
    }

    let config = Config::from_env();
    config.log_redacted();

    let driver = CdpDriver::launch(config.headless && !headed, DEFAULT_USER_AGENT)
        .await
        .context("launching browser")?;

    let cancel = CancelToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current page and saving");
            ctrl_c.cancel();
        }
    });

    let crawler = Crawler::new(
        SourceFailover::new(config.endpoints.clone()),
        RecordStore::new(&config.data_file),
        Pacing::default(),
        Snapshots::new(&config.screenshot_dir),
    );
    let opts = CrawlOptions {
        target_count: limit,
        fresh_start,
        ignore_existing,
    };
    let progress = |collected: usize, target: usize| {
        info!(collected, target, "Crawl progress");
    };

    let report = crawler
        .run(&driver, &query, &opts, cancel, Some(&progress))
        .await;
    driver.close().await;

    info!(
        collected = report.collected_count,
        duplicates = report.duplicates,
        errors = report.errors,
        pages = report.pages,
        persisted = report.persisted_total,
        "Crawl report"
    );
    if let Some(failure) = report.failure {
        bail!("crawl failed: {failure}");
    }
    Ok(())
}

async fn reply(input: Option<PathBuf>, delay_secs: u64, test_mode: bool) -> anyhow::Result<()> {
    let config = if test_mode {
        Config::from_env()
    } else {
        Config::reply_from_env()
    };
    config.log_redacted();

    let store = RecordStore::new(input.unwrap_or_else(|| config.data_file.clone()));
    let records = store.load();
    if records.is_empty() {
        info!(path = %store.path().display(), "No records to reply to");
        return Ok(());
    }

    let mut processor = if test_mode {
        ReplyProcessor::new(
            Arc::new(TestComposer),
            Arc::new(TestPoster),
            "processed_posts.json",
        )
    } else {
        ReplyProcessor::new(
            Arc::new(OpenAiComposer::new(
                &config.openai_api_key,
                &config.openai_model,
            )),
            Arc::new(XPoster::new(&config.x_bearer_token)),
            "processed_posts.json",
        )
    }
    .with_pacing(Duration::from_secs(delay_secs), Duration::from_secs(2));

    let results = processor.process_all(&records).await;
    let posted = results
        .iter()
        .filter(|(_, s)| matches!(s, ReplyStatus::Posted { .. }))
        .count();
    let skipped = results
        .iter()
        .filter(|(_, s)| matches!(s, ReplyStatus::Skipped))
        .count();
    let failed = results.len() - posted - skipped;
    info!(posted, skipped, failed, "Reply run complete");

    if failed > 0 {
        bail!("{failed} replies failed");
    }
    Ok(())
}
