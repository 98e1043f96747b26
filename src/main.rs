use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tweet_scraper::config::Config;
use tweet_scraper::constants::{self, DEFAULT_LIMIT, MAX_LIMIT, MIN_LIMIT};
use tweet_scraper::export::{export_records, ExportFormat};
use tweet_scraper::logging;
use tweet_scraper::progress::{BarProgress, LogProgress};
use tweet_scraper::sources::create_source;
use tweet_scraper::types::ProgressSink;
use tweet_scraper::{CollectionEngine, StopReason};

#[derive(Parser)]
#[command(name = "tweet_scraper")]
#[command(about = "Collect recent tweets from a public Twitter/X profile")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect tweets from one profile and export them
    Collect {
        /// Twitter username (with or without @)
        #[arg(long, short)]
        user: String,
        /// Number of tweets to collect
        #[arg(long, short, default_value_t = DEFAULT_LIMIT)]
        count: usize,
        /// Acquisition strategy. Available: feed, search, scroll
        #[arg(long, short, default_value = constants::FEED_STRATEGY)]
        strategy: String,
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// Directory for exported files (overrides config)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Path to a TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Log progress instead of drawing a progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// List the available acquisition strategies
    Strategies,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Strategies => {
            for strategy in constants::get_supported_strategies() {
                println!("{}", strategy);
            }
        }
        Commands::Collect {
            user,
            count,
            strategy,
            format,
            output_dir,
            config,
            no_progress,
        } => {
            if !(MIN_LIMIT..=MAX_LIMIT).contains(&count) {
                bail!("--count must be between {} and {}", MIN_LIMIT, MAX_LIMIT);
            }
            let config = Config::load(config.as_deref()).context("failed to load configuration")?;
            let output_dir = output_dir.unwrap_or_else(|| PathBuf::from(&config.output.dir));
            run_collect(&user, count, &strategy, format, &output_dir, &config, no_progress).await?;
        }
    }
    Ok(())
}

async fn run_collect(
    user: &str,
    count: usize,
    strategy: &str,
    format: ExportFormat,
    output_dir: &Path,
    config: &Config,
    no_progress: bool,
) -> anyhow::Result<()> {
    let Some(source) = create_source(strategy, config)? else {
        bail!(
            "unknown strategy '{}'. Available: {}",
            strategy,
            constants::get_supported_strategies().join(", ")
        );
    };
    let subject = CollectionEngine::validate_request(user, count)?;

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current item");
            ctrl_c_token.cancel();
        }
    });

    let progress: Box<dyn ProgressSink> = if no_progress {
        Box::new(LogProgress::new(subject.clone()))
    } else {
        Box::new(BarProgress::new(&subject))
    };

    println!("🔄 Scraping tweets from @{} via {}...", subject, strategy);
    let engine = CollectionEngine::with_cancellation(token);
    let result = match engine
        .collect(&subject, count, source.adapter, source.mapper.as_ref(), progress.as_ref())
        .await
    {
        Ok(result) => result,
        Err(e) => {
            error!("Collection failed: {}", e);
            println!("❌ {}: {}", e.kind(), e);
            bail!("collection failed ({})", e.kind());
        }
    };
    drop(progress);

    println!("\n📊 Scraped {} tweets from @{}", result.records.len(), subject);
    if result.stop_reason == StopReason::Cancelled {
        println!("   Run was cancelled; results are partial");
    } else if result.is_short(count) {
        println!("   Source ran out after {} items", result.items_pulled);
    }
    if result.duplicates_skipped > 0 {
        println!("   Duplicates skipped: {}", result.duplicates_skipped);
    }
    if !result.warnings.is_empty() {
        println!("\n⚠️  {} items could not be processed:", result.warnings.len());
        for warning in &result.warnings {
            println!("   - {}", warning);
        }
    }

    if result.records.is_empty() {
        println!("No tweets were collected. Please check the username and try again.");
        return Ok(());
    }

    for path in export_records(&result.records, &subject, output_dir, format)? {
        println!("💾 Saved to {}", path.display());
    }
    info!("Run for @{} finished in {:?}", subject, result.elapsed);
    Ok(())
}
