//! Listing Harvester main entry point
//!
//! This is the command-line interface for the listing harvester.

use anyhow::{ensure, Context};
use clap::{Parser, Subcommand};
use listing_harvester::config::{load_config_with_hash, Config};
use listing_harvester::crawler::{CrawlOptions, Harvester};
use listing_harvester::output::{format_language_overview, format_progress, print_summary};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Listing Harvester: a polite, resumable harvester for paginated listings
///
/// Discovers seed URLs from the site's sitemaps, keeps them in a dated
/// checkpoint, and paginates every seed of one language under a global
/// request budget into an append-only archive.
#[derive(Parser, Debug)]
#[command(name = "listing-harvester")]
#[command(version)]
#[command(about = "A polite, resumable harvester for paginated listings", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run seed discovery and save a checkpoint
    Discover,

    /// Harvest every seed of one language
    Harvest {
        /// Language id as listed by `languages`
        language: String,

        /// Crawl only this many (randomly chosen) seeds
        #[arg(long)]
        limit: Option<usize>,

        /// Highest page fetched per seed
        #[arg(long)]
        max_pages_per_seed: Option<u32>,

        /// Run discovery first even if a checkpoint exists
        #[arg(long)]
        rediscover: bool,
    },

    /// Show the language overview of the latest checkpoint
    Languages,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    setup_logging(cli.verbose, cli.quiet, config.output.log_dir.as_deref())?;
    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    match cli.command {
        Command::Discover => handle_discover(config, config_hash).await,
        Command::Harvest {
            language,
            limit,
            max_pages_per_seed,
            rediscover,
        } => {
            let mut options = CrawlOptions::from_config(&config);
            if limit.is_some() {
                options.limit = limit;
            }
            if max_pages_per_seed.is_some() {
                options.max_pages_per_seed = max_pages_per_seed;
            }
            ensure!(options.limit != Some(0), "--limit must be at least 1");
            ensure!(
                options.max_pages_per_seed != Some(0),
                "--max-pages-per-seed must be at least 1"
            );

            handle_harvest(config, config_hash, &language, options, rediscover, cli.quiet).await
        }
        Command::Languages => handle_languages(config, config_hash).await,
    }
}

/// Sets up the tracing subscriber; events go to a per-day file when `log_dir` is set
fn setup_logging(verbose: u8, quiet: bool, log_dir: Option<&Path>) -> anyhow::Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvester=info,warn"),
            1 => EnvFilter::new("listing_harvester=debug,info"),
            2 => EnvFilter::new("listing_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let path = dir.join(format!(
                "harvester_{}.log",
                chrono::Local::now().format("%Y-%m-%d")
            ));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => builder.init(),
    }

    Ok(())
}

async fn handle_discover(config: Config, config_hash: String) -> anyhow::Result<()> {
    let harvester = Harvester::new(config)?.with_config_hash(config_hash);
    let snapshot = harvester.discover().await.context("Discovery failed")?;

    print!("{}", format_language_overview(&snapshot));
    Ok(())
}

async fn handle_languages(config: Config, config_hash: String) -> anyhow::Result<()> {
    let harvester = Harvester::new(config)?.with_config_hash(config_hash);

    match harvester.checkpoints().load()? {
        Some(checkpoint) => {
            println!("Checkpoint: {} ({})", checkpoint.date, checkpoint.path.display());
            if checkpoint.stale {
                println!("Note: checkpoint predates today; run `discover` to refresh it");
            }
            print!("{}", format_language_overview(&checkpoint.snapshot));
        }
        None => println!(
            "No checkpoint in {}; run `discover` first",
            harvester.checkpoints().dir().display()
        ),
    }
    Ok(())
}

async fn handle_harvest(
    config: Config,
    config_hash: String,
    language: &str,
    options: CrawlOptions,
    rediscover: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let harvester = Harvester::new(config)?.with_config_hash(config_hash);

    let report = harvester
        .harvest(language, options, rediscover, |stats| {
            if !quiet {
                let mut stdout = std::io::stdout().lock();
                let _ = write!(stdout, "\r{}", format_progress(stats));
                let _ = stdout.flush();
            }
        })
        .await
        .with_context(|| format!("Harvest of '{}' failed", language))?;

    if !quiet {
        println!();
        print_summary(&report.summary, report.elapsed);
        if report.records_skipped > 0 {
            println!(
                "Skipped {} pages whose entry name was already taken",
                report.records_skipped
            );
        }
        println!("Archive: {}", report.archive_path.display());
    }
    Ok(())
}
