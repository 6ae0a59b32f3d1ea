//! Harvest coordinator - run orchestration
//!
//! Ties the components together for one run:
//! - load the latest checkpoint, or run discovery and save one
//! - build the frontier for the requested language
//! - stream every emitted record into a fresh output archive

use crate::config::Config;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::{CrawlOptions, Frontier};
use crate::discovery::{DiscoverySnapshot, SeedDiscovery};
use crate::interpret::{JsonLdInterpreter, PageInterpreter};
use crate::output::{CrawlStats, CrawlSummary};
use crate::storage::{next_available_path, ArchiveError, ArchiveWriter, CheckpointStore};
use crate::{HarvestError, Result};
use chrono::Local;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of one harvest run
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub language: String,
    pub archive_path: PathBuf,
    pub records_written: usize,
    /// Records dropped because their entry name was already taken
    pub records_skipped: usize,
    pub summary: CrawlSummary,
    pub elapsed: Duration,
}

/// Main harvester structure
pub struct Harvester<I: PageInterpreter = JsonLdInterpreter> {
    config: Config,
    config_hash: Option<String>,
    fetcher: Fetcher,
    interpreter: I,
    checkpoints: CheckpointStore,
}

impl Harvester<JsonLdInterpreter> {
    /// Creates a harvester using the JSON-LD interpreter
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = Fetcher::from_config(&config.user_agent, &config.fetch)?;
        let interpreter = JsonLdInterpreter::from_config(&config.site);
        Ok(Self::with_interpreter(config, fetcher, interpreter))
    }
}

impl<I: PageInterpreter> Harvester<I> {
    /// Creates a harvester from explicit parts
    pub fn with_interpreter(config: Config, fetcher: Fetcher, interpreter: I) -> Self {
        let checkpoints = CheckpointStore::new(config.output.checkpoint_dir.clone());
        Self {
            config,
            config_hash: None,
            fetcher,
            interpreter,
            checkpoints,
        }
    }

    /// Records the config hash in every output archive
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Runs discovery and saves the result as today's checkpoint
    ///
    /// Nothing is written when discovery fails.
    pub async fn discover(&self) -> Result<DiscoverySnapshot> {
        tracing::info!("Starting seed discovery at {}", self.config.site.start_page_url);
        let discovery = SeedDiscovery::new(&self.fetcher, &self.interpreter, &self.config.site);
        let snapshot = discovery.discover().await?;
        self.checkpoints.save(&snapshot)?;
        Ok(snapshot)
    }

    /// Latest checkpoint, falling back to discovery when there is none
    pub async fn load_or_discover(&self, rediscover: bool) -> Result<DiscoverySnapshot> {
        if !rediscover {
            if let Some(checkpoint) = self.checkpoints.load()? {
                return Ok(checkpoint.snapshot);
            }
        }
        self.discover().await
    }

    /// Harvests `language` end to end
    pub async fn harvest(
        &self,
        language: &str,
        options: CrawlOptions,
        rediscover: bool,
        on_progress: impl FnMut(&CrawlStats),
    ) -> Result<HarvestReport> {
        let snapshot = self.load_or_discover(rediscover).await?;
        self.harvest_snapshot(&snapshot, language, options, on_progress)
            .await
    }

    /// Harvests `language` from an already loaded snapshot
    pub async fn harvest_snapshot(
        &self,
        snapshot: &DiscoverySnapshot,
        language: &str,
        options: CrawlOptions,
        mut on_progress: impl FnMut(&CrawlStats),
    ) -> Result<HarvestReport> {
        let seeds = snapshot.require_seeds(language)?;
        let started = Instant::now();

        let path = next_available_path(
            &self.config.output.data_dir,
            Local::now().date_naive(),
            language,
        );
        let mut writer = ArchiveWriter::create(&path, language, self.config_hash.as_deref())?;

        let mut frontier = Frontier::new(&self.fetcher, &self.interpreter, seeds, options);
        tracing::info!(
            "Harvesting {} of {} seeds for '{}'",
            frontier.seeds_total(),
            frontier.seeds_available(),
            language
        );

        let mut records_skipped = 0;
        while let Some((record, stats)) = frontier.next_record().await {
            match writer.write_record(&record) {
                Ok(_) => {}
                // Distinct seeds can share a final path segment
                Err(HarvestError::Archive(ArchiveError::DuplicateEntry(name))) => {
                    tracing::warn!(
                        "Skipping page {} of {}: entry {} already written by another seed",
                        record.page_number,
                        record.seed_url,
                        name
                    );
                    records_skipped += 1;
                }
                Err(e) => return Err(e),
            }
            on_progress(&stats);
        }

        let summary = frontier.summary();
        let records_written = writer.close()?;
        let elapsed = started.elapsed();

        tracing::info!(
            "Harvest of '{}' finished: {} pages from {} seeds in {:.1}s",
            language,
            records_written,
            summary.seeds_total,
            elapsed.as_secs_f64()
        );
        if summary.redirect_mismatches() > 0 {
            tracing::warn!(
                "{} seeds redirected elsewhere; consider running discovery again",
                summary.redirect_mismatches()
            );
        }

        Ok(HarvestReport {
            language: language.to_string(),
            archive_path: path,
            records_written,
            records_skipped,
            summary,
            elapsed,
        })
    }
}
