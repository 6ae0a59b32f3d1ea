//! Frontier scheduler
//!
//! Holds one pagination cursor per seed and drives every seed to a terminal
//! state. Seeds are served round-robin from a FIFO queue: the head seed gets
//! one page fetch and, while it stays active, goes back to the tail.

use crate::config::Config;
use crate::crawler::fetcher::{Disposition, FetchOutcome, Fetcher};
use crate::discovery::{dedup_seeds, SeedUrl};
use crate::interpret::PageInterpreter;
use crate::output::{CrawlStats, CrawlSummary};
use crate::state::{FailureReason, InvalidTransition, SeedState};
use crate::storage::PageRecord;
use crate::url::page_url;
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, VecDeque};
use tokio::time::Instant;
use url::Url;

/// Bounds and request shape of one harvest run
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Number of seeds kept after shuffling; all when `None`
    pub limit: Option<usize>,

    /// Highest page fetched for any seed
    pub max_pages_per_seed: Option<u32>,

    /// Query parameters sent with every page request
    pub fixed_params: BTreeMap<String, String>,
}

impl CrawlOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            limit: config.crawl.limit,
            max_pages_per_seed: config.crawl.max_pages_per_seed,
            fixed_params: config.site.fixed_params.clone(),
        }
    }
}

/// One seed and its pagination state
#[derive(Debug, Clone)]
struct FrontierEntry {
    seed: SeedUrl,
    state: SeedState,
}

/// Round-robin pagination over a shuffled seed set
pub struct Frontier<'a, I: PageInterpreter + ?Sized> {
    fetcher: &'a Fetcher,
    interpreter: &'a I,
    options: CrawlOptions,

    entries: Vec<FrontierEntry>,

    /// Indices into `entries` of seeds still active, head is served next
    queue: VecDeque<usize>,

    seeds_available: usize,
    seeds_started: usize,
    seeds_finished: usize,
    pages_fetched: u64,
    started_at: Instant,
}

impl<'a, I: PageInterpreter + ?Sized> Frontier<'a, I> {
    /// Creates a frontier over `seeds`, shuffled with the thread RNG
    pub fn new(
        fetcher: &'a Fetcher,
        interpreter: &'a I,
        seeds: &[SeedUrl],
        options: CrawlOptions,
    ) -> Self {
        Self::with_rng(fetcher, interpreter, seeds, options, &mut rand::thread_rng())
    }

    /// Creates a frontier shuffling with `rng`
    ///
    /// Repeated seed URLs are collapsed so no (seed, page) pair is fetched twice.
    pub fn with_rng<R: Rng + ?Sized>(
        fetcher: &'a Fetcher,
        interpreter: &'a I,
        seeds: &[SeedUrl],
        options: CrawlOptions,
        rng: &mut R,
    ) -> Self {
        let mut seeds = dedup_seeds(seeds.iter().cloned());
        seeds.shuffle(rng);

        let seeds_available = seeds.len();
        if let Some(limit) = options.limit {
            seeds.truncate(limit);
        }

        let entries: Vec<FrontierEntry> = seeds
            .into_iter()
            .map(|seed| FrontierEntry {
                seed,
                state: SeedState::NotStarted,
            })
            .collect();
        let queue = (0..entries.len()).collect();

        tracing::info!(
            "Frontier initialized with {} of {} seeds",
            entries.len(),
            seeds_available
        );

        Self {
            fetcher,
            interpreter,
            options,
            entries,
            queue,
            seeds_available,
            seeds_started: 0,
            seeds_finished: 0,
            pages_fetched: 0,
            started_at: Instant::now(),
        }
    }

    /// Fetches until the next page record can be emitted
    ///
    /// Returns `None` once every seed has reached a terminal state.
    pub async fn next_record(&mut self) -> Option<(PageRecord, CrawlStats)> {
        while let Some(index) = self.queue.pop_front() {
            if let Some(emitted) = self.step(index).await {
                return Some(emitted);
            }
        }
        None
    }

    /// One page fetch for the seed at `index`
    async fn step(&mut self, index: usize) -> Option<(PageRecord, CrawlStats)> {
        if self.entries[index].state == SeedState::NotStarted {
            self.apply(index, |state| state.start());
            self.seeds_started += 1;
        }

        let page = self.entries[index].state.cursor()?;
        if self.over_cap(page) {
            self.cap(index, page);
            return None;
        }

        let url = match self.request_url(index, page) {
            Ok(url) => url,
            Err(cause) => {
                tracing::error!("Invalid seed {}: {}", self.entries[index].seed.url, cause);
                self.fail(index, FailureReason::Fatal(cause));
                return None;
            }
        };

        match self.fetcher.fetch(&url).await {
            FetchOutcome::Success(fetched) => {
                let content = match self.interpreter.interpret(&fetched.body, &fetched.final_url) {
                    Ok(content) => content,
                    Err(e) => {
                        tracing::error!(
                            "Interpreting {} failed. Stopped on page {}: {}",
                            url,
                            page - 1,
                            e
                        );
                        self.fail(index, FailureReason::Fatal(e.to_string()));
                        return None;
                    }
                };

                let seed = &self.entries[index].seed;
                let record = PageRecord {
                    seed_url: seed.url.clone(),
                    seed_last_modified: seed.last_modified.clone(),
                    page_number: page,
                    fetched_at: Utc::now(),
                    response_url: fetched.final_url.to_string(),
                    response_headers: fetched.headers,
                    content,
                };
                self.pages_fetched += 1;

                let next = self.apply(index, |state| state.advance().map(Some));
                match next {
                    Some(next) if self.over_cap(next) => self.cap(index, next),
                    _ => self.queue.push_back(index),
                }

                Some((record, self.stats(index, page)))
            }
            outcome => {
                match outcome.disposition() {
                    Disposition::End => {
                        tracing::debug!("{} has {} pages. Download finished.", url, page - 1);
                        self.apply(index, |state| state.exhaust(false));
                        self.seeds_finished += 1;
                    }
                    Disposition::Abandon(reason) => {
                        match &reason {
                            FailureReason::RedirectMismatch { actual } => tracing::warn!(
                                "{} was redirected to {}. Not handled, the checkpoint may be outdated",
                                url,
                                actual
                            ),
                            other => tracing::error!(
                                "Request failed for {}. Stopped on page {}: {}",
                                url,
                                page - 1,
                                other
                            ),
                        }
                        self.fail(index, reason);
                    }
                    Disposition::Emit => {}
                }
                None
            }
        }
    }

    fn request_url(&self, index: usize, page: u32) -> Result<Url, String> {
        let seed = Url::parse(&self.entries[index].seed.url).map_err(|e| e.to_string())?;
        page_url(&seed, &self.options.fixed_params, page).map_err(|e| e.to_string())
    }

    fn over_cap(&self, page: u32) -> bool {
        self.options
            .max_pages_per_seed
            .is_some_and(|max| page > max)
    }

    fn cap(&mut self, index: usize, next_page: u32) {
        tracing::warn!(
            "For {} only {} pages are fetched. Maybe there are more.",
            self.entries[index].seed.url,
            next_page - 1
        );
        self.apply(index, |state| state.exhaust(true));
        self.seeds_finished += 1;
    }

    fn fail(&mut self, index: usize, reason: FailureReason) {
        self.apply(index, |state| state.fail(reason));
        self.seeds_finished += 1;
    }

    /// Applies a state transition; the queue only ever holds seeds for which
    /// it is valid, so a rejection is logged rather than propagated
    fn apply<T: Default>(
        &mut self,
        index: usize,
        transition: impl FnOnce(&mut SeedState) -> Result<T, InvalidTransition>,
    ) -> T {
        let entry = &mut self.entries[index];
        transition(&mut entry.state).unwrap_or_else(|e| {
            tracing::error!("{} for {}", e, entry.seed.url);
            T::default()
        })
    }

    fn stats(&self, index: usize, page: u32) -> CrawlStats {
        CrawlStats {
            seeds_started: self.seeds_started,
            seeds_finished: self.seeds_finished,
            seeds_total: self.entries.len(),
            seeds_available: self.seeds_available,
            pages_fetched: self.pages_fetched,
            current_seed: self.entries[index].seed.url.clone(),
            current_page: page,
            queue_depth: self.queue.len(),
            elapsed: self.started_at.elapsed(),
        }
    }

    /// Seeds in the frontier after `limit`
    pub fn seeds_total(&self) -> usize {
        self.entries.len()
    }

    /// Seeds offered before `limit`
    pub fn seeds_available(&self) -> usize {
        self.seeds_available
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    /// Seeds still queued
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn is_finished(&self) -> bool {
        self.queue.is_empty()
    }

    /// Every seed with its current state, in shuffled order
    pub fn states(&self) -> impl Iterator<Item = (&SeedUrl, &SeedState)> {
        self.entries.iter().map(|entry| (&entry.seed, &entry.state))
    }

    /// Current state of the seed with URL `url`
    pub fn seed_state(&self, url: &str) -> Option<&SeedState> {
        self.entries
            .iter()
            .find(|entry| entry.seed.url == url)
            .map(|entry| &entry.state)
    }

    pub fn summary(&self) -> CrawlSummary {
        CrawlSummary::from_states(
            self.entries.iter().map(|entry| &entry.state),
            self.seeds_available,
            self.pages_fetched,
        )
    }
}
