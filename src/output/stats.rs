//! Live progress and end-of-run statistics
//!
//! [`CrawlStats`] travels with every emitted page record; [`CrawlSummary`]
//! aggregates the final seed states of a run.

use crate::state::{FailureReason, SeedState};
use crate::url::seed_key;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;
use url::Url;

/// Running counters, recomputed for every emitted record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStats {
    /// Seeds whose first page has been requested
    pub seeds_started: usize,

    /// Seeds in a terminal state
    pub seeds_finished: usize,

    /// Frontier size after `limit` was applied
    pub seeds_total: usize,

    /// Seeds known for the language before `limit`
    pub seeds_available: usize,

    /// Pages emitted so far
    pub pages_fetched: u64,

    /// Seed and page of the record this snapshot accompanies
    pub current_seed: String,
    pub current_page: u32,

    /// Seeds still queued
    pub queue_depth: usize,

    /// Time since the frontier was created
    pub elapsed: Duration,
}

impl CrawlStats {
    /// Average wall time per emitted page
    pub fn time_per_page(&self) -> Option<Duration> {
        u32::try_from(self.pages_fetched)
            .ok()
            .filter(|pages| *pages > 0)
            .map(|pages| self.elapsed / pages)
    }
}

/// Renders the live progress line
///
/// `seeds: 3/10 | pages: 42 | elapsed: 61.0s | per page: 1.45s | shop.com`
pub fn format_progress(stats: &CrawlStats) -> String {
    let per_page = stats
        .time_per_page()
        .map(|d| format!("{:.2}s", d.as_secs_f64()))
        .unwrap_or_else(|| "-".to_string());

    let current = Url::parse(&stats.current_seed)
        .ok()
        .and_then(|url| seed_key(&url).ok())
        .unwrap_or_else(|| stats.current_seed.clone());

    format!(
        "seeds: {}/{} | pages: {} | elapsed: {:.1}s | per page: {} | {}",
        stats.seeds_started,
        stats.seeds_total,
        stats.pages_fetched,
        stats.elapsed.as_secs_f64(),
        per_page,
        current
    )
}

/// Final seed-state counts of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub seeds_total: usize,
    pub seeds_available: usize,

    /// Ended on a 404
    pub seeds_exhausted: usize,

    /// Stopped by the per-seed page cap
    pub seeds_capped: usize,

    /// Failed seeds by reason label
    pub seeds_failed: BTreeMap<&'static str, usize>,

    /// Seeds not yet terminal (only non-zero for an unfinished frontier)
    pub seeds_unfinished: usize,

    pub pages_fetched: u64,
}

impl CrawlSummary {
    /// Aggregates the given seed states
    pub fn from_states<'a>(
        states: impl IntoIterator<Item = &'a SeedState>,
        seeds_available: usize,
        pages_fetched: u64,
    ) -> Self {
        let mut summary = Self {
            seeds_available,
            pages_fetched,
            ..Default::default()
        };

        for state in states {
            summary.seeds_total += 1;
            match state {
                SeedState::Exhausted { capped: false, .. } => summary.seeds_exhausted += 1,
                SeedState::Exhausted { capped: true, .. } => summary.seeds_capped += 1,
                SeedState::Failed { reason, .. } => {
                    *summary.seeds_failed.entry(reason.label()).or_default() += 1
                }
                SeedState::NotStarted | SeedState::InProgress { .. } => {
                    summary.seeds_unfinished += 1
                }
            }
        }

        summary
    }

    pub fn seeds_failed_total(&self) -> usize {
        self.seeds_failed.values().sum()
    }

    /// Seeds whose pages resolved elsewhere; a sign of a stale checkpoint
    pub fn redirect_mismatches(&self) -> usize {
        let label = FailureReason::RedirectMismatch {
            actual: String::new(),
        }
        .label();
        self.seeds_failed.get(label).copied().unwrap_or(0)
    }
}

/// Renders the summary as a small text report
pub fn format_summary(summary: &CrawlSummary, elapsed: Duration) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Harvest Summary ===");
    let _ = writeln!(
        out,
        "  Seeds crawled: {} (of {} available)",
        summary.seeds_total, summary.seeds_available
    );
    let _ = writeln!(out, "  Pages fetched: {}", summary.pages_fetched);
    let _ = writeln!(out, "  Elapsed: {:.1}s", elapsed.as_secs_f64());
    let _ = writeln!(out, "  Exhausted: {}", summary.seeds_exhausted);
    let _ = writeln!(out, "  Capped: {}", summary.seeds_capped);

    if !summary.seeds_failed.is_empty() {
        let _ = writeln!(out, "  Failed: {}", summary.seeds_failed_total());
        for (reason, count) in &summary.seeds_failed {
            let _ = writeln!(out, "    {}: {}", reason, count);
        }
    }

    if summary.seeds_unfinished > 0 {
        let _ = writeln!(out, "  Unfinished: {}", summary.seeds_unfinished);
    }

    if summary.redirect_mismatches() > 0 {
        let _ = writeln!(
            out,
            "  Note: {} seeds redirected elsewhere; the checkpoint may be outdated",
            summary.redirect_mismatches()
        );
    }

    out
}

/// Prints the summary to stdout
pub fn print_summary(summary: &CrawlSummary, elapsed: Duration) {
    print!("{}", format_summary(summary, elapsed));
}
