//! Output module for progress reporting and run summaries
//!
//! This module handles:
//! - The live progress line rendered from [`CrawlStats`]
//! - End-of-run summaries built from the final seed states
//! - The language overview table of a checkpoint

pub mod stats;

pub use stats::{format_progress, format_summary, print_summary, CrawlStats, CrawlSummary};

use crate::discovery::DiscoverySnapshot;
use std::fmt::Write;

/// Renders the language overview of a checkpoint as a table
pub fn format_language_overview(snapshot: &DiscoverySnapshot) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{:<10} {:<24} {:>10}", "language", "label", "seeds");
    for overview in &snapshot.language_overview {
        let _ = writeln!(
            out,
            "{:<10} {:<24} {:>10}",
            overview.language_id, overview.label, overview.seed_count
        );
    }
    let _ = writeln!(out, "{:<10} {:<24} {:>10}", "total", "", snapshot.total_seeds());

    out
}
