//! Crawler module for fetching and paginating seeds
//!
//! This module contains the core harvesting logic, including:
//! - The sliding-window request budget
//! - HTTP fetching with retry and redirect validation
//! - The round-robin frontier scheduler
//! - Overall run coordination

mod coordinator;
mod fetcher;
mod frontier;
pub mod limiter;

pub use coordinator::{HarvestReport, Harvester};
pub use fetcher::{
    build_http_client, Disposition, FetchOutcome, FetchedPage, Fetcher, RETRY_STATUS,
};
pub use frontier::{CrawlOptions, Frontier};
pub use limiter::RateLimiter;
