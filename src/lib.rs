//! Listing Harvester: a polite, resumable harvester for paginated listings
//!
//! This crate discovers seed URLs from a two-level sitemap index, persists
//! them as a dated checkpoint, and then paginates every seed under a global
//! request budget, streaming each validated page into an append-only archive.

pub mod config;
pub mod crawler;
pub mod discovery;
pub mod interpret;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Request to {url} failed: {message}")]
    Fetch { url: String, message: String },

    #[error("Unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Retries exhausted for {url} after {attempts} attempts")]
    RetryExhausted { url: String, attempts: u32 },

    #[error("Request for {requested} resolved to {actual}")]
    RedirectMismatch { requested: String, actual: String },

    #[error("Discovery failed at {url}: {message}")]
    Discovery { url: String, message: String },

    #[error("Unknown language '{0}' (not present in checkpoint)")]
    UnknownLanguage(String),

    #[error("Archive error: {0}")]
    Archive(#[from] storage::ArchiveError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("URL has no path segment to derive a seed key from: {0}")]
    MissingSeedKey(String),

    #[error("URL cannot carry query parameters: {0}")]
    CannotBeABase(String),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{FetchOutcome, Fetcher, Frontier};
pub use discovery::{DiscoverySnapshot, SeedUrl};
pub use interpret::{JsonLdInterpreter, PageInterpreter};
pub use output::{CrawlStats, CrawlSummary};
pub use state::SeedState;
pub use storage::{Archive, ArchiveWriter, CheckpointStore, PageRecord};
