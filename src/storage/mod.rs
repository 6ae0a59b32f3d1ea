//! Storage module for persisting harvest data
//!
//! This module handles all file output of the harvester:
//! - [`Archive`]: single-file append-only entry store over SQLite
//! - [`ArchiveWriter`]: one archive per (date, language) of page records
//! - [`CheckpointStore`]: dated discovery snapshots

mod archive;
mod checkpoint;
mod schema;
mod writer;

pub use archive::{Archive, ArchiveError, ArchiveResult, CODEC_GZIP};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use writer::{entry_name, load_records, next_available_path, ArchiveWriter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key naming what an archive holds
pub const META_KIND: &str = "kind";
pub const META_LANGUAGE: &str = "language";
pub const META_CREATED_AT: &str = "created_at";
pub const META_CONFIG_HASH: &str = "config_hash";
pub const META_CODEC: &str = "codec";

/// One harvested listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Pagination root this page belongs to
    pub seed_url: String,
    /// `lastmod` of the seed as discovered
    pub seed_last_modified: Option<String>,
    pub page_number: u32,
    pub fetched_at: DateTime<Utc>,
    /// URL the response resolved to
    pub response_url: String,
    pub response_headers: BTreeMap<String, String>,
    /// Output of the page interpreter
    pub content: serde_json::Value,
}
