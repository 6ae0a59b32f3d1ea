//! Page record archive writer
//!
//! One archive per (date, language). Entries are named `{seed_key}/{page}.json`
//! and hold a serialized [`PageRecord`].

use crate::storage::archive::{Archive, ArchiveResult};
use crate::storage::{PageRecord, META_CONFIG_HASH, META_CREATED_AT, META_KIND, META_LANGUAGE};
use crate::url::seed_key;
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use url::Url;

/// Value of the `kind` metadata for page archives
pub const KIND_PAGES: &str = "pages";

/// Entry name of page `page` of the seed keyed `seed_key`
pub fn entry_name(seed_key: &str, page: u32) -> String {
    format!("{}/{}.json", seed_key, page)
}

/// First unused output path for a run on `date`
///
/// `{date}-{language}-pages.sqlite`, then `-2`, `-3`, ... so an earlier run of
/// the same day is never overwritten.
pub fn next_available_path(dir: &Path, date: NaiveDate, language: &str) -> PathBuf {
    let stem = format!("{}-{}-pages", date.format("%Y-%m-%d"), language);

    let mut candidate = dir.join(format!("{}.sqlite", stem));
    let mut suffix = 2;
    while candidate.exists() {
        candidate = dir.join(format!("{}-{}.sqlite", stem, suffix));
        suffix += 1;
    }
    candidate
}

/// Streams page records into a fresh archive
pub struct ArchiveWriter {
    archive: Archive,
    written: usize,
}

impl ArchiveWriter {
    /// Creates the archive at `path` and stamps its metadata
    pub fn create(path: &Path, language: &str, config_hash: Option<&str>) -> ArchiveResult<Self> {
        let mut archive = Archive::create(path)?;
        archive.set_meta(META_KIND, KIND_PAGES)?;
        archive.set_meta(META_LANGUAGE, language)?;
        archive.set_meta(META_CREATED_AT, &Utc::now().to_rfc3339())?;
        if let Some(hash) = config_hash {
            archive.set_meta(META_CONFIG_HASH, hash)?;
        }

        tracing::info!("Writing page records to {}", path.display());

        Ok(Self {
            archive,
            written: 0,
        })
    }

    /// Appends `record` as page `page` of `seed_key`; returns the entry name
    pub fn write(&mut self, seed_key: &str, page: u32, record: &PageRecord) -> ArchiveResult<String> {
        let name = entry_name(seed_key, page);
        self.archive.write_json(&name, record)?;
        self.written += 1;
        Ok(name)
    }

    /// Appends `record`, deriving the seed key from its seed URL
    pub fn write_record(&mut self, record: &PageRecord) -> crate::Result<String> {
        let key = seed_key(&Url::parse(&record.seed_url)?)?;
        Ok(self.write(&key, record.page_number, record)?)
    }

    /// Number of records written through this writer
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn path(&self) -> &Path {
        self.archive.path()
    }

    /// Finalizes the archive; returns the number of records written
    pub fn close(self) -> ArchiveResult<usize> {
        let written = self.written;
        let path = self.archive.path().to_path_buf();
        self.archive.close()?;
        tracing::info!("Closed {} with {} records", path.display(), written);
        Ok(written)
    }
}

/// Reads every page record of an archive, in write order
pub fn load_records(path: &Path) -> ArchiveResult<Vec<(String, PageRecord)>> {
    let archive = Archive::open(path)?;
    archive
        .entry_names()?
        .into_iter()
        .map(|name| {
            let record = archive.read_json(&name)?;
            Ok((name, record))
        })
        .collect()
}
