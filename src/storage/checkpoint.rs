//! Dated discovery checkpoints
//!
//! A checkpoint is an archive named `{YYYY-MM-DD}.sqlite` holding the three
//! documents of a [`DiscoverySnapshot`]. Loading picks the latest date.

use crate::discovery::DiscoverySnapshot;
use crate::storage::archive::{Archive, ArchiveResult};
use crate::storage::{META_CREATED_AT, META_KIND};
use chrono::{Local, NaiveDate, Utc};
use std::path::{Path, PathBuf};

/// Value of the `kind` metadata for checkpoint archives
pub const KIND_CHECKPOINT: &str = "checkpoint";

const AVAILABLE_LANGUAGES: &str = "available_languages.json";
const LANGUAGE_OVERVIEW: &str = "language_overview.json";
const LANGUAGE_SEED_URLS: &str = "language_seed_urls.json";

const DATE_FORMAT: &str = "%Y-%m-%d";
const EXTENSION: &str = "sqlite";

/// A loaded checkpoint
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub date: NaiveDate,
    pub path: PathBuf,
    pub snapshot: DiscoverySnapshot,
    /// Set when the checkpoint predates the day it was loaded on
    pub stale: bool,
}

/// Directory of dated discovery checkpoints
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Checkpoint path for `date`
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}.{}", date.format(DATE_FORMAT), EXTENSION))
    }

    /// Saves `snapshot` as today's checkpoint
    pub fn save(&self, snapshot: &DiscoverySnapshot) -> ArchiveResult<PathBuf> {
        self.save_as_of(snapshot, Local::now().date_naive())
    }

    /// Saves `snapshot` as the checkpoint of `date`
    ///
    /// The archive is built under a temporary name and renamed into place, so
    /// a crash never leaves a half-written checkpoint behind a valid name. An
    /// existing checkpoint of the same date is replaced.
    pub fn save_as_of(&self, snapshot: &DiscoverySnapshot, date: NaiveDate) -> ArchiveResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.path_for(date);
        let partial = path.with_extension(format!("{}.partial", EXTENSION));
        if partial.exists() {
            std::fs::remove_file(&partial)?;
        }

        let mut archive = Archive::create(&partial)?;
        archive.set_meta(META_KIND, KIND_CHECKPOINT)?;
        archive.set_meta(META_CREATED_AT, &Utc::now().to_rfc3339())?;
        archive.write_json(AVAILABLE_LANGUAGES, &snapshot.available_languages)?;
        archive.write_json(LANGUAGE_OVERVIEW, &snapshot.language_overview)?;
        archive.write_json(LANGUAGE_SEED_URLS, &snapshot.language_seed_urls)?;
        archive.close()?;

        std::fs::rename(&partial, &path)?;

        tracing::info!(
            "Saved checkpoint {} ({} languages, {} seeds)",
            path.display(),
            snapshot.available_languages.len(),
            snapshot.total_seeds()
        );
        Ok(path)
    }

    /// Latest checkpoint by embedded date; files not named by a date are ignored
    pub fn latest(&self) -> ArchiveResult<Option<(NaiveDate, PathBuf)>> {
        if !self.dir.is_dir() {
            return Ok(None);
        }

        let mut latest: Option<(NaiveDate, PathBuf)> = None;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(date) = checkpoint_date(&path) else {
                continue;
            };
            if latest.as_ref().map_or(true, |(best, _)| date > *best) {
                latest = Some((date, path));
            }
        }

        Ok(latest)
    }

    /// Loads the latest checkpoint, flagging it stale if older than today
    pub fn load(&self) -> ArchiveResult<Option<Checkpoint>> {
        self.load_as_of(Local::now().date_naive())
    }

    /// Loads the latest checkpoint, judging staleness against `today`
    pub fn load_as_of(&self, today: NaiveDate) -> ArchiveResult<Option<Checkpoint>> {
        let Some((date, path)) = self.latest()? else {
            tracing::info!("No checkpoint found in {}", self.dir.display());
            return Ok(None);
        };

        tracing::info!("Loading checkpoint from {} ...", date);
        let stale = date < today;
        if stale {
            tracing::info!(
                "Checkpoint from {} might be outdated; run discovery again to refresh it",
                date
            );
        }

        let archive = Archive::open(&path)?;
        let snapshot = DiscoverySnapshot {
            available_languages: archive.read_json(AVAILABLE_LANGUAGES)?,
            language_overview: archive.read_json(LANGUAGE_OVERVIEW)?,
            language_seed_urls: archive.read_json(LANGUAGE_SEED_URLS)?,
        };

        Ok(Some(Checkpoint {
            date,
            path,
            snapshot,
            stale,
        }))
    }
}

/// Date embedded in a checkpoint file name, if it is strictly `YYYY-MM-DD.sqlite`
fn checkpoint_date(path: &Path) -> Option<NaiveDate> {
    if path.extension()?.to_str()? != EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let date = NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()?;

    // Rejects unpadded forms such as 2024-5-7
    (date.format(DATE_FORMAT).to_string() == stem).then_some(date)
}
