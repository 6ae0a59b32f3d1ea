//! Single-file archive over SQLite
//!
//! Both the discovery checkpoint and the harvested pages are stored through
//! this type. Every entry write is its own committed statement, so a crash
//! leaves a readable archive holding every entry written before it.
//!
//! JSON entries are gzip-compressed; the codec is recorded under the `codec`
//! metadata key when the archive is created.

use crate::storage::schema::initialize_schema;
use crate::storage::META_CODEC;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Codec applied to every JSON entry
pub const CODEC_GZIP: &str = "gzip";

/// Errors that can occur during archive operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("Archive not found: {0}")]
    NotFound(PathBuf),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Missing entry: {0}")]
    MissingEntry(String),

    #[error("Archive opened read-only: {0}")]
    ReadOnly(PathBuf),

    #[error("Serialization error in {entry}: {source}")]
    Serialization {
        entry: String,
        source: serde_json::Error,
    },
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// An append-only collection of named entries in one file
pub struct Archive {
    conn: Connection,
    path: PathBuf,
    writable: bool,
}

impl Archive {
    /// Creates a new archive; refuses to touch an existing file
    pub fn create(path: &Path) -> ArchiveResult<Self> {
        if path.exists() {
            return Err(ArchiveError::AlreadyExists(path.to_path_buf()));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA synchronous = FULL;")?;
        initialize_schema(&conn)?;

        let mut archive = Self {
            conn,
            path: path.to_path_buf(),
            writable: true,
        };
        archive.set_meta(META_CODEC, CODEC_GZIP)?;
        Ok(archive)
    }

    /// Opens an existing archive for reading
    pub fn open(path: &Path) -> ArchiveResult<Self> {
        if !path.is_file() {
            return Err(ArchiveError::NotFound(path.to_path_buf()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            writable: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stores `data` under `name`; each name can be written once
    pub fn write_entry(&mut self, name: &str, data: &[u8]) -> ArchiveResult<()> {
        self.ensure_writable()?;

        let now = chrono::Utc::now().to_rfc3339();
        match self.conn.execute(
            "INSERT INTO entries (name, data, written_at) VALUES (?1, ?2, ?3)",
            params![name, data, now],
        ) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(ArchiveError::DuplicateEntry(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the payload stored under `name`
    pub fn read_entry(&self, name: &str) -> ArchiveResult<Vec<u8>> {
        self.conn
            .query_row(
                "SELECT data FROM entries WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| ArchiveError::MissingEntry(name.to_string()))
    }

    /// Serializes `value` as JSON and stores it gzip-compressed under `name`
    pub fn write_json<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> ArchiveResult<()> {
        let json = serde_json::to_vec(value).map_err(|source| ArchiveError::Serialization {
            entry: name.to_string(),
            source,
        })?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        let data = encoder.finish()?;

        self.write_entry(name, &data)
    }

    /// Reads the JSON entry `name` back into a `T`
    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> ArchiveResult<T> {
        let data = self.read_entry(name)?;

        let mut json = Vec::new();
        GzDecoder::new(data.as_slice()).read_to_end(&mut json)?;

        serde_json::from_slice(&json).map_err(|source| ArchiveError::Serialization {
            entry: name.to_string(),
            source,
        })
    }

    /// Entry names in write order
    pub fn entry_names(&self) -> ArchiveResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM entries ORDER BY rowid")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn contains(&self, name: &str) -> ArchiveResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM entries WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn len(&self) -> ArchiveResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> ArchiveResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Sets an archive-level metadata value
    pub fn set_meta(&mut self, key: &str, value: &str) -> ArchiveResult<()> {
        self.ensure_writable()?;
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn meta(&self, key: &str) -> ArchiveResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Finalizes the archive and releases the file
    pub fn close(self) -> ArchiveResult<()> {
        self.conn.close().map_err(|(_, e)| ArchiveError::Sqlite(e))
    }

    fn ensure_writable(&self) -> ArchiveResult<()> {
        if self.writable {
            Ok(())
        } else {
            Err(ArchiveError::ReadOnly(self.path.clone()))
        }
    }
}
