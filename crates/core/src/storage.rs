//! The storage driver (C8): journal, snapshot, and migration files on disk.
//!
//! Layout under a caller-chosen base directory: `journal.json`,
//! `snapshot.json`, `<idx padded to 4>_<name>.sql`, an optional
//! `<idx>_<name>.down.sql`, and `_backup/<timestamp>_<idx>_<name>.sql` for
//! archived migrations. Every write is atomic-replace: write to a temp file
//! in the same directory, then rename over the target.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dialect::DialectKind;
use crate::error::{Error, Result};
use crate::snapshot::SchemaSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationEntry {
    pub idx: u32,
    /// Sortable timestamp string, e.g. `20260730120501`.
    pub version: String,
    pub name: String,
    /// Milliseconds since the Unix epoch.
    pub when: i64,
    pub checksum: String,
}

impl MigrationEntry {
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!("{:04}_{}", self.idx, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationJournal {
    /// Journal format tag, independent of any single entry's `version`.
    pub version: String,
    pub dialect: DialectKind,
    pub entries: Vec<MigrationEntry>,
}

impl MigrationJournal {
    #[must_use]
    pub fn new(version: impl Into<String>, dialect: DialectKind) -> Self {
        Self {
            version: version.into(),
            dialect,
            entries: Vec::new(),
        }
    }

    /// Validates the §3 invariants: entries sorted by `idx`, `idx`
    /// contiguous from 0, `(version, name)` unique.
    pub fn validate(&self) -> Result<()> {
        for (position, entry) in self.entries.iter().enumerate() {
            if entry.idx as usize != position {
                return Err(Error::invalid_schema(format!(
                    "journal entries must have contiguous idx from 0; found idx {} at position {position}",
                    entry.idx
                )));
            }
        }
        let mut seen = std::collections::BTreeSet::new();
        for entry in &self.entries {
            if !seen.insert((entry.version.as_str(), entry.name.as_str())) {
                return Err(Error::invalid_schema(format!(
                    "duplicate journal entry for (version, name) = ({}, {})",
                    entry.version, entry.name
                )));
            }
        }
        Ok(())
    }
}

pub struct FilesystemStorage {
    base_dir: PathBuf,
}

impl FilesystemStorage {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn journal_path(&self) -> PathBuf {
        self.base_dir.join("journal.json")
    }

    fn snapshot_path(&self) -> PathBuf {
        self.base_dir.join("snapshot.json")
    }

    fn migration_path(&self, entry: &MigrationEntry) -> PathBuf {
        self.base_dir.join(format!("{}.sql", entry.file_stem()))
    }

    fn down_migration_path(&self, entry: &MigrationEntry) -> PathBuf {
        self.base_dir.join(format!("{}.down.sql", entry.file_stem()))
    }

    fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("_backup")
    }

    fn backup_path(&self, entry: &MigrationEntry, timestamp_millis: i64) -> PathBuf {
        self.backup_dir()
            .join(format!("{timestamp_millis}_{}.sql", entry.file_stem()))
    }

    /// # Errors
    /// Propagates filesystem and JSON deserialization errors.
    pub fn read_journal(&self) -> Result<Option<MigrationJournal>> {
        read_json_if_exists(&self.journal_path())
    }

    /// # Errors
    /// Propagates filesystem and JSON serialization errors.
    pub fn write_journal(&self, journal: &MigrationJournal) -> Result<()> {
        journal.validate()?;
        fs::create_dir_all(&self.base_dir)?;
        write_json_atomic(&self.journal_path(), journal)
    }

    /// Reads the journal if present, or creates a fresh one tagged for
    /// `dialect`. Fails with [`Error::DialectMismatch`] if the stored
    /// journal was created for a different dialect.
    pub fn get_or_create_journal(&self, dialect: DialectKind, journal_version: &str) -> Result<MigrationJournal> {
        match self.read_journal()? {
            Some(journal) if journal.dialect == dialect => Ok(journal),
            Some(journal) => Err(Error::DialectMismatch {
                expected: journal.dialect.to_string(),
                actual: dialect.to_string(),
            }),
            None => Ok(MigrationJournal::new(journal_version, dialect)),
        }
    }

    /// # Errors
    /// Propagates filesystem and JSON deserialization errors.
    pub fn read_snapshot(&self) -> Result<Option<SchemaSnapshot>> {
        read_json_if_exists(&self.snapshot_path())
    }

    /// # Errors
    /// Propagates filesystem and JSON serialization errors.
    pub fn write_snapshot(&self, snapshot: &SchemaSnapshot) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        write_json_atomic(&self.snapshot_path(), snapshot)
    }

    pub fn get_snapshot_or_empty(&self) -> Result<SchemaSnapshot> {
        Ok(self.read_snapshot()?.unwrap_or_default())
    }

    /// # Errors
    /// Propagates filesystem errors; returns `Ok(None)` if no file exists.
    pub fn read_migration(&self, entry: &MigrationEntry) -> Result<Option<String>> {
        read_string_if_exists(&self.migration_path(entry))
    }

    /// # Errors
    /// Propagates filesystem errors.
    pub fn write_migration(&self, entry: &MigrationEntry, sql: &str) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        write_string_atomic(&self.migration_path(entry), sql)
    }

    /// # Errors
    /// Propagates filesystem errors.
    pub fn write_down_migration(&self, entry: &MigrationEntry, sql: &str) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        write_string_atomic(&self.down_migration_path(entry), sql)
    }

    /// # Errors
    /// Propagates filesystem errors.
    pub fn delete_migration(&self, entry: &MigrationEntry) -> Result<()> {
        let path = self.migration_path(entry);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn migration_exists(&self, entry: &MigrationEntry) -> bool {
        self.migration_path(entry).exists()
    }

    /// Copies the migration file into `_backup/`; returns `None` if the
    /// source doesn't exist.
    pub fn backup_migration(&self, entry: &MigrationEntry, timestamp_millis: i64) -> Result<Option<PathBuf>> {
        let source = self.migration_path(entry);
        if !source.exists() {
            return Ok(None);
        }
        let destination = self.backup_path(entry, timestamp_millis);
        fs::create_dir_all(self.backup_dir())?;
        fs::copy(&source, &destination)?;
        Ok(Some(destination))
    }

    /// Like [`Self::backup_migration`] but additionally deletes the source.
    pub fn archive_migration(&self, entry: &MigrationEntry, timestamp_millis: i64) -> Result<Option<PathBuf>> {
        let backed_up = self.backup_migration(entry, timestamp_millis)?;
        if backed_up.is_some() {
            self.delete_migration(entry)?;
        }
        Ok(backed_up)
    }
}

fn read_json_if_exists<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match read_string_if_exists(path)? {
        Some(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        None => Ok(None),
    }
}

fn read_string_if_exists(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error.into()),
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents = serde_json::to_string_pretty(value)?;
    write_string_atomic(path, &contents)
}

fn write_string_atomic(path: &Path, contents: &str) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
