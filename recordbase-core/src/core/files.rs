//! The file-storage tree that sits next to each database.
//!
//! Files attached to records live at
//! `<db_dir>/<db_stem>_storage/<table>/<record_id>/<field>_<original_name>`.
//! Records store the path relative to the storage root, always with `/`
//! separators, so databases and their trees can be moved together.

use crate::{RecordbaseError, Result};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Resolves and manages paths under one database's storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Uses `root` as the storage root directly.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store that belongs to the database file at `db_path`.
    ///
    /// `/data/shop.db` maps to `/data/shop_storage/`.
    pub fn for_database(db_path: &Path) -> Self {
        Self::new(Self::root_for(db_path))
    }

    /// The storage root that belongs to the database file at `db_path`.
    pub fn root_for(db_path: &Path) -> PathBuf {
        let stem = db_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "database".to_string());
        let dir = db_path.parent().unwrap_or_else(|| Path::new(""));
        dir.join(format!("{stem}_storage"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.root.join(table)
    }

    pub fn record_dir(&self, table: &str, record_id: i64) -> PathBuf {
        self.table_dir(table).join(record_id.to_string())
    }

    /// Path of a stored file relative to the root, `/`-separated.
    ///
    /// Only the last component of `original_name` is kept, so callers can
    /// pass a full source path and the result still lands in the record's
    /// directory.
    pub fn relative_path(
        &self,
        table: &str,
        record_id: i64,
        field: &str,
        original_name: &str,
    ) -> String {
        format!("{table}/{record_id}/{field}_{}", file_name_of(original_name))
    }

    /// Absolute path of a stored file.
    pub fn resolve(&self, table: &str, record_id: i64, field: &str, original_name: &str) -> PathBuf {
        self.record_dir(table, record_id)
            .join(format!("{field}_{}", file_name_of(original_name)))
    }

    /// Turns a stored relative path back into an absolute one.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbaseError::Storage`] with `InvalidInput` if `relative`
    /// is absolute or would climb out of the root.
    pub fn absolute(&self, relative: &str) -> Result<PathBuf> {
        let candidate = Path::new(relative);
        if relative.is_empty() || candidate.is_absolute() {
            return Err(outside_root(relative));
        }
        for component in candidate.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(outside_root(relative));
                }
            }
        }
        Ok(self.root.join(candidate))
    }

    /// Creates the record's directory if it does not exist yet.
    pub fn ensure_dir(&self, table: &str, record_id: i64) -> Result<PathBuf> {
        let dir = self.record_dir(table, record_id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Copies `source` into the record's directory and returns the relative path.
    ///
    /// An existing file at the target path is overwritten.
    pub fn store_file(&self, table: &str, record_id: i64, field: &str, source: &Path) -> Result<String> {
        let original = source
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| {
                RecordbaseError::Storage(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("'{}' does not name a file", source.display()),
                ))
            })?;
        self.copy_into(table, record_id, field, source, &original)
    }

    /// Like [`FileStore::store_file`], but names the stored copy after
    /// `original_name` instead of the source file.
    pub fn copy_into(
        &self,
        table: &str,
        record_id: i64,
        field: &str,
        source: &Path,
        original_name: &str,
    ) -> Result<String> {
        self.ensure_dir(table, record_id)?;
        let target = self.resolve(table, record_id, field, original_name);
        if target != source {
            fs::copy(source, &target)?;
        }
        log::debug!("stored '{}' as '{}'", source.display(), target.display());
        Ok(self.relative_path(table, record_id, field, original_name))
    }

    /// Deletes one stored file. A missing file is not an error.
    pub fn delete_file(&self, relative: &str) -> Result<()> {
        ignore_missing(fs::remove_file(self.absolute(relative)?))
    }

    /// Deletes everything stored for one record.
    pub fn delete_record_files(&self, table: &str, record_id: i64) -> Result<()> {
        ignore_missing(fs::remove_dir_all(self.record_dir(table, record_id)))
    }

    /// Deletes everything stored for one table.
    pub fn delete_table_files(&self, table: &str) -> Result<()> {
        ignore_missing(fs::remove_dir_all(self.table_dir(table)))
    }

    pub fn file_exists(&self, relative: &str) -> bool {
        self.absolute(relative).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn file_size(&self, relative: &str) -> Result<u64> {
        Ok(fs::metadata(self.absolute(relative)?)?.len())
    }
}

fn file_name_of(original_name: &str) -> String {
    // Backslashes are treated as separators too so Windows-style uploads keep
    // only their base name.
    original_name
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty() && *part != "." && *part != "..")
        .unwrap_or("file")
        .to_string()
}

fn outside_root(relative: &str) -> RecordbaseError {
    RecordbaseError::Storage(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("'{relative}' is not a path inside the storage root"),
    ))
}

fn ignore_missing(result: io::Result<()>) -> Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => Ok(other?),
    }
}
