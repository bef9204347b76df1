//! An open Recordbase database: one SQLite connection plus its storage tree.

use crate::{FileStore, Result, Storage};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// An open database session.
///
/// `Database` owns the SQLite connection and the [`FileStore`] of the file's
/// storage tree. Catalog, record and query operations are methods on it;
/// import/export and backup are free functions that borrow it.
///
/// Switching to another database means calling [`Database::close`] and
/// opening the next one; there is never more than one connection per value.
pub struct Database {
    storage: Storage,
    files: FileStore,
    path: PathBuf,
}

impl Database {
    /// Creates a new database at `path` with an empty catalog.
    ///
    /// If `path` already holds a Recordbase database its catalog is kept.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RecordbaseError::Database`] for any SQLite failure.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let storage = Storage::create(path)?;
        log::info!("created database {}", path.display());
        Ok(Self::from_parts(storage, path))
    }

    /// Opens an existing database file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RecordbaseError::InvalidDatabase`] if the file does
    /// not exist or lacks the `_tables`/`_fields` catalog.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let storage = Storage::open(path)?;
        log::info!("opened database {}", path.display());
        Ok(Self::from_parts(storage, path))
    }

    /// Opens `path` if it exists, otherwise creates it.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.is_file() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    fn from_parts(storage: Storage, path: &Path) -> Self {
        Self {
            storage,
            files: FileStore::for_database(path),
            path: path.to_path_buf(),
        }
    }

    /// Path of the database file this session was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The storage tree that belongs to this database.
    pub fn files(&self) -> &FileStore {
        &self.files
    }

    /// Returns the underlying SQLite connection.
    pub fn connection(&self) -> &Connection {
        self.storage.connection()
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        self.storage.connection_mut()
    }

    /// Closes the session and releases the connection.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RecordbaseError::Database`] if SQLite refuses to close,
    /// for example because a statement is still being stepped.
    pub fn close(self) -> Result<()> {
        let path = self.path;
        self.storage.close()?;
        log::info!("closed database {}", path.display());
        Ok(())
    }
}
