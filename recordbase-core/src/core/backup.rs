//! Whole-database backups as `.zip` archives.
//!
//! An archive holds three things:
//!
//! - `manifest.json`: a [`BackupManifest`]
//! - `database.db`: a snapshot taken with `VACUUM INTO`
//! - `storage/`: the database's file-storage tree
//!
//! Backups and restores block the caller until done and cannot be cancelled.
//! Both work on temporary files next to their target, so a failure leaves the
//! prior archive, database and storage tree untouched.

use crate::core::export::APP_VERSION;
use crate::{Database, FileStore, RecordbaseError, Result, Storage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Current archive layout version.
pub const BACKUP_FORMAT_VERSION: u32 = 1;

const MANIFEST_ENTRY: &str = "manifest.json";
const DATABASE_ENTRY: &str = "database.db";
const STORAGE_PREFIX: &str = "storage/";

/// Contents of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupManifest {
    pub format_version: u32,
    pub backup_id: String,
    pub app_version: String,
    pub created_at: DateTime<Utc>,
    /// File name of the database the backup was taken from.
    pub database_name: String,
    pub file_count: usize,
}

/// Describes a written backup archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDescriptor {
    pub archive_path: PathBuf,
    pub created_at: DateTime<Utc>,
    /// Number of files copied from the storage tree.
    pub file_count: usize,
}

/// Archive name used when backing up `db_path` at `at`.
pub fn backup_file_name(db_path: &Path, at: DateTime<Utc>) -> String {
    let stem = db_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "database".to_string());
    format!("{stem}_backup_{}.zip", at.format("%Y%m%d_%H%M%S"))
}

/// Writes a backup of `db` and its storage tree.
///
/// If `destination` is an existing directory the archive is placed inside it
/// under [`backup_file_name`]; otherwise `destination` is the archive path.
/// The archive only appears at its final path once it is complete.
///
/// # Errors
///
/// Returns [`RecordbaseError::Database`] if the snapshot cannot be taken and
/// [`RecordbaseError::Storage`] or [`RecordbaseError::Archive`] if writing
/// the archive fails.
pub fn backup(db: &Database, destination: &Path) -> Result<BackupDescriptor> {
    let created_at = Utc::now();
    let archive_path = if destination.is_dir() {
        destination.join(backup_file_name(db.path(), created_at))
    } else {
        destination.to_path_buf()
    };
    let dir = match archive_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let scratch = tempfile::Builder::new().prefix(".recordbase-backup").tempdir_in(&dir)?;
    let snapshot = scratch.path().join(DATABASE_ENTRY);
    db.connection()
        .execute("VACUUM INTO ?1", [snapshot.to_string_lossy().into_owned()])?;

    let files = collect_storage_files(db.files().root())?;
    let manifest = BackupManifest {
        format_version: BACKUP_FORMAT_VERSION,
        backup_id: uuid::Uuid::new_v4().to_string(),
        app_version: APP_VERSION.to_string(),
        created_at,
        database_name: db
            .path()
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        file_count: files.len(),
    };

    let mut archive = tempfile::NamedTempFile::new_in(&dir)?;
    write_archive(archive.as_file_mut(), &manifest, &snapshot, db.files().root(), &files)?;
    archive.as_file().sync_all()?;
    archive
        .persist(&archive_path)
        .map_err(|e| RecordbaseError::Storage(e.error))?;

    log::info!(
        "backed up '{}' to '{}' ({} file(s))",
        db.path().display(),
        archive_path.display(),
        files.len()
    );
    Ok(BackupDescriptor { archive_path, created_at, file_count: files.len() })
}

fn write_archive<W: Write + Seek>(
    out: W,
    manifest: &BackupManifest,
    snapshot: &Path,
    storage_root: &Path,
    files: &[String],
) -> Result<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(out);

    zip.start_file(MANIFEST_ENTRY, options)?;
    zip.write_all(&serde_json::to_vec_pretty(manifest)?)?;

    zip.start_file(DATABASE_ENTRY, options)?;
    io::copy(&mut File::open(snapshot)?, &mut zip)?;

    zip.add_directory(STORAGE_PREFIX, options)?;
    for relative in files {
        zip.start_file(format!("{STORAGE_PREFIX}{relative}"), options)?;
        io::copy(&mut File::open(storage_root.join(relative))?, &mut zip)?;
    }
    zip.finish()?;
    Ok(())
}

/// Every regular file under `root`, as sorted `/`-separated relative paths.
fn collect_storage_files(root: &Path) -> Result<Vec<String>> {
    fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                walk(base, &path, out)?;
            } else if file_type.is_file() {
                if let Ok(relative) = path.strip_prefix(base) {
                    out.push(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    if root.is_dir() {
        walk(root, root, &mut files)?;
    }
    files.sort();
    Ok(files)
}

/// Reads the manifest of a backup archive without extracting anything.
pub fn read_manifest(archive_path: &Path) -> Result<BackupManifest> {
    let mut archive = open_archive(archive_path)?;
    manifest_of(&mut archive)
}

/// Replaces the database at `db_path` and its storage tree with the
/// contents of a backup archive.
///
/// The archive is extracted and checked in a temporary directory beside
/// `db_path` before anything is replaced. If moving the restored files into
/// place fails, the previous database and storage tree are put back.
///
/// The database at `db_path` must not be open while this runs; close it
/// first with [`Database::close`] and reopen it afterwards.
///
/// # Errors
///
/// Returns [`RecordbaseError::Restore`] if the archive cannot be read, lacks
/// its manifest, storage tree or database entry, contains unsafe paths, or
/// holds a database that does not open as a Recordbase database.
pub fn restore(archive_path: &Path, db_path: &Path) -> Result<()> {
    let mut archive = open_archive(archive_path)?;
    let manifest = manifest_of(&mut archive)?;
    if manifest.format_version > BACKUP_FORMAT_VERSION {
        return Err(RecordbaseError::Restore(format!(
            "backup format {} is newer than supported ({BACKUP_FORMAT_VERSION})",
            manifest.format_version
        )));
    }
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    if !names.iter().any(|n| n == DATABASE_ENTRY) {
        return Err(RecordbaseError::Restore("archive has no database".to_string()));
    }
    if !names.iter().any(|n| n.starts_with(STORAGE_PREFIX)) {
        return Err(RecordbaseError::Restore("archive has no storage tree".to_string()));
    }

    let dir = match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;
    let staging = tempfile::Builder::new().prefix(".recordbase-restore").tempdir_in(&dir)?;
    let staged_db = staging.path().join(DATABASE_ENTRY);
    let staged_storage = staging.path().join("storage");
    fs::create_dir_all(&staged_storage)?;

    extract(&mut archive, &staged_db, &staged_storage)?;
    Storage::open(&staged_db)
        .and_then(Storage::close)
        .map_err(|e| RecordbaseError::Restore(format!("archived database is not usable: {e}")))?;

    let storage_root = FileStore::root_for(db_path);
    swap_into_place(
        &[(staged_db.as_path(), db_path), (staged_storage.as_path(), storage_root.as_path())],
        staging.path(),
    )?;

    log::info!(
        "restored '{}' from '{}' (backup {} taken {})",
        db_path.display(),
        archive_path.display(),
        manifest.backup_id,
        manifest.created_at
    );
    Ok(())
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path)
        .map_err(|e| RecordbaseError::Restore(format!("cannot open '{}': {e}", path.display())))?;
    ZipArchive::new(file)
        .map_err(|e| RecordbaseError::Restore(format!("'{}' is not a backup archive: {e}", path.display())))
}

fn manifest_of<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<BackupManifest> {
    let entry = archive
        .by_name(MANIFEST_ENTRY)
        .map_err(|_| RecordbaseError::Restore("archive has no manifest".to_string()))?;
    serde_json::from_reader(entry)
        .map_err(|e| RecordbaseError::Restore(format!("manifest is unreadable: {e}")))
}

fn extract<R: Read + Seek>(archive: &mut ZipArchive<R>, db_target: &Path, storage_target: &Path) -> Result<()> {
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| RecordbaseError::Restore(format!("corrupt archive entry: {e}")))?;
        let name = entry.name().to_string();
        if name == MANIFEST_ENTRY {
            continue;
        }
        if name == DATABASE_ENTRY {
            io::copy(&mut entry, &mut File::create(db_target)?)?;
            continue;
        }
        let Some(relative) = name.strip_prefix(STORAGE_PREFIX) else {
            log::warn!("ignoring unexpected backup entry '{name}'");
            continue;
        };
        let relative = relative.trim_end_matches('/');
        if relative.is_empty() {
            continue;
        }
        check_entry_path(relative)?;
        let target = storage_target.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            io::copy(&mut entry, &mut File::create(&target)?)?;
        }
    }
    Ok(())
}

/// Rejects entry paths that could land outside the storage tree.
fn check_entry_path(relative: &str) -> Result<()> {
    let unsafe_path = || RecordbaseError::Restore(format!("unsafe path in archive: '{relative}'"));
    if relative.contains('\\') || Path::new(relative).is_absolute() {
        return Err(unsafe_path());
    }
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path());
            }
        }
    }
    Ok(())
}

/// Moves each `(source, target)` pair into place, parking existing targets
/// in `holding`. On failure every move made so far is undone.
fn swap_into_place(moves: &[(&Path, &Path)], holding: &Path) -> Result<()> {
    let mut parked: Vec<(PathBuf, &Path)> = Vec::new();
    let mut placed: Vec<&Path> = Vec::new();

    let outcome = (|| -> io::Result<()> {
        for (index, (_, target)) in moves.iter().enumerate() {
            if target.exists() {
                let park = holding.join(format!("previous_{index}"));
                fs::rename(target, &park)?;
                parked.push((park, *target));
            }
        }
        for (source, target) in moves {
            fs::rename(source, target)?;
            placed.push(*target);
        }
        Ok(())
    })();

    if let Err(e) = outcome {
        for target in placed {
            let removed = if target.is_dir() { fs::remove_dir_all(target) } else { fs::remove_file(target) };
            if let Err(cleanup) = removed {
                log::warn!("could not remove partially restored '{}': {cleanup}", target.display());
            }
        }
        for (park, target) in parked {
            if let Err(undo) = fs::rename(&park, target) {
                log::warn!("could not put back '{}': {undo}", target.display());
            }
        }
        return Err(RecordbaseError::Restore(format!("could not move restored files into place: {e}")));
    }
    Ok(())
}
