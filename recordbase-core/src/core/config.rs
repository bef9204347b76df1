//! Persisted list of recently opened databases.
//!
//! Stored as JSON at an OS-appropriate location, see [`config_file_path`].

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum number of entries kept in [`AppConfig::recent_databases`].
pub const MAX_RECENT_DATABASES: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Most recently opened first.
    #[serde(default)]
    pub recent_databases: Vec<PathBuf>,

    #[serde(default)]
    pub last_database: Option<PathBuf>,
}

/// Returns the path to the configuration JSON file.
///
/// - Linux: `~/.config/recordbase/config.json`
/// - macOS: `~/Library/Application Support/recordbase/config.json`
/// - Windows: `%APPDATA%/recordbase/config.json`
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("recordbase")
        .join("config.json")
}

impl AppConfig {
    /// Loads the configuration; returns defaults if the file is missing or corrupt.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("ignoring unreadable config '{}': {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Saves the configuration, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Moves `db_path` to the front of the recent list and makes it the last
    /// opened database. The list keeps at most [`MAX_RECENT_DATABASES`] entries.
    pub fn add_recent_database(&mut self, db_path: &Path) {
        let path = fs::canonicalize(db_path).unwrap_or_else(|_| db_path.to_path_buf());
        self.recent_databases.retain(|p| *p != path);
        self.recent_databases.insert(0, path.clone());
        self.recent_databases.truncate(MAX_RECENT_DATABASES);
        self.last_database = Some(path);
    }

    /// Recent databases whose files still exist.
    pub fn recent_databases(&self) -> Vec<&Path> {
        self.recent_databases
            .iter()
            .map(PathBuf::as_path)
            .filter(|p| p.is_file())
            .collect()
    }
}
