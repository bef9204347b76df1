//! Error types for the Recordbase core library.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Per-field constraint violations collected while validating a record.
///
/// Keys are field internal names; values are short human-readable reasons
/// (`"is required"`, `"must be unique"`, `"is not a valid email address"`, …).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a violation for `field`. The first reason recorded for a field wins.
    pub fn add(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.errors.entry(field.into()).or_insert_with(|| reason.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns the reason recorded for `field`, if any.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Converts into `Err(RecordbaseError::Validation)` when any violation was recorded.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(RecordbaseError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, reason)| format!("{field} {reason}"))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// All errors that can occur within the Recordbase core library.
#[derive(Debug, Error)]
pub enum RecordbaseError {
    /// A SQLite operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A table or field definition is invalid, duplicated, or references a missing table.
    #[error("Schema error: {0}")]
    Schema(String),

    /// One or more field values violate their field's constraints.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// A table name was requested that is not in the catalog.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// A record id was requested that does not exist in its table.
    #[error("Record not found: {table} #{id}")]
    RecordNotFound { table: String, id: i64 },

    /// Incoming data does not line up with the table's fields.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A query used an invalid page, page size, or field.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The opened file is not a valid Recordbase database.
    #[error("Invalid database: {0}")]
    InvalidDatabase(String),

    /// A filesystem operation on the storage tree failed.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// A backup archive could not be restored.
    #[error("Restore failed: {0}")]
    Restore(String),

    /// Stored or imported JSON could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A CSV document could not be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A backup archive could not be read or written.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// Convenience alias that pins the error type to [`RecordbaseError`].
pub type Result<T> = std::result::Result<T, RecordbaseError>;

impl RecordbaseError {
    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Database(e) => format!("Failed to save: {e}"),
            Self::Schema(msg) => msg.clone(),
            Self::Validation(errors) => {
                let lines: Vec<String> = errors
                    .iter()
                    .map(|(field, reason)| format!("'{field}' {reason}"))
                    .collect();
                lines.join("\n")
            }
            Self::TableNotFound(name) => format!("Unknown table: {name}"),
            Self::RecordNotFound { .. } => "Record no longer exists".to_string(),
            Self::SchemaMismatch(msg) => format!("The data does not match the table: {msg}"),
            Self::InvalidQuery(msg) => msg.clone(),
            Self::InvalidDatabase(_) => "Could not open database file".to_string(),
            Self::Storage(e) => format!("File error: {e}"),
            Self::Restore(msg) => format!("Could not restore backup: {msg}"),
            Self::Json(e) => format!("Data format error: {e}"),
            Self::Csv(e) => format!("CSV error: {e}"),
            Self::Archive(e) => format!("Backup archive error: {e}"),
        }
    }
}
