//! Core library for Recordbase, a local-first store for user-defined tables.
//!
//! The primary entry point is [`Database`], which represents an open SQLite
//! database file together with its file-storage tree. Tables, fields and
//! records are managed through `Database` methods; import/export and
//! backup/restore are free functions that take a `Database` (or, for
//! restore, paths).
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    backup::{backup, backup_file_name, read_manifest, restore, BackupDescriptor, BackupManifest, BACKUP_FORMAT_VERSION},
    catalog::{infer_field_type, sanitize_field_name},
    config::{config_file_path, AppConfig, MAX_RECENT_DATABASES},
    database::Database,
    delete::{DeleteResult, DeletedRecord},
    error::{RecordbaseError, Result, ValidationErrors},
    export::{
        export_table, export_template, import_table, ExportFormat, ImportOptions, ImportReport,
        ImportRowError, APP_VERSION,
    },
    field::{parse_bool, DeletePolicy, FieldDefinition, FieldType, NewField, TableDefinition},
    files::FileStore,
    query::{Filter, PageRequest, RecordPage, RecordQuery, Sort, DEFAULT_PAGE_SIZE, PAGE_SIZE_PRESETS},
    record::Record,
    records::missing_reference_label,
    storage::Storage,
    value::{fold_text, FieldValue, LIST_SEPARATOR},
};
