//! Internal domain modules for the Recordbase core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod backup;
pub mod catalog;
pub mod config;
pub mod database;
pub mod delete;
pub mod error;
pub mod export;
pub mod field;
pub mod files;
pub mod query;
pub mod record;
pub mod records;
pub mod storage;
pub mod value;

#[doc(inline)]
pub use backup::{backup, read_manifest, restore, BackupDescriptor, BackupManifest};
#[doc(inline)]
pub use catalog::{infer_field_type, sanitize_field_name};
#[doc(inline)]
pub use config::{AppConfig, MAX_RECENT_DATABASES};
#[doc(inline)]
pub use database::Database;
#[doc(inline)]
pub use delete::{DeleteResult, DeletedRecord};
#[doc(inline)]
pub use error::{RecordbaseError, Result, ValidationErrors};
#[doc(inline)]
pub use export::{export_table, import_table, ExportFormat, ImportOptions, ImportReport, APP_VERSION};
#[doc(inline)]
pub use field::{DeletePolicy, FieldDefinition, FieldType, NewField, TableDefinition};
#[doc(inline)]
pub use files::FileStore;
#[doc(inline)]
pub use query::{Filter, PageRequest, RecordPage, RecordQuery, Sort, DEFAULT_PAGE_SIZE};
#[doc(inline)]
pub use record::Record;
#[doc(inline)]
pub use storage::Storage;
#[doc(inline)]
pub use value::{fold_text, FieldValue, LIST_SEPARATOR};
