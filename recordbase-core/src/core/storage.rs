use crate::{fold_text, RecordbaseError, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;

/// Columns added to `_fields` after the first release, with their DDL.
const FIELD_MIGRATIONS: [(&str, &str); 3] = [
    ("show_in_list", "ALTER TABLE _fields ADD COLUMN show_in_list INTEGER NOT NULL DEFAULT 1"),
    ("reference_display_field", "ALTER TABLE _fields ADD COLUMN reference_display_field TEXT"),
    ("on_delete", "ALTER TABLE _fields ADD COLUMN on_delete TEXT NOT NULL DEFAULT 'restrict'"),
];

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self { conn })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RecordbaseError::InvalidDatabase(format!(
                "{} does not exist",
                path.display()
            )));
        }
        let conn = Connection::open(path)?;

        // Validate database structure
        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type='table'
                 AND name IN ('_tables', '_fields')",
                [],
                |row| row.get(0),
            )
            .map_err(|e| RecordbaseError::InvalidDatabase(e.to_string()))?;

        if table_count != 2 {
            return Err(RecordbaseError::InvalidDatabase(
                "Not a valid Recordbase database".to_string(),
            ));
        }

        for (column, ddl) in FIELD_MIGRATIONS {
            let column_exists: bool = conn.query_row(
                "SELECT COUNT(*) FROM pragma_table_info('_fields') WHERE name = ?1",
                [column],
                |row| row.get::<_, i64>(0).map(|count| count > 0),
            )?;
            if !column_exists {
                log::info!("migrating catalog: adding _fields.{column}");
                conn.execute(ddl, [])?;
            }
        }

        Self::configure(&conn)?;
        Ok(Self { conn })
    }

    /// Enables foreign keys and registers the `unicode_fold(text)` SQL function
    /// used by search and text filters.
    fn configure(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.create_scalar_function(
            "unicode_fold",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                Ok(match ctx.get_raw(0) {
                    ValueRef::Null | ValueRef::Blob(_) => None,
                    ValueRef::Text(t) => Some(fold_text(&String::from_utf8_lossy(t))),
                    ValueRef::Integer(i) => Some(i.to_string()),
                    ValueRef::Real(f) => Some(f.to_string()),
                })
            },
        )?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Closes the connection, reporting any error SQLite raises on close.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| RecordbaseError::Database(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn table_names(storage: &Storage) -> Vec<String> {
        storage
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_create_storage() {
        let temp = NamedTempFile::new().unwrap();
        let storage = Storage::create(temp.path()).unwrap();

        let tables = table_names(&storage);
        assert!(tables.contains(&"_tables".to_string()));
        assert!(tables.contains(&"_fields".to_string()));
    }

    #[test]
    fn test_open_existing_storage() {
        let temp = NamedTempFile::new().unwrap();
        Storage::create(temp.path()).unwrap();

        let storage = Storage::open(temp.path()).unwrap();
        assert!(table_names(&storage).contains(&"_fields".to_string()));
    }

    #[test]
    fn test_open_invalid_database() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "not a database").unwrap();

        let result = Storage::open(temp.path());
        assert!(matches!(result, Err(RecordbaseError::InvalidDatabase(_))));
    }

    #[test]
    fn test_open_plain_sqlite_file_is_rejected() {
        let temp = NamedTempFile::new().unwrap();
        {
            let conn = Connection::open(temp.path()).unwrap();
            conn.execute("CREATE TABLE things (id INTEGER PRIMARY KEY)", []).unwrap();
        }
        assert!(matches!(
            Storage::open(temp.path()),
            Err(RecordbaseError::InvalidDatabase(_))
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Storage::open(dir.path().join("nope.db"));
        assert!(matches!(result, Err(RecordbaseError::InvalidDatabase(_))));
        assert!(!dir.path().join("nope.db").exists());
    }

    #[test]
    fn test_migration_adds_missing_field_columns() {
        let temp = NamedTempFile::new().unwrap();
        {
            let conn = Connection::open(temp.path()).unwrap();
            conn.execute_batch(
                "CREATE TABLE _tables (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    display_name TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE TABLE _fields (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    table_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    display_name TEXT NOT NULL,
                    field_type TEXT NOT NULL,
                    is_required INTEGER NOT NULL DEFAULT 0,
                    is_unique INTEGER NOT NULL DEFAULT 0,
                    options TEXT,
                    reference_table_id INTEGER,
                    position INTEGER NOT NULL DEFAULT 0
                );",
            )
            .unwrap();
        }

        let storage = Storage::open(temp.path()).unwrap();

        for column in ["show_in_list", "reference_display_field", "on_delete"] {
            let exists: bool = storage
                .connection()
                .query_row(
                    "SELECT COUNT(*) FROM pragma_table_info('_fields') WHERE name = ?1",
                    [column],
                    |row| row.get::<_, i64>(0).map(|count| count > 0),
                )
                .unwrap();
            assert!(exists, "{column} column should exist after migration");
        }
    }

    #[test]
    fn test_unicode_fold_function() {
        let temp = NamedTempFile::new().unwrap();
        let storage = Storage::create(temp.path()).unwrap();
        let folded: String = storage
            .connection()
            .query_row("SELECT unicode_fold('ΦΩΤΟ')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(folded, "φωτο");
        let null: Option<String> = storage
            .connection()
            .query_row("SELECT unicode_fold(NULL)", [], |row| row.get(0))
            .unwrap();
        assert!(null.is_none());
    }
}
