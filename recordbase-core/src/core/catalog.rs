//! Schema catalog: table and field definitions and the DDL that follows them.
//!
//! The `_tables` and `_fields` rows are the single source of truth. Every
//! catalog change updates the metadata and the physical table inside one
//! transaction.

use crate::core::field::is_identifier;
use crate::{
    Database, FieldDefinition, FieldType, NewField, RecordbaseError, Result, TableDefinition,
};
use rusqlite::{params, OptionalExtension, Transaction};
use std::collections::HashSet;

/// Double-quotes an identifier for use in generated SQL.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

type FieldRow = (
    i64,
    i64,
    String,
    String,
    String,
    bool,
    bool,
    bool,
    Option<String>,
    Option<i64>,
    Option<String>,
    String,
    i64,
);

const FIELD_COLUMNS: &str = "id, table_id, name, display_name, field_type, is_required, is_unique,
     show_in_list, options, reference_table_id, reference_display_field, on_delete, position";

fn map_field_row(row: &rusqlite::Row) -> rusqlite::Result<FieldRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
    ))
}

fn field_from_row(
    (
        id,
        table_id,
        name,
        display_name,
        field_type,
        required,
        unique,
        show_in_list,
        options_json,
        reference_table_id,
        reference_display_field,
        on_delete,
        position,
    ): FieldRow,
) -> Result<FieldDefinition> {
    let options = match options_json.as_deref() {
        None | Some("") => Vec::new(),
        Some(json) => serde_json::from_str(json)?,
    };
    Ok(FieldDefinition {
        id,
        table_id,
        name,
        display_name,
        field_type: field_type.parse()?,
        required,
        unique,
        show_in_list,
        options,
        reference_table_id,
        reference_display_field,
        on_delete: on_delete.parse()?,
        position,
    })
}

fn load_fields(conn: &rusqlite::Connection, table_id: i64) -> Result<Vec<FieldDefinition>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FIELD_COLUMNS} FROM _fields WHERE table_id = ?1 ORDER BY position, id"
    ))?;
    let rows = stmt
        .query_map([table_id], map_field_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(field_from_row).collect()
}

/// Converts a free-form column heading into a usable field name.
///
/// `"E-mail Address"` becomes `"e_mail_address"`; names that would start with
/// a digit get a `field_` prefix, and an empty result becomes `"field"`.
pub fn sanitize_field_name(display_name: &str) -> String {
    let mut name = String::with_capacity(display_name.len());
    let mut pending_underscore = false;
    for c in display_name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_underscore && !name.is_empty() {
                name.push('_');
            }
            pending_underscore = false;
            name.push(c);
        } else {
            pending_underscore = true;
        }
    }
    let name = name.trim_matches('_').to_string();
    let mut name = match name.chars().next() {
        None => "field".to_string(),
        Some(c) if c.is_ascii_digit() => format!("field_{name}"),
        Some(_) => name,
    };
    name.truncate(64);
    if crate::core::field::RESERVED_COLUMNS.contains(&name.as_str()) {
        name = format!("{name}_value");
    }
    name
}

/// Guesses a field type from one sample value of an imported column.
pub fn infer_field_type(sample: &str) -> FieldType {
    let sample = sample.trim();
    if sample.is_empty() {
        return FieldType::Text;
    }
    if sample.parse::<f64>().is_ok() {
        return FieldType::Number;
    }
    if matches!(
        sample.to_lowercase().as_str(),
        "true" | "false" | "yes" | "no"
    ) {
        return FieldType::Boolean;
    }
    if chrono::NaiveDate::parse_from_str(sample, "%Y-%m-%d").is_ok() {
        return FieldType::Date;
    }
    if let Some((_, domain)) = sample.rsplit_once('@') {
        if domain.contains('.') && !sample.contains(char::is_whitespace) {
            return FieldType::Email;
        }
    }
    if ["http://", "https://", "www."].iter().any(|p| sample.starts_with(p)) {
        return FieldType::Url;
    }
    FieldType::Text
}

impl Database {
    /// Creates a table with the given fields and returns its definition.
    ///
    /// The metadata rows and the physical table are created in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbaseError::Schema`] if the name is taken or unusable,
    /// if two fields share a name, if a field definition is invalid, or if a
    /// reference field targets a table that does not exist.
    pub fn create_table(
        &mut self,
        name: &str,
        display_name: &str,
        fields: Vec<NewField>,
    ) -> Result<TableDefinition> {
        check_table_name(name)?;
        if self.table_id(name)?.is_some() || self.physical_table_exists(name)? {
            return Err(RecordbaseError::Schema(format!("Table '{name}' already exists")));
        }
        self.check_new_fields(&fields)?;

        let display_name = non_empty_or(display_name, name);
        let now = chrono::Utc::now().timestamp();

        let tx = self.connection_mut().transaction()?;
        tx.execute(
            "INSERT INTO _tables (name, display_name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![name, display_name, now],
        )?;
        let table_id = tx.last_insert_rowid();

        let mut columns = vec![
            "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
            "\"created_at\" INTEGER NOT NULL".to_string(),
            "\"updated_at\" INTEGER NOT NULL".to_string(),
        ];
        for (position, field) in fields.iter().enumerate() {
            insert_field_row(&tx, table_id, field, position as i64)?;
            columns.push(column_ddl(field));
        }
        let ddl = format!("CREATE TABLE {} ({})", quote_ident(name), columns.join(", "));
        log::debug!("{ddl}");
        tx.execute(&ddl, [])?;
        tx.commit()?;

        log::info!("created table '{name}' with {} field(s)", fields.len());
        self.get_table(name)
    }

    /// Fetches a table definition by internal name.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbaseError::TableNotFound`] if no such table exists.
    pub fn get_table(&self, name: &str) -> Result<TableDefinition> {
        let row = self
            .connection()
            .query_row(
                "SELECT id, name, display_name, created_at, updated_at FROM _tables WHERE name = ?1",
                [name],
                map_table_row,
            )
            .optional()?
            .ok_or_else(|| RecordbaseError::TableNotFound(name.to_string()))?;
        self.table_from_row(row)
    }

    /// Fetches a table definition by id.
    pub fn get_table_by_id(&self, id: i64) -> Result<TableDefinition> {
        let row = self
            .connection()
            .query_row(
                "SELECT id, name, display_name, created_at, updated_at FROM _tables WHERE id = ?1",
                [id],
                map_table_row,
            )
            .optional()?
            .ok_or_else(|| RecordbaseError::TableNotFound(format!("#{id}")))?;
        self.table_from_row(row)
    }

    /// Returns every table, ordered by internal name.
    pub fn list_tables(&self) -> Result<Vec<TableDefinition>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, name, display_name, created_at, updated_at FROM _tables ORDER BY name",
        )?;
        let rows = stmt
            .query_map([], map_table_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(|row| self.table_from_row(row)).collect()
    }

    /// Replaces a table's field list with `fields`.
    ///
    /// Fields are matched by internal name: matching fields are updated in
    /// place, new names get a new column, and stored fields missing from
    /// `fields` are dropped together with their column. Positions follow the
    /// order of `fields`. A field's type may only change when its SQLite
    /// column type stays the same.
    ///
    /// Required and unique flags are not checked against rows that already
    /// exist; they apply to the next write.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbaseError::TableNotFound`] for an unknown table and
    /// [`RecordbaseError::Schema`] for invalid or incompatible field changes.
    pub fn update_table_fields(
        &mut self,
        name: &str,
        display_name: &str,
        fields: Vec<NewField>,
    ) -> Result<TableDefinition> {
        let table = self.get_table(name)?;
        self.check_new_fields(&fields)?;
        for field in &fields {
            if let Some(existing) = table.field(&field.name) {
                check_type_change(existing, field)?;
            }
        }

        let kept: HashSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        let removed: Vec<&FieldDefinition> = table
            .fields
            .iter()
            .filter(|f| !kept.contains(f.name.as_str()))
            .collect();
        let orphaned_files = self.collect_file_paths(&table, &removed)?;

        let now = chrono::Utc::now().timestamp();
        let tx = self.connection_mut().transaction()?;
        tx.execute(
            "UPDATE _tables SET display_name = ?1, updated_at = ?2 WHERE id = ?3",
            params![non_empty_or(display_name, &table.display_name), now, table.id],
        )?;
        for field in &removed {
            drop_column(&tx, &table.name, field)?;
        }
        for (position, field) in fields.iter().enumerate() {
            match table.field(&field.name) {
                Some(existing) => update_field_row(&tx, existing.id, field, position as i64)?,
                None => add_column(&tx, &table, field, position as i64)?,
            }
        }
        tx.commit()?;

        self.delete_orphaned_files(&orphaned_files);
        log::info!(
            "updated table '{name}': {} field(s), {} removed",
            fields.len(),
            removed.len()
        );
        self.get_table(name)
    }

    /// Appends one field to a table.
    pub fn add_field(&mut self, table: &str, field: NewField) -> Result<FieldDefinition> {
        let def = self.get_table(table)?;
        if def.fields.iter().any(|f| f.name.eq_ignore_ascii_case(&field.name)) {
            return Err(RecordbaseError::Schema(format!(
                "Field '{}' already exists in '{table}'",
                field.name
            )));
        }
        self.check_new_fields(std::slice::from_ref(&field))?;
        let position = def.fields.iter().map(|f| f.position + 1).max().unwrap_or(0);

        let tx = self.connection_mut().transaction()?;
        add_column(&tx, &def, &field, position)?;
        touch_table(&tx, def.id)?;
        tx.commit()?;

        self.get_table(table)?
            .field(&field.name)
            .cloned()
            .ok_or_else(|| RecordbaseError::Schema(format!("Field '{}' was not stored", field.name)))
    }

    /// Removes one field and drops its column. Files stored for it are deleted.
    pub fn remove_field(&mut self, table: &str, field: &str) -> Result<()> {
        let def = self.get_table(table)?;
        let target = def
            .field(field)
            .ok_or_else(|| RecordbaseError::SchemaMismatch(format!("'{table}' has no field '{field}'")))?;
        let orphaned_files = self.collect_file_paths(&def, &[target])?;

        let tx = self.connection_mut().transaction()?;
        drop_column(&tx, &def.name, target)?;
        touch_table(&tx, def.id)?;
        tx.commit()?;

        self.delete_orphaned_files(&orphaned_files);
        Ok(())
    }

    /// Sets field positions to the order of `order`, which must name every
    /// field of the table exactly once.
    pub fn reorder_fields(&mut self, table: &str, order: &[&str]) -> Result<()> {
        let def = self.get_table(table)?;
        let mut expected: Vec<&str> = def.field_names();
        let mut given: Vec<&str> = order.to_vec();
        expected.sort_unstable();
        given.sort_unstable();
        if expected != given {
            return Err(RecordbaseError::Schema(format!(
                "Field order for '{table}' must list each field exactly once"
            )));
        }

        let tx = self.connection_mut().transaction()?;
        for (position, name) in order.iter().enumerate() {
            tx.execute(
                "UPDATE _fields SET position = ?1 WHERE table_id = ?2 AND name = ?3",
                params![position as i64, def.id, name],
            )?;
        }
        touch_table(&tx, def.id)?;
        tx.commit()?;
        Ok(())
    }

    /// Changes a table's display name. The internal name is permanent.
    pub fn rename_table(&mut self, table: &str, display_name: &str) -> Result<()> {
        if display_name.trim().is_empty() {
            return Err(RecordbaseError::Schema("Display name cannot be empty".to_string()));
        }
        let now = chrono::Utc::now().timestamp();
        let changed = self.connection().execute(
            "UPDATE _tables SET display_name = ?1, updated_at = ?2 WHERE name = ?3",
            params![display_name, now, table],
        )?;
        if changed == 0 {
            return Err(RecordbaseError::TableNotFound(table.to_string()));
        }
        Ok(())
    }

    /// Deletes a table, its field definitions, all of its records and its
    /// storage subtree. This cannot be undone.
    ///
    /// Reference fields in other tables that pointed at this table are left
    /// in place; their values become dangling.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbaseError::TableNotFound`] for an unknown table.
    /// Failing to delete the storage subtree is logged, not returned.
    pub fn delete_table(&mut self, name: &str) -> Result<()> {
        let table = self.get_table(name)?;

        let tx = self.connection_mut().transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(&table.name)), [])?;
        tx.execute("DELETE FROM _fields WHERE table_id = ?1", [table.id])?;
        tx.execute("DELETE FROM _tables WHERE id = ?1", [table.id])?;
        tx.commit()?;

        if let Err(e) = self.files().delete_table_files(&table.name) {
            log::warn!("could not delete storage for table '{}': {e}", table.name);
        }
        log::info!("deleted table '{name}'");
        Ok(())
    }

    fn table_id(&self, name: &str) -> Result<Option<i64>> {
        Ok(self
            .connection()
            .query_row(
                "SELECT id FROM _tables WHERE name = ?1 COLLATE NOCASE",
                [name],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn physical_table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self.connection().query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn table_from_row(&self, (id, name, display_name, created_at, updated_at): TableRow) -> Result<TableDefinition> {
        Ok(TableDefinition {
            id,
            name,
            display_name,
            created_at,
            updated_at,
            fields: load_fields(self.connection(), id)?,
        })
    }

    /// Validates a field list on its own and against the tables it references.
    fn check_new_fields(&self, fields: &[NewField]) -> Result<()> {
        let mut seen = HashSet::new();
        for field in fields {
            field.check()?;
            if !seen.insert(field.name.to_ascii_lowercase()) {
                return Err(RecordbaseError::Schema(format!(
                    "Field name '{}' is used more than once",
                    field.name
                )));
            }
            if let Some(target_id) = field.reference_table_id {
                let target = self.get_table_by_id(target_id).map_err(|_| {
                    RecordbaseError::Schema(format!(
                        "Field '{}' references a table that does not exist (#{target_id})",
                        field.name
                    ))
                })?;
                if let Some(display) = &field.reference_display_field {
                    if target.field(display).is_none() {
                        return Err(RecordbaseError::Schema(format!(
                            "Field '{}' displays '{display}', which '{}' does not have",
                            field.name, target.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Stored relative paths held by the given file fields.
    fn collect_file_paths(&self, table: &TableDefinition, fields: &[&FieldDefinition]) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        for field in fields.iter().filter(|f| f.field_type.is_file()) {
            let column = quote_ident(&field.name);
            let mut stmt = self.connection().prepare(&format!(
                "SELECT {column} FROM {} WHERE {column} IS NOT NULL AND {column} != ''",
                quote_ident(&table.name)
            ))?;
            let found = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            paths.extend(found);
        }
        Ok(paths)
    }

    fn delete_orphaned_files(&self, paths: &[String]) {
        for path in paths {
            if let Err(e) = self.files().delete_file(path) {
                log::warn!("could not delete stored file '{path}': {e}");
            }
        }
    }
}

type TableRow = (i64, String, String, i64, i64);

fn map_table_row(row: &rusqlite::Row) -> rusqlite::Result<TableRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn check_table_name(name: &str) -> Result<()> {
    if !is_identifier(name) {
        return Err(RecordbaseError::Schema(format!(
            "Table name '{name}' may only contain letters, digits and underscores"
        )));
    }
    if name.starts_with('_') || name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(RecordbaseError::Schema(format!("Table name '{name}' is reserved")));
    }
    Ok(())
}

fn check_type_change(existing: &FieldDefinition, field: &NewField) -> Result<()> {
    let (from, to) = (existing.field_type, field.field_type);
    if from != to && !(from.is_plain_text() && to.is_plain_text()) {
        return Err(RecordbaseError::Schema(format!(
            "Field '{}' cannot change from {} to {}",
            field.name, from, to
        )));
    }
    Ok(())
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn column_ddl(field: &NewField) -> String {
    format!("{} {}", quote_ident(&field.name), field.field_type.sql_type())
}

fn options_json(field: &NewField) -> Result<Option<String>> {
    if field.field_type.has_options() {
        Ok(Some(serde_json::to_string(&field.options)?))
    } else {
        Ok(None)
    }
}

fn insert_field_row(tx: &Transaction, table_id: i64, field: &NewField, position: i64) -> Result<()> {
    tx.execute(
        "INSERT INTO _fields (table_id, name, display_name, field_type, is_required, is_unique,
                              show_in_list, options, reference_table_id, reference_display_field,
                              on_delete, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            table_id,
            field.name,
            non_empty_or(&field.display_name, &field.name),
            field.field_type.as_str(),
            field.required,
            field.unique,
            field.show_in_list,
            options_json(field)?,
            field.reference_table_id,
            field.reference_display_field,
            field.on_delete.as_str(),
            position,
        ],
    )?;
    Ok(())
}

fn update_field_row(tx: &Transaction, field_id: i64, field: &NewField, position: i64) -> Result<()> {
    tx.execute(
        "UPDATE _fields SET display_name = ?1, field_type = ?2, is_required = ?3, is_unique = ?4,
                            show_in_list = ?5, options = ?6, reference_table_id = ?7,
                            reference_display_field = ?8, on_delete = ?9, position = ?10
         WHERE id = ?11",
        params![
            non_empty_or(&field.display_name, &field.name),
            field.field_type.as_str(),
            field.required,
            field.unique,
            field.show_in_list,
            options_json(field)?,
            field.reference_table_id,
            field.reference_display_field,
            field.on_delete.as_str(),
            position,
            field_id,
        ],
    )?;
    Ok(())
}

fn add_column(tx: &Transaction, table: &TableDefinition, field: &NewField, position: i64) -> Result<()> {
    insert_field_row(tx, table.id, field, position)?;
    let ddl = format!("ALTER TABLE {} ADD COLUMN {}", quote_ident(&table.name), column_ddl(field));
    log::debug!("{ddl}");
    tx.execute(&ddl, [])?;
    Ok(())
}

fn drop_column(tx: &Transaction, table: &str, field: &FieldDefinition) -> Result<()> {
    let ddl = format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_ident(table),
        quote_ident(&field.name)
    );
    log::debug!("{ddl}");
    tx.execute(&ddl, [])?;
    tx.execute("DELETE FROM _fields WHERE id = ?1", [field.id])?;
    Ok(())
}

fn touch_table(tx: &Transaction, table_id: i64) -> Result<()> {
    tx.execute(
        "UPDATE _tables SET updated_at = ?1 WHERE id = ?2",
        params![chrono::Utc::now().timestamp(), table_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeletePolicy, FieldValue};
    use tempfile::tempdir;

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempdir().unwrap();
        let db = Database::create(dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn customer_fields() -> Vec<NewField> {
        vec![
            NewField::new("name", "Name", FieldType::Text).required(),
            NewField::new("email", "Email", FieldType::Email).unique(),
            NewField::new("tier", "Tier", FieldType::Dropdown).options(["gold", "silver"]),
        ]
    }

    #[test]
    fn test_create_and_get_table() {
        let (_dir, mut db) = open_db();
        let created = db.create_table("customers", "Customers", customer_fields()).unwrap();

        let fetched = db.get_table("customers").unwrap();
        assert_eq!(created, fetched);
        assert_eq!(fetched.field_names(), vec!["name", "email", "tier"]);
        assert_eq!(fetched.fields[2].options, vec!["gold", "silver"]);
        assert!(fetched.fields[0].required);
        assert!(fetched.fields[1].unique);
    }

    #[test]
    fn test_physical_columns_follow_field_types() {
        let (_dir, mut db) = open_db();
        db.create_table(
            "items",
            "Items",
            vec![
                NewField::new("price", "Price", FieldType::Number),
                NewField::new("active", "Active", FieldType::Boolean),
            ],
        )
        .unwrap();

        let mut stmt = db
            .connection()
            .prepare("SELECT name, type FROM pragma_table_info('items') ORDER BY cid")
            .unwrap();
        let columns: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(
            columns,
            vec![
                ("id".to_string(), "INTEGER".to_string()),
                ("created_at".to_string(), "INTEGER".to_string()),
                ("updated_at".to_string(), "INTEGER".to_string()),
                ("price".to_string(), "REAL".to_string()),
                ("active".to_string(), "BOOLEAN".to_string()),
            ]
        );
    }

    #[test]
    fn test_duplicate_table_name_fails() {
        let (_dir, mut db) = open_db();
        db.create_table("customers", "Customers", vec![]).unwrap();
        let result = db.create_table("Customers", "Again", vec![]);
        assert!(matches!(result, Err(RecordbaseError::Schema(_))));
    }

    #[test]
    fn test_reserved_and_invalid_table_names() {
        let (_dir, mut db) = open_db();
        for name in ["_fields", "sqlite_stat1", "my table", "1st", ""] {
            assert!(
                matches!(db.create_table(name, "X", vec![]), Err(RecordbaseError::Schema(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_duplicate_field_names_fail() {
        let (_dir, mut db) = open_db();
        let result = db.create_table(
            "t",
            "T",
            vec![
                NewField::new("name", "Name", FieldType::Text),
                NewField::new("Name", "Name again", FieldType::Text),
            ],
        );
        assert!(matches!(result, Err(RecordbaseError::Schema(_))));
        assert!(matches!(db.get_table("t"), Err(RecordbaseError::TableNotFound(_))));
    }

    #[test]
    fn test_reference_to_missing_table_fails() {
        let (_dir, mut db) = open_db();
        let result = db.create_table(
            "orders",
            "Orders",
            vec![NewField::new("customer", "Customer", FieldType::Reference).references(99)],
        );
        assert!(matches!(result, Err(RecordbaseError::Schema(_))));
    }

    #[test]
    fn test_list_tables_sorted_by_name() {
        let (_dir, mut db) = open_db();
        db.create_table("zebra", "Zebra", vec![]).unwrap();
        db.create_table("apple", "Apple", vec![]).unwrap();
        let names: Vec<String> = db.list_tables().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["apple", "zebra"]);
    }

    #[test]
    fn test_update_table_fields_reconciles() {
        let (_dir, mut db) = open_db();
        db.create_table("customers", "Customers", customer_fields()).unwrap();

        let updated = db
            .update_table_fields(
                "customers",
                "Clients",
                vec![
                    NewField::new("email", "E-mail", FieldType::Email).unique().required(),
                    NewField::new("name", "Full name", FieldType::Text).required(),
                    NewField::new("phone", "Phone", FieldType::Phone),
                ],
            )
            .unwrap();

        assert_eq!(updated.display_name, "Clients");
        assert_eq!(updated.field_names(), vec!["email", "name", "phone"]);
        assert!(updated.field("email").unwrap().required);
        assert!(updated.field("tier").is_none());

        let has_tier: i64 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('customers') WHERE name = 'tier'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(has_tier, 0);
    }

    #[test]
    fn test_type_change_requires_same_column_type() {
        let (_dir, mut db) = open_db();
        db.create_table("t", "T", vec![NewField::new("f", "F", FieldType::Text)]).unwrap();

        // text -> email keeps the TEXT column
        db.update_table_fields("t", "T", vec![NewField::new("f", "F", FieldType::Email)])
            .unwrap();
        let result = db.update_table_fields("t", "T", vec![NewField::new("f", "F", FieldType::Number)]);
        assert!(matches!(result, Err(RecordbaseError::Schema(_))));
    }

    #[test]
    fn test_type_change_rejects_list_encodings() {
        let (_dir, mut db) = open_db();
        let table = db.create_table("t", "T", vec![NewField::new("f", "F", FieldType::Text)]).unwrap();
        let values = [("f".to_string(), FieldValue::text("hello"))].into_iter().collect();
        let id = db.create_record("t", values).unwrap();

        let to_tags = NewField::new("f", "F", FieldType::MultiSelect).options(["hello"]);
        let to_links = NewField::new("f", "F", FieldType::MultiReference).references(table.id);
        for target in [to_tags, to_links] {
            let result = db.update_table_fields("t", "T", vec![target]);
            assert!(matches!(result, Err(RecordbaseError::Schema(_))));
        }
        assert_eq!(db.get_table("t").unwrap().fields[0].field_type, FieldType::Text);
        assert_eq!(db.get_record("t", id).unwrap().get("f"), &FieldValue::text("hello"));

        db.create_table("tags", "Tags", vec![NewField::new("f", "F", FieldType::MultiSelect).options(["a"])])
            .unwrap();
        let result = db.update_table_fields("tags", "Tags", vec![NewField::new("f", "F", FieldType::Text)]);
        assert!(matches!(result, Err(RecordbaseError::Schema(_))));
    }

    #[test]
    fn test_add_remove_and_reorder_fields() {
        let (_dir, mut db) = open_db();
        db.create_table("t", "T", vec![NewField::new("a", "A", FieldType::Text)]).unwrap();

        let added = db.add_field("t", NewField::new("b", "B", FieldType::Number)).unwrap();
        assert_eq!(added.position, 1);
        assert!(db.add_field("t", NewField::new("a", "A", FieldType::Text)).is_err());

        db.reorder_fields("t", &["b", "a"]).unwrap();
        assert_eq!(db.get_table("t").unwrap().field_names(), vec!["b", "a"]);
        assert!(db.reorder_fields("t", &["a"]).is_err());

        db.remove_field("t", "a").unwrap();
        assert_eq!(db.get_table("t").unwrap().field_names(), vec!["b"]);
    }

    #[test]
    fn test_rename_table_changes_display_name_only() {
        let (_dir, mut db) = open_db();
        db.create_table("t", "T", vec![]).unwrap();
        db.rename_table("t", "Things").unwrap();
        assert_eq!(db.get_table("t").unwrap().display_name, "Things");
        assert!(matches!(
            db.rename_table("missing", "X"),
            Err(RecordbaseError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_delete_table_removes_metadata_and_storage() {
        let (_dir, mut db) = open_db();
        db.create_table("docs", "Docs", customer_fields()).unwrap();
        db.files().ensure_dir("docs", 1).unwrap();

        db.delete_table("docs").unwrap();

        assert!(matches!(db.get_table("docs"), Err(RecordbaseError::TableNotFound(_))));
        assert!(!db.files().table_dir("docs").exists());
        let orphan_fields: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM _fields", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphan_fields, 0);
        // The name can be reused afterwards.
        db.create_table("docs", "Docs", vec![]).unwrap();
    }

    #[test]
    fn test_sanitize_field_name() {
        assert_eq!(sanitize_field_name("E-mail Address"), "e_mail_address");
        assert_eq!(sanitize_field_name("  Price (€) "), "price");
        assert_eq!(sanitize_field_name("2024 Sales"), "field_2024_sales");
        assert_eq!(sanitize_field_name("!!!"), "field");
        assert_eq!(sanitize_field_name("ID"), "id_value");
        assert!(is_identifier(&sanitize_field_name("Τηλέφωνο")));
    }

    #[test]
    fn test_infer_field_type() {
        assert_eq!(infer_field_type("42.5"), FieldType::Number);
        assert_eq!(infer_field_type("yes"), FieldType::Boolean);
        assert_eq!(infer_field_type("2024-01-31"), FieldType::Date);
        assert_eq!(infer_field_type("a@b.com"), FieldType::Email);
        assert_eq!(infer_field_type("https://x.org"), FieldType::Url);
        assert_eq!(infer_field_type("hello"), FieldType::Text);
        assert_eq!(infer_field_type(""), FieldType::Text);
    }

    #[test]
    fn test_reference_display_field_must_exist() {
        let (_dir, mut db) = open_db();
        let customers = db.create_table("customers", "Customers", customer_fields()).unwrap();
        let result = db.create_table(
            "orders",
            "Orders",
            vec![NewField::new("customer", "Customer", FieldType::Reference)
                .references(customers.id)
                .display_field("nickname")],
        );
        assert!(matches!(result, Err(RecordbaseError::Schema(_))));
    }

    #[test]
    fn test_delete_policy_is_stored() {
        let (_dir, mut db) = open_db();
        let customers = db.create_table("customers", "Customers", customer_fields()).unwrap();
        let orders = db
            .create_table(
                "orders",
                "Orders",
                vec![NewField::new("customer", "Customer", FieldType::Reference)
                    .references(customers.id)
                    .display_field("name")
                    .on_delete(DeletePolicy::Cascade)],
            )
            .unwrap();
        let field = orders.field("customer").unwrap();
        assert_eq!(field.on_delete, DeletePolicy::Cascade);
        assert_eq!(field.reference_display_field.as_deref(), Some("name"));
        assert_eq!(field.reference_table_id, Some(customers.id));
    }
}
