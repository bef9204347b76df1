//! Record CRUD on user-defined tables, reference display and delete policies.

use crate::core::catalog::quote_ident;
use crate::{
    Database, DeletePolicy, DeleteResult, DeletedRecord, FieldDefinition, FieldType, FieldValue,
    Record, RecordbaseError, Result, TableDefinition, ValidationErrors,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Transaction};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// `SELECT` column list for a table: `id, created_at, updated_at`, then every field.
pub(crate) fn select_columns(table: &TableDefinition) -> String {
    let mut columns = vec![
        "\"id\"".to_string(),
        "\"created_at\"".to_string(),
        "\"updated_at\"".to_string(),
    ];
    columns.extend(table.fields.iter().map(|f| quote_ident(&f.name)));
    columns.join(", ")
}

/// Reads a row selected with [`select_columns`] into a [`Record`].
pub(crate) fn record_from_row(table: &TableDefinition, row: &rusqlite::Row) -> Result<Record> {
    let mut values = HashMap::with_capacity(table.fields.len());
    for (i, field) in table.fields.iter().enumerate() {
        let value = field.field_type.from_sql(row.get_ref(i + 3)?)?;
        values.insert(field.name.clone(), value);
    }
    Ok(Record {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        values,
    })
}

/// Placeholder shown for a reference whose target record no longer exists.
pub fn missing_reference_label(id: i64) -> String {
    format!("#{id} (missing)")
}

impl Database {
    /// Validates `values` and inserts them as a new record of `table`.
    ///
    /// Fields not present in `values` are stored as `Null`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbaseError::Validation`] naming every offending field
    /// (unknown field, missing required value, duplicate unique value, or a
    /// value that does not fit the field type). Nothing is written in that
    /// case.
    pub fn create_record(&mut self, table: &str, values: HashMap<String, FieldValue>) -> Result<i64> {
        let def = self.get_table(table)?;
        self.insert_record(&def, values)
    }

    /// Validates and inserts one record of `def` on the shared connection.
    ///
    /// Runs inside whatever transaction the caller has open on the connection.
    pub(crate) fn insert_record(
        &self,
        def: &TableDefinition,
        values: HashMap<String, FieldValue>,
    ) -> Result<i64> {
        let values = self.validate_values(def, values, None)?;
        let now = chrono::Utc::now().timestamp();

        let mut columns = vec!["\"created_at\"".to_string(), "\"updated_at\"".to_string()];
        let mut params: Vec<Value> = vec![Value::Integer(now), Value::Integer(now)];
        for field in &def.fields {
            columns.push(quote_ident(&field.name));
            params.push(field.field_type.to_sql(&values[&field.name])?);
        }
        let placeholders = vec!["?"; params.len()].join(", ");

        self.connection().execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({placeholders})",
                quote_ident(&def.name),
                columns.join(", ")
            ),
            params_from_iter(params),
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    /// Overlays `values` on the stored record and writes the result back.
    ///
    /// Fields missing from `values` keep their stored value. The merged
    /// record is validated like a new one, except that it does not clash with
    /// itself on unique fields. Files whose stored path is replaced or cleared
    /// are deleted.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbaseError::RecordNotFound`] if `id` does not exist and
    /// [`RecordbaseError::Validation`] if the merged record is invalid.
    pub fn update_record(
        &mut self,
        table: &str,
        id: i64,
        values: HashMap<String, FieldValue>,
    ) -> Result<Record> {
        let def = self.get_table(table)?;
        let current = self.get_record(table, id)?;

        let mut merged = current.values.clone();
        merged.extend(values);
        let merged = self.validate_values(&def, merged, Some(id))?;

        let now = chrono::Utc::now().timestamp();
        let mut assignments = vec!["\"updated_at\" = ?".to_string()];
        let mut params: Vec<Value> = vec![Value::Integer(now)];
        for field in &def.fields {
            assignments.push(format!("{} = ?", quote_ident(&field.name)));
            params.push(field.field_type.to_sql(&merged[&field.name])?);
        }
        params.push(Value::Integer(id));

        self.connection().execute(
            &format!(
                "UPDATE {} SET {} WHERE \"id\" = ?",
                quote_ident(&def.name),
                assignments.join(", ")
            ),
            params_from_iter(params),
        )?;

        for field in def.fields.iter().filter(|f| f.field_type.is_file()) {
            if let Some(old) = current.get(&field.name).as_text() {
                if merged[&field.name].as_text() != Some(old) {
                    self.remove_stored_file(old);
                }
            }
        }
        self.get_record(table, id)
    }

    /// Fetches one record.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbaseError::RecordNotFound`] if `id` does not exist, or
    /// [`RecordbaseError::Json`] if a list column holds corrupt JSON.
    pub fn get_record(&self, table: &str, id: i64) -> Result<Record> {
        let def = self.get_table(table)?;
        self.fetch_record(&def, id)?
            .ok_or_else(|| RecordbaseError::RecordNotFound { table: table.to_string(), id })
    }

    pub fn count_records(&self, table: &str) -> Result<i64> {
        let def = self.get_table(table)?;
        Ok(self.connection().query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(&def.name)),
            [],
            |row| row.get(0),
        )?)
    }

    /// Deletes a record and applies the delete policies of every field that
    /// references its table.
    ///
    /// `cascade` fields delete their referencing records too, recursively;
    /// `set-null` fields clear the reference; `restrict` fields are left
    /// dangling. All row changes happen in one transaction. Afterwards the
    /// storage subtree of every deleted record is removed; failures there are
    /// logged and do not fail the call.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbaseError::RecordNotFound`] if `id` does not exist.
    pub fn delete_record(&mut self, table: &str, id: i64) -> Result<DeleteResult> {
        let def = self.get_table(table)?;
        if self.fetch_record(&def, id)?.is_none() {
            return Err(RecordbaseError::RecordNotFound { table: table.to_string(), id });
        }
        let graph = ReferenceGraph::load(self)?;

        let mut result = DeleteResult::default();
        let tx = self.connection_mut().transaction()?;
        let mut visited = HashSet::new();
        graph.delete_in_tx(&tx, def.id, id, &mut visited, &mut result)?;
        tx.commit()?;

        for deleted in &result.deleted {
            if let Err(e) = self.files().delete_record_files(&deleted.table, deleted.id) {
                log::warn!(
                    "could not delete storage for {} #{}: {e}",
                    deleted.table,
                    deleted.id
                );
            }
        }
        if result.deleted_count() > 1 || result.cleared_references > 0 {
            log::info!(
                "deleted {table} #{id}: {} record(s) removed, {} reference(s) cleared",
                result.deleted_count(),
                result.cleared_references
            );
        }
        Ok(result)
    }

    /// Copies `source` into the record's storage directory and stores the
    /// relative path in `field`. A previously stored file is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbaseError::SchemaMismatch`] if `field` is not an image
    /// or file field, and [`RecordbaseError::Storage`] if the copy fails.
    pub fn attach_file(&mut self, table: &str, id: i64, field: &str, source: &Path) -> Result<String> {
        let def = self.get_table(table)?;
        let field_def = file_field(&def, field)?;
        let current = self.get_record(table, id)?;

        let relative = self.files().store_file(&def.name, id, &field_def.name, source)?;
        self.write_file_column(&def, id, field_def, Some(&relative))?;

        if let Some(old) = current.get(field).as_text() {
            if old != relative {
                self.remove_stored_file(old);
            }
        }
        Ok(relative)
    }

    /// Clears a file field and deletes the file it pointed at.
    pub fn clear_file(&mut self, table: &str, id: i64, field: &str) -> Result<()> {
        let def = self.get_table(table)?;
        let field_def = file_field(&def, field)?;
        let current = self.get_record(table, id)?;

        self.write_file_column(&def, id, field_def, None)?;
        if let Some(old) = current.get(field).as_text() {
            self.remove_stored_file(old);
        }
        Ok(())
    }

    /// Human-readable label for the record(s) a reference value points at.
    ///
    /// The label comes from the field's display field when one is set,
    /// otherwise from the first non-empty text, email, phone or url field,
    /// otherwise from any non-empty field, otherwise `ID: n`. Ids whose record
    /// (or table) no longer exists are shown as `#n (missing)`.
    pub fn resolve_reference_display(&self, field: &FieldDefinition, value: &FieldValue) -> Result<String> {
        let ids: Vec<i64> = match value {
            FieldValue::Reference(id) => vec![*id],
            FieldValue::References(ids) => ids.clone(),
            FieldValue::Null => return Ok(String::new()),
            other => return Ok(field.field_type.display(other)),
        };
        let target = match field.reference_table_id.map(|id| self.get_table_by_id(id)) {
            Some(Ok(target)) => target,
            Some(Err(RecordbaseError::TableNotFound(_))) | None => {
                return Ok(ids.into_iter().map(missing_reference_label).collect::<Vec<_>>().join(", "));
            }
            Some(Err(e)) => return Err(e),
        };

        let mut labels = Vec::with_capacity(ids.len());
        for id in ids {
            let label = match self.fetch_record(&target, id)? {
                Some(record) => record_label(&target, field.reference_display_field.as_deref(), &record),
                None => missing_reference_label(id),
            };
            labels.push(label);
        }
        Ok(labels.join(", "))
    }

    /// Formats a stored value for display, resolving references to labels.
    pub fn display_value(&self, field: &FieldDefinition, value: &FieldValue) -> Result<String> {
        if field.field_type.is_reference() {
            self.resolve_reference_display(field, value)
        } else {
            Ok(field.field_type.display(value))
        }
    }

    pub(crate) fn fetch_record(&self, table: &TableDefinition, id: i64) -> Result<Option<Record>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM {} WHERE \"id\" = ?1",
            select_columns(table),
            quote_ident(&table.name)
        ))?;
        let mut rows = stmt.query([id])?;
        let record = match rows.next()? {
            Some(row) => Some(record_from_row(table, row)?),
            None => None,
        };
        Ok(record)
    }

    /// Checks `values` against the table and returns one canonical value per field.
    ///
    /// `exclude_id` is the record being updated, which may keep its own
    /// unique values.
    pub(crate) fn validate_values(
        &self,
        table: &TableDefinition,
        mut values: HashMap<String, FieldValue>,
        exclude_id: Option<i64>,
    ) -> Result<HashMap<String, FieldValue>> {
        let mut errors = ValidationErrors::new();
        for name in values.keys() {
            if table.field(name).is_none() {
                errors.add(name.clone(), "is not a field of this table");
            }
        }

        let mut canonical = HashMap::with_capacity(table.fields.len());
        for field in &table.fields {
            let raw = values.remove(&field.name).unwrap_or(FieldValue::Null);
            let value = match field.check_value(raw) {
                Ok(value) => value,
                Err(reason) => {
                    errors.add(field.name.clone(), reason);
                    continue;
                }
            };
            if value.is_empty() {
                if field.required {
                    errors.add(field.name.clone(), "is required");
                }
            } else if field.unique && self.value_taken(table, field, &value, exclude_id)? {
                errors.add(field.name.clone(), "must be unique");
            }
            canonical.insert(field.name.clone(), value);
        }

        errors.into_result()?;
        Ok(canonical)
    }

    fn value_taken(
        &self,
        table: &TableDefinition,
        field: &FieldDefinition,
        value: &FieldValue,
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        let count: i64 = self.connection().query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {} = ?1 AND \"id\" != ?2",
                quote_ident(&table.name),
                quote_ident(&field.name)
            ),
            params![field.field_type.to_sql(value)?, exclude_id.unwrap_or(0)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub(crate) fn write_file_column(
        &self,
        table: &TableDefinition,
        id: i64,
        field: &FieldDefinition,
        relative: Option<&str>,
    ) -> Result<()> {
        let changed = self.connection().execute(
            &format!(
                "UPDATE {} SET {} = ?1, \"updated_at\" = ?2 WHERE \"id\" = ?3",
                quote_ident(&table.name),
                quote_ident(&field.name)
            ),
            params![relative, chrono::Utc::now().timestamp(), id],
        )?;
        if changed == 0 {
            return Err(RecordbaseError::RecordNotFound { table: table.name.clone(), id });
        }
        Ok(())
    }

    fn remove_stored_file(&self, relative: &str) {
        if let Err(e) = self.files().delete_file(relative) {
            log::warn!("could not delete stored file '{relative}': {e}");
        }
    }
}

fn file_field<'a>(table: &'a TableDefinition, field: &str) -> Result<&'a FieldDefinition> {
    match table.field(field) {
        Some(def) if def.field_type.is_file() => Ok(def),
        Some(def) => Err(RecordbaseError::SchemaMismatch(format!(
            "'{}' is a {} field, not a file field",
            def.name, def.field_type
        ))),
        None => Err(RecordbaseError::SchemaMismatch(format!(
            "'{}' has no field '{field}'",
            table.name
        ))),
    }
}

fn record_label(table: &TableDefinition, display_field: Option<&str>, record: &Record) -> String {
    let shown = |field: &FieldDefinition| {
        let value = record.get(&field.name);
        (!value.is_empty()).then(|| field.field_type.display(value))
    };
    display_field
        .and_then(|name| table.field(name))
        .and_then(shown)
        .or_else(|| {
            table
                .fields
                .iter()
                .filter(|f| f.field_type.is_label_candidate())
                .find_map(shown)
        })
        .or_else(|| table.fields.iter().find_map(shown))
        .unwrap_or_else(|| format!("ID: {}", record.id))
}

/// Reference fields of every table, keyed by the table they point at.
struct ReferenceGraph {
    tables: HashMap<i64, TableDefinition>,
    incoming: HashMap<i64, Vec<FieldDefinition>>,
}

impl ReferenceGraph {
    fn load(db: &Database) -> Result<Self> {
        let mut tables = HashMap::new();
        let mut incoming: HashMap<i64, Vec<FieldDefinition>> = HashMap::new();
        for table in db.list_tables()? {
            for field in table.fields.iter().filter(|f| f.field_type.is_reference()) {
                if let Some(target) = field.reference_table_id {
                    incoming.entry(target).or_default().push(field.clone());
                }
            }
            tables.insert(table.id, table);
        }
        Ok(Self { tables, incoming })
    }

    /// Deletes one row and applies the policies pointing at it.
    ///
    /// Must run inside the caller's transaction; `visited` stops reference
    /// cycles from recursing forever.
    fn delete_in_tx(
        &self,
        tx: &Transaction,
        table_id: i64,
        id: i64,
        visited: &mut HashSet<(i64, i64)>,
        result: &mut DeleteResult,
    ) -> Result<()> {
        if !visited.insert((table_id, id)) {
            return Ok(());
        }
        let Some(table) = self.tables.get(&table_id) else {
            return Ok(());
        };
        tx.execute(
            &format!("DELETE FROM {} WHERE \"id\" = ?1", quote_ident(&table.name)),
            [id],
        )?;
        if tx.changes() == 0 {
            return Ok(());
        }
        result.deleted.push(DeletedRecord { table: table.name.clone(), id });

        for field in self.incoming.get(&table_id).into_iter().flatten() {
            let Some(source) = self.tables.get(&field.table_id) else {
                continue;
            };
            match field.on_delete {
                DeletePolicy::Restrict => {}
                DeletePolicy::SetNull => {
                    result.cleared_references += clear_reference(tx, source, field, id)?;
                }
                DeletePolicy::Cascade => {
                    for dependent in referencing_ids(tx, source, field, id)? {
                        self.delete_in_tx(tx, source.id, dependent, visited, result)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Ids of rows in `source` whose `field` points at `target_id`.
fn referencing_ids(tx: &Transaction, source: &TableDefinition, field: &FieldDefinition, target_id: i64) -> Result<Vec<i64>> {
    let column = quote_ident(&field.name);
    let condition = match field.field_type {
        FieldType::MultiReference => format!(
            "EXISTS (SELECT 1 FROM json_each({column}) WHERE json_each.value = ?1)"
        ),
        _ => format!("{column} = ?1"),
    };
    let mut stmt = tx.prepare(&format!(
        "SELECT \"id\" FROM {} WHERE {condition} ORDER BY \"id\"",
        quote_ident(&source.name)
    ))?;
    let ids = stmt
        .query_map([target_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

/// Removes `target_id` from `field` in every row of `source`; returns the rows changed.
fn clear_reference(tx: &Transaction, source: &TableDefinition, field: &FieldDefinition, target_id: i64) -> Result<usize> {
    let now = chrono::Utc::now().timestamp();
    let table = quote_ident(&source.name);
    let column = quote_ident(&field.name);

    if field.field_type != FieldType::MultiReference {
        return Ok(tx.execute(
            &format!("UPDATE {table} SET {column} = NULL, \"updated_at\" = ?1 WHERE {column} = ?2"),
            params![now, target_id],
        )?);
    }

    let mut changed = 0;
    for row_id in referencing_ids(tx, source, field, target_id)? {
        let stored: String = tx.query_row(
            &format!("SELECT {column} FROM {table} WHERE \"id\" = ?1"),
            [row_id],
            |row| row.get(0),
        )?;
        let ids: Vec<i64> = serde_json::from_str(&stored)?;
        let remaining: Vec<i64> = ids.into_iter().filter(|&i| i != target_id).collect();
        let new_value = if remaining.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&remaining)?)
        };
        changed += tx.execute(
            &format!("UPDATE {table} SET {column} = ?1, \"updated_at\" = ?2 WHERE \"id\" = ?3"),
            params![new_value, now, row_id],
        )?;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewField;
    use tempfile::tempdir;

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempdir().unwrap();
        let db = Database::create(dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn values(pairs: &[(&str, FieldValue)]) -> HashMap<String, FieldValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn customers(db: &mut Database) -> TableDefinition {
        db.create_table(
            "customers",
            "Customers",
            vec![
                NewField::new("name", "Name", FieldType::Text).required(),
                NewField::new("email", "Email", FieldType::Email).unique(),
                NewField::new("phone", "Phone", FieldType::Phone),
            ],
        )
        .unwrap()
    }

    fn orders(db: &mut Database, customers_id: i64, policy: DeletePolicy) -> TableDefinition {
        db.create_table(
            "orders",
            "Orders",
            vec![
                NewField::new("title", "Title", FieldType::Text),
                NewField::new("customer", "Customer", FieldType::Reference)
                    .references(customers_id)
                    .on_delete(policy),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_create_and_get_record() {
        let (_dir, mut db) = open_db();
        customers(&mut db);
        let id = db
            .create_record(
                "customers",
                values(&[("name", FieldValue::text("Alice")), ("email", FieldValue::text("a@x.io"))]),
            )
            .unwrap();

        let record = db.get_record("customers", id).unwrap();
        assert_eq!(record.get("name"), &FieldValue::text("Alice"));
        assert_eq!(record.get("email"), &FieldValue::text("a@x.io"));
        assert_eq!(record.get("phone"), &FieldValue::Null);
        assert!(record.created_at > 0);
        assert_eq!(db.count_records("customers").unwrap(), 1);
    }

    #[test]
    fn test_all_value_kinds_survive_storage() {
        let (_dir, mut db) = open_db();
        db.create_table(
            "kinds",
            "Kinds",
            vec![
                NewField::new("price", "Price", FieldType::Number),
                NewField::new("active", "Active", FieldType::Boolean),
                NewField::new("due", "Due", FieldType::Date),
                NewField::new("tags", "Tags", FieldType::MultiSelect).options(["a", "b", "c"]),
                NewField::new("body", "Body", FieldType::RichText),
            ],
        )
        .unwrap();
        let input = values(&[
            ("price", FieldValue::Number(9.5)),
            ("active", FieldValue::Boolean(true)),
            ("due", FieldValue::text("2024-03-01")),
            ("tags", FieldValue::list(["c", "a"])),
            ("body", FieldValue::text("<b>hi</b>")),
        ]);
        let id = db.create_record("kinds", input.clone()).unwrap();
        assert_eq!(db.get_record("kinds", id).unwrap().values, input);
    }

    #[test]
    fn test_required_field_rejected() {
        let (_dir, mut db) = open_db();
        customers(&mut db);
        let result = db.create_record("customers", values(&[("name", FieldValue::text(""))]));
        match result {
            Err(RecordbaseError::Validation(errors)) => {
                assert_eq!(errors.get("name"), Some("is required"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(db.count_records("customers").unwrap(), 0);
    }

    #[test]
    fn test_unique_field_rejected_but_null_allowed_twice() {
        let (_dir, mut db) = open_db();
        customers(&mut db);
        db.create_record("customers", values(&[("name", FieldValue::text("A")), ("email", FieldValue::text("x@y.io"))]))
            .unwrap();
        let dup = db.create_record(
            "customers",
            values(&[("name", FieldValue::text("B")), ("email", FieldValue::text("x@y.io"))]),
        );
        assert!(matches!(dup, Err(RecordbaseError::Validation(ref e)) if e.contains("email")));

        // Uniqueness is case-sensitive.
        db.create_record("customers", values(&[("name", FieldValue::text("C")), ("email", FieldValue::text("X@y.io"))]))
            .unwrap();
        db.create_record("customers", values(&[("name", FieldValue::text("D"))])).unwrap();
        db.create_record("customers", values(&[("name", FieldValue::text("E"))])).unwrap();
    }

    #[test]
    fn test_unknown_field_rejected() {
        let (_dir, mut db) = open_db();
        customers(&mut db);
        let result = db.create_record(
            "customers",
            values(&[("name", FieldValue::text("A")), ("nickname", FieldValue::text("a"))]),
        );
        assert!(matches!(result, Err(RecordbaseError::Validation(ref e)) if e.contains("nickname")));
    }

    #[test]
    fn test_update_record_overlays_values() {
        let (_dir, mut db) = open_db();
        customers(&mut db);
        let id = db
            .create_record(
                "customers",
                values(&[("name", FieldValue::text("Alice")), ("email", FieldValue::text("a@x.io"))]),
            )
            .unwrap();

        let updated = db
            .update_record("customers", id, values(&[("phone", FieldValue::text("555"))]))
            .unwrap();
        assert_eq!(updated.get("name"), &FieldValue::text("Alice"));
        assert_eq!(updated.get("phone"), &FieldValue::text("555"));

        // Keeping its own unique value is fine.
        db.update_record("customers", id, values(&[("email", FieldValue::text("a@x.io"))]))
            .unwrap();
    }

    #[test]
    fn test_update_missing_record() {
        let (_dir, mut db) = open_db();
        customers(&mut db);
        let result = db.update_record("customers", 42, HashMap::new());
        assert!(matches!(result, Err(RecordbaseError::RecordNotFound { id: 42, .. })));
    }

    #[test]
    fn test_delete_restrict_leaves_dangling_reference() {
        let (_dir, mut db) = open_db();
        let c = customers(&mut db);
        let o = orders(&mut db, c.id, DeletePolicy::Restrict);
        let cid = db.create_record("customers", values(&[("name", FieldValue::text("Bob"))])).unwrap();
        let oid = db
            .create_record("orders", values(&[("customer", FieldValue::Reference(cid))]))
            .unwrap();

        let result = db.delete_record("customers", cid).unwrap();
        assert_eq!(result.deleted_count(), 1);

        let order = db.get_record("orders", oid).unwrap();
        assert_eq!(order.get("customer"), &FieldValue::Reference(cid));
        let field = o.field("customer").unwrap();
        assert_eq!(
            db.display_value(field, order.get("customer")).unwrap(),
            missing_reference_label(cid)
        );
    }

    #[test]
    fn test_delete_set_null_clears_references() {
        let (_dir, mut db) = open_db();
        let c = customers(&mut db);
        orders(&mut db, c.id, DeletePolicy::SetNull);
        let cid = db.create_record("customers", values(&[("name", FieldValue::text("Bob"))])).unwrap();
        let oid = db
            .create_record("orders", values(&[("customer", FieldValue::Reference(cid))]))
            .unwrap();

        let result = db.delete_record("customers", cid).unwrap();
        assert_eq!(result.cleared_references, 1);
        assert_eq!(db.get_record("orders", oid).unwrap().get("customer"), &FieldValue::Null);
    }

    #[test]
    fn test_delete_cascade_removes_dependents_and_their_files() {
        let (_dir, mut db) = open_db();
        let c = customers(&mut db);
        orders(&mut db, c.id, DeletePolicy::Cascade);
        let cid = db.create_record("customers", values(&[("name", FieldValue::text("Bob"))])).unwrap();
        let oid = db
            .create_record("orders", values(&[("customer", FieldValue::Reference(cid))]))
            .unwrap();
        db.files().ensure_dir("orders", oid).unwrap();

        let result = db.delete_record("customers", cid).unwrap();
        assert_eq!(result.deleted_count(), 2);
        assert_eq!(result.deleted[0], DeletedRecord { table: "customers".into(), id: cid });
        assert!(matches!(
            db.get_record("orders", oid),
            Err(RecordbaseError::RecordNotFound { .. })
        ));
        assert!(!db.files().record_dir("orders", oid).exists());
    }

    #[test]
    fn test_multireference_set_null_removes_id_from_list() {
        let (_dir, mut db) = open_db();
        let c = customers(&mut db);
        db.create_table(
            "groups",
            "Groups",
            vec![NewField::new("members", "Members", FieldType::MultiReference)
                .references(c.id)
                .on_delete(DeletePolicy::SetNull)],
        )
        .unwrap();
        let a = db.create_record("customers", values(&[("name", FieldValue::text("A"))])).unwrap();
        let b = db.create_record("customers", values(&[("name", FieldValue::text("B"))])).unwrap();
        let gid = db
            .create_record("groups", values(&[("members", FieldValue::References(vec![a, b]))]))
            .unwrap();

        db.delete_record("customers", a).unwrap();
        assert_eq!(
            db.get_record("groups", gid).unwrap().get("members"),
            &FieldValue::References(vec![b])
        );
        db.delete_record("customers", b).unwrap();
        assert_eq!(db.get_record("groups", gid).unwrap().get("members"), &FieldValue::Null);
    }

    #[test]
    fn test_self_referencing_cascade_terminates() {
        let (_dir, mut db) = open_db();
        let people = db
            .create_table("people", "People", vec![NewField::new("name", "Name", FieldType::Text)])
            .unwrap();
        db.add_field(
            "people",
            NewField::new("partner", "Partner", FieldType::Reference)
                .references(people.id)
                .on_delete(DeletePolicy::Cascade),
        )
        .unwrap();
        let a = db.create_record("people", values(&[("name", FieldValue::text("A"))])).unwrap();
        let b = db
            .create_record("people", values(&[("name", FieldValue::text("B")), ("partner", FieldValue::Reference(a))]))
            .unwrap();
        db.update_record("people", a, values(&[("partner", FieldValue::Reference(b))]))
            .unwrap();

        let result = db.delete_record("people", a).unwrap();
        assert_eq!(result.deleted_count(), 2);
        assert_eq!(db.count_records("people").unwrap(), 0);
    }

    #[test]
    fn test_reference_display_fallbacks() {
        let (_dir, mut db) = open_db();
        let c = customers(&mut db);
        let o = orders(&mut db, c.id, DeletePolicy::Restrict);
        let cid = db
            .create_record(
                "customers",
                values(&[("name", FieldValue::text("Bob")), ("email", FieldValue::text("bob@x.io"))]),
            )
            .unwrap();
        let field = o.field("customer").unwrap();

        assert_eq!(db.resolve_reference_display(field, &FieldValue::Reference(cid)).unwrap(), "Bob");

        let mut by_email = field.clone();
        by_email.reference_display_field = Some("email".to_string());
        assert_eq!(
            db.resolve_reference_display(&by_email, &FieldValue::Reference(cid)).unwrap(),
            "bob@x.io"
        );
        assert_eq!(
            db.resolve_reference_display(field, &FieldValue::References(vec![cid, 99])).unwrap(),
            "Bob, #99 (missing)"
        );
        assert_eq!(db.resolve_reference_display(field, &FieldValue::Null).unwrap(), "");
    }

    #[test]
    fn test_attach_replace_and_clear_file() {
        let (dir, mut db) = open_db();
        db.create_table("docs", "Docs", vec![NewField::new("scan", "Scan", FieldType::Image)])
            .unwrap();
        let id = db.create_record("docs", HashMap::new()).unwrap();
        let first = dir.path().join("one.png");
        let second = dir.path().join("two.png");
        std::fs::write(&first, b"1").unwrap();
        std::fs::write(&second, b"22").unwrap();

        let rel1 = db.attach_file("docs", id, "scan", &first).unwrap();
        assert_eq!(rel1, format!("docs/{id}/scan_one.png"));
        assert!(db.files().file_exists(&rel1));

        let rel2 = db.attach_file("docs", id, "scan", &second).unwrap();
        assert!(!db.files().file_exists(&rel1));
        assert_eq!(db.get_record("docs", id).unwrap().get("scan"), &FieldValue::text(rel2.clone()));

        db.clear_file("docs", id, "scan").unwrap();
        assert!(!db.files().file_exists(&rel2));
        assert_eq!(db.get_record("docs", id).unwrap().get("scan"), &FieldValue::Null);
    }

    #[test]
    fn test_attach_to_non_file_field_fails() {
        let (dir, mut db) = open_db();
        customers(&mut db);
        let id = db.create_record("customers", values(&[("name", FieldValue::text("A"))])).unwrap();
        let result = db.attach_file("customers", id, "name", &dir.path().join("x.txt"));
        assert!(matches!(result, Err(RecordbaseError::SchemaMismatch(_))));
    }
}
