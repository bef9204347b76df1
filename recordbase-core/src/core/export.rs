//! Table export and import as CSV or JSON.
//!
//! Both formats carry one column per field, keyed by the field's internal
//! name, framed by `id` in front and `created_at`/`updated_at` at the end.
//! Imports validate every row like [`Database::create_record`] and skip the
//! rows that fail, reporting each one in the returned [`ImportReport`].

use crate::core::catalog::{infer_field_type, quote_ident, sanitize_field_name};
use crate::core::field::RESERVED_COLUMNS;
use crate::{
    Database, FieldDefinition, FieldValue, NewField, Record, RecordQuery, RecordbaseError, Result,
    TableDefinition,
};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Version of this crate, recorded in backups.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// Picks the format from a file extension (`.csv` or `.json`).
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    /// Add a field for every column that matches no existing field, with a
    /// type guessed from the column's first non-empty value.
    #[serde(default)]
    pub create_missing_fields: bool,
}

/// A data row that was skipped during import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRowError {
    /// 1-based position of the row among the data rows (the CSV header is not counted).
    pub row: usize,
    pub reason: String,
}

/// Result returned after an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported_count: usize,
    pub errors: Vec<ImportRowError>,
    /// Fields added because of [`ImportOptions::create_missing_fields`].
    pub created_fields: Vec<String>,
}

/// One cell as read from the source document.
enum Cell {
    Text(String),
    Json(serde_json::Value),
}

impl Cell {
    fn is_blank(&self) -> bool {
        match self {
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Json(v) => v.is_null() || v.as_str().is_some_and(|s| s.trim().is_empty()),
        }
    }

    fn sample(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Json(serde_json::Value::String(s)) => s.clone(),
            Cell::Json(v) => v.to_string(),
        }
    }

    fn to_value(&self, field: &FieldDefinition) -> std::result::Result<FieldValue, String> {
        match self {
            Cell::Text(s) => field.field_type.parse_cell(s),
            Cell::Json(v) => field.field_type.from_json(v),
        }
    }
}

/// One source row, or the reason it could not be read.
type Row = std::result::Result<Vec<Option<Cell>>, String>;

/// A parsed document: column names plus its rows.
struct Document {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// Serializes records of `table` in `format`.
///
/// When `records` is `None` every record is exported in id order; pass the
/// current query result to export only what is shown.
pub fn export_table(
    db: &Database,
    table: &str,
    format: ExportFormat,
    records: Option<&[Record]>,
) -> Result<Vec<u8>> {
    let def = db.get_table(table)?;
    let all;
    let records = match records {
        Some(records) => records,
        None => {
            all = db.query_records(table, &RecordQuery::default())?.records;
            &all
        }
    };
    let bytes = match format {
        ExportFormat::Csv => write_csv(&def, records)?,
        ExportFormat::Json => write_json(&def, records)?,
    };
    log::info!("exported {} record(s) from '{table}' as {format:?}", records.len());
    Ok(bytes)
}

/// A CSV document with the header row only, for users to fill in.
pub fn export_template(db: &Database, table: &str) -> Result<Vec<u8>> {
    let def = db.get_table(table)?;
    write_csv(&def, &[])
}

fn header(def: &TableDefinition) -> Vec<String> {
    let mut columns = vec!["id".to_string()];
    columns.extend(def.fields.iter().map(|f| f.name.clone()));
    columns.push("created_at".to_string());
    columns.push("updated_at".to_string());
    columns
}

fn write_csv(def: &TableDefinition, records: &[Record]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header(def))?;
    for record in records {
        let mut row = vec![record.id.to_string()];
        row.extend(def.fields.iter().map(|f| record.get(&f.name).to_cell()));
        row.push(record.created_at.to_string());
        row.push(record.updated_at.to_string());
        writer.write_record(&row)?;
    }
    writer
        .into_inner()
        .map_err(|e| RecordbaseError::Storage(e.into_error()))
}

fn write_json(def: &TableDefinition, records: &[Record]) -> Result<Vec<u8>> {
    let rows: Vec<serde_json::Value> = records
        .iter()
        .map(|record| {
            let mut object = serde_json::Map::new();
            object.insert("id".to_string(), record.id.into());
            for field in &def.fields {
                object.insert(field.name.clone(), record.get(&field.name).to_json());
            }
            object.insert("created_at".to_string(), record.created_at.into());
            object.insert("updated_at".to_string(), record.updated_at.into());
            serde_json::Value::Object(object)
        })
        .collect();
    Ok(serde_json::to_vec_pretty(&rows)?)
}

/// Reads `reader` as `format` and inserts its rows into `table`.
///
/// Columns are matched to fields by internal name; `id`, `created_at`,
/// `updated_at` and unmatched columns are ignored unless
/// [`ImportOptions::create_missing_fields`] is set. Rows that fail to parse
/// or validate, or whose files cannot be copied, are skipped and listed in
/// the report; the rest are committed together. File paths that point at an existing file under the storage
/// root are copied into the new record's directory.
///
/// The whole document is read into memory and the call blocks until every
/// row has been processed.
///
/// # Errors
///
/// Returns [`RecordbaseError::SchemaMismatch`] if the document lacks a
/// column for a required field, or if a JSON document is not an array.
/// Malformed documents surface as [`RecordbaseError::Csv`] or
/// [`RecordbaseError::Json`]. Nothing is imported in those cases.
pub fn import_table<R: Read>(
    db: &mut Database,
    table: &str,
    format: ExportFormat,
    reader: R,
    options: ImportOptions,
) -> Result<ImportReport> {
    let document = match format {
        ExportFormat::Csv => read_csv(reader)?,
        ExportFormat::Json => read_json(reader)?,
    };
    let mut report = ImportReport::default();
    let mut def = db.get_table(table)?;

    if options.create_missing_fields {
        report.created_fields = create_missing_fields(db, &def, &document)?;
        if !report.created_fields.is_empty() {
            def = db.get_table(table)?;
        }
    }
    let mapping = map_columns(&def, &document.columns, options.create_missing_fields);

    let missing: Vec<&str> = def
        .fields
        .iter()
        .filter(|f| f.required && !mapping.iter().flatten().any(|&i| def.fields[i].name == f.name))
        .map(|f| f.name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(RecordbaseError::SchemaMismatch(format!(
            "missing column(s) for required field(s): {}",
            missing.join(", ")
        )));
    }

    // Rows are inserted through `db` on the same connection. Dropping the
    // transaction on an error rolls every inserted row back.
    let tx = db.connection().unchecked_transaction()?;
    import_rows(db, &def, &document, &mapping, &mut report)?;
    tx.commit()?;

    log::info!(
        "imported {} row(s) into '{table}', skipped {}",
        report.imported_count,
        report.errors.len()
    );
    Ok(report)
}

fn read_csv<R: Read>(reader: R) -> Result<Document> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let columns: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let rows: Vec<Row> = csv_reader
        .records()
        .map(|result| {
            result
                .map(|record| record.iter().map(|cell| Some(Cell::Text(cell.to_string()))).collect())
                .map_err(|e| e.to_string())
        })
        .collect();
    Ok(Document { columns, rows })
}

fn read_json<R: Read>(reader: R) -> Result<Document> {
    let value: serde_json::Value = serde_json::from_reader(reader)?;
    let serde_json::Value::Array(items) = value else {
        return Err(RecordbaseError::SchemaMismatch(
            "a JSON import must be an array of objects".to_string(),
        ));
    };

    let mut columns: Vec<String> = Vec::new();
    for item in &items {
        if let Some(object) = item.as_object() {
            for key in object.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    let rows: Vec<Row> = items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::Object(mut object) => Ok(columns
                .iter()
                .map(|column| object.remove(column).map(Cell::Json))
                .collect()),
            other => Err(format!("expected an object, got {other}")),
        })
        .collect();
    Ok(Document { columns, rows })
}

/// For each column, the index of the field it fills.
fn map_columns(def: &TableDefinition, columns: &[String], sanitized: bool) -> Vec<Option<usize>> {
    columns
        .iter()
        .map(|column| {
            if RESERVED_COLUMNS.contains(&column.as_str()) {
                return None;
            }
            def.fields
                .iter()
                .position(|f| f.name == *column)
                .or_else(|| {
                    let name = sanitize_field_name(column);
                    sanitized
                        .then(|| def.fields.iter().position(|f| f.name == name))
                        .flatten()
                })
        })
        .collect()
}

fn create_missing_fields(db: &mut Database, def: &TableDefinition, document: &Document) -> Result<Vec<String>> {
    let mut created = Vec::new();
    for (index, column) in document.columns.iter().enumerate() {
        if RESERVED_COLUMNS.contains(&column.as_str()) || def.field(column).is_some() {
            continue;
        }
        let name = sanitize_field_name(column);
        if def.field(&name).is_some() || created.contains(&name) {
            continue;
        }
        let sample = document
            .rows
            .iter()
            .filter_map(|row| row.as_ref().ok())
            .filter_map(|cells| cells.get(index).and_then(Option::as_ref))
            .find(|cell| !cell.is_blank())
            .map(Cell::sample)
            .unwrap_or_default();
        let field_type = infer_field_type(&sample);
        db.add_field(&def.name, NewField::new(name.clone(), column.trim(), field_type))?;
        log::info!("import created field '{name}' ({field_type}) in '{}'", def.name);
        created.push(name);
    }
    Ok(created)
}

fn import_rows(
    db: &Database,
    def: &TableDefinition,
    document: &Document,
    mapping: &[Option<usize>],
    report: &mut ImportReport,
) -> Result<()> {
    for (index, row) in document.rows.iter().enumerate() {
        let row_number = index + 1;
        let outcome = match row {
            Ok(cells) => row_values(def, cells, mapping),
            Err(reason) => Err(reason.clone()),
        };
        let values = match outcome {
            Ok(values) => values,
            Err(reason) => {
                skip_row(report, row_number, reason);
                continue;
            }
        };
        let id = match db.insert_record(def, values) {
            Ok(id) => id,
            Err(RecordbaseError::Validation(errors)) => {
                skip_row(report, row_number, errors.to_string());
                continue;
            }
            Err(e) => return Err(e),
        };
        match relocate_files(db, def, id) {
            Ok(()) => report.imported_count += 1,
            Err(RecordbaseError::Storage(e)) => {
                discard_record(db, def, id)?;
                skip_row(report, row_number, format!("could not copy its files: {e}"));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Removes a record inserted earlier in the same import, with whatever
/// files were already copied for it.
fn discard_record(db: &Database, def: &TableDefinition, id: i64) -> Result<()> {
    db.connection().execute(
        &format!("DELETE FROM {} WHERE \"id\" = ?1", quote_ident(&def.name)),
        params![id],
    )?;
    if let Err(e) = db.files().delete_record_files(&def.name, id) {
        log::warn!("could not remove files of discarded record {id} in '{}': {e}", def.name);
    }
    Ok(())
}

fn row_values(
    def: &TableDefinition,
    cells: &[Option<Cell>],
    mapping: &[Option<usize>],
) -> std::result::Result<HashMap<String, FieldValue>, String> {
    let mut values = HashMap::new();
    let mut problems = Vec::new();
    for (cell, target) in cells.iter().zip(mapping) {
        let (Some(cell), Some(field_index)) = (cell, target) else {
            continue;
        };
        let field = &def.fields[*field_index];
        match cell.to_value(field) {
            Ok(value) => {
                values.insert(field.name.clone(), value);
            }
            Err(reason) => problems.push(format!("{} {reason}", field.name)),
        }
    }
    if problems.is_empty() {
        Ok(values)
    } else {
        Err(problems.join("; "))
    }
}

fn skip_row(report: &mut ImportReport, row: usize, reason: String) {
    log::warn!("import skipped row {row}: {reason}");
    report.errors.push(ImportRowError { row, reason });
}

/// Copies files referenced by an imported record into its own directory.
fn relocate_files(db: &Database, def: &TableDefinition, id: i64) -> Result<()> {
    let file_fields: Vec<&FieldDefinition> = def.fields.iter().filter(|f| f.field_type.is_file()).collect();
    if file_fields.is_empty() {
        return Ok(());
    }
    let record = db.get_record(&def.name, id)?;
    for field in file_fields {
        let Some(stored) = record.get(&field.name).as_text() else {
            continue;
        };
        if !db.files().file_exists(stored) {
            continue;
        }
        let source = db.files().absolute(stored)?;
        let base = stored.rsplit('/').next().unwrap_or(stored);
        let original = base
            .strip_prefix(&format!("{}_", field.name))
            .unwrap_or(base);
        if db.files().relative_path(&def.name, id, &field.name, original) == stored {
            continue;
        }
        let relative = db.files().copy_into(&def.name, id, &field.name, &source, original)?;
        db.write_file_column(def, id, field, Some(&relative))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldType;
    use std::fs;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, Database) {
        let dir = tempdir().unwrap();
        let mut db = Database::create(dir.path().join("test.db")).unwrap();
        db.create_table(
            "contacts",
            "Contacts",
            vec![
                NewField::new("name", "Name", FieldType::Text).required(),
                NewField::new("age", "Age", FieldType::Number),
                NewField::new("vip", "VIP", FieldType::Boolean),
                NewField::new("tags", "Tags", FieldType::MultiSelect),
            ],
        )
        .unwrap();
        (dir, db)
    }

    fn contact(db: &mut Database, name: &str, age: f64, tags: &[&str]) -> i64 {
        let mut values = HashMap::new();
        values.insert("name".to_string(), FieldValue::text(name));
        values.insert("age".to_string(), FieldValue::Number(age));
        values.insert("vip".to_string(), FieldValue::Boolean(age > 40.0));
        values.insert("tags".to_string(), FieldValue::list(tags.iter().copied()));
        db.create_record("contacts", values).unwrap()
    }

    #[test]
    fn test_export_csv_layout() {
        let (_dir, mut db) = setup();
        contact(&mut db, "Ann, Jr.", 44.0, &["a", "b"]);

        let csv = String::from_utf8(export_table(&db, "contacts", ExportFormat::Csv, None).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "id,name,age,vip,tags,created_at,updated_at");
        let row = lines.next().unwrap();
        assert!(row.starts_with("1,\"Ann, Jr.\",44,true,a;b,"), "{row}");
    }

    #[test]
    fn test_export_json_nested_lists() {
        let (_dir, mut db) = setup();
        contact(&mut db, "Ann", 30.0, &["x"]);
        let json: serde_json::Value =
            serde_json::from_slice(&export_table(&db, "contacts", ExportFormat::Json, None).unwrap()).unwrap();
        assert_eq!(json[0]["tags"], serde_json::json!(["x"]));
        assert_eq!(json[0]["vip"], serde_json::json!(false));
        let keys: Vec<&String> = json[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["id", "name", "age", "vip", "tags", "created_at", "updated_at"]);
    }

    #[test]
    fn test_export_template_has_header_only() {
        let (_dir, db) = setup();
        let csv = String::from_utf8(export_template(&db, "contacts").unwrap()).unwrap();
        assert_eq!(csv.trim_end(), "id,name,age,vip,tags,created_at,updated_at");
    }

    #[test]
    fn test_import_csv_skips_bad_rows() {
        let (_dir, mut db) = setup();
        let data = "name,age,vip,unknown\nAnn,30,yes,x\n,40,no,x\nBob,old,no,x\nCid,,off,x\n";
        let report =
            import_table(&mut db, "contacts", ExportFormat::Csv, data.as_bytes(), ImportOptions::default()).unwrap();

        assert_eq!(report.imported_count, 2);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].row, 2);
        assert!(report.errors[0].reason.contains("name"));
        assert_eq!(report.errors[1].row, 3);
        assert!(report.errors[1].reason.contains("age"));
        assert_eq!(db.count_records("contacts").unwrap(), 2);
    }

    #[test]
    fn test_import_missing_required_column_aborts() {
        let (_dir, mut db) = setup();
        let data = "age\n30\n";
        let result = import_table(&mut db, "contacts", ExportFormat::Csv, data.as_bytes(), ImportOptions::default());
        assert!(matches!(result, Err(RecordbaseError::SchemaMismatch(_))));
        assert_eq!(db.count_records("contacts").unwrap(), 0);
    }

    #[test]
    fn test_import_json() {
        let (_dir, mut db) = setup();
        let data = r#"[{"name": "Ann", "age": 31, "tags": ["p", "q"]}, 5, {"name": "Bo", "vip": true}]"#;
        let report =
            import_table(&mut db, "contacts", ExportFormat::Json, data.as_bytes(), ImportOptions::default()).unwrap();
        assert_eq!(report.imported_count, 2);
        assert_eq!(report.errors[0].row, 2);

        let found = db.search("contacts", "ann", None).unwrap();
        assert_eq!(found[0].get("tags"), &FieldValue::list(["p", "q"]));
        assert_eq!(found[0].get("age"), &FieldValue::Number(31.0));
    }

    #[test]
    fn test_import_json_must_be_array() {
        let (_dir, mut db) = setup();
        let result = import_table(
            &mut db,
            "contacts",
            ExportFormat::Json,
            r#"{"name": "Ann"}"#.as_bytes(),
            ImportOptions::default(),
        );
        assert!(matches!(result, Err(RecordbaseError::SchemaMismatch(_))));
    }

    #[test]
    fn test_import_creates_missing_fields() {
        let (_dir, mut db) = setup();
        let data = "name,E-mail Address,Joined\nAnn,ann@x.io,2024-05-01\n";
        let report = import_table(
            &mut db,
            "contacts",
            ExportFormat::Csv,
            data.as_bytes(),
            ImportOptions { create_missing_fields: true },
        )
        .unwrap();

        assert_eq!(report.created_fields, vec!["e_mail_address", "joined"]);
        let def = db.get_table("contacts").unwrap();
        assert_eq!(def.field("e_mail_address").unwrap().field_type, FieldType::Email);
        assert_eq!(def.field("joined").unwrap().field_type, FieldType::Date);
        let record = &db.search("contacts", "ann", Some(&["name"])).unwrap()[0];
        assert_eq!(record.get("joined"), &FieldValue::text("2024-05-01"));
    }

    #[test]
    fn test_csv_round_trip_into_empty_table() {
        let (_dir, mut db) = setup();
        contact(&mut db, "Ann", 30.5, &["a"]);
        contact(&mut db, "Βασίλης", 52.0, &[]);
        let exported = export_table(&db, "contacts", ExportFormat::Csv, None).unwrap();

        let source = db.get_table("contacts").unwrap();
        let copy_fields = source
            .fields
            .iter()
            .map(|f| NewField::new(f.name.clone(), f.display_name.clone(), f.field_type))
            .collect();
        db.create_table("contacts_copy", "Copy", copy_fields).unwrap();
        let report =
            import_table(&mut db, "contacts_copy", ExportFormat::Csv, exported.as_slice(), ImportOptions::default())
                .unwrap();
        assert_eq!(report.imported_count, 2);
        assert!(report.errors.is_empty());

        let original = db.paginate("contacts", 1, 50).unwrap().records;
        let copied = db.paginate("contacts_copy", 1, 50).unwrap().records;
        for (a, b) in original.iter().zip(&copied) {
            assert_eq!(a.values, b.values);
        }
    }

    #[test]
    fn test_padded_text_survives_export_and_import() {
        for format in [ExportFormat::Csv, ExportFormat::Json] {
            let (_dir, mut db) = setup();
            contact(&mut db, "  padded  ", 30.0, &[]);
            contact(&mut db, " ", 31.0, &[]);
            let exported = export_table(&db, "contacts", format, None).unwrap();

            db.create_table("copy", "Copy", vec![NewField::new("name", "Name", FieldType::Text).required()])
                .unwrap();
            let report =
                import_table(&mut db, "copy", format, exported.as_slice(), ImportOptions::default()).unwrap();
            assert_eq!(report.imported_count, 2, "{format:?}");

            let names: Vec<FieldValue> = db
                .paginate("copy", 1, 50)
                .unwrap()
                .records
                .iter()
                .map(|r| r.get("name").clone())
                .collect();
            assert_eq!(names, vec![FieldValue::text("  padded  "), FieldValue::text(" ")], "{format:?}");
        }
    }

    #[test]
    fn test_import_skips_rows_whose_files_cannot_be_copied() {
        let dir = tempdir().unwrap();
        let mut db = Database::create(dir.path().join("test.db")).unwrap();
        db.create_table(
            "docs",
            "Docs",
            vec![
                NewField::new("title", "Title", FieldType::Text),
                NewField::new("scan", "Scan", FieldType::File),
            ],
        )
        .unwrap();
        let root = db.files().root().to_path_buf();
        for (folder, name) in [("1", "scan_a.pdf"), ("2", "scan_b.pdf")] {
            let source = root.join("library").join(folder);
            fs::create_dir_all(&source).unwrap();
            fs::write(source.join(name), b"%PDF").unwrap();
        }
        // A plain file sits where the first record's directory would go.
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("docs").join("1"), b"").unwrap();

        let data = "title,scan\nfirst,library/1/scan_a.pdf\nsecond,library/2/scan_b.pdf\n";
        let report =
            import_table(&mut db, "docs", ExportFormat::Csv, data.as_bytes(), ImportOptions::default()).unwrap();

        assert_eq!(report.imported_count, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row, 1);
        assert_eq!(db.count_records("docs").unwrap(), 1);
        assert!(matches!(db.get_record("docs", 1), Err(RecordbaseError::RecordNotFound { .. })));
        let second = db.get_record("docs", 2).unwrap();
        assert_eq!(second.get("scan"), &FieldValue::text("docs/2/scan_b.pdf"));
        assert!(db.files().file_exists("docs/2/scan_b.pdf"));
    }

    #[test]
    fn test_failed_import_rolls_back_earlier_rows() {
        let (_dir, mut db) = setup();
        db.connection()
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON contacts WHEN NEW.name = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        let data = "name\nAnn\nBea\nboom\nCid\n";
        let result = import_table(&mut db, "contacts", ExportFormat::Csv, data.as_bytes(), ImportOptions::default());

        assert!(matches!(result, Err(RecordbaseError::Database(_))));
        assert_eq!(db.count_records("contacts").unwrap(), 0);
        // The connection is usable again afterwards.
        contact(&mut db, "Dee", 20.0, &[]);
        assert_eq!(db.count_records("contacts").unwrap(), 1);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("a/b.CSV")), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::from_path(Path::new("b.json")), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::from_path(Path::new("b.xlsx")), None);
    }
}
