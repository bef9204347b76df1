//! Search, filters, sorting and pagination over one table.
//!
//! Queries are built from a fixed set of primitives; there is no query
//! language. Text matching goes through the `unicode_fold` SQL function so
//! it agrees with [`fold_text`] for every script, not only ASCII.

use crate::core::catalog::quote_ident;
use crate::core::field::RESERVED_COLUMNS;
use crate::core::records::{record_from_row, select_columns};
use crate::{
    fold_text, Database, FieldDefinition, FieldType, FieldValue, Record, RecordbaseError, Result,
    TableDefinition,
};
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// Page sizes offered to users.
pub const PAGE_SIZE_PRESETS: [usize; 4] = [25, 50, 100, 200];

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// A condition on one field. All filters of a query must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Filter {
    /// Case-insensitive substring match.
    Contains { field: String, text: String },
    /// Exact match after the value is canonicalized for the field. `Null`
    /// matches empty values; a single option matches multiselect fields that
    /// include it.
    Equals { field: String, value: FieldValue },
    /// Inclusive bounds on a number or date field; either side may be open.
    Range {
        field: String,
        min: Option<FieldValue>,
        max: Option<FieldValue>,
    },
    /// Reference fields pointing at `id`, or multireference lists containing it.
    References { field: String, id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub ascending: bool,
}

impl Sort {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self { field: field.into(), ascending: true }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self { field: field.into(), ascending: false }
    }
}

/// 1-based page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, page_size: DEFAULT_PAGE_SIZE }
    }
}

/// Everything a record list can ask for at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordQuery {
    /// Free-text search; blank means no search.
    #[serde(default)]
    pub search: Option<String>,
    /// Fields searched; `None` means every text-bearing field.
    #[serde(default)]
    pub search_fields: Option<Vec<String>>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub sort: Option<Sort>,
    /// `None` returns every matching record on a single page.
    #[serde(default)]
    pub page: Option<PageRequest>,
}

/// One page of a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
    pub records: Vec<Record>,
    /// Number of records matching the query across all pages.
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
}

impl RecordPage {
    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            0
        } else {
            self.total_count.div_ceil(self.page_size)
        }
    }
}

/// WHERE clause fragments and their bound parameters.
#[derive(Default)]
struct Conditions {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Conditions {
    fn push(&mut self, clause: String, params: Vec<Value>) {
        self.clauses.push(clause);
        self.params.extend(params);
    }

    fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

impl Database {
    /// Runs a combined search, filter, sort and page request.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbaseError::InvalidQuery`] for page or page size 0 and
    /// for filters that do not fit their field, and
    /// [`RecordbaseError::SchemaMismatch`] for unknown field names.
    pub fn query_records(&self, table: &str, query: &RecordQuery) -> Result<RecordPage> {
        let def = self.get_table(table)?;
        if let Some(page) = query.page {
            check_page(page)?;
        }

        let mut conditions = Conditions::default();
        if let Some(search) = query.search.as_deref() {
            add_search(&def, &mut conditions, search, query.search_fields.as_deref())?;
        }
        for filter in &query.filters {
            add_filter(&def, &mut conditions, filter)?;
        }
        let where_clause = conditions.where_clause();
        let table_sql = quote_ident(&def.name);

        let total_count: i64 = self.connection().query_row(
            &format!("SELECT COUNT(*) FROM {table_sql}{where_clause}"),
            params_from_iter(conditions.params.iter()),
            |row| row.get(0),
        )?;
        let total_count = total_count as usize;

        let mut sql = format!(
            "SELECT {} FROM {table_sql}{where_clause} ORDER BY {}",
            select_columns(&def),
            order_by(&def, query.sort.as_ref())?
        );
        let mut params = conditions.params;
        let (page, page_size) = match query.page {
            Some(request) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                params.push(Value::Integer(request.page_size as i64));
                params.push(Value::Integer(((request.page - 1) * request.page_size) as i64));
                (request.page, request.page_size)
            }
            None => (1, total_count),
        };

        let mut stmt = self.connection().prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(record_from_row(&def, row)?);
        }

        Ok(RecordPage { records, total_count, page, page_size })
    }

    /// Records whose text matches `query`, in id order.
    ///
    /// Matching is a case-insensitive substring test after Unicode
    /// normalization. `fields` limits the fields searched; by default every
    /// text-bearing field is. A blank query returns all records.
    pub fn search(&self, table: &str, query: &str, fields: Option<&[&str]>) -> Result<Vec<Record>> {
        let request = RecordQuery {
            search: Some(query.to_string()),
            search_fields: fields.map(|f| f.iter().map(|s| s.to_string()).collect()),
            ..RecordQuery::default()
        };
        Ok(self.query_records(table, &request)?.records)
    }

    /// One page of records in id order.
    pub fn paginate(&self, table: &str, page: usize, page_size: usize) -> Result<RecordPage> {
        let request = RecordQuery {
            page: Some(PageRequest { page, page_size }),
            ..RecordQuery::default()
        };
        self.query_records(table, &request)
    }
}

fn check_page(page: PageRequest) -> Result<()> {
    if page.page == 0 {
        return Err(RecordbaseError::InvalidQuery("Page numbers start at 1".to_string()));
    }
    if page.page_size == 0 {
        return Err(RecordbaseError::InvalidQuery("Page size must be at least 1".to_string()));
    }
    Ok(())
}

fn lookup<'a>(table: &'a TableDefinition, field: &str) -> Result<&'a FieldDefinition> {
    table.field(field).ok_or_else(|| {
        RecordbaseError::SchemaMismatch(format!("'{}' has no field '{field}'", table.name))
    })
}

/// Matches rows where `field` contains the bound folded needle.
///
/// List columns are matched item by item, never against their JSON text.
fn contains_folded(field: &FieldDefinition) -> String {
    let column = quote_ident(&field.name);
    match field.field_type {
        FieldType::MultiSelect | FieldType::MultiReference => format!(
            "EXISTS (SELECT 1 FROM json_each({column}) WHERE instr(unicode_fold(json_each.value), ?) > 0)"
        ),
        _ => format!("instr(unicode_fold({column}), ?) > 0"),
    }
}

fn add_search(
    table: &TableDefinition,
    conditions: &mut Conditions,
    search: &str,
    fields: Option<&[String]>,
) -> Result<()> {
    let needle = fold_text(search.trim());
    if needle.is_empty() {
        return Ok(());
    }
    let searched: Vec<&FieldDefinition> = match fields {
        Some(names) => names
            .iter()
            .map(|name| lookup(table, name))
            .collect::<Result<_>>()?,
        None => table
            .fields
            .iter()
            .filter(|f| f.field_type.is_text_bearing())
            .collect(),
    };
    if searched.is_empty() {
        conditions.push("0".to_string(), Vec::new());
        return Ok(());
    }
    let clauses: Vec<String> = searched
        .iter()
        .copied()
        .map(contains_folded)
        .collect();
    conditions.push(
        format!("({})", clauses.join(" OR ")),
        vec![Value::Text(needle); searched.len()],
    );
    Ok(())
}

fn canonical(field: &FieldDefinition, value: &FieldValue) -> Result<FieldValue> {
    field.check_value(value.clone()).map_err(|reason| {
        RecordbaseError::InvalidQuery(format!("Filter value for '{}' {reason}", field.name))
    })
}

/// Matches rows whose JSON list column contains the bound value.
fn json_list_contains(field: &FieldDefinition) -> String {
    format!(
        "EXISTS (SELECT 1 FROM json_each({}) WHERE json_each.value = ?)",
        quote_ident(&field.name)
    )
}

fn add_filter(table: &TableDefinition, conditions: &mut Conditions, filter: &Filter) -> Result<()> {
    match filter {
        Filter::Contains { field, text } => {
            let field = lookup(table, field)?;
            let needle = fold_text(text.trim());
            if !needle.is_empty() {
                conditions.push(contains_folded(field), vec![Value::Text(needle)]);
            }
        }
        Filter::Equals { field, value } => {
            let field = lookup(table, field)?;
            let column = quote_ident(&field.name);
            match (field.field_type, value) {
                (FieldType::MultiSelect, FieldValue::Text(option)) => {
                    conditions.push(json_list_contains(field), vec![Value::Text(option.clone())]);
                }
                _ => match canonical(field, value)? {
                    FieldValue::Null => conditions.push(format!("{column} IS NULL"), Vec::new()),
                    value => conditions.push(
                        format!("{column} = ?"),
                        vec![field.field_type.to_sql(&value)?],
                    ),
                },
            }
        }
        Filter::Range { field, min, max } => {
            let field = lookup(table, field)?;
            if !field.field_type.is_ordered_scalar() {
                return Err(RecordbaseError::InvalidQuery(format!(
                    "'{}' is a {} field and cannot be filtered by range",
                    field.name, field.field_type
                )));
            }
            let column = quote_ident(&field.name);
            for (bound, op) in [(min, ">="), (max, "<=")] {
                if let Some(bound) = bound {
                    let value = canonical(field, bound)?;
                    if !value.is_empty() {
                        conditions.push(format!("{column} {op} ?"), vec![field.field_type.to_sql(&value)?]);
                    }
                }
            }
        }
        Filter::References { field, id } => {
            let field = lookup(table, field)?;
            match field.field_type {
                FieldType::Reference => conditions.push(
                    format!("{} = ?", quote_ident(&field.name)),
                    vec![Value::Integer(*id)],
                ),
                FieldType::MultiReference => {
                    conditions.push(json_list_contains(field), vec![Value::Integer(*id)]);
                }
                other => {
                    return Err(RecordbaseError::InvalidQuery(format!(
                        "'{}' is a {other} field, not a reference",
                        field.name
                    )));
                }
            }
        }
    }
    Ok(())
}

fn order_by(table: &TableDefinition, sort: Option<&Sort>) -> Result<String> {
    let Some(sort) = sort else {
        return Ok("\"id\" ASC".to_string());
    };
    let key = if RESERVED_COLUMNS.contains(&sort.field.as_str()) {
        quote_ident(&sort.field)
    } else {
        let field = lookup(table, &sort.field)?;
        match field.field_type {
            FieldType::MultiReference => format!("json_extract({}, '$[0]')", quote_ident(&field.name)),
            _ => quote_ident(&field.name),
        }
    };
    let direction = if sort.ascending { "ASC" } else { "DESC" };
    Ok(format!("{key} {direction}, \"id\" ASC"))
}
