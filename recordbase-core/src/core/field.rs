//! Field and table definitions, and the per-field-type dispatch tables.
//!
//! [`FieldType`] is a closed set of fourteen variants. Every behavior that
//! depends on the type is a single `match` over that set: column typing,
//! value validation, conversion to and from SQLite/CSV/JSON, and display
//! formatting. Adding a type means visiting each table below.

use crate::{FieldValue, RecordbaseError, Result, LIST_SEPARATOR};
use chrono::NaiveDate;
use regex::Regex;
use rusqlite::types::{Value, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Column names every dynamic table carries; fields may not reuse them.
pub const RESERVED_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("valid regex"))
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"))
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:https?://|ftp://|www\.)\S+$").expect("valid regex"))
}

/// Returns `true` if `name` can be used unquoted as a table or column name.
pub fn is_identifier(name: &str) -> bool {
    identifier_re().is_match(name)
}

/// The type tag of a user-defined field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Boolean,
    Email,
    Url,
    Phone,
    RichText,
    Dropdown,
    MultiSelect,
    Image,
    File,
    Reference,
    MultiReference,
}

impl FieldType {
    pub const ALL: [FieldType; 14] = [
        Self::Text,
        Self::Number,
        Self::Date,
        Self::Boolean,
        Self::Email,
        Self::Url,
        Self::Phone,
        Self::RichText,
        Self::Dropdown,
        Self::MultiSelect,
        Self::Image,
        Self::File,
        Self::Reference,
        Self::MultiReference,
    ];

    /// The tag stored in `_fields.field_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::Email => "email",
            Self::Url => "url",
            Self::Phone => "phone",
            Self::RichText => "richtext",
            Self::Dropdown => "dropdown",
            Self::MultiSelect => "multiselect",
            Self::Image => "image",
            Self::File => "file",
            Self::Reference => "reference",
            Self::MultiReference => "multireference",
        }
    }

    /// SQLite column type used for this field's physical column.
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Number => "REAL",
            Self::Boolean => "BOOLEAN",
            Self::Reference => "INTEGER",
            Self::Text
            | Self::Date
            | Self::Email
            | Self::Url
            | Self::Phone
            | Self::RichText
            | Self::Dropdown
            | Self::MultiSelect
            | Self::Image
            | Self::File
            | Self::MultiReference => "TEXT",
        }
    }

    /// Types stored as a bare string in a TEXT column. A field may switch
    /// freely between these without touching existing values.
    pub fn is_plain_text(self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::Date
                | Self::Email
                | Self::Url
                | Self::Phone
                | Self::RichText
                | Self::Dropdown
                | Self::Image
                | Self::File
        )
    }

    /// Fields matched by free-text search when no explicit field list is given.
    pub fn is_text_bearing(self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::Email
                | Self::Url
                | Self::Phone
                | Self::RichText
                | Self::Dropdown
                | Self::MultiSelect
        )
    }

    /// Fields preferred when picking a human-readable label for a record.
    pub fn is_label_candidate(self) -> bool {
        matches!(self, Self::Text | Self::Email | Self::Phone | Self::Url)
    }

    pub fn is_reference(self) -> bool {
        matches!(self, Self::Reference | Self::MultiReference)
    }

    pub fn is_file(self) -> bool {
        matches!(self, Self::Image | Self::File)
    }

    pub fn has_options(self) -> bool {
        matches!(self, Self::Dropdown | Self::MultiSelect)
    }

    /// Values of these types can be bounded with a range filter.
    pub fn is_ordered_scalar(self) -> bool {
        matches!(self, Self::Number | Self::Date)
    }

    /// Converts a validated value into the SQLite value stored in its column.
    pub fn to_sql(self, value: &FieldValue) -> Result<Value> {
        Ok(match value {
            FieldValue::Null => Value::Null,
            FieldValue::Text(s) => Value::Text(s.clone()),
            FieldValue::Number(n) => Value::Real(*n),
            FieldValue::Boolean(b) => Value::Integer(i64::from(*b)),
            FieldValue::Reference(id) => Value::Integer(*id),
            FieldValue::List(items) => Value::Text(serde_json::to_string(items)?),
            FieldValue::References(ids) => Value::Text(serde_json::to_string(ids)?),
        })
    }

    /// Reads a column value back into the variant for this type.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbaseError::Json`] if a list column holds malformed JSON,
    /// or [`RecordbaseError::SchemaMismatch`] if the stored value cannot be
    /// interpreted as this type at all.
    pub fn from_sql(self, raw: ValueRef<'_>) -> Result<FieldValue> {
        if let ValueRef::Null = raw {
            return Ok(FieldValue::Null);
        }
        let mismatch = || {
            RecordbaseError::SchemaMismatch(format!(
                "stored value is not a valid {} value",
                self.as_str()
            ))
        };
        Ok(match self {
            Self::Number => match raw {
                ValueRef::Real(f) => FieldValue::Number(f),
                ValueRef::Integer(i) => FieldValue::Number(i as f64),
                ValueRef::Text(t) => FieldValue::Number(
                    std::str::from_utf8(t)
                        .ok()
                        .and_then(|s| s.trim().parse().ok())
                        .ok_or_else(mismatch)?,
                ),
                _ => return Err(mismatch()),
            },
            Self::Boolean => match raw {
                ValueRef::Integer(i) => FieldValue::Boolean(i != 0),
                ValueRef::Real(f) => FieldValue::Boolean(f != 0.0),
                ValueRef::Text(t) => FieldValue::Boolean(
                    std::str::from_utf8(t)
                        .ok()
                        .and_then(parse_bool)
                        .ok_or_else(mismatch)?,
                ),
                _ => return Err(mismatch()),
            },
            Self::Reference => match raw {
                ValueRef::Integer(i) => FieldValue::Reference(i),
                ValueRef::Real(f) if f.fract() == 0.0 => FieldValue::Reference(f as i64),
                ValueRef::Text(t) => FieldValue::Reference(
                    std::str::from_utf8(t)
                        .ok()
                        .and_then(|s| s.trim().parse().ok())
                        .ok_or_else(mismatch)?,
                ),
                _ => return Err(mismatch()),
            },
            Self::MultiSelect => {
                let text = raw.as_str().map_err(|_| mismatch())?;
                FieldValue::List(serde_json::from_str(text)?)
            }
            Self::MultiReference => {
                let text = raw.as_str().map_err(|_| mismatch())?;
                FieldValue::References(serde_json::from_str(text)?)
            }
            Self::Text
            | Self::Date
            | Self::Email
            | Self::Url
            | Self::Phone
            | Self::RichText
            | Self::Dropdown
            | Self::Image
            | Self::File => match raw {
                ValueRef::Text(t) => FieldValue::Text(String::from_utf8_lossy(t).into_owned()),
                ValueRef::Integer(i) => FieldValue::Text(i.to_string()),
                ValueRef::Real(f) => FieldValue::Text(f.to_string()),
                _ => return Err(mismatch()),
            },
        })
    }

    /// Parses one CSV cell. Empty cells become `Null`.
    ///
    /// Text cells are kept verbatim, surrounding whitespace included. Only
    /// numbers, booleans, ids and list items are trimmed before parsing.
    pub fn parse_cell(self, cell: &str) -> std::result::Result<FieldValue, String> {
        if cell.is_empty() {
            return Ok(FieldValue::Null);
        }
        if self.is_plain_text() {
            return Ok(FieldValue::Text(cell.to_string()));
        }
        let cell = cell.trim();
        if cell.is_empty() {
            return Ok(FieldValue::Null);
        }
        match self {
            Self::Number => cell
                .parse::<f64>()
                .map(FieldValue::Number)
                .map_err(|_| format!("must be a number, got '{cell}'")),
            Self::Boolean => parse_bool(cell)
                .map(FieldValue::Boolean)
                .ok_or_else(|| format!("must be true/false, got '{cell}'")),
            Self::Reference => cell
                .parse::<i64>()
                .map(FieldValue::Reference)
                .map_err(|_| format!("must be a record id, got '{cell}'")),
            Self::MultiSelect => Ok(FieldValue::List(
                split_list(cell).map(str::to_string).collect(),
            )),
            Self::MultiReference => split_list(cell)
                .map(|item| {
                    item.parse::<i64>()
                        .map_err(|_| format!("must be a list of record ids, got '{item}'"))
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(FieldValue::References),
            _ => Ok(FieldValue::Text(cell.to_string())),
        }
    }

    /// Converts one JSON value from a structured-text import.
    pub fn from_json(self, json: &serde_json::Value) -> std::result::Result<FieldValue, String> {
        use serde_json::Value as J;
        match (self, json) {
            (_, J::Null) => Ok(FieldValue::Null),
            (Self::Number, J::Number(n)) => n
                .as_f64()
                .map(FieldValue::Number)
                .ok_or_else(|| "must be a number".to_string()),
            (Self::Boolean, J::Bool(b)) => Ok(FieldValue::Boolean(*b)),
            (Self::Boolean, J::Number(n)) => Ok(FieldValue::Boolean(n.as_f64() != Some(0.0))),
            (Self::Reference, J::Number(n)) => n
                .as_i64()
                .map(FieldValue::Reference)
                .ok_or_else(|| "must be a record id".to_string()),
            (Self::MultiSelect, J::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| "must be a list of strings".to_string())
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(FieldValue::List),
            (Self::MultiReference, J::Array(items)) => items
                .iter()
                .map(|item| item.as_i64().ok_or_else(|| "must be a list of record ids".to_string()))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(FieldValue::References),
            (_, J::String(s)) => self.parse_cell(s),
            (_, other) => Err(format!("unexpected JSON value {other}")),
        }
    }

    /// Formats a value for list views and previews.
    ///
    /// References are shown by id here; resolving them to labels needs the
    /// database, see [`Database::display_value`](crate::Database::display_value).
    pub fn display(self, value: &FieldValue) -> String {
        match (self, value) {
            (_, FieldValue::Null) => String::new(),
            (_, FieldValue::Boolean(b)) => if *b { "Yes" } else { "No" }.to_string(),
            (_, FieldValue::Number(n)) => format_number(*n),
            (_, FieldValue::List(items)) => items.join(", "),
            (_, FieldValue::Reference(id)) => format!("ID: {id}"),
            (_, FieldValue::References(ids)) => format!(
                "IDs: {}",
                ids.iter().map(i64::to_string).collect::<Vec<_>>().join(", ")
            ),
            (Self::Image | Self::File, FieldValue::Text(path)) => {
                path.rsplit('/').next().unwrap_or(path).to_string()
            }
            (_, FieldValue::Text(s)) => s.clone(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = RecordbaseError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| RecordbaseError::Schema(format!("Unknown field type: {s}")))
    }
}

/// What happens to referencing values when a referenced record is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletePolicy {
    /// No automatic action; the reference is left dangling.
    #[default]
    Restrict,
    /// Records holding the reference are deleted as well.
    Cascade,
    /// The reference is cleared (removed from multi-reference lists).
    SetNull,
}

impl DeletePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restrict => "restrict",
            Self::Cascade => "cascade",
            Self::SetNull => "set-null",
        }
    }
}

impl FromStr for DeletePolicy {
    type Err = RecordbaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "restrict" => Ok(Self::Restrict),
            "cascade" => Ok(Self::Cascade),
            "set-null" => Ok(Self::SetNull),
            other => Err(RecordbaseError::Schema(format!("Unknown delete policy: {other}"))),
        }
    }
}

/// A field as requested by the caller when creating or reshaping a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewField {
    pub name: String,
    pub display_name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default = "default_true")]
    pub show_in_list: bool,
    /// Allowed values for `dropdown` and `multiselect` fields.
    #[serde(default)]
    pub options: Vec<String>,
    /// Target table id for `reference` and `multireference` fields.
    #[serde(default)]
    pub reference_table_id: Option<i64>,
    /// Field of the target table used as the label of referenced records.
    #[serde(default)]
    pub reference_display_field: Option<String>,
    #[serde(default)]
    pub on_delete: DeletePolicy,
}

fn default_true() -> bool {
    true
}

impl NewField {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            field_type,
            required: false,
            unique: false,
            show_in_list: true,
            options: Vec::new(),
            reference_table_id: None,
            reference_display_field: None,
            on_delete: DeletePolicy::Restrict,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.show_in_list = false;
        self
    }

    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn references(mut self, table_id: i64) -> Self {
        self.reference_table_id = Some(table_id);
        self
    }

    pub fn display_field(mut self, field: impl Into<String>) -> Self {
        self.reference_display_field = Some(field.into());
        self
    }

    pub fn on_delete(mut self, policy: DeletePolicy) -> Self {
        self.on_delete = policy;
        self
    }

    /// Checks the definition on its own, without looking at the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`RecordbaseError::Schema`] describing the first problem found.
    pub fn check(&self) -> Result<()> {
        let schema_err = |msg: String| Err(RecordbaseError::Schema(msg));

        if !is_identifier(&self.name) {
            return schema_err(format!(
                "Field name '{}' may only contain letters, digits and underscores",
                self.name
            ));
        }
        if RESERVED_COLUMNS.contains(&self.name.to_ascii_lowercase().as_str()) {
            return schema_err(format!("Field name '{}' is reserved", self.name));
        }
        if self.display_name.trim().is_empty() {
            return schema_err(format!("Field '{}' needs a display name", self.name));
        }

        if self.field_type.has_options() {
            let mut seen = std::collections::HashSet::new();
            for option in &self.options {
                if option.is_empty() {
                    return schema_err(format!("Field '{}' has an empty option", self.name));
                }
                if option.contains(LIST_SEPARATOR) {
                    return schema_err(format!(
                        "Option '{option}' of field '{}' may not contain '{LIST_SEPARATOR}'",
                        self.name
                    ));
                }
                if !seen.insert(option.as_str()) {
                    return schema_err(format!(
                        "Option '{option}' of field '{}' is listed twice",
                        self.name
                    ));
                }
            }
        } else if !self.options.is_empty() {
            return schema_err(format!(
                "Field '{}' of type {} cannot have options",
                self.name, self.field_type
            ));
        }

        if self.field_type.is_reference() {
            if self.reference_table_id.is_none() {
                return schema_err(format!("Reference field '{}' needs a target table", self.name));
            }
        } else if self.reference_table_id.is_some()
            || self.reference_display_field.is_some()
            || self.on_delete != DeletePolicy::Restrict
        {
            return schema_err(format!(
                "Field '{}' of type {} cannot reference another table",
                self.name, self.field_type
            ));
        }
        Ok(())
    }
}

/// A field as stored in the `_fields` catalog table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: i64,
    pub table_id: i64,
    pub name: String,
    pub display_name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub unique: bool,
    pub show_in_list: bool,
    pub options: Vec<String>,
    pub reference_table_id: Option<i64>,
    pub reference_display_field: Option<String>,
    pub on_delete: DeletePolicy,
    pub position: i64,
}

impl FieldDefinition {
    /// Validates `value` against this field and returns its canonical form.
    ///
    /// Empty strings and empty lists are canonicalized to `Null`; dates are
    /// rewritten as `YYYY-MM-DD`. Required and unique checks are done by the
    /// caller since they need the rest of the record or the table.
    pub fn check_value(&self, value: FieldValue) -> std::result::Result<FieldValue, String> {
        if value.is_empty() {
            return Ok(FieldValue::Null);
        }
        let ty = self.field_type;
        let wrong_kind = || format!("expects a {ty} value");
        match (ty, value) {
            (FieldType::Text | FieldType::Phone | FieldType::RichText, FieldValue::Text(s)) => {
                Ok(FieldValue::Text(s))
            }
            (FieldType::Image | FieldType::File, FieldValue::Text(s)) => Ok(FieldValue::Text(s)),
            (FieldType::Email, FieldValue::Text(s)) => {
                if email_re().is_match(&s) {
                    Ok(FieldValue::Text(s))
                } else {
                    Err("is not a valid email address".to_string())
                }
            }
            (FieldType::Url, FieldValue::Text(s)) => {
                if url_re().is_match(&s) {
                    Ok(FieldValue::Text(s))
                } else {
                    Err("is not a valid URL".to_string())
                }
            }
            (FieldType::Date, FieldValue::Text(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(|d| FieldValue::Text(d.format("%Y-%m-%d").to_string()))
                .map_err(|_| format!("must be a date in YYYY-MM-DD format, got '{s}'")),
            (FieldType::Number, FieldValue::Number(n)) => {
                if n.is_finite() {
                    Ok(FieldValue::Number(n))
                } else {
                    Err("must be a finite number".to_string())
                }
            }
            (FieldType::Number, FieldValue::Text(s)) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(FieldValue::Number(n)),
                _ => Err(format!("must be a number, got '{s}'")),
            },
            (FieldType::Boolean, FieldValue::Boolean(b)) => Ok(FieldValue::Boolean(b)),
            (FieldType::Boolean, FieldValue::Text(s)) => parse_bool(&s)
                .map(FieldValue::Boolean)
                .ok_or_else(|| format!("must be true/false, got '{s}'")),
            (FieldType::Dropdown, FieldValue::Text(s)) => {
                if self.options.is_empty() || self.options.contains(&s) {
                    Ok(FieldValue::Text(s))
                } else {
                    Err(format!("'{s}' is not one of the allowed options"))
                }
            }
            (FieldType::MultiSelect, FieldValue::List(items)) => {
                if let Some(bad) = items
                    .iter()
                    .find(|item| !self.options.is_empty() && !self.options.contains(item))
                {
                    Err(format!("'{bad}' is not one of the allowed options"))
                } else {
                    Ok(FieldValue::List(items))
                }
            }
            (FieldType::Reference, FieldValue::Reference(id)) => check_id(id).map(FieldValue::Reference),
            (FieldType::Reference, FieldValue::Number(n)) if n.fract() == 0.0 => {
                check_id(n as i64).map(FieldValue::Reference)
            }
            (FieldType::MultiReference, FieldValue::References(ids)) => ids
                .into_iter()
                .map(check_id)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(FieldValue::References),
            _ => Err(wrong_kind()),
        }
    }
}

fn check_id(id: i64) -> std::result::Result<i64, String> {
    if id > 0 {
        Ok(id)
    } else {
        Err(format!("{id} is not a valid record id"))
    }
}

/// A user-defined table with its fields in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub fields: Vec<FieldDefinition>,
}

impl TableDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field names in position order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Parses `true/yes/1/on` and `false/no/0/off`, ignoring case.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(cell: &str) -> impl Iterator<Item = &str> {
    cell.split(LIST_SEPARATOR).map(str::trim).filter(|s| !s.is_empty())
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
