//! Tagged field values and the text folding used by search.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Separator used when a list-valued field is written into a single CSV cell.
pub const LIST_SEPARATOR: char = ';';

/// A single stored value of a dynamic record.
///
/// The variant is chosen by the owning field's [`FieldType`](crate::FieldType):
/// string-like types hold `Text`, `number` holds `Number`, `multiselect` holds
/// `List`, and so on. Any field may be `Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    Null,
    Text(String),
    Number(f64),
    Boolean(bool),
    /// Id of a record in the field's reference target table.
    Reference(i64),
    /// Ordered option strings of a `multiselect` field.
    List(Vec<String>),
    /// Ordered record ids of a `multireference` field.
    References(Vec<i64>),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// `true` for `Null`, empty strings and empty lists.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::References(ids) => ids.is_empty(),
            Self::Number(_) | Self::Boolean(_) | Self::Reference(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the value as a single CSV cell.
    ///
    /// Lists are joined with [`LIST_SEPARATOR`]; `Null` becomes an empty cell.
    pub fn to_cell(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Reference(id) => id.to_string(),
            Self::List(items) => items.join(&LIST_SEPARATOR.to_string()),
            Self::References(ids) => ids
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(&LIST_SEPARATOR.to_string()),
        }
    }

    /// Converts the value into plain JSON; lists become nested arrays.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Null => Value::Null,
            Self::Text(s) => Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Reference(id) => Value::from(*id),
            Self::List(items) => Value::from(items.clone()),
            Self::References(ids) => Value::from(ids.clone()),
        }
    }
}

/// Folds `text` for case-insensitive matching.
///
/// Applies NFC normalization, full Unicode lowercasing, and maps the Greek
/// final sigma to its medial form so "ΟΔΟΣ" and "οδοσ" fold identically.
pub fn fold_text(text: &str) -> String {
    text.nfc()
        .collect::<String>()
        .to_lowercase()
        .replace('ς', "σ")
}
