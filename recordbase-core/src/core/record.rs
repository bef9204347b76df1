use crate::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One row of a user-defined table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    /// One entry per field of the owning table, keyed by internal field name.
    pub values: HashMap<String, FieldValue>,
}

impl Record {
    /// Returns the value stored for `field`, or `Null` when the field is unknown.
    pub fn get(&self, field: &str) -> &FieldValue {
        self.values.get(field).unwrap_or(&FieldValue::Null)
    }
}
