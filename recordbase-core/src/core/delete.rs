//! Result type for record deletion.
//!
//! Deleting one record can remove more rows than the one asked for: fields
//! with the `cascade` policy delete the records that reference it, and
//! `set-null` fields clear their references. [`DeleteResult`] lists
//! everything that happened so callers can refresh any open views.

use serde::{Deserialize, Serialize};

/// A record removed by a delete operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedRecord {
    pub table: String,
    pub id: i64,
}

/// The outcome of [`Database::delete_record`](crate::Database::delete_record).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// Every deleted record; the requested one comes first.
    pub deleted: Vec<DeletedRecord>,

    /// Number of rows whose reference was cleared by a `set-null` field.
    pub cleared_references: usize,
}

impl DeleteResult {
    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_result_serialization() {
        let result = DeleteResult {
            deleted: vec![DeletedRecord { table: "orders".to_string(), id: 4 }],
            cleared_references: 2,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"clearedReferences\":2"));
        assert!(json.contains("\"table\":\"orders\""));
        assert_eq!(result.deleted_count(), 1);
    }
}
