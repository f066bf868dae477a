//! The introspector contract (C2): live database → [`SchemaSnapshot`].
//!
//! Kept as its own trait rather than folded into [`crate::dialect::DialectDriver`]:
//! every dialect driver needs one, but the many in-tree test doubles that
//! implement `DialectDriver` to exercise the generator or the orchestrator
//! have no catalog to query and no business answering `introspect`. Real
//! drivers implement both traits; test doubles implement only the one they
//! need.

use crate::error::Result;
use crate::executor::DatabaseExecutor;
use crate::snapshot::SchemaSnapshot;

pub trait Introspector {
    /// Issues this dialect's fixed set of catalog queries through `executor`
    /// and assembles the result into a [`SchemaSnapshot`]. Column types come
    /// back in native dialect spelling; normalisation for comparison
    /// purposes happens later, in the differ.
    ///
    /// # Errors
    /// Propagates any [`crate::error::Error::Database`] from `executor`, or
    /// returns [`crate::error::Error::Internal`] if a catalog row is missing
    /// a column this dialect's queries are supposed to guarantee.
    fn introspect(&self, executor: &mut dyn DatabaseExecutor) -> Result<SchemaSnapshot>;
}

/// Reads a required string column off a catalog row.
///
/// # Errors
/// [`crate::error::Error::Internal`] if the column is absent or not a string.
pub fn row_str<'a>(row: &'a serde_json::Value, column: &str) -> Result<&'a str> {
    row.get(column)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| crate::error::Error::internal(format!("catalog row missing string column `{column}`")))
}

/// Reads an optional string column off a catalog row (`NULL` or absent both
/// become `None`).
#[must_use]
pub fn row_opt_str<'a>(row: &'a serde_json::Value, column: &str) -> Option<&'a str> {
    row.get(column).and_then(serde_json::Value::as_str)
}

/// Reads a boolean column, treating `0`/`1` integers as falsy/truthy too
/// (SQLite's `PRAGMA` output returns integers, not JSON booleans).
#[must_use]
pub fn row_bool(row: &serde_json::Value, column: &str) -> bool {
    match row.get(column) {
        Some(serde_json::Value::Bool(value)) => *value,
        Some(serde_json::Value::Number(number)) => number.as_i64() != Some(0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_bool_accepts_sqlite_style_integers() {
        let row = serde_json::json!({"pk": 1, "notnull": 0});
        assert!(row_bool(&row, "pk"));
        assert!(!row_bool(&row, "notnull"));
    }

    #[test]
    fn row_str_rejects_missing_column() {
        let row = serde_json::json!({});
        assert!(row_str(&row, "name").is_err());
    }
}
