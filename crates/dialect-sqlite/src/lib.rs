//! The SQLite dialect driver: minimal native capabilities, table recreation
//! (§4.7) as the universal fallback everywhere SQLite's `ALTER TABLE`
//! dialect falls short.

mod adapter;
mod ddl;
mod generator;
mod introspect;
mod recreate;

pub use adapter::SqliteExecutor;
pub use recreate::recreate_table;

use std::sync::Arc;

use viborm_migrate_core::dialect::{Capabilities, DialectDriver, DialectKind, GenerationContext};
use viborm_migrate_core::diffop::DiffOperation;
use viborm_migrate_core::error::Result;
use viborm_migrate_core::snapshot::IndexType;
use viborm_migrate_core::statement::Statement;

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

impl SqliteDriver {
    #[must_use]
    pub fn new() -> Arc<dyn DialectDriver> {
        Arc::new(Self)
    }
}

impl DialectDriver for SqliteDriver {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_native_enums: false,
            supports_add_enum_value_in_transaction: false,
            supported_index_types: vec![IndexType::Btree],
            supports_native_arrays: false,
            supports_advisory_lock: false,
        }
    }

    fn generate(&self, operation: &DiffOperation, context: &GenerationContext<'_>) -> Result<Vec<Statement>> {
        generator::generate(self, operation, context)
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    fn escape_string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn advisory_lock_statements(&self, _lock_key: &str) -> Option<(Statement, Statement)> {
        None
    }

    fn tracking_table_statements(&self, table_name: &str) -> Vec<Statement> {
        let quoted = self.quote_identifier(table_name);
        vec![Statement::sql(format!(
            "CREATE TABLE IF NOT EXISTS {quoted} (\n  id INTEGER PRIMARY KEY AUTOINCREMENT,\n  name TEXT NOT NULL UNIQUE,\n  checksum TEXT NOT NULL,\n  applied_at INTEGER NOT NULL\n)"
        ))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_no_advisory_lock() {
        let driver = SqliteDriver;
        assert!(driver.advisory_lock_statements("anything").is_none());
        assert!(!driver.capabilities().supports_advisory_lock);
    }

    #[test]
    fn placeholder_is_always_a_bare_question_mark() {
        let driver = SqliteDriver;
        assert_eq!(driver.placeholder(1), "?");
        assert_eq!(driver.placeholder(7), "?");
    }
}
