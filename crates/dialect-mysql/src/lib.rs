//! The MySQL dialect driver: renders every [`DiffOperation`] natively using
//! `ALTER TABLE ... MODIFY/CHANGE COLUMN` and named-lock serialization in
//! place of Postgres's advisory lock and SQLite's table recreation.

mod adapter;
mod generator;
mod introspect;
mod lock;

pub use adapter::MySqlExecutor;

use std::sync::Arc;

use viborm_migrate_core::dialect::{Capabilities, DialectDriver, DialectKind, GenerationContext};
use viborm_migrate_core::diffop::DiffOperation;
use viborm_migrate_core::error::Result;
use viborm_migrate_core::snapshot::IndexType;
use viborm_migrate_core::statement::Statement;

#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDriver;

impl MySqlDriver {
    #[must_use]
    pub fn new() -> Arc<dyn DialectDriver> {
        Arc::new(Self)
    }
}

impl DialectDriver for MySqlDriver {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_native_enums: true,
            supports_add_enum_value_in_transaction: true,
            supported_index_types: vec![
                IndexType::Btree,
                IndexType::Hash,
                IndexType::Fulltext,
                IndexType::Spatial,
            ],
            supports_native_arrays: false,
            supports_advisory_lock: true,
        }
    }

    fn generate(&self, operation: &DiffOperation, context: &GenerationContext<'_>) -> Result<Vec<Statement>> {
        generator::generate(self, operation, context)
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("`{}`", identifier.replace('`', "``"))
    }

    fn escape_string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn advisory_lock_statements(&self, lock_key: &str) -> Option<(Statement, Statement)> {
        let name = self.escape_string_literal(&lock::lock_name(lock_key));
        Some((
            Statement::non_transactional_sql(format!("SELECT GET_LOCK({name}, 30)")),
            Statement::non_transactional_sql(format!("SELECT RELEASE_LOCK({name})")),
        ))
    }

    fn tracking_table_statements(&self, table_name: &str) -> Vec<Statement> {
        let quoted = self.quote_identifier(table_name);
        vec![Statement::sql(format!(
            "CREATE TABLE IF NOT EXISTS {quoted} (\n  id INT AUTO_INCREMENT PRIMARY KEY,\n  name VARCHAR(255) NOT NULL UNIQUE,\n  checksum VARCHAR(64) NOT NULL,\n  applied_at BIGINT NOT NULL\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"
        ))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_double_internal_backticks() {
        let driver = MySqlDriver;
        assert_eq!(driver.quote_identifier("weird`name"), "`weird``name`");
    }

    #[test]
    fn advisory_lock_names_are_namespaced_and_stable() {
        let driver = MySqlDriver;
        let (acquire, release) = driver.advisory_lock_statements("x").unwrap();
        assert_eq!(acquire, Statement::non_transactional_sql("SELECT GET_LOCK('viborm_migration_x', 30)"));
        assert_eq!(release, Statement::non_transactional_sql("SELECT RELEASE_LOCK('viborm_migration_x')"));
    }
}
