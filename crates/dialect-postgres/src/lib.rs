//! The PostgreSQL dialect driver: renders every [`DiffOperation`] natively,
//! including the enum-value-removal recreation sequence — the hardest
//! generation path outside SQLite's table recreation.

mod adapter;
mod generator;
mod introspect;
mod lock;

pub use adapter::PostgresExecutor;

use std::sync::Arc;

use viborm_migrate_core::dialect::{Capabilities, DialectDriver, DialectKind, GenerationContext};
use viborm_migrate_core::diffop::DiffOperation;
use viborm_migrate_core::error::Result;
use viborm_migrate_core::snapshot::IndexType;
use viborm_migrate_core::statement::Statement;

pub use generator::PostgresGenerator;

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDriver;

impl PostgresDriver {
    #[must_use]
    pub fn new() -> Arc<dyn DialectDriver> {
        Arc::new(Self)
    }
}

impl DialectDriver for PostgresDriver {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_native_enums: true,
            supports_add_enum_value_in_transaction: true,
            supported_index_types: vec![
                IndexType::Btree,
                IndexType::Hash,
                IndexType::Gin,
                IndexType::Gist,
            ],
            supports_native_arrays: true,
            supports_advisory_lock: true,
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

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn advisory_lock_statements(&self, lock_key: &str) -> Option<(Statement, Statement)> {
        let id = lock::lock_key_to_i64(lock_key);
        Some((
            Statement::non_transactional_sql(format!("SELECT pg_advisory_lock({id})")),
            Statement::non_transactional_sql(format!("SELECT pg_advisory_unlock({id})")),
        ))
    }

    fn tracking_table_statements(&self, table_name: &str) -> Vec<Statement> {
        let quoted = self.quote_identifier(table_name);
        vec![Statement::sql(format!(
            "CREATE TABLE IF NOT EXISTS {quoted} (\n  id SERIAL PRIMARY KEY,\n  name TEXT NOT NULL UNIQUE,\n  checksum TEXT NOT NULL,\n  applied_at BIGINT NOT NULL\n)"
        ))]
    }
}
