//! The LibSQL dialect driver: a flat composition override over
//! [`viborm_migrate_dialect_sqlite::SqliteDriver`]. Only three operations
//! get native treatment — `alterColumn` and single-column
//! `addForeignKey`/`dropForeignKey`, via LibSQL's `ALTER TABLE ... ALTER
//! COLUMN ... TO ...` extension. Everything else, including multi-column FK
//! changes and primary-key changes, falls straight through to SQLite's
//! table recreation.

use std::sync::Arc;

use viborm_migrate_core::dialect::{Capabilities, DialectDriver, DialectKind, GenerationContext};
use viborm_migrate_core::diffop::DiffOperation;
use viborm_migrate_core::error::{Error, Result};
use viborm_migrate_core::executor::DatabaseExecutor;
use viborm_migrate_core::introspect::Introspector;
use viborm_migrate_core::snapshot::{ColumnDef, SchemaSnapshot};
use viborm_migrate_core::statement::Statement;
use viborm_migrate_dialect_sqlite::SqliteDriver;

#[derive(Debug, Default, Clone, Copy)]
pub struct LibsqlDriver {
    inner: SqliteDriver,
}

impl LibsqlDriver {
    #[must_use]
    pub fn new() -> Arc<dyn DialectDriver> {
        Arc::new(Self::default())
    }
}

impl DialectDriver for LibsqlDriver {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn driver_name(&self) -> &'static str {
        "libsql"
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    fn generate(&self, operation: &DiffOperation, context: &GenerationContext<'_>) -> Result<Vec<Statement>> {
        match operation {
            DiffOperation::AlterColumn { table, to, .. } => Ok(vec![alter_column_to(self, table, to)]),

            DiffOperation::AddForeignKey { table, foreign_key } if foreign_key.columns.len() == 1 => {
                let column_name = &foreign_key.columns[0];
                let current = context
                    .current
                    .table(table)
                    .and_then(|t| t.column(column_name))
                    .ok_or_else(|| {
                        Error::internal(format!("no current definition for column `{table}.{column_name}`"))
                    })?;
                Ok(vec![alter_column_to_with_reference(self, table, current, Some(foreign_key))])
            }

            DiffOperation::DropForeignKey { table, foreign_key } => {
                let fk = context
                    .current
                    .table(table)
                    .and_then(|t| t.foreign_keys.iter().find(|fk| &fk.name == foreign_key));
                match fk {
                    Some(fk) if fk.columns.len() == 1 => {
                        let column_name = &fk.columns[0];
                        let current = context
                            .current
                            .table(table)
                            .and_then(|t| t.column(column_name))
                            .ok_or_else(|| {
                                Error::internal(format!("no current definition for column `{table}.{column_name}`"))
                            })?;
                        Ok(vec![alter_column_to_with_reference(self, table, current, None)])
                    }
                    _ => self.inner.generate(operation, context),
                }
            }

            _ => self.inner.generate(operation, context),
        }
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        self.inner.quote_identifier(identifier)
    }

    fn escape_string_literal(&self, value: &str) -> String {
        self.inner.escape_string_literal(value)
    }

    fn placeholder(&self, index: usize) -> String {
        self.inner.placeholder(index)
    }

    fn advisory_lock_statements(&self, lock_key: &str) -> Option<(Statement, Statement)> {
        self.inner.advisory_lock_statements(lock_key)
    }

    fn tracking_table_statements(&self, table_name: &str) -> Vec<Statement> {
        self.inner.tracking_table_statements(table_name)
    }
}

impl Introspector for LibsqlDriver {
    fn introspect(&self, executor: &mut dyn DatabaseExecutor) -> Result<SchemaSnapshot> {
        // libsql's own client is async-only; over the HTTP/embedded-replica
        // surfaces that matter here the catalog is the same `sqlite_master`
        // plus `PRAGMA` set SQLite exposes, so a connected executor is
        // introspected exactly as if it were SQLite.
        self.inner.introspect(executor)
    }
}

fn alter_column_to(driver: &dyn DialectDriver, table: &str, column: &ColumnDef) -> Statement {
    alter_column_to_with_reference(driver, table, column, None)
}

fn alter_column_to_with_reference(
    driver: &dyn DialectDriver,
    table: &str,
    column: &ColumnDef,
    foreign_key: Option<&viborm_migrate_core::snapshot::ForeignKeyDef>,
) -> Statement {
    let q = |identifier: &str| driver.quote_identifier(identifier);
    let mut definition = format!("{} {}", q(&column.name), column.r#type);
    if !column.nullable {
        definition.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        definition.push_str(" DEFAULT ");
        definition.push_str(default);
    }
    if let Some(fk) = foreign_key {
        let referenced_columns = fk
            .referenced_columns
            .iter()
            .map(|c| q(c))
            .collect::<Vec<_>>()
            .join(", ");
        definition.push_str(&format!(" REFERENCES {}({referenced_columns})", q(&fk.referenced_table)));
        if let Some(on_delete) = fk.on_delete {
            definition.push_str(&format!(" ON DELETE {}", on_delete.as_sql()));
        }
        if let Some(on_update) = fk.on_update {
            definition.push_str(&format!(" ON UPDATE {}", on_update.as_sql()));
        }
    }
    Statement::sql(format!(
        "ALTER TABLE {} ALTER COLUMN {} TO {definition}",
        q(table),
        q(&column.name)
    ))
}
