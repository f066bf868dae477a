//! Per-operation DDL rendering for SQLite: native rendering where SQLite's
//! `ALTER TABLE` dialect covers the change, table recreation everywhere
//! else (§4.7).

use std::collections::BTreeSet;

use viborm_migrate_core::dialect::{DialectDriver, GenerationContext};
use viborm_migrate_core::diffop::DiffOperation;
use viborm_migrate_core::error::{Error, Result};
use viborm_migrate_core::snapshot::TableDef;
use viborm_migrate_core::statement::Statement;

use crate::{ddl, recreate};

pub fn generate(
    driver: &dyn DialectDriver,
    operation: &DiffOperation,
    context: &GenerationContext<'_>,
) -> Result<Vec<Statement>> {
    let q = |identifier: &str| driver.quote_identifier(identifier);

    match operation {
        DiffOperation::CreateTable {
            table,
            columns,
            primary_key,
        } => {
            let mut def = TableDef::new(table.clone());
            def.columns = columns.clone();
            def.primary_key = primary_key.clone();
            Ok(vec![Statement::sql(ddl::create_table_sql(
                driver,
                table,
                &def,
                context.desired,
            )?)])
        }

        DiffOperation::DropTable { table } => {
            Ok(vec![Statement::sql(format!("DROP TABLE {}", q(table)))])
        }

        DiffOperation::RenameTable { from, to } => Ok(vec![Statement::sql(format!(
            "ALTER TABLE {} RENAME TO {}",
            q(from),
            q(to)
        ))]),

        DiffOperation::AddColumn { table, column } => {
            if !column.nullable && column.default.is_none() {
                let desired = current_table(context, table)?.with_column_added(column.clone());
                return recreate::recreate_table(driver, context, &desired);
            }
            Ok(vec![Statement::sql(format!(
                "ALTER TABLE {} ADD COLUMN {}",
                q(table),
                ddl::column_def_sql(driver, column, context.desired)?
            ))])
        }

        DiffOperation::DropColumn { table, column } => Ok(vec![Statement::sql(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            q(table),
            q(column)
        ))]),

        DiffOperation::RenameColumn { table, from, to } => Ok(vec![Statement::sql(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            q(table),
            q(from),
            q(to)
        ))]),

        DiffOperation::AlterColumn { table, from, to } => {
            let desired = current_table(context, table)?.with_column_replaced(&from.name, to.clone());
            recreate::recreate_table(driver, context, &desired)
        }

        DiffOperation::CreateIndex { table, index } => {
            Ok(vec![ddl::create_index_sql(driver, table, index)?])
        }

        DiffOperation::DropIndex { index, .. } => {
            Ok(vec![Statement::sql(format!("DROP INDEX {}", q(index)))])
        }

        DiffOperation::AddForeignKey { table, foreign_key } => {
            let mut desired = current_table(context, table)?;
            desired.foreign_keys.push(foreign_key.clone());
            recreate::recreate_table(driver, context, &desired)
        }

        DiffOperation::DropForeignKey { table, foreign_key } => {
            let mut desired = current_table(context, table)?;
            desired.foreign_keys.retain(|fk| &fk.name != foreign_key);
            recreate::recreate_table(driver, context, &desired)
        }

        DiffOperation::AddUniqueConstraint { table, constraint } => {
            let mut desired = current_table(context, table)?;
            desired.unique_constraints.push(constraint.clone());
            recreate::recreate_table(driver, context, &desired)
        }

        DiffOperation::DropUniqueConstraint { table, constraint } => {
            let mut desired = current_table(context, table)?;
            desired.unique_constraints.retain(|u| &u.name != constraint);
            recreate::recreate_table(driver, context, &desired)
        }

        DiffOperation::AddPrimaryKey { table, primary_key } => {
            let mut desired = current_table(context, table)?;
            desired.primary_key = Some(primary_key.clone());
            recreate::recreate_table(driver, context, &desired)
        }

        DiffOperation::DropPrimaryKey { table } => {
            let mut desired = current_table(context, table)?;
            desired.primary_key = None;
            recreate::recreate_table(driver, context, &desired)
        }

        DiffOperation::CreateEnum { .. } => Ok(Vec::new()),

        DiffOperation::DropEnum { dependent_columns, .. } => {
            recreate_dependent_tables(driver, context, dependent_columns)
        }

        DiffOperation::AlterEnum { dependent_columns, .. } => {
            recreate_dependent_tables(driver, context, dependent_columns)
        }
    }
}

fn current_table(context: &GenerationContext<'_>, table: &str) -> Result<TableDef> {
    context
        .current
        .table(table)
        .cloned()
        .ok_or_else(|| Error::internal(format!("no current definition for table `{table}`")))
}

fn recreate_dependent_tables(
    driver: &dyn DialectDriver,
    context: &GenerationContext<'_>,
    dependent_columns: &[(String, String)],
) -> Result<Vec<Statement>> {
    let mut tables: BTreeSet<&str> = BTreeSet::new();
    for (table, _column) in dependent_columns {
        tables.insert(table.as_str());
    }

    let mut statements = Vec::new();
    for table in tables {
        let desired = context
            .desired
            .table(table)
            .ok_or_else(|| Error::internal(format!("no desired definition for table `{table}`")))?;
        statements.extend(recreate::recreate_table(driver, context, desired)?);
    }
    Ok(statements)
}

trait TableDefExt {
    fn with_column_added(self, column: viborm_migrate_core::snapshot::ColumnDef) -> TableDef;
    fn with_column_replaced(self, name: &str, replacement: viborm_migrate_core::snapshot::ColumnDef) -> TableDef;
}

impl TableDefExt for TableDef {
    fn with_column_added(mut self, column: viborm_migrate_core::snapshot::ColumnDef) -> TableDef {
        self.columns.push(column);
        self
    }

    fn with_column_replaced(mut self, name: &str, replacement: viborm_migrate_core::snapshot::ColumnDef) -> TableDef {
        if let Some(slot) = self.columns.iter_mut().find(|c| c.name == name) {
            *slot = replacement;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteDriver;
    use viborm_migrate_core::snapshot::{ColumnDef, SchemaSnapshot};

    fn statement_sql(statement: &Statement) -> &str {
        match statement {
            Statement::Sql { sql, .. } => sql,
            Statement::BatchBoundary => "",
        }
    }

    #[test]
    fn alter_column_triggers_recreation() {
        let driver = SqliteDriver;
        let mut current_table = TableDef::new("users");
        current_table.columns.push(ColumnDef::new("id", "INTEGER", false));
        current_table.columns.push(ColumnDef::new("age", "TEXT", true));
        let current = SchemaSnapshot::new(vec![current_table], vec![]);

        let mut desired_table = TableDef::new("users");
        desired_table.columns.push(ColumnDef::new("id", "INTEGER", false));
        desired_table.columns.push(ColumnDef::new("age", "INTEGER", true));
        let desired = SchemaSnapshot::new(vec![desired_table], vec![]);

        let context = GenerationContext {
            current: &current,
            desired: &desired,
        };
        let statements = generate(
            &driver,
            &DiffOperation::AlterColumn {
                table: "users".into(),
                from: ColumnDef::new("age", "TEXT", true),
                to: ColumnDef::new("age", "INTEGER", true),
            },
            &context,
        )
        .unwrap();

        assert_eq!(statement_sql(&statements[0]), "PRAGMA foreign_keys=OFF");
        assert!(statements.iter().any(|s| statement_sql(s).starts_with("CREATE TABLE \"__new_users\"")));
    }

    #[test]
    fn create_table_renders_natively() {
        let driver = SqliteDriver;
        let current = SchemaSnapshot::default();
        let desired = SchemaSnapshot::default();
        let context = GenerationContext {
            current: &current,
            desired: &desired,
        };
        let statements = generate(
            &driver,
            &DiffOperation::CreateTable {
                table: "users".into(),
                columns: vec![ColumnDef::new("id", "INTEGER", false)],
                primary_key: None,
            },
            &context,
        )
        .unwrap();
        assert_eq!(statements.len(), 1);
        assert!(statement_sql(&statements[0]).starts_with("CREATE TABLE \"users\""));
    }

    #[test]
    fn create_enum_is_a_no_op() {
        let driver = SqliteDriver;
        let current = SchemaSnapshot::default();
        let desired = SchemaSnapshot::default();
        let context = GenerationContext {
            current: &current,
            desired: &desired,
        };
        let statements = generate(
            &driver,
            &DiffOperation::CreateEnum {
                r#enum: viborm_migrate_core::snapshot::EnumDef::new("status", vec!["active".into()]),
            },
            &context,
        )
        .unwrap();
        assert!(statements.is_empty());
    }
}
