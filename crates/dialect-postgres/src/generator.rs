//! Per-operation DDL rendering for PostgreSQL.

use viborm_migrate_core::dialect::{DialectDriver, GenerationContext};
use viborm_migrate_core::diffop::DiffOperation;
use viborm_migrate_core::error::{Error, Result};
use viborm_migrate_core::snapshot::{ColumnDef, PrimaryKeyDef};
use viborm_migrate_core::statement::Statement;

pub struct PostgresGenerator;

/// `context` is unused here: every Postgres operation carries everything it
/// needs to render (enum dependents, column lists) directly on the
/// [`DiffOperation`] itself. Accepted for trait-signature parity with
/// SQLite's table recreation, which does need it.
pub fn generate(
    driver: &dyn DialectDriver,
    operation: &DiffOperation,
    _context: &GenerationContext<'_>,
) -> Result<Vec<Statement>> {
    let q = |identifier: &str| driver.quote_identifier(identifier);

    match operation {
        DiffOperation::CreateTable {
            table,
            columns,
            primary_key,
        } => Ok(vec![Statement::sql(create_table_sql(driver, table, columns, primary_key.as_ref())?)]),

        DiffOperation::DropTable { table } => {
            Ok(vec![Statement::sql(format!("DROP TABLE {} CASCADE", q(table)))])
        }

        DiffOperation::RenameTable { from, to } => Ok(vec![Statement::sql(format!(
            "ALTER TABLE {} RENAME TO {}",
            q(from),
            q(to)
        ))]),

        DiffOperation::AddColumn { table, column } => Ok(vec![Statement::sql(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            q(table),
            column_def_sql(driver, column)?
        ))]),

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

        DiffOperation::AlterColumn { table, from, to } => alter_column_sql(driver, table, from, to),

        DiffOperation::CreateIndex { table, index } => {
            if let Some(index_type) = index.index_type
                && !driver.capabilities().supports_index_type(index_type)
            {
                return Err(Error::feature_not_supported(
                    "postgres",
                    format!("index type `{}` is not supported", index_type.as_str()),
                ));
            }
            let unique = if index.unique { "UNIQUE " } else { "" };
            let using = index
                .index_type
                .map(|t| format!(" USING {}", t.as_str()))
                .unwrap_or_default();
            let columns = index
                .columns
                .iter()
                .map(|c| q(c))
                .collect::<Vec<_>>()
                .join(", ");
            let where_clause = index
                .r#where
                .as_ref()
                .map(|w| format!(" WHERE {w}"))
                .unwrap_or_default();
            Ok(vec![Statement::sql(format!(
                "CREATE {unique}INDEX {}{using} ON {} ({columns}){where_clause}",
                q(&index.name),
                q(table)
            ))])
        }

        DiffOperation::DropIndex { index, .. } => {
            Ok(vec![Statement::sql(format!("DROP INDEX {}", q(index)))])
        }

        DiffOperation::AddForeignKey { table, foreign_key } => {
            let columns = foreign_key
                .columns
                .iter()
                .map(|c| q(c))
                .collect::<Vec<_>>()
                .join(", ");
            let referenced_columns = foreign_key
                .referenced_columns
                .iter()
                .map(|c| q(c))
                .collect::<Vec<_>>()
                .join(", ");
            let on_delete = foreign_key
                .on_delete
                .map(|a| format!(" ON DELETE {}", a.as_sql()))
                .unwrap_or_default();
            let on_update = foreign_key
                .on_update
                .map(|a| format!(" ON UPDATE {}", a.as_sql()))
                .unwrap_or_default();
            Ok(vec![Statement::sql(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({columns}) REFERENCES {} ({referenced_columns}){on_delete}{on_update}",
                q(table),
                q(&foreign_key.name),
                q(&foreign_key.referenced_table)
            ))])
        }

        DiffOperation::DropForeignKey { table, foreign_key } => Ok(vec![Statement::sql(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            q(table),
            q(foreign_key)
        ))]),

        DiffOperation::AddUniqueConstraint { table, constraint } => {
            let columns = constraint
                .columns
                .iter()
                .map(|c| q(c))
                .collect::<Vec<_>>()
                .join(", ");
            Ok(vec![Statement::sql(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({columns})",
                q(table),
                q(&constraint.name)
            ))])
        }

        DiffOperation::DropUniqueConstraint { table, constraint } => Ok(vec![Statement::sql(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            q(table),
            q(constraint)
        ))]),

        DiffOperation::AddPrimaryKey { table, primary_key } => {
            let columns = primary_key
                .columns
                .iter()
                .map(|c| q(c))
                .collect::<Vec<_>>()
                .join(", ");
            let name = primary_key
                .name
                .clone()
                .unwrap_or_else(|| format!("{table}_pkey"));
            Ok(vec![Statement::sql(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({columns})",
                q(table),
                q(&name)
            ))])
        }

        DiffOperation::DropPrimaryKey { table } => Ok(vec![Statement::sql(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            q(table),
            q(&format!("{table}_pkey"))
        ))]),

        DiffOperation::CreateEnum { r#enum } => {
            let values = r#enum
                .values
                .iter()
                .map(|v| driver.escape_string_literal(v))
                .collect::<Vec<_>>()
                .join(", ");
            Ok(vec![Statement::sql(format!(
                "CREATE TYPE {} AS ENUM ({values})",
                q(&r#enum.name)
            ))])
        }

        DiffOperation::DropEnum { r#enum, .. } => {
            Ok(vec![Statement::sql(format!("DROP TYPE {}", q(r#enum)))])
        }

        DiffOperation::AlterEnum {
            r#enum,
            add_values,
            remove_values,
            new_values,
            dependent_columns,
            value_replacements,
            default_replacement,
        } => alter_enum_sql(
            driver,
            r#enum,
            add_values.as_deref(),
            remove_values.as_deref(),
            new_values.as_deref(),
            dependent_columns,
            value_replacements,
            default_replacement.as_ref(),
        ),
    }
}

fn create_table_sql(
    driver: &dyn DialectDriver,
    table: &str,
    columns: &[ColumnDef],
    primary_key: Option<&PrimaryKeyDef>,
) -> Result<String> {
    let mut lines: Vec<String> = columns
        .iter()
        .map(|column| column_def_sql(driver, column))
        .collect::<Result<_>>()?;
    if let Some(pk) = primary_key {
        let columns = pk
            .columns
            .iter()
            .map(|c| driver.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("PRIMARY KEY ({columns})"));
    }
    Ok(format!(
        "CREATE TABLE {} (\n  {}\n)",
        driver.quote_identifier(table),
        lines.join(",\n  ")
    ))
}

fn column_def_sql(driver: &dyn DialectDriver, column: &ColumnDef) -> Result<String> {
    let type_sql = if column.auto_increment {
        serial_type(&column.r#type)?
    } else {
        column.r#type.clone()
    };
    let mut sql = format!("{} {}", driver.quote_identifier(&column.name), type_sql);
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if !column.auto_increment
        && let Some(default) = &column.default
    {
        sql.push_str(" DEFAULT ");
        sql.push_str(default);
    }
    Ok(sql)
}

fn serial_type(raw_type: &str) -> Result<&'static str> {
    match raw_type.trim().to_ascii_lowercase().as_str() {
        "integer" | "int" | "int4" => Ok("SERIAL"),
        "bigint" | "int8" => Ok("BIGSERIAL"),
        "smallint" | "int2" => Ok("SMALLSERIAL"),
        other => Err(Error::feature_not_supported(
            "postgres",
            format!("auto-increment is only supported on integer types, got `{other}`"),
        )),
    }
}

fn alter_column_sql(
    driver: &dyn DialectDriver,
    table: &str,
    from: &ColumnDef,
    to: &ColumnDef,
) -> Result<Vec<Statement>> {
    let q = |identifier: &str| driver.quote_identifier(identifier);
    let mut statements = Vec::new();

    if from.r#type != to.r#type {
        statements.push(Statement::sql(format!(
            "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
            q(table),
            q(&to.name),
            to.r#type,
            q(&to.name),
            to.r#type
        )));
    }
    if from.nullable != to.nullable {
        let clause = if to.nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
        statements.push(Statement::sql(format!(
            "ALTER TABLE {} ALTER COLUMN {} {clause}",
            q(table),
            q(&to.name)
        )));
    }
    if from.default != to.default {
        let clause = match &to.default {
            Some(default) => format!("SET DEFAULT {default}"),
            None => "DROP DEFAULT".to_string(),
        };
        statements.push(Statement::sql(format!(
            "ALTER TABLE {} ALTER COLUMN {} {clause}",
            q(table),
            q(&to.name)
        )));
    }
    Ok(statements)
}

#[allow(clippy::too_many_arguments)]
fn alter_enum_sql(
    driver: &dyn DialectDriver,
    enum_name: &str,
    add_values: Option<&[String]>,
    remove_values: Option<&[String]>,
    new_values: Option<&[String]>,
    dependent_columns: &[(String, String)],
    value_replacements: &std::collections::BTreeMap<String, Option<String>>,
    default_replacement: Option<&Option<String>>,
) -> Result<Vec<Statement>> {
    let q = |identifier: &str| driver.quote_identifier(identifier);

    let Some(remove_values) = remove_values else {
        let mut statements = Vec::new();
        for value in add_values.unwrap_or_default() {
            statements.push(Statement::sql(format!(
                "ALTER TYPE {} ADD VALUE {}",
                q(enum_name),
                driver.escape_string_literal(value)
            )));
        }
        return Ok(statements);
    };

    let Some(new_values) = new_values else {
        return Err(Error::invalid_input("newValues required when removing values"));
    };

    let mut statements = Vec::new();

    for (table, column) in dependent_columns {
        statements.push(Statement::sql(format!(
            "ALTER TABLE {} ALTER COLUMN {} TYPE text",
            q(table),
            q(column)
        )));
    }

    for value in remove_values {
        let replacement = value_replacements.get(value).cloned().or_else(|| {
            default_replacement
                .cloned()
                .flatten()
                .map(Some)
                .unwrap_or(None)
        });
        match replacement {
            Some(Some(new_value)) => {
                for (table, column) in dependent_columns {
                    statements.push(Statement::sql(format!(
                        "UPDATE {} SET {} = {} WHERE {} = {}",
                        q(table),
                        q(column),
                        driver.escape_string_literal(&new_value),
                        q(column),
                        driver.escape_string_literal(value)
                    )));
                }
            }
            Some(None) => {
                for (table, column) in dependent_columns {
                    statements.push(Statement::sql(format!(
                        "UPDATE {} SET {} = NULL WHERE {} = {}",
                        q(table),
                        q(column),
                        q(column),
                        driver.escape_string_literal(value)
                    )));
                }
            }
            None => {
                statements.push(Statement::sql(format!(
                    "-- warning: no replacement configured for removed enum value {} on {}; migration may fail if rows still hold it",
                    driver.escape_string_literal(value),
                    enum_name
                )));
            }
        }
    }

    statements.push(Statement::sql(format!("DROP TYPE {}", q(enum_name))));

    let values_sql = new_values
        .iter()
        .map(|v| driver.escape_string_literal(v))
        .collect::<Vec<_>>()
        .join(", ");
    statements.push(Statement::sql(format!(
        "CREATE TYPE {} AS ENUM ({values_sql})",
        q(enum_name)
    )));

    for (table, column) in dependent_columns {
        statements.push(Statement::sql(format!(
            "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
            q(table),
            q(column),
            q(enum_name),
            q(column),
            q(enum_name)
        )));
    }

    Ok(statements)
}
