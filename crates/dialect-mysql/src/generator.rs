//! Per-operation DDL rendering for MySQL.

use viborm_migrate_core::dialect::{DialectDriver, GenerationContext};
use viborm_migrate_core::diffop::DiffOperation;
use viborm_migrate_core::error::{Error, Result};
use viborm_migrate_core::snapshot::{ColumnDef, IndexType, PrimaryKeyDef};
use viborm_migrate_core::statement::Statement;

const TABLE_SUFFIX: &str = "ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci";

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
        } => Ok(vec![Statement::sql(create_table_sql(driver, table, columns, primary_key.as_ref())?)]),

        DiffOperation::DropTable { table } => Ok(vec![Statement::sql(format!("DROP TABLE {}", q(table)))]),

        DiffOperation::RenameTable { from, to } => Ok(vec![Statement::sql(format!(
            "RENAME TABLE {} TO {}",
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

        DiffOperation::RenameColumn { table, from, to } => {
            let current = context
                .current
                .table(table)
                .and_then(|t| t.column(from))
                .ok_or_else(|| Error::internal(format!("no current definition for column `{table}.{from}`")))?;
            let mut renamed = current.clone();
            renamed.name = to.clone();
            Ok(vec![Statement::sql(format!(
                "ALTER TABLE {} CHANGE COLUMN {} {}",
                q(table),
                q(from),
                column_def_sql(driver, &renamed)?
            ))])
        }

        DiffOperation::AlterColumn { table, from, to } => {
            let statement = if from.name == to.name {
                format!("ALTER TABLE {} MODIFY COLUMN {}", q(table), column_def_sql(driver, to)?)
            } else {
                format!(
                    "ALTER TABLE {} CHANGE COLUMN {} {}",
                    q(table),
                    q(&from.name),
                    column_def_sql(driver, to)?
                )
            };
            Ok(vec![Statement::sql(statement)])
        }

        DiffOperation::CreateIndex { table, index } => {
            if let Some(index_type) = index.index_type
                && !driver.capabilities().supports_index_type(index_type)
            {
                return Err(Error::feature_not_supported(
                    "mysql",
                    format!("index type `{}` is not supported", index_type.as_str()),
                ));
            }
            let columns = index.columns.iter().map(|c| q(c)).collect::<Vec<_>>().join(", ");
            let kind = match index.index_type {
                Some(IndexType::Fulltext) => "FULLTEXT ",
                Some(IndexType::Spatial) => "SPATIAL ",
                _ if index.unique => "UNIQUE ",
                _ => "",
            };
            let using = match index.index_type {
                Some(IndexType::Btree) => " USING BTREE",
                Some(IndexType::Hash) => " USING HASH",
                _ => "",
            };
            Ok(vec![Statement::sql(format!(
                "CREATE {kind}INDEX {} ON {} ({columns}){using}",
                q(&index.name),
                q(table)
            ))])
        }

        DiffOperation::DropIndex { table, index } => {
            Ok(vec![Statement::sql(format!("DROP INDEX {} ON {}", q(index), q(table)))])
        }

        DiffOperation::AddForeignKey { table, foreign_key } => {
            let columns = foreign_key.columns.iter().map(|c| q(c)).collect::<Vec<_>>().join(", ");
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
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            q(table),
            q(foreign_key)
        ))]),

        DiffOperation::AddUniqueConstraint { table, constraint } => {
            let columns = constraint.columns.iter().map(|c| q(c)).collect::<Vec<_>>().join(", ");
            Ok(vec![Statement::sql(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({columns})",
                q(table),
                q(&constraint.name)
            ))])
        }

        DiffOperation::DropUniqueConstraint { table, constraint } => {
            Ok(vec![Statement::sql(format!("DROP INDEX {} ON {}", q(constraint), q(table)))])
        }

        DiffOperation::AddPrimaryKey { table, primary_key } => {
            let columns = primary_key.columns.iter().map(|c| q(c)).collect::<Vec<_>>().join(", ");
            Ok(vec![Statement::sql(format!("ALTER TABLE {} ADD PRIMARY KEY ({columns})", q(table)))])
        }

        DiffOperation::DropPrimaryKey { table } => {
            Ok(vec![Statement::sql(format!("ALTER TABLE {} DROP PRIMARY KEY", q(table)))])
        }

        DiffOperation::CreateEnum { .. } | DiffOperation::DropEnum { .. } => Ok(Vec::new()),

        DiffOperation::AlterEnum {
            r#enum,
            dependent_columns,
            ..
        } => {
            let enum_def = context
                .desired
                .enum_def(r#enum)
                .ok_or_else(|| Error::internal(format!("no desired definition for enum `{enum}`")))?;
            let enum_type = enum_column_type(driver, &enum_def.values);

            let mut statements = Vec::new();
            for (table, column) in dependent_columns {
                let desired_column = context
                    .desired
                    .table(table)
                    .and_then(|t| t.column(column))
                    .ok_or_else(|| Error::internal(format!("no desired definition for column `{table}.{column}`")))?;
                let mut rendered = desired_column.clone();
                rendered.r#type = enum_type.clone();
                statements.push(Statement::sql(format!(
                    "ALTER TABLE {} MODIFY COLUMN {}",
                    q(table),
                    column_def_sql(driver, &rendered)?
                )));
            }
            Ok(statements)
        }
    }
}

fn create_table_sql(
    driver: &dyn DialectDriver,
    table: &str,
    columns: &[ColumnDef],
    primary_key: Option<&PrimaryKeyDef>,
) -> Result<String> {
    let mut lines: Vec<String> = columns.iter().map(|column| column_def_sql(driver, column)).collect::<Result<_>>()?;
    if let Some(pk) = primary_key {
        let columns = pk.columns.iter().map(|c| driver.quote_identifier(c)).collect::<Vec<_>>().join(", ");
        lines.push(format!("PRIMARY KEY ({columns})"));
    }
    Ok(format!(
        "CREATE TABLE {} (\n  {}\n) {TABLE_SUFFIX}",
        driver.quote_identifier(table),
        lines.join(",\n  ")
    ))
}

fn column_def_sql(driver: &dyn DialectDriver, column: &ColumnDef) -> Result<String> {
    let mut sql = format!("{} {}", driver.quote_identifier(&column.name), column.r#type);
    if column.auto_increment {
        sql.push_str(" AUTO_INCREMENT");
    }
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default
        && !suppresses_default(&column.r#type)
    {
        sql.push_str(" DEFAULT ");
        sql.push_str(&rewrite_default_expr(&column.r#type, default));
    }
    Ok(sql)
}

fn enum_column_type(driver: &dyn DialectDriver, values: &[String]) -> String {
    let rendered = values
        .iter()
        .map(|v| driver.escape_string_literal(v))
        .collect::<Vec<_>>()
        .join(", ");
    format!("ENUM({rendered})")
}

/// `TEXT`/`BLOB` and their sized siblings (`TINYTEXT`, `MEDIUMBLOB`, ...)
/// cannot carry a literal `DEFAULT` clause before MySQL 8.0.13; omit it
/// unconditionally rather than branch on server version.
fn suppresses_default(raw_type: &str) -> bool {
    let lowered = raw_type.trim().to_ascii_lowercase();
    let base = lowered.split('(').next().unwrap_or(&lowered);
    matches!(
        base,
        "text" | "tinytext" | "mediumtext" | "longtext" | "blob" | "tinyblob" | "mediumblob" | "longblob"
    )
}

fn rewrite_default_expr(raw_type: &str, default: &str) -> String {
    let base = raw_type.trim().to_ascii_lowercase();
    let base = base.split('(').next().unwrap_or(&base);
    let lowered_default = default.trim().to_ascii_lowercase();

    if matches!(base, "boolean" | "bool") {
        match lowered_default.as_str() {
            "true" => return "1".to_string(),
            "false" => return "0".to_string(),
            _ => {}
        }
    }
    if lowered_default == "now()" {
        return "CURRENT_TIMESTAMP".to_string();
    }
    default.to_string()
}
