//! Shared DDL fragments used both for a plain `CREATE TABLE` and for the
//! scratch table a recreation builds.

use viborm_migrate_core::dialect::DialectDriver;
use viborm_migrate_core::error::{Error, Result};
use viborm_migrate_core::snapshot::{ColumnDef, IndexDef, SchemaSnapshot, TableDef};
use viborm_migrate_core::statement::Statement;

pub fn create_table_sql(
    driver: &dyn DialectDriver,
    rendered_name: &str,
    table: &TableDef,
    enum_context: &SchemaSnapshot,
) -> Result<String> {
    let q = |identifier: &str| driver.quote_identifier(identifier);
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|column| column_def_sql(driver, column, enum_context))
        .collect::<Result<_>>()?;

    if let Some(pk) = &table.primary_key {
        let columns = pk.columns.iter().map(|c| q(c)).collect::<Vec<_>>().join(", ");
        lines.push(format!("PRIMARY KEY ({columns})"));
    }

    for unique in &table.unique_constraints {
        let columns = unique.columns.iter().map(|c| q(c)).collect::<Vec<_>>().join(", ");
        lines.push(format!("CONSTRAINT {} UNIQUE ({columns})", q(&unique.name)));
    }

    for fk in &table.foreign_keys {
        let columns = fk.columns.iter().map(|c| q(c)).collect::<Vec<_>>().join(", ");
        let referenced_columns = fk
            .referenced_columns
            .iter()
            .map(|c| q(c))
            .collect::<Vec<_>>()
            .join(", ");
        let on_delete = fk
            .on_delete
            .map(|a| format!(" ON DELETE {}", a.as_sql()))
            .unwrap_or_default();
        let on_update = fk
            .on_update
            .map(|a| format!(" ON UPDATE {}", a.as_sql()))
            .unwrap_or_default();
        lines.push(format!(
            "CONSTRAINT {} FOREIGN KEY ({columns}) REFERENCES {} ({referenced_columns}){on_delete}{on_update}",
            q(&fk.name),
            q(&fk.referenced_table)
        ));
    }

    Ok(format!("CREATE TABLE {} (\n  {}\n)", q(rendered_name), lines.join(",\n  ")))
}

pub(crate) fn column_def_sql(driver: &dyn DialectDriver, column: &ColumnDef, enum_context: &SchemaSnapshot) -> Result<String> {
    let q = |identifier: &str| driver.quote_identifier(identifier);
    let type_sql = if column.auto_increment {
        "INTEGER".to_string()
    } else {
        column.r#type.clone()
    };
    let mut sql = format!("{} {type_sql}", q(&column.name));
    if column.auto_increment {
        sql.push_str(" PRIMARY KEY AUTOINCREMENT");
    }
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(default);
    }
    if let Some(enum_name) = &column.enum_type {
        let enum_def = enum_context
            .enum_def(enum_name)
            .ok_or_else(|| Error::internal(format!("unknown enum `{enum_name}` referenced by column `{}`", column.name)))?;
        let values = enum_def
            .values
            .iter()
            .map(|v| driver.escape_string_literal(v))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" CHECK ({} IN ({values}))", q(&column.name)));
    }
    Ok(sql)
}

pub fn create_index_sql(driver: &dyn DialectDriver, table: &str, index: &IndexDef) -> Result<Statement> {
    if let Some(index_type) = index.index_type
        && !driver.capabilities().supports_index_type(index_type)
    {
        return Err(Error::feature_not_supported(
            "sqlite",
            format!("index type `{}` is not supported", index_type.as_str()),
        ));
    }
    let q = |identifier: &str| driver.quote_identifier(identifier);
    let unique = if index.unique { "UNIQUE " } else { "" };
    let columns = index.columns.iter().map(|c| q(c)).collect::<Vec<_>>().join(", ");
    let where_clause = index
        .r#where
        .as_ref()
        .map(|w| format!(" WHERE {w}"))
        .unwrap_or_default();
    Ok(Statement::sql(format!(
        "CREATE {unique}INDEX {} ON {} ({columns}){where_clause}",
        q(&index.name),
        q(table)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteDriver;
    use viborm_migrate_core::snapshot::EnumDef;

    #[test]
    fn enum_column_renders_as_text_check() {
        let driver = SqliteDriver;
        let mut table = TableDef::new("users");
        table.columns.push(
            ColumnDef::new("status", "TEXT", false).with_enum_type("status"),
        );
        let enums = SchemaSnapshot::new(vec![], vec![EnumDef::new("status", vec!["active".into(), "inactive".into()])]);
        let sql = create_table_sql(&driver, "users", &table, &enums).unwrap();
        assert!(sql.contains(r#""status" TEXT NOT NULL CHECK ("status" IN ('active', 'inactive'))"#));
    }

    #[test]
    fn unsupported_index_type_is_rejected() {
        let driver = SqliteDriver;
        let index = IndexDef {
            name: "idx_status".into(),
            columns: vec!["status".into()],
            unique: false,
            index_type: Some(viborm_migrate_core::snapshot::IndexType::Gin),
            r#where: None,
        };
        let err = create_index_sql(&driver, "users", &index).unwrap_err();
        assert_eq!(err.code(), viborm_migrate_core::error::VibORMErrorCode::FeatureNotSupported);
    }

    #[test]
    fn auto_increment_column_becomes_integer_primary_key() {
        let driver = SqliteDriver;
        let mut table = TableDef::new("users");
        table
            .columns
            .push(ColumnDef::new("id", "integer", false).with_auto_increment());
        let sql = create_table_sql(&driver, "users", &table, &SchemaSnapshot::default()).unwrap();
        assert!(sql.contains(r#""id" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL"#));
    }
}
