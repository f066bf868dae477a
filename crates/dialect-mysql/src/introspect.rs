//! Live-database introspection (C2): `information_schema` queries against
//! the connected database/schema. MySQL has no first-class enum catalog —
//! enum columns carry their value list inline in `COLUMN_TYPE`
//! (`enum('a','b')`), recovered with [`parse_enum_literal_values`].

use std::collections::BTreeMap;

use viborm_migrate_core::enum_parser::parse_enum_literal_values;
use viborm_migrate_core::error::Result;
use viborm_migrate_core::executor::DatabaseExecutor;
use viborm_migrate_core::introspect::{row_bool, row_opt_str, row_str, Introspector};
use viborm_migrate_core::snapshot::{
    ColumnDef, EnumDef, ForeignKeyAction, ForeignKeyDef, IndexDef, IndexType, PrimaryKeyDef, SchemaSnapshot, TableDef,
    UniqueConstraintDef,
};

use crate::MySqlDriver;

const TABLE_NAMES_QUERY: &str = "SELECT TABLE_NAME AS table_name FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME";

const COLUMNS_QUERY: &str = "SELECT COLUMN_NAME AS column_name, COLUMN_TYPE AS column_type, \
     IS_NULLABLE AS is_nullable, COLUMN_DEFAULT AS column_default, EXTRA AS extra \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION";

const PRIMARY_KEY_QUERY: &str = "SELECT COLUMN_NAME AS column_name FROM information_schema.KEY_COLUMN_USAGE \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY' \
     ORDER BY ORDINAL_POSITION";

const INDEXES_QUERY: &str = "SELECT INDEX_NAME AS index_name, COLUMN_NAME AS column_name, \
     NOT NON_UNIQUE AS is_unique, INDEX_TYPE AS index_type \
     FROM information_schema.STATISTICS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND INDEX_NAME <> 'PRIMARY' \
     ORDER BY INDEX_NAME, SEQ_IN_INDEX";

const FOREIGN_KEYS_QUERY: &str = "SELECT kcu.CONSTRAINT_NAME AS constraint_name, kcu.COLUMN_NAME AS column_name, \
     kcu.REFERENCED_TABLE_NAME AS referenced_table, kcu.REFERENCED_COLUMN_NAME AS referenced_column, \
     rc.DELETE_RULE AS on_delete, rc.UPDATE_RULE AS on_update \
     FROM information_schema.KEY_COLUMN_USAGE kcu \
     INNER JOIN information_schema.REFERENTIAL_CONSTRAINTS rc \
       ON rc.CONSTRAINT_SCHEMA = kcu.TABLE_SCHEMA AND rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
     WHERE kcu.TABLE_SCHEMA = DATABASE() AND kcu.TABLE_NAME = ? AND kcu.REFERENCED_TABLE_NAME IS NOT NULL \
     ORDER BY kcu.CONSTRAINT_NAME, kcu.ORDINAL_POSITION";

const UNIQUE_CONSTRAINTS_QUERY: &str = "SELECT kcu.CONSTRAINT_NAME AS constraint_name, kcu.COLUMN_NAME AS column_name \
     FROM information_schema.TABLE_CONSTRAINTS tc \
     INNER JOIN information_schema.KEY_COLUMN_USAGE kcu \
       ON kcu.TABLE_SCHEMA = tc.TABLE_SCHEMA AND kcu.TABLE_NAME = tc.TABLE_NAME AND kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME \
     WHERE tc.TABLE_SCHEMA = DATABASE() AND tc.TABLE_NAME = ? AND tc.CONSTRAINT_TYPE = 'UNIQUE' \
     ORDER BY kcu.CONSTRAINT_NAME, kcu.ORDINAL_POSITION";

impl Introspector for MySqlDriver {
    fn introspect(&self, executor: &mut dyn DatabaseExecutor) -> Result<SchemaSnapshot> {
        let table_names: Vec<String> = executor
            .execute(TABLE_NAMES_QUERY, &[])?
            .rows
            .iter()
            .map(|row| row_str(row, "table_name").map(str::to_string))
            .collect::<Result<Vec<_>>>()?;

        let mut tables = Vec::with_capacity(table_names.len());
        let mut enums: BTreeMap<String, EnumDef> = BTreeMap::new();
        for table_name in table_names {
            tables.push(introspect_table(executor, &table_name, &mut enums)?);
        }

        Ok(SchemaSnapshot::new(tables, enums.into_values().collect()))
    }
}

fn introspect_table(
    executor: &mut dyn DatabaseExecutor,
    table_name: &str,
    enums: &mut BTreeMap<String, EnumDef>,
) -> Result<TableDef> {
    let mut table = TableDef::new(table_name);
    let param = serde_json::Value::String(table_name.to_string());

    for row in executor.execute(COLUMNS_QUERY, &[param.clone()])?.rows {
        let column_type = row_str(&row, "column_type")?.to_string();
        let nullable = row_opt_str(&row, "is_nullable") == Some("YES");
        let extra = row_opt_str(&row, "extra").unwrap_or_default();
        let mut column = ColumnDef::new(row_str(&row, "column_name")?, column_type.clone(), nullable);

        if extra.to_ascii_lowercase().contains("auto_increment") {
            column.auto_increment = true;
        }
        if let Some(default) = row_opt_str(&row, "column_default") {
            column.default = Some(default.to_string());
        }

        if column_type.to_ascii_lowercase().starts_with("enum(") {
            let values = parse_enum_literal_values(&column_type);
            let enum_name = format!("{table_name}_{}", column.name);
            column = column.with_enum_type(enum_name.clone());
            enums.entry(enum_name.clone()).or_insert_with(|| EnumDef::new(enum_name, values));
        }

        table.columns.push(column);
    }

    let pk_columns: Vec<String> = executor
        .execute(PRIMARY_KEY_QUERY, &[param.clone()])?
        .rows
        .iter()
        .map(|row| row_str(row, "column_name").map(str::to_string))
        .collect::<Result<Vec<_>>>()?;
    if !pk_columns.is_empty() {
        table.primary_key = Some(PrimaryKeyDef {
            columns: pk_columns,
            name: None,
        });
    }

    table.indexes = group_indexes(executor.execute(INDEXES_QUERY, &[param.clone()])?.rows)?;
    table.foreign_keys = group_foreign_keys(executor.execute(FOREIGN_KEYS_QUERY, &[param.clone()])?.rows)?;
    table.unique_constraints = group_unique_constraints(executor.execute(UNIQUE_CONSTRAINTS_QUERY, &[param])?.rows)?;

    Ok(table)
}

fn group_indexes(rows: Vec<serde_json::Value>) -> Result<Vec<IndexDef>> {
    let mut by_name: BTreeMap<String, IndexDef> = BTreeMap::new();
    let mut order = Vec::new();
    for row in rows {
        let name = row_str(&row, "index_name")?.to_string();
        let entry = by_name.entry(name.clone()).or_insert_with(|| {
            order.push(name.clone());
            IndexDef {
                name,
                columns: Vec::new(),
                unique: row_bool(&row, "is_unique"),
                index_type: row_opt_str(&row, "index_type").map(index_type_from_mysql),
                r#where: None,
            }
        });
        entry.columns.push(row_str(&row, "column_name")?.to_string());
    }
    Ok(order.into_iter().map(|name| by_name.remove(&name).expect("just inserted")).collect())
}

fn index_type_from_mysql(raw: &str) -> IndexType {
    match raw.to_ascii_uppercase().as_str() {
        "HASH" => IndexType::Hash,
        "FULLTEXT" => IndexType::Fulltext,
        "SPATIAL" => IndexType::Spatial,
        _ => IndexType::Btree,
    }
}

fn group_foreign_keys(rows: Vec<serde_json::Value>) -> Result<Vec<ForeignKeyDef>> {
    let mut by_name: BTreeMap<String, ForeignKeyDef> = BTreeMap::new();
    let mut order = Vec::new();
    for row in rows {
        let name = row_str(&row, "constraint_name")?.to_string();
        let entry = by_name.entry(name.clone()).or_insert_with(|| {
            order.push(name.clone());
            ForeignKeyDef {
                name,
                columns: Vec::new(),
                referenced_table: String::new(),
                referenced_columns: Vec::new(),
                on_delete: row_opt_str(&row, "on_delete").and_then(action_from_rule),
                on_update: row_opt_str(&row, "on_update").and_then(action_from_rule),
            }
        });
        entry.referenced_table = row_str(&row, "referenced_table")?.to_string();
        entry.columns.push(row_str(&row, "column_name")?.to_string());
        entry.referenced_columns.push(row_str(&row, "referenced_column")?.to_string());
    }
    Ok(order.into_iter().map(|name| by_name.remove(&name).expect("just inserted")).collect())
}

fn action_from_rule(raw: &str) -> Option<ForeignKeyAction> {
    match raw.to_ascii_uppercase().as_str() {
        "CASCADE" => Some(ForeignKeyAction::Cascade),
        "SET NULL" => Some(ForeignKeyAction::SetNull),
        "RESTRICT" => Some(ForeignKeyAction::Restrict),
        "SET DEFAULT" => Some(ForeignKeyAction::SetDefault),
        "NO ACTION" => Some(ForeignKeyAction::NoAction),
        _ => None,
    }
}

fn group_unique_constraints(rows: Vec<serde_json::Value>) -> Result<Vec<UniqueConstraintDef>> {
    let mut by_name: BTreeMap<String, UniqueConstraintDef> = BTreeMap::new();
    let mut order = Vec::new();
    for row in rows {
        let name = row_str(&row, "constraint_name")?.to_string();
        let entry = by_name.entry(name.clone()).or_insert_with(|| {
            order.push(name.clone());
            UniqueConstraintDef {
                name,
                columns: Vec::new(),
            }
        });
        entry.columns.push(row_str(&row, "column_name")?.to_string());
    }
    Ok(order.into_iter().map(|name| by_name.remove(&name).expect("just inserted")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_type_mapping_recognises_mysql_spellings() {
        assert_eq!(index_type_from_mysql("FULLTEXT"), IndexType::Fulltext);
        assert_eq!(index_type_from_mysql("BTREE"), IndexType::Btree);
    }

    #[test]
    fn referential_action_mapping_is_case_insensitive() {
        assert_eq!(action_from_rule("cascade"), Some(ForeignKeyAction::Cascade));
        assert_eq!(action_from_rule("NO ACTION"), Some(ForeignKeyAction::NoAction));
    }
}
