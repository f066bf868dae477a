//! Live-database introspection (C2). One query per concern against
//! `pg_catalog`/`information_schema`, each walked into the dialect-neutral
//! snapshot model. Query shapes are grounded in the same catalog joins a
//! `pg_dump`-style exporter uses, simplified to what a schema differ needs.

use std::collections::BTreeMap;

use viborm_migrate_core::error::Result;
use viborm_migrate_core::executor::DatabaseExecutor;
use viborm_migrate_core::introspect::{row_bool, row_opt_str, row_str, Introspector};
use viborm_migrate_core::snapshot::{
    ColumnDef, EnumDef, ForeignKeyAction, ForeignKeyDef, IndexDef, IndexType, PrimaryKeyDef, SchemaSnapshot, TableDef,
    UniqueConstraintDef,
};

use crate::PostgresDriver;

const TABLE_NAMES_QUERY: &str = r"
SELECT c.relname AS table_name
FROM pg_catalog.pg_class c
INNER JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid
WHERE n.nspname = 'public' AND c.relkind = 'r'
ORDER BY c.relname ASC;
";

const TABLE_COLUMNS_QUERY: &str = r"
SELECT
  a.attname AS column_name,
  pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
  NOT a.attnotnull AS nullable,
  pg_catalog.pg_get_expr(ad.adbin, ad.adrelid) AS default_expr
FROM pg_catalog.pg_attribute a
INNER JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
LEFT JOIN pg_catalog.pg_attrdef ad ON ad.adrelid = a.attrelid AND ad.adnum = a.attnum
WHERE c.relname = $1 AND a.attnum > 0 AND NOT a.attisdropped
ORDER BY a.attnum ASC;
";

const PRIMARY_KEY_QUERY: &str = r"
SELECT kcu.column_name
FROM information_schema.table_constraints tc
INNER JOIN information_schema.key_column_usage kcu
  ON kcu.constraint_name = tc.constraint_name AND kcu.table_name = tc.table_name
WHERE tc.table_name = $1 AND tc.constraint_type = 'PRIMARY KEY'
ORDER BY kcu.ordinal_position ASC;
";

const INDEXES_QUERY: &str = r"
SELECT
  ic.relname AS index_name,
  a.attname AS column_name,
  ix.indisunique AS is_unique,
  am.amname AS method
FROM pg_catalog.pg_index ix
INNER JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
INNER JOIN pg_catalog.pg_class ic ON ic.oid = ix.indexrelid
INNER JOIN pg_catalog.pg_am am ON am.oid = ic.relam
INNER JOIN unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ord) ON true
INNER JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
WHERE t.relname = $1 AND NOT ix.indisprimary
ORDER BY ic.relname ASC, k.ord ASC;
";

const FOREIGN_KEYS_QUERY: &str = r"
SELECT
  con.conname AS constraint_name,
  att.attname AS column_name,
  fat.attname AS referenced_column,
  ft.relname AS referenced_table,
  con.confdeltype AS on_delete,
  con.confupdtype AS on_update
FROM pg_catalog.pg_constraint con
INNER JOIN pg_catalog.pg_class t ON t.oid = con.conrelid
INNER JOIN pg_catalog.pg_class ft ON ft.oid = con.confrelid
INNER JOIN unnest(con.conkey) WITH ORDINALITY AS ck(attnum, ord) ON true
INNER JOIN unnest(con.confkey) WITH ORDINALITY AS fk(attnum, ord) ON fk.ord = ck.ord
INNER JOIN pg_catalog.pg_attribute att ON att.attrelid = t.oid AND att.attnum = ck.attnum
INNER JOIN pg_catalog.pg_attribute fat ON fat.attrelid = ft.oid AND fat.attnum = fk.attnum
WHERE t.relname = $1 AND con.contype = 'f'
ORDER BY con.conname ASC, ck.ord ASC;
";

const UNIQUE_CONSTRAINTS_QUERY: &str = r"
SELECT con.conname AS constraint_name, att.attname AS column_name
FROM pg_catalog.pg_constraint con
INNER JOIN pg_catalog.pg_class t ON t.oid = con.conrelid
INNER JOIN unnest(con.conkey) WITH ORDINALITY AS ck(attnum, ord) ON true
INNER JOIN pg_catalog.pg_attribute att ON att.attrelid = t.oid AND att.attnum = ck.attnum
WHERE t.relname = $1 AND con.contype = 'u'
ORDER BY con.conname ASC, ck.ord ASC;
";

const ENUMS_QUERY: &str = r"
SELECT t.typname AS enum_name, e.enumlabel AS value
FROM pg_catalog.pg_type t
INNER JOIN pg_catalog.pg_enum e ON e.enumtypid = t.oid
INNER JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
WHERE n.nspname = 'public'
ORDER BY t.typname ASC, e.enumsortorder ASC;
";

impl Introspector for PostgresDriver {
    fn introspect(&self, executor: &mut dyn DatabaseExecutor) -> Result<SchemaSnapshot> {
        let enums = introspect_enums(executor)?;
        let enum_names: std::collections::BTreeSet<&str> = enums.iter().map(|e| e.name.as_str()).collect();

        let table_names = executor
            .execute(TABLE_NAMES_QUERY, &[])?
            .rows
            .iter()
            .map(|row| row_str(row, "table_name").map(str::to_string))
            .collect::<Result<Vec<_>>>()?;

        let mut tables = Vec::with_capacity(table_names.len());
        for table_name in table_names {
            tables.push(introspect_table(executor, &table_name, &enum_names)?);
        }

        Ok(SchemaSnapshot::new(tables, enums))
    }
}

fn introspect_table(
    executor: &mut dyn DatabaseExecutor,
    table_name: &str,
    enum_names: &std::collections::BTreeSet<&str>,
) -> Result<TableDef> {
    let mut table = TableDef::new(table_name);

    let param = serde_json::Value::String(table_name.to_string());
    for row in executor.execute(TABLE_COLUMNS_QUERY, &[param.clone()])?.rows {
        let data_type = row_str(&row, "data_type")?.to_string();
        let nullable = row_bool(&row, "nullable");
        let mut column = ColumnDef::new(row_str(&row, "column_name")?, data_type.clone(), nullable);

        if enum_names.contains(data_type.as_str()) {
            column = column.with_enum_type(data_type);
        }

        if let Some(raw_default) = row_opt_str(&row, "default_expr") {
            if is_nextval_default(raw_default) {
                column.auto_increment = true;
            } else {
                column.default = Some(strip_type_cast(raw_default));
            }
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
    let mut order: Vec<String> = Vec::new();
    for row in rows {
        let name = row_str(&row, "index_name")?.to_string();
        let entry = by_name.entry(name.clone()).or_insert_with(|| {
            order.push(name.clone());
            IndexDef {
                name,
                columns: Vec::new(),
                unique: row_bool(&row, "is_unique"),
                index_type: row_opt_str(&row, "method").map(index_type_from_method),
                r#where: None,
            }
        });
        entry.columns.push(row_str(&row, "column_name")?.to_string());
    }
    Ok(order.into_iter().map(|name| by_name.remove(&name).expect("just inserted")).collect())
}

fn index_type_from_method(method: &str) -> IndexType {
    match method {
        "hash" => IndexType::Hash,
        "gin" => IndexType::Gin,
        "gist" => IndexType::Gist,
        _ => IndexType::Btree,
    }
}

fn group_foreign_keys(rows: Vec<serde_json::Value>) -> Result<Vec<ForeignKeyDef>> {
    let mut by_name: BTreeMap<String, ForeignKeyDef> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();
    for row in rows {
        let name = row_str(&row, "constraint_name")?.to_string();
        let entry = by_name.entry(name.clone()).or_insert_with(|| {
            order.push(name.clone());
            ForeignKeyDef {
                name,
                columns: Vec::new(),
                referenced_table: String::new(),
                referenced_columns: Vec::new(),
                on_delete: row_opt_str(&row, "on_delete").and_then(action_from_pg_char),
                on_update: row_opt_str(&row, "on_update").and_then(action_from_pg_char),
            }
        });
        entry.referenced_table = row_str(&row, "referenced_table")?.to_string();
        entry.columns.push(row_str(&row, "column_name")?.to_string());
        entry.referenced_columns.push(row_str(&row, "referenced_column")?.to_string());
    }
    Ok(order.into_iter().map(|name| by_name.remove(&name).expect("just inserted")).collect())
}

fn action_from_pg_char(raw: &str) -> Option<ForeignKeyAction> {
    match raw {
        "c" => Some(ForeignKeyAction::Cascade),
        "n" => Some(ForeignKeyAction::SetNull),
        "r" => Some(ForeignKeyAction::Restrict),
        "d" => Some(ForeignKeyAction::SetDefault),
        "a" => Some(ForeignKeyAction::NoAction),
        _ => None,
    }
}

fn group_unique_constraints(rows: Vec<serde_json::Value>) -> Result<Vec<UniqueConstraintDef>> {
    let mut by_name: BTreeMap<String, UniqueConstraintDef> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();
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

fn introspect_enums(executor: &mut dyn DatabaseExecutor) -> Result<Vec<EnumDef>> {
    let mut by_name: BTreeMap<String, EnumDef> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();
    for row in executor.execute(ENUMS_QUERY, &[])?.rows {
        let name = row_str(&row, "enum_name")?.to_string();
        let entry = by_name.entry(name.clone()).or_insert_with(|| {
            order.push(name.clone());
            EnumDef::new(name, Vec::new())
        });
        entry.values.push(row_str(&row, "value")?.to_string());
    }
    Ok(order.into_iter().map(|name| by_name.remove(&name).expect("just inserted")).collect())
}

/// `'active'::status_enum` -> `'active'`; leaves expressions without a cast
/// untouched.
fn strip_type_cast(expr: &str) -> String {
    expr.find("::").map_or_else(|| expr.to_string(), |index| expr[..index].to_string())
}

fn is_nextval_default(expr: &str) -> bool {
    expr.trim_start().to_ascii_lowercase().starts_with("nextval(")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_type_cast() {
        assert_eq!(strip_type_cast("'active'::status_enum"), "'active'");
        assert_eq!(strip_type_cast("now()"), "now()");
    }

    #[test]
    fn recognises_nextval_defaults() {
        assert!(is_nextval_default("nextval('users_id_seq'::regclass)"));
        assert!(!is_nextval_default("'active'::text"));
    }
}
