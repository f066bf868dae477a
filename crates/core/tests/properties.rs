//! Cross-cutting properties that don't belong to any single module: rollback
//! must never touch unrelated data, escaping must round-trip, and the enum
//! literal parser must survive the characters SQL dialects actually put in
//! enum values.

use std::sync::Arc;

use viborm_migrate_core::config::MigrationConfig;
use viborm_migrate_core::dialect::{Capabilities, DialectDriver, DialectKind, GenerationContext};
use viborm_migrate_core::diffop::DiffOperation;
use viborm_migrate_core::error::Result;
use viborm_migrate_core::executor::{DatabaseExecutor, QueryResult};
use viborm_migrate_core::orchestrator::{always_add_and_drop, Orchestrator};
use viborm_migrate_core::parse_enum_literal_values;
use viborm_migrate_core::snapshot::{ColumnDef, IndexType, SchemaSnapshot, TableDef};
use viborm_migrate_core::statement::Statement;

struct EchoDriver;

impl DialectDriver for EchoDriver {
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
    fn generate(&self, operation: &DiffOperation, _context: &GenerationContext<'_>) -> Result<Vec<Statement>> {
        Ok(vec![Statement::sql(format!("-- {}", operation.tag()))])
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
        vec![Statement::sql(format!(
            "CREATE TABLE IF NOT EXISTS \"{table_name}\" (id INTEGER PRIMARY KEY, name TEXT UNIQUE, checksum TEXT, applied_at INTEGER)"
        ))]
    }
}

/// An in-memory executor that also holds rows for an unrelated `widgets`
/// table, so a rollback test can confirm it never gets touched.
struct TrackedExecutor {
    tracking_rows: Vec<serde_json::Value>,
    widgets: Vec<serde_json::Value>,
    next_id: u32,
}

impl DatabaseExecutor for TrackedExecutor {
    fn dialect(&self) -> DialectKind {
        DialectKind::Sqlite
    }
    fn driver_name(&self) -> &str {
        "memory"
    }
    fn supports_batch(&self) -> bool {
        false
    }
    fn supports_transactions(&self) -> bool {
        true
    }
    fn execute(&mut self, sql: &str, params: &[serde_json::Value]) -> Result<QueryResult> {
        if sql.starts_with("SELECT") {
            return Ok(QueryResult {
                rows: self.tracking_rows.clone(),
                row_count: Some(self.tracking_rows.len() as u64),
            });
        }
        if sql.starts_with("INSERT") {
            self.next_id += 1;
            let mut row = serde_json::Map::new();
            row.insert("id".into(), serde_json::Value::from(self.next_id));
            row.insert("name".into(), params[0].clone());
            row.insert("checksum".into(), params[1].clone());
            row.insert("applied_at".into(), params[2].clone());
            self.tracking_rows.push(serde_json::Value::Object(row));
        }
        if sql.starts_with("DELETE") {
            let name = params[0].as_str().unwrap_or_default().to_string();
            self.tracking_rows
                .retain(|row| row.get("name").and_then(|v| v.as_str()) != Some(name.as_str()));
        }
        Ok(QueryResult {
            rows: Vec::new(),
            row_count: Some(0),
        })
    }
    fn execute_batch(&mut self, _statements: &[String]) -> Result<()> {
        Ok(())
    }
    fn begin_transaction(&mut self) -> Result<()> {
        Ok(())
    }
    fn commit(&mut self) -> Result<()> {
        Ok(())
    }
    fn rollback(&mut self) -> Result<()> {
        Ok(())
    }
}

fn desired_snapshot() -> SchemaSnapshot {
    let mut table = TableDef::new("users");
    table.columns.push(ColumnDef::new("id", "integer", false));
    SchemaSnapshot::new(vec![table], vec![])
}

#[test]
fn rollback_removes_only_tracking_rows_and_leaves_other_data_alone() {
    let dir = tempfile::tempdir().unwrap();
    let config = MigrationConfig {
        migrations_dir: dir.path().to_path_buf(),
        ..MigrationConfig::default()
    };
    let orchestrator = Orchestrator::new(Arc::new(EchoDriver), config);
    let desired = desired_snapshot();
    orchestrator
        .generate(&SchemaSnapshot::default(), &desired, "init", &always_add_and_drop, 1)
        .unwrap();

    let mut executor = TrackedExecutor {
        tracking_rows: Vec::new(),
        widgets: vec![serde_json::json!({"id": 1, "label": "gadget"})],
        next_id: 0,
    };
    orchestrator.apply(&mut executor).unwrap();
    assert_eq!(executor.tracking_rows.len(), 1);

    let untouched_widgets = executor.widgets.clone();
    let removed = orchestrator.rollback(&mut executor, 1).unwrap();

    assert_eq!(removed.len(), 1);
    assert!(executor.tracking_rows.is_empty());
    assert_eq!(executor.widgets, untouched_widgets);
}

#[test]
fn escape_value_round_trips_through_the_dialects_own_quoting() {
    let driver = EchoDriver;
    for value in ["plain", "it's a test", "''already quoted''", "back\\slash"] {
        let escaped = driver.escape_string_literal(value);
        assert!(escaped.starts_with('\'') && escaped.ends_with('\''));
        let unescaped = escaped[1..escaped.len() - 1].replace("''", "'");
        assert_eq!(unescaped, value);
    }
}

#[test]
fn escape_identifier_round_trips_through_the_dialects_own_quoting() {
    let driver = EchoDriver;
    for identifier in ["users", "weird\"name", "has\"\"double\"\"quotes"] {
        let quoted = driver.quote_identifier(identifier);
        assert!(quoted.starts_with('"') && quoted.ends_with('"'));
        let unquoted = quoted[1..quoted.len() - 1].replace("\"\"", "\"");
        assert_eq!(unquoted, identifier);
    }
}

#[test]
fn enum_literal_parser_round_trips_commas_and_escaped_quotes() {
    let values = vec![
        "red,green".to_string(),
        "it's fine".to_string(),
        "already ''doubled''".to_string(),
        "back\\slash".to_string(),
    ];
    let literal = format!(
        "enum({})",
        values
            .iter()
            .map(|v| format!("'{}'", v.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(",")
    );
    assert_eq!(parse_enum_literal_values(&literal), values);
}
