//! A [`DatabaseExecutor`] backed by a real `postgres::Client` connection.
//! Connection setup mirrors a plain libpq connection string; statement
//! dispatch is a thin SELECT/non-SELECT split since the orchestrator never
//! needs anything richer than "rows back" or "rows affected".

use postgres::types::{ToSql, Type};
use postgres::{Client, NoTls, Row};

use viborm_migrate_core::dialect::DialectKind;
use viborm_migrate_core::error::{Error, Result};
use viborm_migrate_core::executor::{DatabaseExecutor, QueryResult};

pub struct PostgresExecutor {
    client: Client,
    in_transaction: bool,
}

impl PostgresExecutor {
    /// # Errors
    /// [`Error::Database`] if the connection cannot be established.
    pub fn connect(connection_string: &str) -> Result<Self> {
        let client = Client::connect(connection_string, NoTls).map_err(Error::database)?;
        Ok(Self {
            client,
            in_transaction: false,
        })
    }
}

impl DatabaseExecutor for PostgresExecutor {
    fn dialect(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn driver_name(&self) -> &str {
        "postgres"
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn execute(&mut self, sql: &str, params: &[serde_json::Value]) -> Result<QueryResult> {
        let bound: Vec<Box<dyn ToSql + Sync>> = params.iter().map(json_to_sql).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(AsRef::as_ref).collect();

        if is_select(sql) {
            let rows = self.client.query(sql, &refs).map_err(Error::database)?;
            let row_count = Some(rows.len() as u64);
            let rows = rows.iter().map(row_to_json).collect();
            Ok(QueryResult { rows, row_count })
        } else {
            let affected = self.client.execute(sql, &refs).map_err(Error::database)?;
            Ok(QueryResult {
                rows: Vec::new(),
                row_count: Some(affected),
            })
        }
    }

    fn execute_batch(&mut self, statements: &[String]) -> Result<()> {
        self.client.batch_execute(&statements.join("\n")).map_err(Error::database)
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.client.batch_execute("BEGIN").map_err(Error::database)?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.client.batch_execute("COMMIT").map_err(Error::database)?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").map_err(Error::database)?;
        self.in_transaction = false;
        Ok(())
    }
}

fn is_select(sql: &str) -> bool {
    sql.trim_start().get(..6).is_some_and(|prefix| prefix.eq_ignore_ascii_case("select"))
        || sql.trim_start().get(..4).is_some_and(|prefix| prefix.eq_ignore_ascii_case("show"))
}

fn json_to_sql(value: &serde_json::Value) -> Box<dyn ToSql + Sync> {
    match value {
        serde_json::Value::Null => Box::new(Option::<String>::None),
        serde_json::Value::Bool(b) => Box::new(*b),
        serde_json::Value::Number(n) if n.is_i64() => Box::new(n.as_i64().unwrap()),
        serde_json::Value::Number(n) => Box::new(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => Box::new(s.clone()),
        other => Box::new(other.to_string()),
    }
}

/// Converts one catalog/tracking-table row into a JSON object, matching on
/// the column's Postgres type to pick the right Rust extraction. Columns
/// outside this narrow set (text, boolean, integer, timestamp) fall back to
/// a text cast, which covers every query this crate actually issues.
fn row_to_json(row: &Row) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = match *column.type_() {
            Type::BOOL => row.get::<_, Option<bool>>(index).map(serde_json::Value::from),
            Type::INT2 => row.get::<_, Option<i16>>(index).map(|v| serde_json::Value::from(i64::from(v))),
            Type::INT4 => row.get::<_, Option<i32>>(index).map(|v| serde_json::Value::from(i64::from(v))),
            Type::INT8 => row.get::<_, Option<i64>>(index).map(serde_json::Value::from),
            _ => row.get::<_, Option<String>>(index).map(serde_json::Value::from),
        };
        object.insert(column.name().to_string(), value.unwrap_or(serde_json::Value::Null));
    }
    serde_json::Value::Object(object)
}
