//! A [`DatabaseExecutor`] backed by a real `rusqlite::Connection`.

use rusqlite::types::ValueRef;
use rusqlite::Connection;

use viborm_migrate_core::dialect::DialectKind;
use viborm_migrate_core::error::{Error, Result};
use viborm_migrate_core::executor::{DatabaseExecutor, QueryResult};

pub struct SqliteExecutor {
    conn: Connection,
}

impl SqliteExecutor {
    /// # Errors
    /// [`Error::Database`] if the file cannot be opened.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).map_err(Error::database)?;
        Ok(Self { conn })
    }

    #[must_use]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::database)?;
        Ok(Self { conn })
    }
}

impl DatabaseExecutor for SqliteExecutor {
    fn dialect(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn driver_name(&self) -> &str {
        "sqlite"
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn execute(&mut self, sql: &str, params: &[serde_json::Value]) -> Result<QueryResult> {
        let mut statement = self.conn.prepare(sql).map_err(Error::database)?;
        let bound: Vec<Box<dyn rusqlite::ToSql>> = params.iter().map(json_to_sql).collect();
        let refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(AsRef::as_ref).collect();

        if statement.column_count() > 0 {
            let column_names: Vec<String> = statement.column_names().iter().map(|s| (*s).to_string()).collect();
            let rows = statement
                .query_map(refs.as_slice(), |row| Ok(row_to_json(row, &column_names)))
                .map_err(Error::database)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(Error::database)?;
            let row_count = Some(rows.len() as u64);
            Ok(QueryResult { rows, row_count })
        } else {
            let affected = statement.execute(refs.as_slice()).map_err(Error::database)?;
            Ok(QueryResult {
                rows: Vec::new(),
                row_count: Some(affected as u64),
            })
        }
    }

    fn execute_batch(&mut self, statements: &[String]) -> Result<()> {
        for statement in statements {
            self.conn.execute_batch(statement).map_err(Error::database)?;
        }
        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN").map_err(Error::database)
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT").map_err(Error::database)
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK").map_err(Error::database)
    }
}

fn json_to_sql(value: &serde_json::Value) -> Box<dyn rusqlite::ToSql> {
    match value {
        serde_json::Value::Null => Box::new(Option::<i64>::None),
        serde_json::Value::Bool(b) => Box::new(i64::from(*b)),
        serde_json::Value::Number(n) if n.is_i64() => Box::new(n.as_i64().unwrap()),
        serde_json::Value::Number(n) => Box::new(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => Box::new(s.clone()),
        other => Box::new(other.to_string()),
    }
}

fn row_to_json(row: &rusqlite::Row<'_>, column_names: &[String]) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    for (index, name) in column_names.iter().enumerate() {
        let value = match row.get_ref(index) {
            Ok(ValueRef::Null) | Err(_) => serde_json::Value::Null,
            Ok(ValueRef::Integer(v)) => serde_json::Value::from(v),
            Ok(ValueRef::Real(v)) => serde_json::Value::from(v),
            Ok(ValueRef::Text(bytes)) => serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
            Ok(ValueRef::Blob(bytes)) => serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
        };
        object.insert(name.clone(), value);
    }
    serde_json::Value::Object(object)
}
