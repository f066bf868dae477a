//! A [`DatabaseExecutor`] backed by a real `mysql::Conn` connection.

use mysql::prelude::Queryable;
use mysql::{Conn, Opts, Value as MySqlValue};

use viborm_migrate_core::dialect::DialectKind;
use viborm_migrate_core::error::{Error, Result};
use viborm_migrate_core::executor::{DatabaseExecutor, QueryResult};

pub struct MySqlExecutor {
    conn: Conn,
}

impl MySqlExecutor {
    /// # Errors
    /// [`Error::Database`] if the connection cannot be established.
    pub fn connect(url: &str) -> Result<Self> {
        let opts = Opts::from_url(url).map_err(Error::database)?;
        let conn = Conn::new(opts).map_err(Error::database)?;
        Ok(Self { conn })
    }
}

impl DatabaseExecutor for MySqlExecutor {
    fn dialect(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn driver_name(&self) -> &str {
        "mysql"
    }

    fn supports_batch(&self) -> bool {
        false
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn execute(&mut self, sql: &str, params: &[serde_json::Value]) -> Result<QueryResult> {
        let bound: Vec<MySqlValue> = params.iter().map(json_to_mysql).collect();
        let rows: Vec<mysql::Row> = self.conn.exec(sql, bound).map_err(Error::database)?;
        let row_count = Some(rows.len() as u64);
        let rows = rows.iter().map(row_to_json).collect();
        Ok(QueryResult { rows, row_count })
    }

    fn execute_batch(&mut self, statements: &[String]) -> Result<()> {
        for statement in statements {
            self.conn.query_drop(statement).map_err(Error::database)?;
        }
        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.conn.query_drop("START TRANSACTION").map_err(Error::database)
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.query_drop("COMMIT").map_err(Error::database)
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.query_drop("ROLLBACK").map_err(Error::database)
    }
}

fn json_to_mysql(value: &serde_json::Value) -> MySqlValue {
    match value {
        serde_json::Value::Null => MySqlValue::NULL,
        serde_json::Value::Bool(b) => MySqlValue::Int(i64::from(*b)),
        serde_json::Value::Number(n) if n.is_i64() => MySqlValue::Int(n.as_i64().unwrap()),
        serde_json::Value::Number(n) => MySqlValue::Double(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => MySqlValue::Bytes(s.clone().into_bytes()),
        other => MySqlValue::Bytes(other.to_string().into_bytes()),
    }
}

fn row_to_json(row: &mysql::Row) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    for (index, column) in row.columns_ref().iter().enumerate() {
        let value = match row.as_ref(index) {
            None | Some(MySqlValue::NULL) => serde_json::Value::Null,
            Some(MySqlValue::Int(v)) => serde_json::Value::from(*v),
            Some(MySqlValue::UInt(v)) => serde_json::Value::from(*v),
            Some(MySqlValue::Float(v)) => serde_json::Value::from(f64::from(*v)),
            Some(MySqlValue::Double(v)) => serde_json::Value::from(*v),
            Some(MySqlValue::Bytes(bytes)) => serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
            Some(other) => serde_json::Value::String(format!("{other:?}")),
        };
        object.insert(column.name_str().into_owned(), value);
    }
    serde_json::Value::Object(object)
}
