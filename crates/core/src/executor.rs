//! The database executor contract (§6): the boundary between this crate and
//! whatever transport actually talks to a database. Implementations live
//! outside this crate (the `postgres`/`mysql`/`rusqlite`/`libsql` crates,
//! wired up by each dialect crate); this module only defines the shape.

use crate::dialect::DialectKind;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<serde_json::Value>,
    pub row_count: Option<u64>,
}

pub trait DatabaseExecutor: Send + Sync {
    fn dialect(&self) -> DialectKind;
    fn driver_name(&self) -> &str;
    fn supports_batch(&self) -> bool;
    fn supports_transactions(&self) -> bool;

    /// # Errors
    /// Returns [`crate::error::Error::Database`] on any driver-level failure.
    fn execute(&mut self, sql: &str, params: &[serde_json::Value]) -> Result<QueryResult>;

    /// Runs every statement as one atomic unit when [`Self::supports_batch`]
    /// is true; callers must not rely on atomicity otherwise.
    fn execute_batch(&mut self, statements: &[String]) -> Result<()>;

    fn begin_transaction(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
}

/// Splits a migration file's raw text into individual statements: splits on
/// `;\n` (or a trailing `;` at end of input), trims each piece, drops blank
/// and comment-only (`--`) lines, and re-appends the terminating `;`.
#[must_use]
pub fn split_statements(sql: &str) -> Vec<String> {
    sql.split(";\n")
        .flat_map(|chunk| chunk.split(';'))
        .map(strip_comment_lines)
        .filter(|statement| !statement.is_empty())
        .map(|statement| format!("{statement};"))
        .collect()
}

fn strip_comment_lines(chunk: &str) -> String {
    chunk
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
}
