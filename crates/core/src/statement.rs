//! The unit of work a dialect driver hands back to the executor (C8).

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// A single SQL statement. `transactional` is `false` for statements a
    /// database refuses to run inside a transaction block (Postgres's
    /// `ALTER TYPE ... ADD VALUE` outside a few recent versions, MySQL DDL
    /// under certain storage engines) — the executor flushes the current
    /// transaction before issuing it and opens a fresh one after.
    Sql { sql: String, transactional: bool },
    /// Forces the executor to commit whatever has run so far and start a new
    /// transaction before continuing, without a statement of its own.
    BatchBoundary,
}

impl Statement {
    #[must_use]
    pub fn sql(sql: impl Into<String>) -> Self {
        Self::Sql {
            sql: sql.into(),
            transactional: true,
        }
    }

    #[must_use]
    pub fn non_transactional_sql(sql: impl Into<String>) -> Self {
        Self::Sql {
            sql: sql.into(),
            transactional: false,
        }
    }
}
