//! The tracking & lock layer (C9): the applied-migrations table, checksums,
//! and the cross-process advisory lock.

use sha2::{Digest, Sha256};

use crate::dialect::DialectDriver;
use crate::error::{Error, Result};
use crate::executor::DatabaseExecutor;
use crate::statement::Statement;
use crate::storage::MigrationJournal;

pub const DEFAULT_TRACKING_TABLE: &str = "_viborm_migrations";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRow {
    pub id: u32,
    pub name: String,
    pub checksum: String,
    pub applied_at: i64,
}

/// A stable hash of a migration file's contents, stored in both the journal
/// and the tracking row. Must be stable across runs and platforms.
#[must_use]
pub fn compute_checksum(contents: &str) -> String {
    let digest = Sha256::digest(contents.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Checks the §4.9 applied-set invariant: the applied rows, in `id` order,
/// must equal a strict prefix of the journal's entries (by name), and every
/// applied row's checksum must match its journal entry.
///
/// # Errors
/// [`Error::JournalDivergence`] on any mismatch.
pub fn verify_applied_prefix(applied: &[AppliedRow], journal: &MigrationJournal) -> Result<()> {
    if applied.len() > journal.entries.len() {
        return Err(Error::JournalDivergence {
            message: format!(
                "tracking table has {} applied row(s) but the journal only has {} entry(ies)",
                applied.len(),
                journal.entries.len()
            ),
        });
    }
    for (position, row) in applied.iter().enumerate() {
        let entry = &journal.entries[position];
        if row.name != entry.name {
            return Err(Error::JournalDivergence {
                message: format!(
                    "applied row at position {position} is `{}`, journal expects `{}`",
                    row.name, entry.name
                ),
            });
        }
        if row.checksum != entry.checksum {
            return Err(Error::JournalDivergence {
                message: format!(
                    "checksum mismatch for applied migration `{}`: tracking table has `{}`, journal has `{}`",
                    row.name, row.checksum, entry.checksum
                ),
            });
        }
    }
    Ok(())
}

/// Ensures the tracking table exists (`CREATE TABLE IF NOT EXISTS`
/// equivalent, rendered by the dialect driver).
///
/// # Errors
/// Propagates execution failures from `executor`.
pub fn ensure_tracking_table(
    driver: &dyn DialectDriver,
    executor: &mut dyn DatabaseExecutor,
    table_name: &str,
) -> Result<()> {
    for statement in driver.tracking_table_statements(table_name) {
        run_statement(executor, &statement)?;
    }
    Ok(())
}

/// Acquires the dialect's advisory lock (if any), runs `body`, then releases
/// the lock. Release failures are swallowed per spec (a dropped connection
/// releases the lock regardless).
///
/// # Errors
/// [`Error::MigrationLockFailed`] if acquisition fails; otherwise whatever
/// `body` returns.
pub fn with_lock<T>(
    driver: &dyn DialectDriver,
    executor: &mut dyn DatabaseExecutor,
    lock_key: &str,
    body: impl FnOnce(&mut dyn DatabaseExecutor) -> Result<T>,
) -> Result<T> {
    let Some((acquire, release)) = driver.advisory_lock_statements(lock_key) else {
        return body(executor);
    };

    run_statement(executor, &acquire).map_err(|source| Error::MigrationLockFailed {
        message: source.to_string(),
    })?;

    let result = body(executor);
    let _ = run_statement(executor, &release);
    result
}

fn run_statement(executor: &mut dyn DatabaseExecutor, statement: &Statement) -> Result<()> {
    match statement {
        Statement::Sql { sql, .. } => {
            executor.execute(sql, &[])?;
            Ok(())
        }
        Statement::BatchBoundary => Ok(()),
    }
}

/// # Errors
/// Propagates execution failures, or [`Error::Internal`] if a returned row
/// is missing one of the expected tracking-table columns.
pub fn load_applied_rows(
    driver: &dyn DialectDriver,
    executor: &mut dyn DatabaseExecutor,
    table_name: &str,
) -> Result<Vec<AppliedRow>> {
    let sql = format!(
        "SELECT id, name, checksum, applied_at FROM {} ORDER BY id",
        driver.quote_identifier(table_name)
    );
    let result = executor.execute(&sql, &[])?;
    result.rows.iter().map(parse_applied_row).collect()
}

fn parse_applied_row(row: &serde_json::Value) -> Result<AppliedRow> {
    let field = |name: &str| {
        row.get(name)
            .ok_or_else(|| Error::internal(format!("tracking row missing `{name}` column")))
    };
    Ok(AppliedRow {
        id: field("id")?
            .as_u64()
            .ok_or_else(|| Error::internal("tracking row `id` is not an integer"))? as u32,
        name: field("name")?
            .as_str()
            .ok_or_else(|| Error::internal("tracking row `name` is not a string"))?
            .to_string(),
        checksum: field("checksum")?
            .as_str()
            .ok_or_else(|| Error::internal("tracking row `checksum` is not a string"))?
            .to_string(),
        applied_at: field("applied_at")?
            .as_i64()
            .ok_or_else(|| Error::internal("tracking row `applied_at` is not an integer"))?,
    })
}

/// # Errors
/// Propagates execution failures from `executor`.
pub fn insert_applied_row(
    driver: &dyn DialectDriver,
    executor: &mut dyn DatabaseExecutor,
    table_name: &str,
    name: &str,
    checksum: &str,
    applied_at_millis: i64,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (name, checksum, applied_at) VALUES ({}, {}, {})",
        driver.quote_identifier(table_name),
        driver.placeholder(1),
        driver.placeholder(2),
        driver.placeholder(3),
    );
    executor.execute(
        &sql,
        &[
            serde_json::Value::String(name.to_string()),
            serde_json::Value::String(checksum.to_string()),
            serde_json::Value::from(applied_at_millis),
        ],
    )?;
    Ok(())
}

/// Removes the given tracking rows by name (used by `rollback`).
///
/// # Errors
/// Propagates execution failures from `executor`.
pub fn delete_applied_rows(
    driver: &dyn DialectDriver,
    executor: &mut dyn DatabaseExecutor,
    table_name: &str,
    names: &[String],
) -> Result<()> {
    for name in names {
        let sql = format!(
            "DELETE FROM {} WHERE name = {}",
            driver.quote_identifier(table_name),
            driver.placeholder(1),
        );
        executor.execute(&sql, &[serde_json::Value::String(name.clone())])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Capabilities, DialectKind};
    use crate::diffop::DiffOperation;
    use crate::executor::QueryResult;
    use crate::storage::MigrationEntry;

    #[test]
    fn checksum_is_deterministic() {
        assert_eq!(compute_checksum("abc"), compute_checksum("abc"));
        assert_ne!(compute_checksum("abc"), compute_checksum("abd"));
    }

    fn journal_with(names: &[&str]) -> MigrationJournal {
        let mut journal = MigrationJournal::new("1", DialectKind::Postgres);
        for (idx, name) in names.iter().enumerate() {
            journal.entries.push(MigrationEntry {
                idx: idx as u32,
                version: format!("v{idx}"),
                name: (*name).to_string(),
                when: 0,
                checksum: compute_checksum(name),
            });
        }
        journal
    }

    #[test]
    fn empty_applied_set_is_a_valid_prefix() {
        let journal = journal_with(&["m0", "m1"]);
        assert!(verify_applied_prefix(&[], &journal).is_ok());
    }

    #[test]
    fn full_prefix_is_valid() {
        let journal = journal_with(&["m0", "m1"]);
        let applied = vec![
            AppliedRow {
                id: 1,
                name: "m0".into(),
                checksum: compute_checksum("m0"),
                applied_at: 0,
            },
            AppliedRow {
                id: 2,
                name: "m1".into(),
                checksum: compute_checksum("m1"),
                applied_at: 0,
            },
        ];
        assert!(verify_applied_prefix(&applied, &journal).is_ok());
    }

    #[test]
    fn checksum_mismatch_is_divergence() {
        let journal = journal_with(&["m0"]);
        let applied = vec![AppliedRow {
            id: 1,
            name: "m0".into(),
            checksum: "tampered".into(),
            applied_at: 0,
        }];
        let err = verify_applied_prefix(&applied, &journal).unwrap_err();
        assert_eq!(err.code(), crate::error::VibORMErrorCode::JournalDivergence);
    }

    #[test]
    fn unknown_applied_name_is_divergence() {
        let journal = journal_with(&["m0"]);
        let applied = vec![AppliedRow {
            id: 1,
            name: "ghost".into(),
            checksum: compute_checksum("ghost"),
            applied_at: 0,
        }];
        assert!(verify_applied_prefix(&applied, &journal).is_err());
    }

    struct StubDriver {
        lock: Option<(Statement, Statement)>,
    }

    impl DialectDriver for StubDriver {
        fn kind(&self) -> DialectKind {
            DialectKind::Postgres
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                supports_native_enums: true,
                supports_add_enum_value_in_transaction: true,
                supported_index_types: vec![crate::snapshot::IndexType::Btree],
                supports_native_arrays: true,
                supports_advisory_lock: self.lock.is_some(),
            }
        }
        fn generate(&self, _operation: &DiffOperation, _context: &crate::dialect::GenerationContext<'_>) -> Result<Vec<Statement>> {
            Ok(Vec::new())
        }
        fn quote_identifier(&self, identifier: &str) -> String {
            format!("\"{identifier}\"")
        }
        fn escape_string_literal(&self, value: &str) -> String {
            format!("'{}'", value.replace('\'', "''"))
        }
        fn placeholder(&self, index: usize) -> String {
            format!("${index}")
        }
        fn advisory_lock_statements(&self, _lock_key: &str) -> Option<(Statement, Statement)> {
            self.lock.clone()
        }
        fn tracking_table_statements(&self, _table_name: &str) -> Vec<Statement> {
            Vec::new()
        }
    }

    struct StubExecutor {
        executed: Vec<String>,
        fail_on: Option<String>,
    }

    impl DatabaseExecutor for StubExecutor {
        fn dialect(&self) -> DialectKind {
            DialectKind::Postgres
        }
        fn driver_name(&self) -> &str {
            "stub"
        }
        fn supports_batch(&self) -> bool {
            false
        }
        fn supports_transactions(&self) -> bool {
            true
        }
        fn execute(&mut self, sql: &str, _params: &[serde_json::Value]) -> Result<QueryResult> {
            if self.fail_on.as_deref() == Some(sql) {
                return Err(Error::database(std::io::Error::other("boom")));
            }
            self.executed.push(sql.to_string());
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

    #[test]
    fn with_lock_runs_body_between_acquire_and_release() {
        let driver = StubDriver {
            lock: Some((
                Statement::sql("SELECT pg_advisory_lock(1)"),
                Statement::sql("SELECT pg_advisory_unlock(1)"),
            )),
        };
        let mut executor = StubExecutor {
            executed: Vec::new(),
            fail_on: None,
        };
        with_lock(&driver, &mut executor, "1", |_executor| Ok(())).unwrap();
        assert_eq!(
            executor.executed,
            vec!["SELECT pg_advisory_lock(1)", "SELECT pg_advisory_unlock(1)"]
        );
    }

    #[test]
    fn lock_acquisition_failure_is_reported() {
        let driver = StubDriver {
            lock: Some((
                Statement::sql("SELECT pg_advisory_lock(1)"),
                Statement::sql("SELECT pg_advisory_unlock(1)"),
            )),
        };
        let mut executor = StubExecutor {
            executed: Vec::new(),
            fail_on: Some("SELECT pg_advisory_lock(1)".to_string()),
        };
        let err = with_lock(&driver, &mut executor, "1", |_executor| Ok(())).unwrap_err();
        assert_eq!(err.code(), crate::error::VibORMErrorCode::MigrationLockFailed);
    }

    #[test]
    fn no_lock_statements_runs_body_directly() {
        let driver = StubDriver { lock: None };
        let mut executor = StubExecutor {
            executed: Vec::new(),
            fail_on: None,
        };
        with_lock(&driver, &mut executor, "1", |_executor| Ok(42)).unwrap();
        assert!(executor.executed.is_empty());
    }
}
