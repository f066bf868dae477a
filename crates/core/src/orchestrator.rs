//! The orchestrator (C10): the three top-level verbs (`generate`, `apply`,
//! `rollback`) plus `status`, wiring together the differ, resolver, sorter,
//! dialect driver, storage driver, and tracking layer.

use std::sync::Arc;

use crate::config::MigrationConfig;
use crate::dialect::DialectDriver;
use crate::diff::DiffEngine;
use crate::diffop::{AmbiguousChange, ChangeResolution, DiffOperation};
use crate::error::{Error, Result};
use crate::executor::{split_statements, DatabaseExecutor};
use crate::ordering::OperationSorter;
use crate::resolver::Resolver;
use crate::snapshot::SchemaSnapshot;
use crate::statement::Statement;
use crate::storage::{FilesystemStorage, MigrationEntry, MigrationJournal};
use crate::tracking::{self, AppliedRow};

pub const JOURNAL_FORMAT_VERSION: &str = "1";

/// Resolves each ambiguity the differ surfaced. The default
/// ([`always_add_and_drop`]) never silently renames.
pub type ResolverCallback<'a> = &'a dyn Fn(&[AmbiguousChange]) -> Result<Vec<ChangeResolution>>;

#[must_use]
pub fn always_rename(changes: &[AmbiguousChange]) -> Result<Vec<ChangeResolution>> {
    Ok(vec![ChangeResolution::Rename; changes.len()])
}

#[must_use]
pub fn always_add_and_drop(changes: &[AmbiguousChange]) -> Result<Vec<ChangeResolution>> {
    Ok(vec![ChangeResolution::AddAndDrop; changes.len()])
}

/// Refuses to guess: any ambiguity is a hard failure.
pub fn strict(changes: &[AmbiguousChange]) -> Result<Vec<ChangeResolution>> {
    if changes.is_empty() {
        Ok(Vec::new())
    } else {
        Err(Error::invalid_schema(format!(
            "{} ambiguous change(s) require an explicit resolution",
            changes.len()
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    NoChanges,
    Written(MigrationEntry),
    DryRun { sql: String, operations_count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplyOutcome {
    pub applied: Vec<MigrationEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusReport {
    pub applied: Vec<AppliedRow>,
    pub pending: Vec<MigrationEntry>,
}

pub struct Orchestrator {
    storage: FilesystemStorage,
    driver: Arc<dyn DialectDriver>,
    config: MigrationConfig,
}

impl Orchestrator {
    #[must_use]
    pub fn new(driver: Arc<dyn DialectDriver>, config: MigrationConfig) -> Self {
        let storage = FilesystemStorage::new(config.migrations_dir.clone());
        Self {
            storage,
            driver,
            config,
        }
    }

    fn lock_key(&self) -> String {
        format!("viborm_migration_{}", self.config.table_name)
    }

    /// The last snapshot `generate` wrote, or an empty schema if none exists
    /// yet. Callers diffing a declared schema against reality start here.
    ///
    /// # Errors
    /// Propagates filesystem and deserialization errors.
    pub fn current_snapshot(&self) -> Result<SchemaSnapshot> {
        self.storage.get_snapshot_or_empty()
    }

    /// Computes `current` (already-introspected) vs `desired`, resolves
    /// ambiguities via `resolver_callback`, sorts, renders, and (unless
    /// `dry_run`) writes a new migration file plus the updated journal and
    /// snapshot.
    ///
    /// # Errors
    /// [`Error::InvalidSchema`] from resolution, or any generation-time
    /// error from the dialect driver; propagated before any SQL executes.
    pub fn generate(
        &self,
        current: &SchemaSnapshot,
        desired: &SchemaSnapshot,
        name: &str,
        resolver_callback: ResolverCallback<'_>,
        now_millis: i64,
    ) -> Result<GenerateOutcome> {
        desired.validate()?;
        let outcome = DiffEngine::new().diff(current, desired);
        if outcome.operations.is_empty() && outcome.ambiguous_changes.is_empty() {
            return Ok(GenerateOutcome::NoChanges);
        }

        let resolutions = resolver_callback(&outcome.ambiguous_changes)?;
        let operations = Resolver::new().resolve(current, desired, outcome, &resolutions)?;
        let sorted = OperationSorter::new().sort(operations);

        let context = crate::dialect::GenerationContext { current, desired };
        let sql = render_migration_sql(self.driver.as_ref(), &sorted, &context)?;

        if self.config.dry_run {
            return Ok(GenerateOutcome::DryRun {
                sql,
                operations_count: sorted.len(),
            });
        }

        let mut journal = self
            .storage
            .get_or_create_journal(self.driver.kind(), JOURNAL_FORMAT_VERSION)?;
        let idx = u32::try_from(journal.entries.len())
            .map_err(|_| Error::internal("journal grew beyond u32::MAX entries"))?;
        let entry = MigrationEntry {
            idx,
            version: version_tag(now_millis, idx),
            name: name.to_string(),
            when: now_millis,
            checksum: tracking::compute_checksum(&sql),
        };

        self.storage.write_migration(&entry, &sql)?;
        journal.entries.push(entry.clone());
        self.storage.write_journal(&journal)?;
        self.storage.write_snapshot(desired)?;

        Ok(GenerateOutcome::Written(entry))
    }

    /// Applies every pending migration (journal entries not yet in the
    /// tracking table), in journal order, under the advisory lock. Stops at
    /// `opts.to` if set. On a failing migration, rolls back just that
    /// migration's transaction and stops; earlier applied migrations stay
    /// committed.
    ///
    /// # Errors
    /// [`Error::MigrationLockFailed`], [`Error::JournalDivergence`], or any
    /// execution error from `executor`.
    pub fn apply(&self, executor: &mut dyn DatabaseExecutor) -> Result<ApplyOutcome> {
        let journal = self
            .storage
            .get_or_create_journal(self.driver.kind(), JOURNAL_FORMAT_VERSION)?;
        let driver = Arc::clone(&self.driver);
        let table_name = self.config.table_name.clone();
        let to = self.config.to.clone();

        tracking::with_lock(driver.as_ref(), executor, &self.lock_key(), |executor| {
            tracking::ensure_tracking_table(driver.as_ref(), executor, &table_name)?;
            let applied = tracking::load_applied_rows(driver.as_ref(), executor, &table_name)?;
            tracking::verify_applied_prefix(&applied, &journal)?;

            let mut applied_entries = Vec::new();
            for entry in journal.entries.iter().skip(applied.len()) {
                let sql = self.storage.read_migration(entry)?.ok_or_else(|| {
                    Error::internal(format!("migration file for `{}` is missing", entry.name))
                })?;
                let checksum = tracking::compute_checksum(&sql);
                if checksum != entry.checksum {
                    return Err(Error::JournalDivergence {
                        message: format!(
                            "migration file for `{}` no longer matches the journal checksum",
                            entry.name
                        ),
                    });
                }

                executor.begin_transaction()?;
                match run_migration_statements(executor, &sql) {
                    Ok(()) => {}
                    Err(error) => {
                        let _ = executor.rollback();
                        return Err(error);
                    }
                }
                tracking::insert_applied_row(
                    driver.as_ref(),
                    executor,
                    &table_name,
                    &entry.name,
                    &entry.checksum,
                    entry.when,
                )?;
                executor.commit()?;
                applied_entries.push(entry.clone());

                if to.as_deref() == Some(entry.name.as_str()) {
                    break;
                }
            }

            Ok(ApplyOutcome {
                applied: applied_entries,
            })
        })
    }

    /// Removes the last `count` tracking rows without running down-SQL.
    ///
    /// # Errors
    /// Propagates execution failures; [`Error::InvalidInput`] if `count`
    /// exceeds the number of applied rows.
    pub fn rollback(&self, executor: &mut dyn DatabaseExecutor, count: u32) -> Result<Vec<AppliedRow>> {
        let driver = Arc::clone(&self.driver);
        let table_name = self.config.table_name.clone();

        tracking::with_lock(driver.as_ref(), executor, &self.lock_key(), |executor| {
            let mut applied = tracking::load_applied_rows(driver.as_ref(), executor, &table_name)?;
            if count as usize > applied.len() {
                return Err(Error::invalid_input(format!(
                    "cannot roll back {count} migration(s): only {} are applied",
                    applied.len()
                )));
            }
            let tail_start = applied.len() - count as usize;
            let removed: Vec<AppliedRow> = applied.split_off(tail_start);
            let names: Vec<String> = removed.iter().map(|row| row.name.clone()).collect();
            tracking::delete_applied_rows(driver.as_ref(), executor, &table_name, &names)?;
            Ok(removed)
        })
    }

    /// # Errors
    /// Propagates execution and journal-divergence errors.
    pub fn status(&self, executor: &mut dyn DatabaseExecutor) -> Result<StatusReport> {
        let journal = self
            .storage
            .get_or_create_journal(self.driver.kind(), JOURNAL_FORMAT_VERSION)?;
        tracking::ensure_tracking_table(self.driver.as_ref(), executor, &self.config.table_name)?;
        let applied =
            tracking::load_applied_rows(self.driver.as_ref(), executor, &self.config.table_name)?;
        tracking::verify_applied_prefix(&applied, &journal)?;
        let pending = journal.entries[applied.len()..].to_vec();
        Ok(StatusReport { applied, pending })
    }
}

fn version_tag(now_millis: i64, idx: u32) -> String {
    format!("{now_millis:020}_{idx:04}")
}

fn render_migration_sql(
    driver: &dyn DialectDriver,
    operations: &[DiffOperation],
    context: &crate::dialect::GenerationContext<'_>,
) -> Result<String> {
    let mut sql = String::new();
    for operation in operations {
        for statement in driver.generate(operation, context)? {
            match statement {
                Statement::Sql { sql: text, .. } => {
                    sql.push_str(&text);
                    if !text.trim_end().ends_with(';') {
                        sql.push(';');
                    }
                    sql.push('\n');
                }
                Statement::BatchBoundary => {}
            }
        }
    }
    Ok(sql)
}

fn run_migration_statements(executor: &mut dyn DatabaseExecutor, sql: &str) -> Result<()> {
    for statement in split_statements(sql) {
        executor.execute(&statement, &[])?;
    }
    Ok(())
}
