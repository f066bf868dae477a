//! Table recreation: SQLite's universal fallback for every structural
//! change it can't express natively (`ALTER COLUMN`, FK/PK modification,
//! table-level unique constraints, CHECK rewrites for emulated enums).

use viborm_migrate_core::dialect::{DialectDriver, GenerationContext};
use viborm_migrate_core::error::{Error, Result};
use viborm_migrate_core::snapshot::TableDef;
use viborm_migrate_core::statement::Statement;

use crate::ddl;

/// Recreates `table` so its physical shape matches `desired`, copying rows
/// by explicit column name. `current` must hold the table's pre-change
/// definition; it is the source side of the copy.
///
/// # Errors
/// [`Error::FeatureNotSupported`] when a target column has no source in
/// `current` and is `NOT NULL` without a default — recreation cannot
/// fabricate a value for existing rows.
pub fn recreate_table(
    driver: &dyn DialectDriver,
    context: &GenerationContext<'_>,
    desired: &TableDef,
) -> Result<Vec<Statement>> {
    let current = context
        .current
        .table(&desired.name)
        .ok_or_else(|| Error::internal(format!("no current definition for table `{}`", desired.name)))?;

    let q = |identifier: &str| driver.quote_identifier(identifier);
    let scratch_name = format!("__new_{}", desired.name);

    let mut statements = vec![Statement::non_transactional_sql("PRAGMA foreign_keys=OFF")];

    statements.push(Statement::sql(ddl::create_table_sql(
        driver,
        &scratch_name,
        desired,
        context.desired,
    )?));

    let mut target_columns = Vec::new();
    let mut source_columns = Vec::new();
    for column in &desired.columns {
        match current.column(&column.name) {
            Some(_) => {
                target_columns.push(q(&column.name));
                source_columns.push(q(&column.name));
            }
            None if !column.nullable && column.default.is_none() => {
                return Err(Error::feature_not_supported(
                    "sqlite",
                    format!(
                        "cannot recreate table `{}`: new column `{}` is NOT NULL without a default and has no source column",
                        desired.name, column.name
                    ),
                ));
            }
            None => {}
        }
    }

    if !target_columns.is_empty() {
        statements.push(Statement::sql(format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            q(&scratch_name),
            target_columns.join(", "),
            source_columns.join(", "),
            q(&current.name)
        )));
    }

    statements.push(Statement::sql(format!("DROP TABLE {}", q(&current.name))));
    statements.push(Statement::sql(format!(
        "ALTER TABLE {} RENAME TO {}",
        q(&scratch_name),
        q(&desired.name)
    )));

    for index in &desired.indexes {
        statements.push(ddl::create_index_sql(driver, &desired.name, index)?);
    }

    statements.push(Statement::non_transactional_sql("PRAGMA foreign_keys=ON"));

    Ok(statements)
}
