//! Turns a `--dialect`/`--connection` pair into a live [`DatabaseExecutor`],
//! deferring to whichever dialect crates this build was compiled with.
//!
//! Keyed on the driver name, not [`viborm_migrate_core::dialect::DialectKind`]:
//! `sqlite` and `libsql` share a dialect but open connections differently
//! enough at the CLI boundary (well, identically today — see the `libsql`
//! arm — but the registry itself only disambiguates by driver name, so this
//! stays consistent with it rather than special-casing a `DialectKind`
//! match that can no longer tell the two apart).

use viborm_migrate_core::error::{Error, Result};
use viborm_migrate_core::executor::DatabaseExecutor;

pub fn connect_executor(driver_name: &str, connection: &str) -> Result<Box<dyn DatabaseExecutor>> {
    match driver_name {
        #[cfg(feature = "postgres")]
        "postgres" => Ok(Box::new(viborm_migrate_dialect_postgres::PostgresExecutor::connect(connection)?)),
        #[cfg(not(feature = "postgres"))]
        "postgres" => Err(unsupported(driver_name)),

        #[cfg(feature = "mysql")]
        "mysql" => Ok(Box::new(viborm_migrate_dialect_mysql::MySqlExecutor::connect(connection)?)),
        #[cfg(not(feature = "mysql"))]
        "mysql" => Err(unsupported(driver_name)),

        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Box::new(viborm_migrate_dialect_sqlite::SqliteExecutor::open(connection)?)),
        #[cfg(not(feature = "sqlite"))]
        "sqlite" => Err(unsupported(driver_name)),

        // LibSQL's own client is async-only; this build only drives it over
        // its SQLite-file-compatible local mode, via the same executor as
        // plain SQLite.
        #[cfg(feature = "libsql")]
        "libsql" => Ok(Box::new(viborm_migrate_dialect_sqlite::SqliteExecutor::open(connection)?)),
        #[cfg(not(feature = "libsql"))]
        "libsql" => Err(unsupported(driver_name)),

        other => Err(unsupported(other)),
    }
}

#[allow(dead_code)]
fn unsupported(driver_name: &str) -> Error {
    Error::feature_not_supported(driver_name.to_string(), "this build was compiled without support for this driver")
}
