//! A small registry mapping driver names to a boxed [`DialectDriver`].
//! Dialect crates register themselves here; the orchestrator (C10) never
//! names a concrete driver type.
//!
//! Lookup is driver-name-first: an exact match on
//! [`DialectDriver::driver_name`] wins outright (this is how `libsql` stays
//! addressable even though it shares [`DialectKind::Sqlite`] with plain
//! SQLite). Failing that, the selector is tried as a bare dialect name and
//! resolved to whichever driver of that dialect registered first — process
//! init order decides the default, so built-in drivers must all register
//! before the first lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::dialect::{DialectDriver, DialectKind};
use crate::error::{Error, Result};

#[derive(Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<&'static str, Arc<dyn DialectDriver>>,
    dialect_defaults: BTreeMap<DialectKind, Arc<dyn DialectDriver>>,
}

impl DriverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, driver: Arc<dyn DialectDriver>) {
        self.dialect_defaults.entry(driver.kind()).or_insert_with(|| driver.clone());
        self.drivers.insert(driver.driver_name(), driver);
    }

    /// Looks up a driver by `selector`: first as an exact `driverName`
    /// match, then (§9's fallback) as a bare dialect name resolved to that
    /// dialect's default driver.
    ///
    /// # Errors
    /// Returns [`Error::DriverNotSupported`] if `selector` matches neither a
    /// registered driver name nor a known dialect with a registered default.
    pub fn get(&self, selector: &str) -> Result<Arc<dyn DialectDriver>> {
        if let Some(driver) = self.drivers.get(selector) {
            return Ok(driver.clone());
        }
        let dialect = match selector {
            "postgres" => Some(DialectKind::Postgres),
            "mysql" => Some(DialectKind::MySql),
            "sqlite" => Some(DialectKind::Sqlite),
            _ => None,
        };
        dialect
            .and_then(|kind| self.dialect_defaults.get(&kind).cloned())
            .ok_or_else(|| Error::DriverNotSupported {
                driver_or_dialect: selector.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Capabilities;
    use crate::diffop::DiffOperation;
    use crate::statement::Statement;

    struct StubDriver;

    impl DialectDriver for StubDriver {
        fn kind(&self) -> DialectKind {
            DialectKind::Sqlite
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities {
                supports_native_enums: false,
                supports_add_enum_value_in_transaction: false,
                supported_index_types: vec![crate::snapshot::IndexType::Btree],
                supports_native_arrays: false,
                supports_advisory_lock: false,
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

        fn placeholder(&self, _index: usize) -> String {
            "?".to_string()
        }

        fn advisory_lock_statements(&self, _lock_key: &str) -> Option<(Statement, Statement)> {
            None
        }

        fn tracking_table_statements(&self, _table_name: &str) -> Vec<Statement> {
            Vec::new()
        }
    }

    struct AltStubDriver;

    impl DialectDriver for AltStubDriver {
        fn kind(&self) -> DialectKind {
            DialectKind::Sqlite
        }

        fn driver_name(&self) -> &'static str {
            "libsql"
        }

        fn capabilities(&self) -> Capabilities {
            StubDriver.capabilities()
        }

        fn generate(&self, operation: &DiffOperation, context: &crate::dialect::GenerationContext<'_>) -> Result<Vec<Statement>> {
            StubDriver.generate(operation, context)
        }

        fn quote_identifier(&self, identifier: &str) -> String {
            StubDriver.quote_identifier(identifier)
        }

        fn escape_string_literal(&self, value: &str) -> String {
            StubDriver.escape_string_literal(value)
        }

        fn placeholder(&self, index: usize) -> String {
            StubDriver.placeholder(index)
        }

        fn advisory_lock_statements(&self, lock_key: &str) -> Option<(Statement, Statement)> {
            StubDriver.advisory_lock_statements(lock_key)
        }

        fn tracking_table_statements(&self, table_name: &str) -> Vec<Statement> {
            StubDriver.tracking_table_statements(table_name)
        }
    }

    #[test]
    fn unregistered_selector_is_reported() {
        let registry = DriverRegistry::new();
        let err = registry.get("postgres").unwrap_err();
        assert_eq!(err.code(), crate::error::VibORMErrorCode::DriverNotSupported);
    }

    #[test]
    fn dialect_default_is_found_by_bare_dialect_name() {
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(StubDriver));
        assert!(registry.get("sqlite").is_ok());
    }

    #[test]
    fn driver_name_is_found_by_exact_match_even_when_dialect_is_shared() {
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(StubDriver));
        registry.register(Arc::new(AltStubDriver));

        let by_dialect_default = registry.get("sqlite").unwrap();
        assert_eq!(by_dialect_default.driver_name(), "sqlite");

        let by_exact_name = registry.get("libsql").unwrap();
        assert_eq!(by_exact_name.driver_name(), "libsql");
        assert_eq!(by_exact_name.kind(), DialectKind::Sqlite);
    }

    #[test]
    fn unknown_selector_does_not_fall_back_to_any_dialect_default() {
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(StubDriver));
        let err = registry.get("pglite").unwrap_err();
        assert_eq!(err.code(), crate::error::VibORMErrorCode::DriverNotSupported);
    }
}
