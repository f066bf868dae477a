//! Caller-provided configuration knobs (§6). Unrecognised options are the
//! caller's problem at the deserialization boundary, not this crate's; what
//! we own is validating the knobs we do recognise.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::tracking::DEFAULT_TRACKING_TABLE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    pub migrations_dir: PathBuf,
    pub table_name: String,
    pub dry_run: bool,
    /// Stop `apply` at (and including) this migration name, if set.
    pub to: Option<String>,
    /// Number of migrations `rollback` removes.
    pub count: u32,
    /// Skip confirmation prompts the CLI would otherwise show.
    pub force: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            table_name: DEFAULT_TRACKING_TABLE.to_string(),
            dry_run: false,
            to: None,
            count: 1,
            force: false,
        }
    }
}

impl MigrationConfig {
    /// # Errors
    /// [`Error::InvalidInput`] if `table_name` is empty or `count` is zero
    /// when rollback is actually invoked with it.
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(Error::invalid_input("tableName must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(MigrationConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_table_name_is_rejected() {
        let config = MigrationConfig {
            table_name: String::new(),
            ..MigrationConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
