//! The dialect driver contract (C7): capability-driven polymorphism, no
//! inheritance between dialects. Each driver is handed one [`DiffOperation`]
//! at a time, already ordered by the sorter (C6), and returns the
//! [`Statement`]s that realize it.

use serde::{Deserialize, Serialize};

use crate::diffop::DiffOperation;
use crate::error::Result;
use crate::snapshot::{IndexType, SchemaSnapshot};
use crate::statement::Statement;

/// The SQL variant a driver speaks — postgresql, mysql, or sqlite — distinct
/// from the concrete driver serving it (e.g. `sqlite` vs `libsql`, both
/// [`Self::Sqlite`]). Journal compatibility and capability defaults are keyed
/// on this; driver *selection* is keyed on the finer-grained
/// [`DialectDriver::driver_name`] instead (see [`crate::registry`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DialectKind {
    Postgres,
    MySql,
    Sqlite,
}

impl Serialize for DialectKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DialectKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "postgres" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(serde::de::Error::custom(format!("unknown dialect `{other}`"))),
        }
    }
}

impl DialectKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for DialectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a dialect can and cannot do. Generators branch on these fields
/// instead of on `DialectKind` directly, so a new dialect only has to state
/// its capabilities truthfully rather than teach every generator about
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `CREATE TYPE ... AS ENUM` (or equivalent) as a first-class type,
    /// versus emulating an enum with a `CHECK` constraint over text.
    pub supports_native_enums: bool,
    /// Whether `ALTER TYPE ... ADD VALUE` can run inside the same
    /// transaction as the rest of a migration (Postgres could not, pre-12).
    pub supports_add_enum_value_in_transaction: bool,
    /// The index methods this dialect actually implements. Generating an
    /// index with a type outside this list fails with
    /// [`crate::error::Error::FeatureNotSupported`].
    pub supported_index_types: Vec<IndexType>,
    /// First-class array column types (`integer[]`), versus none.
    pub supports_native_arrays: bool,
    /// A cross-process advisory lock primitive independent of the migration
    /// transaction itself (`pg_advisory_lock`, `GET_LOCK`). Dialects without
    /// one serialize migrations by holding an exclusive transaction instead.
    pub supports_advisory_lock: bool,
}

impl Capabilities {
    #[must_use]
    pub fn supports_index_type(&self, index_type: IndexType) -> bool {
        self.supported_index_types.contains(&index_type)
    }
}

/// The schema on both sides of a migration, handed to generators that can't
/// render an operation from its own fields alone. SQLite's table recreation
/// needs `current` to enumerate the physical table's existing columns (the
/// source side of the copy) and `desired` to resolve sibling definitions
/// (an enum's full value list, a table's other constraints) that the
/// operation itself doesn't carry. Passed explicitly, never read from
/// ambient state.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    pub current: &'a SchemaSnapshot,
    pub desired: &'a SchemaSnapshot,
}

pub trait DialectDriver: Send + Sync {
    fn kind(&self) -> DialectKind;

    /// The concrete driver name the registry keys on (`postgres`, `mysql`,
    /// `sqlite`, `libsql`, ...) — finer-grained than [`Self::kind`], which
    /// only distinguishes SQL variants. Defaults to the dialect's own name,
    /// which is correct for every driver except one of several sharing a
    /// dialect (LibSQL overrides this; its `kind()` is still
    /// [`DialectKind::Sqlite`]).
    fn driver_name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn capabilities(&self) -> Capabilities;

    /// Lowers one operation into zero or more statements.
    ///
    /// Implementations may return [`crate::error::Error::FeatureNotSupported`]
    /// for operations their capabilities rule out (e.g. a non-integer
    /// auto-increment primary key).
    fn generate(&self, operation: &DiffOperation, context: &GenerationContext<'_>) -> Result<Vec<Statement>>;

    fn quote_identifier(&self, identifier: &str) -> String;

    /// Renders `value` as a single-quoted SQL string literal, escaping any
    /// embedded quotes the dialect's way. Used internally when a generator
    /// must synthesize a literal itself (enum value lists, `CHECK` clauses,
    /// value-replacement `UPDATE`s) — most defaults arrive pre-escaped from
    /// the caller and never go through this.
    fn escape_string_literal(&self, value: &str) -> String;

    /// The bound-parameter placeholder for the `index`-th (1-based) bound
    /// value in a statement (`$1` on Postgres, `?` on MySQL/SQLite/LibSQL).
    fn placeholder(&self, index: usize) -> String;

    /// `(acquire, release)` statements for the cross-process migration lock,
    /// or `None` when [`Capabilities::supports_advisory_lock`] is false.
    fn advisory_lock_statements(&self, lock_key: &str) -> Option<(Statement, Statement)>;

    /// Idempotent DDL (`CREATE TABLE IF NOT EXISTS` or equivalent) for the
    /// tracking table, plus any indexes it needs.
    fn tracking_table_statements(&self, table_name: &str) -> Vec<Statement>;
}
