//! Schema-migration core: the dialect-neutral snapshot model, differ,
//! resolver, operation sorter, dialect driver contract, storage driver, and
//! apply/generate/rollback orchestrator described in the crate's design
//! notes. Concrete dialect drivers live in sibling `viborm-migrate-dialect-*`
//! crates and register themselves against [`registry::DriverRegistry`].

pub mod config;
pub mod dialect;
pub mod diff;
pub mod diffop;
pub mod enum_parser;
pub mod error;
pub mod executor;
pub mod introspect;
pub mod ordering;
pub mod orchestrator;
pub mod registry;
pub mod resolver;
pub mod serializer;
pub mod snapshot;
pub mod statement;
pub mod storage;
pub mod tracking;

pub use dialect::{Capabilities, DialectDriver, DialectKind, GenerationContext};
pub use diff::{DiffEngine, DiffOutcome};
pub use diffop::{AmbiguousChange, ChangeResolution, DiffOperation};
pub use enum_parser::parse_enum_literal_values;
pub use error::{Error, Result, VibORMErrorCode};
pub use introspect::Introspector;
pub use ordering::OperationSorter;
pub use resolver::Resolver;
pub use snapshot::{
    ColumnDef, EnumDef, ForeignKeyAction, ForeignKeyDef, IndexDef, IndexType, PrimaryKeyDef,
    SchemaSnapshot, TableDef, UniqueConstraintDef,
};
