//! `DiffOperation` and friends: the tagged union the differ (C4) produces
//! and every dialect generator (C7) consumes.

use std::collections::BTreeMap;

use crate::snapshot::{ColumnDef, EnumDef, ForeignKeyDef, IndexDef, PrimaryKeyDef, UniqueConstraintDef};

#[derive(Debug, Clone, PartialEq)]
pub enum DiffOperation {
    CreateTable {
        table: String,
        columns: Vec<ColumnDef>,
        primary_key: Option<PrimaryKeyDef>,
    },
    DropTable {
        table: String,
    },
    RenameTable {
        from: String,
        to: String,
    },
    AddColumn {
        table: String,
        column: ColumnDef,
    },
    DropColumn {
        table: String,
        column: String,
    },
    RenameColumn {
        table: String,
        from: String,
        to: String,
    },
    AlterColumn {
        table: String,
        from: ColumnDef,
        to: ColumnDef,
    },
    CreateIndex {
        table: String,
        index: IndexDef,
    },
    DropIndex {
        table: String,
        index: String,
    },
    AddForeignKey {
        table: String,
        foreign_key: ForeignKeyDef,
    },
    DropForeignKey {
        table: String,
        foreign_key: String,
    },
    AddUniqueConstraint {
        table: String,
        constraint: UniqueConstraintDef,
    },
    DropUniqueConstraint {
        table: String,
        constraint: String,
    },
    AddPrimaryKey {
        table: String,
        primary_key: PrimaryKeyDef,
    },
    DropPrimaryKey {
        table: String,
    },
    CreateEnum {
        r#enum: EnumDef,
    },
    DropEnum {
        r#enum: String,
        /// `(table, column)` pairs currently typed by the dropped enum.
        dependent_columns: Vec<(String, String)>,
    },
    AlterEnum {
        r#enum: String,
        #[allow(clippy::struct_field_names)]
        add_values: Option<Vec<String>>,
        remove_values: Option<Vec<String>>,
        new_values: Option<Vec<String>>,
        dependent_columns: Vec<(String, String)>,
        value_replacements: BTreeMap<String, Option<String>>,
        default_replacement: Option<Option<String>>,
    },
}

impl DiffOperation {
    /// Stable tag used in error messages and test fixtures; never shown to
    /// end users as the whole story, only as a pointer back to the variant.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "createTable",
            Self::DropTable { .. } => "dropTable",
            Self::RenameTable { .. } => "renameTable",
            Self::AddColumn { .. } => "addColumn",
            Self::DropColumn { .. } => "dropColumn",
            Self::RenameColumn { .. } => "renameColumn",
            Self::AlterColumn { .. } => "alterColumn",
            Self::CreateIndex { .. } => "createIndex",
            Self::DropIndex { .. } => "dropIndex",
            Self::AddForeignKey { .. } => "addForeignKey",
            Self::DropForeignKey { .. } => "dropForeignKey",
            Self::AddUniqueConstraint { .. } => "addUniqueConstraint",
            Self::DropUniqueConstraint { .. } => "dropUniqueConstraint",
            Self::AddPrimaryKey { .. } => "addPrimaryKey",
            Self::DropPrimaryKey { .. } => "dropPrimaryKey",
            Self::CreateEnum { .. } => "createEnum",
            Self::DropEnum { .. } => "dropEnum",
            Self::AlterEnum { .. } => "alterEnum",
        }
    }

    /// The table this op is scoped to, if any (enums are schema-scoped, not
    /// table-scoped). Used by the sorter (C6).
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::CreateTable { table, .. }
            | Self::DropTable { table }
            | Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::RenameColumn { table, .. }
            | Self::AlterColumn { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::DropIndex { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::DropForeignKey { table, .. }
            | Self::AddUniqueConstraint { table, .. }
            | Self::DropUniqueConstraint { table, .. }
            | Self::AddPrimaryKey { table, .. }
            | Self::DropPrimaryKey { table } => Some(table),
            Self::RenameTable { to, .. } => Some(to),
            Self::CreateEnum { .. } | Self::DropEnum { .. } | Self::AlterEnum { .. } => None,
        }
    }
}

/// A (dropped, added) pair that could plausibly be a rename. The resolver
/// (C5) turns this into concrete operations via a caller-supplied policy.
#[derive(Debug, Clone, PartialEq)]
pub enum AmbiguousChange {
    AmbiguousTable {
        dropped: String,
        added: String,
    },
    AmbiguousColumn {
        table: String,
        dropped: ColumnDef,
        added: ColumnDef,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeResolution {
    Rename,
    AddAndDrop,
}
