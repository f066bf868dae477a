//! The operation sorter (C6): turns an unordered batch of [`DiffOperation`]s
//! into an order a dialect driver can execute without hitting a dangling
//! reference, by sorting on a small fixed [`PriorityGroup`] lattice.
//!
//! Each group encodes one or more of the ordering rules: foreign keys drop
//! before the columns/tables they reference become orphaned; indexes and
//! constraints drop before the columns underneath them; enums get created
//! before anything can use them and dropped only once nothing references
//! them any more; tables exist before the foreign keys that target them.

use std::cmp::Ordering;

use crate::diffop::DiffOperation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PriorityGroup {
    DropForeignKey,
    DropUniqueConstraint,
    DropIndex,
    DropPrimaryKey,
    AlterEnumRemoveValues,
    DropColumn,
    DropTable,
    RenameTable,
    RenameColumn,
    CreateEnum,
    AlterEnumAddValues,
    CreateTable,
    AddColumn,
    AlterColumn,
    AddPrimaryKey,
    CreateIndex,
    AddUniqueConstraint,
    AddForeignKey,
    DropEnum,
}

fn priority_group(operation: &DiffOperation) -> PriorityGroup {
    match operation {
        DiffOperation::DropForeignKey { .. } => PriorityGroup::DropForeignKey,
        DiffOperation::DropUniqueConstraint { .. } => PriorityGroup::DropUniqueConstraint,
        DiffOperation::DropIndex { .. } => PriorityGroup::DropIndex,
        DiffOperation::DropPrimaryKey { .. } => PriorityGroup::DropPrimaryKey,
        DiffOperation::AlterEnum { remove_values, .. } if remove_values.is_some() => {
            PriorityGroup::AlterEnumRemoveValues
        }
        DiffOperation::DropColumn { .. } => PriorityGroup::DropColumn,
        DiffOperation::DropTable { .. } => PriorityGroup::DropTable,
        DiffOperation::RenameTable { .. } => PriorityGroup::RenameTable,
        DiffOperation::RenameColumn { .. } => PriorityGroup::RenameColumn,
        DiffOperation::CreateEnum { .. } => PriorityGroup::CreateEnum,
        DiffOperation::AlterEnum { .. } => PriorityGroup::AlterEnumAddValues,
        DiffOperation::CreateTable { .. } => PriorityGroup::CreateTable,
        DiffOperation::AddColumn { .. } => PriorityGroup::AddColumn,
        DiffOperation::AlterColumn { .. } => PriorityGroup::AlterColumn,
        DiffOperation::AddPrimaryKey { .. } => PriorityGroup::AddPrimaryKey,
        DiffOperation::CreateIndex { .. } => PriorityGroup::CreateIndex,
        DiffOperation::AddUniqueConstraint { .. } => PriorityGroup::AddUniqueConstraint,
        DiffOperation::AddForeignKey { .. } => PriorityGroup::AddForeignKey,
        DiffOperation::DropEnum { .. } => PriorityGroup::DropEnum,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OperationSorter;

impl OperationSorter {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Stable sort on [`PriorityGroup`]; operations within the same group
    /// keep the relative order the differ/resolver produced them in.
    #[must_use]
    pub fn sort(&self, mut operations: Vec<DiffOperation>) -> Vec<DiffOperation> {
        operations.sort_by(|left, right| compare(left, right));
        operations
    }
}

fn compare(left: &DiffOperation, right: &DiffOperation) -> Ordering {
    priority_group(left).cmp(&priority_group(right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ColumnDef, EnumDef, ForeignKeyDef};

    #[test]
    fn foreign_key_drops_before_table_drop() {
        let ops = vec![
            DiffOperation::DropTable {
                table: "posts".into(),
            },
            DiffOperation::DropForeignKey {
                table: "posts".into(),
                foreign_key: "posts_author_fkey".into(),
            },
        ];
        let sorted = OperationSorter::new().sort(ops);
        assert!(matches!(sorted[0], DiffOperation::DropForeignKey { .. }));
        assert!(matches!(sorted[1], DiffOperation::DropTable { .. }));
    }

    #[test]
    fn enum_created_before_column_that_uses_it() {
        let ops = vec![
            DiffOperation::AddColumn {
                table: "users".into(),
                column: ColumnDef::new("status", "status", false).with_enum_type("status"),
            },
            DiffOperation::CreateEnum {
                r#enum: EnumDef::new("status", vec!["active".into()]),
            },
        ];
        let sorted = OperationSorter::new().sort(ops);
        assert!(matches!(sorted[0], DiffOperation::CreateEnum { .. }));
        assert!(matches!(sorted[1], DiffOperation::AddColumn { .. }));
    }

    #[test]
    fn table_created_before_foreign_key_targeting_it() {
        let ops = vec![
            DiffOperation::AddForeignKey {
                table: "posts".into(),
                foreign_key: ForeignKeyDef {
                    name: "posts_author_fkey".into(),
                    columns: vec!["author_id".into()],
                    referenced_table: "users".into(),
                    referenced_columns: vec!["id".into()],
                    on_delete: None,
                    on_update: None,
                },
            },
            DiffOperation::CreateTable {
                table: "users".into(),
                columns: vec![ColumnDef::new("id", "integer", false)],
                primary_key: None,
            },
        ];
        let sorted = OperationSorter::new().sort(ops);
        assert!(matches!(sorted[0], DiffOperation::CreateTable { .. }));
        assert!(matches!(sorted[1], DiffOperation::AddForeignKey { .. }));
    }

    #[test]
    fn column_created_before_index_over_it() {
        let ops = vec![
            DiffOperation::CreateIndex {
                table: "users".into(),
                index: crate::snapshot::IndexDef {
                    name: "users_email_idx".into(),
                    columns: vec!["email".into()],
                    unique: false,
                    index_type: None,
                    r#where: None,
                },
            },
            DiffOperation::AddColumn {
                table: "users".into(),
                column: ColumnDef::new("email", "text", true),
            },
        ];
        let sorted = OperationSorter::new().sort(ops);
        assert!(matches!(sorted[0], DiffOperation::AddColumn { .. }));
        assert!(matches!(sorted[1], DiffOperation::CreateIndex { .. }));
    }
}
