//! The differ (C4): reduces `(current, desired) ↦ (operations, ambiguities)`.

pub mod normalize;

use std::collections::{BTreeMap, BTreeSet};

use crate::diffop::{AmbiguousChange, DiffOperation};
use crate::snapshot::{ColumnDef, EnumDef, ForeignKeyDef, IndexDef, SchemaSnapshot, TableDef, UniqueConstraintDef};

use normalize::{defaults_equal, types_equal};

const TABLE_RENAME_SIMILARITY_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffOutcome {
    pub operations: Vec<DiffOperation>,
    pub ambiguous_changes: Vec<AmbiguousChange>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

impl DiffEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn diff(&self, current: &SchemaSnapshot, desired: &SchemaSnapshot) -> DiffOutcome {
        let mut operations = Vec::new();
        let mut ambiguous_changes = Vec::new();

        let common_tables = diff_tables(current, desired, &mut operations, &mut ambiguous_changes);
        for (current_table, desired_table) in common_tables {
            diff_table_columns(current_table, desired_table, &mut operations, &mut ambiguous_changes);
            diff_indexes(current_table, desired_table, &mut operations);
            diff_foreign_keys(current_table, desired_table, &mut operations);
            diff_unique_constraints(current_table, desired_table, &mut operations);
            diff_primary_key(current_table, desired_table, &mut operations);
        }

        diff_enums(current, desired, &mut operations);

        DiffOutcome {
            operations,
            ambiguous_changes,
        }
    }
}

fn diff_tables<'a>(
    current: &'a SchemaSnapshot,
    desired: &'a SchemaSnapshot,
    operations: &mut Vec<DiffOperation>,
    ambiguous_changes: &mut Vec<AmbiguousChange>,
) -> Vec<(&'a TableDef, &'a TableDef)> {
    let current_names: BTreeSet<&str> = current.tables.iter().map(|t| t.name.as_str()).collect();
    let desired_names: BTreeSet<&str> = desired.tables.iter().map(|t| t.name.as_str()).collect();

    let mut dropped: Vec<&str> = current_names.difference(&desired_names).copied().collect();
    let mut added: Vec<&str> = desired_names.difference(&current_names).copied().collect();
    dropped.sort_unstable();
    added.sort_unstable();

    let mut claimed_dropped = BTreeSet::new();
    let mut claimed_added = BTreeSet::new();

    for &dropped_name in &dropped {
        let dropped_table = current.table(dropped_name).expect("name came from current");
        let dropped_columns: BTreeSet<&str> =
            dropped_table.columns.iter().map(|c| c.name.as_str()).collect();

        let mut best: Option<(&str, f64)> = None;
        for &added_name in &added {
            if claimed_added.contains(added_name) {
                continue;
            }
            let added_table = desired.table(added_name).expect("name came from desired");
            let added_columns: BTreeSet<&str> =
                added_table.columns.iter().map(|c| c.name.as_str()).collect();
            let similarity = jaccard_similarity(&dropped_columns, &added_columns);
            if similarity >= TABLE_RENAME_SIMILARITY_THRESHOLD
                && best.is_none_or(|(_, best_similarity)| similarity > best_similarity)
            {
                best = Some((added_name, similarity));
            }
        }

        if let Some((added_name, _)) = best {
            claimed_dropped.insert(dropped_name);
            claimed_added.insert(added_name);
            ambiguous_changes.push(AmbiguousChange::AmbiguousTable {
                dropped: dropped_name.to_string(),
                added: added_name.to_string(),
            });
        }
    }

    for &dropped_name in &dropped {
        if !claimed_dropped.contains(dropped_name) {
            operations.push(DiffOperation::DropTable {
                table: dropped_name.to_string(),
            });
        }
    }
    for &added_name in &added {
        if !claimed_added.contains(added_name) {
            let table = desired.table(added_name).expect("name came from desired");
            operations.push(DiffOperation::CreateTable {
                table: table.name.clone(),
                columns: table.columns.clone(),
                primary_key: table.primary_key.clone(),
            });
            for index in &table.indexes {
                operations.push(DiffOperation::CreateIndex {
                    table: table.name.clone(),
                    index: index.clone(),
                });
            }
            for foreign_key in &table.foreign_keys {
                operations.push(DiffOperation::AddForeignKey {
                    table: table.name.clone(),
                    foreign_key: foreign_key.clone(),
                });
            }
            for constraint in &table.unique_constraints {
                operations.push(DiffOperation::AddUniqueConstraint {
                    table: table.name.clone(),
                    constraint: constraint.clone(),
                });
            }
        }
    }

    current
        .tables
        .iter()
        .filter_map(|current_table| {
            desired
                .table(&current_table.name)
                .map(|desired_table| (current_table, desired_table))
        })
        .collect()
}

fn diff_table_columns(
    current: &TableDef,
    desired: &TableDef,
    operations: &mut Vec<DiffOperation>,
    ambiguous_changes: &mut Vec<AmbiguousChange>,
) {
    let current_names: BTreeSet<&str> = current.columns.iter().map(|c| c.name.as_str()).collect();
    let desired_names: BTreeSet<&str> = desired.columns.iter().map(|c| c.name.as_str()).collect();

    let mut dropped: Vec<&str> = current_names.difference(&desired_names).copied().collect();
    let mut added: Vec<&str> = desired_names.difference(&current_names).copied().collect();
    dropped.sort_unstable();
    added.sort_unstable();

    let mut claimed_dropped = BTreeSet::new();
    let mut claimed_added = BTreeSet::new();

    for &dropped_name in &dropped {
        let dropped_column = current.column(dropped_name).expect("name came from current");
        for &added_name in &added {
            if claimed_added.contains(added_name) {
                continue;
            }
            let added_column = desired.column(added_name).expect("name came from desired");
            if types_equal(&dropped_column.r#type, &added_column.r#type) {
                claimed_dropped.insert(dropped_name);
                claimed_added.insert(added_name);
                ambiguous_changes.push(AmbiguousChange::AmbiguousColumn {
                    table: current.name.clone(),
                    dropped: dropped_column.clone(),
                    added: added_column.clone(),
                });
                break;
            }
        }
    }

    for &dropped_name in &dropped {
        if !claimed_dropped.contains(dropped_name) {
            operations.push(DiffOperation::DropColumn {
                table: current.name.clone(),
                column: dropped_name.to_string(),
            });
        }
    }
    for &added_name in &added {
        if !claimed_added.contains(added_name) {
            let column = desired.column(added_name).expect("name came from desired");
            operations.push(DiffOperation::AddColumn {
                table: desired.name.clone(),
                column: column.clone(),
            });
        }
    }

    for current_column in &current.columns {
        let Some(desired_column) = desired.column(&current_column.name) else {
            continue;
        };
        if !columns_equal(current_column, desired_column) {
            operations.push(DiffOperation::AlterColumn {
                table: current.name.clone(),
                from: current_column.clone(),
                to: desired_column.clone(),
            });
        }
    }
}

#[must_use]
pub fn columns_equal(left: &ColumnDef, right: &ColumnDef) -> bool {
    types_equal(&left.r#type, &right.r#type)
        && left.nullable == right.nullable
        && defaults_equal(left.default.as_deref(), right.default.as_deref())
}

fn diff_indexes(current: &TableDef, desired: &TableDef, operations: &mut Vec<DiffOperation>) {
    by_name_diff(
        &current.indexes,
        &desired.indexes,
        |index| index.name.as_str(),
        |dropped_name| DiffOperation::DropIndex {
            table: current.name.clone(),
            index: dropped_name.to_string(),
        },
        |added: &IndexDef| DiffOperation::CreateIndex {
            table: desired.name.clone(),
            index: added.clone(),
        },
        operations,
    );
}

fn diff_foreign_keys(current: &TableDef, desired: &TableDef, operations: &mut Vec<DiffOperation>) {
    by_name_diff(
        &current.foreign_keys,
        &desired.foreign_keys,
        |fk| fk.name.as_str(),
        |dropped_name| DiffOperation::DropForeignKey {
            table: current.name.clone(),
            foreign_key: dropped_name.to_string(),
        },
        |added: &ForeignKeyDef| DiffOperation::AddForeignKey {
            table: desired.name.clone(),
            foreign_key: added.clone(),
        },
        operations,
    );
}

fn diff_unique_constraints(current: &TableDef, desired: &TableDef, operations: &mut Vec<DiffOperation>) {
    by_name_diff(
        &current.unique_constraints,
        &desired.unique_constraints,
        |unique| unique.name.as_str(),
        |dropped_name| DiffOperation::DropUniqueConstraint {
            table: current.name.clone(),
            constraint: dropped_name.to_string(),
        },
        |added: &UniqueConstraintDef| DiffOperation::AddUniqueConstraint {
            table: desired.name.clone(),
            constraint: added.clone(),
        },
        operations,
    );
}

/// Named-object set diff shared by indexes/FKs/uniques: same name on both
/// sides with different attributes is always drop-then-create, never an
/// implicit alter (spec §4.3).
fn by_name_diff<T: Clone + PartialEq>(
    current_items: &[T],
    desired_items: &[T],
    name_of: impl Fn(&T) -> &str,
    make_drop: impl Fn(&str) -> DiffOperation,
    make_create: impl Fn(&T) -> DiffOperation,
    operations: &mut Vec<DiffOperation>,
) {
    let current_by_name: BTreeMap<&str, &T> = current_items
        .iter()
        .map(|item| (name_of(item), item))
        .collect();
    let desired_by_name: BTreeMap<&str, &T> = desired_items
        .iter()
        .map(|item| (name_of(item), item))
        .collect();

    let mut all_names: BTreeSet<&str> = current_by_name.keys().copied().collect();
    all_names.extend(desired_by_name.keys().copied());

    for name in all_names {
        match (current_by_name.get(name), desired_by_name.get(name)) {
            (Some(_), None) => operations.push(make_drop(name)),
            (None, Some(added)) => operations.push(make_create(added)),
            (Some(current_item), Some(desired_item)) => {
                if current_item != desired_item {
                    operations.push(make_drop(name));
                    operations.push(make_create(desired_item));
                }
            }
            (None, None) => unreachable!("name came from one of the two maps"),
        }
    }
}

fn diff_primary_key(current: &TableDef, desired: &TableDef, operations: &mut Vec<DiffOperation>) {
    match (&current.primary_key, &desired.primary_key) {
        (None, Some(desired_pk)) => operations.push(DiffOperation::AddPrimaryKey {
            table: desired.name.clone(),
            primary_key: desired_pk.clone(),
        }),
        (Some(_), None) => operations.push(DiffOperation::DropPrimaryKey {
            table: current.name.clone(),
        }),
        (Some(current_pk), Some(desired_pk)) => {
            if current_pk.columns != desired_pk.columns {
                operations.push(DiffOperation::DropPrimaryKey {
                    table: current.name.clone(),
                });
                operations.push(DiffOperation::AddPrimaryKey {
                    table: desired.name.clone(),
                    primary_key: desired_pk.clone(),
                });
            }
        }
        (None, None) => {}
    }
}

fn diff_enums(current: &SchemaSnapshot, desired: &SchemaSnapshot, operations: &mut Vec<DiffOperation>) {
    let current_by_name: BTreeMap<&str, &EnumDef> =
        current.enums.iter().map(|e| (e.name.as_str(), e)).collect();
    let desired_by_name: BTreeMap<&str, &EnumDef> =
        desired.enums.iter().map(|e| (e.name.as_str(), e)).collect();

    let mut all_names: BTreeSet<&str> = current_by_name.keys().copied().collect();
    all_names.extend(desired_by_name.keys().copied());

    for name in all_names {
        match (current_by_name.get(name), desired_by_name.get(name)) {
            (None, Some(added)) => operations.push(DiffOperation::CreateEnum {
                r#enum: (*added).clone(),
            }),
            (Some(_), None) => operations.push(DiffOperation::DropEnum {
                r#enum: name.to_string(),
                dependent_columns: columns_typed_by_enum(current, name),
            }),
            (Some(current_enum), Some(desired_enum)) => {
                let current_values: BTreeSet<&str> =
                    current_enum.values.iter().map(String::as_str).collect();
                let desired_values: BTreeSet<&str> =
                    desired_enum.values.iter().map(String::as_str).collect();

                let add_values: Vec<String> = desired_values
                    .difference(&current_values)
                    .map(|v| (*v).to_string())
                    .collect();
                let remove_values: Vec<String> = current_values
                    .difference(&desired_values)
                    .map(|v| (*v).to_string())
                    .collect();

                if add_values.is_empty() && remove_values.is_empty() {
                    continue;
                }

                let has_removals = !remove_values.is_empty();
                operations.push(DiffOperation::AlterEnum {
                    r#enum: name.to_string(),
                    add_values: (!add_values.is_empty()).then_some(sorted_by_desired_order(
                        &add_values,
                        &desired_enum.values,
                    )),
                    remove_values: has_removals.then_some(sorted_by_desired_order(
                        &remove_values,
                        &current_enum.values,
                    )),
                    new_values: has_removals.then(|| desired_enum.values.clone()),
                    dependent_columns: columns_typed_by_enum(current, name),
                    value_replacements: BTreeMap::new(),
                    default_replacement: None,
                });
            }
            (None, None) => unreachable!("name came from one of the two maps"),
        }
    }
}

fn sorted_by_desired_order(values: &[String], order: &[String]) -> Vec<String> {
    let mut result: Vec<String> = values.to_vec();
    result.sort_by_key(|v| order.iter().position(|o| o == v).unwrap_or(usize::MAX));
    result
}

fn columns_typed_by_enum(snapshot: &SchemaSnapshot, enum_name: &str) -> Vec<(String, String)> {
    let mut result = Vec::new();
    for table in &snapshot.tables {
        for column in &table.columns {
            if column.enum_type.as_deref() == Some(enum_name) {
                result.push((table.name.clone(), column.name.clone()));
            }
        }
    }
    result
}

fn jaccard_similarity(left: &BTreeSet<&str>, right: &BTreeSet<&str>) -> f64 {
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    let intersection = left.intersection(right).count();
    let union = left.union(right).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ColumnDef, PrimaryKeyDef};

    fn table_with_columns(name: &str, columns: &[&str]) -> TableDef {
        let mut table = TableDef::new(name);
        for column in columns {
            table.columns.push(ColumnDef::new(*column, "text", true));
        }
        table
    }

    #[test]
    fn reflexive_diff_is_empty() {
        let snapshot = SchemaSnapshot::new(
            vec![table_with_columns("users", &["id", "email"])],
            vec![EnumDef::new("status", vec!["active".into()])],
        );
        let outcome = DiffEngine::new().diff(&snapshot, &snapshot);
        assert!(outcome.operations.is_empty());
        assert!(outcome.ambiguous_changes.is_empty());
    }

    #[test]
    fn disjoint_table_rename_is_not_ambiguous() {
        let current = SchemaSnapshot::new(vec![table_with_columns("a", &["x"])], vec![]);
        let desired = SchemaSnapshot::new(vec![table_with_columns("b", &["y"])], vec![]);
        let outcome = DiffEngine::new().diff(&current, &desired);
        assert!(outcome.ambiguous_changes.is_empty());
        assert_eq!(outcome.operations.len(), 2);
    }

    #[test]
    fn similar_table_rename_is_ambiguous() {
        let current = SchemaSnapshot::new(
            vec![table_with_columns("accounts", &["id", "email", "name"])],
            vec![],
        );
        let desired = SchemaSnapshot::new(
            vec![table_with_columns("users", &["id", "email", "name"])],
            vec![],
        );
        let outcome = DiffEngine::new().diff(&current, &desired);
        assert_eq!(outcome.ambiguous_changes.len(), 1);
        assert!(matches!(
            outcome.ambiguous_changes[0],
            AmbiguousChange::AmbiguousTable { .. }
        ));
    }

    #[test]
    fn column_rename_requires_matching_type() {
        let mut current = table_with_columns("users", &["id"]);
        current.columns.push(ColumnDef::new("username", "text", false));
        let mut desired = table_with_columns("users", &["id"]);
        desired.columns.push(ColumnDef::new("name", "text", false));

        let current_snapshot = SchemaSnapshot::new(vec![current], vec![]);
        let desired_snapshot = SchemaSnapshot::new(vec![desired], vec![]);
        let outcome = DiffEngine::new().diff(&current_snapshot, &desired_snapshot);
        assert_eq!(outcome.ambiguous_changes.len(), 1);
        assert!(matches!(
            outcome.ambiguous_changes[0],
            AmbiguousChange::AmbiguousColumn { .. }
        ));
    }

    #[test]
    fn column_rename_with_mismatched_types_is_not_ambiguous() {
        let mut current = table_with_columns("users", &["id"]);
        current.columns.push(ColumnDef::new("username", "text", false));
        let mut desired = table_with_columns("users", &["id"]);
        desired.columns.push(ColumnDef::new("name", "integer", false));

        let current_snapshot = SchemaSnapshot::new(vec![current], vec![]);
        let desired_snapshot = SchemaSnapshot::new(vec![desired], vec![]);
        let outcome = DiffEngine::new().diff(&current_snapshot, &desired_snapshot);
        assert!(outcome.ambiguous_changes.is_empty());
        assert_eq!(outcome.operations.len(), 2);
    }

    #[test]
    fn primary_key_change_drops_then_adds() {
        let mut current = table_with_columns("users", &["id", "tenant_id"]);
        current.primary_key = Some(PrimaryKeyDef {
            columns: vec!["id".into()],
            name: None,
        });
        let mut desired = current.clone();
        desired.primary_key = Some(PrimaryKeyDef {
            columns: vec!["tenant_id".into(), "id".into()],
            name: None,
        });

        let outcome = DiffEngine::new().diff(
            &SchemaSnapshot::new(vec![current], vec![]),
            &SchemaSnapshot::new(vec![desired], vec![]),
        );
        assert_eq!(outcome.operations.len(), 2);
        assert!(matches!(outcome.operations[0], DiffOperation::DropPrimaryKey { .. }));
        assert!(matches!(outcome.operations[1], DiffOperation::AddPrimaryKey { .. }));
    }

    #[test]
    fn enum_add_value_only_still_carries_dependent_columns() {
        let mut table = table_with_columns("users", &["id"]);
        table
            .columns
            .push(ColumnDef::new("status", "status", false).with_enum_type("status"));
        let current = SchemaSnapshot::new(
            vec![table.clone()],
            vec![EnumDef::new("status", vec!["active".into(), "inactive".into()])],
        );
        let desired = SchemaSnapshot::new(
            vec![table],
            vec![EnumDef::new(
                "status",
                vec!["active".into(), "inactive".into(), "pending".into()],
            )],
        );
        let outcome = DiffEngine::new().diff(&current, &desired);
        assert_eq!(outcome.operations.len(), 1);
        let DiffOperation::AlterEnum {
            add_values,
            remove_values,
            new_values,
            dependent_columns,
            ..
        } = &outcome.operations[0]
        else {
            panic!("expected AlterEnum");
        };
        assert_eq!(add_values.as_deref(), Some(["pending".to_string()].as_slice()));
        assert!(remove_values.is_none());
        assert!(new_values.is_none());
        assert_eq!(dependent_columns, &vec![("users".to_string(), "status".to_string())]);
    }

    #[test]
    fn enum_remove_value_carries_dependents_and_new_values() {
        let mut table = table_with_columns("users", &["id"]);
        table
            .columns
            .push(ColumnDef::new("status", "status", false).with_enum_type("status"));
        let current = SchemaSnapshot::new(
            vec![table.clone()],
            vec![EnumDef::new(
                "status",
                vec!["active".into(), "inactive".into(), "pending".into()],
            )],
        );
        let desired = SchemaSnapshot::new(
            vec![table],
            vec![EnumDef::new("status", vec!["active".into(), "inactive".into()])],
        );
        let outcome = DiffEngine::new().diff(&current, &desired);
        assert_eq!(outcome.operations.len(), 1);
        let DiffOperation::AlterEnum {
            remove_values,
            new_values,
            dependent_columns,
            ..
        } = &outcome.operations[0]
        else {
            panic!("expected AlterEnum");
        };
        assert_eq!(remove_values.as_deref(), Some(["pending".to_string()].as_slice()));
        assert_eq!(
            new_values.as_deref(),
            Some(["active".to_string(), "inactive".to_string()].as_slice())
        );
        assert_eq!(dependent_columns, &vec![("users".to_string(), "status".to_string())]);
    }
}
