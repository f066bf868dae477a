//! The resolver (C5): turns each [`AmbiguousChange`] the differ couldn't
//! decide on its own into concrete operations, given a caller-supplied
//! [`ChangeResolution`] per ambiguity.

use crate::diff::DiffOutcome;
use crate::diff::columns_equal;
use crate::diffop::{AmbiguousChange, ChangeResolution, DiffOperation};
use crate::error::{Error, Result};
use crate::snapshot::{ColumnDef, SchemaSnapshot};

#[derive(Debug, Default, Clone, Copy)]
pub struct Resolver;

impl Resolver {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// `resolutions[i]` is the caller's decision for `outcome.ambiguous_changes[i]`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if the resolutions slice doesn't have
    /// exactly one entry per ambiguous change.
    pub fn resolve(
        &self,
        current: &SchemaSnapshot,
        desired: &SchemaSnapshot,
        outcome: DiffOutcome,
        resolutions: &[ChangeResolution],
    ) -> Result<Vec<DiffOperation>> {
        if resolutions.len() != outcome.ambiguous_changes.len() {
            return Err(Error::invalid_input(format!(
                "expected {} resolution(s) for {} ambiguous change(s), got {}",
                outcome.ambiguous_changes.len(),
                outcome.ambiguous_changes.len(),
                resolutions.len()
            )));
        }

        let mut operations = outcome.operations;
        for (change, resolution) in outcome.ambiguous_changes.iter().zip(resolutions) {
            resolve_one(current, desired, change, *resolution, &mut operations)?;
        }
        Ok(operations)
    }
}

fn resolve_one(
    current: &SchemaSnapshot,
    desired: &SchemaSnapshot,
    change: &AmbiguousChange,
    resolution: ChangeResolution,
    operations: &mut Vec<DiffOperation>,
) -> Result<()> {
    match (change, resolution) {
        (AmbiguousChange::AmbiguousTable { dropped, added }, ChangeResolution::Rename) => {
            operations.push(DiffOperation::RenameTable {
                from: dropped.clone(),
                to: added.clone(),
            });
        }
        (AmbiguousChange::AmbiguousTable { dropped, added }, ChangeResolution::AddAndDrop) => {
            let table = desired.table(added).ok_or_else(|| {
                Error::internal(format!("ambiguous change referenced unknown table `{added}`"))
            })?;
            operations.push(DiffOperation::DropTable {
                table: dropped.clone(),
            });
            operations.push(DiffOperation::CreateTable {
                table: table.name.clone(),
                columns: table.columns.clone(),
                primary_key: table.primary_key.clone(),
            });
        }
        (
            AmbiguousChange::AmbiguousColumn { table, dropped, added },
            ChangeResolution::Rename,
        ) => {
            operations.push(DiffOperation::RenameColumn {
                table: table.clone(),
                from: dropped.name.clone(),
                to: added.name.clone(),
            });
            let renamed = ColumnDef {
                name: added.name.clone(),
                ..dropped.clone()
            };
            if !columns_equal(&renamed, added) {
                operations.push(DiffOperation::AlterColumn {
                    table: table.clone(),
                    from: renamed,
                    to: added.clone(),
                });
            }
        }
        (
            AmbiguousChange::AmbiguousColumn { table, dropped, added },
            ChangeResolution::AddAndDrop,
        ) => {
            operations.push(DiffOperation::DropColumn {
                table: table.clone(),
                column: dropped.name.clone(),
            });
            operations.push(DiffOperation::AddColumn {
                table: table.clone(),
                column: added.clone(),
            });
        }
    }

    let _ = current;
    Ok(())
}
