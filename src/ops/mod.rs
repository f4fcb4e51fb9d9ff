//! The six stage operators.
//!
//! Every operator has the shape `apply(&Table, &config, stage, &mut
//! Warnings) -> Table` and is **total**: malformed configuration or
//! missing referenced columns yield the unchanged input table plus a
//! collected warning, never an error. Run-level failure is reserved for
//! dataset-level problems and lives in the executor.

pub mod aggregate;
pub mod clean;
pub mod filter;
pub mod select;
pub mod sort;
pub mod transform;

use crate::error::Warnings;
use crate::stage::{StageDef, StageKind};
use crate::table::Table;

/// Apply one stage to a table, dispatching on the stage kind.
pub fn apply_stage(table: &Table, stage: &StageDef, warnings: &mut Warnings) -> Table {
    let label = stage.label();
    let config = &stage.configuration;
    match stage.kind {
        StageKind::Filter => filter::apply(table, config, label, warnings),
        StageKind::Transform => transform::apply(table, config, label, warnings),
        StageKind::Aggregate => aggregate::apply(table, config, label, warnings),
        StageKind::Clean => clean::apply(table, config, label, warnings),
        StageKind::Select => select::apply(table, config, label, warnings),
        StageKind::Sort => sort::apply(table, config, label, warnings),
    }
}
