//! Planning and executing bulk ID changes.
//!
//! A [`Plan`] is computed from a loaded directory without touching the disk.
//! It lists every ID change, reference rewrite and file rename, and renders
//! the same preview whether or not it is then executed. A [`Migration`]
//! applies a plan in stages: snapshot, IDs, references, file names, and a
//! final reload to verify the result.

mod backup;
mod engine;
mod plan;

pub use backup::MAPPING_FILE;
pub use engine::{
    LEGACY_ID_PROPERTY, Migration, MigrationError, Outcome, SequenceConflict, Stage, StepError,
    Verification, verify,
};
pub use plan::{FileRename, IdChange, Plan, PlanError, ReferenceUpdate, SkipReason, Skipped, Strategy};
