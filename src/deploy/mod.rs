//! The deployment step engine.
//!
//! Steps are the atomic operations of a deployment: each one invokes a
//! resource provider to mutate the real world and evolves the
//! checkpointed state accordingly. The step generator decides which steps
//! to emit and the executor schedules them; this module owns what each
//! step *means*.

mod create;
mod delete;
mod deployment;
mod diff;
mod import;
mod ops;
mod read;
mod refresh;
mod replace;
mod same;
mod step;
#[cfg(test)]
mod testutil;
mod update;

pub use create::CreateStep;
pub use delete::{DeleteStep, RemovePendingReplaceStep};
pub use deployment::{
    Deployment, DiagSink, ImportDirective, NoopRegisterEvent, ReadResourceEvent, ReadResult,
    RegisterResourceEvent, RegisterResult, TracingDiag,
};
pub use diff::{diff_inputs, process_ignore_changes, DiffResult, PropertyDiff, PropertyDiffKind};
pub use import::ImportStep;
pub use ops::{StepOp, ALL_OPS};
pub use read::ReadStep;
pub use refresh::RefreshStep;
pub use replace::ReplaceStep;
pub use same::SameStep;
pub use step::{Step, StepApplyOutcome, StepCompletion};
pub use update::UpdateStep;
