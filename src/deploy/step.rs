//! The step model: atomic deployment operations and their apply protocol.
//!
//! A step is created by the step generator, applied exactly once by the
//! executor, and discarded. It is the only site that mutates a
//! [`crate::resource::ResourceState`] during a deployment.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::{InitError, Result, StepError};
use crate::provider::{Provider, ProviderReference};
use crate::resource::{ResourceStatus, SharedState, TypeToken, Urn};

use super::create::CreateStep;
use super::delete::{DeleteStep, RemovePendingReplaceStep};
use super::deployment::{
    Deployment, ReadResourceEvent, ReadResult, RegisterResourceEvent, RegisterResult,
};
use super::import::ImportStep;
use super::ops::StepOp;
use super::read::ReadStep;
use super::refresh::RefreshStep;
use super::replace::ReplaceStep;
use super::same::SameStep;
use super::update::UpdateStep;

/// The deferred action the executor dispatches after it has persisted a
/// step's effects to the snapshot.
///
/// Completions are data-only: dispatching one signals the originating
/// event but never mutates resource state.
#[derive(Debug)]
pub enum StepCompletion {
    /// Signal a resource registration with the step's final state.
    Register {
        /// The registration to signal.
        event: Arc<dyn RegisterResourceEvent>,
        /// The state to convey.
        state: SharedState,
    },
    /// Signal a resource read with the step's final state.
    ReadDone {
        /// The read to signal.
        event: Arc<dyn ReadResourceEvent>,
        /// The state to convey.
        state: SharedState,
    },
    /// Close a refresh completion channel.
    Signal(oneshot::Sender<()>),
    /// Nothing to signal; the step still participates in commit ordering.
    Noop,
}

impl StepCompletion {
    /// Dispatches the completion, consuming it; a completion cannot be
    /// dispatched twice.
    pub fn invoke(self) {
        match self {
            Self::Register { event, state } => event.done(RegisterResult { state }),
            Self::ReadDone { event, state } => event.done(ReadResult { state }),
            Self::Signal(sender) => {
                let _ = sender.send(());
            }
            Self::Noop => {}
        }
    }
}

/// Outcome of a successful (or partially failed) step application.
///
/// Hard failures are returned as [`StepError`] instead and therefore
/// cannot carry a completion; a partial failure carries both the
/// completion and the initialization error to surface.
#[derive(Debug)]
pub struct StepApplyOutcome {
    /// Consistency of the real-world resource after the step.
    pub status: ResourceStatus,
    /// Deferred action to dispatch after snapshot persistence, if any.
    pub completion: Option<StepCompletion>,
    /// Initialization error accompanying a partial failure; the executor
    /// surfaces it for reporting while still committing the state.
    pub init_error: Option<InitError>,
}

impl StepApplyOutcome {
    /// A fully successful outcome.
    #[must_use]
    pub fn ok(completion: Option<StepCompletion>) -> Self {
        Self {
            status: ResourceStatus::Ok,
            completion,
            init_error: None,
        }
    }
}

/// A deployment step: one atomic operation against a resource and its
/// checkpointed state.
#[derive(Debug)]
pub enum Step {
    /// No change; carries identity and outputs forward.
    Same(SameStep),
    /// Create a resource, plainly or as half of a replacement.
    Create(CreateStep),
    /// Update a resource in place.
    Update(UpdateStep),
    /// Delete a resource, plainly or as half of a replacement.
    Delete(DeleteStep),
    /// Remove a state entry left by a failed delete-after-replace.
    RemovePendingReplace(RemovePendingReplaceStep),
    /// Logical record that a replacement happened.
    Replace(ReplaceStep),
    /// Read an external resource into the state.
    Read(ReadStep),
    /// Reconcile a resource's state with reality.
    Refresh(RefreshStep),
    /// Adopt an existing resource under management.
    Import(ImportStep),
}

impl Step {
    /// The operation performed by this step.
    #[must_use]
    pub fn op(&self) -> StepOp {
        match self {
            Self::Same(step) => step.op(),
            Self::Create(step) => step.op(),
            Self::Update(step) => step.op(),
            Self::Delete(step) => step.op(),
            Self::RemovePendingReplace(step) => step.op(),
            Self::Replace(step) => step.op(),
            Self::Read(step) => step.op(),
            Self::Refresh(step) => step.op(),
            Self::Import(step) => step.op(),
        }
    }

    /// The URN of the resource this step affects.
    #[must_use]
    pub fn urn(&self) -> Urn {
        match self {
            Self::Same(step) => step.urn(),
            Self::Create(step) => step.urn(),
            Self::Update(step) => step.urn(),
            Self::Delete(step) => step.urn(),
            Self::RemovePendingReplace(step) => step.urn(),
            Self::Replace(step) => step.urn(),
            Self::Read(step) => step.urn(),
            Self::Refresh(step) => step.urn(),
            Self::Import(step) => step.urn(),
        }
    }

    /// The type token of the affected resource.
    #[must_use]
    pub fn type_token(&self) -> TypeToken {
        match self {
            Self::Same(step) => step.type_token(),
            Self::Create(step) => step.type_token(),
            Self::Update(step) => step.type_token(),
            Self::Delete(step) => step.type_token(),
            Self::RemovePendingReplace(step) => step.type_token(),
            Self::Replace(step) => step.type_token(),
            Self::Read(step) => step.type_token(),
            Self::Refresh(step) => step.type_token(),
            Self::Import(step) => step.type_token(),
        }
    }

    /// The provider reference for this step.
    #[must_use]
    pub fn provider(&self) -> String {
        match self {
            Self::Same(step) => step.provider(),
            Self::Create(step) => step.provider(),
            Self::Update(step) => step.provider(),
            Self::Delete(step) => step.provider(),
            Self::RemovePendingReplace(step) => step.provider(),
            Self::Replace(step) => step.provider(),
            Self::Read(step) => step.provider(),
            Self::Refresh(step) => step.provider(),
            Self::Import(step) => step.provider(),
        }
    }

    /// The state of the resource before this step, if one exists.
    #[must_use]
    pub fn old(&self) -> Option<&SharedState> {
        match self {
            Self::Same(step) => Some(step.old_state()),
            Self::Create(step) => step.old_state(),
            Self::Update(step) => Some(step.old_state()),
            Self::Delete(step) => Some(step.old_state()),
            Self::RemovePendingReplace(step) => Some(step.old_state()),
            Self::Replace(step) => Some(step.old_state()),
            Self::Read(step) => step.old_state(),
            Self::Refresh(step) => Some(step.old_state()),
            Self::Import(step) => step.old_state(),
        }
    }

    /// The state of the resource after this step, if one exists.
    #[must_use]
    pub fn new(&self) -> Option<&SharedState> {
        match self {
            Self::Same(step) => Some(step.new_state()),
            Self::Create(step) => Some(step.new_state()),
            Self::Update(step) => Some(step.new_state()),
            Self::Delete(_) | Self::RemovePendingReplace(_) => None,
            Self::Replace(step) => Some(step.new_state()),
            Self::Read(step) => Some(step.new_state()),
            Self::Refresh(step) => step.new_state(),
            Self::Import(step) => Some(step.new_state()),
        }
    }

    /// The latest state known for the resource (worst case, the old one).
    #[must_use]
    pub fn res(&self) -> &SharedState {
        match self {
            Self::Same(step) => step.new_state(),
            Self::Create(step) => step.new_state(),
            Self::Update(step) => step.new_state(),
            Self::Delete(step) => step.old_state(),
            Self::RemovePendingReplace(step) => step.old_state(),
            Self::Replace(step) => step.new_state(),
            Self::Read(step) => step.new_state(),
            Self::Refresh(step) => step.old_state(),
            Self::Import(step) => step.new_state(),
        }
    }

    /// True if this step represents a logical operation in the program.
    #[must_use]
    pub fn logical(&self) -> bool {
        match self {
            Self::Same(_) | Self::Update(_) | Self::Replace(_) => true,
            Self::Create(step) => !step.replacing(),
            Self::Delete(step) => !step.replacing(),
            Self::RemovePendingReplace(_) | Self::Refresh(_) => false,
            Self::Read(step) => !step.replacing(),
            Self::Import(step) => !step.replacing(),
        }
    }

    /// The deployment this step belongs to.
    #[must_use]
    pub fn deployment(&self) -> &Arc<Deployment> {
        match self {
            Self::Same(step) => step.deployment(),
            Self::Create(step) => step.deployment(),
            Self::Update(step) => step.deployment(),
            Self::Delete(step) => step.deployment(),
            Self::RemovePendingReplace(step) => step.deployment(),
            Self::Replace(step) => step.deployment(),
            Self::Read(step) => step.deployment(),
            Self::Refresh(step) => step.deployment(),
            Self::Import(step) => step.deployment(),
        }
    }

    /// Applies or previews this step.
    ///
    /// The returned completion, if any, must be dispatched after the
    /// step's effects are committed to the snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`StepError`] on hard failure; partial failures are
    /// reported through the outcome instead.
    pub async fn apply(&mut self, preview: bool) -> Result<StepApplyOutcome> {
        match self {
            Self::Same(step) => step.apply(preview).await,
            Self::Create(step) => step.apply(preview).await,
            Self::Update(step) => step.apply(preview).await,
            Self::Delete(step) => step.apply(preview).await,
            Self::RemovePendingReplace(step) => step.apply(preview).await,
            Self::Replace(step) => step.apply(preview).await,
            Self::Read(step) => step.apply(preview).await,
            Self::Refresh(step) => step.apply(preview).await,
            Self::Import(step) => step.apply(preview).await,
        }
    }
}

/// Locates the provider a step must invoke.
///
/// Provider-typed resources resolve to the deployment's own registry;
/// everything else parses the step's provider reference and looks it up,
/// rejecting deny-default references with a package-specific diagnostic.
pub(crate) fn resolve_provider(
    deployment: &Arc<Deployment>,
    type_token: &TypeToken,
    provider: &str,
    urn: &Urn,
) -> Result<Arc<dyn Provider>> {
    if type_token.is_provider() {
        return Ok(Arc::clone(deployment.providers()) as Arc<dyn Provider>);
    }
    let reference =
        ProviderReference::parse(provider).map_err(|err| StepError::BadProviderReference {
            reference: provider.to_string(),
            urn: urn.clone(),
            reason: err.to_string(),
        })?;
    if reference.is_deny_default() {
        return Err(StepError::DefaultProviderDenied {
            package: reference.package(),
            urn: urn.clone(),
        });
    }
    deployment
        .providers()
        .get(&reference)
        .ok_or_else(|| StepError::UnknownProvider {
            reference: provider.to_string(),
            urn: urn.clone(),
        })
}
