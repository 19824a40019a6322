//! The no-op step: nothing changed, carry identity and outputs forward.

use std::sync::Arc;

use crate::error::Result;
use crate::resource::{SharedState, SharedStateExt, TypeToken, Urn};

use super::deployment::{Deployment, RegisterResourceEvent};
use super::ops::StepOp;
use super::step::{StepApplyOutcome, StepCompletion};

/// A step that does nothing to the provider but still retires the
/// registration and preserves the resource's ID and outputs.
#[derive(Debug)]
pub struct SameStep {
    deployment: Arc<Deployment>,
    reg: Arc<dyn RegisterResourceEvent>,
    old: SharedState,
    new: SharedState,
    /// Set when the user limited the deployment targets and excluded this
    /// resource's creation. Skipped creates must not be written to the
    /// checkpoint; the surrounding layer filters on [`Self::is_skipped_create`].
    skipped_create: bool,
}

impl SameStep {
    /// Creates a same step over an unchanged resource.
    ///
    /// # Panics
    ///
    /// Panics if either state violates the step construction invariants;
    /// such a violation is a programmer error.
    #[must_use]
    pub fn new(
        deployment: Arc<Deployment>,
        reg: Arc<dyn RegisterResourceEvent>,
        old: SharedState,
        new: SharedState,
    ) -> Self {
        {
            let old = old.read_state();
            assert!(!old.urn.is_empty(), "old state must have a URN");
            assert!(
                !old.id.is_empty() || !old.custom,
                "old state must have an ID if it is custom"
            );
            assert!(
                !old.custom || !old.provider.is_empty() || old.is_provider(),
                "old state must have or be a provider if it is a custom resource"
            );
            assert!(!old.delete, "old state must not be marked for deletion");
        }
        check_new_state(&new);
        Self {
            deployment,
            reg,
            old,
            new,
            skipped_create: false,
        }
    }

    /// Creates a same step for a resource whose creation was skipped
    /// because the user excluded it from the deployment targets.
    ///
    /// The old state is a direct copy of the new one, so the step acts as
    /// a pure no-op that still completes the registration.
    ///
    /// # Panics
    ///
    /// Panics if the new state violates the step construction invariants.
    #[must_use]
    pub fn skipped_create(
        deployment: Arc<Deployment>,
        reg: Arc<dyn RegisterResourceEvent>,
        new: SharedState,
    ) -> Self {
        check_new_state(&new);
        let old = crate::resource::shared(new.read_state().clone());
        Self {
            deployment,
            reg,
            old,
            new,
            skipped_create: true,
        }
    }

    /// Returns true if this same stands in for a creation that was
    /// excluded from the deployment targets.
    #[must_use]
    pub fn is_skipped_create(&self) -> bool {
        self.skipped_create
    }

    pub(crate) fn op(&self) -> StepOp {
        StepOp::Same
    }

    pub(crate) fn urn(&self) -> Urn {
        self.new.read_state().urn.clone()
    }

    pub(crate) fn type_token(&self) -> TypeToken {
        self.new.read_state().type_token.clone()
    }

    pub(crate) fn provider(&self) -> String {
        self.new.read_state().provider.clone()
    }

    pub(crate) fn old_state(&self) -> &SharedState {
        &self.old
    }

    pub(crate) fn new_state(&self) -> &SharedState {
        &self.new
    }

    pub(crate) fn deployment(&self) -> &Arc<Deployment> {
        &self.deployment
    }

    /// Carries the ID and outputs forward and, for unchanged provider
    /// resources, re-registers the provider so later steps can resolve it.
    pub(crate) async fn apply(&mut self, _preview: bool) -> Result<StepApplyOutcome> {
        {
            let old = self.old.read_state();
            let mut new = self.new.write_state();
            new.id = old.id.clone();
            new.outputs = old.outputs.clone();
        }

        let provider_state = {
            let new = self.new.read_state();
            new.is_provider().then(|| new.clone())
        };
        if let Some(state) = provider_state {
            if !self.skipped_create {
                self.deployment.same_provider(&state).await?;
            }
        }

        Ok(StepApplyOutcome::ok(Some(StepCompletion::Register {
            event: Arc::clone(&self.reg),
            state: Arc::clone(&self.new),
        })))
    }
}

fn check_new_state(new: &SharedState) {
    let new = new.read_state();
    assert!(!new.urn.is_empty(), "new state must have a URN");
    assert!(new.id.is_empty(), "new state must not have an ID");
    assert!(
        !new.custom || !new.provider.is_empty() || new.is_provider(),
        "new state must have or be a provider if it is a custom resource"
    );
    assert!(!new.delete, "new state must not be marked for deletion");
}
