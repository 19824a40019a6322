//! The delete step and the pending-replace cleanup step.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, StepError};
use crate::resource::{SharedState, SharedStateExt, TypeToken, Urn};

use super::deployment::Deployment;
use super::ops::StepOp;
use super::step::{resolve_provider, StepApplyOutcome, StepCompletion};

/// A step that deletes an existing resource, either plainly or as the
/// delete half of a replacement.
///
/// Deleting an external resource is a no-op against the provider, since we
/// do not own its lifecycle; the state entry is still dropped.
#[derive(Debug)]
pub struct DeleteStep {
    deployment: Arc<Deployment>,
    old: SharedState,
    replacing: bool,
    /// URNs of the other resources planned for deletion in this run; a
    /// resource deleted with one of them skips its own provider call.
    other_deletions: HashSet<Urn>,
}

impl DeleteStep {
    /// Creates a plain delete step.
    ///
    /// # Panics
    ///
    /// Panics if the old state violates the step construction invariants.
    #[must_use]
    pub fn new(deployment: Arc<Deployment>, other_deletions: HashSet<Urn>, old: SharedState) -> Self {
        check_old_state(&old);
        Self {
            deployment,
            old,
            replacing: false,
            other_deletions,
        }
    }

    /// Creates the delete half of a replacement.
    ///
    /// Two flavors exist: a delete-before-replace keeps the resource in
    /// the checkpoint for integrity, signalled by setting
    /// `pending_replace`; a delete-after-replace persists the owed
    /// deletion through the old state's `delete` flag instead, so that a
    /// failure before this step runs is settled on the next deployment.
    ///
    /// # Panics
    ///
    /// Panics if the old state violates the step construction invariants,
    /// or if `pending_replace` is set while the state is already marked
    /// for deletion.
    #[must_use]
    pub fn replacement(
        deployment: Arc<Deployment>,
        other_deletions: HashSet<Urn>,
        old: SharedState,
        pending_replace: bool,
    ) -> Self {
        check_old_state(&old);
        {
            let mut state = old.write_state();
            assert!(
                pending_replace != state.delete,
                "resource {} cannot be pending replacement and deletion at the same time",
                state.urn
            );
            state.pending_replacement = pending_replace;
        }
        Self {
            deployment,
            old,
            replacing: true,
            other_deletions,
        }
    }

    pub(crate) fn op(&self) -> StepOp {
        let old = self.old.read_state();
        match (old.external, self.replacing) {
            (true, true) => StepOp::DiscardReplaced,
            (true, false) => StepOp::Discard,
            (false, true) => StepOp::DeleteReplaced,
            (false, false) => StepOp::Delete,
        }
    }

    pub(crate) fn replacing(&self) -> bool {
        self.replacing
    }

    pub(crate) fn urn(&self) -> Urn {
        self.old.read_state().urn.clone()
    }

    pub(crate) fn type_token(&self) -> TypeToken {
        self.old.read_state().type_token.clone()
    }

    pub(crate) fn provider(&self) -> String {
        self.old.read_state().provider.clone()
    }

    pub(crate) fn old_state(&self) -> &SharedState {
        &self.old
    }

    pub(crate) fn deployment(&self) -> &Arc<Deployment> {
        &self.deployment
    }

    /// Deletes the resource through its provider unless a row of the
    /// operational matrix (protect, preview, external, retain-on-delete,
    /// deleted-with) says otherwise.
    pub(crate) async fn apply(&mut self, preview: bool) -> Result<StepApplyOutcome> {
        // Refuse to delete protected resources unless we are replacing
        // them, in which case protection was checked upstream.
        {
            let old = self.old.read_state();
            if !self.replacing && old.protect {
                return Err(StepError::DeleteProtected {
                    urn: old.urn.clone(),
                });
            }
        }

        let (urn, type_token, provider_ref, id, inputs, outputs, timeout, call_provider) = {
            let old = self.old.read_state();
            let deleted_with_other = old
                .deleted_with
                .as_ref()
                .is_some_and(|with| self.other_deletions.contains(with));
            let call_provider = !preview
                && !old.external
                && !old.retain_on_delete
                && !deleted_with_other
                && old.custom;
            (
                old.urn.clone(),
                old.type_token.clone(),
                old.provider.clone(),
                old.id.clone(),
                old.inputs.clone(),
                old.outputs.clone(),
                old.custom_timeouts.delete,
                call_provider,
            )
        };

        if call_provider {
            let provider = resolve_provider(&self.deployment, &type_token, &provider_ref, &urn)?;
            debug!(urn = %urn, id = %id, "deleting resource");
            provider.delete(&urn, &id, &inputs, &outputs, timeout).await?;
        }

        Ok(StepApplyOutcome::ok(Some(StepCompletion::Noop)))
    }
}

fn check_old_state(old: &SharedState) {
    let old = old.read_state();
    assert!(!old.urn.is_empty(), "old state must have a URN");
    assert!(
        !old.id.is_empty() || !old.custom,
        "old state must have an ID if it is a custom resource"
    );
    assert!(
        !old.custom || !old.provider.is_empty() || old.is_provider(),
        "old state must have or be a provider if it is a custom resource"
    );
}

/// A pure state-cleanup step that drops an entry previously marked
/// pending-replacement, once the owed deletion has been settled.
#[derive(Debug)]
pub struct RemovePendingReplaceStep {
    deployment: Arc<Deployment>,
    old: SharedState,
}

impl RemovePendingReplaceStep {
    /// Creates a pending-replace cleanup step.
    ///
    /// # Panics
    ///
    /// Panics if the old state is not marked pending replacement.
    #[must_use]
    pub fn new(deployment: Arc<Deployment>, old: SharedState) -> Self {
        assert!(
            old.read_state().pending_replacement,
            "old state must be pending replacement"
        );
        Self { deployment, old }
    }

    pub(crate) fn op(&self) -> StepOp {
        StepOp::RemovePendingReplace
    }

    pub(crate) fn urn(&self) -> Urn {
        self.old.read_state().urn.clone()
    }

    pub(crate) fn type_token(&self) -> TypeToken {
        self.old.read_state().type_token.clone()
    }

    pub(crate) fn provider(&self) -> String {
        self.old.read_state().provider.clone()
    }

    pub(crate) fn old_state(&self) -> &SharedState {
        &self.old
    }

    pub(crate) fn deployment(&self) -> &Arc<Deployment> {
        &self.deployment
    }

    /// A no-op; the executor's commit path drops the entry.
    pub(crate) async fn apply(&mut self, _preview: bool) -> Result<StepApplyOutcome> {
        Ok(StepApplyOutcome::ok(None))
    }
}
