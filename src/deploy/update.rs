//! The update step: mutate an existing resource in place.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::error::Result;
use crate::resource::{ResourceStatus, SharedState, SharedStateExt, TypeToken, Urn};

use super::deployment::{Deployment, RegisterResourceEvent};
use super::diff::PropertyDiff;
use super::ops::StepOp;
use super::step::{resolve_provider, StepApplyOutcome, StepCompletion};

/// A step that updates an existing resource's state through its provider.
#[derive(Debug)]
pub struct UpdateStep {
    deployment: Arc<Deployment>,
    reg: Arc<dyn RegisterResourceEvent>,
    old: SharedState,
    new: SharedState,
    /// Properties that are known not to change during this update.
    stables: Vec<String>,
    /// The keys causing a diff.
    diffs: Vec<String>,
    /// The structured property diff.
    detailed_diff: BTreeMap<String, PropertyDiff>,
    /// Property paths to ignore when updating; the diff consumer has
    /// already applied them, but the provider may honor them for nested
    /// logic.
    ignore_changes: Vec<String>,
}

impl UpdateStep {
    /// Creates an update step.
    ///
    /// # Panics
    ///
    /// Panics if either state violates the step construction invariants.
    /// Updates never run for external resources.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        deployment: Arc<Deployment>,
        reg: Arc<dyn RegisterResourceEvent>,
        old: SharedState,
        new: SharedState,
        stables: Vec<String>,
        diffs: Vec<String>,
        detailed_diff: BTreeMap<String, PropertyDiff>,
        ignore_changes: Vec<String>,
    ) -> Self {
        {
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
            assert!(!old.delete, "old state must not be marked for deletion");
            assert!(!old.external, "old state must not be an external resource");
        }
        {
            let new = new.read_state();
            assert!(!new.urn.is_empty(), "new state must have a URN");
            assert!(new.id.is_empty(), "new state must not have an ID");
            assert!(
                !new.custom || !new.provider.is_empty() || new.is_provider(),
                "new state must have or be a provider if it is a custom resource"
            );
            assert!(!new.delete, "new state must not be marked for deletion");
            assert!(!new.external, "new state must not be an external resource");
        }
        Self {
            deployment,
            reg,
            old,
            new,
            stables,
            diffs,
            detailed_diff,
            ignore_changes,
        }
    }

    /// Properties that are known not to change during this update.
    #[must_use]
    pub fn stables(&self) -> &[String] {
        &self.stables
    }

    /// The keys that caused a diff.
    #[must_use]
    pub fn diffs(&self) -> &[String] {
        &self.diffs
    }

    /// The structured property diff.
    #[must_use]
    pub fn detailed_diff(&self) -> &BTreeMap<String, PropertyDiff> {
        &self.detailed_diff
    }

    pub(crate) fn op(&self) -> StepOp {
        StepOp::Update
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

    /// Invokes the provider's Update RPC for custom resources. The new
    /// state inherits the old ID and creation timestamp; a mutation bumps
    /// the modification timestamp.
    pub(crate) async fn apply(&mut self, _preview: bool) -> Result<StepApplyOutcome> {
        // Always propagate the ID and timestamps, even in previews.
        {
            let old = self.old.read_state();
            let mut new = self.new.write_state();
            new.id = old.id.clone();
            new.created = old.created;
            new.modified = old.modified;
        }

        let mut status = ResourceStatus::Ok;
        let mut init_error = None;

        let is_custom = self.new.read_state().custom;
        if is_custom {
            let (urn, type_token, provider_ref, new_inputs, timeout) = {
                let new = self.new.read_state();
                (
                    new.urn.clone(),
                    new.type_token.clone(),
                    new.provider.clone(),
                    new.inputs.clone(),
                    new.custom_timeouts.update,
                )
            };
            let (old_id, old_inputs, old_outputs) = {
                let old = self.old.read_state();
                (old.id.clone(), old.inputs.clone(), old.outputs.clone())
            };
            let provider = resolve_provider(&self.deployment, &type_token, &provider_ref, &urn)?;
            debug!(urn = %urn, id = %old_id, "updating resource");
            let response = provider
                .update(
                    &urn,
                    &old_id,
                    &old_inputs,
                    &old_outputs,
                    &new_inputs,
                    timeout,
                    &self.ignore_changes,
                    self.deployment.is_preview(),
                )
                .await?;

            status = response.status;
            if let Some(err) = response.init_error {
                self.new.write_state().init_errors = err.reasons.clone();
                init_error = Some(err);
            }

            // Copy output state back in case the update cascaded to other
            // properties, and record that the resource was modified now.
            let mut new = self.new.write_state();
            new.outputs = response.outputs;
            new.modified = Some(Utc::now());
        }

        Ok(StepApplyOutcome {
            status,
            completion: Some(StepCompletion::Register {
                event: Arc::clone(&self.reg),
                state: Arc::clone(&self.new),
            }),
            init_error,
        })
    }
}
