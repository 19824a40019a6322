//! The read step: project an externally-owned resource into the state.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{Result, StepError};
use crate::provider::UNKNOWN_STRING_VALUE;
use crate::resource::{PropertyMap, ResourceStatus, SharedState, SharedStateExt, TypeToken, Urn};

use super::deployment::{Deployment, ReadResourceEvent};
use super::ops::StepOp;
use super::step::{resolve_provider, StepApplyOutcome, StepCompletion};

/// A step that reads an existing resource whose lifecycle is owned outside
/// this system.
///
/// A URN can transition freely between external and owned: reading a
/// previously-owned resource is a read-replacement, which pends deletion
/// of the owned state.
#[derive(Debug)]
pub struct ReadStep {
    deployment: Arc<Deployment>,
    event: Arc<dyn ReadResourceEvent>,
    /// The old resource state, if one exists for this URN.
    old: Option<SharedState>,
    /// The new resource state, used to query the provider.
    new: SharedState,
    replacing: bool,
}

impl ReadStep {
    /// Creates a plain read step.
    ///
    /// # Panics
    ///
    /// Panics if the new state violates the step construction invariants,
    /// or if an old state is present that is neither external nor carrying
    /// the same ID.
    #[must_use]
    pub fn new(
        deployment: Arc<Deployment>,
        event: Arc<dyn ReadResourceEvent>,
        old: Option<SharedState>,
        new: SharedState,
    ) -> Self {
        check_new_state(&new);
        if let Some(old) = &old {
            let old = old.read_state();
            let new = new.read_state();
            assert!(
                old.id == new.id || old.external,
                "old state must have the same ID as new or be external"
            );
        }
        Self {
            deployment,
            event,
            old,
            new,
            replacing: false,
        }
    }

    /// Creates a read step that replaces an owned resource, pending its
    /// deletion.
    ///
    /// # Panics
    ///
    /// Panics if the new state violates the step construction invariants,
    /// or if the old state is external: ownership must be transitioning
    /// away from this system.
    #[must_use]
    pub fn replacement(
        deployment: Arc<Deployment>,
        event: Arc<dyn ReadResourceEvent>,
        old: SharedState,
        new: SharedState,
    ) -> Self {
        check_new_state(&new);
        assert!(
            !old.read_state().external,
            "old state must not be marked as external"
        );
        Self {
            deployment,
            event,
            old: Some(old),
            new,
            replacing: true,
        }
    }

    pub(crate) fn op(&self) -> StepOp {
        if self.replacing {
            StepOp::ReadReplacement
        } else {
            StepOp::Read
        }
    }

    pub(crate) fn replacing(&self) -> bool {
        self.replacing
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

    pub(crate) fn old_state(&self) -> Option<&SharedState> {
        self.old.as_ref()
    }

    pub(crate) fn new_state(&self) -> &SharedState {
        &self.new
    }

    pub(crate) fn deployment(&self) -> &Arc<Deployment> {
        &self.deployment
    }

    /// Reads the resource from its provider. Unlike most steps, reads run
    /// during previews; the only time we cannot is when the ID is still
    /// unknown.
    pub(crate) async fn apply(&mut self, _preview: bool) -> Result<StepApplyOutcome> {
        let mut status = ResourceStatus::Ok;
        let mut init_error = None;

        let id = self.new.read_state().id.clone();
        if id == UNKNOWN_STRING_VALUE {
            self.new.write_state().outputs = PropertyMap::new();
        } else {
            let (urn, type_token, provider_ref, new_inputs) = {
                let new = self.new.read_state();
                (
                    new.urn.clone(),
                    new.type_token.clone(),
                    new.provider.clone(),
                    new.inputs.clone(),
                )
            };
            let provider = resolve_provider(&self.deployment, &type_token, &provider_ref, &urn)?;
            let response = provider.read(&urn, &id, None, Some(&new_inputs)).await?;

            status = response.status;
            if let Some(err) = response.init_error {
                self.new.write_state().init_errors = err.reasons.clone();
                init_error = Some(err);
            }

            // If there is no such resource, say so.
            let Some(outputs) = response.outputs else {
                return Err(StepError::ResourceNotFound { id });
            };
            let mut new = self.new.write_state();
            new.outputs = outputs;
            if !response.id.is_empty() {
                new.id = response.id;
            }
        }

        // If we were asked to replace an existing owned resource, pend the
        // deletion here.
        if self.replacing {
            if let Some(old) = &self.old {
                old.write_state().delete = true;
            }
        }

        // Propagate timestamps, bumping the modification instant only when
        // the read surfaced values that differ from the old state.
        if let Some(old) = &self.old {
            let (created, modified, inputs_changed, outputs_changed) = {
                let old = old.read_state();
                let new = self.new.read_state();
                (
                    old.created,
                    old.modified,
                    new.inputs.differs_from(&old.inputs),
                    new.outputs.differs_from(&old.outputs),
                )
            };
            let mut new = self.new.write_state();
            new.created = created;
            new.modified = modified;
            if inputs_changed || outputs_changed {
                new.modified = Some(Utc::now());
            }
        }

        Ok(StepApplyOutcome {
            status,
            completion: Some(StepCompletion::ReadDone {
                event: Arc::clone(&self.event),
                state: Arc::clone(&self.new),
            }),
            init_error,
        })
    }
}

fn check_new_state(new: &SharedState) {
    let new = new.read_state();
    assert!(!new.urn.is_empty(), "new state must have a URN");
    assert!(!new.id.is_empty(), "new state must have an ID");
    assert!(new.external, "new state must be marked as external");
    assert!(new.custom, "new state must be a custom resource");
}
