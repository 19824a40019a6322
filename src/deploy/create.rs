//! The create step: materialise an entirely new resource.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::error::{Result, StepError};
use crate::resource::{ResourceStatus, SharedState, SharedStateExt, TypeToken, Urn};

use super::deployment::{Deployment, RegisterResourceEvent};
use super::diff::PropertyDiff;
use super::ops::StepOp;
use super::step::{resolve_provider, StepApplyOutcome, StepCompletion};

/// A step that creates a resource, either plainly or as the create half of
/// a replacement.
#[derive(Debug)]
pub struct CreateStep {
    deployment: Arc<Deployment>,
    reg: Arc<dyn RegisterResourceEvent>,
    /// The outgoing state; only present for replacements.
    old: Option<SharedState>,
    new: SharedState,
    /// The keys causing replacement; only for replacements.
    keys: Vec<String>,
    /// The keys causing a diff; only for replacements.
    diffs: Vec<String>,
    /// The structured property diff; only for replacements.
    detailed_diff: BTreeMap<String, PropertyDiff>,
    replacing: bool,
    /// True if this replacement should mark the old state for a pending
    /// delete.
    pending_delete: bool,
}

impl CreateStep {
    /// Creates a plain create step.
    ///
    /// # Panics
    ///
    /// Panics if the new state violates the step construction invariants.
    #[must_use]
    pub fn new(
        deployment: Arc<Deployment>,
        reg: Arc<dyn RegisterResourceEvent>,
        new: SharedState,
    ) -> Self {
        check_new_state(&new);
        Self {
            deployment,
            reg,
            old: None,
            new,
            keys: Vec::new(),
            diffs: Vec::new(),
            detailed_diff: BTreeMap::new(),
            replacing: false,
            pending_delete: false,
        }
    }

    /// Creates the create half of a replacement, carrying the outgoing old
    /// state and the diff that caused the replacement.
    ///
    /// # Panics
    ///
    /// Panics if either state violates the step construction invariants.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn replacement(
        deployment: Arc<Deployment>,
        reg: Arc<dyn RegisterResourceEvent>,
        old: SharedState,
        new: SharedState,
        keys: Vec<String>,
        diffs: Vec<String>,
        detailed_diff: BTreeMap<String, PropertyDiff>,
        pending_delete: bool,
    ) -> Self {
        {
            let old = old.read_state();
            assert!(!old.urn.is_empty(), "old state must have a URN");
            assert!(
                !old.id.is_empty() || !old.custom,
                "old state must have an ID if it is a custom resource"
            );
            assert!(!old.delete, "old state must not be marked for deletion");
        }
        check_new_state(&new);
        Self {
            deployment,
            reg,
            old: Some(old),
            new,
            keys,
            diffs,
            detailed_diff,
            replacing: true,
            pending_delete,
        }
    }

    /// The keys that caused the replacement.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
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
        if self.replacing {
            StepOp::CreateReplacement
        } else {
            StepOp::Create
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

    /// Invokes the provider's Create RPC for custom resources and stamps
    /// both timestamps to the apply instant.
    pub(crate) async fn apply(&mut self, preview: bool) -> Result<StepApplyOutcome> {
        let mut status = ResourceStatus::Ok;
        let mut init_error = None;

        let is_custom = self.new.read_state().custom;
        if is_custom {
            let (urn, type_token, provider_ref, inputs, timeout) = {
                let new = self.new.read_state();
                (
                    new.urn.clone(),
                    new.type_token.clone(),
                    new.provider.clone(),
                    new.inputs.clone(),
                    new.custom_timeouts.create,
                )
            };
            let provider = resolve_provider(&self.deployment, &type_token, &provider_ref, &urn)?;
            debug!(urn = %urn, "creating resource");
            let response = provider
                .create(&urn, &inputs, timeout, self.deployment.is_preview())
                .await?;

            status = response.status;
            if let Some(err) = response.init_error {
                self.new.write_state().init_errors = err.reasons.clone();
                init_error = Some(err);
            }

            if !preview && response.id.is_empty() {
                return Err(StepError::MissingCreateId);
            }

            // Copy the default and output properties of the live object.
            let mut new = self.new.write_state();
            new.id = response.id;
            new.outputs = response.outputs;
        }

        // The resource state has just been created; both timestamps are
        // the apply instant.
        let now = Utc::now();
        {
            let mut new = self.new.write_state();
            new.created = Some(now);
            new.modified = Some(now);
        }

        // Mark the old resource as pending deletion if necessary.
        if self.replacing && self.pending_delete {
            if let Some(old) = &self.old {
                old.write_state().delete = true;
            }
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

fn check_new_state(new: &SharedState) {
    let new = new.read_state();
    assert!(!new.urn.is_empty(), "new state must have a URN");
    assert!(new.id.is_empty(), "new state must not have an ID");
    assert!(
        !new.custom || !new.provider.is_empty() || new.is_provider(),
        "new state must have or be a provider if it is a custom resource"
    );
    assert!(!new.delete, "new state must not be marked for deletion");
    assert!(!new.external, "new state must not be external");
}
