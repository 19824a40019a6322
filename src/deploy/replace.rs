//! The logical replace step.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::resource::{SharedState, SharedStateExt, TypeToken, Urn};

use super::deployment::Deployment;
use super::diff::PropertyDiff;
use super::ops::StepOp;
use super::step::{StepApplyOutcome, StepCompletion};

/// A logical step recording that a replacement happened.
///
/// The physical work is done by a create-replacement and a
/// delete-replaced step; this step exists so tools can render a
/// replacement summary and constraint logic can treat the sequence
/// atomically.
#[derive(Debug)]
pub struct ReplaceStep {
    deployment: Arc<Deployment>,
    old: SharedState,
    new: SharedState,
    /// The keys causing the replacement.
    keys: Vec<String>,
    /// The keys causing a diff.
    diffs: Vec<String>,
    /// The structured property diff.
    detailed_diff: BTreeMap<String, PropertyDiff>,
    /// True if the paired create marks the old resource for a pending
    /// delete.
    pending_delete: bool,
}

impl ReplaceStep {
    /// Creates a replace step.
    ///
    /// # Panics
    ///
    /// Panics if either state violates the step construction invariants.
    #[must_use]
    pub fn new(
        deployment: Arc<Deployment>,
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
        {
            let new = new.read_state();
            assert!(!new.urn.is_empty(), "new state must have a URN");
            assert!(!new.delete, "new state must not be marked for deletion");
        }
        Self {
            deployment,
            old,
            new,
            keys,
            diffs,
            detailed_diff,
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
        StepOp::Replace
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

    /// A no-op on the provider.
    ///
    /// # Panics
    ///
    /// Panics if a pending delete was requested but the paired
    /// create-replacement has not marked the old resource for deletion.
    pub(crate) async fn apply(&mut self, _preview: bool) -> Result<StepApplyOutcome> {
        assert!(
            !self.pending_delete || self.old.read_state().delete,
            "old resource {} should be marked for deletion if pending delete",
            self.old.read_state().urn
        );
        Ok(StepApplyOutcome::ok(Some(StepCompletion::Noop)))
    }
}
