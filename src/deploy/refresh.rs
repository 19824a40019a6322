//! The refresh step: reconcile recorded state with the real world.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::Result;
use crate::resource::{shared, SharedState, SharedStateExt, TypeToken, Urn};

use super::deployment::Deployment;
use super::ops::StepOp;
use super::step::{resolve_provider, StepApplyOutcome, StepCompletion};

/// A step that reads a resource's current state from its provider and
/// reconciles the checkpoint with it.
///
/// Refresh steps are not issued by the step generator; the executor
/// inserts them as an optional first pass of a deployment.
#[derive(Debug)]
pub struct RefreshStep {
    deployment: Arc<Deployment>,
    old: SharedState,
    /// The refreshed state. Seeded with the old state so a step failure is
    /// not read as a deletion; `None` after apply means the resource is
    /// gone.
    new: Option<SharedState>,
    /// One-shot completion channel supplied by the caller, if any. Only
    /// this step owns the sender.
    done: Option<oneshot::Sender<()>>,
}

impl RefreshStep {
    /// Creates a refresh step over a recorded state.
    #[must_use]
    pub fn new(
        deployment: Arc<Deployment>,
        old: SharedState,
        done: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self {
            deployment,
            new: Some(Arc::clone(&old)),
            old,
            done,
        }
    }

    pub(crate) fn op(&self) -> StepOp {
        StepOp::Refresh
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

    pub(crate) fn new_state(&self) -> Option<&SharedState> {
        self.new.as_ref()
    }

    pub(crate) fn deployment(&self) -> &Arc<Deployment> {
        &self.deployment
    }

    /// Classifies the outcome of the refresh for display: a vanished
    /// resource reads as a delete, an identical one as a same, anything
    /// else as an update.
    #[must_use]
    pub fn result_op(&self) -> StepOp {
        let Some(new) = &self.new else {
            return StepOp::Delete;
        };
        if Arc::ptr_eq(new, &self.old)
            || !new
                .read_state()
                .outputs
                .differs_from(&self.old.read_state().outputs)
        {
            return StepOp::Same;
        }
        StepOp::Update
    }

    /// Reads the resource's live state and rebuilds the checkpoint entry
    /// from it. Components, providers, and pending-replace resources never
    /// change with a refresh.
    pub(crate) async fn apply(&mut self, _preview: bool) -> Result<StepApplyOutcome> {
        let completion = self.done.take().map(StepCompletion::Signal);

        let (urn, type_token, provider_ref, old_id, old_inputs, old_outputs, short_circuit) = {
            let old = self.old.read_state();
            let short_circuit = !old.custom || old.is_provider() || old.pending_replacement;
            (
                old.urn.clone(),
                old.type_token.clone(),
                old.provider.clone(),
                old.id.clone(),
                old.inputs.clone(),
                old.outputs.clone(),
                short_circuit,
            )
        };
        if short_circuit {
            return Ok(StepApplyOutcome::ok(completion));
        }

        let provider = resolve_provider(&self.deployment, &type_token, &provider_ref, &urn)?;
        let response = provider
            .read(&urn, &old_id, Some(&old_inputs), Some(&old_outputs))
            .await?;

        // A partial failure must not fail the refresh: warn that the
        // resource has become unhealthy and persist the initialization
        // errors so the next up operation surfaces them.
        let mut init_errors = Vec::new();
        if let Some(err) = &response.init_error {
            init_errors.clone_from(&err.reasons);
            let message = format!(
                "refreshed resource is in an unhealthy state:\n* {}",
                err.reasons.join("\n* ")
            );
            self.deployment.diag().warning(&urn, &message);
        }

        if let Some(outputs) = response.outputs {
            // If the provider specified new inputs, pick them up; otherwise
            // retain the current ones.
            let inputs = response.inputs.unwrap_or(old_inputs);

            // The ID may have changed; adopt it.
            let mut id = old_id.clone();
            if !response.id.is_empty() && response.id != old_id {
                debug!(urn = %urn, old_id = %old_id, new_id = %response.id, "refresh adopted a new ID");
                id = response.id;
            }

            let mut refreshed = self.old.read_state().clone();
            let inputs_changed = inputs.differs_from(&refreshed.inputs);
            let outputs_changed = outputs.differs_from(&refreshed.outputs);
            refreshed.id = id;
            refreshed.inputs = inputs;
            refreshed.outputs = outputs;
            refreshed.init_errors = init_errors;

            // The refresh identified an incongruence between the provider
            // and the recorded state; track it.
            if inputs_changed || outputs_changed {
                refreshed.modified = Some(Utc::now());
            }
            self.new = Some(shared(refreshed));
        } else {
            self.new = None;
        }

        Ok(StepApplyOutcome {
            status: response.status,
            completion,
            init_error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{
        collecting_deployment, custom_state, deployment, state, RecordingProvider,
    };
    use super::*;
    use crate::error::InitError;
    use crate::provider::ReadResponse;
    use crate::resource::{PropertyMap, ResourceStatus};
    use serde_json::json;

    #[tokio::test]
    async fn test_refresh_of_vanished_resource_reads_as_delete() {
        let provider = Arc::new(RecordingProvider::default());
        provider.set_read(Ok(ReadResponse::missing()));
        let deployment = deployment(&provider);

        let mut step = RefreshStep::new(deployment, shared(custom_state("a", "i")), None);
        step.apply(false).await.expect("refresh should succeed");

        assert!(step.new_state().is_none());
        assert_eq!(step.result_op(), StepOp::Delete);
    }

    #[tokio::test]
    async fn test_refresh_with_identical_outputs_reads_as_same() {
        let provider = Arc::new(RecordingProvider::default());
        let old = custom_state("a", "i");
        provider.set_read(Ok(ReadResponse::ok(
            "",
            Some(old.inputs.clone()),
            Some(old.outputs.clone()),
        )));
        let deployment = deployment(&provider);

        let mut step = RefreshStep::new(deployment, shared(old), None);
        step.apply(false).await.expect("refresh should succeed");
        assert_eq!(step.result_op(), StepOp::Same);
    }

    #[tokio::test]
    async fn test_refresh_with_drift_reads_as_update_and_bumps_modified() {
        let mut outputs = PropertyMap::new();
        outputs.insert("size", json!(8));
        let provider = Arc::new(RecordingProvider::default());
        provider.set_read(Ok(ReadResponse::ok("", None, Some(outputs))));
        let deployment = deployment(&provider);

        let mut step = RefreshStep::new(deployment, shared(custom_state("a", "i")), None);
        step.apply(false).await.expect("refresh should succeed");

        assert_eq!(step.result_op(), StepOp::Update);
        let new = step.new_state().expect("state exists");
        assert_eq!(new.read_state().outputs.get("size"), Some(&json!(8)));
        assert!(new.read_state().modified.is_some());
    }

    #[tokio::test]
    async fn test_refresh_adopts_new_id() {
        let provider = Arc::new(RecordingProvider::default());
        provider.set_read(Ok(ReadResponse::ok(
            "migrated",
            None,
            Some(PropertyMap::new()),
        )));
        let deployment = deployment(&provider);

        let mut step = RefreshStep::new(deployment, shared(custom_state("a", "i")), None);
        step.apply(false).await.expect("refresh should succeed");
        let new = step.new_state().expect("state exists");
        assert_eq!(new.read_state().id, "migrated");
    }

    #[tokio::test]
    async fn test_refresh_short_circuits_components_and_pending_replace() {
        let provider = Arc::new(RecordingProvider::default());
        let deployment = deployment(&provider);

        let mut component = RefreshStep::new(Arc::clone(&deployment), shared(state("c")), None);
        component.apply(false).await.expect("component refresh succeeds");

        let mut pending = custom_state("a", "i");
        pending.pending_replacement = true;
        let mut pending = RefreshStep::new(deployment, shared(pending), None);
        pending.apply(false).await.expect("pending refresh succeeds");

        assert!(provider.calls().is_empty());
        assert_eq!(component.result_op(), StepOp::Same);
    }

    #[tokio::test]
    async fn test_refresh_partial_failure_is_downgraded_to_warning() {
        let provider = Arc::new(RecordingProvider::default());
        provider.set_read(Ok(ReadResponse {
            id: String::new(),
            inputs: None,
            outputs: Some(PropertyMap::new()),
            status: ResourceStatus::PartialFailure,
            init_error: Some(InitError::new(["unhealthy"])),
        }));
        let (deployment, diag) = collecting_deployment(&provider, false);

        let mut step = RefreshStep::new(deployment, shared(custom_state("a", "i")), None);
        let outcome = step.apply(false).await.expect("partial failure is not fatal");

        assert_eq!(outcome.status, ResourceStatus::PartialFailure);
        assert!(outcome.init_error.is_none());
        let new = step.new_state().expect("state exists");
        assert_eq!(new.read_state().init_errors, vec!["unhealthy"]);
        assert!(diag
            .messages()
            .iter()
            .any(|message| message.contains("unhealthy state")));
    }

    #[tokio::test]
    async fn test_refresh_closes_completion_channel() {
        let provider = Arc::new(RecordingProvider::default());
        let deployment = deployment(&provider);

        let (sender, receiver) = oneshot::channel();
        let mut step = RefreshStep::new(deployment, shared(state("c")), Some(sender));
        let outcome = step.apply(false).await.expect("refresh should succeed");

        outcome.completion.expect("completion present").invoke();
        receiver.await.expect("channel signalled");
    }
}
