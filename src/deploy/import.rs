//! The import step: adopt an existing resource under management.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::error::{Result, StepError};
use crate::provider::{CheckFailure, ProviderReference};
use crate::resource::{
    shared, PropertyMap, ResourceState, ResourceStatus, SharedState, SharedStateExt, TypeToken,
    Urn,
};

use super::deployment::{Deployment, DiagSink, NoopRegisterEvent, RegisterResourceEvent};
use super::diff::{diff_inputs, process_ignore_changes, PropertyDiff};
use super::ops::StepOp;
use super::step::{resolve_provider, StepApplyOutcome, StepCompletion};

/// A step that adopts a resource with an explicit existing ID, either
/// during a normal deployment or as part of a dedicated import deployment.
#[derive(Debug)]
pub struct ImportStep {
    deployment: Arc<Deployment>,
    reg: Arc<dyn RegisterResourceEvent>,
    /// The original managed state; only present for import-replacements.
    original: Option<SharedState>,
    /// The state fetched from the provider, synthesised during apply so
    /// the display can render a diff. Never persisted.
    old: Option<SharedState>,
    /// The declared state of the resource being imported.
    new: SharedState,
    replacing: bool,
    /// True if this import comes from a dedicated import deployment.
    planned: bool,
    /// Keys that differed between the program and the actual state.
    diffs: Vec<String>,
    /// The structured property diff.
    detailed_diff: BTreeMap<String, PropertyDiff>,
    /// Property paths to ignore when comparing inputs.
    ignore_changes: Vec<String>,
    /// Random seed forwarded to the provider's Check.
    random_seed: Vec<u8>,
}

impl ImportStep {
    /// Creates an adoption import step.
    ///
    /// # Panics
    ///
    /// Panics if the new state violates the step construction invariants.
    #[must_use]
    pub fn new(
        deployment: Arc<Deployment>,
        reg: Arc<dyn RegisterResourceEvent>,
        new: SharedState,
        ignore_changes: Vec<String>,
        random_seed: Vec<u8>,
    ) -> Self {
        check_new_state(&new, true);
        Self {
            deployment,
            reg,
            original: None,
            old: None,
            new,
            replacing: false,
            planned: false,
            diffs: Vec::new(),
            detailed_diff: BTreeMap::new(),
            ignore_changes,
            random_seed,
        }
    }

    /// Creates an import step that replaces an already-managed resource;
    /// on success the original state is marked for deletion.
    ///
    /// # Panics
    ///
    /// Panics if the new state violates the step construction invariants.
    #[must_use]
    pub fn replacement(
        deployment: Arc<Deployment>,
        reg: Arc<dyn RegisterResourceEvent>,
        original: SharedState,
        new: SharedState,
        ignore_changes: Vec<String>,
        random_seed: Vec<u8>,
    ) -> Self {
        check_new_state(&new, true);
        Self {
            deployment,
            reg,
            original: Some(original),
            old: None,
            new,
            replacing: true,
            planned: false,
            diffs: Vec::new(),
            detailed_diff: BTreeMap::new(),
            ignore_changes,
            random_seed,
        }
    }

    /// Creates an import step issued by a dedicated import deployment.
    ///
    /// # Panics
    ///
    /// Panics if the new state violates the step construction invariants.
    #[must_use]
    pub fn planned(deployment: Arc<Deployment>, new: SharedState, random_seed: Vec<u8>) -> Self {
        check_new_state(&new, false);
        Self {
            deployment,
            reg: Arc::new(NoopRegisterEvent),
            original: None,
            old: None,
            new,
            replacing: false,
            planned: true,
            diffs: Vec::new(),
            detailed_diff: BTreeMap::new(),
            ignore_changes: Vec::new(),
            random_seed,
        }
    }

    /// The keys that differed between the program and the actual state.
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
            StepOp::ImportReplacement
        } else {
            StepOp::Import
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

    /// Reads the resource being imported, validates the declared inputs
    /// against it, and fails the adoption if they do not match.
    #[allow(clippy::too_many_lines)]
    pub(crate) async fn apply(&mut self, preview: bool) -> Result<StepApplyOutcome> {
        let (urn, type_token, provider_ref) = {
            let new = self.new.read_state();
            (new.urn.clone(), new.type_token.clone(), new.provider.clone())
        };

        // A planned import must target a URN absent from the old state,
        // under a parent the deployment knows about.
        if self.planned {
            if self.deployment.has_old(&urn) {
                return Err(StepError::ResourceAlreadyExists { urn });
            }
            if let Some(parent) = self.new.read_state().parent.clone() {
                if !self.deployment.has_new(&parent) {
                    return Err(StepError::UnknownParent { parent, urn });
                }
            }
        }

        // Only custom resources have anything to read; components import
        // as empty.
        let mut status = ResourceStatus::Ok;
        let mut inputs = PropertyMap::new();
        let mut outputs = PropertyMap::new();
        let is_custom = self.new.read_state().custom;
        let mut provider = None;
        if is_custom {
            let id = self.new.read_state().id.clone();
            let prov = resolve_provider(&self.deployment, &type_token, &provider_ref, &urn)?;
            let response = prov.read(&urn, &id, None, None).await?;
            status = response.status;
            if let Some(err) = response.init_error {
                self.new.write_state().init_errors = err.reasons;
            }

            // No outputs means no such resource; no inputs means the
            // provider cannot import at all.
            let Some(read_outputs) = response.outputs else {
                return Err(StepError::ResourceNotFound { id });
            };
            let Some(read_inputs) = response.inputs else {
                return Err(StepError::ImportNotSupported {
                    package: type_token.package().to_string(),
                });
            };
            if !response.id.is_empty() {
                self.new.write_state().id = response.id;
            }
            inputs = read_inputs;
            outputs = read_outputs;
            provider = Some(prov);
        }

        self.new.write_state().outputs = outputs.clone();

        // Magic up an old state from the read result and the declared
        // identity, so the only differences the display sees are between
        // the inputs and outputs. This state is never persisted.
        let pseudo_old = {
            let new = self.new.read_state();
            let mut old = ResourceState::new(new.urn.clone(), new.type_token.clone());
            old.custom = new.custom;
            old.id = new.id.clone();
            old.inputs = inputs;
            old.outputs = outputs;
            old.parent = new.parent.clone();
            old.protect = new.protect;
            old.dependencies = new.dependencies.clone();
            old.property_dependencies = new.property_dependencies.clone();
            old.init_errors = new.init_errors.clone();
            old.provider = new.provider.clone();
            old.custom_timeouts = new.custom_timeouts;
            old.import_id = new.import_id.clone();
            old.retain_on_delete = new.retain_on_delete;
            old.deleted_with = new.deleted_with.clone();
            old.source_position = new.source_position.clone();
            old
        };
        let old = shared(pseudo_old);
        self.old = Some(Arc::clone(&old));

        // The resource is new from our perspective.
        let now = Utc::now();
        {
            let mut new = self.new.write_state();
            new.created = Some(now);
            new.modified = Some(now);
        }

        let completion = Some(StepCompletion::Register {
            event: Arc::clone(&self.reg),
            state: Arc::clone(&self.new),
        });

        // Components need no input validation.
        if !is_custom {
            return Ok(StepApplyOutcome {
                status,
                completion,
                init_error: None,
            });
        }
        let provider = provider.expect("custom resources resolved a provider above");
        let old_inputs = old.read_state().inputs.clone();

        if self.planned {
            assert!(
                self.new.read_state().inputs.is_empty(),
                "import resource cannot have existing inputs"
            );

            // Persist either the whole fetched inputs or the subset the
            // import directive names.
            let directive_properties = self
                .deployment
                .import_directive(&old.read_state().id)
                .map(|directive| directive.properties.clone())
                .unwrap_or_default();
            if directive_properties.is_empty() {
                debug!(urn = %urn, "importing with all properties");
                self.new.write_state().inputs = old_inputs.clone();
            } else {
                debug!(urn = %urn, properties = ?directive_properties, "importing with supplied properties");
                let mut selected = PropertyMap::new();
                for property in &directive_properties {
                    if let Some(value) = old_inputs.get(property) {
                        selected.insert(property.clone(), value.clone());
                    }
                }
                self.new.write_state().inputs = selected;
            }

            // Validate for consistency. Failures do not stop a planned
            // import, but the user needs to know whose fault they are.
            let new_inputs = self.new.read_state().inputs.clone();
            let check = provider
                .check(&urn, &old_inputs, &new_inputs, preview, &self.random_seed)
                .await?;
            if !check.failures.is_empty() {
                let detail = if directive_properties.is_empty() {
                    let package = ProviderReference::parse(&provider_ref)
                        .map_or_else(|_| type_token.package().to_string(), |r| r.package());
                    format!("This is almost certainly a bug in the `{package}` provider.")
                } else {
                    "Try specifying a different set of properties to import with in the future."
                        .to_string()
                };
                self.deployment.diag().warning(
                    &urn,
                    &format!(
                        "one or more imported inputs failed to validate. {detail} \
                         The import will still proceed, but you will need to edit the \
                         generated code after copying it into your program."
                    ),
                );
            }
            issue_check_failure_warnings(self.deployment.diag(), &urn, &check.failures);

            self.diffs = Vec::new();
            self.detailed_diff = BTreeMap::new();
            return Ok(StepApplyOutcome {
                status,
                completion,
                init_error: None,
            });
        }

        // Adoption: roll ignored paths back to the fetched values, then
        // validate with provider defaults. Failures here are fatal.
        let declared = self.new.read_state().inputs.clone();
        let processed = process_ignore_changes(&declared, &old_inputs, &self.ignore_changes)?;
        self.new.write_state().inputs = processed.clone();

        let check = provider
            .check(&urn, &old_inputs, &processed, preview, &self.random_seed)
            .await?;
        if !check.failures.is_empty() {
            issue_check_failure_warnings(self.deployment.diag(), &urn, &check.failures);
            return Err(StepError::CheckFailed);
        }
        self.new.write_state().inputs = check.inputs.clone();

        // Diff the declared inputs against the fetched state; any
        // difference fails the import outside preview.
        let adjusted = process_ignore_changes(&check.inputs, &old_inputs, &self.ignore_changes)?;
        let diff = diff_inputs(&old_inputs, &adjusted);
        self.diffs.clone_from(&diff.changed_keys);
        self.detailed_diff.clone_from(&diff.detailed_diff);

        if diff.changes {
            const MESSAGE: &str = "inputs to import do not match the existing resource";
            if preview {
                self.deployment.diag().streamed_warning(
                    &urn,
                    &format!("{MESSAGE}; importing this resource will fail"),
                );
            } else {
                return Err(StepError::ImportMismatch);
            }
        }

        // On success, an import-replacement pends deletion of the original
        // managed state.
        if self.replacing {
            if let Some(original) = &self.original {
                original.write_state().delete = true;
            }
        }

        Ok(StepApplyOutcome {
            status,
            completion,
            init_error: None,
        })
    }
}

fn check_new_state(new: &SharedState, require_custom: bool) {
    let new = new.read_state();
    assert!(!new.urn.is_empty(), "new state must have a URN");
    if require_custom {
        assert!(new.custom, "new state must be a custom resource");
        assert!(!new.id.is_empty(), "new state must have an ID");
    } else {
        assert!(
            !new.custom || !new.id.is_empty(),
            "new state must have an ID"
        );
    }
    assert!(!new.delete, "new state must not be marked for deletion");
    assert!(!new.external, "new state must not be external");
}

fn issue_check_failure_warnings(diag: &Arc<dyn DiagSink>, urn: &Urn, failures: &[CheckFailure]) {
    for failure in failures {
        let message = if failure.property.is_empty() {
            format!("verification failed: {}", failure.reason)
        } else {
            format!(
                "verification of property '{}' failed: {}",
                failure.property, failure.reason
            )
        };
        diag.warning(urn, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{
        build_deployment, collecting_deployment, custom_state, deployment, event, import_state,
        olds_map, RecordingProvider,
    };
    use super::*;
    use crate::provider::{CheckResponse, ReadResponse};
    use serde_json::json;

    fn seed() -> Vec<u8> {
        vec![7; 32]
    }

    fn read_with(inputs: &[(&str, serde_json::Value)]) -> ReadResponse {
        let fetched: PropertyMap = inputs
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect();
        ReadResponse::ok("", Some(fetched.clone()), Some(fetched))
    }

    #[tokio::test]
    async fn test_import_adopts_matching_resource() {
        let provider = Arc::new(RecordingProvider::default());
        provider.set_read(Ok(read_with(&[("size", json!(3))])));
        let deployment = deployment(&provider);

        let mut declared = import_state("m", "ext-1");
        declared.inputs.insert("size", json!(3));
        let new = shared(declared);
        let (reg, _) = event();
        let mut step = ImportStep::new(deployment, reg, Arc::clone(&new), Vec::new(), seed());
        assert_eq!(step.op(), StepOp::Import);

        let outcome = step.apply(false).await.expect("import should succeed");
        assert!(outcome.completion.is_some());
        assert!(step.diffs().is_empty());
        let new = new.read_state();
        assert_eq!(new.created, new.modified);
        assert!(new.created.is_some());
    }

    #[tokio::test]
    async fn test_import_mismatch_fails_outside_preview() {
        let provider = Arc::new(RecordingProvider::default());
        provider.set_read(Ok(read_with(&[("size", json!(3))])));
        let deployment = deployment(&provider);

        let mut declared = import_state("m", "ext-1");
        declared.inputs.insert("size", json!(9));
        let (reg, _) = event();
        let mut step = ImportStep::new(deployment, reg, shared(declared), Vec::new(), seed());

        let err = step.apply(false).await.expect_err("mismatch must fail");
        assert!(matches!(err, StepError::ImportMismatch));
        assert_eq!(step.diffs(), ["size"]);
    }

    #[tokio::test]
    async fn test_import_mismatch_warns_in_preview() {
        let provider = Arc::new(RecordingProvider::default());
        provider.set_read(Ok(read_with(&[("size", json!(3))])));
        let (deployment, diag) = collecting_deployment(&provider, true);

        let mut declared = import_state("m", "ext-1");
        declared.inputs.insert("size", json!(9));
        let (reg, _) = event();
        let mut step = ImportStep::new(deployment, reg, shared(declared), Vec::new(), seed());

        let outcome = step.apply(true).await.expect("preview mismatch completes");
        assert!(outcome.completion.is_some());
        assert!(diag
            .messages()
            .iter()
            .any(|message| message.contains("importing this resource will fail")));
    }

    #[tokio::test]
    async fn test_import_honors_ignore_changes() {
        let provider = Arc::new(RecordingProvider::default());
        provider.set_read(Ok(read_with(&[("size", json!(3))])));
        let deployment = deployment(&provider);

        let mut declared = import_state("m", "ext-1");
        declared.inputs.insert("size", json!(9));
        let new = shared(declared);
        let (reg, _) = event();
        let mut step = ImportStep::new(
            deployment,
            reg,
            Arc::clone(&new),
            vec!["size".to_string()],
            seed(),
        );

        step.apply(false).await.expect("ignored diff imports cleanly");
        assert_eq!(new.read_state().inputs.get("size"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn test_import_check_failures_are_fatal_for_adoption() {
        let provider = Arc::new(RecordingProvider::default());
        provider.set_read(Ok(read_with(&[("size", json!(3))])));
        provider.set_check(Ok(CheckResponse {
            inputs: PropertyMap::new(),
            failures: vec![CheckFailure {
                property: "size".to_string(),
                reason: "out of range".to_string(),
            }],
        }));
        let (deployment, diag) = collecting_deployment(&provider, false);

        let mut declared = import_state("m", "ext-1");
        declared.inputs.insert("size", json!(3));
        let (reg, _) = event();
        let mut step = ImportStep::new(deployment, reg, shared(declared), Vec::new(), seed());

        let err = step.apply(false).await.expect_err("check failures are fatal");
        assert!(matches!(err, StepError::CheckFailed));
        assert!(diag
            .messages()
            .iter()
            .any(|message| message.contains("size")));
    }

    #[tokio::test]
    async fn test_planned_import_check_failures_only_warn() {
        let provider = Arc::new(RecordingProvider::default());
        provider.set_read(Ok(read_with(&[("size", json!(3))])));
        provider.set_check(Ok(CheckResponse {
            inputs: PropertyMap::new(),
            failures: vec![CheckFailure {
                property: String::new(),
                reason: "unvalidatable".to_string(),
            }],
        }));
        let (deployment, diag) = collecting_deployment(&provider, false);

        let mut step = ImportStep::planned(deployment, shared(import_state("m", "ext-1")), seed());
        let outcome = step.apply(false).await.expect("planned import proceeds");

        assert!(outcome.completion.is_some());
        assert!(diag
            .messages()
            .iter()
            .any(|message| message.contains("bug in the")));
        assert!(diag
            .messages()
            .iter()
            .any(|message| message.contains("unvalidatable")));
    }

    #[tokio::test]
    async fn test_import_of_missing_resource_fails() {
        let provider = Arc::new(RecordingProvider::default());
        provider.set_read(Ok(ReadResponse::missing()));
        let deployment = deployment(&provider);

        let (reg, _) = event();
        let mut step = ImportStep::new(
            deployment,
            reg,
            shared(import_state("m", "ghost")),
            Vec::new(),
            seed(),
        );
        let err = step.apply(false).await.expect_err("missing resource fails");
        assert!(matches!(err, StepError::ResourceNotFound { id } if id == "ghost"));
    }

    #[tokio::test]
    async fn test_import_without_provider_inputs_is_unsupported() {
        let provider = Arc::new(RecordingProvider::default());
        provider.set_read(Ok(ReadResponse::ok("", None, Some(PropertyMap::new()))));
        let deployment = deployment(&provider);

        let (reg, _) = event();
        let mut step = ImportStep::new(
            deployment,
            reg,
            shared(import_state("m", "ext-1")),
            Vec::new(),
            seed(),
        );
        let err = step.apply(false).await.expect_err("import unsupported");
        assert!(matches!(err, StepError::ImportNotSupported { .. }));
    }

    #[tokio::test]
    async fn test_import_replacement_pends_original_deletion() {
        let provider = Arc::new(RecordingProvider::default());
        provider.set_read(Ok(read_with(&[])));
        let deployment = deployment(&provider);

        let original = shared(custom_state("m", "managed-1"));
        let (reg, _) = event();
        let mut step = ImportStep::replacement(
            deployment,
            reg,
            Arc::clone(&original),
            shared(import_state("m", "ext-1")),
            Vec::new(),
            seed(),
        );
        assert_eq!(step.op(), StepOp::ImportReplacement);

        step.apply(false).await.expect("import should succeed");
        assert!(original.read_state().delete);
    }

    #[tokio::test]
    async fn test_planned_import_rejects_existing_urn() {
        let provider = Arc::new(RecordingProvider::default());
        let old = shared(custom_state("m", "managed-1"));
        let deployment =
            Arc::new(build_deployment(&provider).with_olds(olds_map(vec![old])));

        let mut step = ImportStep::planned(deployment, shared(import_state("m", "ext-1")), seed());
        let err = step.apply(false).await.expect_err("existing URN rejected");
        assert!(matches!(err, StepError::ResourceAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_planned_import_requires_known_parent() {
        let provider = Arc::new(RecordingProvider::default());
        let deployment = deployment(&provider);

        let mut declared = import_state("m", "ext-1");
        declared.parent = Some(Urn::new("p"));
        let mut step = ImportStep::planned(Arc::clone(&deployment), shared(declared), seed());
        let err = step.apply(false).await.expect_err("unknown parent rejected");
        assert!(matches!(err, StepError::UnknownParent { .. }));

        // Registering the parent first makes the same import acceptable.
        deployment.register_new(Urn::new("p"), shared(custom_state("p", "pid")));
        let mut declared = import_state("m", "ext-1");
        declared.parent = Some(Urn::new("p"));
        let mut step = ImportStep::planned(deployment, shared(declared), seed());
        step.apply(false).await.expect("known parent accepted");
    }

    #[tokio::test]
    async fn test_planned_import_takes_fetched_inputs() {
        let provider = Arc::new(RecordingProvider::default());
        provider.set_read(Ok(read_with(&[("size", json!(3)), ("zone", json!("a"))])));
        let deployment = deployment(&provider);

        let new = shared(import_state("m", "ext-1"));
        let mut step = ImportStep::planned(deployment, Arc::clone(&new), seed());

        let outcome = step.apply(false).await.expect("planned import succeeds");
        assert!(outcome.completion.is_some());
        assert_eq!(new.read_state().inputs.get("size"), Some(&json!(3)));
        assert_eq!(new.read_state().inputs.get("zone"), Some(&json!("a")));
    }

    #[test]
    #[should_panic(expected = "must have an ID")]
    fn test_import_requires_id() {
        let provider = Arc::new(RecordingProvider::default());
        let deployment = deployment(&provider);
        let (reg, _) = event();

        let _ = ImportStep::new(
            deployment,
            reg,
            shared(custom_state("m", "")),
            Vec::new(),
            seed(),
        );
    }
}
