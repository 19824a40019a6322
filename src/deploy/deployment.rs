//! Deployment context shared by the steps of one run.
//!
//! A [`Deployment`] carries the prior snapshot's states, the states
//! registered so far, the provider registry, import directives, and the
//! diagnostics sink. Steps hold non-owning references to it for the
//! duration of a run.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::error::StepError;
use crate::provider::ProviderRegistry;
use crate::resource::{ResourceState, SharedState, Urn};

/// Result conveyed back to a resource registration.
#[derive(Debug, Clone)]
pub struct RegisterResult {
    /// The state of the resource after the step.
    pub state: SharedState,
}

/// A pending resource registration from the user program.
///
/// The step's completion callback signals it so the program may continue.
pub trait RegisterResourceEvent: Send + Sync + fmt::Debug {
    /// Signals that the registration has been fully retired.
    fn done(&self, result: RegisterResult);
}

/// Result conveyed back to a resource read.
#[derive(Debug, Clone)]
pub struct ReadResult {
    /// The state of the resource after the read.
    pub state: SharedState,
}

/// A pending resource read from the user program.
pub trait ReadResourceEvent: Send + Sync + fmt::Debug {
    /// Signals that the read has been fully retired.
    fn done(&self, result: ReadResult);
}

/// A registration event that signals no one; used by planned imports.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRegisterEvent;

impl RegisterResourceEvent for NoopRegisterEvent {
    fn done(&self, _result: RegisterResult) {}
}

/// One entry of an import deployment: which resource ID to adopt, and
/// optionally which of its properties to persist as inputs.
#[derive(Debug, Clone, Default)]
pub struct ImportDirective {
    /// The provider-assigned ID being imported.
    pub id: String,
    /// Properties to persist as inputs; empty means all of them.
    pub properties: Vec<String>,
}

/// Sink for user-facing diagnostics emitted during step application.
pub trait DiagSink: Send + Sync + fmt::Debug {
    /// Emits a warning attached to a resource.
    fn warning(&self, urn: &Urn, message: &str);

    /// Emits a streaming warning attached to a resource; streamed warnings
    /// render incrementally during previews.
    fn streamed_warning(&self, urn: &Urn, message: &str);
}

/// The default diagnostics sink, backed by the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiag;

impl DiagSink for TracingDiag {
    fn warning(&self, urn: &Urn, message: &str) {
        warn!(urn = %urn, "{message}");
    }

    fn streamed_warning(&self, urn: &Urn, message: &str) {
        warn!(urn = %urn, "{message}");
    }
}

/// Context for one deployment run.
#[derive(Debug)]
pub struct Deployment {
    olds: HashMap<Urn, SharedState>,
    news: RwLock<HashMap<Urn, SharedState>>,
    providers: Arc<ProviderRegistry>,
    imports: Vec<ImportDirective>,
    diag: Arc<dyn DiagSink>,
    preview: bool,
}

impl Deployment {
    /// Creates a deployment context over the given provider registry.
    #[must_use]
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self {
            olds: HashMap::new(),
            news: RwLock::new(HashMap::new()),
            providers,
            imports: Vec::new(),
            diag: Arc::new(TracingDiag),
            preview: false,
        }
    }

    /// Sets the prior snapshot's states, keyed by URN.
    #[must_use]
    pub fn with_olds(mut self, olds: HashMap<Urn, SharedState>) -> Self {
        self.olds = olds;
        self
    }

    /// Sets the import directives for an import deployment.
    #[must_use]
    pub fn with_imports(mut self, imports: Vec<ImportDirective>) -> Self {
        self.imports = imports;
        self
    }

    /// Replaces the diagnostics sink.
    #[must_use]
    pub fn with_diag(mut self, diag: Arc<dyn DiagSink>) -> Self {
        self.diag = diag;
        self
    }

    /// Marks the deployment as a preview.
    #[must_use]
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    /// Returns true if this deployment is a preview.
    #[must_use]
    pub fn is_preview(&self) -> bool {
        self.preview
    }

    /// The diagnostics sink for this deployment.
    #[must_use]
    pub fn diag(&self) -> &Arc<dyn DiagSink> {
        &self.diag
    }

    /// The provider registry for this deployment.
    #[must_use]
    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    /// Returns true if the prior snapshot holds a state for the URN.
    #[must_use]
    pub fn has_old(&self, urn: &Urn) -> bool {
        self.olds.contains_key(urn)
    }

    /// Looks up the prior snapshot's state for a URN.
    #[must_use]
    pub fn old(&self, urn: &Urn) -> Option<SharedState> {
        self.olds.get(urn).cloned()
    }

    /// Records a state registered during this deployment.
    pub fn register_new(&self, urn: Urn, state: SharedState) {
        self.news
            .write()
            .expect("deployment state map lock poisoned")
            .insert(urn, state);
    }

    /// Returns true if a state has been registered for the URN during this
    /// deployment.
    #[must_use]
    pub fn has_new(&self, urn: &Urn) -> bool {
        self.news
            .read()
            .expect("deployment state map lock poisoned")
            .contains_key(urn)
    }

    /// Looks up the import directive matching a resource ID.
    #[must_use]
    pub fn import_directive(&self, id: &str) -> Option<&ImportDirective> {
        self.imports.iter().find(|directive| directive.id == id)
    }

    /// Ensures an unchanged provider resource is present in the registry.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::BadProviderState`] if the provider cannot be
    /// re-registered from the recorded state.
    pub async fn same_provider(&self, state: &ResourceState) -> Result<(), StepError> {
        self.providers
            .same(state)
            .await
            .map_err(|err| StepError::BadProviderState {
                urn: state.urn.clone(),
                reason: err.to_string(),
            })
    }
}
