//! Test utilities for the step engine: a recording mock provider, state
//! builders, and event sinks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::provider::{
    CheckResponse, CreateResponse, Provider, ProviderReference, ProviderRegistry, ProviderSource,
    ReadResponse, UpdateResponse,
};
use crate::resource::{PropertyMap, ResourceState, SharedState, Urn};

use super::deployment::{
    Deployment, DiagSink, ReadResourceEvent, ReadResult, RegisterResourceEvent, RegisterResult,
};

/// The provider reference all test states carry.
pub fn test_provider_ref() -> String {
    "urn:windlass:test::proj::windlass:providers:test::default::prov-1".to_string()
}

/// A provider that records every RPC and returns configurable responses.
///
/// Calls are recorded by method name; create and update append a
/// `[preview]` marker when the preview flag was set.
#[derive(Debug, Default)]
pub struct RecordingProvider {
    calls: Mutex<Vec<String>>,
    create_response: Mutex<Option<Result<CreateResponse, ProviderError>>>,
    update_response: Mutex<Option<Result<UpdateResponse, ProviderError>>>,
    delete_response: Mutex<Option<Result<(), ProviderError>>>,
    read_response: Mutex<Option<Result<ReadResponse, ProviderError>>>,
    check_response: Mutex<Option<Result<CheckResponse, ProviderError>>>,
}

impl RecordingProvider {
    /// The RPCs seen so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log lock").clone()
    }

    /// Configures the next Create response.
    pub fn set_create(&self, response: Result<CreateResponse, ProviderError>) {
        *self.create_response.lock().expect("response lock") = Some(response);
    }

    /// Configures the next Update response.
    pub fn set_update(&self, response: Result<UpdateResponse, ProviderError>) {
        *self.update_response.lock().expect("response lock") = Some(response);
    }

    /// Configures the next Delete response.
    pub fn set_delete(&self, response: Result<(), ProviderError>) {
        *self.delete_response.lock().expect("response lock") = Some(response);
    }

    /// Configures the next Read response.
    pub fn set_read(&self, response: Result<ReadResponse, ProviderError>) {
        *self.read_response.lock().expect("response lock") = Some(response);
    }

    /// Configures the next Check response.
    pub fn set_check(&self, response: Result<CheckResponse, ProviderError>) {
        *self.check_response.lock().expect("response lock") = Some(response);
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("call log lock").push(call);
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    async fn create(
        &self,
        _urn: &Urn,
        inputs: &PropertyMap,
        _timeout: Option<Duration>,
        preview: bool,
    ) -> Result<CreateResponse, ProviderError> {
        self.record(if preview { "create[preview]".into() } else { "create".into() });
        self.create_response
            .lock()
            .expect("response lock")
            .clone()
            .unwrap_or_else(|| Ok(CreateResponse::ok("created-id", inputs.clone())))
    }

    #[allow(clippy::too_many_arguments)]
    async fn update(
        &self,
        _urn: &Urn,
        _id: &str,
        _old_inputs: &PropertyMap,
        _old_outputs: &PropertyMap,
        new_inputs: &PropertyMap,
        _timeout: Option<Duration>,
        _ignore_changes: &[String],
        preview: bool,
    ) -> Result<UpdateResponse, ProviderError> {
        self.record(if preview { "update[preview]".into() } else { "update".into() });
        self.update_response
            .lock()
            .expect("response lock")
            .clone()
            .unwrap_or_else(|| Ok(UpdateResponse::ok(new_inputs.clone())))
    }

    async fn delete(
        &self,
        _urn: &Urn,
        _id: &str,
        _inputs: &PropertyMap,
        _outputs: &PropertyMap,
        _timeout: Option<Duration>,
    ) -> Result<(), ProviderError> {
        self.record("delete".into());
        self.delete_response
            .lock()
            .expect("response lock")
            .clone()
            .unwrap_or(Ok(()))
    }

    async fn read(
        &self,
        _urn: &Urn,
        _id: &str,
        inputs: Option<&PropertyMap>,
        state: Option<&PropertyMap>,
    ) -> Result<ReadResponse, ProviderError> {
        self.record("read".into());
        self.read_response
            .lock()
            .expect("response lock")
            .clone()
            .unwrap_or_else(|| {
                Ok(ReadResponse::ok(
                    "",
                    Some(inputs.cloned().unwrap_or_default()),
                    Some(state.cloned().unwrap_or_default()),
                ))
            })
    }

    async fn check(
        &self,
        _urn: &Urn,
        _old_inputs: &PropertyMap,
        new_inputs: &PropertyMap,
        _preview: bool,
        _random_seed: &[u8],
    ) -> Result<CheckResponse, ProviderError> {
        self.record("check".into());
        self.check_response
            .lock()
            .expect("response lock")
            .clone()
            .unwrap_or_else(|| {
                Ok(CheckResponse {
                    inputs: new_inputs.clone(),
                    failures: Vec::new(),
                })
            })
    }
}

/// A provider source that hands back the shared recording provider.
#[derive(Debug)]
struct RecordingSource {
    provider: Arc<RecordingProvider>,
}

#[async_trait]
impl ProviderSource for RecordingSource {
    async fn instantiate(
        &self,
        _package: &str,
        _inputs: &PropertyMap,
    ) -> Result<Arc<dyn Provider>, ProviderError> {
        Ok(Arc::clone(&self.provider) as Arc<dyn Provider>)
    }
}

/// A diagnostics sink that collects every message.
#[derive(Debug, Default)]
pub struct CollectingDiag {
    messages: Mutex<Vec<String>>,
}

impl CollectingDiag {
    /// The messages seen so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("diag lock").clone()
    }
}

impl DiagSink for CollectingDiag {
    fn warning(&self, _urn: &Urn, message: &str) {
        self.messages.lock().expect("diag lock").push(message.to_string());
    }

    fn streamed_warning(&self, _urn: &Urn, message: &str) {
        self.messages.lock().expect("diag lock").push(message.to_string());
    }
}

/// A registration event that records the result it was signalled with.
#[derive(Debug, Default)]
pub struct RecordingRegisterEvent {
    seen: Arc<Mutex<Option<RegisterResult>>>,
}

impl RegisterResourceEvent for RecordingRegisterEvent {
    fn done(&self, result: RegisterResult) {
        *self.seen.lock().expect("event lock") = Some(result);
    }
}

/// A read event that records the result it was signalled with.
#[derive(Debug, Default)]
pub struct RecordingReadEvent {
    seen: Arc<Mutex<Option<ReadResult>>>,
}

impl ReadResourceEvent for RecordingReadEvent {
    fn done(&self, result: ReadResult) {
        *self.seen.lock().expect("event lock") = Some(result);
    }
}

/// Creates a registration event and a handle to the result it receives.
pub fn event() -> (
    Arc<dyn RegisterResourceEvent>,
    Arc<Mutex<Option<RegisterResult>>>,
) {
    let event = RecordingRegisterEvent::default();
    let seen = Arc::clone(&event.seen);
    (Arc::new(event), seen)
}

/// Creates a read event and a handle to the result it receives.
pub fn read_event() -> (Arc<dyn ReadResourceEvent>, Arc<Mutex<Option<ReadResult>>>) {
    let event = RecordingReadEvent::default();
    let seen = Arc::clone(&event.seen);
    (Arc::new(event), seen)
}

/// A blank component state.
pub fn state(urn: &str) -> ResourceState {
    ResourceState::new(urn, "test:index:Widget")
}

/// A custom state with a provider reference and an existing ID.
pub fn custom_state(urn: &str, id: &str) -> ResourceState {
    let mut state = state(urn);
    state.custom = true;
    state.id = id.to_string();
    state.provider = test_provider_ref();
    state
}

/// A desired custom state: provider reference set, no ID yet.
pub fn custom_desired_state(urn: &str) -> ResourceState {
    custom_state(urn, "")
}

/// An external (read-only) custom state.
pub fn external_state(urn: &str, id: &str) -> ResourceState {
    let mut state = custom_state(urn, id);
    state.external = true;
    state
}

/// A custom state being imported: existing ID, not external.
pub fn import_state(urn: &str, id: &str) -> ResourceState {
    custom_state(urn, id)
}

/// A deployment whose registry resolves [`test_provider_ref`] to the given
/// recording provider.
pub fn build_deployment(provider: &Arc<RecordingProvider>) -> Deployment {
    let registry = Arc::new(ProviderRegistry::new(Arc::new(RecordingSource {
        provider: Arc::clone(provider),
    })));
    let reference =
        ProviderReference::parse(&test_provider_ref()).expect("test reference parses");
    registry.register(&reference, Arc::clone(provider) as Arc<dyn Provider>);
    Deployment::new(registry)
}

/// A ready-to-use deployment around the recording provider.
pub fn deployment(provider: &Arc<RecordingProvider>) -> Arc<Deployment> {
    Arc::new(build_deployment(provider))
}

/// A deployment with a collecting diagnostics sink.
pub fn collecting_deployment(
    provider: &Arc<RecordingProvider>,
    preview: bool,
) -> (Arc<Deployment>, Arc<CollectingDiag>) {
    let diag = Arc::new(CollectingDiag::default());
    let deployment = build_deployment(provider)
        .with_diag(Arc::clone(&diag) as Arc<dyn DiagSink>)
        .with_preview(preview);
    (Arc::new(deployment), diag)
}

/// Wraps states into the olds map shape a deployment expects.
pub fn olds_map(states: Vec<SharedState>) -> HashMap<Urn, SharedState> {
    states
        .into_iter()
        .map(|state| {
            let urn = state.read().expect("state lock").urn.clone();
            (urn, state)
        })
        .collect()
}
