//! Provider instance registry.
//!
//! The registry maps provider references to live provider instances. It is
//! itself the provider for provider-typed resources: creating or updating
//! a provider resource instantiates a plugin through the
//! [`ProviderSource`] seam and registers it under its reference.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::ProviderError;
use crate::resource::{PropertyMap, ResourceState, Urn};

use super::plugin::{
    CheckResponse, CreateResponse, Provider, ReadResponse, UpdateResponse, UNKNOWN_STRING_VALUE,
};
use super::reference::ProviderReference;

/// Instantiates provider plugins for the registry.
///
/// The plugin host implements this; the registry only needs a way to turn
/// a package name and configuration inputs into a live instance.
#[async_trait]
pub trait ProviderSource: Send + Sync + fmt::Debug {
    /// Boots a provider plugin for `package` configured with `inputs`.
    async fn instantiate(
        &self,
        package: &str,
        inputs: &PropertyMap,
    ) -> Result<Arc<dyn Provider>, ProviderError>;
}

/// Registry of live provider instances, keyed by reference.
#[derive(Debug)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
    source: Arc<dyn ProviderSource>,
}

impl ProviderRegistry {
    /// Creates an empty registry backed by the given plugin source.
    #[must_use]
    pub fn new(source: Arc<dyn ProviderSource>) -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            source,
        }
    }

    /// Registers a provider instance under a reference.
    pub fn register(&self, reference: &ProviderReference, provider: Arc<dyn Provider>) {
        self.providers
            .write()
            .expect("provider registry lock poisoned")
            .insert(reference.to_string(), provider);
    }

    /// Looks up the provider instance for a reference.
    #[must_use]
    pub fn get(&self, reference: &ProviderReference) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .expect("provider registry lock poisoned")
            .get(&reference.to_string())
            .cloned()
    }

    /// Ensures the provider described by an unchanged provider-resource
    /// state is present in the registry under its reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the state carries no ID or the plugin cannot be
    /// instantiated from the recorded inputs.
    pub async fn same(&self, state: &ResourceState) -> Result<(), ProviderError> {
        if state.id.is_empty() {
            return Err(ProviderError::new(
                crate::resource::ResourceStatus::Ok,
                "provider resource has no ID",
            ));
        }
        let reference = ProviderReference::new(state.urn.clone(), state.id.clone());
        if self.get(&reference).is_some() {
            return Ok(());
        }
        let provider = self
            .source
            .instantiate(&package_of(&state.urn)?, &state.inputs)
            .await?;
        debug!(reference = %reference, "re-registered unchanged provider");
        self.register(&reference, provider);
        Ok(())
    }
}

fn package_of(urn: &Urn) -> Result<String, ProviderError> {
    urn.type_token()
        .map(|token| token.name().to_string())
        .ok_or_else(|| {
            ProviderError::new(
                crate::resource::ResourceStatus::Ok,
                format!("provider URN '{urn}' carries no type token"),
            )
        })
}

#[async_trait]
impl Provider for ProviderRegistry {
    async fn create(
        &self,
        urn: &Urn,
        inputs: &PropertyMap,
        _timeout: Option<Duration>,
        preview: bool,
    ) -> Result<CreateResponse, ProviderError> {
        let provider = self.source.instantiate(&package_of(urn)?, inputs).await?;
        let id = if preview {
            UNKNOWN_STRING_VALUE.to_string()
        } else {
            Uuid::new_v4().to_string()
        };
        self.register(&ProviderReference::new(urn.clone(), id.clone()), provider);
        Ok(CreateResponse::ok(id, inputs.clone()))
    }

    async fn update(
        &self,
        urn: &Urn,
        id: &str,
        _old_inputs: &PropertyMap,
        _old_outputs: &PropertyMap,
        new_inputs: &PropertyMap,
        _timeout: Option<Duration>,
        _ignore_changes: &[String],
        _preview: bool,
    ) -> Result<UpdateResponse, ProviderError> {
        let provider = self.source.instantiate(&package_of(urn)?, new_inputs).await?;
        self.register(&ProviderReference::new(urn.clone(), id), provider);
        Ok(UpdateResponse::ok(new_inputs.clone()))
    }

    async fn delete(
        &self,
        urn: &Urn,
        id: &str,
        _inputs: &PropertyMap,
        _outputs: &PropertyMap,
        _timeout: Option<Duration>,
    ) -> Result<(), ProviderError> {
        let reference = ProviderReference::new(urn.clone(), id);
        self.providers
            .write()
            .expect("provider registry lock poisoned")
            .remove(&reference.to_string());
        Ok(())
    }

    async fn read(
        &self,
        _urn: &Urn,
        id: &str,
        inputs: Option<&PropertyMap>,
        state: Option<&PropertyMap>,
    ) -> Result<ReadResponse, ProviderError> {
        Ok(ReadResponse::ok(id, inputs.cloned(), state.cloned()))
    }

    async fn check(
        &self,
        _urn: &Urn,
        _old_inputs: &PropertyMap,
        new_inputs: &PropertyMap,
        _preview: bool,
        _random_seed: &[u8],
    ) -> Result<CheckResponse, ProviderError> {
        Ok(CheckResponse {
            inputs: new_inputs.clone(),
            failures: Vec::new(),
        })
    }
}
