//! Provider plugin interface.
//!
//! This module defines the RPC surface a resource provider exposes to the
//! step engine. Transport and process management belong to the plugin
//! host; the engine only sees this trait.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{InitError, ProviderError};
use crate::resource::{PropertyMap, ResourceStatus, Urn};

/// Sentinel ID for a value that is not yet resolved during preview.
pub const UNKNOWN_STRING_VALUE: &str = "7b9c6e21-3c14-4d5a-9f83-52a1c0d8e4b7";

/// Result of a Create RPC.
///
/// A partial failure is a successful RPC that reports degraded health:
/// `status` is [`ResourceStatus::PartialFailure`] and `init_error` carries
/// the reasons. Hard failures are returned as [`ProviderError`] instead.
#[derive(Debug, Clone)]
pub struct CreateResponse {
    /// Provider-assigned identifier; may be empty in preview.
    pub id: String,
    /// Output properties of the live object.
    pub outputs: PropertyMap,
    /// Consistency of the created resource.
    pub status: ResourceStatus,
    /// Initialization failure accompanying a partial failure.
    pub init_error: Option<InitError>,
}

impl CreateResponse {
    /// A fully successful creation.
    #[must_use]
    pub fn ok(id: impl Into<String>, outputs: PropertyMap) -> Self {
        Self {
            id: id.into(),
            outputs,
            status: ResourceStatus::Ok,
            init_error: None,
        }
    }
}

/// Result of an Update RPC.
#[derive(Debug, Clone)]
pub struct UpdateResponse {
    /// Output properties after the update, including cascaded changes.
    pub outputs: PropertyMap,
    /// Consistency of the updated resource.
    pub status: ResourceStatus,
    /// Initialization failure accompanying a partial failure.
    pub init_error: Option<InitError>,
}

impl UpdateResponse {
    /// A fully successful update.
    #[must_use]
    pub fn ok(outputs: PropertyMap) -> Self {
        Self {
            outputs,
            status: ResourceStatus::Ok,
            init_error: None,
        }
    }
}

/// Result of a Read RPC.
#[derive(Debug, Clone)]
pub struct ReadResponse {
    /// The canonical ID of the resource; empty if unchanged.
    pub id: String,
    /// Current input properties, if the provider can recover them.
    pub inputs: Option<PropertyMap>,
    /// Current output properties; `None` means the resource does not exist.
    pub outputs: Option<PropertyMap>,
    /// Consistency of the read resource.
    pub status: ResourceStatus,
    /// Initialization failure accompanying a partial failure.
    pub init_error: Option<InitError>,
}

impl ReadResponse {
    /// A fully successful read.
    #[must_use]
    pub fn ok(id: impl Into<String>, inputs: Option<PropertyMap>, outputs: Option<PropertyMap>) -> Self {
        Self {
            id: id.into(),
            inputs,
            outputs,
            status: ResourceStatus::Ok,
            init_error: None,
        }
    }

    /// A read that found no resource behind the queried ID.
    #[must_use]
    pub fn missing() -> Self {
        Self::ok("", None, None)
    }
}

/// A single input validation failure reported by Check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    /// The property that failed validation; empty for whole-resource
    /// failures.
    pub property: String,
    /// Why validation failed.
    pub reason: String,
}

/// Result of a Check RPC.
#[derive(Debug, Clone)]
pub struct CheckResponse {
    /// Validated inputs with provider defaults applied.
    pub inputs: PropertyMap,
    /// Validation failures, if any.
    pub failures: Vec<CheckFailure>,
}

/// The RPC surface of a resource provider.
///
/// All calls honor the per-operation timeout budget they are handed and
/// surface a timeout as a hard error with [`ResourceStatus::Unknown`].
#[async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
    /// Creates a new resource from the given inputs.
    ///
    /// In preview the provider must not mutate the real world and may
    /// return an empty ID.
    async fn create(
        &self,
        urn: &Urn,
        inputs: &PropertyMap,
        timeout: Option<Duration>,
        preview: bool,
    ) -> Result<CreateResponse, ProviderError>;

    /// Updates an existing resource to the new inputs.
    ///
    /// `ignore_changes` carries property paths the provider may honor for
    /// nested logic; the engine has already applied them to `new_inputs`.
    #[allow(clippy::too_many_arguments)]
    async fn update(
        &self,
        urn: &Urn,
        id: &str,
        old_inputs: &PropertyMap,
        old_outputs: &PropertyMap,
        new_inputs: &PropertyMap,
        timeout: Option<Duration>,
        ignore_changes: &[String],
        preview: bool,
    ) -> Result<UpdateResponse, ProviderError>;

    /// Deletes an existing resource.
    async fn delete(
        &self,
        urn: &Urn,
        id: &str,
        inputs: &PropertyMap,
        outputs: &PropertyMap,
        timeout: Option<Duration>,
    ) -> Result<(), ProviderError>;

    /// Reads the current state of a resource.
    ///
    /// `inputs` carries the last recorded inputs when refreshing; `state`
    /// carries the last known property state, or the declared inputs when
    /// reading a fresh external resource.
    async fn read(
        &self,
        urn: &Urn,
        id: &str,
        inputs: Option<&PropertyMap>,
        state: Option<&PropertyMap>,
    ) -> Result<ReadResponse, ProviderError>;

    /// Validates inputs and applies provider defaults.
    async fn check(
        &self,
        urn: &Urn,
        old_inputs: &PropertyMap,
        new_inputs: &PropertyMap,
        preview: bool,
        random_seed: &[u8],
    ) -> Result<CheckResponse, ProviderError>;
}
