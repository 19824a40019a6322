//! Checkpointed state of a single resource.
//!
//! A [`ResourceState`] is owned by the snapshot; during a deployment, steps
//! hold shared references and are the only site allowed to mutate one.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::property::PropertyMap;
use super::urn::{TypeToken, Urn};

/// Consistency of the real-world resource after a step application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// The resource is in a consistent state.
    Ok,
    /// The operation ran and altered real state but reported
    /// initialization errors; its effects must still be committed.
    PartialFailure,
    /// The state of the resource is unknown (e.g. the operation timed out
    /// or was cancelled mid-flight).
    Unknown,
}

/// Per-operation duration budgets for provider RPCs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTimeouts {
    /// Budget for the Create RPC.
    pub create: Option<Duration>,
    /// Budget for the Update RPC.
    pub update: Option<Duration>,
    /// Budget for the Delete RPC.
    pub delete: Option<Duration>,
}

/// Recorded state of one resource: identity, inputs, outputs, and metadata.
///
/// Immutable by convention outside of step application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Globally unique identity within the stack.
    pub urn: Urn,
    /// Type token; may name a provider resource.
    pub type_token: TypeToken,
    /// Provider-assigned identifier; empty for never-created resources and
    /// for desired states.
    pub id: String,
    /// True if the resource has a provider-backed lifecycle; false for
    /// logical component resources.
    pub custom: bool,
    /// True if the resource's lifecycle is owned outside this system and we
    /// only read it.
    pub external: bool,
    /// Provider reference string; required when `custom` and the resource
    /// is not itself a provider.
    pub provider: String,
    /// Input properties.
    pub inputs: PropertyMap,
    /// Output properties.
    pub outputs: PropertyMap,
    /// Parent URN; `None` marks a root resource.
    pub parent: Option<Urn>,
    /// URNs this resource depends on.
    pub dependencies: Vec<Urn>,
    /// Per-property dependency URNs.
    pub property_dependencies: BTreeMap<String, Vec<Urn>>,
    /// True prevents deletion outside of replacement.
    pub protect: bool,
    /// True causes Delete to skip the provider call but still drop the
    /// resource from state.
    pub retain_on_delete: bool,
    /// URN whose deletion implicitly deletes this resource.
    pub deleted_with: Option<Urn>,
    /// Transient flag marking the resource for removal in this deployment.
    ///
    /// A replace-create may set this before the paired delete step runs; a
    /// checkpoint persisted between the two records `delete = true` for a
    /// still-live resource, which the next deployment reads as "deletion
    /// owed" and settles with a delete-replaced step. The live resource is
    /// never re-materialised from the flag.
    pub delete: bool,
    /// Persisted marker that a delete is owed for a partially-completed
    /// replacement and must happen on the next deployment.
    pub pending_replacement: bool,
    /// Initialization-failure messages reported by the provider.
    pub init_errors: Vec<String>,
    /// Per-operation provider RPC budgets.
    pub custom_timeouts: CustomTimeouts,
    /// The ID this resource was imported with, if any.
    pub import_id: String,
    /// Output properties to additionally treat as secret.
    pub additional_secret_outputs: Vec<String>,
    /// Previous URNs this resource was known under.
    pub aliases: Vec<Urn>,
    /// Source position of the registration in the user program.
    pub source_position: String,
    /// When the real-world resource was created (UTC).
    pub created: Option<DateTime<Utc>>,
    /// When the real-world resource was last modified (UTC).
    pub modified: Option<DateTime<Utc>>,
}

impl ResourceState {
    /// Creates a state with the given identity and all other fields empty.
    #[must_use]
    pub fn new(urn: impl Into<Urn>, type_token: impl Into<TypeToken>) -> Self {
        Self {
            urn: urn.into(),
            type_token: type_token.into(),
            id: String::new(),
            custom: false,
            external: false,
            provider: String::new(),
            inputs: PropertyMap::new(),
            outputs: PropertyMap::new(),
            parent: None,
            dependencies: Vec::new(),
            property_dependencies: BTreeMap::new(),
            protect: false,
            retain_on_delete: false,
            deleted_with: None,
            delete: false,
            pending_replacement: false,
            init_errors: Vec::new(),
            custom_timeouts: CustomTimeouts::default(),
            import_id: String::new(),
            additional_secret_outputs: Vec::new(),
            aliases: Vec::new(),
            source_position: String::new(),
            created: None,
            modified: None,
        }
    }

    /// Returns true if this state describes a provider resource.
    #[must_use]
    pub fn is_provider(&self) -> bool {
        self.type_token.is_provider()
    }
}

/// A resource state shared between the snapshot and the steps of a
/// deployment.
pub type SharedState = Arc<RwLock<ResourceState>>;

/// Wraps a state for sharing with a deployment.
#[must_use]
pub fn shared(state: ResourceState) -> SharedState {
    Arc::new(RwLock::new(state))
}

/// Lock accessors for [`SharedState`].
///
/// Steps take these guards only for short scopes that never span a provider
/// RPC await.
pub trait SharedStateExt {
    /// Acquires the state for reading.
    fn read_state(&self) -> RwLockReadGuard<'_, ResourceState>;
    /// Acquires the state for writing.
    fn write_state(&self) -> RwLockWriteGuard<'_, ResourceState>;
}

impl SharedStateExt for SharedState {
    fn read_state(&self) -> RwLockReadGuard<'_, ResourceState> {
        self.read().expect("resource state lock poisoned")
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ResourceState> {
        self.write().expect("resource state lock poisoned")
    }
}
