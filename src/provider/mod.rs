//! Provider plugins: RPC surface, reference grammar, and instance registry.

mod plugin;
mod reference;
mod registry;

pub use plugin::{
    CheckFailure, CheckResponse, CreateResponse, Provider, ReadResponse, UpdateResponse,
    UNKNOWN_STRING_VALUE,
};
pub use reference::{ProviderReference, ReferenceParseError, DENY_DEFAULT_PROVIDER_ID};
pub use registry::{ProviderRegistry, ProviderSource};
