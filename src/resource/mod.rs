//! Resource model: identity, property maps, and checkpointed state.

mod property;
mod state;
mod urn;

pub use property::{PropertyMap, PropertyValue};
pub use state::{
    shared, CustomTimeouts, ResourceState, ResourceStatus, SharedState, SharedStateExt,
};
pub use urn::{TypeToken, Urn};
