// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(missing_docs)]                // All public items should be documented

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Windlass
//!
//! The resource deployment step engine of a declarative
//! infrastructure-as-code system.
//!
//! ## Overview
//!
//! A deployment turns a sequence of declarative intents (register, read,
//! refresh, import) into **steps**: atomic operations that invoke a
//! resource provider to mutate the real world and evolve the checkpointed
//! state accordingly. Windlass owns the step model:
//!
//! - The taxonomy of the fifteen step operations and their display forms
//! - The nine concrete step shapes, their construction invariants, and
//!   their apply semantics
//! - The apply protocol between a step and the executor, including
//!   partial-failure handling and the deferred completion discipline
//! - Provider resolution, including self-referential provider resources
//!
//! The step generator (which steps to emit), the deployment executor
//! (scheduling), the provider plugin host (transport), and the snapshot
//! manager (persistence) are external collaborators reached through the
//! interfaces in this crate.
//!
//! ## Modules
//!
//! - [`resource`]: URNs, property maps, and checkpointed resource state
//! - [`provider`]: the provider RPC trait, reference grammar, and registry
//! - [`deploy`]: the step model itself
//! - [`error`]: the step engine error hierarchy

// ============================================================================
// Modules
// ============================================================================

pub mod deploy;
pub mod error;
pub mod provider;
pub mod resource;

// ============================================================================
// Re-exports
// ============================================================================

pub use deploy::{
    CreateStep, DeleteStep, Deployment, ImportStep, ReadStep, RefreshStep,
    RemovePendingReplaceStep, ReplaceStep, SameStep, Step, StepApplyOutcome, StepCompletion,
    StepOp, UpdateStep, ALL_OPS,
};
pub use error::{InitError, ProviderError, Result, StepError};
pub use provider::{Provider, ProviderRegistry, ProviderSource};
pub use resource::{PropertyMap, ResourceState, ResourceStatus, SharedState, TypeToken, Urn};
