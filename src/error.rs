//! Error types for the Windlass step engine.
//!
//! This module provides the error hierarchy for step application: provider
//! RPC failures, recoverable initialization errors, and the typed step
//! failures the executor and UI dispatch on.

use thiserror::Error;

use crate::resource::{ResourceStatus, Urn};

/// A recoverable partial failure: the operation ran and altered real state
/// but the resource failed to initialize.
///
/// The carried reasons are persisted on the new state's `init_errors` and
/// the step still completes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("resource failed to initialize: {}", .reasons.join("; "))]
pub struct InitError {
    /// Provider-reported initialization failure messages.
    pub reasons: Vec<String>,
}

impl InitError {
    /// Creates an initialization error from a list of reasons.
    #[must_use]
    pub fn new(reasons: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            reasons: reasons.into_iter().map(Into::into).collect(),
        }
    }
}

/// A hard failure reported by a provider RPC.
///
/// Partial failures are not errors at this layer; they travel inside the
/// RPC response as an [`InitError`] next to the returned state.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProviderError {
    /// Consistency of the real-world resource after the failed call.
    pub status: ResourceStatus,
    /// Description of the failure.
    pub message: String,
}

impl ProviderError {
    /// Creates a provider error with an explicit status.
    #[must_use]
    pub fn new(status: ResourceStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Creates a provider error that left the resource in an unknown state,
    /// e.g. a timeout or cancellation mid-flight.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ResourceStatus::Unknown, message)
    }
}

/// The error type returned from step application.
#[derive(Debug, Error)]
pub enum StepError {
    /// A provider RPC failed hard.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A protected resource was the target of a non-replacing delete.
    #[error(
        "resource \"{urn}\" cannot be deleted because it is protected. \
         To unprotect the resource, remove the `protect` flag from the \
         resource in your program and run `windlass up`, or use the command:\n\
         `windlass state unprotect {}`",
        .urn.quote()
    )]
    DeleteProtected {
        /// URN of the protected resource.
        urn: Urn,
    },

    /// A read or import targeted an ID the provider does not know.
    #[error("resource '{id}' does not exist")]
    ResourceNotFound {
        /// The ID that was queried.
        id: String,
    },

    /// The provider returned outputs but no inputs from an import read.
    #[error(
        "provider does not support importing resources; \
         please try updating the '{package}' plugin"
    )]
    ImportNotSupported {
        /// Package name of the provider plugin.
        package: String,
    },

    /// The declared inputs differ from the resource being imported.
    #[error("inputs to import do not match the existing resource")]
    ImportMismatch,

    /// A planned import named a URN already present in the old state.
    #[error("resource '{urn}' already exists")]
    ResourceAlreadyExists {
        /// The conflicting URN.
        urn: Urn,
    },

    /// A planned import named a parent absent from the new state map.
    #[error("unknown parent '{parent}' for resource '{urn}'")]
    UnknownParent {
        /// The missing parent URN.
        parent: Urn,
        /// The resource being imported.
        urn: Urn,
    },

    /// The provider returned an empty ID from a non-preview create.
    #[error("provider did not return an ID from create")]
    MissingCreateId,

    /// A provider reference string failed to parse.
    #[error("bad provider reference '{reference}' for resource {urn}: {reason}")]
    BadProviderReference {
        /// The malformed reference.
        reference: String,
        /// The resource carrying it.
        urn: Urn,
        /// Why the parse failed.
        reason: String,
    },

    /// A deny-default provider reference was used where a provider is
    /// required.
    #[error(
        "default providers for package '{package}' are disabled; \
         set an explicit provider on resource {urn}"
    )]
    DefaultProviderDenied {
        /// Package whose default provider is denied.
        package: String,
        /// The resource that needs a provider.
        urn: Urn,
    },

    /// A provider reference did not resolve in the registry.
    #[error("unknown provider '{reference}' for resource {urn}")]
    UnknownProvider {
        /// The unresolved reference.
        reference: String,
        /// The resource carrying it.
        urn: Urn,
    },

    /// A provider resource could not be re-registered from its state.
    #[error("bad provider state for resource {urn}: {reason}")]
    BadProviderState {
        /// URN of the provider resource.
        urn: Urn,
        /// Why re-registration failed.
        reason: String,
    },

    /// Provider input validation failed fatally.
    #[error("one or more inputs failed to validate")]
    CheckFailed,

    /// An ignore-changes property path could not be applied.
    #[error("invalid property path '{path}'")]
    InvalidPropertyPath {
        /// The offending path.
        path: String,
    },
}

impl StepError {
    /// Consistency of the real-world resource after the failure.
    ///
    /// Provider failures carry the status the provider reported; every
    /// other failure happens before or after the real-world operation and
    /// leaves the resource consistent.
    #[must_use]
    pub fn status(&self) -> ResourceStatus {
        match self {
            Self::Provider(err) => err.status,
            _ => ResourceStatus::Ok,
        }
    }
}

/// Result type alias for step engine operations.
pub type Result<T> = std::result::Result<T, StepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_protected_message_carries_urn_and_hint() {
        let err = StepError::DeleteProtected { urn: Urn::new("c") };
        let message = err.to_string();
        assert!(message.contains("\"c\""));
        assert!(message.contains("state unprotect 'c'"));
    }

    #[test]
    fn test_init_error_joins_reasons() {
        let err = InitError::new(["x", "y"]);
        assert_eq!(err.to_string(), "resource failed to initialize: x; y");
    }

    #[test]
    fn test_step_error_status() {
        let hard = StepError::Provider(ProviderError::unknown("timed out"));
        assert_eq!(hard.status(), ResourceStatus::Unknown);
        assert_eq!(StepError::ImportMismatch.status(), ResourceStatus::Ok);
    }
}
