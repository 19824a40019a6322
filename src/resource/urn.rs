//! Resource identity: URNs and type tokens.
//!
//! A URN is the stable identity of a resource within a stack. Type tokens
//! classify resources; provider resources are distinguished by the
//! `providers` module namespace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The module namespace reserved for provider resources.
const PROVIDERS_MODULE: &str = "providers";

/// Uniform resource name: the globally unique identity of a resource
/// within a stack.
///
/// Fully qualified URNs have the shape
/// `urn:windlass:<stack>::<project>::<type>::<name>`, but the engine treats
/// the value as opaque except where a type or name must be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(String);

impl Urn {
    /// Creates a URN from its string form.
    #[must_use]
    pub fn new(urn: impl Into<String>) -> Self {
        Self(urn.into())
    }

    /// Returns the URN as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the URN is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Extracts the type token embedded in a fully qualified URN.
    ///
    /// Returns `None` for URNs that do not carry the
    /// `urn:windlass:<stack>::<project>::<type>::<name>` shape.
    #[must_use]
    pub fn type_token(&self) -> Option<TypeToken> {
        let segments: Vec<&str> = self.0.split("::").collect();
        if segments.len() >= 4 {
            Some(TypeToken::new(segments[segments.len() - 2]))
        } else {
            None
        }
    }

    /// Extracts the resource name from a fully qualified URN.
    ///
    /// Falls back to the whole URN when no `::` separators are present.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit("::").next().unwrap_or(&self.0)
    }

    /// Returns the URN quoted for use in a shell command hint.
    #[must_use]
    pub fn quote(&self) -> String {
        format!("'{}'", self.0)
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Urn {
    fn from(urn: &str) -> Self {
        Self::new(urn)
    }
}

impl From<String> for Urn {
    fn from(urn: String) -> Self {
        Self(urn)
    }
}

/// Type token of a resource, in `<package>:<module>:<name>` form.
///
/// Provider resources use the reserved `providers` module, e.g.
/// `windlass:providers:aws`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeToken(String);

impl TypeToken {
    /// Creates a type token from its string form.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the package component (everything before the first `:`).
    #[must_use]
    pub fn package(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }

    /// Returns the module component, or an empty string if absent.
    #[must_use]
    pub fn module(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or("")
    }

    /// Returns the name component (everything after the last `:`).
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or(&self.0)
    }

    /// Returns true if this token names a provider resource.
    #[must_use]
    pub fn is_provider(&self) -> bool {
        self.module() == PROVIDERS_MODULE
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urn_type_and_name() {
        let urn = Urn::new("urn:windlass:prod::site::aws:ec2:Instance::web");
        assert_eq!(urn.type_token(), Some(TypeToken::new("aws:ec2:Instance")));
        assert_eq!(urn.name(), "web");
    }

    #[test]
    fn test_bare_urn_has_no_type() {
        let urn = Urn::new("a");
        assert_eq!(urn.type_token(), None);
        assert_eq!(urn.name(), "a");
    }

    #[test]
    fn test_provider_type_detection() {
        assert!(TypeToken::new("windlass:providers:aws").is_provider());
        assert!(!TypeToken::new("aws:ec2:Instance").is_provider());
        assert!(!TypeToken::new("aws").is_provider());
    }

    #[test]
    fn test_type_token_components() {
        let token = TypeToken::new("windlass:providers:gcp");
        assert_eq!(token.package(), "windlass");
        assert_eq!(token.module(), "providers");
        assert_eq!(token.name(), "gcp");
    }
}
