//! Provider reference grammar.
//!
//! A provider reference names a concrete provider instance as
//! `<urn>::<id>`. The step engine treats references opaquely and surfaces
//! parse errors verbatim.

use std::fmt;

use thiserror::Error;

use crate::resource::Urn;

/// Sentinel instance ID marking a reference whose default provider has
/// been denied by policy.
pub const DENY_DEFAULT_PROVIDER_ID: &str = "deny-default-provider";

/// A provider reference string failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ReferenceParseError {
    /// Why the reference is malformed.
    pub reason: String,
}

/// A parsed reference to a provider instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderReference {
    urn: Urn,
    id: String,
}

impl ProviderReference {
    /// Builds a reference from a provider resource's URN and ID.
    #[must_use]
    pub fn new(urn: Urn, id: impl Into<String>) -> Self {
        Self { urn, id: id.into() }
    }

    /// Parses a `<urn>::<id>` reference, splitting on the last `::`.
    ///
    /// # Errors
    ///
    /// Returns an error if either component is missing or empty.
    pub fn parse(reference: &str) -> Result<Self, ReferenceParseError> {
        let Some((urn, id)) = reference.rsplit_once("::") else {
            return Err(ReferenceParseError {
                reason: format!("expected '<urn>::<id>', got '{reference}'"),
            });
        };
        if urn.is_empty() || id.is_empty() {
            return Err(ReferenceParseError {
                reason: format!("reference '{reference}' has an empty component"),
            });
        }
        Ok(Self {
            urn: Urn::new(urn),
            id: id.to_string(),
        })
    }

    /// The URN of the provider resource.
    #[must_use]
    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    /// The instance ID of the provider resource.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns true if this reference denies the default provider.
    #[must_use]
    pub fn is_deny_default(&self) -> bool {
        self.id == DENY_DEFAULT_PROVIDER_ID
    }

    /// The package whose default provider this reference denies.
    ///
    /// Provider URNs embed a `windlass:providers:<package>` type token; a
    /// reference without one falls back to the URN's name segment.
    #[must_use]
    pub fn package(&self) -> String {
        self.urn
            .type_token()
            .map_or_else(|| self.urn.name().to_string(), |token| token.name().to_string())
    }
}

impl fmt::Display for ProviderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.urn, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        let reference =
            ProviderReference::parse("urn:windlass:dev::site::windlass:providers:aws::default::prov-1")
                .expect("reference should parse");
        assert_eq!(
            reference.urn().as_str(),
            "urn:windlass:dev::site::windlass:providers:aws::default"
        );
        assert_eq!(reference.id(), "prov-1");
        assert_eq!(
            reference.to_string(),
            "urn:windlass:dev::site::windlass:providers:aws::default::prov-1"
        );
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        assert!(ProviderReference::parse("no-separator").is_err());
        assert!(ProviderReference::parse("urn::").is_err());
    }

    #[test]
    fn test_deny_default_detection() {
        let reference = ProviderReference::parse(&format!(
            "urn:windlass:dev::site::windlass:providers:aws::default::{DENY_DEFAULT_PROVIDER_ID}"
        ))
        .expect("reference should parse");
        assert!(reference.is_deny_default());
        assert_eq!(reference.package(), "aws");
    }
}
