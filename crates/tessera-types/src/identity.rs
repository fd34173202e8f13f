//! Account identity of a group member or requester.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Result, TypesError};

/// Opaque account identifier.
///
/// Only equality is meaningful; the workflow never inspects the contents.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Create an identity from an account identifier string.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(TypesError::InvalidIdentity("empty identifier".to_string()));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(TypesError::InvalidIdentity(
                "identifier contains control characters".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_trims_whitespace() {
        let id = Identity::new("  alice@example ").expect("valid identity");
        assert_eq!(id.as_str(), "alice@example");
        assert_eq!(id, Identity::new("alice@example").expect("valid identity"));
    }

    #[test]
    fn test_identity_rejects_empty() {
        assert!(Identity::new("   ").is_err());
        assert!(Identity::new("bob\n2").is_err());
    }

    #[test]
    fn test_identity_serializes_as_string() {
        let id = Identity::new("carol").expect("valid identity");
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "\"carol\"");
        let back: Identity = serde_json::from_str("\"carol\"").expect("deserialize");
        assert_eq!(back, id);
    }
}
