// Validated Types
// Strongly-typed wrappers that enforce invariants at construction time, so a
// `ConstraintViolation` happens at the builder call site rather than deep inside
// resolution. Mirrors the "newtype that cannot be built invalid" style used
// throughout this crate's builder layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// The id of a resolver plugin (an attribute definition or a data connector) or a
/// filter-engine node (matcher, policy rule, filter policy). Non-empty, no leading/
/// trailing whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluginId(String);

impl PluginId {
    pub fn new(id: impl Into<String>) -> Result<Self, EngineError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(EngineError::constraint("PluginId", "id must not be empty"));
        }
        if id != id.trim() {
            return Err(EngineError::constraint(
                "PluginId",
                "id must not have leading or trailing whitespace",
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PluginId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<PluginId> for String {
    fn from(value: PluginId) -> Self {
        value.0
    }
}

/// The id of a released attribute. Distinct type from `PluginId` because an
/// attribute-definition's plugin id and the attribute id it emits are allowed to
/// differ (the definition's `sourceAttributeId`, in the base spec's terms).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeId(String);

impl AttributeId {
    pub fn new(id: impl Into<String>) -> Result<Self, EngineError> {
        let id = id.into();
        if id.is_empty() {
            return Err(EngineError::constraint(
                "AttributeId",
                "attribute id must not be empty",
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AttributeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A non-empty scope qualifier attached to a `ScopedString` attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope(String);

impl Scope {
    pub fn new(scope: impl Into<String>) -> Result<Self, EngineError> {
        let scope = scope.into();
        if scope.is_empty() {
            return Err(EngineError::constraint("Scope", "scope must not be empty"));
        }
        Ok(Self(scope))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-empty delimiter used by the `Prescoped` attribute definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiter(String);

impl Delimiter {
    pub fn new(delimiter: impl Into<String>) -> Result<Self, EngineError> {
        let delimiter = delimiter.into();
        if delimiter.is_empty() {
            return Err(EngineError::constraint(
                "Delimiter",
                "delimiter must not be empty",
            ));
        }
        Ok(Self(delimiter))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_id_rejects_empty_and_whitespace() {
        assert!(PluginId::new("").is_err());
        assert!(PluginId::new("  padded  ").is_err());
        assert!(PluginId::new("ok").is_ok());
    }

    #[test]
    fn attribute_id_rejects_empty() {
        assert!(AttributeId::new("").is_err());
        assert!(AttributeId::new("eduPersonPrincipalName").is_ok());
    }

    #[test]
    fn scope_and_delimiter_reject_empty() {
        assert!(Scope::new("").is_err());
        assert!(Scope::new("example.org").is_ok());
        assert!(Delimiter::new("").is_err());
        assert!(Delimiter::new("@").is_ok());
    }
}
