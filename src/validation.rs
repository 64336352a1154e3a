// Validation Layer - Contract Enforcement
// Runtime validation helpers shared by every builder and by the handful of
// resolution-time checks that must raise `ConstraintViolation`/`ComponentInitialization`
// with a consistent, attributed message instead of an ad-hoc `format!`.

use std::collections::HashMap;

use crate::error::EngineError;

/// Accumulates operation name + key/value context so a failed `validate()` call
/// produces a message that names what was being built/resolved, not just "false".
#[derive(Clone)]
pub struct ValidationContext {
    operation: String,
    attributes: HashMap<String, String>,
}

impl ValidationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    fn describe(&self) -> String {
        format!("operation={}, context={:?}", self.operation, self.attributes)
    }

    /// Raise a `ConstraintViolation` if `condition` is false.
    pub fn require(self, condition: bool, message: &str) -> Result<(), EngineError> {
        if condition {
            Ok(())
        } else {
            Err(EngineError::constraint(
                self.operation.clone(),
                format!("{message} ({})", self.describe()),
            ))
        }
    }

    /// Raise a `ComponentInitialization` error if `condition` is false. Used by
    /// builders for checks that are configuration errors rather than bad call-site
    /// input (e.g. a `Mapped` definition combining `passThru` with a default).
    pub fn require_at_init(
        self,
        id: &str,
        condition: bool,
        message: &str,
    ) -> Result<(), EngineError> {
        if condition {
            Ok(())
        } else {
            Err(EngineError::init_error(
                self.operation.clone(),
                id,
                format!("{message} ({})", self.describe()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_passes_through_on_true() {
        let ctx = ValidationContext::new("scoped_definition").with_attribute("scope", "s");
        assert!(ctx.require(true, "scope must be non-empty").is_ok());
    }

    #[test]
    fn require_reports_operation_and_attributes() {
        let ctx = ValidationContext::new("scoped_definition").with_attribute("scope", "");
        let err = ctx.require(false, "scope must be non-empty").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("scoped_definition"));
        assert!(message.contains("scope must be non-empty"));
    }

    #[test]
    fn require_at_init_produces_component_initialization_error() {
        let ctx = ValidationContext::new("mapped_definition");
        let err = ctx
            .require_at_init("mapped1", false, "passThru and default are mutually exclusive")
            .unwrap_err();
        assert!(matches!(err, EngineError::ComponentInitialization { .. }));
    }
}
