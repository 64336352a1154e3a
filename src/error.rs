// Error Taxonomy
// Every public entry point in this crate returns `Result<T, EngineError>`. The seven
// variants below are the universal taxonomy shared by the resolver, the filter, and
// the reloadable service: lifecycle violations are expected transitions (never panics),
// while `Resolution`/`Filter` carry the underlying cause for logging.

use std::fmt;

/// The single error type returned by every fallible operation in this crate.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Null/invalid input or an invariant violated at a method boundary.
    #[error("constraint violation in {component}: {message}")]
    ConstraintViolation { component: String, message: String },

    /// Operation invoked before `initialize()`.
    #[error("{component} ({id}) has not been initialized")]
    Uninitialized { component: String, id: String },

    /// Operation invoked after `destroy()`.
    #[error("{component} ({id}) has already been destroyed")]
    Destroyed { component: String, id: String },

    /// Mutation attempted after `initialize()`.
    #[error("{component} ({id}) is no longer modifiable once initialized")]
    Unmodifiable { component: String, id: String },

    /// Missing required configuration, a dependency cycle, or an unknown dependency id.
    #[error("failed to initialize {component} ({id}): {message}")]
    ComponentInitialization {
        component: String,
        id: String,
        message: String,
    },

    /// A data connector or attribute definition failed at resolution time.
    #[error("resolution failed for plugin '{plugin_id}': {message}")]
    Resolution {
        plugin_id: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// A matcher returned `Fail` under a strict filter policy.
    #[error("filter error evaluating rule for attribute '{attribute_id}': {message}")]
    Filter {
        attribute_id: String,
        message: String,
    },
}

impl EngineError {
    pub fn constraint(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn uninitialized(component: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Uninitialized {
            component: component.into(),
            id: id.into(),
        }
    }

    pub fn destroyed(component: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Destroyed {
            component: component.into(),
            id: id.into(),
        }
    }

    pub fn unmodifiable(component: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Unmodifiable {
            component: component.into(),
            id: id.into(),
        }
    }

    pub fn init_error(
        component: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ComponentInitialization {
            component: component.into(),
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn resolution(plugin_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            plugin_id: plugin_id.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn resolution_with_source(
        plugin_id: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Resolution {
            plugin_id: plugin_id.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn filter(attribute_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Filter {
            attribute_id: attribute_id.into(),
            message: message.into(),
        }
    }

    /// True for the three lifecycle-violation kinds (useful for metrics bucketing).
    pub fn is_lifecycle_violation(&self) -> bool {
        matches!(
            self,
            Self::Uninitialized { .. } | Self::Destroyed { .. } | Self::Unmodifiable { .. }
        )
    }
}

/// Lightweight marker so call sites can name the failing plugin without allocating
/// a `String` until an error actually occurs.
#[derive(Debug, Clone, Copy)]
pub struct PluginRef<'a>(pub &'a str);

impl fmt::Display for PluginRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
