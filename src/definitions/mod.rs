// Attribute Definitions
//
// Pure transforms over dependency values: simple passthrough, scoped, prescoped,
// regex-split, mapped, template, date/time, scripted (SPEC_FULL.md §4.4). Every
// definition is optionally `dependency_only`, in which case its output is
// suppressed from the final release set but still observable to downstream
// definitions that depend on it (resolver.rs enforces the suppression).

mod date_time;
mod mapped;
mod prescoped;
mod regex_split;
mod scoped;
mod scripted;
mod simple;
mod template;

pub use date_time::{DateTimeDefinition, DateTimeDefinitionBuilder, EpochUnit};
pub use mapped::{MappedDefinition, MappedDefinitionBuilder, ValueMapping};
pub use prescoped::{PrescopedDefinition, PrescopedDefinitionBuilder};
pub use regex_split::{RegexSplitDefinition, RegexSplitDefinitionBuilder};
pub use scoped::{ScopedDefinition, ScopedDefinitionBuilder};
pub use scripted::{ScriptedDefinition, ScriptedDefinitionBuilder};
pub use simple::{SimpleDefinition, SimpleDefinitionBuilder};
pub use template::{TemplateDefinition, TemplateDefinitionBuilder};

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Attribute, AttributeValue, Dependency, ResolutionContext, WorkContext};
use crate::types::AttributeId;

/// Configuration shared by every attribute definition.
#[derive(Debug, Clone)]
pub struct DefinitionMeta {
    pub id: String,
    pub output_attribute_id: AttributeId,
    pub depends_on: Vec<Dependency>,
    pub dependency_only: bool,
}

impl DefinitionMeta {
    pub fn new(id: impl Into<String>, output_attribute_id: AttributeId) -> Self {
        let id = id.into();
        Self {
            id,
            output_attribute_id,
            depends_on: Vec::new(),
            dependency_only: false,
        }
    }
}

/// Merge every dependency's contributed values into one flat, order-preserving
/// pool — the common input every definition's transform consumes.
pub fn merged_dependency_values(meta: &DefinitionMeta, work: &WorkContext) -> Vec<AttributeValue> {
    let mut values = Vec::new();
    for dep in &meta.depends_on {
        values.extend(work.dependency_values(dep));
    }
    values
}

/// Common contract every attribute definition implements.
pub trait AttributeDefinition: Identified + Send + Sync {
    fn meta(&self) -> &DefinitionMeta;
    fn lifecycle(&self) -> &Lifecycle;

    fn dependencies(&self) -> &[Dependency] {
        &self.meta().depends_on
    }

    fn dependency_only(&self) -> bool {
        self.meta().dependency_only
    }

    /// Run the definition's transform over merged dependency values. Returning
    /// `Ok(None)` means "no attribute produced" (distinct from an attribute
    /// with zero values, though both are dropped at finalization).
    fn resolve(
        &self,
        ctx: &ResolutionContext,
        work: &WorkContext,
    ) -> Result<Option<Attribute>, EngineError>;

    fn initialize(&self) -> Result<(), EngineError> {
        self.lifecycle().mark_initialized("AttributeDefinition", self.id())
    }

    fn validate(&self) -> Result<(), EngineError> {
        self.lifecycle().ensure_invocable("AttributeDefinition", self.id())
    }

    fn destroy(&self) {
        self.lifecycle().mark_destroyed();
    }
}

pub type DefinitionHandle = std::sync::Arc<dyn AttributeDefinition>;
