// Simple: copy input values to output unchanged.

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Attribute, ResolutionContext, WorkContext};
use crate::types::AttributeId;
use crate::validation::ValidationContext;

use super::{merged_dependency_values, AttributeDefinition, DefinitionMeta};

#[derive(Debug)]
pub struct SimpleDefinition {
    meta: DefinitionMeta,
    lifecycle: Lifecycle,
}

impl Identified for SimpleDefinition {
    fn id(&self) -> &str {
        &self.meta.id
    }
}

impl AttributeDefinition for SimpleDefinition {
    fn meta(&self) -> &DefinitionMeta {
        &self.meta
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn resolve(&self, _ctx: &ResolutionContext, work: &WorkContext) -> Result<Option<Attribute>, EngineError> {
        self.lifecycle.ensure_invocable("SimpleDefinition", self.id())?;
        let values = merged_dependency_values(&self.meta, work);
        if values.is_empty() {
            return Ok(None);
        }
        Ok(Some(Attribute::with_values(self.meta.output_attribute_id.clone(), values)))
    }
}

pub struct SimpleDefinitionBuilder {
    meta: DefinitionMeta,
}

impl SimpleDefinitionBuilder {
    pub fn new(id: impl Into<String>, output_attribute_id: AttributeId) -> Self {
        Self {
            meta: DefinitionMeta::new(id, output_attribute_id),
        }
    }

    pub fn depends_on(mut self, dep: crate::model::Dependency) -> Self {
        self.meta.depends_on.push(dep);
        self
    }

    pub fn dependency_only(mut self, value: bool) -> Self {
        self.meta.dependency_only = value;
        self
    }

    pub fn build(self) -> Result<SimpleDefinition, EngineError> {
        ValidationContext::new("SimpleDefinitionBuilder")
            .with_attribute("id", self.meta.id.clone())
            .require(!self.meta.id.trim().is_empty(), "definition id must not be empty")?;
        Ok(SimpleDefinition {
            meta: self.meta,
            lifecycle: Lifecycle::new(),
        })
    }
}
