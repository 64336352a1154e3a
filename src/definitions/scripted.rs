// Scripted: evaluates a script with dependency attributes bound by name and
// the context bound as `resolutionContext`; the script must populate a named
// output slot.

use std::sync::Arc;

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Attribute, ResolutionContext, WorkContext};
use crate::scripting::{Bindings, ScriptEvaluator, ScriptValue};
use crate::types::AttributeId;
use crate::validation::ValidationContext;

use super::{AttributeDefinition, DefinitionMeta};

pub struct ScriptedDefinition {
    meta: DefinitionMeta,
    script: String,
    evaluator: Arc<dyn ScriptEvaluator>,
    lifecycle: Lifecycle,
}

impl Identified for ScriptedDefinition {
    fn id(&self) -> &str {
        &self.meta.id
    }
}

impl AttributeDefinition for ScriptedDefinition {
    fn meta(&self) -> &DefinitionMeta {
        &self.meta
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn resolve(&self, ctx: &ResolutionContext, work: &WorkContext) -> Result<Option<Attribute>, EngineError> {
        self.lifecycle.ensure_invocable("ScriptedDefinition", self.id())?;
        let mut bindings = Bindings::new()
            .with_scalar("resolutionContext.principal", ctx.principal.clone())
            .with_scalar("resolutionContext.issuerId", ctx.issuer_id.clone())
            .with_scalar("resolutionContext.recipientId", ctx.recipient_id.clone());

        for dep in &self.meta.depends_on {
            bindings = bindings.with_attribute(dep.plugin_id(), work.dependency_values(dep));
        }

        match self.evaluator.evaluate(&self.script, &bindings)? {
            ScriptValue::Values(values) => {
                if values.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Attribute::with_values(self.meta.output_attribute_id.clone(), values)))
                }
            }
            ScriptValue::Attributes(mut attrs) => {
                let values = attrs.remove(self.meta.output_attribute_id.as_str()).unwrap_or_default();
                if values.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Attribute::with_values(self.meta.output_attribute_id.clone(), values)))
                }
            }
        }
    }
}

pub struct ScriptedDefinitionBuilder {
    meta: DefinitionMeta,
    script: Option<String>,
    evaluator: Option<Arc<dyn ScriptEvaluator>>,
}

impl ScriptedDefinitionBuilder {
    pub fn new(id: impl Into<String>, output_attribute_id: AttributeId) -> Self {
        Self {
            meta: DefinitionMeta::new(id, output_attribute_id),
            script: None,
            evaluator: None,
        }
    }

    pub fn script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn depends_on(mut self, dep: crate::model::Dependency) -> Self {
        self.meta.depends_on.push(dep);
        self
    }

    pub fn dependency_only(mut self, value: bool) -> Self {
        self.meta.dependency_only = value;
        self
    }

    pub fn build(self) -> Result<ScriptedDefinition, EngineError> {
        ValidationContext::new("ScriptedDefinitionBuilder")
            .with_attribute("id", self.meta.id.clone())
            .require(!self.meta.id.trim().is_empty(), "definition id must not be empty")?;
        let script = self
            .script
            .ok_or_else(|| EngineError::init_error("ScriptedDefinition", &self.meta.id, "script is required"))?;
        let evaluator = self
            .evaluator
            .unwrap_or_else(|| Arc::new(crate::scripting::NoScriptEvaluator));
        Ok(ScriptedDefinition {
            meta: self.meta,
            script,
            evaluator,
            lifecycle: Lifecycle::new(),
        })
    }
}
