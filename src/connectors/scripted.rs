// Scripted connector: invokes an injected `ScriptEvaluator` with the context
// and dependency attributes bound as named variables.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Attribute, ConnectorHealth, ResolutionContext};
use crate::scripting::{Bindings, ScriptEvaluator, ScriptValue};
use crate::types::AttributeId;
use crate::validation::ValidationContext;

use super::{ConnectorMeta, DataConnector, ResolveOutcome};

pub struct ScriptedConnector {
    meta: ConnectorMeta,
    script: String,
    evaluator: Arc<dyn ScriptEvaluator>,
    health: ConnectorHealth,
    lifecycle: Lifecycle,
}

impl Identified for ScriptedConnector {
    fn id(&self) -> &str {
        &self.meta.id
    }
}

#[async_trait]
impl DataConnector for ScriptedConnector {
    fn meta(&self) -> &ConnectorMeta {
        &self.meta
    }

    fn health(&self) -> &ConnectorHealth {
        &self.health
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    async fn resolve(&self, ctx: &ResolutionContext) -> Result<ResolveOutcome, EngineError> {
        self.lifecycle.ensure_invocable("ScriptedConnector", self.id())?;

        let bindings = Bindings::new()
            .with_scalar("resolutionContext.principal", ctx.principal.clone())
            .with_scalar("resolutionContext.issuerId", ctx.issuer_id.clone())
            .with_scalar("resolutionContext.recipientId", ctx.recipient_id.clone());

        match self.evaluator.evaluate(&self.script, &bindings) {
            Ok(ScriptValue::Attributes(raw)) => {
                self.health.record_success();
                let mapped: HashMap<String, Attribute> = raw
                    .into_iter()
                    .map(|(id, values)| Ok((id.clone(), Attribute::with_values(AttributeId::new(id)?, values))))
                    .collect::<Result<_, EngineError>>()?;
                if mapped.is_empty() {
                    Ok(ResolveOutcome::NoResults)
                } else {
                    Ok(ResolveOutcome::Attributes(mapped))
                }
            }
            Ok(ScriptValue::Values(_)) => {
                self.health.record_failure();
                Err(EngineError::resolution(
                    self.id(),
                    "scripted connector must populate named attributes, not a bare value list",
                ))
            }
            Err(e) => {
                self.health.record_failure();
                Err(e)
            }
        }
    }
}

pub struct ScriptedConnectorBuilder {
    meta: ConnectorMeta,
    script: Option<String>,
    evaluator: Option<Arc<dyn ScriptEvaluator>>,
}

impl ScriptedConnectorBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            meta: ConnectorMeta::new(id),
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

    pub fn failover_connector_id(mut self, id: impl Into<String>) -> Self {
        self.meta.failover_connector_id = Some(id.into());
        self
    }

    pub fn build(self) -> Result<ScriptedConnector, EngineError> {
        ValidationContext::new("ScriptedConnectorBuilder")
            .with_attribute("id", self.meta.id.clone())
            .require(!self.meta.id.trim().is_empty(), "connector id must not be empty")?;
        let script = self
            .script
            .ok_or_else(|| EngineError::init_error("ScriptedConnector", &self.meta.id, "script is required"))?;
        let evaluator = self
            .evaluator
            .unwrap_or_else(|| Arc::new(crate::scripting::NoScriptEvaluator));
        Ok(ScriptedConnector {
            meta: self.meta,
            script,
            evaluator,
            health: ConnectorHealth::new(),
            lifecycle: Lifecycle::new(),
        })
    }
}
