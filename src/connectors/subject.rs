// Subject connector: extracts attributes from principals attached to
// `SubjectContext`. Empty result is an error iff `no_result_is_error` is set.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Attribute, ConnectorHealth, ResolutionContext};
use crate::types::AttributeId;
use crate::validation::ValidationContext;

use super::{ConnectorMeta, DataConnector, ResolveOutcome};

#[derive(Debug)]
pub struct SubjectConnector {
    meta: ConnectorMeta,
    attribute_names: Vec<String>,
    health: ConnectorHealth,
    lifecycle: Lifecycle,
}

impl Identified for SubjectConnector {
    fn id(&self) -> &str {
        &self.meta.id
    }
}

#[async_trait]
impl DataConnector for SubjectConnector {
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
        self.lifecycle.ensure_invocable("SubjectConnector", self.id())?;

        let mut out = HashMap::new();
        for name in &self.attribute_names {
            let values = ctx.subject_context.attribute_values(name);
            if !values.is_empty() {
                out.insert(
                    name.clone(),
                    Attribute::with_values(AttributeId::new(name.clone())?, values),
                );
            }
        }

        if out.is_empty() {
            if self.meta.no_result_is_error {
                self.health.record_failure();
                return Err(EngineError::resolution(
                    self.id(),
                    "subject connector produced no attributes and noResultIsError is set",
                ));
            }
            self.health.record_success();
            return Ok(ResolveOutcome::NoResults);
        }

        self.health.record_success();
        Ok(ResolveOutcome::Attributes(out))
    }
}

pub struct SubjectConnectorBuilder {
    meta: ConnectorMeta,
    attribute_names: Vec<String>,
}

impl SubjectConnectorBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            meta: ConnectorMeta::new(id),
            attribute_names: Vec::new(),
        }
    }

    pub fn attribute_name(mut self, name: impl Into<String>) -> Self {
        self.attribute_names.push(name.into());
        self
    }

    pub fn no_result_is_error(mut self, value: bool) -> Self {
        self.meta.no_result_is_error = value;
        self
    }

    pub fn failover_connector_id(mut self, id: impl Into<String>) -> Self {
        self.meta.failover_connector_id = Some(id.into());
        self
    }

    pub fn build(self) -> Result<SubjectConnector, EngineError> {
        ValidationContext::new("SubjectConnectorBuilder")
            .with_attribute("id", self.meta.id.clone())
            .require(!self.meta.id.trim().is_empty(), "connector id must not be empty")?;
        Ok(SubjectConnector {
            meta: self.meta,
            attribute_names: self.attribute_names,
            health: ConnectorHealth::new(),
            lifecycle: Lifecycle::new(),
        })
    }
}
