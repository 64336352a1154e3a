// Static connector: returns a pre-configured map; never fails.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Attribute, ConnectorHealth, ResolutionContext};
use crate::validation::ValidationContext;

use super::{ConnectorMeta, DataConnector, ResolveOutcome};

#[derive(Debug)]
pub struct StaticConnector {
    meta: ConnectorMeta,
    values: HashMap<String, Attribute>,
    health: ConnectorHealth,
    lifecycle: Lifecycle,
}

impl Identified for StaticConnector {
    fn id(&self) -> &str {
        &self.meta.id
    }
}

#[async_trait]
impl DataConnector for StaticConnector {
    fn meta(&self) -> &ConnectorMeta {
        &self.meta
    }

    fn health(&self) -> &ConnectorHealth {
        &self.health
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    async fn resolve(&self, _ctx: &ResolutionContext) -> Result<ResolveOutcome, EngineError> {
        self.lifecycle.ensure_invocable("StaticConnector", self.id())?;
        self.health.record_success();
        if self.values.is_empty() {
            Ok(ResolveOutcome::NoResults)
        } else {
            Ok(ResolveOutcome::Attributes(self.values.clone()))
        }
    }
}

pub struct StaticConnectorBuilder {
    meta: ConnectorMeta,
    values: HashMap<String, Attribute>,
}

impl StaticConnectorBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            meta: ConnectorMeta::new(id),
            values: HashMap::new(),
        }
    }

    pub fn failover_connector_id(mut self, id: impl Into<String>) -> Self {
        self.meta.failover_connector_id = Some(id.into());
        self
    }

    pub fn no_retry_delay(mut self, delay: std::time::Duration) -> Self {
        self.meta.no_retry_delay = delay;
        self
    }

    pub fn export_all_attributes(mut self, value: bool) -> Self {
        self.meta.export_all_attributes = value;
        self
    }

    pub fn export_attribute(mut self, id: impl Into<String>) -> Self {
        self.meta.export_attributes.push(id.into());
        self
    }

    pub fn attribute(mut self, id: impl Into<String>, attribute: Attribute) -> Self {
        self.values.insert(id.into(), attribute);
        self
    }

    pub fn build(self) -> Result<StaticConnector, EngineError> {
        ValidationContext::new("StaticConnectorBuilder")
            .with_attribute("id", self.meta.id.clone())
            .require(!self.meta.id.trim().is_empty(), "connector id must not be empty")?;
        Ok(StaticConnector {
            meta: self.meta,
            values: self.values,
            health: ConnectorHealth::new(),
            lifecycle: Lifecycle::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttributeValue;
    use crate::types::AttributeId;

    #[tokio::test]
    async fn static_connector_never_fails_and_returns_configured_map() {
        let connector = StaticConnectorBuilder::new("static1")
            .attribute(
                "eduPersonAffiliation",
                Attribute::with_values(
                    AttributeId::new("eduPersonAffiliation").unwrap(),
                    vec![AttributeValue::String("member".into())],
                ),
            )
            .build()
            .unwrap();
        connector.initialize().unwrap();

        let ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
        match connector.resolve(&ctx).await.unwrap() {
            ResolveOutcome::Attributes(attrs) => assert!(attrs.contains_key("eduPersonAffiliation")),
            ResolveOutcome::NoResults => panic!("expected attributes"),
        }
    }

    #[tokio::test]
    async fn empty_static_connector_returns_no_results() {
        let connector = StaticConnectorBuilder::new("static2").build().unwrap();
        connector.initialize().unwrap();
        let ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
        assert!(matches!(
            connector.resolve(&ctx).await.unwrap(),
            ResolveOutcome::NoResults
        ));
    }
}
