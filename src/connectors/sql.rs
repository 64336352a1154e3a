// SQL connector: mirrors the LDAP connector's shape (builder -> connection
// factory -> mapping strategy -> optional cache) over a statement/row model
// instead of a search/entry model (SPEC_FULL.md §4.3).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Attribute, ConnectorHealth, ResolutionContext};
use crate::validation::ValidationContext;

use super::{CacheFingerprint, ConnectorMeta, DataConnector, ResolveOutcome, ResultCache};

#[derive(Debug, Clone)]
pub struct SqlStatement {
    pub text: String,
    pub parameters: Vec<String>,
}

impl SqlStatement {
    pub fn fingerprint(&self) -> CacheFingerprint {
        let mut parts: Vec<&str> = vec![&self.text];
        parts.extend(self.parameters.iter().map(String::as_str));
        CacheFingerprint::of(&parts)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SqlRow {
    pub columns: HashMap<String, String>,
}

pub trait StatementBuilder: Send + Sync {
    fn build(&self, ctx: &ResolutionContext) -> Result<SqlStatement, EngineError>;
}

#[async_trait]
pub trait SqlConnectionFactory: Send + Sync {
    async fn query(&self, statement: &SqlStatement) -> Result<Vec<SqlRow>, EngineError>;
}

pub trait SqlMappingStrategy: Send + Sync {
    fn map(&self, rows: &[SqlRow]) -> Result<HashMap<String, Attribute>, EngineError>;
}

pub struct SqlConnector {
    meta: ConnectorMeta,
    statement_builder: Arc<dyn StatementBuilder>,
    connection_factory: Arc<dyn SqlConnectionFactory>,
    mapping_strategy: Arc<dyn SqlMappingStrategy>,
    result_cache: Option<Arc<dyn ResultCache>>,
    health: ConnectorHealth,
    lifecycle: Lifecycle,
}

impl Identified for SqlConnector {
    fn id(&self) -> &str {
        &self.meta.id
    }
}

#[async_trait]
impl DataConnector for SqlConnector {
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
        self.lifecycle.ensure_invocable("SqlConnector", self.id())?;

        let statement = self.statement_builder.build(ctx)?;
        let fingerprint = statement.fingerprint();

        if let Some(cache) = &self.result_cache {
            if let Some(cached) = cache.get_if_present(&fingerprint) {
                return Ok(if cached.is_empty() {
                    ResolveOutcome::NoResults
                } else {
                    ResolveOutcome::Attributes(cached)
                });
            }
        }

        let rows = self.connection_factory.query(&statement).await.map_err(|e| {
            self.health.record_failure();
            e
        })?;

        if rows.is_empty() {
            self.health.record_success();
            if self.meta.no_result_is_error {
                return Err(EngineError::resolution(
                    self.id(),
                    "SQL query returned no rows and noResultIsError is set",
                ));
            }
            if let Some(cache) = &self.result_cache {
                cache.put(fingerprint, HashMap::new());
            }
            return Ok(ResolveOutcome::NoResults);
        }

        let mapped = self.mapping_strategy.map(&rows)?;
        self.health.record_success();
        if let Some(cache) = &self.result_cache {
            cache.put(fingerprint, mapped.clone());
        }
        Ok(ResolveOutcome::Attributes(mapped))
    }
}

pub struct SqlConnectorBuilder {
    meta: ConnectorMeta,
    statement_builder: Option<Arc<dyn StatementBuilder>>,
    connection_factory: Option<Arc<dyn SqlConnectionFactory>>,
    mapping_strategy: Option<Arc<dyn SqlMappingStrategy>>,
    result_cache: Option<Arc<dyn ResultCache>>,
}

impl SqlConnectorBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            meta: ConnectorMeta::new(id),
            statement_builder: None,
            connection_factory: None,
            mapping_strategy: None,
            result_cache: None,
        }
    }

    pub fn statement_builder(mut self, builder: Arc<dyn StatementBuilder>) -> Self {
        self.statement_builder = Some(builder);
        self
    }

    pub fn connection_factory(mut self, factory: Arc<dyn SqlConnectionFactory>) -> Self {
        self.connection_factory = Some(factory);
        self
    }

    pub fn mapping_strategy(mut self, strategy: Arc<dyn SqlMappingStrategy>) -> Self {
        self.mapping_strategy = Some(strategy);
        self
    }

    pub fn result_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.result_cache = Some(cache);
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

    pub fn build(self) -> Result<SqlConnector, EngineError> {
        ValidationContext::new("SqlConnectorBuilder")
            .with_attribute("id", self.meta.id.clone())
            .require(!self.meta.id.trim().is_empty(), "connector id must not be empty")?;
        let statement_builder = self
            .statement_builder
            .ok_or_else(|| EngineError::init_error("SqlConnector", &self.meta.id, "searchExecutor is required"))?;
        let connection_factory = self.connection_factory.ok_or_else(|| {
            EngineError::init_error("SqlConnector", &self.meta.id, "connectionFactory is required")
        })?;
        let mapping_strategy = self.mapping_strategy.ok_or_else(|| {
            EngineError::init_error("SqlConnector", &self.meta.id, "mappingStrategy is required")
        })?;

        Ok(SqlConnector {
            meta: self.meta,
            statement_builder,
            connection_factory,
            mapping_strategy,
            result_cache: self.result_cache,
            health: ConnectorHealth::new(),
            lifecycle: Lifecycle::new(),
        })
    }
}
