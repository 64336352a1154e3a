// Data Connectors
//
// Leaf producers of the resolution graph: static, subject, LDAP, SQL, HTTP+script
// and scripted. Every connector implements `DataConnector`; failover/cool-down
// (SPEC_FULL.md §4.3) is implemented once, in the resolver, over the common
// `id`/`failover_connector_id`/`health` fields every connector exposes through
// `ConnectorMeta`.

mod cache;
mod http;
mod ldap;
mod scripted;
mod sql;
mod static_connector;
mod subject;

pub use cache::{CacheFingerprint, DashMapResultCache, ResultCache};
pub use http::{HttpConnector, HttpConnectorBuilder};
pub use ldap::{
    ConnectionFactory, ExecutableSearchBuilder, LdapConnection, LdapConnector,
    LdapConnectorBuilder, LdapSearch, MappingStrategy,
};
pub use scripted::{ScriptedConnector, ScriptedConnectorBuilder};
pub use sql::{
    SqlConnectionFactory, SqlConnector, SqlConnectorBuilder, SqlMappingStrategy, SqlRow,
    SqlStatement, StatementBuilder,
};
pub use static_connector::{StaticConnector, StaticConnectorBuilder};
pub use subject::{SubjectConnector, SubjectConnectorBuilder};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Attribute, ConnectorHealth, ResolutionContext};

/// What a connector's `resolve` produced: either a map of attributes, or the
/// distinguished "no results" outcome (SPEC_FULL.md §4.3 — distinct from
/// failure, and from an empty map, so `noResultIsError` can be honored).
pub enum ResolveOutcome {
    Attributes(HashMap<String, Attribute>),
    NoResults,
}

/// Configuration shared by every data connector, independent of variant.
#[derive(Debug, Clone)]
pub struct ConnectorMeta {
    pub id: String,
    pub failover_connector_id: Option<String>,
    pub no_retry_delay: Duration,
    pub export_all_attributes: bool,
    pub export_attributes: Vec<String>,
    pub no_result_is_error: bool,
}

impl ConnectorMeta {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            failover_connector_id: None,
            no_retry_delay: Duration::from_secs(300),
            export_all_attributes: false,
            export_attributes: Vec::new(),
            no_result_is_error: false,
        }
    }

    pub fn exports(&self) -> bool {
        self.export_all_attributes || !self.export_attributes.is_empty()
    }

    pub fn exported_ids<'a>(&'a self, produced: &'a HashMap<String, Attribute>) -> Vec<&'a str> {
        if self.export_all_attributes {
            produced.keys().map(String::as_str).collect()
        } else {
            self.export_attributes.iter().map(String::as_str).collect()
        }
    }
}

/// Common contract every data connector implements. `resolve` is `async` because
/// LDAP/SQL/HTTP connectors perform blocking-equivalent I/O (SPEC_FULL.md §5).
#[async_trait]
pub trait DataConnector: Identified + Send + Sync {
    fn meta(&self) -> &ConnectorMeta;
    fn health(&self) -> &ConnectorHealth;
    fn lifecycle(&self) -> &Lifecycle;

    fn failover_connector_id(&self) -> Option<&str> {
        self.meta().failover_connector_id.as_deref()
    }

    fn no_retry_delay(&self) -> Duration {
        self.meta().no_retry_delay
    }

    fn is_cooling_down(&self) -> bool {
        self.health().is_cooling_down(self.no_retry_delay())
    }

    async fn resolve(&self, ctx: &ResolutionContext) -> Result<ResolveOutcome, EngineError>;

    fn initialize(&self) -> Result<(), EngineError> {
        self.lifecycle().mark_initialized("DataConnector", self.id())
    }

    /// Optional liveness probe (SPEC_FULL.md §4.1); the default just confirms
    /// the node is still in the `initialized` state.
    fn validate(&self) -> Result<(), EngineError> {
        self.lifecycle().ensure_invocable("DataConnector", self.id())
    }

    fn destroy(&self) {
        self.lifecycle().mark_destroyed();
    }
}

pub type ConnectorHandle = Arc<dyn DataConnector>;
