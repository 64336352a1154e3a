// LDAP connector: builds a search from the context via an injected
// `ExecutableSearchBuilder`, executes it via an injected `ConnectionFactory`,
// and maps the response through an injected `MappingStrategy`. No concrete
// directory driver is linked by this crate (SPEC_FULL.md §4.3).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Attribute, ConnectorHealth, ResolutionContext};
use crate::validation::ValidationContext;

use super::{CacheFingerprint, ConnectorMeta, DataConnector, ResolveOutcome, ResultCache};

/// A built LDAP search: filter text plus the base DN it runs against.
#[derive(Debug, Clone)]
pub struct LdapSearch {
    pub base_dn: String,
    pub filter: String,
    pub return_attributes: Vec<String>,
}

impl LdapSearch {
    pub fn fingerprint(&self) -> CacheFingerprint {
        CacheFingerprint::of(&[&self.base_dn, &self.filter])
    }
}

/// A single directory entry returned by a search, as raw attribute -> values.
#[derive(Debug, Clone, Default)]
pub struct LdapConnection {
    pub entries: Vec<HashMap<String, Vec<String>>>,
}

/// Builds an `LdapSearch` from the resolution context (e.g. substituting
/// `$resolutionContext.principal` into a templated filter).
pub trait ExecutableSearchBuilder: Send + Sync {
    fn build(&self, ctx: &ResolutionContext) -> Result<LdapSearch, EngineError>;
}

/// Executes a built search against a directory and returns raw entries. The
/// concrete directory client lives outside this crate; this is the seam.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn search(&self, search: &LdapSearch) -> Result<LdapConnection, EngineError>;
}

/// Maps raw directory entries into named `Attribute`s.
pub trait MappingStrategy: Send + Sync {
    fn map(&self, connection: &LdapConnection) -> Result<HashMap<String, Attribute>, EngineError>;
}

pub struct LdapConnector {
    meta: ConnectorMeta,
    search_builder: Arc<dyn ExecutableSearchBuilder>,
    connection_factory: Arc<dyn ConnectionFactory>,
    mapping_strategy: Arc<dyn MappingStrategy>,
    result_cache: Option<Arc<dyn ResultCache>>,
    validate_filter: bool,
    health: ConnectorHealth,
    lifecycle: Lifecycle,
}

/// Lightweight balanced-parenthesis syntax check for a built LDAP filter, used
/// when `validateFilter` is set (SPEC_FULL.md §6). This crate links no
/// concrete LDAP client, so a full RFC 4515 grammar check is out of reach;
/// this catches the common "templated filter left a substitution unclosed"
/// class of misconfiguration before the search is ever sent.
fn is_balanced_ldap_filter(filter: &str) -> bool {
    let mut depth = 0i32;
    for c in filter.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0 && filter.trim_start().starts_with('(')
}

impl Identified for LdapConnector {
    fn id(&self) -> &str {
        &self.meta.id
    }
}

#[async_trait]
impl DataConnector for LdapConnector {
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
        self.lifecycle.ensure_invocable("LdapConnector", self.id())?;

        let search = self.search_builder.build(ctx)?;
        if self.validate_filter && !is_balanced_ldap_filter(&search.filter) {
            return Err(EngineError::resolution(
                self.id(),
                format!("built LDAP filter failed validateFilter syntax check: '{}'", search.filter),
            ));
        }
        let fingerprint = search.fingerprint();

        if let Some(cache) = &self.result_cache {
            if let Some(cached) = cache.get_if_present(&fingerprint) {
                return Ok(if cached.is_empty() {
                    ResolveOutcome::NoResults
                } else {
                    ResolveOutcome::Attributes(cached)
                });
            }
        }

        let connection = self.connection_factory.search(&search).await.map_err(|e| {
            self.health.record_failure();
            e
        })?;

        if connection.entries.is_empty() {
            self.health.record_success();
            if self.meta.no_result_is_error {
                return Err(EngineError::resolution(
                    self.id(),
                    "LDAP search returned no entries and noResultIsError is set",
                ));
            }
            if let Some(cache) = &self.result_cache {
                cache.put(fingerprint, HashMap::new());
            }
            return Ok(ResolveOutcome::NoResults);
        }

        let mapped = self.mapping_strategy.map(&connection)?;
        self.health.record_success();
        if let Some(cache) = &self.result_cache {
            cache.put(fingerprint, mapped.clone());
        }
        Ok(ResolveOutcome::Attributes(mapped))
    }
}

pub struct LdapConnectorBuilder {
    meta: ConnectorMeta,
    search_builder: Option<Arc<dyn ExecutableSearchBuilder>>,
    connection_factory: Option<Arc<dyn ConnectionFactory>>,
    mapping_strategy: Option<Arc<dyn MappingStrategy>>,
    result_cache: Option<Arc<dyn ResultCache>>,
    validate_filter: bool,
}

impl LdapConnectorBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            meta: ConnectorMeta::new(id),
            search_builder: None,
            connection_factory: None,
            mapping_strategy: None,
            result_cache: None,
            validate_filter: false,
        }
    }

    /// Reject a built search whose filter fails a basic syntax check before
    /// it's ever sent to the directory (SPEC_FULL.md §6, `validateFilter`).
    pub fn validate_filter(mut self, value: bool) -> Self {
        self.validate_filter = value;
        self
    }

    pub fn search_builder(mut self, builder: Arc<dyn ExecutableSearchBuilder>) -> Self {
        self.search_builder = Some(builder);
        self
    }

    pub fn connection_factory(mut self, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.connection_factory = Some(factory);
        self
    }

    pub fn mapping_strategy(mut self, strategy: Arc<dyn MappingStrategy>) -> Self {
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

    pub fn no_retry_delay(mut self, delay: std::time::Duration) -> Self {
        self.meta.no_retry_delay = delay;
        self
    }

    pub fn build(self) -> Result<LdapConnector, EngineError> {
        ValidationContext::new("LdapConnectorBuilder")
            .with_attribute("id", self.meta.id.clone())
            .require(!self.meta.id.trim().is_empty(), "connector id must not be empty")?;
        let search_builder = self
            .search_builder
            .ok_or_else(|| EngineError::init_error("LdapConnector", &self.meta.id, "searchExecutor is required"))?;
        let connection_factory = self.connection_factory.ok_or_else(|| {
            EngineError::init_error("LdapConnector", &self.meta.id, "connectionFactory is required")
        })?;
        let mapping_strategy = self.mapping_strategy.ok_or_else(|| {
            EngineError::init_error("LdapConnector", &self.meta.id, "mappingStrategy is required")
        })?;

        Ok(LdapConnector {
            meta: self.meta,
            search_builder,
            connection_factory,
            mapping_strategy,
            result_cache: self.result_cache,
            validate_filter: self.validate_filter,
            health: ConnectorHealth::new(),
            lifecycle: Lifecycle::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_filter_check() {
        assert!(is_balanced_ldap_filter("(uid=jdoe)"));
        assert!(is_balanced_ldap_filter("(&(uid=jdoe)(objectClass=person))"));
        assert!(!is_balanced_ldap_filter("(uid=jdoe"));
        assert!(!is_balanced_ldap_filter("uid=jdoe)"));
        assert!(!is_balanced_ldap_filter("uid=jdoe"));
    }
}
