// Resolver Engine
//
// The dependency walker that realizes attribute definitions and data connectors
// in correct order (SPEC_FULL.md §4.5). `initialize()` indexes every plugin by id
// and proves the dependency graph is acyclic; `resolve()` performs the lazy,
// demand-driven, per-request walk, with connector failover/cool-down (§4.3)
// folded into connector resolution.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, instrument, warn};

use crate::connectors::{ConnectorHandle, DataConnector, ResolveOutcome};
use crate::definitions::DefinitionHandle;
use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Dependency, FailoverRecord, ResolutionContext};
use crate::observability::{record_metric, MetricType, Operation};
use crate::validation::ValidationContext;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DependencyKind {
    Attribute,
    DataConnector,
}

/// The dependency-graph evaluator over attribute definitions and data connectors.
/// Shared immutably (`Arc<ResolverEngine>`) across concurrently resolving requests.
pub struct ResolverEngine {
    lifecycle: Lifecycle,
    definitions: HashMap<String, DefinitionHandle>,
    connectors: HashMap<String, ConnectorHandle>,
    strip_nulls: bool,
}

impl ResolverEngine {
    /// Indexes every plugin by id, validates failover references, and proves
    /// acyclicity (SPEC_FULL.md §4.5, "Initialization").
    pub fn initialize(&self) -> Result<(), EngineError> {
        self.lifecycle.mark_initialized("ResolverEngine", "resolver")?;

        for connector in self.connectors.values() {
            if let Some(failover_id) = connector.failover_connector_id() {
                if !self.connectors.contains_key(failover_id) {
                    return Err(EngineError::init_error(
                        "ResolverEngine",
                        connector.id(),
                        format!("failoverConnectorId '{failover_id}' does not name a configured connector"),
                    ));
                }
            }
        }

        self.check_acyclic()?;

        for def in self.definitions.values() {
            def.initialize()?;
        }
        for conn in self.connectors.values() {
            conn.initialize()?;
        }
        Ok(())
    }

    /// Optional liveness probe: confirms the engine and every plugin is still
    /// in the `initialized` state (SPEC_FULL.md §4.1).
    pub fn validate(&self) -> Result<(), EngineError> {
        self.lifecycle.ensure_invocable("ResolverEngine", "resolver")?;
        for def in self.definitions.values() {
            def.validate()?;
        }
        for conn in self.connectors.values() {
            conn.validate()?;
        }
        Ok(())
    }

    pub fn destroy(&self) {
        for def in self.definitions.values() {
            def.destroy();
        }
        for conn in self.connectors.values() {
            conn.destroy();
        }
        self.lifecycle.mark_destroyed();
    }

    fn build_dependency_graph(&self) -> Result<DiGraph<String, DependencyKind>, EngineError> {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
        for id in self.definitions.keys().chain(self.connectors.keys()) {
            let idx = graph.add_node(id.clone());
            nodes.insert(id.clone(), idx);
        }
        for (id, def) in &self.definitions {
            let from = nodes[id];
            for dep in def.dependencies() {
                let dep_id = dep.plugin_id();
                let to = *nodes.get(dep_id).ok_or_else(|| {
                    EngineError::init_error(
                        "ResolverEngine",
                        id,
                        format!("attribute definition '{id}' depends on unknown plugin '{dep_id}'"),
                    )
                })?;
                let kind = match dep {
                    Dependency::Attribute { .. } => DependencyKind::Attribute,
                    Dependency::DataConnector { .. } => DependencyKind::DataConnector,
                };
                graph.add_edge(from, to, kind);
            }
        }
        Ok(graph)
    }

    /// Proves the dependency graph is a DAG. Implementation note (SPEC_FULL.md
    /// §4.5): `is_cyclic_directed` detects the presence of a cycle; a targeted
    /// DFS then reports the offending id pair, and `toposort` is run as an
    /// advisory/diagnostic cross-check, logged at `debug` — it is not a second
    /// source of truth for the lazy recursive resolution order used at request
    /// time.
    fn check_acyclic(&self) -> Result<(), EngineError> {
        let graph = self.build_dependency_graph()?;
        if is_cyclic_directed(&graph) {
            let (a, b) = Self::find_cycle_pair(&graph).unwrap_or_else(|| {
                ("<unknown>".to_string(), "<unknown>".to_string())
            });
            return Err(EngineError::init_error(
                "ResolverEngine",
                &a,
                format!("cyclic dependency detected between '{a}' and '{b}'"),
            ));
        }
        if let Ok(order) = toposort(&graph, None) {
            debug!(
                order = ?order.iter().map(|i| graph[*i].as_str()).collect::<Vec<_>>(),
                "resolver dependency order (diagnostic)"
            );
        }
        Ok(())
    }

    fn find_cycle_pair(graph: &DiGraph<String, DependencyKind>) -> Option<(String, String)> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut path = Vec::new();
        for node in graph.node_indices() {
            if let Some(pair) = Self::dfs_find_cycle(graph, node, &mut visited, &mut on_stack, &mut path) {
                return Some(pair);
            }
        }
        None
    }

    fn dfs_find_cycle(
        graph: &DiGraph<String, DependencyKind>,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        on_stack: &mut HashSet<NodeIndex>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<(String, String)> {
        if on_stack.contains(&node) {
            let from = *path.last().unwrap_or(&node);
            return Some((graph[from].clone(), graph[node].clone()));
        }
        if visited.contains(&node) {
            return None;
        }
        visited.insert(node);
        on_stack.insert(node);
        path.push(node);
        for neighbor in graph.neighbors(node) {
            if let Some(pair) = Self::dfs_find_cycle(graph, neighbor, visited, on_stack, path) {
                return Some(pair);
            }
        }
        on_stack.remove(&node);
        path.pop();
        None
    }

    /// Per-request algorithm (SPEC_FULL.md §4.5). Populates `ctx.resolved_attributes`.
    #[instrument(skip(self, ctx), fields(issuer = %ctx.issuer_id, recipient = %ctx.recipient_id))]
    pub async fn resolve(&self, ctx: &mut ResolutionContext) -> Result<(), EngineError> {
        self.lifecycle.ensure_invocable("ResolverEngine", "resolver")?;

        ctx.attach_work_context();
        let start = std::time::Instant::now();
        let result = self.resolve_inner(ctx).await;
        if matches!(ctx.profile_request_context, Some(ref prc) if prc.metrics_enabled) {
            record_metric(MetricType::Histogram {
                name: "resolver.resolve.duration_ms",
                value: start.elapsed().as_millis() as f64,
                unit: "ms",
            });
        }
        ctx.detach_work_context();
        result
    }

    async fn resolve_inner(&self, ctx: &mut ResolutionContext) -> Result<(), EngineError> {
        let exporting_connector_ids: Vec<String> = self
            .connectors
            .iter()
            .filter(|(_, c)| c.meta().exports())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &exporting_connector_ids {
            self.resolve_data_connector(id, ctx).await?;
        }

        let ids: Vec<String> = if !ctx.requested_attribute_names.is_empty() {
            ctx.requested_attribute_names.clone()
        } else {
            self.definitions.keys().cloned().collect()
        };
        for id in &ids {
            self.resolve_attribute_definition(id, ctx).await?;
        }

        self.finalize(ctx, &exporting_connector_ids)
    }

    fn resolve_attribute_definition<'a>(
        &'a self,
        id: &'a str,
        ctx: &'a mut ResolutionContext,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            if ctx.work_context().expect("work context attached").has_definition_result(id) {
                return Ok(());
            }
            let Some(def) = self.definitions.get(id) else {
                debug!(id, "requested attribute definition id not found; skipping");
                return Ok(());
            };

            for dep in def.dependencies() {
                match dep {
                    Dependency::Attribute { plugin_id, .. } => {
                        self.resolve_attribute_definition(plugin_id, ctx).await?;
                    }
                    Dependency::DataConnector { plugin_id, .. } => {
                        self.resolve_data_connector(plugin_id, ctx).await?;
                    }
                }
            }

            let attribute = {
                let work = ctx.work_context().expect("work context attached");
                def.resolve(ctx, work)?
            };
            if let Some(attr) = &attribute {
                let op = Operation::DefinitionResolved {
                    id: id.to_string(),
                    value_count: attr.values.len(),
                };
                debug!(id, value_count = attr.values.len(), "attribute definition resolved");
                record_metric(MetricType::Counter {
                    name: "resolver.definition.resolved",
                    value: 1,
                });
                let _ = op.validate();
            }
            ctx.work_context_mut()
                .expect("work context attached")
                .record_definition_result(id, attribute);
            Ok(())
        })
    }

    fn resolve_data_connector<'a>(
        &'a self,
        id: &'a str,
        ctx: &'a mut ResolutionContext,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            if ctx.work_context().expect("work context attached").has_connector_result(id) {
                return Ok(());
            }
            let Some(connector) = self.connectors.get(id) else {
                warn!(id, "requested data connector id not found; skipping");
                ctx.work_context_mut()
                    .expect("work context attached")
                    .record_connector_result(id, HashMap::new());
                return Ok(());
            };

            let outcome = self.invoke_with_failover(connector.as_ref(), ctx).await?;
            let map = match outcome {
                ResolveOutcome::Attributes(m) => m,
                ResolveOutcome::NoResults => HashMap::new(),
            };
            ctx.work_context_mut()
                .expect("work context attached")
                .record_connector_result(id, map);
            Ok(())
        })
    }

    /// Implements the failover/cool-down rules of SPEC_FULL.md §4.3: skip a
    /// cooling-down connector in favor of its failover; on a raised
    /// *ResolutionError*, route to the failover if one is configured, else
    /// propagate.
    fn invoke_with_failover<'a>(
        &'a self,
        connector: &'a dyn DataConnector,
        ctx: &'a mut ResolutionContext,
    ) -> BoxFuture<'a, Result<ResolveOutcome, EngineError>> {
        Box::pin(async move {
            if connector.is_cooling_down() {
                debug!(id = connector.id(), "connector is cooling down after a prior failure");
                let _ = Operation::ConnectorCoolingDown { id: connector.id().to_string() }.validate();
                return self.route_to_failover(connector, ctx, None).await;
            }

            record_metric(MetricType::Counter {
                name: "resolver.connector.invoked",
                value: 1,
            });
            let _ = Operation::ConnectorInvoked { id: connector.id().to_string() }.validate();
            match connector.resolve(ctx).await {
                Ok(ResolveOutcome::NoResults) if connector.meta().no_result_is_error => {
                    let err = EngineError::resolution(
                        connector.id(),
                        "connector returned no results and noResultIsError is set",
                    );
                    self.route_to_failover(connector, ctx, Some(err)).await
                }
                Ok(outcome) => Ok(outcome),
                Err(e) => self.route_to_failover(connector, ctx, Some(e)).await,
            }
        })
    }

    fn route_to_failover<'a>(
        &'a self,
        connector: &'a dyn DataConnector,
        ctx: &'a mut ResolutionContext,
        cause: Option<EngineError>,
    ) -> BoxFuture<'a, Result<ResolveOutcome, EngineError>> {
        Box::pin(async move {
            match connector.failover_connector_id() {
                Some(failover_id) => {
                    let failover = self
                        .connectors
                        .get(failover_id)
                        .expect("failover connector id was validated at initialize()");
                    ctx.work_context_mut()
                        .expect("work context attached")
                        .failovers
                        .push(FailoverRecord {
                            from_connector_id: connector.id().to_string(),
                            to_connector_id: failover_id.to_string(),
                        });
                    record_metric(MetricType::Counter {
                        name: "resolver.connector.failed_over",
                        value: 1,
                    });
                    let _ = Operation::ConnectorFailedOver {
                        from: connector.id().to_string(),
                        to: failover_id.to_string(),
                    }
                    .validate();
                    debug!(from = connector.id(), to = failover_id, "connector failed over");
                    self.invoke_with_failover(failover.as_ref(), ctx).await
                }
                None => match cause {
                    Some(err) => Err(err),
                    None => Err(EngineError::resolution(
                        connector.id(),
                        "connector is cooling down after a prior failure and has no configured failover",
                    )),
                },
            }
        })
    }

    /// Finalization (SPEC_FULL.md §4.5 steps 5-6): null-strip + dedup, drop
    /// dependency-only/empty results, then fold in connector exports without
    /// overwriting an attribute already emitted by a definition.
    fn finalize(&self, ctx: &mut ResolutionContext, exporting_connector_ids: &[String]) -> Result<(), EngineError> {
        let definition_ids: Vec<String> = ctx
            .work_context()
            .expect("work context attached")
            .definition_results()
            .map(|(id, _)| id.clone())
            .collect();

        for id in definition_ids {
            let Some(def) = self.definitions.get(&id) else { continue };
            if def.dependency_only() {
                continue;
            }
            let maybe_attr = ctx
                .work_context()
                .expect("work context attached")
                .definition_result(&id)
                .cloned()
                .flatten();
            let Some(mut attr) = maybe_attr else { continue };
            attr.finalize_values(self.strip_nulls);
            if attr.is_empty() {
                continue;
            }
            ctx.resolved_attributes.insert(attr.id.as_str().to_string(), attr);
        }

        for cid in exporting_connector_ids {
            let connector = &self.connectors[cid];
            let produced = ctx
                .work_context()
                .expect("work context attached")
                .connector_result(cid)
                .cloned()
                .unwrap_or_default();
            let exported_ids: Vec<String> = connector
                .meta()
                .exported_ids(&produced)
                .into_iter()
                .map(str::to_string)
                .collect();
            for exported_id in exported_ids {
                if ctx.resolved_attributes.contains_key(&exported_id) {
                    warn!(
                        exported_id,
                        connector = cid.as_str(),
                        "data connector export skipped: attribute already emitted by a definition"
                    );
                    continue;
                }
                if let Some(mut attr) = produced.get(&exported_id).cloned() {
                    attr.finalize_values(self.strip_nulls);
                    if attr.is_empty() {
                        continue;
                    }
                    ctx.resolved_attributes.insert(exported_id, attr);
                }
            }
        }
        Ok(())
    }
}

/// Collects definitions and connectors and produces a fully-initialized
/// `ResolverEngine` (SPEC_FULL.md §4.9, configuration & builder layer).
#[derive(Default)]
pub struct ResolverEngineBuilder {
    definitions: HashMap<String, DefinitionHandle>,
    connectors: HashMap<String, ConnectorHandle>,
    strip_nulls: bool,
}

impl ResolverEngineBuilder {
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
            connectors: HashMap::new(),
            strip_nulls: true,
        }
    }

    pub fn strip_nulls(mut self, strip_nulls: bool) -> Self {
        self.strip_nulls = strip_nulls;
        self
    }

    pub fn definition(mut self, definition: DefinitionHandle) -> Result<Self, EngineError> {
        let id = definition.id().to_string();
        self.ensure_unique_id(&id)?;
        self.definitions.insert(id, definition);
        Ok(self)
    }

    pub fn connector(mut self, connector: ConnectorHandle) -> Result<Self, EngineError> {
        let id = connector.id().to_string();
        self.ensure_unique_id(&id)?;
        self.connectors.insert(id, connector);
        Ok(self)
    }

    fn ensure_unique_id(&self, id: &str) -> Result<(), EngineError> {
        ValidationContext::new("ResolverEngineBuilder")
            .with_attribute("id", id)
            .require_at_init(
                id,
                !self.definitions.contains_key(id) && !self.connectors.contains_key(id),
                "duplicate plugin id across attribute definitions and data connectors",
            )
    }

    pub fn build(self) -> Result<ResolverEngine, EngineError> {
        let engine = ResolverEngine {
            lifecycle: Lifecycle::new(),
            definitions: self.definitions,
            connectors: self.connectors,
            strip_nulls: self.strip_nulls,
        };
        engine.initialize()?;
        Ok(engine)
    }
}

pub type ResolverHandle = Arc<ResolverEngine>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::StaticConnectorBuilder;
    use crate::definitions::{ScopedDefinitionBuilder, SimpleDefinitionBuilder};
    use crate::model::{Attribute, AttributeValue, Dependency};
    use crate::types::{AttributeId, Scope};

    fn static_connector_with(id: &str, attr_id: &str, value: &str) -> ConnectorHandle {
        Arc::new(
            StaticConnectorBuilder::new(id)
                .attribute(
                    attr_id,
                    Attribute::with_values(
                        AttributeId::new(attr_id).unwrap(),
                        vec![AttributeValue::String(value.into())],
                    ),
                )
                .export_all_attributes(true)
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn resolves_a_simple_definition_depending_on_a_connector_export() {
        let connector = static_connector_with("conn1", "uid", "jdoe");
        let simple = Arc::new(
            SimpleDefinitionBuilder::new("uid", AttributeId::new("uid").unwrap())
                .depends_on(Dependency::DataConnector {
                    plugin_id: "conn1".into(),
                    exported_attribute_ids: vec!["uid".into()],
                })
                .build()
                .unwrap(),
        );

        let resolver = ResolverEngineBuilder::new()
            .connector(connector)
            .unwrap()
            .definition(simple)
            .unwrap()
            .build()
            .unwrap();

        let mut ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
        resolver.resolve(&mut ctx).await.unwrap();
        assert_eq!(
            ctx.resolved_attributes["uid"].values,
            vec![AttributeValue::String("jdoe".into())]
        );
    }

    #[tokio::test]
    async fn dependency_only_definition_is_suppressed_but_feeds_downstream() {
        let connector = static_connector_with("conn1", "raw", "alice");
        let raw = Arc::new(
            SimpleDefinitionBuilder::new("raw", AttributeId::new("raw").unwrap())
                .dependency_only(true)
                .depends_on(Dependency::DataConnector {
                    plugin_id: "conn1".into(),
                    exported_attribute_ids: vec!["raw".into()],
                })
                .build()
                .unwrap(),
        );
        let scoped = Arc::new(
            ScopedDefinitionBuilder::new("scopedUid", AttributeId::new("scopedUid").unwrap())
                .scope("example.org")
                .unwrap()
                .depends_on(Dependency::Attribute {
                    plugin_id: "raw".into(),
                    source_attribute_id: None,
                })
                .build()
                .unwrap(),
        );

        let resolver = ResolverEngineBuilder::new()
            .connector(connector)
            .unwrap()
            .definition(raw)
            .unwrap()
            .definition(scoped)
            .unwrap()
            .build()
            .unwrap();

        let mut ctx = ResolutionContext::new("alice", "issuer", "recipient");
        resolver.resolve(&mut ctx).await.unwrap();
        assert!(!ctx.resolved_attributes.contains_key("raw"));
        assert_eq!(
            ctx.resolved_attributes["scopedUid"].values,
            vec![AttributeValue::scoped("alice", &Scope::new("example.org").unwrap())]
        );
    }

    #[tokio::test]
    async fn cyclic_definitions_fail_initialize_naming_both_ids() {
        let a = Arc::new(
            SimpleDefinitionBuilder::new("a", AttributeId::new("a").unwrap())
                .depends_on(Dependency::Attribute {
                    plugin_id: "b".into(),
                    source_attribute_id: None,
                })
                .build()
                .unwrap(),
        );
        let b = Arc::new(
            SimpleDefinitionBuilder::new("b", AttributeId::new("b").unwrap())
                .depends_on(Dependency::Attribute {
                    plugin_id: "a".into(),
                    source_attribute_id: None,
                })
                .build()
                .unwrap(),
        );

        let err = ResolverEngineBuilder::new()
            .definition(a)
            .unwrap()
            .definition(b)
            .unwrap()
            .build()
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains('a') && message.contains('b'));
        assert!(matches!(err, EngineError::ComponentInitialization { .. }));
    }

    #[tokio::test]
    async fn unknown_dependency_id_fails_initialize() {
        let a = Arc::new(
            SimpleDefinitionBuilder::new("a", AttributeId::new("a").unwrap())
                .depends_on(Dependency::Attribute {
                    plugin_id: "missing".into(),
                    source_attribute_id: None,
                })
                .build()
                .unwrap(),
        );
        let err = ResolverEngineBuilder::new().definition(a).unwrap().build().unwrap_err();
        assert!(matches!(err, EngineError::ComponentInitialization { .. }));
    }

    #[tokio::test]
    async fn connector_failover_is_invoked_directly_during_cool_down_and_recorded() {
        use std::time::Duration;

        let primary = Arc::new(
            StaticConnectorBuilder::new("primary")
                .no_retry_delay(Duration::from_secs(300))
                .failover_connector_id("backup")
                .export_all_attributes(true)
                .build()
                .unwrap(),
        );
        primary.health().record_failure();
        let backup = static_connector_with("backup", "uid", "failover-value");

        let resolver = ResolverEngineBuilder::new()
            .connector(primary)
            .unwrap()
            .connector(backup)
            .unwrap()
            .build()
            .unwrap();

        let mut ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
        resolver.resolve(&mut ctx).await.unwrap();
        assert_eq!(
            ctx.resolved_attributes["uid"].values,
            vec![AttributeValue::String("failover-value".into())]
        );
    }
}
