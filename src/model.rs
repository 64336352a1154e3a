// Attribute Model
//
// Typed attribute values, the named `Attribute` container, and the per-request
// contexts threaded through resolution and filtering. Value containers preserve
// insertion order end to end; `finalize_values` is the single place that applies
// null-stripping and de-duplication (see resolver.rs, §4.2/§4.5 of SPEC_FULL.md).

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::types::{AttributeId, Scope};

/// A single attribute value. `EmptyNull` and `EmptyZeroLength` are distinct
/// sentinels from `String(String::new())` — see the boundary behaviors in
/// SPEC_FULL.md §8.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeValue {
    String(String),
    ScopedString { value: String, scope: String },
    Bytes(Vec<u8>),
    XmlObject(String),
    EmptyNull,
    EmptyZeroLength,
}

impl AttributeValue {
    pub fn scoped(value: impl Into<String>, scope: &Scope) -> Self {
        AttributeValue::ScopedString {
            value: value.into(),
            scope: scope.as_str().to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            AttributeValue::ScopedString { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn scope(&self) -> Option<&str> {
        match self {
            AttributeValue::ScopedString { scope, .. } => Some(scope),
            _ => None,
        }
    }

    pub fn is_empty_sentinel(&self) -> bool {
        matches!(
            self,
            AttributeValue::EmptyNull | AttributeValue::EmptyZeroLength
        )
    }
}

/// A resolved, named attribute. `values` is insertion-ordered and, after
/// `finalize_values`, free of structural duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub values: Vec<AttributeValue>,
    pub display_names: HashMap<String, String>,
    pub display_descriptions: HashMap<String, String>,
}

impl Attribute {
    pub fn new(id: AttributeId) -> Self {
        Self {
            id,
            values: Vec::new(),
            display_names: HashMap::new(),
            display_descriptions: HashMap::new(),
        }
    }

    pub fn with_values(id: AttributeId, values: Vec<AttributeValue>) -> Self {
        Self {
            id,
            values,
            display_names: HashMap::new(),
            display_descriptions: HashMap::new(),
        }
    }

    /// Apply null-stripping (if requested) and order-preserving de-duplication.
    /// This is the single finalization step mandated by SPEC_FULL.md §4.5 step 5
    /// and the `Deduplication` invariant of §8.
    pub fn finalize_values(&mut self, strip_nulls: bool) {
        let mut seen = IndexSet::new();
        for value in self.values.drain(..).collect::<Vec<_>>() {
            if strip_nulls && value.is_empty_sentinel() {
                continue;
            }
            seen.insert(value);
        }
        self.values = seen.into_iter().collect();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Either edge kind in the resolution dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dependency {
    Attribute {
        plugin_id: String,
        source_attribute_id: Option<String>,
    },
    DataConnector {
        plugin_id: String,
        exported_attribute_ids: Vec<String>,
    },
}

impl Dependency {
    pub fn plugin_id(&self) -> &str {
        match self {
            Dependency::Attribute { plugin_id, .. } => plugin_id,
            Dependency::DataConnector { plugin_id, .. } => plugin_id,
        }
    }
}

/// `{fromConnectorId, toConnectorId}`, appended to `WorkContext` whenever a
/// primary connector's failure routes resolution to its failover connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverRecord {
    pub from_connector_id: String,
    pub to_connector_id: String,
}

/// Scratch space attached to a `ResolutionContext` for the duration of one
/// `resolve` call. Everything here is discarded once resolution returns.
#[derive(Debug, Default)]
pub struct WorkContext {
    definition_results: HashMap<String, Option<Attribute>>,
    connector_results: HashMap<String, HashMap<String, Attribute>>,
    pub failovers: Vec<FailoverRecord>,
}

impl WorkContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_definition_result(&self, id: &str) -> bool {
        self.definition_results.contains_key(id)
    }

    pub fn record_definition_result(&mut self, id: impl Into<String>, attribute: Option<Attribute>) {
        self.definition_results.insert(id.into(), attribute);
    }

    pub fn definition_result(&self, id: &str) -> Option<&Option<Attribute>> {
        self.definition_results.get(id)
    }

    pub fn definition_results(&self) -> impl Iterator<Item = (&String, &Option<Attribute>)> {
        self.definition_results.iter()
    }

    pub fn has_connector_result(&self, id: &str) -> bool {
        self.connector_results.contains_key(id)
    }

    pub fn record_connector_result(
        &mut self,
        id: impl Into<String>,
        attributes: HashMap<String, Attribute>,
    ) {
        self.connector_results.insert(id.into(), attributes);
    }

    pub fn connector_result(&self, id: &str) -> Option<&HashMap<String, Attribute>> {
        self.connector_results.get(id)
    }

    /// Merge a dependency's contributed values (attribute-definition output or a
    /// data-connector export) into a flat pool, used by definitions that consume
    /// multiple dependencies (Simple, Scoped, RegexSplit, Mapped).
    pub fn dependency_values(&self, dep: &Dependency) -> Vec<AttributeValue> {
        match dep {
            Dependency::Attribute {
                plugin_id,
                source_attribute_id,
            } => {
                let _ = source_attribute_id;
                self.definition_results
                    .get(plugin_id)
                    .and_then(|o| o.as_ref())
                    .map(|a| a.values.clone())
                    .unwrap_or_default()
            }
            Dependency::DataConnector {
                plugin_id,
                exported_attribute_ids,
            } => {
                let mut out = Vec::new();
                if let Some(attrs) = self.connector_results.get(plugin_id) {
                    for attr_id in exported_attribute_ids {
                        if let Some(attr) = attrs.get(attr_id) {
                            out.extend(attr.values.clone());
                        }
                    }
                }
                out
            }
        }
    }
}

/// Subject-attached principal, modeled minimally: a named kind plus an opaque
/// attribute bag the `Subject` connector reads from. `SubjectContext` stands in
/// for the base spec's principal collection attached via an authentication
/// subsystem the embedder owns.
#[derive(Debug, Clone)]
pub struct Principal {
    pub kind: String,
    pub attributes: HashMap<String, Vec<AttributeValue>>,
}

#[derive(Debug, Clone, Default)]
pub struct SubjectContext {
    pub principals: Vec<Principal>,
}

impl SubjectContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principals.push(principal);
        self
    }

    pub fn attribute_values(&self, name: &str) -> Vec<AttributeValue> {
        let mut out = Vec::new();
        for principal in &self.principals {
            if let Some(values) = principal.attributes.get(name) {
                out.extend(values.clone());
            }
        }
        out
    }
}

/// Optional parent context carrying a timer/metric hook, analogous to the base
/// spec's `ProfileRequestContext`. Left empty by default; an embedder attaches
/// one to get resolve/filter duration metrics (see observability.rs).
#[derive(Debug, Default)]
pub struct ProfileRequestContext {
    pub metrics_enabled: bool,
}

/// The request-scoped environment passed to `ResolverEngine::resolve`.
#[derive(Debug)]
pub struct ResolutionContext {
    pub principal: String,
    pub issuer_id: String,
    pub recipient_id: String,
    pub requested_attribute_names: Vec<String>,
    pub subject_context: SubjectContext,
    pub profile_request_context: Option<ProfileRequestContext>,
    pub resolved_attributes: HashMap<String, Attribute>,
    work_context: Option<WorkContext>,
}

impl ResolutionContext {
    pub fn new(principal: impl Into<String>, issuer_id: impl Into<String>, recipient_id: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            issuer_id: issuer_id.into(),
            recipient_id: recipient_id.into(),
            requested_attribute_names: Vec::new(),
            subject_context: SubjectContext::new(),
            profile_request_context: None,
            resolved_attributes: HashMap::new(),
            work_context: None,
        }
    }

    pub fn with_requested_attributes(mut self, names: Vec<String>) -> Self {
        self.requested_attribute_names = names;
        self
    }

    pub fn with_subject_context(mut self, ctx: SubjectContext) -> Self {
        self.subject_context = ctx;
        self
    }

    pub fn with_profile_request_context(mut self, ctx: ProfileRequestContext) -> Self {
        self.profile_request_context = Some(ctx);
        self
    }

    /// Attach a fresh `WorkContext`. Called at resolver entry (§4.5 step 1).
    pub fn attach_work_context(&mut self) {
        self.work_context = Some(WorkContext::new());
    }

    /// Detach and discard the `WorkContext`. Called at resolver exit, always,
    /// including on the error path (§4.5 step 7).
    pub fn detach_work_context(&mut self) -> Option<WorkContext> {
        self.work_context.take()
    }

    pub fn work_context(&self) -> Option<&WorkContext> {
        self.work_context.as_ref()
    }

    pub fn work_context_mut(&mut self) -> Option<&mut WorkContext> {
        self.work_context.as_mut()
    }
}

/// Three-valued outcome of a `PolicyRequirementRule`, distinguishing "the rule
/// evaluated to false" from "the rule itself errored" (SPEC_FULL.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tristate {
    True,
    False,
    Fail,
}

impl Tristate {
    pub fn not(self) -> Tristate {
        match self {
            Tristate::True => Tristate::False,
            Tristate::False => Tristate::True,
            Tristate::Fail => Tristate::Fail,
        }
    }
}

/// Minimal stand-in for the base spec's SAML metadata object model: a source of
/// `shibmd:Scope` values for a given issuer/recipient entity id.
pub trait ScopesProvider: Send + Sync {
    fn scopes_for_entity(&self, entity_id: &str) -> Vec<String>;
}

#[derive(Debug, Default)]
pub struct NoScopesProvider;

impl ScopesProvider for NoScopesProvider {
    fn scopes_for_entity(&self, _entity_id: &str) -> Vec<String> {
        Vec::new()
    }
}

/// The request-scoped environment passed to `FilterEngine::filter`.
pub struct FilterContext {
    pub issuer_id: String,
    pub recipient_id: String,
    pub prefiltered_attributes: HashMap<String, Attribute>,
    pub postfiltered_attributes: HashMap<String, Attribute>,
    pub scopes_provider: std::sync::Arc<dyn ScopesProvider>,
}

impl FilterContext {
    pub fn new(
        issuer_id: impl Into<String>,
        recipient_id: impl Into<String>,
        attributes: HashMap<String, Attribute>,
    ) -> Self {
        Self {
            issuer_id: issuer_id.into(),
            recipient_id: recipient_id.into(),
            postfiltered_attributes: attributes.clone(),
            prefiltered_attributes: attributes,
            scopes_provider: std::sync::Arc::new(NoScopesProvider),
        }
    }

    pub fn with_scopes_provider(mut self, provider: std::sync::Arc<dyn ScopesProvider>) -> Self {
        self.scopes_provider = provider;
        self
    }
}

/// Epoch-millis timestamp pair tracking a connector's last success/failure,
/// stored as `AtomicI64` so reads/writes never block concurrent resolutions
/// (SPEC_FULL.md §5, "Connector lastSuccess/lastFail").
#[derive(Debug, Default)]
pub struct ConnectorHealth {
    last_success_millis: AtomicI64,
    last_fail_millis: AtomicI64,
}

const UNSET: i64 = 0;

impl ConnectorHealth {
    pub fn new() -> Self {
        Self {
            last_success_millis: AtomicI64::new(UNSET),
            last_fail_millis: AtomicI64::new(UNSET),
        }
    }

    pub fn record_success(&self) {
        self.last_success_millis.store(now_millis(), Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.last_fail_millis.store(now_millis(), Ordering::Relaxed);
    }

    pub fn last_fail_millis(&self) -> Option<i64> {
        match self.last_fail_millis.load(Ordering::Relaxed) {
            UNSET => None,
            v => Some(v),
        }
    }

    pub fn last_success_millis(&self) -> Option<i64> {
        match self.last_success_millis.load(Ordering::Relaxed) {
            UNSET => None,
            v => Some(v),
        }
    }

    /// Whether the connector is within its cool-down window and should be
    /// skipped in favor of its failover connector (§4.3).
    pub fn is_cooling_down(&self, no_retry_delay: Duration) -> bool {
        match self.last_fail_millis() {
            Some(last_fail) => {
                let resume_at = last_fail.saturating_add(no_retry_delay.as_millis() as i64);
                now_millis() < resume_at
            }
            None => false,
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sentinels_are_distinct_from_each_other_and_from_empty_string() {
        assert_ne!(AttributeValue::EmptyNull, AttributeValue::EmptyZeroLength);
        assert_ne!(
            AttributeValue::EmptyNull,
            AttributeValue::String(String::new())
        );
        assert_ne!(
            AttributeValue::EmptyZeroLength,
            AttributeValue::String(String::new())
        );
    }

    #[test]
    fn finalize_values_dedups_preserving_first_occurrence_order() {
        let mut attr = Attribute::with_values(
            AttributeId::new("eduPersonAffiliation").unwrap(),
            vec![
                AttributeValue::String("member".into()),
                AttributeValue::String("staff".into()),
                AttributeValue::String("member".into()),
            ],
        );
        attr.finalize_values(false);
        assert_eq!(
            attr.values,
            vec![
                AttributeValue::String("member".into()),
                AttributeValue::String("staff".into()),
            ]
        );
    }

    #[test]
    fn finalize_values_strips_nulls_when_requested() {
        let mut attr = Attribute::with_values(
            AttributeId::new("x").unwrap(),
            vec![
                AttributeValue::String("x".into()),
                AttributeValue::EmptyNull,
                AttributeValue::String("x".into()),
            ],
        );
        attr.finalize_values(true);
        assert_eq!(attr.values, vec![AttributeValue::String("x".into())]);
    }

    #[test]
    fn connector_health_cools_down_until_delay_elapses() {
        let health = ConnectorHealth::new();
        assert!(!health.is_cooling_down(Duration::from_secs(5)));
        health.record_failure();
        assert!(health.is_cooling_down(Duration::from_secs(300)));
    }
}
