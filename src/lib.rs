// IdP Attribute Engine
// Root library module
//
// Two tightly coupled cores: a dependency-graph `ResolverEngine` that
// realizes attribute definitions and data connectors into a per-request
// attribute set, and a policy-tree `FilterEngine` that applies deny-overrides
// release rules to that set. Both are meant to be wrapped in a
// `ReloadableService` for hot-swap deployment.

pub mod connectors;
pub mod definitions;
pub mod error;
pub mod factory;
pub mod filter;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod reload;
pub mod resolver;
pub mod scripting;
pub mod types;
pub mod validation;

// Re-export the error taxonomy and result alias.
pub use error::{EngineError, EngineResult};

// Re-export the lifecycle state machine.
pub use lifecycle::{Identified, Lifecycle, LifecycleState};

// Re-export the data model.
pub use model::{
    Attribute, AttributeValue, ConnectorHealth, Dependency, FailoverRecord, FilterContext,
    NoScopesProvider, Principal, ProfileRequestContext, ResolutionContext, ScopesProvider,
    SubjectContext, Tristate, WorkContext,
};

// Re-export validated newtypes.
pub use types::{AttributeId, Delimiter, PluginId, Scope};

// Re-export the validation helper.
pub use validation::ValidationContext;

// Re-export observability infrastructure.
pub use observability::{
    get_metrics, init_logging, init_logging_with_level, log_error_with_context, log_operation,
    record_metric, with_trace_id, MetricType, Operation, OperationContext, PerfTimer,
};

// Re-export scripting seam.
pub use scripting::{Bindings, NoScriptEvaluator, ScriptEvaluator, ScriptValue};

// Re-export data connectors.
pub use connectors::{
    CacheFingerprint, ConnectionFactory, ConnectorHandle, ConnectorMeta, DashMapResultCache,
    DataConnector, ExecutableSearchBuilder, HttpConnector, HttpConnectorBuilder, LdapConnection,
    LdapConnector, LdapConnectorBuilder, LdapSearch, MappingStrategy, ResolveOutcome, ResultCache,
    ScriptedConnector, ScriptedConnectorBuilder, SqlConnectionFactory, SqlConnector,
    SqlConnectorBuilder, SqlMappingStrategy, SqlRow, SqlStatement, StatementBuilder,
    StaticConnector, StaticConnectorBuilder, SubjectConnector, SubjectConnectorBuilder,
};

// Re-export attribute definitions.
pub use definitions::{
    AttributeDefinition, DateTimeDefinition, DateTimeDefinitionBuilder, DefinitionHandle,
    DefinitionMeta, EpochUnit, MappedDefinition, MappedDefinitionBuilder, PrescopedDefinition,
    PrescopedDefinitionBuilder, RegexSplitDefinition, RegexSplitDefinitionBuilder,
    ScopedDefinition, ScopedDefinitionBuilder, ScriptedDefinition, ScriptedDefinitionBuilder,
    SimpleDefinition, SimpleDefinitionBuilder, TemplateDefinition, TemplateDefinitionBuilder,
    ValueMapping,
};

// Re-export the resolver engine.
pub use resolver::{ResolverEngine, ResolverEngineBuilder, ResolverHandle};

// Re-export the filter engine.
pub use filter::{
    AlwaysFailRule, AlwaysFalseRule, AlwaysTrueRule, AndMatcher, AndRule, AttributePattern,
    AttributeRule, AttributeScopeMatchesShibMdScope, AttributeValueMatchesShibMdScope,
    FilterEngine, FilterEngineBuilder, FilterHandle, FilterPolicy, Matcher, MatcherFailureMode,
    MatcherHandle, MatchesAll, MatchesNone, NotMatcher, NotRule, OrMatcher, OrRule,
    PolicyRequirementRule, PolicyRuleHandle, RegexMatcher, ScriptedMatcher, StringMatcher,
};

// Re-export the reloadable service wrapper.
pub use reload::{Component, Handle, Managed, ReloadableService};

// Re-export the default wiring factory functions.
pub use factory::{build_default_filter, build_default_resolver};
