// Default wiring (SPEC_FULL.md §4.9 "Configuration & builder layer"). Callers
// who don't need bespoke `ResolverEngineBuilder`/`FilterEngineBuilder` wiring
// can hand a flat list of already-constructed nodes to these functions and get
// back a fully-initialized engine with the crate's default policy: strip
// `EmptyNull`/`EmptyZeroLength` values during resolution, and deny-all (rather
// than abort) when a matcher fails during filtering.

use crate::connectors::ConnectorHandle;
use crate::definitions::DefinitionHandle;
use crate::error::EngineError;
use crate::filter::{FilterEngine, FilterEngineBuilder, FilterPolicy, MatcherFailureMode};
use crate::resolver::{ResolverEngine, ResolverEngineBuilder};

/// Builds a `ResolverEngine` from a flat set of definitions and connectors,
/// stripping `EmptyNull`/`EmptyZeroLength` values by default.
pub fn build_default_resolver(
    definitions: Vec<DefinitionHandle>,
    connectors: Vec<ConnectorHandle>,
) -> Result<ResolverEngine, EngineError> {
    let mut builder = ResolverEngineBuilder::new().strip_nulls(true);
    for def in definitions {
        builder = builder.definition(def)?;
    }
    for conn in connectors {
        builder = builder.connector(conn)?;
    }
    builder.build()
}

/// Builds a `FilterEngine` from a flat set of policies, defaulting failed
/// matchers to deny-all rather than aborting the request.
pub fn build_default_filter(policies: Vec<FilterPolicy>) -> Result<FilterEngine, EngineError> {
    let mut builder = FilterEngineBuilder::new().on_matcher_fail(MatcherFailureMode::DenyAll);
    for policy in policies {
        builder = builder.policy(policy)?;
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::StaticConnectorBuilder;
    use crate::definitions::SimpleDefinitionBuilder;
    use crate::filter::{AlwaysTrueRule, AttributePattern, AttributeRule, MatchesAll};
    use crate::model::{Attribute, AttributeValue, Dependency};
    use crate::types::AttributeId;
    use std::sync::Arc;

    #[test]
    fn default_resolver_wires_a_connector_and_a_definition() {
        let connector = Arc::new(
            StaticConnectorBuilder::new("conn1")
                .attribute(
                    "uid",
                    Attribute::with_values(AttributeId::new("uid").unwrap(), vec![AttributeValue::String("jdoe".into())]),
                )
                .export_all_attributes(true)
                .build()
                .unwrap(),
        );
        let simple = Arc::new(
            SimpleDefinitionBuilder::new("uid", AttributeId::new("uid").unwrap())
                .depends_on(Dependency::DataConnector {
                    plugin_id: "conn1".into(),
                    exported_attribute_ids: vec!["uid".into()],
                })
                .build()
                .unwrap(),
        );

        let resolver = build_default_resolver(vec![simple], vec![connector]).unwrap();
        resolver.validate().unwrap();
    }

    #[test]
    fn default_filter_wires_a_policy() {
        let policy = FilterPolicy::new("p", Arc::new(AlwaysTrueRule::default()))
            .attribute_rule(AttributeRule::new(AttributePattern::Any).permit(Arc::new(MatchesAll::default())));
        let filter = build_default_filter(vec![policy]).unwrap();
        filter.validate().unwrap();
    }
}
