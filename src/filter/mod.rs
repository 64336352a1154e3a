// Attribute Filter
//
// A boolean combinator tree of matchers and policy-requirement rules, applied
// with deny-overrides semantics at the value level (SPEC_FULL.md §4.7). A
// `FilterPolicy` gates a set of `AttributeRule`s behind a `requirementRule`;
// the `FilterEngine` evaluates every applicable policy per request and merges
// the resulting permit/deny sets per attribute.

mod matcher;
mod policy_rule;

pub use matcher::{
    AndMatcher, AttributeScopeMatchesShibMdScope, AttributeValueMatchesShibMdScope, Matcher,
    MatcherHandle, MatchesAll, MatchesNone, NotMatcher, OrMatcher, RegexMatcher, ScriptedMatcher,
    StringMatcher,
};
pub use policy_rule::{
    AlwaysFailRule, AlwaysFalseRule, AlwaysTrueRule, AndRule, NotRule, OrRule,
    PolicyRequirementRule, PolicyRuleHandle,
};

use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{debug, instrument, warn};

use crate::error::EngineError;
use crate::lifecycle::Lifecycle;
use crate::model::{Attribute, AttributeValue, FilterContext, Tristate};
use crate::observability::{record_metric, MetricType, Operation};
use crate::validation::ValidationContext;

/// What an attribute rule's permit/deny matchers apply to: a literal attribute
/// id, or every attribute in the request ("any attribute" wildcard).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributePattern {
    Literal(String),
    Any,
}

impl AttributePattern {
    pub fn matches(&self, attribute_id: &str) -> bool {
        match self {
            AttributePattern::Literal(id) => id == attribute_id,
            AttributePattern::Any => true,
        }
    }
}

/// How the engine reacts to a matcher returning `Err` (the base spec's `Fail`
/// outcome) while evaluating an `AttributeRule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherFailureMode {
    /// Safe default: the failing rule contributes nothing for that attribute.
    DenyAll,
    /// Surface a `FilterError` and abort the whole request.
    Abort,
}

/// One permit/deny matcher pair scoped to an attribute pattern.
pub struct AttributeRule {
    pub attribute_pattern: AttributePattern,
    pub permit_matcher: Option<MatcherHandle>,
    pub deny_matcher: Option<MatcherHandle>,
}

impl AttributeRule {
    pub fn new(attribute_pattern: AttributePattern) -> Self {
        Self {
            attribute_pattern,
            permit_matcher: None,
            deny_matcher: None,
        }
    }

    pub fn permit(mut self, matcher: MatcherHandle) -> Self {
        self.permit_matcher = Some(matcher);
        self
    }

    pub fn deny(mut self, matcher: MatcherHandle) -> Self {
        self.deny_matcher = Some(matcher);
        self
    }

    /// `permitSet \ denySet` for one attribute (SPEC_FULL.md §4.7 step 1). A
    /// missing permit matcher defaults to "matches everything".
    fn permitted_values(
        &self,
        attribute: &Attribute,
        ctx: &FilterContext,
        on_fail: MatcherFailureMode,
    ) -> Result<IndexSet<AttributeValue>, EngineError> {
        let permit = match &self.permit_matcher {
            Some(m) => match m.get_matching_values(attribute, ctx) {
                Ok(set) => set,
                Err(e) => return Self::handle_failure(attribute, on_fail, e),
            },
            None => attribute.values.iter().cloned().collect(),
        };
        let deny = match &self.deny_matcher {
            Some(m) => match m.get_matching_values(attribute, ctx) {
                Ok(set) => set,
                Err(e) => return Self::handle_failure(attribute, on_fail, e),
            },
            None => IndexSet::new(),
        };
        let mut permitted = permit;
        permitted.retain(|v| !deny.contains(v));
        Ok(permitted)
    }

    fn handle_failure(
        attribute: &Attribute,
        on_fail: MatcherFailureMode,
        err: EngineError,
    ) -> Result<IndexSet<AttributeValue>, EngineError> {
        match on_fail {
            MatcherFailureMode::DenyAll => {
                warn!(
                    attribute_id = attribute.id.as_str(),
                    error = %err,
                    "matcher failed; denying all values for this rule"
                );
                Ok(IndexSet::new())
            }
            MatcherFailureMode::Abort => Err(EngineError::filter(attribute.id.as_str(), err.to_string())),
        }
    }
}

/// A requirement-gated set of attribute rules — the base spec's "release
/// policy": applies only to requests where `requirement_rule` evaluates `TRUE`.
pub struct FilterPolicy {
    pub id: String,
    pub requirement_rule: PolicyRuleHandle,
    pub attribute_rules: Vec<AttributeRule>,
}

impl FilterPolicy {
    pub fn new(id: impl Into<String>, requirement_rule: PolicyRuleHandle) -> Self {
        Self {
            id: id.into(),
            requirement_rule,
            attribute_rules: Vec::new(),
        }
    }

    pub fn attribute_rule(mut self, rule: AttributeRule) -> Self {
        self.attribute_rules.push(rule);
        self
    }
}

/// The boolean combinator tree of matchers and policy-requirement rules,
/// applied per request with deny-overrides semantics (SPEC_FULL.md §4.7).
pub struct FilterEngine {
    lifecycle: Lifecycle,
    policies: Vec<FilterPolicy>,
    on_matcher_fail: MatcherFailureMode,
}

impl FilterEngine {
    pub fn initialize(&self) -> Result<(), EngineError> {
        self.lifecycle.mark_initialized("FilterEngine", "filter")?;
        for policy in &self.policies {
            policy.requirement_rule.initialize()?;
            for rule in &policy.attribute_rules {
                if let Some(m) = &rule.permit_matcher {
                    m.initialize()?;
                }
                if let Some(m) = &rule.deny_matcher {
                    m.initialize()?;
                }
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        self.lifecycle.ensure_invocable("FilterEngine", "filter")?;
        for policy in &self.policies {
            policy.requirement_rule.validate()?;
            for rule in &policy.attribute_rules {
                if let Some(m) = &rule.permit_matcher {
                    m.validate()?;
                }
                if let Some(m) = &rule.deny_matcher {
                    m.validate()?;
                }
            }
        }
        Ok(())
    }

    pub fn destroy(&self) {
        for policy in &self.policies {
            policy.requirement_rule.destroy();
            for rule in &policy.attribute_rules {
                if let Some(m) = &rule.permit_matcher {
                    m.destroy();
                }
                if let Some(m) = &rule.deny_matcher {
                    m.destroy();
                }
            }
        }
        self.lifecycle.mark_destroyed();
    }

    /// Per-request algorithm (SPEC_FULL.md §4.7 steps 1-4). Mutates
    /// `ctx.postfiltered_attributes` in place.
    #[instrument(skip(self, ctx), fields(issuer = %ctx.issuer_id, recipient = %ctx.recipient_id))]
    pub fn apply(&self, ctx: &mut FilterContext) -> Result<(), EngineError> {
        self.lifecycle.ensure_invocable("FilterEngine", "filter")?;
        let start = std::time::Instant::now();

        let attribute_ids: Vec<String> = ctx.prefiltered_attributes.keys().cloned().collect();
        let mut kept: std::collections::HashMap<String, Attribute> = std::collections::HashMap::new();

        for attribute_id in &attribute_ids {
            let attribute = &ctx.prefiltered_attributes[attribute_id];
            let mut union_permit: IndexSet<AttributeValue> = IndexSet::new();
            let mut union_deny: IndexSet<AttributeValue> = IndexSet::new();
            let mut any_policy_applied = false;

            for policy in &self.policies {
                let requirement = policy.requirement_rule.matches(ctx);
                let applies = match requirement {
                    Tristate::True => true,
                    Tristate::False => false,
                    Tristate::Fail => {
                        warn!(policy = policy.id.as_str(), "requirement rule failed; policy does not apply");
                        false
                    }
                };
                let outcome = match requirement {
                    Tristate::True => "applied",
                    Tristate::False => "skipped",
                    Tristate::Fail => "failed",
                };
                let _ = Operation::FilterPolicyApplied {
                    id: policy.id.clone(),
                    outcome: outcome.to_string(),
                }
                .validate();
                if !applies {
                    continue;
                }

                for rule in &policy.attribute_rules {
                    if !rule.attribute_pattern.matches(attribute_id) {
                        continue;
                    }
                    any_policy_applied = true;
                    let permitted = rule.permitted_values(attribute, ctx, self.on_matcher_fail)?;
                    union_permit.extend(permitted);
                    if let Some(deny) = &rule.deny_matcher {
                        union_deny.extend(deny.get_matching_values(attribute, ctx).unwrap_or_default());
                    }
                }
            }

            if !any_policy_applied {
                continue;
            }

            union_permit.retain(|v| !union_deny.contains(v));
            let denied_count = attribute.values.len().saturating_sub(union_permit.len());
            if denied_count > 0 {
                let _ = Operation::AttributeValuesDenied {
                    attribute_id: attribute_id.clone(),
                    denied_count,
                }
                .validate();
            }

            if union_permit.is_empty() {
                debug!(attribute_id, "all values denied; attribute dropped");
                continue;
            }

            let ordered: Vec<AttributeValue> = attribute
                .values
                .iter()
                .filter(|v| union_permit.contains(*v))
                .cloned()
                .collect();
            let mut released = attribute.clone();
            released.values = ordered;
            kept.insert(attribute_id.clone(), released);
        }

        record_metric(MetricType::Histogram {
            name: "filter.apply.duration_ms",
            value: start.elapsed().as_millis() as f64,
            unit: "ms",
        });
        ctx.postfiltered_attributes = kept;
        Ok(())
    }
}

/// Collects filter policies and produces a fully-initialized `FilterEngine`
/// (SPEC_FULL.md §4.9). Cyclic matcher/rule composition cannot occur structurally
/// in this implementation: children are owned via `Arc<dyn Matcher>`/`Arc<dyn
/// PolicyRequirementRule>`, so building a cycle would require a node to hold a
/// reference to itself before it exists, which the builder API has no way to
/// express — the base spec's initialization-time acyclicity check is therefore
/// satisfied by construction rather than by a runtime graph walk.
pub struct FilterEngineBuilder {
    policies: Vec<FilterPolicy>,
    on_matcher_fail: MatcherFailureMode,
}

impl Default for FilterEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterEngineBuilder {
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
            on_matcher_fail: MatcherFailureMode::DenyAll,
        }
    }

    pub fn on_matcher_fail(mut self, mode: MatcherFailureMode) -> Self {
        self.on_matcher_fail = mode;
        self
    }

    pub fn policy(mut self, policy: FilterPolicy) -> Result<Self, EngineError> {
        ValidationContext::new("FilterEngineBuilder")
            .with_attribute("id", &policy.id)
            .require(!policy.id.trim().is_empty(), "filter policy id must not be empty")?;
        self.policies.push(policy);
        Ok(self)
    }

    pub fn build(self) -> Result<FilterEngine, EngineError> {
        let engine = FilterEngine {
            lifecycle: Lifecycle::new(),
            policies: self.policies,
            on_matcher_fail: self.on_matcher_fail,
        };
        engine.initialize()?;
        Ok(engine)
    }
}

pub type FilterHandle = Arc<FilterEngine>;
