// Matchers: value-level predicates returning the subset of an attribute's
// values a rule permits or denies (SPEC_FULL.md §4.7). Leaf matchers apply a
// predicate per value; `And`/`Or`/`Not` compose child matchers; `MatchesAll`/
// `MatchesNone` are the two constants. Every matcher carries its own
// `Lifecycle`; composed matchers propagate `initialize`/`destroy` to their
// children as part of their own transition.

use std::sync::Arc;

use indexmap::IndexSet;
use regex::RegexBuilder;

use crate::error::EngineError;
use crate::lifecycle::Lifecycle;
use crate::model::{Attribute, AttributeValue, FilterContext};
use crate::scripting::{Bindings, ScriptEvaluator, ScriptValue};
use crate::validation::ValidationContext;

/// `(Attribute, FilterContext) -> set<AttributeValue> | Fail`. An `Err` is the
/// base spec's `Fail` outcome; the filter engine decides, per policy flag,
/// whether that means deny-all-for-the-rule or an aborting `FilterError`.
pub trait Matcher: Send + Sync {
    fn lifecycle(&self) -> &Lifecycle;

    fn get_matching_values(
        &self,
        attribute: &Attribute,
        ctx: &FilterContext,
    ) -> Result<IndexSet<AttributeValue>, EngineError>;

    fn initialize(&self) -> Result<(), EngineError> {
        self.lifecycle().mark_initialized("Matcher", "matcher")
    }

    fn validate(&self) -> Result<(), EngineError> {
        self.lifecycle().ensure_invocable("Matcher", "matcher")
    }

    fn destroy(&self) {
        self.lifecycle().mark_destroyed();
    }
}

pub type MatcherHandle = Arc<dyn Matcher>;

/// Matches plain `String` values, with the boundary behavior of SPEC_FULL.md
/// §8: a `None` `match_string` matches only `EmptyNull`; `Some("")` matches
/// only `EmptyZeroLength`; any other `Some(s)` matches `String` values equal
/// to `s` (optionally case-insensitively).
#[derive(Debug)]
pub struct StringMatcher {
    lifecycle: Lifecycle,
    match_string: Option<String>,
    case_sensitive: bool,
}

impl StringMatcher {
    pub fn new(match_string: Option<String>, case_sensitive: bool) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            match_string,
            case_sensitive,
        }
    }
}

impl Matcher for StringMatcher {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn get_matching_values(
        &self,
        attribute: &Attribute,
        _ctx: &FilterContext,
    ) -> Result<IndexSet<AttributeValue>, EngineError> {
        self.lifecycle.ensure_invocable("StringMatcher", "string")?;
        let mut out = IndexSet::new();
        for value in &attribute.values {
            let matches = match (&self.match_string, value) {
                (None, AttributeValue::EmptyNull) => true,
                (Some(s), AttributeValue::EmptyZeroLength) => s.is_empty(),
                (Some(s), AttributeValue::String(x)) => {
                    if self.case_sensitive {
                        x == s
                    } else {
                        x.eq_ignore_ascii_case(s)
                    }
                }
                _ => false,
            };
            if matches {
                out.insert(value.clone());
            }
        }
        Ok(out)
    }
}

/// Matches `String` values against a configured regex, applied as a full
/// (anchored) match.
pub struct RegexMatcher {
    lifecycle: Lifecycle,
    regex: regex::Regex,
}

impl RegexMatcher {
    pub fn new(pattern: &str, case_insensitive: bool) -> Result<Self, EngineError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| EngineError::constraint("RegexMatcher", format!("invalid pattern: {e}")))?;
        Ok(Self {
            lifecycle: Lifecycle::new(),
            regex,
        })
    }
}

impl Matcher for RegexMatcher {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn get_matching_values(
        &self,
        attribute: &Attribute,
        _ctx: &FilterContext,
    ) -> Result<IndexSet<AttributeValue>, EngineError> {
        self.lifecycle.ensure_invocable("RegexMatcher", "regex")?;
        let mut out = IndexSet::new();
        for value in &attribute.values {
            if let Some(s) = value.as_str() {
                if self.regex.is_match(s) {
                    out.insert(value.clone());
                }
            }
        }
        Ok(out)
    }
}

/// Matches `ScopedString` values whose `scope` is registered as a
/// `shibmd:Scope` for the filter context's recipient entity.
pub struct AttributeScopeMatchesShibMdScope {
    lifecycle: Lifecycle,
}

impl Default for AttributeScopeMatchesShibMdScope {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeScopeMatchesShibMdScope {
    pub fn new() -> Self {
        Self { lifecycle: Lifecycle::new() }
    }
}

impl Matcher for AttributeScopeMatchesShibMdScope {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn get_matching_values(
        &self,
        attribute: &Attribute,
        ctx: &FilterContext,
    ) -> Result<IndexSet<AttributeValue>, EngineError> {
        self.lifecycle.ensure_invocable("AttributeScopeMatchesShibMDScope", "scope")?;
        let scopes = ctx.scopes_provider.scopes_for_entity(&ctx.recipient_id);
        let mut out = IndexSet::new();
        for value in &attribute.values {
            if let Some(scope) = value.scope() {
                if scopes.iter().any(|s| s == scope) {
                    out.insert(value.clone());
                }
            }
        }
        Ok(out)
    }
}

/// Matches plain `String` values that are themselves one of the recipient's
/// registered `shibmd:Scope` strings.
pub struct AttributeValueMatchesShibMdScope {
    lifecycle: Lifecycle,
}

impl Default for AttributeValueMatchesShibMdScope {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeValueMatchesShibMdScope {
    pub fn new() -> Self {
        Self { lifecycle: Lifecycle::new() }
    }
}

impl Matcher for AttributeValueMatchesShibMdScope {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn get_matching_values(
        &self,
        attribute: &Attribute,
        ctx: &FilterContext,
    ) -> Result<IndexSet<AttributeValue>, EngineError> {
        self.lifecycle.ensure_invocable("AttributeValueMatchesShibMDScope", "scope")?;
        let scopes = ctx.scopes_provider.scopes_for_entity(&ctx.recipient_id);
        let mut out = IndexSet::new();
        for value in &attribute.values {
            if let AttributeValue::String(s) = value {
                if scopes.iter().any(|scope| scope == s) {
                    out.insert(value.clone());
                }
            }
        }
        Ok(out)
    }
}

/// Invokes an injected `ScriptEvaluator`; the script's `ScriptValue::Values`
/// output is intersected against the attribute's actual values so identity
/// and order are preserved.
pub struct ScriptedMatcher {
    lifecycle: Lifecycle,
    script: String,
    evaluator: Arc<dyn ScriptEvaluator>,
}

impl ScriptedMatcher {
    pub fn new(script: impl Into<String>, evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            script: script.into(),
            evaluator,
        }
    }
}

impl Matcher for ScriptedMatcher {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn get_matching_values(
        &self,
        attribute: &Attribute,
        ctx: &FilterContext,
    ) -> Result<IndexSet<AttributeValue>, EngineError> {
        self.lifecycle.ensure_invocable("ScriptedMatcher", "scripted")?;
        let bindings = Bindings::new()
            .with_attribute(attribute.id.as_str(), attribute.values.clone())
            .with_scalar("issuerId", ctx.issuer_id.clone())
            .with_scalar("recipientId", ctx.recipient_id.clone());
        match self.evaluator.evaluate(&self.script, &bindings)? {
            ScriptValue::Values(values) => {
                let candidates: IndexSet<AttributeValue> = values.into_iter().collect();
                Ok(attribute
                    .values
                    .iter()
                    .filter(|v| candidates.contains(*v))
                    .cloned()
                    .collect())
            }
            ScriptValue::Attributes(_) => Err(EngineError::filter(
                attribute.id.as_str(),
                "scripted matcher must return a value list, not a map of attributes",
            )),
        }
    }
}

/// Returns every value of the attribute, unconditionally.
#[derive(Debug, Default)]
pub struct MatchesAll {
    lifecycle: Lifecycle,
}

impl Matcher for MatchesAll {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn get_matching_values(
        &self,
        attribute: &Attribute,
        _ctx: &FilterContext,
    ) -> Result<IndexSet<AttributeValue>, EngineError> {
        self.lifecycle.ensure_invocable("MatchesAll", "matches-all")?;
        Ok(attribute.values.iter().cloned().collect())
    }
}

/// Returns no values, unconditionally.
#[derive(Debug, Default)]
pub struct MatchesNone {
    lifecycle: Lifecycle,
}

impl Matcher for MatchesNone {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn get_matching_values(
        &self,
        attribute: &Attribute,
        _ctx: &FilterContext,
    ) -> Result<IndexSet<AttributeValue>, EngineError> {
        self.lifecycle.ensure_invocable("MatchesNone", "matches-none")?;
        let _ = attribute;
        Ok(IndexSet::new())
    }
}

/// Intersection of every child's returned subset.
pub struct AndMatcher {
    lifecycle: Lifecycle,
    children: Vec<MatcherHandle>,
}

impl AndMatcher {
    pub fn new(children: Vec<MatcherHandle>) -> Result<Self, EngineError> {
        ValidationContext::new("AndMatcher").require(!children.is_empty(), "And requires at least one child")?;
        Ok(Self {
            lifecycle: Lifecycle::new(),
            children,
        })
    }
}

impl Matcher for AndMatcher {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn get_matching_values(
        &self,
        attribute: &Attribute,
        ctx: &FilterContext,
    ) -> Result<IndexSet<AttributeValue>, EngineError> {
        self.lifecycle.ensure_invocable("AndMatcher", "and")?;
        let mut iter = self.children.iter();
        let first = iter.next().expect("And requires at least one child");
        let mut result = first.get_matching_values(attribute, ctx)?;
        for child in iter {
            let next = child.get_matching_values(attribute, ctx)?;
            result.retain(|v| next.contains(v));
        }
        Ok(result)
    }

    fn initialize(&self) -> Result<(), EngineError> {
        for child in &self.children {
            child.initialize()?;
        }
        self.lifecycle.mark_initialized("AndMatcher", "and")
    }

    fn destroy(&self) {
        for child in &self.children {
            child.destroy();
        }
        self.lifecycle.mark_destroyed();
    }
}

/// Union of every child's returned subset.
pub struct OrMatcher {
    lifecycle: Lifecycle,
    children: Vec<MatcherHandle>,
}

impl OrMatcher {
    pub fn new(children: Vec<MatcherHandle>) -> Result<Self, EngineError> {
        ValidationContext::new("OrMatcher").require(!children.is_empty(), "Or requires at least one child")?;
        Ok(Self {
            lifecycle: Lifecycle::new(),
            children,
        })
    }
}

impl Matcher for OrMatcher {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn get_matching_values(
        &self,
        attribute: &Attribute,
        ctx: &FilterContext,
    ) -> Result<IndexSet<AttributeValue>, EngineError> {
        self.lifecycle.ensure_invocable("OrMatcher", "or")?;
        let mut result = IndexSet::new();
        for child in &self.children {
            result.extend(child.get_matching_values(attribute, ctx)?);
        }
        Ok(result)
    }

    fn initialize(&self) -> Result<(), EngineError> {
        for child in &self.children {
            child.initialize()?;
        }
        self.lifecycle.mark_initialized("OrMatcher", "or")
    }

    fn destroy(&self) {
        for child in &self.children {
            child.destroy();
        }
        self.lifecycle.mark_destroyed();
    }
}

/// `attribute.values \ child.get_matching_values(attribute, ctx)`.
pub struct NotMatcher {
    lifecycle: Lifecycle,
    child: MatcherHandle,
}

impl NotMatcher {
    pub fn new(child: MatcherHandle) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            child,
        }
    }
}

impl Matcher for NotMatcher {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn get_matching_values(
        &self,
        attribute: &Attribute,
        ctx: &FilterContext,
    ) -> Result<IndexSet<AttributeValue>, EngineError> {
        self.lifecycle.ensure_invocable("NotMatcher", "not")?;
        let excluded = self.child.get_matching_values(attribute, ctx)?;
        Ok(attribute
            .values
            .iter()
            .filter(|v| !excluded.contains(*v))
            .cloned()
            .collect())
    }

    fn initialize(&self) -> Result<(), EngineError> {
        self.child.initialize()?;
        self.lifecycle.mark_initialized("NotMatcher", "not")
    }

    fn destroy(&self) {
        self.child.destroy();
        self.lifecycle.mark_destroyed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeId;
    use std::sync::Arc;

    fn attr(values: Vec<AttributeValue>) -> Attribute {
        Attribute::with_values(AttributeId::new("eduPersonAffiliation").unwrap(), values)
    }

    fn ctx() -> FilterContext {
        FilterContext::new("issuer", "recipient", Default::default())
    }

    fn eq(s: &str) -> MatcherHandle {
        Arc::new(StringMatcher::new(Some(s.to_string()), true))
    }

    #[test]
    fn not_over_or_of_every_value_matches_nothing() {
        let values = vec![
            AttributeValue::String("v1".into()),
            AttributeValue::String("v2".into()),
            AttributeValue::String("v3".into()),
        ];
        let attribute = attr(values);
        let ctx = ctx();

        let or_all = OrMatcher::new(vec![eq("v1"), eq("v2"), eq("v3")]).unwrap();
        let not_all = NotMatcher::new(Arc::new(or_all));
        not_all.initialize().unwrap();
        let matched = not_all.get_matching_values(&attribute, &ctx).unwrap();
        assert!(matched.is_empty());
    }

    #[test]
    fn not_over_partial_or_leaves_the_remaining_value() {
        let values = vec![
            AttributeValue::String("v1".into()),
            AttributeValue::String("v2".into()),
            AttributeValue::String("v3".into()),
        ];
        let attribute = attr(values);
        let ctx = ctx();

        let or_two = OrMatcher::new(vec![eq("v1"), eq("v2")]).unwrap();
        let not_two = NotMatcher::new(Arc::new(or_two));
        not_two.initialize().unwrap();
        let matched = not_two.get_matching_values(&attribute, &ctx).unwrap();
        assert_eq!(matched, IndexSet::from([AttributeValue::String("v3".into())]));
    }

    #[test]
    fn string_matcher_distinguishes_empty_sentinels_from_empty_string() {
        let attribute = attr(vec![
            AttributeValue::String("x".into()),
            AttributeValue::EmptyNull,
            AttributeValue::EmptyZeroLength,
        ]);
        let ctx = ctx();

        let matches_null = StringMatcher::new(None, true);
        matches_null.initialize().unwrap();
        assert_eq!(
            matches_null.get_matching_values(&attribute, &ctx).unwrap(),
            IndexSet::from([AttributeValue::EmptyNull])
        );

        let matches_zero_length = StringMatcher::new(Some(String::new()), true);
        matches_zero_length.initialize().unwrap();
        assert_eq!(
            matches_zero_length.get_matching_values(&attribute, &ctx).unwrap(),
            IndexSet::from([AttributeValue::EmptyZeroLength])
        );
    }

    struct FixedScopes(Vec<(&'static str, Vec<&'static str>)>);

    impl crate::model::ScopesProvider for FixedScopes {
        fn scopes_for_entity(&self, entity_id: &str) -> Vec<String> {
            self.0
                .iter()
                .find(|(id, _)| *id == entity_id)
                .map(|(_, scopes)| scopes.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default()
        }
    }

    #[test]
    fn shibmd_scope_matchers_distinguish_scope_and_value_matches() {
        let attribute = attr(vec![
            AttributeValue::scoped("value", &crate::types::Scope::new("scope").unwrap()),
            AttributeValue::scoped("value", &crate::types::Scope::new("aa.aa").unwrap()),
            AttributeValue::scoped("value", &crate::types::Scope::new("entity").unwrap()),
            AttributeValue::String("value".into()),
            AttributeValue::String("aa".into()),
        ]);
        let ctx = FilterContext::new("issuer", "aa.example.org", Default::default()).with_scopes_provider(Arc::new(
            FixedScopes(vec![("aa.example.org", vec!["aa", "aa.aa"])]),
        ));

        let scope_matcher = AttributeScopeMatchesShibMdScope::new();
        scope_matcher.initialize().unwrap();
        let scope_matches = scope_matcher.get_matching_values(&attribute, &ctx).unwrap();
        assert_eq!(
            scope_matches,
            IndexSet::from([AttributeValue::scoped("value", &crate::types::Scope::new("aa.aa").unwrap())])
        );

        let value_matcher = AttributeValueMatchesShibMdScope::new();
        value_matcher.initialize().unwrap();
        let value_matches = value_matcher.get_matching_values(&attribute, &ctx).unwrap();
        assert_eq!(value_matches, IndexSet::from([AttributeValue::String("aa".into())]));
    }
}
