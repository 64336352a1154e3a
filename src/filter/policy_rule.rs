// Policy requirement rules: tristate `FilterContext -> {TRUE, FALSE, FAIL}`
// predicates gating a `FilterPolicy` (SPEC_FULL.md §4.7). `FAIL` is distinct
// from `FALSE` — it means the rule itself errored (e.g. lifecycle violation,
// a scripted rule throwing) rather than legitimately not applying.

use std::sync::Arc;

use crate::error::EngineError;
use crate::lifecycle::Lifecycle;
use crate::model::{FilterContext, Tristate};

pub trait PolicyRequirementRule: Send + Sync {
    fn lifecycle(&self) -> &Lifecycle;

    fn matches(&self, ctx: &FilterContext) -> Tristate;

    fn initialize(&self) -> Result<(), EngineError> {
        self.lifecycle().mark_initialized("PolicyRequirementRule", "rule")
    }

    fn validate(&self) -> Result<(), EngineError> {
        self.lifecycle().ensure_invocable("PolicyRequirementRule", "rule")
    }

    fn destroy(&self) {
        self.lifecycle().mark_destroyed();
    }
}

pub type PolicyRuleHandle = Arc<dyn PolicyRequirementRule>;

fn lifecycle_tristate(lifecycle: &Lifecycle, component: &str) -> Option<Tristate> {
    match lifecycle.ensure_invocable(component, "rule") {
        Ok(()) => None,
        Err(_) => Some(Tristate::Fail),
    }
}

/// Always evaluates to `TRUE` once initialized. The `MATCHES_ALL` rule-level
/// constant named in SPEC_FULL.md §8 scenario 4.
#[derive(Debug, Default)]
pub struct AlwaysTrueRule {
    lifecycle: Lifecycle,
}

impl PolicyRequirementRule for AlwaysTrueRule {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn matches(&self, _ctx: &FilterContext) -> Tristate {
        lifecycle_tristate(&self.lifecycle, "AlwaysTrueRule").unwrap_or(Tristate::True)
    }
}

/// Always evaluates to `FALSE` once initialized. The `MATCHES_NONE` constant.
#[derive(Debug, Default)]
pub struct AlwaysFalseRule {
    lifecycle: Lifecycle,
}

impl PolicyRequirementRule for AlwaysFalseRule {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn matches(&self, _ctx: &FilterContext) -> Tristate {
        lifecycle_tristate(&self.lifecycle, "AlwaysFalseRule").unwrap_or(Tristate::False)
    }
}

/// Always evaluates to `FAIL`. Stands in for the base spec's
/// `REQUIREMENT_RULE_FAILS` test fixture — a rule that always errors.
#[derive(Debug, Default)]
pub struct AlwaysFailRule {
    lifecycle: Lifecycle,
}

impl PolicyRequirementRule for AlwaysFailRule {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn matches(&self, _ctx: &FilterContext) -> Tristate {
        let _ = self.lifecycle.ensure_invocable("AlwaysFailRule", "rule");
        Tristate::Fail
    }
}

/// `FALSE` if any child is `FALSE`; `FAIL` if any non-`FALSE` child is `FAIL`;
/// else `TRUE`.
pub struct AndRule {
    lifecycle: Lifecycle,
    children: Vec<PolicyRuleHandle>,
}

impl AndRule {
    pub fn new(children: Vec<PolicyRuleHandle>) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            children,
        }
    }
}

impl PolicyRequirementRule for AndRule {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn matches(&self, ctx: &FilterContext) -> Tristate {
        if let Some(fail) = lifecycle_tristate(&self.lifecycle, "AndRule") {
            return fail;
        }
        let mut saw_fail = false;
        for child in &self.children {
            match child.matches(ctx) {
                Tristate::False => return Tristate::False,
                Tristate::Fail => saw_fail = true,
                Tristate::True => {}
            }
        }
        if saw_fail {
            Tristate::Fail
        } else {
            Tristate::True
        }
    }

    fn initialize(&self) -> Result<(), EngineError> {
        for child in &self.children {
            child.initialize()?;
        }
        self.lifecycle.mark_initialized("AndRule", "rule")
    }

    fn destroy(&self) {
        for child in &self.children {
            child.destroy();
        }
        self.lifecycle.mark_destroyed();
    }
}

/// `TRUE` if any child is `TRUE`; `FAIL` if any non-`TRUE` child is `FAIL`;
/// else `FALSE`.
pub struct OrRule {
    lifecycle: Lifecycle,
    children: Vec<PolicyRuleHandle>,
}

impl OrRule {
    pub fn new(children: Vec<PolicyRuleHandle>) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            children,
        }
    }
}

impl PolicyRequirementRule for OrRule {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn matches(&self, ctx: &FilterContext) -> Tristate {
        if let Some(fail) = lifecycle_tristate(&self.lifecycle, "OrRule") {
            return fail;
        }
        let mut saw_fail = false;
        for child in &self.children {
            match child.matches(ctx) {
                Tristate::True => return Tristate::True,
                Tristate::Fail => saw_fail = true,
                Tristate::False => {}
            }
        }
        if saw_fail {
            Tristate::Fail
        } else {
            Tristate::False
        }
    }

    fn initialize(&self) -> Result<(), EngineError> {
        for child in &self.children {
            child.initialize()?;
        }
        self.lifecycle.mark_initialized("OrRule", "rule")
    }

    fn destroy(&self) {
        for child in &self.children {
            child.destroy();
        }
        self.lifecycle.mark_destroyed();
    }
}

/// `TRUE <-> FALSE`, `FAIL -> FAIL`.
pub struct NotRule {
    lifecycle: Lifecycle,
    child: PolicyRuleHandle,
}

impl NotRule {
    pub fn new(child: PolicyRuleHandle) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            child,
        }
    }
}

impl PolicyRequirementRule for NotRule {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn matches(&self, ctx: &FilterContext) -> Tristate {
        if let Some(fail) = lifecycle_tristate(&self.lifecycle, "NotRule") {
            return fail;
        }
        self.child.matches(ctx).not()
    }

    fn initialize(&self) -> Result<(), EngineError> {
        self.child.initialize()?;
        self.lifecycle.mark_initialized("NotRule", "rule")
    }

    fn destroy(&self) {
        self.child.destroy();
        self.lifecycle.mark_destroyed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ctx() -> FilterContext {
        FilterContext::new("issuer", "recipient", Default::default())
    }

    #[test]
    fn not_over_constants_and_failing_rule() {
        let ctx = ctx();

        let not_all = NotRule::new(Arc::new(AlwaysTrueRule::default()));
        not_all.initialize().unwrap();
        assert_eq!(not_all.matches(&ctx), Tristate::False);

        let not_none = NotRule::new(Arc::new(AlwaysFalseRule::default()));
        not_none.initialize().unwrap();
        assert_eq!(not_none.matches(&ctx), Tristate::True);

        let not_fails = NotRule::new(Arc::new(AlwaysFailRule::default()));
        not_fails.initialize().unwrap();
        assert_eq!(not_fails.matches(&ctx), Tristate::Fail);
    }

    #[test]
    fn and_rule_short_circuits_to_false_and_propagates_fail() {
        let ctx = ctx();
        let and_with_false = AndRule::new(vec![
            Arc::new(AlwaysTrueRule::default()),
            Arc::new(AlwaysFalseRule::default()),
            Arc::new(AlwaysFailRule::default()),
        ]);
        and_with_false.initialize().unwrap();
        assert_eq!(and_with_false.matches(&ctx), Tristate::False);

        let and_with_fail = AndRule::new(vec![
            Arc::new(AlwaysTrueRule::default()),
            Arc::new(AlwaysFailRule::default()),
        ]);
        and_with_fail.initialize().unwrap();
        assert_eq!(and_with_fail.matches(&ctx), Tristate::Fail);
    }

    #[test]
    fn or_rule_short_circuits_to_true_and_propagates_fail() {
        let ctx = ctx();
        let or_with_true = OrRule::new(vec![
            Arc::new(AlwaysFalseRule::default()),
            Arc::new(AlwaysTrueRule::default()),
            Arc::new(AlwaysFailRule::default()),
        ]);
        or_with_true.initialize().unwrap();
        assert_eq!(or_with_true.matches(&ctx), Tristate::True);

        let or_with_fail = OrRule::new(vec![
            Arc::new(AlwaysFalseRule::default()),
            Arc::new(AlwaysFailRule::default()),
        ]);
        or_with_fail.initialize().unwrap();
        assert_eq!(or_with_fail.matches(&ctx), Tristate::Fail);
    }
}
