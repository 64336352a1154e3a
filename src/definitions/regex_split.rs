// RegexSplit: apply configured regex (optionally case-insensitive) to each
// string value; on full match, emit String(group[1]); non-match is silently
// dropped.

use regex::Regex;

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Attribute, AttributeValue, ResolutionContext, WorkContext};
use crate::types::AttributeId;
use crate::validation::ValidationContext;

use super::{merged_dependency_values, AttributeDefinition, DefinitionMeta};

pub struct RegexSplitDefinition {
    meta: DefinitionMeta,
    regex: Regex,
    lifecycle: Lifecycle,
}

impl Identified for RegexSplitDefinition {
    fn id(&self) -> &str {
        &self.meta.id
    }
}

impl AttributeDefinition for RegexSplitDefinition {
    fn meta(&self) -> &DefinitionMeta {
        &self.meta
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn resolve(&self, _ctx: &ResolutionContext, work: &WorkContext) -> Result<Option<Attribute>, EngineError> {
        self.lifecycle.ensure_invocable("RegexSplitDefinition", self.id())?;
        let inputs = merged_dependency_values(&self.meta, work);
        if inputs.is_empty() {
            return Ok(None);
        }
        let mut out = Vec::new();
        for value in inputs {
            let Some(s) = value.as_str() else { continue };
            if let Some(captures) = self.regex.captures(s) {
                if captures.get(0).map(|m| m.as_str()) != Some(s) {
                    continue;
                }
                if let Some(group) = captures.get(1) {
                    out.push(AttributeValue::String(group.as_str().to_string()));
                }
            }
        }
        Ok(Some(Attribute::with_values(self.meta.output_attribute_id.clone(), out)))
    }
}

pub struct RegexSplitDefinitionBuilder {
    meta: DefinitionMeta,
    pattern: Option<String>,
    case_sensitive: bool,
}

impl RegexSplitDefinitionBuilder {
    pub fn new(id: impl Into<String>, output_attribute_id: AttributeId) -> Self {
        Self {
            meta: DefinitionMeta::new(id, output_attribute_id),
            pattern: None,
            case_sensitive: true,
        }
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn case_sensitive(mut self, value: bool) -> Self {
        self.case_sensitive = value;
        self
    }

    pub fn depends_on(mut self, dep: crate::model::Dependency) -> Self {
        self.meta.depends_on.push(dep);
        self
    }

    pub fn dependency_only(mut self, value: bool) -> Self {
        self.meta.dependency_only = value;
        self
    }

    pub fn build(self) -> Result<RegexSplitDefinition, EngineError> {
        ValidationContext::new("RegexSplitDefinitionBuilder")
            .with_attribute("id", self.meta.id.clone())
            .require(!self.meta.id.trim().is_empty(), "definition id must not be empty")?;
        let pattern = self
            .pattern
            .ok_or_else(|| EngineError::init_error("RegexSplitDefinition", &self.meta.id, "regex is required"))?;
        let compiled = if self.case_sensitive {
            Regex::new(&pattern)
        } else {
            Regex::new(&format!("(?i){pattern}"))
        }
        .map_err(|e| {
            EngineError::init_error(
                "RegexSplitDefinition",
                &self.meta.id,
                format!("invalid regex '{pattern}': {e}"),
            )
        })?;
        Ok(RegexSplitDefinition {
            meta: self.meta,
            regex: compiled,
            lifecycle: Lifecycle::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dependency;

    #[test]
    fn extracts_capture_group_on_full_match_and_drops_non_matches() {
        let def = RegexSplitDefinitionBuilder::new("regexsplit1", AttributeId::new("uid").unwrap())
            .pattern(r"(\w+)@example\.org")
            .depends_on(Dependency::Attribute {
                plugin_id: "upstream".into(),
                source_attribute_id: None,
            })
            .build()
            .unwrap();
        def.initialize().unwrap();

        let mut work = WorkContext::new();
        work.record_definition_result(
            "upstream",
            Some(Attribute::with_values(
                AttributeId::new("upstream").unwrap(),
                vec![
                    AttributeValue::String("jdoe@example.org".into()),
                    AttributeValue::String("not-matching".into()),
                ],
            )),
        );
        let ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
        let attr = def.resolve(&ctx, &work).unwrap().unwrap();
        assert_eq!(attr.values, vec![AttributeValue::String("jdoe".into())]);
    }
}
