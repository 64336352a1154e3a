// Mapped: each input value is presented to an ordered list of value mappings;
// each mapping either yields a string or is absent. Unmatched values are
// dropped, passed through, or replaced by a default, per configuration. It is
// an initialization error to combine passThru with a default value.

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Attribute, AttributeValue, ResolutionContext, WorkContext};
use crate::types::AttributeId;
use crate::validation::ValidationContext;

use super::{merged_dependency_values, AttributeDefinition, DefinitionMeta};

/// One entry in the mapped definition's ordered lookup table: `source_values`
/// (matched exactly against the input string) maps to `result`.
#[derive(Debug, Clone)]
pub struct ValueMapping {
    pub source_values: Vec<String>,
    pub result: String,
}

impl ValueMapping {
    pub fn new(source_values: Vec<String>, result: impl Into<String>) -> Self {
        Self {
            source_values,
            result: result.into(),
        }
    }
}

#[derive(Debug)]
pub struct MappedDefinition {
    meta: DefinitionMeta,
    mappings: Vec<ValueMapping>,
    pass_thru: bool,
    default_value: Option<String>,
    lifecycle: Lifecycle,
}

impl Identified for MappedDefinition {
    fn id(&self) -> &str {
        &self.meta.id
    }
}

impl AttributeDefinition for MappedDefinition {
    fn meta(&self) -> &DefinitionMeta {
        &self.meta
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn resolve(&self, _ctx: &ResolutionContext, work: &WorkContext) -> Result<Option<Attribute>, EngineError> {
        self.lifecycle.ensure_invocable("MappedDefinition", self.id())?;
        let inputs = merged_dependency_values(&self.meta, work);
        if inputs.is_empty() {
            return Ok(None);
        }
        let mut out = Vec::new();
        for value in inputs {
            let Some(s) = value.as_str() else { continue };
            let mapped = self
                .mappings
                .iter()
                .find(|m| m.source_values.iter().any(|sv| sv == s))
                .map(|m| m.result.clone());

            match mapped {
                Some(result) => out.push(AttributeValue::String(result)),
                None if self.pass_thru => out.push(AttributeValue::String(s.to_string())),
                None => {
                    if let Some(default) = &self.default_value {
                        out.push(AttributeValue::String(default.clone()));
                    }
                    // else: drop the unmatched value
                }
            }
        }
        Ok(Some(Attribute::with_values(self.meta.output_attribute_id.clone(), out)))
    }
}

pub struct MappedDefinitionBuilder {
    meta: DefinitionMeta,
    mappings: Vec<ValueMapping>,
    pass_thru: bool,
    default_value: Option<String>,
}

impl MappedDefinitionBuilder {
    pub fn new(id: impl Into<String>, output_attribute_id: AttributeId) -> Self {
        Self {
            meta: DefinitionMeta::new(id, output_attribute_id),
            mappings: Vec::new(),
            pass_thru: false,
            default_value: None,
        }
    }

    pub fn mapping(mut self, mapping: ValueMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    pub fn pass_thru(mut self, value: bool) -> Self {
        self.pass_thru = value;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
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

    pub fn build(self) -> Result<MappedDefinition, EngineError> {
        ValidationContext::new("MappedDefinitionBuilder")
            .with_attribute("id", self.meta.id.clone())
            .require(!self.meta.id.trim().is_empty(), "definition id must not be empty")?;
        ValidationContext::new("MappedDefinitionBuilder")
            .with_attribute("id", self.meta.id.clone())
            .require_at_init(
                &self.meta.id,
                !(self.pass_thru && self.default_value.is_some()),
                "passThru and a default value are mutually exclusive",
            )?;
        Ok(MappedDefinition {
            meta: self.meta,
            mappings: self.mappings,
            pass_thru: self.pass_thru,
            default_value: self.default_value,
            lifecycle: Lifecycle::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dependency;

    fn base_builder() -> MappedDefinitionBuilder {
        MappedDefinitionBuilder::new("mapped1", AttributeId::new("affiliation").unwrap())
            .mapping(ValueMapping::new(vec!["staff".into(), "faculty".into()], "employee"))
            .depends_on(Dependency::Attribute {
                plugin_id: "upstream".into(),
                source_attribute_id: None,
            })
    }

    #[test]
    fn combining_pass_thru_and_default_is_an_init_error() {
        let result = base_builder().pass_thru(true).default_value("unknown").build();
        assert!(matches!(
            result,
            Err(EngineError::ComponentInitialization { .. })
        ));
    }

    #[test]
    fn unmatched_values_are_dropped_by_default() {
        let def = base_builder().build().unwrap();
        def.initialize().unwrap();
        let mut work = WorkContext::new();
        work.record_definition_result(
            "upstream",
            Some(Attribute::with_values(
                AttributeId::new("upstream").unwrap(),
                vec![
                    AttributeValue::String("staff".into()),
                    AttributeValue::String("student".into()),
                ],
            )),
        );
        let ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
        let attr = def.resolve(&ctx, &work).unwrap().unwrap();
        assert_eq!(attr.values, vec![AttributeValue::String("employee".into())]);
    }

    #[test]
    fn default_value_replaces_unmatched_values() {
        let def = base_builder().default_value("other").build().unwrap();
        def.initialize().unwrap();
        let mut work = WorkContext::new();
        work.record_definition_result(
            "upstream",
            Some(Attribute::with_values(
                AttributeId::new("upstream").unwrap(),
                vec![AttributeValue::String("student".into())],
            )),
        );
        let ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
        let attr = def.resolve(&ctx, &work).unwrap().unwrap();
        assert_eq!(attr.values, vec![AttributeValue::String("other".into())]);
    }
}
