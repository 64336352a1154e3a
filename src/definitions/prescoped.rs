// Prescoped: split each string value on the configured delimiter; fewer than
// 2 parts raises ResolutionError; emit ScopedString(parts[0], parts[1]).

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Attribute, AttributeValue, ResolutionContext, WorkContext};
use crate::types::{AttributeId, Delimiter};
use crate::validation::ValidationContext;

use super::{merged_dependency_values, AttributeDefinition, DefinitionMeta};

#[derive(Debug)]
pub struct PrescopedDefinition {
    meta: DefinitionMeta,
    delimiter: Delimiter,
    lifecycle: Lifecycle,
}

impl Identified for PrescopedDefinition {
    fn id(&self) -> &str {
        &self.meta.id
    }
}

impl AttributeDefinition for PrescopedDefinition {
    fn meta(&self) -> &DefinitionMeta {
        &self.meta
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn resolve(&self, _ctx: &ResolutionContext, work: &WorkContext) -> Result<Option<Attribute>, EngineError> {
        self.lifecycle.ensure_invocable("PrescopedDefinition", self.id())?;
        let inputs = merged_dependency_values(&self.meta, work);
        if inputs.is_empty() {
            return Ok(None);
        }
        let mut out = Vec::with_capacity(inputs.len());
        for value in inputs {
            match &value {
                AttributeValue::String(s) => {
                    let mut parts = s.splitn(2, self.delimiter.as_str());
                    let first = parts.next();
                    let second = parts.next();
                    match (first, second) {
                        (Some(value_part), Some(scope_part)) if !scope_part.is_empty() => {
                            out.push(AttributeValue::ScopedString {
                                value: value_part.to_string(),
                                scope: scope_part.to_string(),
                            });
                        }
                        _ => {
                            return Err(EngineError::resolution(
                                &self.meta.id,
                                format!("value '{s}' does not contain delimiter '{}'", self.delimiter.as_str()),
                            ))
                        }
                    }
                }
                AttributeValue::EmptyNull | AttributeValue::EmptyZeroLength => out.push(value),
                _ => {
                    return Err(EngineError::resolution(
                        &self.meta.id,
                        "prescoped definition requires string-valued input",
                    ))
                }
            }
        }
        Ok(Some(Attribute::with_values(self.meta.output_attribute_id.clone(), out)))
    }
}

pub struct PrescopedDefinitionBuilder {
    meta: DefinitionMeta,
    delimiter: Option<Delimiter>,
}

impl PrescopedDefinitionBuilder {
    pub fn new(id: impl Into<String>, output_attribute_id: AttributeId) -> Self {
        Self {
            meta: DefinitionMeta::new(id, output_attribute_id),
            delimiter: None,
        }
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Result<Self, EngineError> {
        self.delimiter = Some(Delimiter::new(delimiter)?);
        Ok(self)
    }

    pub fn depends_on(mut self, dep: crate::model::Dependency) -> Self {
        self.meta.depends_on.push(dep);
        self
    }

    pub fn dependency_only(mut self, value: bool) -> Self {
        self.meta.dependency_only = value;
        self
    }

    pub fn build(self) -> Result<PrescopedDefinition, EngineError> {
        ValidationContext::new("PrescopedDefinitionBuilder")
            .with_attribute("id", self.meta.id.clone())
            .require(!self.meta.id.trim().is_empty(), "definition id must not be empty")?;
        let delimiter = self
            .delimiter
            .ok_or_else(|| EngineError::init_error("PrescopedDefinition", &self.meta.id, "delimiter is required"))?;
        Ok(PrescopedDefinition {
            meta: self.meta,
            delimiter,
            lifecycle: Lifecycle::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dependency;

    fn definition() -> PrescopedDefinition {
        PrescopedDefinitionBuilder::new("prescoped1", AttributeId::new("eppn").unwrap())
            .delimiter("@")
            .unwrap()
            .depends_on(Dependency::Attribute {
                plugin_id: "upstream".into(),
                source_attribute_id: None,
            })
            .build()
            .unwrap()
    }

    #[test]
    fn splits_on_delimiter_into_value_and_scope() {
        let def = definition();
        def.initialize().unwrap();
        let mut work = WorkContext::new();
        work.record_definition_result(
            "upstream",
            Some(Attribute::with_values(
                AttributeId::new("upstream").unwrap(),
                vec![AttributeValue::String("jdoe@example.org".into())],
            )),
        );
        let ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
        let attr = def.resolve(&ctx, &work).unwrap().unwrap();
        assert_eq!(
            attr.values,
            vec![AttributeValue::ScopedString {
                value: "jdoe".into(),
                scope: "example.org".into()
            }]
        );
    }

    #[test]
    fn missing_delimiter_raises_resolution_error() {
        let def = definition();
        def.initialize().unwrap();
        let mut work = WorkContext::new();
        work.record_definition_result(
            "upstream",
            Some(Attribute::with_values(
                AttributeId::new("upstream").unwrap(),
                vec![AttributeValue::String("jdoe".into())],
            )),
        );
        let ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
        assert!(matches!(
            def.resolve(&ctx, &work),
            Err(EngineError::Resolution { .. })
        ));
    }
}
