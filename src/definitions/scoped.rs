// Scoped: for each input string value, emit ScopedString(v, scope); non-string
// input is an error.

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Attribute, AttributeValue, ResolutionContext, WorkContext};
use crate::types::{AttributeId, Scope};
use crate::validation::ValidationContext;

use super::{merged_dependency_values, AttributeDefinition, DefinitionMeta};

#[derive(Debug)]
pub struct ScopedDefinition {
    meta: DefinitionMeta,
    scope: Scope,
    lifecycle: Lifecycle,
}

impl Identified for ScopedDefinition {
    fn id(&self) -> &str {
        &self.meta.id
    }
}

impl AttributeDefinition for ScopedDefinition {
    fn meta(&self) -> &DefinitionMeta {
        &self.meta
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn resolve(&self, _ctx: &ResolutionContext, work: &WorkContext) -> Result<Option<Attribute>, EngineError> {
        self.lifecycle.ensure_invocable("ScopedDefinition", self.id())?;
        let inputs = merged_dependency_values(&self.meta, work);
        if inputs.is_empty() {
            return Ok(None);
        }
        let mut out = Vec::with_capacity(inputs.len());
        for value in inputs {
            match &value {
                AttributeValue::String(s) => out.push(AttributeValue::scoped(s.clone(), &self.scope)),
                AttributeValue::EmptyNull | AttributeValue::EmptyZeroLength => out.push(value),
                _ => {
                    return Err(EngineError::resolution(
                        &self.meta.id,
                        "scoped definition requires string-valued input",
                    ))
                }
            }
        }
        Ok(Some(Attribute::with_values(self.meta.output_attribute_id.clone(), out)))
    }
}

pub struct ScopedDefinitionBuilder {
    meta: DefinitionMeta,
    scope: Option<Scope>,
}

impl ScopedDefinitionBuilder {
    pub fn new(id: impl Into<String>, output_attribute_id: AttributeId) -> Self {
        Self {
            meta: DefinitionMeta::new(id, output_attribute_id),
            scope: None,
        }
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Result<Self, EngineError> {
        self.scope = Some(Scope::new(scope)?);
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

    pub fn build(self) -> Result<ScopedDefinition, EngineError> {
        ValidationContext::new("ScopedDefinitionBuilder")
            .with_attribute("id", self.meta.id.clone())
            .require(!self.meta.id.trim().is_empty(), "definition id must not be empty")?;
        let scope = self
            .scope
            .ok_or_else(|| EngineError::init_error("ScopedDefinition", &self.meta.id, "scope is required"))?;
        Ok(ScopedDefinition {
            meta: self.meta,
            scope,
            lifecycle: Lifecycle::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dependency;

    #[test]
    fn scoped_emits_scoped_string_for_every_string_value_and_strips_nulls_on_finalize() {
        let def = ScopedDefinitionBuilder::new("scoped1", AttributeId::new("eppn").unwrap())
            .scope("example.org")
            .unwrap()
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
                    AttributeValue::String("x".into()),
                    AttributeValue::EmptyNull,
                    AttributeValue::String("x".into()),
                ],
            )),
        );

        let ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
        let mut attr = def.resolve(&ctx, &work).unwrap().unwrap();
        attr.finalize_values(true);
        assert_eq!(
            attr.values,
            vec![AttributeValue::ScopedString {
                value: "x".into(),
                scope: "example.org".into()
            }]
        );
    }

    #[test]
    fn scoped_rejects_non_string_input() {
        let def = ScopedDefinitionBuilder::new("scoped1", AttributeId::new("eppn").unwrap())
            .scope("example.org")
            .unwrap()
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
                vec![AttributeValue::Bytes(vec![1, 2, 3])],
            )),
        );
        let ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
        assert!(def.resolve(&ctx, &work).is_err());
    }
}
