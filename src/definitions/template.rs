// Template: all contributing dependencies must have equal cardinality n; the
// template is evaluated n times, binding each dependency's i-th value.
// Cardinality mismatch raises ResolutionError. Template text uses minimal
// `{name}`-style placeholder substitution (no control flow).

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Attribute, AttributeValue, Dependency, ResolutionContext, WorkContext};
use crate::types::AttributeId;
use crate::validation::ValidationContext;

use super::{AttributeDefinition, DefinitionMeta};

/// One named input bound into the template, e.g. `{givenName} {sn}`.
#[derive(Debug, Clone)]
pub struct TemplateBinding {
    pub name: String,
    pub dependency: Dependency,
}

#[derive(Debug)]
pub struct TemplateDefinition {
    meta: DefinitionMeta,
    template: String,
    bindings: Vec<TemplateBinding>,
    lifecycle: Lifecycle,
}

impl Identified for TemplateDefinition {
    fn id(&self) -> &str {
        &self.meta.id
    }
}

impl AttributeDefinition for TemplateDefinition {
    fn meta(&self) -> &DefinitionMeta {
        &self.meta
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn dependencies(&self) -> &[Dependency] {
        &self.meta.depends_on
    }

    fn resolve(&self, _ctx: &ResolutionContext, work: &WorkContext) -> Result<Option<Attribute>, EngineError> {
        self.lifecycle.ensure_invocable("TemplateDefinition", self.id())?;
        if self.bindings.is_empty() {
            return Ok(None);
        }

        let bound: Vec<(&str, Vec<AttributeValue>)> = self
            .bindings
            .iter()
            .map(|b| (b.name.as_str(), work.dependency_values(&b.dependency)))
            .collect();

        let cardinality = bound[0].1.len();
        for (name, values) in &bound {
            if values.len() != cardinality {
                return Err(EngineError::resolution(
                    &self.meta.id,
                    format!(
                        "template dependency '{name}' has cardinality {} but expected {cardinality}",
                        values.len()
                    ),
                ));
            }
        }

        if cardinality == 0 {
            return Ok(None);
        }

        let mut out = Vec::with_capacity(cardinality);
        for i in 0..cardinality {
            let mut rendered = self.template.clone();
            for (name, values) in &bound {
                let placeholder = format!("{{{name}}}");
                let value = values[i].as_str().unwrap_or("").to_string();
                rendered = rendered.replace(&placeholder, &value);
            }
            out.push(AttributeValue::String(rendered));
        }

        Ok(Some(Attribute::with_values(self.meta.output_attribute_id.clone(), out)))
    }
}

pub struct TemplateDefinitionBuilder {
    meta: DefinitionMeta,
    template: Option<String>,
    bindings: Vec<TemplateBinding>,
}

impl TemplateDefinitionBuilder {
    pub fn new(id: impl Into<String>, output_attribute_id: AttributeId) -> Self {
        Self {
            meta: DefinitionMeta::new(id, output_attribute_id),
            template: None,
            bindings: Vec::new(),
        }
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn bind(mut self, name: impl Into<String>, dependency: Dependency) -> Self {
        let name = name.into();
        self.meta.depends_on.push(dependency.clone());
        self.bindings.push(TemplateBinding { name, dependency });
        self
    }

    pub fn dependency_only(mut self, value: bool) -> Self {
        self.meta.dependency_only = value;
        self
    }

    pub fn build(self) -> Result<TemplateDefinition, EngineError> {
        ValidationContext::new("TemplateDefinitionBuilder")
            .with_attribute("id", self.meta.id.clone())
            .require(!self.meta.id.trim().is_empty(), "definition id must not be empty")?;
        let template = self
            .template
            .ok_or_else(|| EngineError::init_error("TemplateDefinition", &self.meta.id, "template text is required"))?;
        Ok(TemplateDefinition {
            meta: self.meta,
            template,
            bindings: self.bindings,
            lifecycle: Lifecycle::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(id: &str) -> Dependency {
        Dependency::Attribute {
            plugin_id: id.to_string(),
            source_attribute_id: None,
        }
    }

    #[test]
    fn evaluates_template_once_per_aligned_index() {
        let def = TemplateDefinitionBuilder::new("template1", AttributeId::new("displayName").unwrap())
            .template("{given} {family}")
            .bind("given", dep("givenName"))
            .bind("family", dep("sn"))
            .build()
            .unwrap();
        def.initialize().unwrap();

        let mut work = WorkContext::new();
        work.record_definition_result(
            "givenName",
            Some(Attribute::with_values(
                AttributeId::new("givenName").unwrap(),
                vec![AttributeValue::String("Jane".into())],
            )),
        );
        work.record_definition_result(
            "sn",
            Some(Attribute::with_values(
                AttributeId::new("sn").unwrap(),
                vec![AttributeValue::String("Doe".into())],
            )),
        );

        let ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
        let attr = def.resolve(&ctx, &work).unwrap().unwrap();
        assert_eq!(attr.values, vec![AttributeValue::String("Jane Doe".into())]);
    }

    #[test]
    fn cardinality_mismatch_raises_resolution_error() {
        let def = TemplateDefinitionBuilder::new("template1", AttributeId::new("displayName").unwrap())
            .template("{given} {family}")
            .bind("given", dep("givenName"))
            .bind("family", dep("sn"))
            .build()
            .unwrap();
        def.initialize().unwrap();

        let mut work = WorkContext::new();
        work.record_definition_result(
            "givenName",
            Some(Attribute::with_values(
                AttributeId::new("givenName").unwrap(),
                vec![AttributeValue::String("Jane".into()), AttributeValue::String("J.".into())],
            )),
        );
        work.record_definition_result(
            "sn",
            Some(Attribute::with_values(
                AttributeId::new("sn").unwrap(),
                vec![AttributeValue::String("Doe".into())],
            )),
        );

        let ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
        assert!(matches!(
            def.resolve(&ctx, &work),
            Err(EngineError::Resolution { .. })
        ));
    }
}
