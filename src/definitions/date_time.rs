// DateTime: interprets input as epoch-seconds, epoch-millis, or a formatted
// timestamp per configured formatter; conversion errors may be ignored per flag.

use chrono::{DateTime as ChronoDateTime, NaiveDateTime, Utc};

use crate::error::EngineError;
use crate::lifecycle::{Identified, Lifecycle};
use crate::model::{Attribute, AttributeValue, ResolutionContext, WorkContext};
use crate::types::AttributeId;
use crate::validation::ValidationContext;

use super::{merged_dependency_values, AttributeDefinition, DefinitionMeta};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochUnit {
    Seconds,
    Millis,
}

#[derive(Debug)]
enum SourceFormat {
    Epoch(EpochUnit),
    Formatted(String),
}

#[derive(Debug)]
pub struct DateTimeDefinition {
    meta: DefinitionMeta,
    source: SourceFormat,
    output_format: String,
    ignore_conversion_errors: bool,
    lifecycle: Lifecycle,
}

impl Identified for DateTimeDefinition {
    fn id(&self) -> &str {
        &self.meta.id
    }
}

impl DateTimeDefinition {
    fn convert(&self, raw: &str) -> Result<String, String> {
        let parsed: ChronoDateTime<Utc> = match &self.source {
            SourceFormat::Epoch(EpochUnit::Seconds) => raw
                .parse::<i64>()
                .ok()
                .and_then(|secs| ChronoDateTime::from_timestamp(secs, 0))
                .ok_or_else(|| format!("'{raw}' is not a valid epoch-seconds value"))?,
            SourceFormat::Epoch(EpochUnit::Millis) => raw
                .parse::<i64>()
                .ok()
                .and_then(|millis| ChronoDateTime::from_timestamp_millis(millis))
                .ok_or_else(|| format!("'{raw}' is not a valid epoch-millis value"))?,
            SourceFormat::Formatted(fmt) => NaiveDateTime::parse_from_str(raw, fmt)
                .map(|naive| naive.and_utc())
                .map_err(|e| format!("'{raw}' does not match format '{fmt}': {e}"))?,
        };
        Ok(parsed.format(&self.output_format).to_string())
    }
}

impl AttributeDefinition for DateTimeDefinition {
    fn meta(&self) -> &DefinitionMeta {
        &self.meta
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn resolve(&self, _ctx: &ResolutionContext, work: &WorkContext) -> Result<Option<Attribute>, EngineError> {
        self.lifecycle.ensure_invocable("DateTimeDefinition", self.id())?;
        let inputs = merged_dependency_values(&self.meta, work);
        if inputs.is_empty() {
            return Ok(None);
        }
        let mut out = Vec::with_capacity(inputs.len());
        for value in inputs {
            let Some(raw) = value.as_str() else { continue };
            match self.convert(raw) {
                Ok(converted) => out.push(AttributeValue::String(converted)),
                Err(message) => {
                    if !self.ignore_conversion_errors {
                        return Err(EngineError::resolution(&self.meta.id, message));
                    }
                }
            }
        }
        Ok(Some(Attribute::with_values(self.meta.output_attribute_id.clone(), out)))
    }
}

pub struct DateTimeDefinitionBuilder {
    meta: DefinitionMeta,
    source: Option<SourceFormat>,
    output_format: String,
    ignore_conversion_errors: bool,
}

impl DateTimeDefinitionBuilder {
    pub fn new(id: impl Into<String>, output_attribute_id: AttributeId) -> Self {
        Self {
            meta: DefinitionMeta::new(id, output_attribute_id),
            source: None,
            output_format: "%Y-%m-%dT%H:%M:%SZ".to_string(),
            ignore_conversion_errors: false,
        }
    }

    pub fn epoch_unit(mut self, unit: EpochUnit) -> Self {
        self.source = Some(SourceFormat::Epoch(unit));
        self
    }

    pub fn input_format(mut self, format: impl Into<String>) -> Self {
        self.source = Some(SourceFormat::Formatted(format.into()));
        self
    }

    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = format.into();
        self
    }

    pub fn ignore_conversion_errors(mut self, value: bool) -> Self {
        self.ignore_conversion_errors = value;
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

    pub fn build(self) -> Result<DateTimeDefinition, EngineError> {
        ValidationContext::new("DateTimeDefinitionBuilder")
            .with_attribute("id", self.meta.id.clone())
            .require(!self.meta.id.trim().is_empty(), "definition id must not be empty")?;
        let source = self.source.ok_or_else(|| {
            EngineError::init_error(
                "DateTimeDefinition",
                &self.meta.id,
                "either epochUnit or an input format is required",
            )
        })?;
        Ok(DateTimeDefinition {
            meta: self.meta,
            source,
            output_format: self.output_format,
            ignore_conversion_errors: self.ignore_conversion_errors,
            lifecycle: Lifecycle::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dependency;

    #[test]
    fn converts_epoch_seconds_to_iso8601() {
        let def = DateTimeDefinitionBuilder::new("dt1", AttributeId::new("authTime").unwrap())
            .epoch_unit(EpochUnit::Seconds)
            .depends_on(Dependency::Attribute {
                plugin_id: "raw".into(),
                source_attribute_id: None,
            })
            .build()
            .unwrap();
        def.initialize().unwrap();

        let mut work = WorkContext::new();
        work.record_definition_result(
            "raw",
            Some(Attribute::with_values(
                AttributeId::new("raw").unwrap(),
                vec![AttributeValue::String("0".into())],
            )),
        );
        let ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
        let attr = def.resolve(&ctx, &work).unwrap().unwrap();
        assert_eq!(attr.values, vec![AttributeValue::String("1970-01-01T00:00:00Z".into())]);
    }

    #[test]
    fn conversion_errors_propagate_unless_ignored() {
        let def = DateTimeDefinitionBuilder::new("dt1", AttributeId::new("authTime").unwrap())
            .epoch_unit(EpochUnit::Seconds)
            .depends_on(Dependency::Attribute {
                plugin_id: "raw".into(),
                source_attribute_id: None,
            })
            .build()
            .unwrap();
        def.initialize().unwrap();

        let mut work = WorkContext::new();
        work.record_definition_result(
            "raw",
            Some(Attribute::with_values(
                AttributeId::new("raw").unwrap(),
                vec![AttributeValue::String("not-a-number".into())],
            )),
        );
        let ctx = ResolutionContext::new("jdoe", "issuer", "recipient");
        assert!(def.resolve(&ctx, &work).is_err());
    }
}
