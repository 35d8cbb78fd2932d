//! Enum mappings between backing entity values and schema enum values

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::{optional_str, required_str, BuildScope, FieldBinding};
use crate::context::GenContext;
use crate::error::{GenError, Result};

/// One `source -> dest` pair of an enum mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumMapping {
    pub source: String,
    pub dest: String,
}

/// Enum declaration bound to a schema enum
#[derive(Debug, Clone, Serialize)]
pub struct EnumDefinition {
    pub name: String,
    /// Schema field carrying the enum (defaults to `name`)
    pub target: String,
    pub source: String,
    pub mapping: Vec<EnumMapping>,
    values: Vec<String>,
    descriptions: BTreeMap<String, String>,
}

impl EnumDefinition {
    pub fn build(ctx: &mut GenContext, scope: &BuildScope<'_>, declaration: &Value) -> Result<Self> {
        let name = required_str(declaration, "Name", &format!("Enums of {}", scope.owner))?;
        let context = format!("enum '{}' of {}", name, scope.owner);
        let target = optional_str(declaration, "For").unwrap_or(name);
        let source = required_str(declaration, "Source", &context)?;
        let mapping = declaration
            .get("Mapping")
            .and_then(Value::as_object)
            .ok_or_else(|| GenError::malformed(&context, "'Mapping' must be a mapping"))?;
        let mapping: Vec<EnumMapping> = mapping
            .iter()
            .map(|(source, dest)| EnumMapping {
                source: source.clone(),
                dest: dest.as_str().map(String::from).unwrap_or_else(|| dest.to_string()),
            })
            .collect();

        let binding = FieldBinding::locate(scope.owner, scope.spec, target)?;
        let resolved = ctx
            .resolver()
            .resolve_property(&binding.fragment, Some(scope.context()), true)?
            .ok_or_else(|| GenError::UnresolvedFragment(target.to_string()))?;
        let schema_values = resolved
            .get("enum")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                GenError::corrupted(scope.owner, format!("'{}' declares no enum values", target))
            })?;

        let values = intersect(&mapping, schema_values);
        let descriptions = resolved
            .get("enumDescriptions")
            .and_then(Value::as_object)
            .map(|all| {
                all.iter()
                    .filter(|(value, _)| values.contains(value))
                    .filter_map(|(value, text)| text.as_str().map(|t| (value.clone(), t.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            name: name.to_string(),
            target: target.to_string(),
            source: source.to_string(),
            mapping,
            values,
            descriptions,
        })
    }

    /// Schema enum values that have a mapping, in schema order
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Schema description of a mapped value.
    pub fn description(&self, value: &str) -> Result<Option<&str>> {
        if !self.values.iter().any(|v| v == value) {
            return Err(GenError::Lookup(format!(
                "value '{}' is not a valid enum of type '{}'",
                value, self.name
            )));
        }
        Ok(self.descriptions.get(value).map(String::as_str))
    }
}

/// Mapping keys that the schema enum declares, in schema order.
fn intersect(mapping: &[EnumMapping], schema_values: &[Value]) -> Vec<String> {
    schema_values
        .iter()
        .filter_map(Value::as_str)
        .filter(|value| mapping.iter().any(|m| m.source == *value))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(keys: &[&str]) -> Vec<EnumMapping> {
        keys.iter()
            .map(|k| EnumMapping {
                source: k.to_string(),
                dest: format!("Entity::{}", k),
            })
            .collect()
    }

    #[test]
    fn test_values_are_mapping_keys_in_schema_enum() {
        let schema = json!(["Lit", "Blinking", "Off"]);
        let values = intersect(&mapping(&["Off", "Lit", "Unknown"]), schema.as_array().unwrap());
        assert_eq!(values, vec!["Lit", "Off"]);
    }

    #[test]
    fn test_description_of_unmapped_value_is_lookup_fault() {
        let definition = EnumDefinition {
            name: "IndicatorLED".into(),
            target: "IndicatorLED".into(),
            source: "ChassisEntity".into(),
            mapping: mapping(&["Lit"]),
            values: vec!["Lit".into()],
            descriptions: BTreeMap::from([("Lit".to_string(), "The indicator is lit.".to_string())]),
        };
        assert_eq!(definition.description("Lit").unwrap(), Some("The indicator is lit."));
        assert!(matches!(definition.description("Off"), Err(GenError::Lookup(_))));
    }
}
