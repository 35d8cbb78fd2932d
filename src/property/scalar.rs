//! Static literals and entity-backed properties

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::{optional_list, optional_str, required_str, BuildScope, FieldBinding, GetterStrategy};
use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::resolver::{referenced_type_name, SemanticType};

/// A field with a fixed value
#[derive(Debug, Clone, Serialize)]
pub struct StaticProperty {
    pub name: String,
    pub value: Value,
    /// Value as the renderer should print it
    pub literal: String,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
    pub getter: GetterStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StaticProperty {
    pub fn build(ctx: &mut GenContext, scope: &BuildScope<'_>, declaration: &Value) -> Result<Self> {
        let name = required_str(declaration, "Name", "Static property")?;
        let value = declaration.get("Value").cloned().ok_or_else(|| {
            GenError::malformed(format!("Static property '{}'", name), "required key 'Value' is missing")
        })?;

        let binding = FieldBinding::locate(scope.owner, scope.spec, name)?;
        let mut semantic_type = ctx
            .resolver()
            .property_type(&binding.fragment, Some(scope.context()))?;
        // Enum literals are written as their string value
        if semantic_type == SemanticType::Enum {
            semantic_type = SemanticType::String;
        }

        let getter = if value.is_null() {
            GetterStrategy::Null
        } else {
            GetterStrategy::for_type(&semantic_type, referenced_type_name(&binding.fragment))
        };
        let description = binding.description(ctx, scope.context())?;

        Ok(Self {
            name: name.to_string(),
            literal: static_literal(&semantic_type, &value),
            value,
            semantic_type,
            getter,
            description,
        })
    }
}

/// Render a literal by its resolved type.
pub fn static_literal(semantic_type: &SemanticType, value: &Value) -> String {
    match (semantic_type, value) {
        (_, Value::Null) => "nullptr".to_string(),
        (SemanticType::String, Value::String(s)) => quoted(s),
        (SemanticType::String, other) => quoted(&other.to_string()),
        (SemanticType::Boolean, other) => truthy(other).to_string(),
        (_, Value::String(s)) => s.clone(),
        (_, other) => other.to_string(),
    }
}

/// Double-quoted string literal with `"` and `\` escaped
fn quoted(raw: &str) -> String {
    let mut literal = String::with_capacity(raw.len() + 2);
    literal.push('"');
    for c in raw.chars() {
        if matches!(c, '"' | '\\') {
            literal.push('\\');
        }
        literal.push(c);
    }
    literal.push('"');
    literal
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Right-hand side of an equality condition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionValue {
    /// A qualified name (contains `::`), rendered verbatim
    Symbolic(String),
    Literal(Value),
}

/// Filter selecting which backing entity instance a getter binds to
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum EntityCondition {
    Equals { field: String, value: ConditionValue },
    Preset { name: String, args: Vec<String> },
}

impl EntityCondition {
    pub fn parse(declaration: &Value) -> Result<Self> {
        if let Some(preset) = declaration.get("Preset") {
            let name = preset
                .as_str()
                .ok_or_else(|| GenError::malformed("condition", "'Preset' must be a name"))?;
            let args = declaration
                .get("Args")
                .and_then(Value::as_array)
                .map(|args| {
                    args.iter()
                        .map(|a| a.as_str().map(String::from).unwrap_or_else(|| a.to_string()))
                        .collect()
                })
                .unwrap_or_default();
            return Ok(EntityCondition::Preset {
                name: name.to_string(),
                args,
            });
        }

        let field = required_str(declaration, "Field", "condition")?;
        let value = declaration
            .get("Value")
            .ok_or_else(|| GenError::malformed(format!("condition on '{}'", field), "required key 'Value' is missing"))?;
        let value = match value {
            Value::String(s) if s.contains("::") => ConditionValue::Symbolic(s.clone()),
            other => ConditionValue::Literal(other.clone()),
        };
        Ok(EntityCondition::Equals {
            field: field.to_string(),
            value,
        })
    }

    /// Parse the list under `Conditions`
    pub fn parse_list(declaration: &Value, context: &str) -> Result<Vec<Self>> {
        optional_list(declaration, "Conditions", context)?
            .iter()
            .map(Self::parse)
            .collect()
    }
}

/// A schema field read from a backing entity field
#[derive(Debug, Clone, Serialize)]
pub struct EntityField {
    pub name: String,
    pub source_field: String,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
    pub getter: GetterStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EntityField {
    pub fn build(ctx: &mut GenContext, scope: &BuildScope<'_>, declaration: &Value) -> Result<Self> {
        let name = required_str(declaration, "Name", "entity field")?;
        let source_field = required_str(declaration, "SourceField", &format!("entity field '{}'", name))?;

        let binding = FieldBinding::locate(scope.owner, scope.spec, name)?;
        let semantic_type = ctx
            .resolver()
            .property_type(&binding.fragment, Some(scope.context()))?;
        let getter = match semantic_type {
            SemanticType::Enum => GetterStrategy::EntityEnumField(
                referenced_type_name(&binding.fragment).unwrap_or_else(|| name.to_string()),
            ),
            SemanticType::Array => {
                GetterStrategy::ListField(Box::new(element_getter(ctx, scope, &binding.fragment)?))
            }
            _ => GetterStrategy::ScalarField,
        };
        let description = binding.description(ctx, scope.context())?;

        Ok(Self {
            name: name.to_string(),
            source_field: source_field.to_string(),
            semantic_type,
            getter,
            description,
        })
    }
}

/// Getter of an array's elements, resolved through `items`.
///
/// Without an enclosing global context the array's own target document is
/// used.
fn element_getter(ctx: &mut GenContext, scope: &BuildScope<'_>, fragment: &Value) -> Result<GetterStrategy> {
    let context = match scope.global {
        Some(global) => Arc::clone(global),
        None => ctx.resolver().resolve_global(fragment, Some(scope.spec), true)?,
    };
    let array = ctx
        .resolver()
        .resolve_property(fragment, Some(&context), true)?
        .unwrap_or_else(|| fragment.clone());

    let items = array
        .get("items")
        .or_else(|| fragment.get("items"))
        .cloned()
        .unwrap_or(Value::Null);
    let items = match items {
        Value::Array(list) => list.into_iter().next().unwrap_or(Value::Null),
        other => other,
    };

    let element_type = ctx.resolver().property_type(&items, Some(&context))?;
    Ok(GetterStrategy::for_type(&element_type, referenced_type_name(&items)))
}

/// A backing entity with the fields read from it
#[derive(Debug, Clone, Serialize)]
pub struct EntitySource {
    pub source: String,
    pub name: String,
    pub classname: String,
    pub conditions: Vec<EntityCondition>,
    pub fields: Vec<EntityField>,
}

impl EntitySource {
    pub fn build(ctx: &mut GenContext, scope: &BuildScope<'_>, declaration: &Value) -> Result<Self> {
        let source = required_str(declaration, "Source", "Entity property")?;
        let name = optional_str(declaration, "Name").unwrap_or(source);
        let context = format!("entity '{}' of {}", name, scope.owner);

        let conditions = EntityCondition::parse_list(declaration, &context)?;
        let mut fields = Vec::new();
        for field in optional_list(declaration, "Fields", &context)? {
            fields.push(EntityField::build(ctx, scope, field)?);
        }

        Ok(Self {
            source: source.to_string(),
            name: name.to_string(),
            classname: format!("{}EntityGetter", name),
            conditions,
            fields,
        })
    }
}
