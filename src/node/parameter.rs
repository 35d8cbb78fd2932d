//! Runtime-bound URI parameter of a dynamic node

use serde::Serialize;
use serde_json::Value;

use crate::error::{GenError, Result};
use crate::property::EntityCondition;

/// Value source of a `{Parameter}` placeholder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum NodeParameter {
    /// Fixed value
    Static { name: String, value: Value },
    /// One instance per matching backing entity
    Entity {
        name: String,
        source: String,
        conditions: Vec<EntityCondition>,
    },
}

impl NodeParameter {
    pub fn parse(declaration: &Value, node: &str) -> Result<Self> {
        let context = format!("parameter of node '{}'", node);
        let field = |key: &str| {
            declaration
                .get(key)
                .and_then(Value::as_str)
                .ok_or_else(|| GenError::malformed(&context, format!("required key '{}' is missing", key)))
        };

        let name = field("Parameter")?.to_string();
        match field("Type")? {
            "Static" => Ok(NodeParameter::Static {
                name,
                value: declaration.get("Value").cloned().unwrap_or(Value::Null),
            }),
            "Entity" => Ok(NodeParameter::Entity {
                name,
                source: field("Source")?.to_string(),
                conditions: EntityCondition::parse_list(declaration, &context)?,
            }),
            other => Err(GenError::malformed(
                &context,
                format!("unknown parameter type '{}'", other),
            )),
        }
    }

    /// Placeholder name, as written between braces in the node id
    pub fn name(&self) -> &str {
        match self {
            NodeParameter::Static { name, .. } | NodeParameter::Entity { name, .. } => name,
        }
    }

    pub fn placeholder(&self) -> String {
        format!("{{{}}}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_static_and_entity() {
        let fixed = NodeParameter::parse(
            &json!({"Type": "Static", "Parameter": "ManagerId", "Value": "bmc"}),
            "Manager",
        )
        .unwrap();
        assert_eq!(fixed.placeholder(), "{ManagerId}");

        let entity = NodeParameter::parse(
            &json!({"Type": "Entity", "Parameter": "ChassisId", "Source": "ChassisEntity",
                    "Conditions": [{"Field": "type", "Value": "ChassisType::Rack"}]}),
            "Chassis",
        )
        .unwrap();
        match entity {
            NodeParameter::Entity { source, conditions, .. } => {
                assert_eq!(source, "ChassisEntity");
                assert_eq!(conditions.len(), 1);
            }
            other => panic!("unexpected parameter {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_fatal() {
        let err = NodeParameter::parse(&json!({"Type": "Sensor", "Parameter": "Id"}), "Thermal").unwrap_err();
        assert!(matches!(err, GenError::MalformedDeclaration { .. }));
    }
}
