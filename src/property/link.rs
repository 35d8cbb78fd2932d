//! Links to other resources and related items

use serde::Serialize;
use serde_json::Value;

use super::{optional_list, optional_str, required_str, BuildScope, EntityCondition, GetterStrategy};
use crate::context::GenContext;
use crate::error::{GenError, Result};

/// Field related items are bound to
const RELATED_ITEM_FIELD: &str = "RelatedItem";
const DEFAULT_LINK_FIELD: &str = "Links";

/// Placeholder value of a link template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkParameter {
    pub id: String,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    pub from_context: bool,
    pub conditions: Vec<EntityCondition>,
}

impl LinkParameter {
    pub fn parse(declaration: &Value, link: &str) -> Result<Self> {
        let context = format!("parameter of link '{}'", link);
        let id = required_str(declaration, "Id", &context)?;
        let field = required_str(declaration, "Field", &context)?;
        Ok(Self {
            id: id.to_string(),
            field: field.to_string(),
            entity: optional_str(declaration, "Entity").map(String::from),
            from_context: declaration
                .get("FromContext")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            conditions: EntityCondition::parse_list(declaration, &context)?,
        })
    }
}

/// Link to another resource, singular or a collection
#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Schema field holding the link
    pub field: String,
    pub classname: String,
    pub getter: GetterStrategy,
    /// Reference of the linked resource type
    pub target: String,
    pub parameters: Vec<LinkParameter>,
}

impl Link {
    /// A link under `definitions[Field].properties[Name]`, with its template
    /// checked against the target schema's URIs.
    pub fn build(ctx: &mut GenContext, scope: &BuildScope<'_>, declaration: &Value) -> Result<Self> {
        let name = required_str(declaration, "Name", &format!("Links of {}", scope.owner))?;
        let context = format!("link '{}' of {}", name, scope.owner);
        let template = required_str(declaration, "Template", &context)?;
        let field = optional_str(declaration, "Field").unwrap_or(DEFAULT_LINK_FIELD);
        let prefix = optional_str(declaration, "Classname").unwrap_or_default();

        let link_spec = scope
            .spec
            .get("definitions")
            .and_then(|d| d.get(field))
            .and_then(|f| f.get("properties"))
            .and_then(|p| p.get(name))
            .ok_or_else(|| GenError::malformed(&context, format!("'{}' is not declared under '{}'", name, field)))?;

        let mut link = Self::bind(name, field, link_spec, declaration, &context)?;
        link.template = Some(template.to_string());
        link.classname = format!("{}{}Links", prefix, name);

        let target = ctx
            .resolver()
            .resolve_property(link_spec, Some(scope.spec), false)?
            .ok_or_else(|| GenError::UnresolvedFragment(link.target.clone()))?;
        let listed = target
            .get("uris")
            .and_then(Value::as_array)
            .is_some_and(|uris| uris.iter().any(|uri| uri.as_str() == Some(template)));
        if !listed {
            return Err(GenError::InvalidLinkTemplate {
                template: template.to_string(),
                link: name.to_string(),
            });
        }
        Ok(link)
    }

    /// A link bound to the owner's `RelatedItem` field. Templates are not
    /// checked.
    pub fn build_related_item(scope: &BuildScope<'_>, declaration: &Value) -> Result<Self> {
        let name = required_str(declaration, "Name", &format!("RelatedItems of {}", scope.owner))?;
        let context = format!("related item '{}' of {}", name, scope.owner);

        let owner = match scope.spec.get("definitions") {
            Some(definitions) => definitions.get(scope.owner),
            None => Some(&**scope.spec),
        };
        let link_spec = owner
            .and_then(|o| o.get("properties"))
            .and_then(|p| p.get(RELATED_ITEM_FIELD))
            .ok_or_else(|| {
                GenError::malformed(&context, format!("'{}' is not declared", RELATED_ITEM_FIELD))
            })?;

        let mut link = Self::bind(name, RELATED_ITEM_FIELD, link_spec, declaration, &context)?;
        link.template = optional_str(declaration, "Template").map(String::from);
        link.classname = format!("{}Reference", name);
        Ok(link)
    }

    fn bind(name: &str, field: &str, link_spec: &Value, declaration: &Value, context: &str) -> Result<Self> {
        let (getter, reference_holder) = match link_spec.get("items") {
            Some(items) => (GetterStrategy::LinkCollection, items),
            None => (GetterStrategy::LinkObject, link_spec),
        };
        let target = reference_holder
            .get("$ref")
            .and_then(Value::as_str)
            .ok_or_else(|| GenError::malformed(context, "linked field carries no reference"))?;

        let parameters = optional_list(declaration, "Parameters", context)?
            .iter()
            .map(|p| LinkParameter::parse(p, name))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            template: None,
            field: field.to_string(),
            classname: String::new(),
            getter,
            target: target.to_string(),
            parameters,
        })
    }

    pub fn is_parameterized(&self) -> bool {
        !self.parameters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bind_singular_and_collection() {
        let decl = json!({"Name": "ManagedBy"});
        let single = Link::bind("Chassis", "Links", &json!({"$ref": "Chassis.json#/definitions/Chassis"}), &decl, "t").unwrap();
        assert_eq!(single.getter, GetterStrategy::LinkObject);

        let many = Link::bind(
            "ManagedBy",
            "Links",
            &json!({"items": {"$ref": "Manager.json#/definitions/Manager"}, "type": "array"}),
            &decl,
            "t",
        )
        .unwrap();
        assert_eq!(many.getter, GetterStrategy::LinkCollection);
        assert_eq!(many.target, "Manager.json#/definitions/Manager");
    }

    #[test]
    fn test_bind_requires_reference() {
        let err = Link::bind("Oops", "Links", &json!({"type": "string"}), &json!({}), "t").unwrap_err();
        assert!(matches!(err, GenError::MalformedDeclaration { .. }));
    }

    #[test]
    fn test_related_item_binding() {
        let spec = std::sync::Arc::new(json!({"definitions": {"Sensor": {"properties": {
            "RelatedItem": {"type": "array", "items": {"$ref": "http://redfish.dmtf.org/schemas/v1/odata-v4.json#/definitions/idRef"}}
        }}}}));
        let scope = BuildScope::new("Sensor", &spec, None);
        let link = Link::build_related_item(&scope, &json!({"Name": "Chassis"})).unwrap();
        assert_eq!(link.classname, "ChassisReference");
        assert_eq!(link.field, RELATED_ITEM_FIELD);
        assert_eq!(link.getter, GetterStrategy::LinkCollection);
        assert!(link.template.is_none());

        let bare = std::sync::Arc::new(json!({"definitions": {"Sensor": {"properties": {}}}}));
        let scope = BuildScope::new("Sensor", &bare, None);
        assert!(Link::build_related_item(&scope, &json!({"Name": "Chassis"})).is_err());
    }

    #[test]
    fn test_parameters() {
        let decl = json!({"Parameters": [
            {"Id": "ManagerId", "Field": "id", "FromContext": true},
            {"Id": "ChassisId", "Field": "name", "Entity": "ChassisEntity",
             "Conditions": [{"Field": "type", "Value": "ChassisType::Rack"}]}
        ]});
        let link = Link::bind("ManagedBy", "Links", &json!({"$ref": "Manager.json#/definitions/Manager"}), &decl, "t").unwrap();
        assert!(link.is_parameterized());
        assert!(link.parameters[0].from_context);
        assert_eq!(link.parameters[1].entity.as_deref(), Some("ChassisEntity"));
        assert_eq!(link.parameters[1].conditions.len(), 1);
    }
}
