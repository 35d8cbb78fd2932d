//! Property model
//!
//! A node declaration lists its properties per kind:
//!
//! ```yaml
//! Properties:
//!   Static:
//!     - Name: Name
//!       Value: Chassis
//!   Entity:
//!     - Source: ChassisEntity
//!       Fields:
//!         - Name: PowerState
//!           SourceField: power_state
//!   Fragments:
//!     - Name: Status
//!       Static: [...]
//! ```
//!
//! Each entry is bound to its fragment in the owning schema, resolved
//! through [`crate::resolver`] and given a semantic type and a getter
//! strategy for the renderer.

mod annotation;
mod enums;
mod fragment;
mod link;
mod scalar;

pub use annotation::{Annotation, AnnotationKind};
pub use enums::{EnumDefinition, EnumMapping};
pub use fragment::{Collection, FragmentGroup, OemFragment};
pub use link::{Link, LinkParameter};
pub use scalar::{ConditionValue, EntityCondition, EntityField, EntitySource, StaticProperty};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::resolver::SemanticType;

// =============================================================================
// Kinds
// =============================================================================

/// Declaration key of a property collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PropertyKind {
    Static,
    Entity,
    Fragments,
    Collection,
    Enums,
    Oem,
    Links,
    Annotations,
    RelatedItems,
}

/// Kinds a node declaration may carry
pub const NODE_KINDS: [PropertyKind; 9] = [
    PropertyKind::Static,
    PropertyKind::Entity,
    PropertyKind::Fragments,
    PropertyKind::Collection,
    PropertyKind::Enums,
    PropertyKind::Oem,
    PropertyKind::Links,
    PropertyKind::Annotations,
    PropertyKind::RelatedItems,
];

/// Kinds a fragment group (and its Collection / Oem variants) may carry
pub const FRAGMENT_KINDS: [PropertyKind; 8] = [
    PropertyKind::Static,
    PropertyKind::Entity,
    PropertyKind::Collection,
    PropertyKind::Annotations,
    PropertyKind::Fragments,
    PropertyKind::Enums,
    PropertyKind::RelatedItems,
    PropertyKind::Oem,
];

impl PropertyKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Static" => Some(PropertyKind::Static),
            "Entity" => Some(PropertyKind::Entity),
            "Fragments" => Some(PropertyKind::Fragments),
            "Collection" => Some(PropertyKind::Collection),
            "Enums" => Some(PropertyKind::Enums),
            "Oem" => Some(PropertyKind::Oem),
            "Links" => Some(PropertyKind::Links),
            "Annotations" => Some(PropertyKind::Annotations),
            "RelatedItems" => Some(PropertyKind::RelatedItems),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            PropertyKind::Static => "Static",
            PropertyKind::Entity => "Entity",
            PropertyKind::Fragments => "Fragments",
            PropertyKind::Collection => "Collection",
            PropertyKind::Enums => "Enums",
            PropertyKind::Oem => "Oem",
            PropertyKind::Links => "Links",
            PropertyKind::Annotations => "Annotations",
            PropertyKind::RelatedItems => "RelatedItems",
        }
    }
}

// =============================================================================
// Getter strategies
// =============================================================================

/// How the renderer reads a property at runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetterStrategy {
    Bool,
    Decimal,
    Float,
    String,
    Array,
    /// Typed enum getter, carrying the enum type name
    Enum(String),
    Null,
    /// Enum field of a backing entity
    EntityEnumField(String),
    /// List field of a backing entity, with the element getter
    ListField(Box<GetterStrategy>),
    ScalarField,
    LinkObject,
    LinkCollection,
    ODataId,
    /// Size of the named collection
    CollectionSize(String),
}

impl GetterStrategy {
    /// Plain getter for a semantic type; unknown types read as strings.
    pub fn for_type(semantic_type: &SemanticType, enum_name: Option<String>) -> Self {
        match semantic_type {
            SemanticType::Boolean => GetterStrategy::Bool,
            SemanticType::Integer => GetterStrategy::Decimal,
            SemanticType::Number => GetterStrategy::Float,
            SemanticType::Array => GetterStrategy::Array,
            SemanticType::Enum => GetterStrategy::Enum(enum_name.unwrap_or_default()),
            _ => GetterStrategy::String,
        }
    }
}

impl fmt::Display for GetterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GetterStrategy::Bool => write!(f, "BoolGetter"),
            GetterStrategy::Decimal => write!(f, "DecimalGetter"),
            GetterStrategy::Float => write!(f, "FloatGetter"),
            GetterStrategy::String => write!(f, "StringGetter"),
            GetterStrategy::Array => write!(f, "ArrayGetter"),
            GetterStrategy::Enum(name) => write!(f, "{}Enum", name),
            GetterStrategy::Null => write!(f, "NullGetter"),
            GetterStrategy::EntityEnumField(name) => write!(f, "EntityEnumFieldGetter<{}Enum>", name),
            GetterStrategy::ListField(element) => write!(f, "ListFieldGetter<{}>", element),
            GetterStrategy::ScalarField => write!(f, "ScalarFieldGetter"),
            GetterStrategy::LinkObject => write!(f, "LinkObjectGetter"),
            GetterStrategy::LinkCollection => write!(f, "LinkCollectionGetter"),
            GetterStrategy::ODataId => write!(f, "ODataIdGetter"),
            GetterStrategy::CollectionSize(field) => write!(f, "CollectionSizeAnnotation<{}>", field),
        }
    }
}

impl Serialize for GetterStrategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// Binding
// =============================================================================

/// Where a set of properties is being built
#[derive(Debug, Clone, Copy)]
pub struct BuildScope<'s> {
    /// Definition name owning the properties (schema id or parent fragment)
    pub owner: &'s str,
    /// Schema (or resolved fragment) the properties are declared in
    pub spec: &'s Arc<Value>,
    /// Enclosing document references are resolved against, if not `spec`
    pub global: Option<&'s Arc<Value>>,
}

impl<'s> BuildScope<'s> {
    pub fn new(owner: &'s str, spec: &'s Arc<Value>, global: Option<&'s Arc<Value>>) -> Self {
        Self { owner, spec, global }
    }

    /// Document references are resolved against
    pub fn context(&self) -> &'s Arc<Value> {
        self.global.unwrap_or(self.spec)
    }
}

/// A declared field located in its owner's schema
#[derive(Debug, Clone)]
pub struct FieldBinding {
    pub field: String,
    pub fragment: Value,
}

impl FieldBinding {
    /// Locate `field` of `owner` in `spec`.
    ///
    /// The owner is `definitions[owner]`, or `spec` itself when it directly
    /// holds `properties`. For a union owner the last alternative holding
    /// `properties` (or the field) is used.
    pub fn locate(owner: &str, spec: &Value, field: &str) -> Result<Self> {
        let target = if spec.get(owner).is_some() {
            spec
        } else if let Some(definitions) = spec.get("definitions") {
            definitions.get(owner).ok_or_else(|| {
                GenError::corrupted(owner, format!("definition of '{}' is missing", owner))
            })?
        } else if spec.get("properties").is_some() {
            spec
        } else {
            return Err(GenError::corrupted(
                owner,
                "neither definitions nor properties are declared",
            ));
        };

        let target = target
            .get("anyOf")
            .and_then(Value::as_array)
            .and_then(|alternatives| {
                alternatives
                    .iter()
                    .filter(|alt| alt.get("properties").is_some() || alt.get(field).is_some())
                    .last()
            })
            .unwrap_or(target);

        let fragment = target
            .get(field)
            .or_else(|| target.get("properties").and_then(|p| p.get(field)))
            .ok_or_else(|| {
                GenError::malformed(
                    format!("property '{}' of {}", field, owner),
                    "field is not declared in the schema",
                )
            })?;

        Ok(Self {
            field: field.to_string(),
            fragment: fragment.clone(),
        })
    }

    /// Description of the field, from the fragment or its resolved target
    pub fn description(&self, ctx: &mut GenContext, context: &Arc<Value>) -> Result<Option<String>> {
        if let Some(description) = self.fragment.get("description").and_then(Value::as_str) {
            return Ok(Some(description.to_string()));
        }
        let resolved = ctx
            .resolver()
            .resolve_property(&self.fragment, Some(context), true)?;
        Ok(resolved
            .as_ref()
            .and_then(|r| r.get("description"))
            .and_then(Value::as_str)
            .map(String::from))
    }
}

// =============================================================================
// Declaration access
// =============================================================================

pub(crate) fn required_str<'v>(declaration: &'v Value, key: &str, context: &str) -> Result<&'v str> {
    declaration
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| GenError::malformed(context, format!("required key '{}' is missing", key)))
}

pub(crate) fn optional_str<'v>(declaration: &'v Value, key: &str) -> Option<&'v str> {
    declaration.get(key).and_then(Value::as_str)
}

/// List under `key`; absent means empty, any other shape is malformed.
pub(crate) fn optional_list<'v>(declaration: &'v Value, key: &str, context: &str) -> Result<&'v [Value]> {
    match declaration.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(GenError::malformed(context, format!("'{}' must be a list", key))),
    }
}

/// Scalar declaration value rendered as text (`1.7.6`, `true`, `Foo`)
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// =============================================================================
// Properties
// =============================================================================

/// One declared property
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Property {
    Static(StaticProperty),
    Entity(EntitySource),
    Fragments(FragmentGroup),
    Collection(Collection),
    Enums(EnumDefinition),
    Oem(OemFragment),
    Links(Link),
    Annotations(Annotation),
    RelatedItems(Link),
}

impl Property {
    /// One property per entry under `declaration[kind]`; an absent kind
    /// yields nothing.
    pub fn build(
        ctx: &mut GenContext,
        kind: PropertyKind,
        scope: &BuildScope<'_>,
        declaration: &Value,
    ) -> Result<Vec<Property>> {
        let context = format!("{} of {}", kind.tag(), scope.owner);
        let entries = optional_list(declaration, kind.tag(), &context)?;
        let mut properties = Vec::with_capacity(entries.len());
        for entry in entries {
            if !entry.is_object() {
                return Err(GenError::malformed(&context, "each entry must be a mapping"));
            }
            properties.push(Self::build_one(ctx, kind, scope, entry)?);
        }
        Ok(properties)
    }

    fn build_one(
        ctx: &mut GenContext,
        kind: PropertyKind,
        scope: &BuildScope<'_>,
        entry: &Value,
    ) -> Result<Property> {
        Ok(match kind {
            PropertyKind::Static => Property::Static(StaticProperty::build(ctx, scope, entry)?),
            PropertyKind::Entity => Property::Entity(EntitySource::build(ctx, scope, entry)?),
            PropertyKind::Fragments => Property::Fragments(FragmentGroup::build(ctx, scope, entry)?),
            PropertyKind::Collection => Property::Collection(Collection::build(ctx, scope, entry)?),
            PropertyKind::Enums => Property::Enums(EnumDefinition::build(ctx, scope, entry)?),
            PropertyKind::Oem => Property::Oem(OemFragment::build(ctx, scope, entry)?),
            PropertyKind::Links => Property::Links(Link::build(ctx, scope, entry)?),
            PropertyKind::Annotations => Property::Annotations(Annotation::parse(entry)?),
            PropertyKind::RelatedItems => {
                Property::RelatedItems(Link::build_related_item(scope, entry)?)
            }
        })
    }

    pub fn kind(&self) -> PropertyKind {
        match self {
            Property::Static(_) => PropertyKind::Static,
            Property::Entity(_) => PropertyKind::Entity,
            Property::Fragments(_) => PropertyKind::Fragments,
            Property::Collection(_) => PropertyKind::Collection,
            Property::Enums(_) => PropertyKind::Enums,
            Property::Oem(_) => PropertyKind::Oem,
            Property::Links(_) => PropertyKind::Links,
            Property::Annotations(_) => PropertyKind::Annotations,
            Property::RelatedItems(_) => PropertyKind::RelatedItems,
        }
    }
}

/// Properties of one owner, grouped by kind in declaration order
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct PropertySet(BTreeMap<PropertyKind, Vec<Property>>);

impl PropertySet {
    /// Build every kind in `kinds` from `declaration`.
    ///
    /// Keys that name no known kind contribute nothing.
    pub fn build(
        ctx: &mut GenContext,
        kinds: &[PropertyKind],
        scope: &BuildScope<'_>,
        declaration: &Value,
    ) -> Result<Self> {
        let mut set = BTreeMap::new();
        for kind in kinds {
            let properties = Property::build(ctx, *kind, scope, declaration)?;
            if !properties.is_empty() {
                set.insert(*kind, properties);
            }
        }
        Ok(Self(set))
    }

    /// Build a node's `Properties` mapping, where every key should be a kind.
    pub fn build_node(ctx: &mut GenContext, scope: &BuildScope<'_>, declaration: &Value) -> Result<Self> {
        if let Some(map) = declaration.as_object() {
            for key in map.keys().filter(|k| PropertyKind::from_tag(k).is_none()) {
                debug!("Ignoring unknown property kind '{}' of {}", key, scope.owner);
            }
        }
        Self::build(ctx, &NODE_KINDS, scope, declaration)
    }

    pub fn get(&self, kind: PropertyKind) -> &[Property] {
        self.0.get(&kind).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.0.values().flatten()
    }

    /// Extension names, for the aggregate `OemGetter<...>`
    pub fn oem_names(&self) -> Vec<&str> {
        self.get(PropertyKind::Oem)
            .iter()
            .filter_map(|p| match p {
                Property::Oem(oem) => Some(oem.name.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_tags_round_trip() {
        for kind in NODE_KINDS {
            assert_eq!(PropertyKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(PropertyKind::from_tag("Widgets"), None);
        assert!(!FRAGMENT_KINDS.contains(&PropertyKind::Links));
    }

    #[test]
    fn test_getter_names() {
        assert_eq!(GetterStrategy::for_type(&SemanticType::Integer, None).to_string(), "DecimalGetter");
        assert_eq!(
            GetterStrategy::for_type(&SemanticType::Enum, Some("PowerState".into())).to_string(),
            "PowerStateEnum"
        );
        assert_eq!(
            GetterStrategy::ListField(Box::new(GetterStrategy::String)).to_string(),
            "ListFieldGetter<StringGetter>"
        );
        assert_eq!(
            GetterStrategy::EntityEnumField("IndicatorLED".into()).to_string(),
            "EntityEnumFieldGetter<IndicatorLEDEnum>"
        );
        assert_eq!(GetterStrategy::for_type(&SemanticType::Unrecognized, None), GetterStrategy::String);
    }

    #[test]
    fn test_locate_in_definitions() {
        let spec = json!({"definitions": {"Chassis": {"properties": {"AssetTag": {"type": "string"}}}}});
        let binding = FieldBinding::locate("Chassis", &spec, "AssetTag").unwrap();
        assert_eq!(binding.fragment, json!({"type": "string"}));
    }

    #[test]
    fn test_locate_prefers_last_union_alternative() {
        let spec = json!({"definitions": {"Power": {"anyOf": [
            {"properties": {"Voltage": {"type": "integer"}}},
            {"properties": {"Voltage": {"type": "number"}}},
            {"type": "null"}
        ]}}});
        let binding = FieldBinding::locate("Power", &spec, "Voltage").unwrap();
        assert_eq!(binding.fragment, json!({"type": "number"}));
    }

    #[test]
    fn test_locate_in_resolved_fragment() {
        let spec = json!({"type": "object", "properties": {"Health": {"$ref": "#/definitions/Health"}}});
        assert!(FieldBinding::locate("Status", &spec, "Health").is_ok());
        let err = FieldBinding::locate("Status", &spec, "State").unwrap_err();
        assert!(matches!(err, GenError::MalformedDeclaration { .. }));
    }

    #[test]
    fn test_optional_list_shapes() {
        let decl = json!({"Static": [{"Name": "A"}], "Entity": "oops"});
        assert_eq!(optional_list(&decl, "Static", "t").unwrap().len(), 1);
        assert!(optional_list(&decl, "Links", "t").unwrap().is_empty());
        assert!(optional_list(&decl, "Entity", "t").is_err());
    }
}
