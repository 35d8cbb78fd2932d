//! Fragment groups: nested objects, collections and vendor extensions
//!
//! A fragment group resolves a named sub-object of its owner and builds its
//! own per-kind properties against that sub-object.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::{required_str, scalar_text, BuildScope, EntitySource, PropertySet, FRAGMENT_KINDS};
use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::version::normalize_tag;

/// Named sub-object with its own properties
#[derive(Debug, Clone, Serialize)]
pub struct FragmentGroup {
    pub name: String,
    /// Definition owning the sub-object
    pub parent: String,
    pub properties: PropertySet,
}

impl FragmentGroup {
    pub fn build(ctx: &mut GenContext, scope: &BuildScope<'_>, declaration: &Value) -> Result<Self> {
        let name = required_str(declaration, "Name", &format!("Fragments of {}", scope.owner))?;
        Self::build_named(ctx, scope, declaration, name)
    }

    fn build_named(
        ctx: &mut GenContext,
        scope: &BuildScope<'_>,
        declaration: &Value,
        name: &str,
    ) -> Result<Self> {
        let global = scope.context();
        let property_spec = Arc::new(resolve_fragment(ctx, scope, global, name)?);

        let declared_in_global = global
            .get("definitions")
            .and_then(|d| d.get(name))
            .is_some();
        let global = if declared_in_global {
            Arc::clone(global)
        } else {
            resolve_fragment_global(ctx, scope, global, name)?
        };

        let inner = BuildScope::new(name, &property_spec, Some(&global));
        let properties = PropertySet::build(ctx, &FRAGMENT_KINDS, &inner, declaration)?;

        Ok(Self {
            name: name.to_string(),
            parent: scope.owner.to_string(),
            properties,
        })
    }
}

/// Owner object holding the fragment's `properties`: `definitions[owner]`
/// when present, its last union alternative for union owners.
fn owner_object<'v>(spec: &'v Value, owner: &str, name: &str) -> Result<(&'v Value, bool)> {
    let unresolved = || GenError::UnresolvedFragment(name.to_string());
    let mut object = spec;
    if let Some(definitions) = spec.get("definitions") {
        object = definitions.get(owner).ok_or_else(unresolved)?;
    }
    match object.get("anyOf").and_then(Value::as_array) {
        Some(alternatives) => Ok((alternatives.last().ok_or_else(unresolved)?, true)),
        None => Ok((object, false)),
    }
}

fn resolve_fragment(
    ctx: &mut GenContext,
    scope: &BuildScope<'_>,
    global: &Arc<Value>,
    name: &str,
) -> Result<Value> {
    let unresolved = || GenError::UnresolvedFragment(name.to_string());
    let (object, _) = owner_object(scope.spec, scope.owner, name)?;
    let fragment = object
        .get("properties")
        .and_then(|p| p.get(name))
        .ok_or_else(unresolved)?;
    ctx.resolver()
        .resolve_property(fragment, Some(global), true)?
        .ok_or_else(unresolved)
}

/// Document the fragment's own definitions live in. Union owners do not
/// fall back to the enclosing document.
fn resolve_fragment_global(
    ctx: &mut GenContext,
    scope: &BuildScope<'_>,
    global: &Arc<Value>,
    name: &str,
) -> Result<Arc<Value>> {
    let (object, from_union) = owner_object(scope.spec, scope.owner, name)?;
    let fragment = match object.get("properties") {
        Some(properties) => properties
            .get(name)
            .ok_or_else(|| GenError::UnresolvedFragment(name.to_string()))?,
        None => object,
    };
    ctx.resolver().resolve_global(fragment, Some(global), !from_union)
}

/// Collection of backing entities, each rendered as a fragment of the
/// collection's element type
#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub name: String,
    pub classname: String,
    pub source: EntitySource,
    pub element: FragmentGroup,
}

impl Collection {
    pub fn build(ctx: &mut GenContext, scope: &BuildScope<'_>, declaration: &Value) -> Result<Self> {
        let name = required_str(declaration, "Name", &format!("Collection of {}", scope.owner))?;
        let source = EntitySource::build(ctx, scope, declaration)?;
        let element = FragmentGroup::build_named(ctx, scope, declaration, name)?;
        Ok(Self {
            name: name.to_string(),
            classname: format!("{}CollectionGetter", name),
            source,
            element,
        })
    }
}

/// Vendor extension overlaying its owner with properties from a separately
/// versioned document
#[derive(Debug, Clone, Serialize)]
pub struct OemFragment {
    pub name: String,
    /// Normalized version tag, e.g. `v1_0_0`
    pub version: String,
    pub parent: String,
    /// `#<Name>.v<version>.<parent>`
    pub type_tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owning_entity: Option<String>,
    pub properties: PropertySet,
}

impl OemFragment {
    pub fn build(ctx: &mut GenContext, scope: &BuildScope<'_>, declaration: &Value) -> Result<Self> {
        let name = required_str(declaration, "Name", &format!("Oem of {}", scope.owner))?;
        let version = declaration
            .get("Version")
            .and_then(scalar_text)
            .ok_or_else(|| {
                GenError::malformed(format!("Oem '{}'", name), "required key 'Version' is missing")
            })?;
        let tag = normalize_tag(&version);

        let document = ctx
            .store
            .load_extension(name, &tag)?
            .ok_or_else(|| GenError::MissingDocument {
                path: ctx.store.extension_path(name, &tag),
                suggestion: None,
            })?;

        let parent = scope.owner;
        let fragment = document
            .get("definitions")
            .and_then(|d| d.get(parent))
            .ok_or_else(|| GenError::UnresolvedFragment(name.to_string()))?;
        let property_spec = ctx
            .resolver()
            .resolve_property(fragment, Some(&document), true)?
            .ok_or_else(|| GenError::UnresolvedFragment(name.to_string()))?;
        let property_spec = Arc::new(property_spec);

        let inner = BuildScope::new(parent, &property_spec, Some(&document));
        let properties = PropertySet::build(ctx, &FRAGMENT_KINDS, &inner, declaration)?;

        Ok(Self {
            name: name.to_string(),
            type_tag: format!("#{}.{}.{}", name, tag, parent),
            version: tag,
            parent: parent.to_string(),
            owning_entity: document
                .get("owningEntity")
                .and_then(Value::as_str)
                .map(String::from),
            properties,
        })
    }
}
