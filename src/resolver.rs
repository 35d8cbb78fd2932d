//! Reference resolution
//!
//! Chases `$ref` indirections (direct, `anyOf` union, `items`) across
//! documents. Every chase is bounded by a hop limit and a visited set over
//! (document, path); when either trips the resolution fails closed instead
//! of looping.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::registry::SchemaRegistry;
use crate::schema::{walk_pointer, SchemaRef};
use crate::store::DocumentStore;

/// Semantic type of a resolved fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticType {
    Boolean,
    Integer,
    Number,
    String,
    Enum,
    Array,
    Object,
    Unrecognized,
    /// Any other declared type (e.g. `null`)
    Other(String),
}

impl SemanticType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "boolean" => SemanticType::Boolean,
            "integer" => SemanticType::Integer,
            "number" => SemanticType::Number,
            "string" => SemanticType::String,
            "enum" => SemanticType::Enum,
            "array" => SemanticType::Array,
            "object" => SemanticType::Object,
            "unrecognized" => SemanticType::Unrecognized,
            other => SemanticType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SemanticType::Boolean => "boolean",
            SemanticType::Integer => "integer",
            SemanticType::Number => "number",
            SemanticType::String => "string",
            SemanticType::Enum => "enum",
            SemanticType::Array => "array",
            SemanticType::Object => "object",
            SemanticType::Unrecognized => "unrecognized",
            SemanticType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SemanticType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Reference carried by a fragment.
///
/// For a union the **last** alternative carrying a `$ref` wins. Otherwise
/// the fragment's own `$ref`, then its `items`.
pub fn retrieve_ref(fragment: &Value) -> Option<&str> {
    if let Some(alternatives) = fragment.get("anyOf").and_then(Value::as_array) {
        return alternatives
            .iter()
            .filter_map(|alt| alt.get("$ref").and_then(Value::as_str))
            .last();
    }
    if let Some(reference) = fragment.get("$ref").and_then(Value::as_str) {
        return Some(reference);
    }
    fragment.get("items").and_then(retrieve_ref)
}

/// Declared type of a fragment, if it has one.
pub fn resolve_type(fragment: &Value) -> Option<SemanticType> {
    match fragment.get("type")? {
        Value::String(tag) if tag == "string" && fragment.get("enum").is_some() => {
            Some(SemanticType::Enum)
        }
        Value::String(tag) => Some(SemanticType::from_tag(tag)),
        Value::Array(tags) => tags.first().and_then(Value::as_str).map(SemanticType::from_tag),
        _ => None,
    }
}

/// Name of the type a fragment refers to (last path segment of its reference)
pub fn referenced_type_name(fragment: &Value) -> Option<String> {
    let raw = retrieve_ref(fragment)?;
    SchemaRef::parse(raw)
        .ok()
        .and_then(|r| r.last_segment().map(String::from))
}

/// Visited-set key: the document a path is walked in, and the path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HopKey {
    document: Option<String>,
    pointer: Vec<String>,
}

impl HopKey {
    fn new(reference: &SchemaRef, context_stem: Option<&str>) -> Self {
        Self {
            document: reference.stem().or(context_stem).map(String::from),
            pointer: reference.pointer().to_vec(),
        }
    }
}

/// Resolves fragments against the documents of a run
pub struct Resolver<'a> {
    store: &'a mut DocumentStore,
    registry: &'a mut SchemaRegistry,
    max_hops: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a mut DocumentStore, registry: &'a mut SchemaRegistry, max_hops: usize) -> Self {
        Self {
            store,
            registry,
            max_hops,
        }
    }

    /// Document that holds the definitions a fragment's reference points into.
    ///
    /// Without a context the fragment itself is returned; without a reference
    /// the context is. When the first target document cannot be found the
    /// context is returned if `fallback_to_context`, the fragment otherwise.
    pub fn resolve_global(
        &mut self,
        fragment: &Value,
        context: Option<&Arc<Value>>,
        fallback_to_context: bool,
    ) -> Result<Arc<Value>> {
        let Some(context) = context else {
            return Ok(Arc::new(fragment.clone()));
        };
        let Some(raw) = retrieve_ref(fragment) else {
            return Ok(Arc::clone(context));
        };

        let mut reference = SchemaRef::parse(raw)?;
        let mut current = Arc::clone(context);
        let mut visited = HashSet::new();

        for hop in 0..self.max_hops {
            if !visited.insert(HopKey::new(&reference, None)) {
                warn!("Reference cycle at {}, keeping enclosing document", reference);
                return Ok(current);
            }

            let document = if reference.is_local() {
                None
            } else {
                self.store.reference_document(&reference)?
            };
            let Some(document) = document else {
                if hop == 0 && !fallback_to_context {
                    return Ok(Arc::new(fragment.clone()));
                }
                return Ok(current);
            };

            let next = walk_pointer(&document, reference.pointer(), false)
                .and_then(retrieve_ref)
                .map(SchemaRef::parse)
                .transpose()?;
            current = document;

            match next {
                Some(next) if !next.is_id_ref() && !next.is_local() => {
                    debug!("Chasing {} -> {}", reference, next);
                    reference = next;
                }
                _ => return Ok(current),
            }
        }

        warn!(
            "Reference hop limit ({}) reached at {}, keeping last document",
            self.max_hops, reference
        );
        Ok(current)
    }

    /// Property-level fragment a fragment's reference points at.
    ///
    /// A fragment without a reference (or resolved without a context) comes
    /// back unchanged. The first reference is always followed; with
    /// `recursive`, further references not ending in `/idRef` are chased as
    /// well. Returns `None` when a target cannot be located or the chase is
    /// cut by the cycle or hop guard.
    pub fn resolve_property(
        &mut self,
        fragment: &Value,
        context: Option<&Arc<Value>>,
        recursive: bool,
    ) -> Result<Option<Value>> {
        let Some(context) = context else {
            return Ok(Some(fragment.clone()));
        };

        let mut current = fragment.clone();
        let mut current_context = Arc::clone(context);
        let mut context_stem: Option<String> = None;
        let mut visited = HashSet::new();

        for hop in 0..self.max_hops {
            let Some(raw) = retrieve_ref(&current).map(String::from) else {
                return Ok(Some(current));
            };
            if hop > 0 && !recursive {
                return Ok(Some(current));
            }
            let reference = SchemaRef::parse(&raw)?;
            if hop > 0 && reference.is_id_ref() {
                return Ok(Some(current));
            }

            if !visited.insert(HopKey::new(&reference, context_stem.as_deref())) {
                warn!("Reference cycle at {}, property left unresolved", reference);
                return Ok(None);
            }

            let target = if reference.is_local() {
                Some(Arc::clone(&current_context))
            } else {
                self.store.reference_document(&reference)?
            };
            let Some(target) = target else {
                return Ok(if hop == 0 { None } else { Some(current) });
            };

            self.collect_dependencies(&reference, context_stem.as_deref(), &target)?;

            let Some(located) = walk_pointer(&target, reference.pointer(), true) else {
                debug!("Path of {} not found in target document", reference);
                return Ok(None);
            };
            current = located.clone();
            if let Some(stem) = reference.stem() {
                context_stem = Some(stem.to_string());
            }
            current_context = target;
        }

        warn!(
            "Reference hop limit ({}) reached, property left unresolved",
            self.max_hops
        );
        Ok(None)
    }

    /// Semantic type of a fragment, chasing references when it declares none.
    pub fn property_type(&mut self, fragment: &Value, context: Option<&Arc<Value>>) -> Result<SemanticType> {
        if let Some(declared) = resolve_type(fragment) {
            return Ok(declared);
        }
        let resolved = self.resolve_property(fragment, context, true)?;
        Ok(resolved
            .as_ref()
            .and_then(resolve_type)
            .unwrap_or(SemanticType::Unrecognized))
    }

    /// Feed the `definitions` of a walked document to the registry.
    fn collect_dependencies(
        &mut self,
        reference: &SchemaRef,
        context_stem: Option<&str>,
        document: &Value,
    ) -> Result<()> {
        let Some(definitions) = document.get("definitions") else {
            return Ok(());
        };
        let owner = reference
            .schema_id()
            .or_else(|| context_stem.map(|s| crate::version::split_versioned_stem(s).0));
        self.registry
            .extract_dependencies(owner, definitions, self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenConfig;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_schema(root: &Path, name: &str, doc: &Value) {
        let dir = root.join("assets/schemas/bundle/json-schema");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.json", name)), doc.to_string()).unwrap();
    }

    fn fixture() -> (tempfile::TempDir, DocumentStore, SchemaRegistry) {
        let dir = tempdir().unwrap();
        write_schema(
            dir.path(),
            "Resource",
            &json!({
                "definitions": {
                    "Status": {"$ref": "http://redfish.dmtf.org/schemas/v1/Resource.v1_1_0.json#/definitions/Status"},
                    "Id": {"type": "string"},
                    "Loop": {"$ref": "#/definitions/Loop"}
                }
            }),
        );
        write_schema(
            dir.path(),
            "Resource.v1_1_0",
            &json!({
                "definitions": {
                    "Status": {"type": "object", "properties": {"Health": {"$ref": "#/definitions/Health"}}},
                    "Health": {"type": "string", "enum": ["OK", "Warning", "Critical"]}
                }
            }),
        );
        let config = GenConfig::rooted(dir.path(), dir.path());
        let store = DocumentStore::new(&config);
        let registry = SchemaRegistry::new(&config);
        (dir, store, registry)
    }

    #[test]
    fn test_union_takes_last_alternative() {
        let fragment = json!({
            "anyOf": [
                {"$ref": "http://redfish.dmtf.org/schemas/v1/Power.v1_0_0.json#/definitions/Power"},
                {"$ref": "http://redfish.dmtf.org/schemas/v1/Power.v1_7_6.json#/definitions/Power"},
                {"type": "null"}
            ]
        });
        assert_eq!(
            retrieve_ref(&fragment),
            Some("http://redfish.dmtf.org/schemas/v1/Power.v1_7_6.json#/definitions/Power")
        );
    }

    #[test]
    fn test_retrieve_ref_descends_into_items() {
        let fragment = json!({"type": "array", "items": {"$ref": "#/definitions/Fan"}});
        assert_eq!(retrieve_ref(&fragment), Some("#/definitions/Fan"));
        assert_eq!(retrieve_ref(&json!({"type": "string"})), None);
    }

    #[test]
    fn test_resolve_type() {
        assert_eq!(resolve_type(&json!({"type": "string", "enum": ["A"]})), Some(SemanticType::Enum));
        assert_eq!(resolve_type(&json!({"type": ["integer", "null"]})), Some(SemanticType::Integer));
        assert_eq!(resolve_type(&json!({"type": "boolean"})), Some(SemanticType::Boolean));
        assert_eq!(resolve_type(&json!({"$ref": "#/x"})), None);
    }

    #[test]
    fn test_resolve_property_is_idempotent_on_concrete_fragment() {
        let (_dir, mut store, mut registry) = fixture();
        let mut resolver = Resolver::new(&mut store, &mut registry, 10);
        let context = Arc::new(json!({"definitions": {}}));
        let fragment = json!({"type": "integer", "readonly": true});
        let once = resolver.resolve_property(&fragment, Some(&context), true).unwrap().unwrap();
        let twice = resolver.resolve_property(&once, Some(&context), true).unwrap().unwrap();
        assert_eq!(once, fragment);
        assert_eq!(twice, fragment);
    }

    #[test]
    fn test_resolve_property_chases_across_documents() {
        let (_dir, mut store, mut registry) = fixture();
        let mut resolver = Resolver::new(&mut store, &mut registry, 10);
        let context = Arc::new(json!({}));
        let fragment = json!({"$ref": "http://redfish.dmtf.org/schemas/v1/Resource.json#/definitions/Status"});
        let resolved = resolver.resolve_property(&fragment, Some(&context), true).unwrap().unwrap();
        assert_eq!(resolved["type"], json!("object"));

        let shallow = resolver.resolve_property(&fragment, Some(&context), false).unwrap().unwrap();
        assert!(shallow.get("$ref").is_some());
    }

    #[test]
    fn test_local_reference_resolves_in_context() {
        let (_dir, mut store, mut registry) = fixture();
        let mut resolver = Resolver::new(&mut store, &mut registry, 10);
        let context = Arc::new(json!({"definitions": {"PowerState": {"type": "string", "enum": ["On", "Off"]}}}));
        let ty = resolver
            .property_type(&json!({"$ref": "#/definitions/PowerState"}), Some(&context))
            .unwrap();
        assert_eq!(ty, SemanticType::Enum);
    }

    #[test]
    fn test_self_reference_fails_closed() {
        let (_dir, mut store, mut registry) = fixture();
        let mut resolver = Resolver::new(&mut store, &mut registry, 10);
        let context = Arc::new(json!({}));
        let fragment = json!({"$ref": "http://redfish.dmtf.org/schemas/v1/Resource.json#/definitions/Loop"});
        let ty = resolver.property_type(&fragment, Some(&context)).unwrap();
        assert_eq!(ty, SemanticType::Unrecognized);
    }

    #[test]
    fn test_missing_document_is_soft() {
        let (_dir, mut store, mut registry) = fixture();
        let mut resolver = Resolver::new(&mut store, &mut registry, 10);
        let context = Arc::new(json!({"title": "ctx"}));
        let fragment = json!({"$ref": "http://redfish.dmtf.org/schemas/v1/Nowhere.json#/definitions/X"});
        assert_eq!(resolver.resolve_property(&fragment, Some(&context), true).unwrap(), None);
        let global = resolver.resolve_global(&fragment, Some(&context), true).unwrap();
        assert_eq!(global["title"], json!("ctx"));
        let no_fallback = resolver.resolve_global(&fragment, Some(&context), false).unwrap();
        assert_eq!(*no_fallback, fragment);
    }

    #[test]
    fn test_resolve_global_follows_to_versioned_document() {
        let (_dir, mut store, mut registry) = fixture();
        let mut resolver = Resolver::new(&mut store, &mut registry, 10);
        let context = Arc::new(json!({}));
        let fragment = json!({"$ref": "http://redfish.dmtf.org/schemas/v1/Resource.json#/definitions/Status"});
        let global = resolver.resolve_global(&fragment, Some(&context), true).unwrap();
        assert!(global["definitions"].get("Health").is_some());
    }

    fn write_chain(root: &Path) {
        let base = "http://redfish.dmtf.org/schemas/v1";
        write_schema(root, "A", &json!({"title": "A", "definitions": {"X": {"$ref": format!("{}/B.json#/definitions/Y", base)}}}));
        write_schema(root, "B", &json!({"title": "B", "definitions": {"Y": {"$ref": format!("{}/A.json#/definitions/X", base)}}}));
        write_schema(root, "C", &json!({"title": "C", "definitions": {"Z": {"$ref": format!("{}/D.json#/definitions/W", base)}}}));
        write_schema(root, "D", &json!({"title": "D", "definitions": {"W": {"$ref": format!("{}/E.json#/definitions/V", base)}}}));
        write_schema(root, "E", &json!({"title": "E", "definitions": {"V": {"type": "string"}}}));
    }

    #[test]
    fn test_resolve_global_stops_on_cross_document_cycle() {
        let (dir, mut store, mut registry) = fixture();
        write_chain(dir.path());
        let mut resolver = Resolver::new(&mut store, &mut registry, 10);
        let context = Arc::new(json!({"title": "ctx"}));
        let fragment = json!({"$ref": "http://redfish.dmtf.org/schemas/v1/A.json#/definitions/X"});

        let global = resolver.resolve_global(&fragment, Some(&context), true).unwrap();
        assert_eq!(global["title"], json!("B"));
        assert_eq!(
            resolver.property_type(&fragment, Some(&context)).unwrap(),
            SemanticType::Unrecognized
        );
    }

    #[test]
    fn test_resolve_global_stops_at_hop_bound() {
        let (dir, mut store, mut registry) = fixture();
        write_chain(dir.path());
        let context = Arc::new(json!({"title": "ctx"}));
        let fragment = json!({"$ref": "http://redfish.dmtf.org/schemas/v1/C.json#/definitions/Z"});

        let mut bounded = Resolver::new(&mut store, &mut registry, 2);
        let global = bounded.resolve_global(&fragment, Some(&context), true).unwrap();
        assert_eq!(global["title"], json!("D"));

        let mut unbounded = Resolver::new(&mut store, &mut registry, 10);
        let global = unbounded.resolve_global(&fragment, Some(&context), true).unwrap();
        assert_eq!(global["title"], json!("E"));
    }

    #[test]
    fn test_walked_definitions_register_dependencies() {
        let (_dir, mut store, mut registry) = fixture();
        {
            let mut resolver = Resolver::new(&mut store, &mut registry, 10);
            let context = Arc::new(json!({}));
            let fragment = json!({"$ref": "http://redfish.dmtf.org/schemas/v1/Resource.json#/definitions/Id"});
            resolver.resolve_property(&fragment, Some(&context), true).unwrap();
        }
        let entry = registry.get("Resource").unwrap();
        assert_eq!(entry.version().map(|v| v.tag()), Some("v1_1_0"));
    }
}
