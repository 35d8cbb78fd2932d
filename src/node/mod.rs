//! API resource nodes
//!
//! Every declaration file describes one node: the schema it implements, its
//! URI segment, its properties and the child nodes it links to. Nodes live
//! in a [`NodeGraph`] arena and refer to their parent by [`NodeId`].

mod declaration;
mod parameter;

pub use declaration::{ChildRef, ChildReferences, NodeDeclaration, ReferenceKind};
pub use parameter::NodeParameter;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::codegen::names::node_classname;
use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::property::{scalar_text, BuildScope, PropertySet};
use crate::schema::{CsdlDocument, Standard};
use crate::version::{normalize_tag, SchemaVersion};

/// Root every top-level node id hangs off
pub const ROOT_ID: &str = "/redfish";

/// Index of a node in its [`NodeGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One API resource
#[derive(Debug, Clone)]
pub struct Node {
    key: String,
    name: Option<String>,
    segment: String,
    prefix: Vec<String>,
    id: String,
    standard: Standard,
    schema_id: String,
    version: Option<SchemaVersion>,
    parent: Option<NodeId>,
    parameter: Option<NodeParameter>,
    children: ChildReferences,
    declaration: NodeDeclaration,
    openapi: Value,
    spec: Arc<Value>,
    versioned: Option<Arc<Value>>,
    csdl: CsdlDocument,
}

impl Node {
    /// Build a node below `parent`, loading every document its schema needs.
    pub fn build(
        ctx: &mut GenContext,
        parent_id: Option<&str>,
        parent: Option<NodeId>,
        declaration: NodeDeclaration,
    ) -> Result<Self> {
        let body = &declaration.body;
        let key = declaration.key.clone();

        let schema_id = body
            .get("Schema")
            .and_then(Value::as_str)
            .ok_or_else(|| GenError::MissingSchemaId { node: key.clone() })?
            .to_string();
        let standard = match body.get("Standard").and_then(Value::as_str) {
            Some(raw) => Standard::parse(raw)?,
            None => Standard::Redfish,
        };
        let version = match body.get("Version").and_then(scalar_text) {
            Some(raw) if !raw.trim().is_empty() => {
                let tag = normalize_tag(&raw);
                Some(SchemaVersion::parse(&tag).ok_or_else(|| {
                    GenError::malformed(format!("node '{}'", key), format!("invalid version '{}'", raw))
                })?)
            }
            _ => None,
        };

        let parameter = if declaration.dynamic {
            let definition = body.get("Parameter").ok_or_else(|| {
                GenError::malformed(format!("node '{}'", key), "a dynamic node requires 'Parameter'")
            })?;
            Some(NodeParameter::parse(definition, &key)?)
        } else {
            None
        };
        let segment = match &parameter {
            Some(parameter) => parameter.placeholder(),
            None => body
                .get("Segment")
                .and_then(Value::as_str)
                .unwrap_or(key.as_str())
                .to_string(),
        };
        let prefix: Vec<String> = body
            .get("Prefix")
            .and_then(Value::as_str)
            .map(|p| p.split('/').filter(|s| !s.is_empty()).map(String::from).collect())
            .unwrap_or_default();
        let id = build_id(parent_id, &prefix, &segment);

        let children = ChildReferences::parse(
            declaration.get_action(),
            &key,
            ctx.config.resolution.strict_references,
        )?;

        let openapi = ctx.store.load_openapi(standard, &schema_id)?;
        let spec = ctx.store.require_json(standard, &schema_id)?;
        let versioned = match &version {
            Some(v) => Some(
                ctx.store
                    .require_json(standard, &format!("{}.{}", schema_id, v.tag()))?,
            ),
            None => None,
        };
        let csdl_path = ctx.store.csdl_path(standard, &schema_id);
        let csdl = ctx.store.load_csdl(&csdl_path)?;
        ctx.store.bind_node_document(&schema_id, Arc::clone(&spec));

        let name = body.get("Name").and_then(Value::as_str).map(String::from);
        debug!("Constructed node {} at {}", key, id);
        Ok(Self {
            name,
            key,
            segment,
            prefix,
            id,
            standard,
            schema_id,
            version,
            parent,
            parameter,
            children,
            declaration,
            openapi,
            spec,
            versioned,
            csdl,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Declaration key, also the directory name of the node's children
    pub fn def_filename(&self) -> &str {
        &self.key
    }

    pub fn classname(&self) -> String {
        node_classname(&self.key)
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    pub fn prefix(&self) -> &[String] {
        &self.prefix
    }

    pub fn standard(&self) -> Standard {
        self.standard
    }

    pub fn schema_id(&self) -> &str {
        &self.schema_id
    }

    pub fn version(&self) -> Option<&SchemaVersion> {
        self.version.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn parameter(&self) -> Option<&NodeParameter> {
        self.parameter.as_ref()
    }

    pub fn is_dynamic(&self) -> bool {
        self.parameter.is_some()
    }

    pub fn children(&self) -> &ChildReferences {
        &self.children
    }

    pub fn openapi(&self) -> &Value {
        &self.openapi
    }

    pub fn csdl(&self) -> &CsdlDocument {
        &self.csdl
    }

    /// Unversioned schema document
    pub fn spec(&self) -> &Arc<Value> {
        &self.spec
    }

    pub fn versioned(&self) -> Option<&Arc<Value>> {
        self.versioned.as_ref()
    }

    /// Versioned schema if one was declared, else the unversioned one
    pub fn available_schema(&self) -> &Arc<Value> {
        self.versioned.as_ref().unwrap_or(&self.spec)
    }

    /// `definitions[<Schema>]` of the unversioned spec
    fn spec_node(&self) -> Result<&Value> {
        self.spec
            .get("definitions")
            .and_then(|d| d.get(&self.schema_id))
            .ok_or_else(|| {
                GenError::corrupted(&self.schema_id, format!("'definitions.{}' is missing", self.schema_id))
            })
    }

    /// Field of the spec node, or of its second union alternative
    fn spec_node_field(&self, field: &str) -> Result<&Value> {
        let node = self.spec_node()?;
        node.get(field)
            .or_else(|| {
                node.get("anyOf")
                    .and_then(Value::as_array)
                    .and_then(|alternatives| alternatives.get(1))
                    .and_then(|alt| alt.get(field))
            })
            .ok_or_else(|| GenError::corrupted(&self.schema_id, format!("'{}' is not declared", field)))
    }

    pub fn description(&self) -> Result<Option<&str>> {
        Ok(self.spec_node_field("description")?.as_str())
    }

    pub fn long_description(&self) -> Result<Option<&str>> {
        Ok(self.spec_node_field("longDescription")?.as_str())
    }

    /// URI templates the schema declares for this resource
    pub fn uris(&self) -> Result<Vec<&str>> {
        let uris = self
            .spec_node()?
            .get("uris")
            .and_then(Value::as_array)
            .ok_or_else(|| GenError::corrupted(&self.schema_id, "'uris' is not declared"))?;
        Ok(uris.iter().filter_map(Value::as_str).collect())
    }

    fn capability(&self, field: &str) -> Result<bool> {
        Ok(self.spec_node()?.get(field).and_then(Value::as_bool).unwrap_or(false))
    }

    pub fn insertable(&self) -> Result<bool> {
        self.capability("insertable")
    }

    pub fn updatable(&self) -> Result<bool> {
        self.capability("updatable")
    }

    pub fn deletable(&self) -> Result<bool> {
        self.capability("deletable")
    }

    pub fn odata_context(&self) -> Option<String> {
        self.spec
            .get("title")
            .and_then(Value::as_str)
            .map(|title| format!("/redfish/v1/$metadata{}", title))
    }

    pub fn odata_type(&self) -> Option<&str> {
        self.available_schema().get("title").and_then(Value::as_str)
    }

    /// `$id` of the unversioned spec
    pub fn schema_uri(&self) -> Option<&str> {
        self.spec.get("$id").and_then(Value::as_str)
    }

    /// Fails unless the schema lists this node's id among its URIs.
    pub fn validate(&self) -> Result<()> {
        if self.uris()?.contains(&self.id.as_str()) {
            return Ok(());
        }
        Err(GenError::InvalidNode {
            segment: self.segment.clone(),
            classname: self.classname(),
            id: self.id.clone(),
        })
    }

    /// Build the node's properties against its available schema.
    pub fn build_properties(&self, ctx: &mut GenContext) -> Result<PropertySet> {
        let Some(declared) = self.declaration.properties() else {
            return Ok(PropertySet::default());
        };
        if !declared.is_object() {
            return Err(GenError::malformed(
                format!("properties of node '{}'", self.key),
                "'Properties' must be a mapping",
            ));
        }
        let scope = BuildScope::new(&self.schema_id, self.available_schema(), None);
        PropertySet::build_node(ctx, &scope, declared)
    }
}

/// `<parent or /redfish>/<prefix/><segment>`
fn build_id(parent_id: Option<&str>, prefix: &[String], segment: &str) -> String {
    let mut id = parent_id.unwrap_or(ROOT_ID).to_string();
    id.push('/');
    for part in prefix {
        id.push_str(part);
        id.push('/');
    }
    id.push_str(segment);
    id
}

/// Arena of every node of a run, in construction order
#[derive(Debug, Default)]
pub struct NodeGraph {
    nodes: Vec<Node>,
    by_class: HashMap<String, NodeId>,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.by_class.insert(node.classname(), id);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn by_classname(&self, classname: &str) -> Option<NodeId> {
        self.by_class.get(classname).copied()
    }

    /// First node implementing `schema_id`
    pub fn by_schema(&self, schema_id: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.schema_id == schema_id)
            .map(NodeId)
    }

    pub fn parent(&self, id: NodeId) -> Option<&Node> {
        self.get(id).parent.map(|p| self.get(p))
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
