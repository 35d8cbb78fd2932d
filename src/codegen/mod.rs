//! Code Generation
//!
//! Projects a built node into a [`NodeModel`] and hands it to a [`Renderer`].
//!
//! Architecture:
//! - NodeModel: everything a renderer needs for one node, resolved up front
//! - Renderer: turns a model into target source text
//!
//! The key constraint: renderers NEVER read raw schema JSON, only model
//! fields. Every schema lookup, type resolution and naming decision happens
//! before the model is handed over.

pub mod names;

use std::path::PathBuf;

use chrono::{Datelike, Utc};
use serde::Serialize;
use tracing::info;

use crate::checksum::ArtifactWriter;
use crate::context::GenContext;
use crate::error::Result;
use crate::node::{ChildRef, NodeGraph, NodeId, NodeParameter};
use crate::property::{Property, PropertyKind, PropertySet};

// =============================================================================
// NodeModel
// =============================================================================

/// A node as a renderer sees it
#[derive(Debug, Clone, Serialize)]
pub struct NodeModel {
    pub classname: String,
    pub def_filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub id: String,
    pub segment: String,
    pub prefix: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<NodeParameter>,

    pub standard: String,
    pub schema_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odata_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odata_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    pub insertable: bool,
    pub updatable: bool,
    pub deletable: bool,

    /// Every child class, hidden references included
    pub child_classnames: Vec<String>,
    /// References rendered into the payload
    pub references: Vec<ChildRef>,

    pub properties: PropertySet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oem_getter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links_getter: Option<LinksGetter>,
    pub collection_getters: Vec<String>,

    /// Year stamped into the rendered file header
    pub year: i32,
}

/// Aggregate link getter and the field it serves
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinksGetter {
    pub classname: String,
    pub field: String,
}

impl NodeModel {
    /// Resolve everything a renderer needs for `id`.
    pub fn build(ctx: &mut GenContext, graph: &NodeGraph, id: NodeId) -> Result<Self> {
        let node = graph.get(id);
        let properties = node.build_properties(ctx)?;

        let link_classnames: Vec<&str> = properties
            .get(PropertyKind::Links)
            .iter()
            .filter_map(|p| match p {
                Property::Links(link) => Some(link.classname.as_str()),
                _ => None,
            })
            .collect();
        let link_field = properties.get(PropertyKind::Links).iter().find_map(|p| match p {
            Property::Links(link) => Some(link.field.clone()),
            _ => None,
        });
        let links_getter = names::links_getter(&link_classnames)
            .zip(link_field)
            .map(|(classname, field)| LinksGetter { classname, field });
        let collection_getters = properties
            .get(PropertyKind::Collection)
            .iter()
            .filter_map(|p| match p {
                Property::Collection(collection) => Some(collection.classname.clone()),
                _ => None,
            })
            .collect();
        let oem_getter = names::oem_getter(&properties.oem_names());

        Ok(Self {
            classname: node.classname(),
            def_filename: node.def_filename().to_string(),
            name: node.name().map(String::from),
            id: node.id().to_string(),
            segment: node.segment().to_string(),
            prefix: node.prefix().to_vec(),
            parent: graph.parent(id).map(|p| p.classname()),
            parameter: node.parameter().cloned(),
            standard: node.standard().to_string(),
            schema_id: node.schema_id().to_string(),
            version: node.version().map(|v| v.tag().to_string()),
            schema_uri: node.schema_uri().map(String::from),
            odata_type: node.odata_type().map(String::from),
            odata_context: node.odata_context(),
            description: node.description()?.map(String::from),
            long_description: node.long_description()?.map(String::from),
            insertable: node.insertable()?,
            updatable: node.updatable()?,
            deletable: node.deletable()?,
            child_classnames: node.children().child_classnames(),
            references: node.children().visible().cloned().collect(),
            properties,
            oem_getter,
            links_getter,
            collection_getters,
            year: Utc::now().year(),
        })
    }
}

// =============================================================================
// Renderers
// =============================================================================

/// Turns node models into target source text
pub trait Renderer {
    /// Render one node, returning the file written.
    fn render(&mut self, model: &NodeModel) -> Result<PathBuf>;
}

/// Writes each model as pretty JSON to `<dir>/<Classname>.json`
#[derive(Debug)]
pub struct JsonModelRenderer {
    writer: ArtifactWriter,
}

impl JsonModelRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            writer: ArtifactWriter::new(dir),
        }
    }

    pub fn written(&self) -> usize {
        self.writer.written().len()
    }

    /// Write the checksum listing of every rendered model.
    pub fn finish(self) -> Result<PathBuf> {
        self.writer.finish()
    }
}

impl Renderer for JsonModelRenderer {
    fn render(&mut self, model: &NodeModel) -> Result<PathBuf> {
        let content = serde_json::to_string_pretty(model)?;
        let path = self
            .writer
            .write(format!("{}.json", model.classname), content.as_bytes())?;
        info!("Generated Redfish node {}", model.classname);
        Ok(path)
    }
}
