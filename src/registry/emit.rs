//! Index emission
//!
//! Writes the deployment tree for a finalized registry:
//! - `redfish/v1/$metadata/index.xml` referencing every CSDL document
//! - `redfish/v1/JsonSchemas/index.json` listing every schema
//! - one sub-index per bundle schema next to its copied JSON file
//! - the copied JSON and CSDL assets

use std::path::PathBuf;

use quick_xml::escape::escape;
use serde_json::json;
use tracing::info;

use super::{RegistryEntry, SchemaOrigin, SchemaRegistry};
use crate::checksum::ArtifactWriter;
use crate::config::GenConfig;
use crate::error::{GenError, Result};
use crate::schema::{CsdlDocument, Standard};
use crate::store::DocumentStore;

/// Protocol version segment of every emitted path
pub const REDFISH_VERSION: &str = "v1";

const JSON_SCHEMAS_DIR: &str = "JsonSchemas";

const EDMX_NAMESPACE: &str = "http://docs.oasis-open.org/odata/ns/edmx";

const SUBINDEX_TEMPLATE: &str = r##"{
    "@odata.context": "/{standard}/{v}/$metadata#JsonSchemaFile.JsonSchemaFile",
    "@odata.id": "/{standard}/{v}/{JsonSchemas}/{name}",
    "@odata.type": "#JsonSchemaFile.v1_0_2.JsonSchemaFile",
    "Name": "{name} Schema File",
    "Schema": "#{name}.{name}",
    "Description": "{name} Schema File Location",
    "Id": "{name}",
    "Languages": [
        "en"
    ],
    "Languages@odata.count": 1,
    "Location": [
        {
            "Language": "en",
            "PublicationUri": "http://redfish.dmtf.org/schemas/{standard}/{v}/{name}.json",
            "Uri": "/{relativeSchemaPath}/{name}.json"
        }
    ],
    "Location@odata.count": 1
}"##;

/// What an emission wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitSummary {
    pub schemas: usize,
    pub files: usize,
}

/// Emit every registry entry into the writer's deployment tree.
pub fn emit(
    registry: &SchemaRegistry,
    store: &DocumentStore,
    config: &GenConfig,
    writer: &mut ArtifactWriter,
) -> Result<EmitSummary> {
    let mut metadata = String::new();
    metadata.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    metadata.push_str(&format!(
        "<edmx:Edmx xmlns:edmx=\"{}\" Version=\"4.0\">\n",
        EDMX_NAMESPACE
    ));

    let mut members = Vec::new();
    for entry in registry.entries() {
        if !entry.is_resolved() {
            return Err(GenError::ClosureNotConverged {
                passes: config.resolution.max_closure_passes,
                pending: registry.pending(),
            });
        }
        info!("Generating schema files for {}", entry.stem());

        let csdl = copy_csdl(entry, store, writer)?;
        metadata.push_str(&reference_element(entry, &csdl, config));

        let schema_dir = copy_json(entry, store, writer)?;
        members.push(json!({ "@odata.id": format!("/{}", schema_dir) }));
    }
    metadata.push_str("</edmx:Edmx>\n");

    writer.write(
        format!("redfish/{}/$metadata/index.xml", REDFISH_VERSION),
        metadata.as_bytes(),
    )?;

    let index = json!({
        "@odata.id": format!("/redfish/{}/{}", REDFISH_VERSION, JSON_SCHEMAS_DIR),
        "@odata.context": format!("/redfish/{}/$metadata#JsonSchemaFileCollection.JsonSchemaFileCollection", REDFISH_VERSION),
        "@odata.type": "#JsonSchemaFileCollection.JsonSchemaFileCollection",
        "Name": "JsonSchemaFile Collection",
        "Description": "Collection of JsonSchemaFiles",
        "Members@odata.count": members.len(),
        "Members": members,
    });
    writer.write(
        format!("redfish/{}/{}/index.json", REDFISH_VERSION, JSON_SCHEMAS_DIR),
        serde_json::to_string_pretty(&index)?.as_bytes(),
    )?;

    Ok(EmitSummary {
        schemas: registry.len(),
        files: writer.written().len(),
    })
}

/// `<standard>/v1/JsonSchemas/<id>`
fn schema_dir(entry: &RegistryEntry) -> String {
    format!(
        "{}/{}/{}/{}",
        entry.standard(),
        REDFISH_VERSION,
        JSON_SCHEMAS_DIR,
        entry.schema_id()
    )
}

fn csdl_file_name(schema_id: &str) -> String {
    format!("{}_{}.xml", schema_id, REDFISH_VERSION)
}

/// Copy the CSDL document of an entry and return its namespaces.
fn copy_csdl(entry: &RegistryEntry, store: &DocumentStore, writer: &mut ArtifactWriter) -> Result<CsdlDocument> {
    let source = match entry.origin() {
        SchemaOrigin::Bundle => store.csdl_path(entry.standard(), entry.schema_id()),
        SchemaOrigin::Extension => store.extension_csdl_path(entry.schema_id()),
    };
    let csdl = store.load_csdl(&source)?;
    writer.copy(
        &source,
        format!(
            "{}/{}/schema/{}",
            entry.standard(),
            REDFISH_VERSION,
            csdl_file_name(entry.schema_id())
        ),
    )?;
    Ok(csdl)
}

/// Copy the JSON schema of an entry; bundle schemas also get a sub-index.
/// Returns the schema's directory relative to the deployment root.
fn copy_json(entry: &RegistryEntry, store: &DocumentStore, writer: &mut ArtifactWriter) -> Result<String> {
    let dir = schema_dir(entry);
    match entry.origin() {
        SchemaOrigin::Bundle => {
            let source = json_source(entry, store)?;
            writer.copy(&source, format!("{}/{}.json", dir, entry.schema_id()))?;
            let subindex = render_subindex(entry.standard(), entry.schema_id(), &dir);
            writer.write(format!("{}/index.json", dir), subindex.as_bytes())?;
        }
        SchemaOrigin::Extension => {
            let tag = entry.version().map(|v| v.tag()).unwrap_or_default();
            let source = store.extension_path(entry.schema_id(), tag);
            writer.copy(&source, format!("{}/index.json", dir))?;
        }
    }
    Ok(dir)
}

fn json_source(entry: &RegistryEntry, store: &DocumentStore) -> Result<PathBuf> {
    let stem = entry.stem();
    store
        .json_path(entry.standard(), &stem)
        .ok_or_else(|| GenError::MissingDocument {
            path: store
                .assets()
                .json_schema_dir(entry.standard())
                .join(format!("{}.json", stem)),
            suggestion: store.suggest(entry.standard(), entry.schema_id()),
        })
}

/// `<edmx:Reference>` with one include per namespace of the document
fn reference_element(entry: &RegistryEntry, csdl: &CsdlDocument, config: &GenConfig) -> String {
    let mut element = format!(
        "  <edmx:Reference Uri=\"/{}/{}/schema/{}\">\n",
        entry.standard(),
        REDFISH_VERSION,
        escape(&csdl_file_name(entry.schema_id()))
    );
    for namespace in &csdl.namespaces {
        if *namespace == config.registry.alias_namespace {
            element.push_str(&format!(
                "    <edmx:Include Namespace=\"{}\" Alias=\"{}\"/>\n",
                escape(namespace),
                escape(&config.registry.alias)
            ));
        } else {
            element.push_str(&format!(
                "    <edmx:Include Namespace=\"{}\"/>\n",
                escape(namespace)
            ));
        }
    }
    element.push_str("  </edmx:Reference>\n");
    element
}

/// Sub-index of one schema, by literal substitution into the fixed template
pub fn render_subindex(standard: Standard, name: &str, relative_schema_path: &str) -> String {
    SUBINDEX_TEMPLATE
        .replace("{name}", name)
        .replace("{relativeSchemaPath}", relative_schema_path)
        .replace("{JsonSchemas}", JSON_SCHEMAS_DIR)
        .replace("{standard}", standard.as_str())
        .replace("{v}", REDFISH_VERSION)
}
