//! Schema Registry
//!
//! Global table of every schema a run touches, at most one entry per schema
//! id. Entries are discovered incidentally while properties are resolved and
//! completed by a bounded fixed-point closure in [`SchemaRegistry::finalize`].

mod emit;

pub use emit::{emit, EmitSummary};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::GenConfig;
use crate::error::{GenError, Result};
use crate::schema::Standard;
use crate::store::DocumentStore;
use crate::version::{split_versioned_stem, SchemaVersion};

/// Where a registered schema comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaOrigin {
    /// A standard bundle
    Bundle,
    /// The vendor extension area
    Extension,
}

/// One registered schema
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    standard: Standard,
    schema_id: String,
    version: Option<SchemaVersion>,
    resolved: bool,
    document: Option<Arc<Value>>,
    origin: SchemaOrigin,
}

impl RegistryEntry {
    /// A bundle schema awaiting resolution
    pub fn pending(standard: Standard, schema_id: impl Into<String>, version: Option<SchemaVersion>) -> Self {
        Self {
            standard,
            schema_id: schema_id.into(),
            version,
            resolved: false,
            document: None,
            origin: SchemaOrigin::Bundle,
        }
    }

    /// A schema whose dependencies are already known (bound to a node)
    pub fn resolved(
        standard: Standard,
        schema_id: impl Into<String>,
        version: Option<SchemaVersion>,
        document: Arc<Value>,
    ) -> Self {
        Self {
            standard,
            schema_id: schema_id.into(),
            version,
            resolved: true,
            document: Some(document),
            origin: SchemaOrigin::Bundle,
        }
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

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn origin(&self) -> SchemaOrigin {
        self.origin
    }

    pub fn document(&self) -> Option<&Arc<Value>> {
        self.document.as_ref()
    }

    /// File stem: `Id` or `Id.vX_Y_Z`
    pub fn stem(&self) -> String {
        match &self.version {
            Some(v) => format!("{}.{}", self.schema_id, v.tag()),
            None => self.schema_id.clone(),
        }
    }
}

/// The schema table of a run
#[derive(Debug)]
pub struct SchemaRegistry {
    entries: BTreeMap<String, RegistryEntry>,
    /// schema -> dependency edges discovered while extracting
    graph: DiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
    baseline: BTreeMap<String, String>,
    max_nesting_depth: usize,
    max_closure_passes: usize,
}

impl SchemaRegistry {
    pub fn new(config: &GenConfig) -> Self {
        Self {
            entries: BTreeMap::new(),
            graph: DiGraph::new(),
            indices: HashMap::new(),
            baseline: config.registry.baseline_schemas.clone(),
            max_nesting_depth: config.resolution.max_nesting_depth,
            max_closure_passes: config.resolution.max_closure_passes,
        }
    }

    pub fn get(&self, schema_id: &str) -> Option<&RegistryEntry> {
        self.entries.get(schema_id)
    }

    /// Entries sorted by schema id
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Schema ids still waiting for resolution
    pub fn pending(&self) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| !e.resolved)
            .map(|e| e.schema_id.clone())
            .collect()
    }

    /// Register an entry.
    ///
    /// An existing versioned entry is never replaced; an unversioned one is
    /// only replaced by a versioned entry. Returns whether the table changed.
    pub fn register(&mut self, entry: RegistryEntry) -> bool {
        self.node_index(&entry.schema_id);
        match self.entries.get(&entry.schema_id) {
            Some(existing) if existing.version.is_some() => false,
            Some(_) if entry.version.is_none() => false,
            _ => {
                debug!(
                    "Registering schema {} ({})",
                    entry.stem(),
                    if entry.resolved { "resolved" } else { "pending" }
                );
                self.entries.insert(entry.schema_id.clone(), entry);
                true
            }
        }
    }

    /// Register the schema named by a reference URI
    /// (`.../<id>[.<version>].json#...`).
    ///
    /// Local references and `odata*` schemas are ignored. Without a version
    /// the latest bundle version is picked. Returns the schema id.
    pub fn register_reference(&mut self, uri: &str, store: &DocumentStore) -> Result<Option<String>> {
        let Some(end) = uri.rfind(".json") else {
            return Ok(None);
        };
        let standard = Standard::from_uri(uri);
        let start = uri[..end].rfind('/').map(|i| i + 1).unwrap_or(0);
        let title = uri[start..end].trim_start_matches('#');
        if title.is_empty() || title.starts_with("odata") {
            return Ok(None);
        }

        let (schema_id, tag) = split_versioned_stem(title);
        if self.entries.get(schema_id).is_some_and(|e| e.version.is_some()) {
            return Ok(Some(schema_id.to_string()));
        }

        let version = match tag.and_then(SchemaVersion::parse) {
            Some(version) => Some(version),
            None => {
                if let Some(tag) = tag {
                    warn!("Unparseable version '{}' in reference {}", tag, uri);
                }
                store.latest_version(standard, schema_id)?
            }
        };
        let mut entry = RegistryEntry::pending(standard, schema_id, version);
        let in_bundle = entry.version.is_some() && store.json_path(standard, &entry.stem()).is_some();
        if !in_bundle {
            if let Some(extension) = store.find_extension(schema_id, entry.version.as_ref())? {
                entry.standard = Standard::Redfish;
                entry.version = Some(extension.version);
                entry.origin = SchemaOrigin::Extension;
            }
        }
        self.register(entry);
        Ok(Some(schema_id.to_string()))
    }

    /// Register every schema referenced from a property map.
    ///
    /// Direct, `anyOf` and `items` references count; nested `properties`
    /// maps are scanned recursively up to the configured nesting depth, past
    /// which the run fails.
    pub fn extract_dependencies(
        &mut self,
        owner: Option<&str>,
        properties: &Value,
        store: &DocumentStore,
    ) -> Result<()> {
        self.extract_at(owner, properties, store, 0)
    }

    fn extract_at(
        &mut self,
        owner: Option<&str>,
        properties: &Value,
        store: &DocumentStore,
        depth: usize,
    ) -> Result<()> {
        if depth >= self.max_nesting_depth {
            return Err(GenError::NestingTooDeep { depth });
        }
        let Some(map) = properties.as_object() else {
            return Ok(());
        };

        for property in map.values() {
            if let Some(alternatives) = property.get("anyOf").and_then(Value::as_array) {
                for alt in alternatives {
                    if let Some(uri) = alt.get("$ref").and_then(Value::as_str) {
                        self.add_dependency(owner, uri, store)?;
                    }
                }
            }
            let property = property.get("items").unwrap_or(property);
            if let Some(uri) = property.get("$ref").and_then(Value::as_str) {
                self.add_dependency(owner, uri, store)?;
            }
            if let Some(nested) = property.get("properties") {
                self.extract_at(owner, nested, store, depth + 1)?;
            }
        }
        Ok(())
    }

    fn add_dependency(&mut self, owner: Option<&str>, uri: &str, store: &DocumentStore) -> Result<()> {
        let Some(dependency) = self.register_reference(uri, store)? else {
            return Ok(());
        };
        if let Some(owner) = owner.filter(|o| *o != dependency) {
            let from = self.node_index(owner);
            let to = self.node_index(&dependency);
            if self.graph.find_edge(from, to).is_none() {
                self.graph.add_edge(from, to, ());
            }
        }
        Ok(())
    }

    fn node_index(&mut self, schema_id: &str) -> NodeIndex {
        if let Some(index) = self.indices.get(schema_id) {
            return *index;
        }
        let index = self.graph.add_node(schema_id.to_string());
        self.indices.insert(schema_id.to_string(), index);
        index
    }

    /// Complete the table once every node has been built.
    ///
    /// Seeds the baseline schemas, registers every versioned extension
    /// document, then resolves pending entries pass by pass until a pass
    /// finds nothing left. Entries still pending after the configured number
    /// of passes fail the run with [`GenError::ClosureNotConverged`].
    pub fn finalize(&mut self, store: &mut DocumentStore) -> Result<()> {
        self.seed_baseline(store)?;
        self.register_extensions(store)?;

        for pass in 1..=self.max_closure_passes {
            let pending = self.pending();
            if pending.is_empty() {
                info!("Schema closure complete after {} passes, {} schemas", pass - 1, self.len());
                return Ok(());
            }
            debug!("Closure pass {}: {} pending", pass, pending.len());
            for schema_id in pending {
                self.resolve_entry(&schema_id, store)?;
            }
        }

        let pending = self.pending();
        if pending.is_empty() {
            info!("Schema closure complete, {} schemas", self.len());
            return Ok(());
        }
        Err(GenError::ClosureNotConverged {
            passes: self.max_closure_passes,
            pending,
        })
    }

    fn seed_baseline(&mut self, store: &DocumentStore) -> Result<()> {
        let baseline = self.baseline.clone();
        for (schema_id, standard) in &baseline {
            let standard = Standard::parse(standard)?;
            if self.entries.contains_key(schema_id) {
                debug!("Baseline schema {} already registered", schema_id);
                continue;
            }
            info!("Adding baseline schema {}", schema_id);
            let version = store.latest_version(standard, schema_id)?;
            self.register(RegistryEntry::pending(standard, schema_id.as_str(), version));
        }
        Ok(())
    }

    fn register_extensions(&mut self, store: &mut DocumentStore) -> Result<()> {
        for extension in store.extension_documents()? {
            let document = store
                .load_extension(&extension.schema_id, extension.version.tag())?
                .ok_or_else(|| GenError::MissingDocument {
                    path: extension.path.clone(),
                    suggestion: None,
                })?;
            info!("Adding extension schema {}.{}", extension.schema_id, extension.version);
            self.register(RegistryEntry {
                standard: Standard::Redfish,
                schema_id: extension.schema_id.clone(),
                version: Some(extension.version.clone()),
                resolved: false,
                document: Some(Arc::clone(&document)),
                origin: SchemaOrigin::Extension,
            });
            if let Some(definitions) = document.get("definitions") {
                self.extract_dependencies(Some(&extension.schema_id), definitions, store)?;
            }
        }
        Ok(())
    }

    /// Read an entry's definitions and register what they reference.
    fn resolve_entry(&mut self, schema_id: &str, store: &mut DocumentStore) -> Result<()> {
        let Some(entry) = self.entries.get(schema_id) else {
            return Ok(());
        };
        let (standard, stem, origin, version) = (
            entry.standard,
            entry.stem(),
            entry.origin,
            entry.version.clone(),
        );
        let document = match (&entry.document, origin) {
            (Some(document), _) => Arc::clone(document),
            (None, SchemaOrigin::Bundle) => store.require_json(standard, &stem)?,
            (None, SchemaOrigin::Extension) => {
                let tag = version.as_ref().map(|v| v.tag()).unwrap_or_default();
                store
                    .load_extension(schema_id, tag)?
                    .ok_or_else(|| GenError::MissingDocument {
                        path: store.extension_path(schema_id, tag),
                        suggestion: None,
                    })?
            }
        };

        if let Some(definitions) = document.get("definitions") {
            self.extract_dependencies(Some(schema_id), definitions, store)?;
        }

        if let Some(entry) = self.entries.get_mut(schema_id) {
            // Replaced by a versioned entry meanwhile: resolve that one next pass.
            if entry.version == version {
                entry.resolved = true;
                entry.document = Some(document);
            }
        }
        Ok(())
    }

    /// Direct dependencies of a schema, sorted
    pub fn dependencies(&self, schema_id: &str) -> Vec<&str> {
        let Some(index) = self.indices.get(schema_id) else {
            return Vec::new();
        };
        let mut deps: Vec<&str> = self
            .graph
            .edges(*index)
            .map(|e| self.graph[e.target()].as_str())
            .collect();
        deps.sort_unstable();
        deps
    }

    /// Export the schema dependency graph to GraphViz DOT format
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph SchemaDependencies {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  node [shape=box, style=rounded, fontname=\"Helvetica\", fontsize=10];\n\n");

        let mut ids: Vec<&String> = self.indices.keys().collect();
        ids.sort();
        for id in &ids {
            let label = match self.entries.get(id.as_str()) {
                Some(entry) => entry.stem(),
                None => id.to_string(),
            };
            let color = match self.entries.get(id.as_str()).map(|e| e.origin) {
                Some(SchemaOrigin::Extension) => "#FF9800",
                _ => "#00BCD4",
            };
            output.push_str(&format!(
                "  \"{}\" [label=\"{}\", color=\"{}\"];\n",
                id, label, color
            ));
        }

        output.push('\n');
        for id in &ids {
            for dep in self.dependencies(id) {
                output.push_str(&format!("  \"{}\" -> \"{}\";\n", id, dep));
            }
        }
        output.push_str("}\n");
        output
    }
}
