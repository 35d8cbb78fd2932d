//! Generation pipeline
//!
//! 1. [`Generator::process`] walks the declaration tree and constructs every
//!    node. Files of a directory come first, in name order; a subdirectory
//!    holds the children of the node whose declaration key matches its name.
//! 2. [`Generator::generate_all`] validates and renders each node, registers
//!    its schema, then finalizes the registry and emits the index tree.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;
use walkdir::WalkDir;

use crate::checksum::ArtifactWriter;
use crate::codegen::{NodeModel, Renderer};
use crate::config::GenConfig;
use crate::context::GenContext;
use crate::error::{GenError, Result};
use crate::node::{Node, NodeDeclaration, NodeGraph, NodeId};
use crate::registry::{self, RegistryEntry};

/// What a run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationSummary {
    pub nodes: usize,
    pub schemas: usize,
    pub files: usize,
}

/// Drives one generation run
#[derive(Debug)]
pub struct Generator {
    ctx: GenContext,
    graph: NodeGraph,
}

impl Generator {
    pub fn new(config: GenConfig) -> Self {
        Self {
            ctx: GenContext::new(config),
            graph: NodeGraph::new(),
        }
    }

    /// Construct every node declared under the configured declaration tree.
    pub fn load(&mut self) -> Result<usize> {
        let root = self.ctx.config.declarations.dir.clone();
        self.process(&root, None)?;
        info!("Constructed {} nodes from {}", self.graph.len(), root.display());
        Ok(self.graph.len())
    }

    /// Construct the nodes declared in `dir`, below `parent`.
    pub fn process(&mut self, dir: &Path, parent: Option<NodeId>) -> Result<()> {
        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path().to_path_buf();
            if entry.file_type().is_dir() {
                dirs.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
                files.push(path);
            }
        }

        let mut constructed: HashMap<String, NodeId> = HashMap::new();
        for file in files {
            let declaration = NodeDeclaration::from_file(&file)?;
            let parent_id = parent.map(|p| self.graph.get(p).id().to_string());
            let node = Node::build(&mut self.ctx, parent_id.as_deref(), parent, declaration)?;
            let key = node.def_filename().to_string();
            let id = self.graph.insert(node);
            constructed.insert(key, id);
        }

        for sub in dirs {
            let name = sub
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let owner = constructed.get(&name).copied().ok_or_else(|| {
                GenError::malformed(
                    sub.display().to_string(),
                    format!("no node '{}' is declared next to this directory", name),
                )
            })?;
            self.process(&sub, Some(owner))?;
        }
        Ok(())
    }

    /// Render every constructed node, then complete and emit the schema index.
    pub fn generate_all(&mut self, renderer: &mut dyn Renderer) -> Result<GenerationSummary> {
        self.render_all(renderer)?;
        self.finalize()?;

        let mut writer = ArtifactWriter::new(&self.ctx.config.output.www_dir);
        let emitted = registry::emit(&self.ctx.registry, &self.ctx.store, &self.ctx.config, &mut writer)?;
        if self.ctx.config.output.write_checksums {
            let listing = writer.finish()?;
            info!("Wrote {}", listing.display());
        }

        Ok(GenerationSummary {
            nodes: self.graph.len(),
            schemas: emitted.schemas,
            files: emitted.files,
        })
    }

    /// Validate and render every node in construction order.
    pub fn render_all(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        for id in self.graph.ids().collect::<Vec<_>>() {
            self.generate(id, renderer)?;
        }
        Ok(())
    }

    /// Complete the schema closure. Only meaningful once every node is rendered.
    pub fn finalize(&mut self) -> Result<()> {
        self.ctx.registry.finalize(&mut self.ctx.store)
    }

    fn generate(&mut self, id: NodeId, renderer: &mut dyn Renderer) -> Result<()> {
        let node = self.graph.get(id);
        info!("Generating Redfish node {}", node.classname());
        node.validate()?;

        let model = NodeModel::build(&mut self.ctx, &self.graph, id)?;
        renderer.render(&model)?;

        let node = self.graph.get(id);
        self.ctx.registry.register(RegistryEntry::resolved(
            node.standard(),
            node.schema_id(),
            node.version().cloned(),
            node.available_schema().clone(),
        ));
        Ok(())
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    pub fn context(&self) -> &GenContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut GenContext {
        &mut self.ctx
    }
}
