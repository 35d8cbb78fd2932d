//! Run context shared by every stage of a generation run

use crate::config::GenConfig;
use crate::registry::SchemaRegistry;
use crate::resolver::Resolver;
use crate::store::DocumentStore;

/// Everything one run owns: configuration, loaded documents and the schema
/// table. Both the store and the registry only ever grow during a run.
#[derive(Debug)]
pub struct GenContext {
    pub config: GenConfig,
    pub store: DocumentStore,
    pub registry: SchemaRegistry,
}

impl GenContext {
    pub fn new(config: GenConfig) -> Self {
        let store = DocumentStore::new(&config);
        let registry = SchemaRegistry::new(&config);
        Self {
            config,
            store,
            registry,
        }
    }

    /// Reference resolver borrowing this context's store and registry
    pub fn resolver(&mut self) -> Resolver<'_> {
        Resolver::new(
            &mut self.store,
            &mut self.registry,
            self.config.resolution.max_reference_hops,
        )
    }
}
