//! Redfish node generator
//!
//! Compiles declarative node declarations (YAML) against the DMTF Redfish
//! schema bundles into resolved node models, and emits the schema index
//! tree a Redfish service serves.
//!
//! ## Features
//!
//! - **Reference resolution**: `$ref`, `anyOf` unions and `items` are chased
//!   across bundle documents with a hop bound and cycle detection
//! - **Property model**: nine property kinds, each with a semantic type and a
//!   getter strategy
//! - **Schema closure**: every schema touched is registered and its
//!   dependencies are resolved to a fixed point
//! - **Index emission**: `$metadata`, `JsonSchemas` and per-schema sub-indexes,
//!   with SHA256 checksums
//!
//! ## Layout
//!
//! ```text
//! assets/
//! ├── schemas/bundle/
//! │   ├── json-schema/     Chassis.json, Chassis.v1_7_6.json, ...
//! │   ├── openapi/         Chassis.yaml, ...
//! │   └── csdl/            Chassis_v1.xml, ...
//! └── oem/
//!     ├── json-schema/     ExtFoo.v1_0_0.json
//!     └── csdl/            ExtFoo_v1.xml
//! redfish/
//! ├── v1.yaml
//! └── v1/
//!     ├── chassisCollection.yaml
//!     └── chassisCollection/
//!         └── chassis.yaml
//! ```

pub mod checksum;
pub mod codegen;
pub mod config;
pub mod context;
pub mod error;
pub mod generator;
pub mod node;
pub mod property;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod version;

pub use checksum::{ArtifactWriter, Checksum};
pub use codegen::{JsonModelRenderer, NodeModel, Renderer};
pub use config::GenConfig;
pub use context::GenContext;
pub use error::{GenError, Result};
pub use generator::{GenerationSummary, Generator};
pub use node::{Node, NodeGraph, NodeId};
pub use property::{Property, PropertyKind, PropertySet};
pub use registry::{RegistryEntry, SchemaRegistry};
pub use resolver::{Resolver, SemanticType};
pub use schema::{SchemaRef, Standard};
pub use store::DocumentStore;
pub use version::SchemaVersion;
