//! Configuration management for the generator
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (redfish-gen.toml)
//! - Environment variables (REDFISH_GEN__*)
//!
//! ## Example config file (redfish-gen.toml):
//! ```toml
//! [assets]
//! root = "tools/redfish-gen"
//!
//! [output]
//! www_dir = "build/www"
//! generated_dir = "src/redfish/generated"
//!
//! [resolution]
//! max_reference_hops = 10
//! strict_references = true
//!
//! [registry.baseline_schemas]
//! RedfishExtensions = "redfish"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::schema::Standard;

/// Main generator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenConfig {
    /// Where schema bundles and extension assets live
    #[serde(default)]
    pub assets: AssetsConfig,

    /// Where generated artifacts go
    #[serde(default)]
    pub output: OutputConfig,

    /// Declaration tree
    #[serde(default)]
    pub declarations: DeclarationsConfig,

    /// Resolution bounds
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Schema registry behaviour
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Asset tree layout, relative to `root`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    #[serde(default = "default_assets_root")]
    pub root: PathBuf,

    /// DMTF bundle (json-schema/, openapi/, csdl/)
    #[serde(default = "default_redfish_bundle")]
    pub redfish_bundle: PathBuf,

    /// SNIA bundle (json-schema/, openapi/, csdl-schema/)
    #[serde(default = "default_swordfish_bundle")]
    pub swordfish_bundle: PathBuf,

    /// Vendor extension area (json-schema/, csdl/)
    #[serde(default = "default_extension_dir")]
    pub extension_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Deployment tree receiving schema assets and indexes
    #[serde(default = "default_www_dir")]
    pub www_dir: PathBuf,

    /// Directory handed to the renderer
    #[serde(default = "default_generated_dir")]
    pub generated_dir: PathBuf,

    /// Write checksums.sha256 next to the emitted assets
    #[serde(default = "default_true")]
    pub write_checksums: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclarationsConfig {
    #[serde(default = "default_declarations_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Reference hops chased before a resolution fails closed
    #[serde(default = "default_bound")]
    pub max_reference_hops: usize,

    /// Nested `properties` depth scanned for dependencies
    #[serde(default = "default_bound")]
    pub max_nesting_depth: usize,

    /// Passes of the registry fixed-point loop
    #[serde(default = "default_bound")]
    pub max_closure_passes: usize,

    /// Treat a malformed child reference list as fatal
    #[serde(default)]
    pub strict_references: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Schemas always emitted, mapped to their standard
    #[serde(default = "default_baseline_schemas")]
    pub baseline_schemas: BTreeMap<String, String>,

    /// Schema ids whose json-schema file is named differently
    #[serde(default = "default_file_map")]
    pub file_map: BTreeMap<String, String>,

    /// Namespace that receives an `Alias` in the metadata index
    #[serde(default = "default_alias_namespace")]
    pub alias_namespace: String,

    #[serde(default = "default_alias")]
    pub alias: String,
}

fn default_assets_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_redfish_bundle() -> PathBuf {
    PathBuf::from("assets/schemas/bundle")
}

fn default_swordfish_bundle() -> PathBuf {
    PathBuf::from("assets/schemas/swordfish/bundle")
}

fn default_extension_dir() -> PathBuf {
    PathBuf::from("assets/oem")
}

fn default_www_dir() -> PathBuf {
    PathBuf::from("www")
}

fn default_generated_dir() -> PathBuf {
    PathBuf::from("generated")
}

fn default_declarations_dir() -> PathBuf {
    PathBuf::from("redfish")
}

fn default_true() -> bool {
    true
}

fn default_bound() -> usize {
    10
}

fn default_baseline_schemas() -> BTreeMap<String, String> {
    BTreeMap::from([("RedfishExtensions".to_string(), "redfish".to_string())])
}

fn default_file_map() -> BTreeMap<String, String> {
    BTreeMap::from([("RedfishExtensions".to_string(), "redfish-schema".to_string())])
}

fn default_alias_namespace() -> String {
    "RedfishExtensions.v1_0_0".to_string()
}

fn default_alias() -> String {
    "Redfish".to_string()
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: default_assets_root(),
            redfish_bundle: default_redfish_bundle(),
            swordfish_bundle: default_swordfish_bundle(),
            extension_dir: default_extension_dir(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            www_dir: default_www_dir(),
            generated_dir: default_generated_dir(),
            write_checksums: true,
        }
    }
}

impl Default for DeclarationsConfig {
    fn default() -> Self {
        Self {
            dir: default_declarations_dir(),
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            max_reference_hops: default_bound(),
            max_nesting_depth: default_bound(),
            max_closure_passes: default_bound(),
            strict_references: false,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            baseline_schemas: default_baseline_schemas(),
            file_map: default_file_map(),
            alias_namespace: default_alias_namespace(),
            alias: default_alias(),
        }
    }
}

impl AssetsConfig {
    /// Bundle directory of a standard
    pub fn bundle_dir(&self, standard: Standard) -> PathBuf {
        match standard {
            Standard::Redfish => self.root.join(&self.redfish_bundle),
            Standard::Swordfish => self.root.join(&self.swordfish_bundle),
        }
    }

    pub fn json_schema_dir(&self, standard: Standard) -> PathBuf {
        self.bundle_dir(standard).join("json-schema")
    }

    pub fn openapi_dir(&self, standard: Standard) -> PathBuf {
        self.bundle_dir(standard).join("openapi")
    }

    pub fn csdl_dir(&self, standard: Standard) -> PathBuf {
        match standard {
            Standard::Redfish => self.bundle_dir(standard).join("csdl"),
            Standard::Swordfish => self.bundle_dir(standard).join("csdl-schema"),
        }
    }

    pub fn extension_json_dir(&self) -> PathBuf {
        self.root.join(&self.extension_dir).join("json-schema")
    }

    pub fn extension_csdl_dir(&self) -> PathBuf {
        self.root.join(&self.extension_dir).join("csdl")
    }
}

impl GenConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "redfish-gen.toml",
            ".redfish-gen.toml",
            "config/redfish-gen.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("org", "redfish", "redfish-gen") {
            let xdg_config = config_dir.config_dir().join("redfish-gen.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("REDFISH_GEN")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Configuration rooted at `root` for assets and declarations, writing to `out`.
    pub fn rooted(root: &Path, out: &Path) -> Self {
        let mut config = Self::default();
        config.set_root(root);
        config.set_output(out);
        config
    }

    /// Point assets and declarations at `root`, keeping every other setting.
    pub fn set_root(&mut self, root: &Path) {
        self.assets.root = root.to_path_buf();
        self.declarations.dir = root.join(default_declarations_dir());
    }

    /// Write `www/` and `generated/` below `out`, keeping every other setting.
    pub fn set_output(&mut self, out: &Path) {
        self.output.www_dir = out.join(default_www_dir());
        self.output.generated_dir = out.join(default_generated_dir());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GenConfig::default();
        assert_eq!(config.resolution.max_reference_hops, 10);
        assert!(!config.resolution.strict_references);
        assert_eq!(config.registry.baseline_schemas["RedfishExtensions"], "redfish");
    }

    #[test]
    fn test_serialize_config() {
        let config = GenConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[assets]"));
        assert!(toml_str.contains("[resolution]"));
    }

    #[test]
    fn test_bundle_layout_per_standard() {
        let config = GenConfig::rooted(Path::new("/tmp/rfg"), Path::new("/tmp/out"));
        assert_eq!(
            config.assets.csdl_dir(Standard::Swordfish),
            PathBuf::from("/tmp/rfg/assets/schemas/swordfish/bundle/csdl-schema")
        );
        assert_eq!(
            config.assets.json_schema_dir(Standard::Redfish),
            PathBuf::from("/tmp/rfg/assets/schemas/bundle/json-schema")
        );
    }

    #[test]
    fn test_overrides_keep_loaded_settings() {
        let mut config = GenConfig::default();
        config.resolution.strict_references = true;
        config.resolution.max_closure_passes = 4;
        config.registry.baseline_schemas.insert("Resource".into(), "redfish".into());

        config.set_root(Path::new("/srv/rfg"));
        config.set_output(Path::new("/srv/out"));

        assert!(config.resolution.strict_references);
        assert_eq!(config.resolution.max_closure_passes, 4);
        assert!(config.registry.baseline_schemas.contains_key("Resource"));
        assert_eq!(config.declarations.dir, Path::new("/srv/rfg").join(default_declarations_dir()));
        assert_eq!(config.output.www_dir, Path::new("/srv/out").join(default_www_dir()));
    }
}
