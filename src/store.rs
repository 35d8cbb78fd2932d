//! Document store
//!
//! Loads and caches every schema document the generator touches: JSON
//! schemas from the bundles and the extension area, OpenAPI descriptions and
//! CSDL files. Documents are immutable once loaded and shared as `Arc<Value>`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::{AssetsConfig, GenConfig};
use crate::error::{GenError, Result};
use crate::schema::{CsdlDocument, SchemaRef, Standard};
use crate::version::{split_versioned_stem, SchemaVersion};

/// Cached JSON documents keyed by standard and file stem
type JsonCache = HashMap<(Standard, String), Option<Arc<Value>>>;

/// A versioned document found in the extension area
#[derive(Debug, Clone)]
pub struct ExtensionDocument {
    pub schema_id: String,
    pub version: SchemaVersion,
    pub path: PathBuf,
}

/// Loader and cache for schema documents
#[derive(Debug)]
pub struct DocumentStore {
    assets: AssetsConfig,
    file_map: BTreeMap<String, String>,
    json: JsonCache,
    extensions: HashMap<String, Option<Arc<Value>>>,
    /// Unversioned specs bound to constructed nodes, by schema id
    bound: HashMap<String, Arc<Value>>,
}

impl DocumentStore {
    pub fn new(config: &GenConfig) -> Self {
        Self {
            assets: config.assets.clone(),
            file_map: config.registry.file_map.clone(),
            json: HashMap::new(),
            extensions: HashMap::new(),
            bound: HashMap::new(),
        }
    }

    pub fn assets(&self) -> &AssetsConfig {
        &self.assets
    }

    /// File stem on disk for a schema stem, honouring the file-name map
    fn mapped_stem(&self, stem: &str) -> String {
        let (id, version) = split_versioned_stem(stem);
        let id = self.file_map.get(id).map(|s| s.as_str()).unwrap_or(id);
        match version {
            Some(v) => format!("{}.{}", id, v),
            None => id.to_string(),
        }
    }

    /// Path of the JSON schema for `stem`, if it exists.
    ///
    /// Older DMTF bundle files spell versions with dots (`Foo.1.0.0.json`);
    /// that spelling is tried when the tagged file is absent.
    pub fn json_path(&self, standard: Standard, stem: &str) -> Option<PathBuf> {
        let dir = self.assets.json_schema_dir(standard);
        let mapped = self.mapped_stem(stem);
        let tagged = dir.join(format!("{}.json", mapped));
        if tagged.is_file() {
            return Some(tagged);
        }
        let (id, version) = split_versioned_stem(&mapped);
        let dotted = version
            .and_then(|v| v.strip_prefix('v'))
            .map(|v| dir.join(format!("{}.{}.json", id, v.replace('_', "."))))?;
        dotted.is_file().then_some(dotted)
    }

    /// Load a bundle JSON schema; `None` when the file does not exist.
    pub fn load_json(&mut self, standard: Standard, stem: &str) -> Result<Option<Arc<Value>>> {
        let key = (standard, stem.to_string());
        if let Some(cached) = self.json.get(&key) {
            return Ok(cached.clone());
        }

        let document = match self.json_path(standard, stem) {
            Some(path) => {
                debug!("Loading schema {}", path.display());
                Some(Arc::new(read_json(&path, stem)?))
            }
            None => None,
        };
        self.json.insert(key, document.clone());
        Ok(document)
    }

    /// Load a bundle JSON schema that must exist.
    pub fn require_json(&mut self, standard: Standard, stem: &str) -> Result<Arc<Value>> {
        match self.load_json(standard, stem)? {
            Some(document) => Ok(document),
            None => Err(self.missing(
                self.assets
                    .json_schema_dir(standard)
                    .join(format!("{}.json", self.mapped_stem(stem))),
                standard,
                stem,
            )),
        }
    }

    /// OpenAPI description of a schema (`openapi/<id>.yaml`)
    pub fn load_openapi(&mut self, standard: Standard, schema_id: &str) -> Result<Value> {
        let path = self
            .assets
            .openapi_dir(standard)
            .join(format!("{}.yaml", schema_id));
        if !path.is_file() {
            return Err(self.missing(path, standard, schema_id));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Path of the CSDL file of a bundle schema
    pub fn csdl_path(&self, standard: Standard, schema_id: &str) -> PathBuf {
        self.assets
            .csdl_dir(standard)
            .join(format!("{}_v1.xml", schema_id))
    }

    /// Path of the CSDL file of an extension schema
    pub fn extension_csdl_path(&self, schema_id: &str) -> PathBuf {
        self.assets
            .extension_csdl_dir()
            .join(format!("{}_v1.xml", schema_id))
    }

    /// Parse the CSDL file at `path`
    pub fn load_csdl(&self, path: &Path) -> Result<CsdlDocument> {
        if !path.is_file() {
            return Err(GenError::MissingDocument {
                path: path.to_path_buf(),
                suggestion: None,
            });
        }
        let content = fs::read_to_string(path)?;
        CsdlDocument::parse(&content)
    }

    /// Load `<name>.<tag>.json` from the extension area.
    pub fn load_extension(&mut self, name: &str, tag: &str) -> Result<Option<Arc<Value>>> {
        let stem = format!("{}.{}", name, tag);
        if let Some(cached) = self.extensions.get(&stem) {
            return Ok(cached.clone());
        }
        let path = self
            .assets
            .extension_json_dir()
            .join(format!("{}.json", stem));
        let document = if path.is_file() {
            debug!("Loading extension schema {}", path.display());
            Some(Arc::new(read_json(&path, &stem)?))
        } else {
            None
        };
        self.extensions.insert(stem, document.clone());
        Ok(document)
    }

    /// Path an extension document would be loaded from
    pub fn extension_path(&self, name: &str, tag: &str) -> PathBuf {
        self.assets
            .extension_json_dir()
            .join(format!("{}.{}.json", name, tag))
    }

    /// Every versioned document in the extension area, sorted by file name.
    ///
    /// Unversioned files are skipped.
    pub fn extension_documents(&self) -> Result<Vec<ExtensionDocument>> {
        let dir = self.assets.extension_json_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let (schema_id, tag) = split_versioned_stem(stem);
            match tag.and_then(SchemaVersion::parse) {
                Some(version) => documents.push(ExtensionDocument {
                    schema_id: schema_id.to_string(),
                    version,
                    path: path.to_path_buf(),
                }),
                None => debug!("Skipping unversioned extension schema {}", stem),
            }
        }
        Ok(documents)
    }

    /// Extension document of `schema_id`: the given version, or the latest
    /// one when `version` is `None`.
    pub fn find_extension(
        &self,
        schema_id: &str,
        version: Option<&SchemaVersion>,
    ) -> Result<Option<ExtensionDocument>> {
        Ok(self
            .extension_documents()?
            .into_iter()
            .filter(|doc| doc.schema_id == schema_id)
            .filter(|doc| version.map_or(true, |v| doc.version == *v))
            .max_by(|a, b| a.version.cmp(&b.version)))
    }

    /// Greatest `<id>.vMAJOR_MINOR[_PATCH].json` in a bundle.
    pub fn latest_version(&self, standard: Standard, schema_id: &str) -> Result<Option<SchemaVersion>> {
        let dir = self.assets.json_schema_dir(standard);
        if !dir.is_dir() {
            return Ok(None);
        }
        let file_id = self
            .file_map
            .get(schema_id)
            .map(|s| s.as_str())
            .unwrap_or(schema_id);
        let pattern = Regex::new(&format!(
            r"^{}\.(v\d+_\d+(?:_\d+)?)\.json$",
            regex::escape(file_id)
        ))
        .map_err(|e| GenError::Lookup(e.to_string()))?;

        let mut latest: Option<SchemaVersion> = None;
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy();
            let Some(version) = pattern
                .captures(&name)
                .and_then(|c| c.get(1))
                .and_then(|m| SchemaVersion::parse(m.as_str()))
            else {
                continue;
            };
            if latest.as_ref().map_or(true, |current| version > *current) {
                latest = Some(version);
            }
        }
        Ok(latest)
    }

    /// Bind the unversioned spec of a constructed node to its schema id.
    ///
    /// Bound documents take precedence when references are resolved.
    pub fn bind_node_document(&mut self, schema_id: &str, document: Arc<Value>) {
        self.bound.insert(schema_id.to_string(), document);
    }

    /// Target document of a non-local reference: bound node documents
    /// first, then the bundle. `None` if neither has it.
    pub fn reference_document(&mut self, reference: &SchemaRef) -> Result<Option<Arc<Value>>> {
        let Some(stem) = reference.stem() else {
            return Ok(None);
        };
        if let Some(bound) = self.bound.get(stem) {
            return Ok(Some(Arc::clone(bound)));
        }
        let document = self.load_json(reference.standard(), stem)?;
        if document.is_none() {
            warn!("Referenced schema {} not found in the bundle", stem);
        }
        Ok(document)
    }

    /// Closest existing bundle schema name to `stem`
    pub fn suggest(&self, standard: Standard, stem: &str) -> Option<String> {
        let dir = self.assets.json_schema_dir(standard);
        let matcher = SkimMatcherV2::default();
        let mut best: Option<(i64, String)> = None;

        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).into_iter().flatten() {
            let path = entry.path();
            let Some(candidate) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let (candidate_id, _) = split_versioned_stem(candidate);
            if let Some(score) = matcher
                .fuzzy_match(candidate_id, stem)
                .or_else(|| matcher.fuzzy_match(stem, candidate_id))
            {
                if best.as_ref().map_or(true, |(s, _)| score > *s) {
                    best = Some((score, candidate_id.to_string()));
                }
            }
        }
        best.map(|(_, name)| name)
    }

    fn missing(&self, path: PathBuf, standard: Standard, stem: &str) -> GenError {
        let (id, _) = split_versioned_stem(stem);
        GenError::MissingDocument {
            path,
            suggestion: self.suggest(standard, id).filter(|s| s != id),
        }
    }
}

fn read_json(path: &Path, stem: &str) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| GenError::corrupted(stem, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, DocumentStore) {
        let dir = tempdir().unwrap();
        let config = GenConfig::rooted(dir.path(), dir.path());
        for (relative, content) in files {
            let path = dir.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let store = DocumentStore::new(&config);
        (dir, store)
    }

    const JSON_DIR: &str = "assets/schemas/bundle/json-schema";

    #[test]
    fn test_latest_version_orders_numerically() {
        let (_dir, store) = store_with(&[
            (&format!("{}/Power.v1_0_0.json", JSON_DIR), "{}"),
            (&format!("{}/Power.v1_7_6.json", JSON_DIR), "{}"),
            (&format!("{}/Power.v1_10_0.json", JSON_DIR), "{}"),
            (&format!("{}/PowerSupply.v2_0_0.json", JSON_DIR), "{}"),
            (&format!("{}/Power.json", JSON_DIR), "{}"),
        ]);
        let latest = store.latest_version(Standard::Redfish, "Power").unwrap().unwrap();
        assert_eq!(latest.tag(), "v1_10_0");
        assert!(store.latest_version(Standard::Redfish, "Thermal").unwrap().is_none());
    }

    #[test]
    fn test_latest_version_ranks_two_part_tags() {
        let (_dir, store) = store_with(&[
            (&format!("{}/Sensor.v1_2.json", JSON_DIR), "{}"),
            (&format!("{}/Sensor.v1_1_9.json", JSON_DIR), "{}"),
            (&format!("{}/Fan.v1_0_3.json", JSON_DIR), "{}"),
            (&format!("{}/Fan.v1_1.json", JSON_DIR), "{}"),
        ]);
        let sensor = store.latest_version(Standard::Redfish, "Sensor").unwrap().unwrap();
        assert_eq!(sensor.tag(), "v1_2");
        let fan = store.latest_version(Standard::Redfish, "Fan").unwrap().unwrap();
        assert_eq!(fan.tag(), "v1_1");
    }

    #[test]
    fn test_dotted_version_fallback() {
        let (_dir, mut store) = store_with(&[(
            &format!("{}/Old.1.0.0.json", JSON_DIR),
            r#"{"title": "Old"}"#,
        )]);
        let doc = store.load_json(Standard::Redfish, "Old.v1_0_0").unwrap().unwrap();
        assert_eq!(doc["title"], json!("Old"));
    }

    #[test]
    fn test_file_map_applies() {
        let (_dir, mut store) = store_with(&[(
            &format!("{}/redfish-schema.v1_0_0.json", JSON_DIR),
            "{}",
        )]);
        assert!(store
            .load_json(Standard::Redfish, "RedfishExtensions.v1_0_0")
            .unwrap()
            .is_some());
        assert_eq!(
            store
                .latest_version(Standard::Redfish, "RedfishExtensions")
                .unwrap()
                .unwrap()
                .tag(),
            "v1_0_0"
        );
    }

    #[test]
    fn test_corrupted_json_is_fatal() {
        let (_dir, mut store) = store_with(&[(&format!("{}/Bad.json", JSON_DIR), "{ nope")]);
        assert!(matches!(
            store.load_json(Standard::Redfish, "Bad"),
            Err(GenError::CorruptedSchema { .. })
        ));
    }

    #[test]
    fn test_missing_document_suggests_nearest() {
        let (_dir, mut store) = store_with(&[(&format!("{}/Chassis.json", JSON_DIR), "{}")]);
        match store.require_json(Standard::Redfish, "Chasis") {
            Err(GenError::MissingDocument { suggestion, .. }) => {
                assert_eq!(suggestion.as_deref(), Some("Chassis"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_bound_documents_take_precedence() {
        let (_dir, mut store) = store_with(&[(
            &format!("{}/Chassis.json", JSON_DIR),
            r#"{"title": "bundle"}"#,
        )]);
        store.bind_node_document("Chassis", Arc::new(json!({"title": "bound"})));
        let reference = SchemaRef::parse("Chassis.json#/definitions/Chassis").unwrap();
        let doc = store.reference_document(&reference).unwrap().unwrap();
        assert_eq!(doc["title"], json!("bound"));
    }

    #[test]
    fn test_extension_documents_skip_unversioned() {
        let (_dir, store) = store_with(&[
            ("assets/oem/json-schema/ExtFoo.v1_0_0.json", "{}"),
            ("assets/oem/json-schema/ExtFoo.json", "{}"),
        ]);
        let docs = store.extension_documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].schema_id, "ExtFoo");
        assert_eq!(docs[0].version.tag(), "v1_0_0");
    }
}
