//! Schema addressing types
//!
//! `Standard` selects the bundle a document lives in, `SchemaRef` is a parsed
//! `$ref` and `CsdlDocument` is the slice of a CSDL file the index needs.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use url::Url;

use crate::error::{GenError, Result};
use crate::version::split_versioned_stem;

/// Base every relative `$ref` in the DMTF bundle is resolved against
pub const SCHEMA_BASE_URI: &str = "http://redfish.dmtf.org/schemas/v1/";

/// Suffix of references that point at an id property (never chased)
const ID_REF_SUFFIX: &str = "/idRef";

/// API standard a schema belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Standard {
    #[serde(rename = "redfish")]
    Redfish,
    #[serde(rename = "redfish/swordfish")]
    Swordfish,
}

impl Standard {
    /// Parse a standard name; anything but the two known names is fatal.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "redfish" => Ok(Standard::Redfish),
            "redfish/swordfish" => Ok(Standard::Swordfish),
            other => Err(GenError::UnsupportedStandard(other.to_string())),
        }
    }

    /// Standard implied by a reference URI
    pub fn from_uri(uri: &str) -> Self {
        if uri.contains("swordfish") {
            Standard::Swordfish
        } else {
            Standard::Redfish
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Standard::Redfish => "redfish",
            Standard::Swordfish => "redfish/swordfish",
        }
    }
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed `$ref`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRef {
    raw: String,
    /// File stem of the target document, `None` for local `#/...` references
    stem: Option<String>,
    /// Path segments of the fragment
    pointer: Vec<String>,
    standard: Standard,
}

impl SchemaRef {
    pub fn parse(raw: &str) -> Result<Self> {
        let pointer = |fragment: &str| -> Vec<String> {
            fragment
                .split('/')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        };

        if let Some(fragment) = raw.strip_prefix('#') {
            return Ok(Self {
                raw: raw.to_string(),
                stem: None,
                pointer: pointer(fragment),
                standard: Standard::Redfish,
            });
        }

        let base = Url::parse(SCHEMA_BASE_URI)
            .map_err(|e| GenError::Lookup(format!("invalid base uri: {}", e)))?;
        let url = base
            .join(raw)
            .map_err(|e| GenError::Lookup(format!("invalid reference '{}': {}", raw, e)))?;

        let file = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default();
        let stem = file.strip_suffix(".json").unwrap_or(file);
        if stem.is_empty() {
            return Err(GenError::Lookup(format!(
                "reference '{}' does not name a document",
                raw
            )));
        }

        Ok(Self {
            raw: raw.to_string(),
            stem: Some(stem.to_string()),
            pointer: pointer(url.fragment().unwrap_or_default()),
            standard: Standard::from_uri(raw),
        })
    }

    pub fn stem(&self) -> Option<&str> {
        self.stem.as_deref()
    }

    /// Schema id of the target document (stem without version)
    pub fn schema_id(&self) -> Option<&str> {
        self.stem.as_deref().map(|s| split_versioned_stem(s).0)
    }

    pub fn pointer(&self) -> &[String] {
        &self.pointer
    }

    /// Last fragment segment, e.g. the enum type name
    pub fn last_segment(&self) -> Option<&str> {
        self.pointer.last().map(|s| s.as_str())
    }

    pub fn standard(&self) -> Standard {
        self.standard
    }

    pub fn is_local(&self) -> bool {
        self.stem.is_none()
    }

    pub fn is_id_ref(&self) -> bool {
        self.raw.ends_with(ID_REF_SUFFIX)
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Walk `pointer` inside `root`.
///
/// A `definitions` segment missing from the current object is looked up as
/// `properties`, which some bundle documents use instead. With `strict` a
/// missing segment yields `None`; otherwise it is skipped and the walk keeps
/// the last object found.
pub fn walk_pointer<'a>(root: &'a Value, pointer: &[String], strict: bool) -> Option<&'a Value> {
    let mut current = root;
    for segment in pointer {
        let key = if segment == "definitions" && current.get("definitions").is_none() {
            "properties"
        } else {
            segment.as_str()
        };
        match current.get(key) {
            Some(next) => current = next,
            None if strict => return None,
            None => continue,
        }
    }
    Some(current)
}

/// Namespaces declared by a CSDL document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsdlDocument {
    pub namespaces: Vec<String>,
}

impl CsdlDocument {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut namespaces = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) => {
                    if e.local_name().as_ref() == b"Schema" {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"Namespace" {
                                namespaces.push(String::from_utf8_lossy(&attr.value).into_owned());
                            }
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(Self { namespaces })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_parse() {
        assert_eq!(Standard::parse("redfish").unwrap(), Standard::Redfish);
        assert_eq!(Standard::parse("redfish/swordfish").unwrap(), Standard::Swordfish);
        assert!(matches!(
            Standard::parse("gopher"),
            Err(GenError::UnsupportedStandard(_))
        ));
    }

    #[test]
    fn test_absolute_reference() {
        let r = SchemaRef::parse(
            "http://redfish.dmtf.org/schemas/v1/Resource.v1_14_0.json#/definitions/Status",
        )
        .unwrap();
        assert_eq!(r.stem(), Some("Resource.v1_14_0"));
        assert_eq!(r.schema_id(), Some("Resource"));
        assert_eq!(r.pointer(), ["definitions", "Status"]);
        assert_eq!(r.standard(), Standard::Redfish);
        assert!(!r.is_id_ref());
    }

    #[test]
    fn test_relative_and_local_references() {
        let r = SchemaRef::parse("Chassis.json#/definitions/Chassis").unwrap();
        assert_eq!(r.stem(), Some("Chassis"));

        let local = SchemaRef::parse("#/definitions/PowerState").unwrap();
        assert!(local.is_local());
        assert_eq!(local.last_segment(), Some("PowerState"));
    }

    #[test]
    fn test_swordfish_and_id_ref() {
        let r = SchemaRef::parse(
            "http://redfish.dmtf.org/schemas/swordfish/v1/Volume.json#/definitions/Volume",
        )
        .unwrap();
        assert_eq!(r.standard(), Standard::Swordfish);

        let id = SchemaRef::parse("http://redfish.dmtf.org/schemas/v1/odata-v4.json#/definitions/idRef")
            .unwrap();
        assert!(id.is_id_ref());
    }

    #[test]
    fn test_walk_pointer_substitutes_properties() {
        let doc = json!({"properties": {"Status": {"type": "object"}}});
        let pointer = vec!["definitions".to_string(), "Status".to_string()];
        assert_eq!(
            walk_pointer(&doc, &pointer, true),
            Some(&json!({"type": "object"}))
        );
        let missing = vec!["definitions".to_string(), "Health".to_string()];
        assert_eq!(walk_pointer(&doc, &missing, true), None);
        assert!(walk_pointer(&doc, &missing, false).is_some());
    }

    #[test]
    fn test_csdl_namespaces() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
  <edmx:DataServices>
    <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="Chassis"/>
    <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="Chassis.v1_0_0">
      <EntityType Name="Chassis"/>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;
        let csdl = CsdlDocument::parse(xml).unwrap();
        assert_eq!(csdl.namespaces, vec!["Chassis", "Chassis.v1_0_0"]);
    }
}
