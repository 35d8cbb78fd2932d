//! Node declaration files
//!
//! ```yaml
//! Chassis@dynamic:
//!   Schema: Chassis
//!   Version: 1.7.6
//!   Parameter:
//!     Type: Entity
//!     Parameter: ChassisId
//!     Source: ChassisEntity
//!   Actions:
//!     Get:
//!       Reference:
//!         - Node: Power
//!       Properties:
//!         Static: [...]
//! ```

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::codegen::names::{id_reference, list_references, node_classname};
use crate::error::{GenError, Result};

const DYNAMIC_SUFFIX: &str = "dynamic";

/// One parsed declaration file
#[derive(Debug, Clone)]
pub struct NodeDeclaration {
    /// Top-level key with any `@` suffix removed
    pub key: String,
    pub dynamic: bool,
    pub body: Value,
}

impl NodeDeclaration {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let document: Value = serde_yaml::from_str(&content)?;
        Self::parse(document, &path.display().to_string())
    }

    /// A declaration holds exactly one top-level key `Segment[@dynamic]`.
    pub fn parse(document: Value, origin: &str) -> Result<Self> {
        let Value::Object(map) = document else {
            return Err(GenError::malformed(origin, "a declaration must be a mapping"));
        };
        if map.len() != 1 {
            return Err(GenError::malformed(
                origin,
                format!("exactly one node must be declared per file, found {}", map.len()),
            ));
        }
        let Some((key, body)) = map.into_iter().next() else {
            return Err(GenError::malformed(origin, "no node declared"));
        };

        let mut parts = key.split('@');
        let segment = parts.next().unwrap_or_default().to_string();
        let dynamic = match (parts.next(), parts.next()) {
            (None, _) => false,
            (Some(DYNAMIC_SUFFIX), None) => true,
            (Some(kind), None) => {
                return Err(GenError::malformed(origin, format!("unknown node kind '@{}'", kind)))
            }
            (Some(_), Some(_)) => return Err(GenError::malformed(origin, format!("invalid node key '{}'", key))),
        };
        if segment.is_empty() {
            return Err(GenError::malformed(origin, "empty node key"));
        }

        Ok(Self {
            key: segment,
            dynamic,
            body,
        })
    }

    /// `Actions.Get`, if declared
    pub fn get_action(&self) -> Option<&Value> {
        self.body.get("Actions").and_then(|a| a.get("Get"))
    }

    /// Property declarations: `Actions.Get.Properties`, else top-level
    /// `Properties`.
    pub fn properties(&self) -> Option<&Value> {
        self.get_action()
            .and_then(|get| get.get("Properties"))
            .or_else(|| self.body.get("Properties"))
    }
}

/// How a child is exposed in its parent's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReferenceKind {
    /// `{"@odata.id": ...}` of one child
    Object,
    /// List of several child kinds under one field
    List,
}

/// One `Reference` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildRef {
    /// Declaration keys of the referenced nodes
    pub nodes: Vec<String>,
    pub field: String,
    pub hidden: bool,
    pub kind: ReferenceKind,
    pub classname: String,
}

impl ChildRef {
    fn parse(entry: &Value) -> std::result::Result<Self, String> {
        let nodes = match entry.get("Node") {
            Some(Value::String(node)) => vec![node.clone()],
            Some(Value::Array(list)) => list
                .iter()
                .map(|n| n.as_str().map(String::from).ok_or("'Node' list entries must be names"))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            Some(_) => return Err("'Node' must be a name or a list of names".into()),
            None => return Err("'Node' is required in a reference".into()),
        };
        let multi = matches!(entry.get("Node"), Some(Value::Array(_)));

        let field = match entry.get("Field").and_then(Value::as_str) {
            Some(field) => field.to_string(),
            None if multi => return Err("'Field' is required when 'Node' is a list".into()),
            None => nodes[0].clone(),
        };

        let classnames: Vec<String> = nodes.iter().map(|n| node_classname(n)).collect();
        let (kind, classname) = if multi {
            (ReferenceKind::List, list_references(&classnames))
        } else {
            (ReferenceKind::Object, id_reference(&classnames[0]))
        };

        Ok(Self {
            nodes,
            field,
            hidden: entry.get("Hide").and_then(Value::as_bool).unwrap_or(false),
            kind,
            classname,
        })
    }
}

/// Children a node declares under `Actions.Get.Reference`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "references")]
pub enum ChildReferences {
    #[default]
    NoChildren,
    Children(Vec<ChildRef>),
}

impl ChildReferences {
    /// Parse the reference list of `get`.
    ///
    /// An absent list means no children. A malformed one is reported and
    /// dropped, unless `strict`.
    pub fn parse(get: Option<&Value>, node: &str, strict: bool) -> Result<Self> {
        let Some(list) = get.and_then(|g| g.get("Reference")) else {
            return Ok(ChildReferences::NoChildren);
        };
        match Self::parse_list(list) {
            Ok(children) if children.is_empty() => Ok(ChildReferences::NoChildren),
            Ok(children) => Ok(ChildReferences::Children(children)),
            Err(reason) if strict => Err(GenError::malformed(format!("references of node '{}'", node), reason)),
            Err(reason) => {
                warn!("Ignoring references of node '{}': {}", node, reason);
                Ok(ChildReferences::NoChildren)
            }
        }
    }

    fn parse_list(list: &Value) -> std::result::Result<Vec<ChildRef>, String> {
        match list {
            Value::Null => Ok(Vec::new()),
            Value::Array(entries) => entries.iter().map(ChildRef::parse).collect(),
            _ => Err("'Reference' must be a list".into()),
        }
    }

    pub fn all(&self) -> &[ChildRef] {
        match self {
            ChildReferences::NoChildren => &[],
            ChildReferences::Children(children) => children,
        }
    }

    /// References rendered into the payload (hidden ones skipped)
    pub fn visible(&self) -> impl Iterator<Item = &ChildRef> {
        self.all().iter().filter(|c| !c.hidden)
    }

    /// Class names of every child node, hidden ones included
    pub fn child_classnames(&self) -> Vec<String> {
        self.all()
            .iter()
            .flat_map(|c| c.nodes.iter().map(|n| node_classname(n)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_dynamic_key() {
        let decl = NodeDeclaration::parse(json!({"Chassis@dynamic": {"Schema": "Chassis"}}), "t").unwrap();
        assert_eq!(decl.key, "Chassis");
        assert!(decl.dynamic);

        let plain = NodeDeclaration::parse(json!({"ChassisCollection": {"Schema": "ChassisCollection"}}), "t").unwrap();
        assert!(!plain.dynamic);
    }

    #[test]
    fn test_parse_rejects_bad_keys() {
        assert!(NodeDeclaration::parse(json!({"A": {}, "B": {}}), "t").is_err());
        assert!(NodeDeclaration::parse(json!({"A@static": {}}), "t").is_err());
        assert!(NodeDeclaration::parse(json!({"A@dynamic@x": {}}), "t").is_err());
        assert!(NodeDeclaration::parse(json!(["A"]), "t").is_err());
    }

    #[test]
    fn test_properties_location() {
        let nested = NodeDeclaration::parse(
            json!({"Power": {"Actions": {"Get": {"Properties": {"Static": []}}}}}),
            "t",
        )
        .unwrap();
        assert!(nested.properties().is_some());

        let top = NodeDeclaration::parse(json!({"Power": {"Properties": {"Static": []}}}), "t").unwrap();
        assert!(top.properties().is_some());
    }

    #[test]
    fn test_child_references() {
        let get = json!({"Reference": [
            {"Node": "Power"},
            {"Node": ["Sensors", "Thermal"], "Field": "Environment"},
            {"Node": "Assembly", "Hide": true}
        ]});
        let children = ChildReferences::parse(Some(&get), "Chassis", true).unwrap();
        let all = children.all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].field, "Power");
        assert_eq!(all[0].classname, "IdReference<RedfishPower>");
        assert_eq!(all[1].classname, "ListReferences<RedfishSensors,RedfishThermal>");
        assert_eq!(children.visible().count(), 2);
        assert_eq!(children.child_classnames().len(), 4);
    }

    #[test]
    fn test_absent_and_malformed_references() {
        assert_eq!(
            ChildReferences::parse(Some(&json!({})), "Chassis", true).unwrap(),
            ChildReferences::NoChildren
        );
        assert_eq!(ChildReferences::parse(None, "Chassis", true).unwrap(), ChildReferences::NoChildren);

        let malformed = json!({"Reference": [{"Node": ["Sensors", "Thermal"]}]});
        assert_eq!(
            ChildReferences::parse(Some(&malformed), "Chassis", false).unwrap(),
            ChildReferences::NoChildren
        );
        assert!(ChildReferences::parse(Some(&malformed), "Chassis", true).is_err());
    }
}
