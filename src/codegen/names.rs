//! Class names handed to renderers
//!
//! Renderers never derive names themselves; every name in a [`NodeModel`]
//! comes from here so that the same node is spelled the same way wherever
//! it is referenced.
//!
//! [`NodeModel`]: super::NodeModel

/// Prefix of every node class
pub const NODE_CLASS_PREFIX: &str = "Redfish";

/// `chassisCollection` -> `RedfishChassisCollection`
pub fn node_classname(key: &str) -> String {
    format!("{}{}", NODE_CLASS_PREFIX, capitalize(key))
}

/// Reference to a single child node
pub fn id_reference(classname: &str) -> String {
    format!("IdReference<{}>", classname)
}

/// Reference listing several child node kinds under one field
pub fn list_references(classnames: &[String]) -> String {
    format!("ListReferences<{}>", classnames.join(","))
}

/// Aggregate getter of every extension of one owner
pub fn oem_getter(names: &[&str]) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    Some(format!("OemGetter<{}>", names.join(",")))
}

/// Aggregate getter of every link of one owner
pub fn links_getter(classnames: &[&str]) -> Option<String> {
    if classnames.is_empty() {
        return None;
    }
    Some(format!("LinksGetter<{}>", classnames.join(",")))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
