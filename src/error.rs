//! Error types for the generator

use std::path::PathBuf;

use thiserror::Error;

/// Result type for generator operations
pub type Result<T> = std::result::Result<T, GenError>;

/// Generator errors
///
/// Every variant is fatal for the run: one corrupt schema or declaration
/// must fail the whole build.
#[derive(Error, Debug)]
pub enum GenError {
    #[error("API standard \"{0}\" is not supported")]
    UnsupportedStandard(String),

    #[error("Node config '{node}': required field 'Schema' is missing")]
    MissingSchemaId { node: String },

    #[error("Schema document not found: {path}{}", suggestion_suffix(.suggestion))]
    MissingDocument {
        path: PathBuf,
        suggestion: Option<String>,
    },

    #[error("Invalid declaration of {context}: {reason}")]
    MalformedDeclaration { context: String, reason: String },

    #[error("Invalid template ({template}) of link ({link}) specified")]
    InvalidLinkTemplate { template: String, link: String },

    #[error("Unable to find all inner schemas in properties, max nesting depth reached: {depth}")]
    NestingTooDeep { depth: usize },

    #[error("The node config '{segment}' is not valid to specified schema {classname}: id {id} is not declared")]
    InvalidNode {
        segment: String,
        classname: String,
        id: String,
    },

    #[error("Schema '{schema}' is corrupted: {reason}")]
    CorruptedSchema { schema: String, reason: String },

    #[error("Could not resolve fragment of {0}")]
    UnresolvedFragment(String),

    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("Schema closure did not converge after {passes} passes, pending: {}", .pending.join(", "))]
    ClosureNotConverged { passes: usize, pending: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{}'?)", name),
        None => String::new(),
    }
}

impl GenError {
    pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        GenError::MalformedDeclaration {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn corrupted(schema: impl Into<String>, reason: impl Into<String>) -> Self {
        GenError::CorruptedSchema {
            schema: schema.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_document_mentions_suggestion() {
        let err = GenError::MissingDocument {
            path: PathBuf::from("json-schema/Chasis.json"),
            suggestion: Some("Chassis".to_string()),
        };
        let message = err.to_string();
        assert!(message.contains("Chasis.json"));
        assert!(message.contains("did you mean 'Chassis'"));
    }

    #[test]
    fn test_closure_error_lists_pending() {
        let err = GenError::ClosureNotConverged {
            passes: 10,
            pending: vec!["Power".to_string(), "Thermal".to_string()],
        };
        assert!(err.to_string().ends_with("Power, Thermal"));
    }
}
