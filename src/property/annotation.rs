//! OData annotations

use serde::Serialize;
use serde_json::Value;

use super::{required_str, GetterStrategy};
use crate::error::{GenError, Result};

/// Annotation sub-type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum AnnotationKind {
    /// `@odata.id` of the enclosing resource
    ODataId,
    /// `@odata.count` of the named collection
    ODataCount { field: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub annotation: AnnotationKind,
    pub getter: GetterStrategy,
}

impl Annotation {
    pub fn parse(declaration: &Value) -> Result<Self> {
        let kind = required_str(declaration, "Type", "annotation")?;
        let annotation = match kind {
            "ODataId" => AnnotationKind::ODataId,
            "ODataCount" => AnnotationKind::ODataCount {
                field: required_str(declaration, "Field", "ODataCount annotation")?.to_string(),
            },
            other => {
                return Err(GenError::malformed(
                    "annotation",
                    format!("unknown annotation type '{}'", other),
                ))
            }
        };
        let getter = match &annotation {
            AnnotationKind::ODataId => GetterStrategy::ODataId,
            AnnotationKind::ODataCount { field } => GetterStrategy::CollectionSize(field.clone()),
        };
        Ok(Self { annotation, getter })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_annotation_dispatch() {
        let id = Annotation::parse(&json!({"Type": "ODataId"})).unwrap();
        assert_eq!(id.annotation, AnnotationKind::ODataId);

        let count = Annotation::parse(&json!({"Type": "ODataCount", "Field": "Members"})).unwrap();
        assert_eq!(count.getter, GetterStrategy::CollectionSize("Members".into()));
    }

    #[test]
    fn test_annotation_errors() {
        assert!(Annotation::parse(&json!({"Type": "ODataCount"})).is_err());
        assert!(matches!(
            Annotation::parse(&json!({"Type": "ODataEtag"})),
            Err(GenError::MalformedDeclaration { .. })
        ));
    }
}
