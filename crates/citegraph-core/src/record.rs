//! Raw citation records and their reshaping into collection documents.
//!
//! Input records arrive as arbitrary JSON objects (one per input line). Only
//! the identifier is mandatory; every other field degrades to an empty or
//! absent value when missing or malformed, so a single odd record never
//! costs more than its own bad fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A record reshaped to the collection schema, ready for submission.
///
/// Serializes to the wire shape
/// `{id, title, year, publisher, doi, author_names, references}`,
/// with `year` as `null` when unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDocument {
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub publisher: String,
    pub doi: String,
    pub author_names: Vec<String>,
    pub references: Vec<i64>,
}

/// Why a raw record could not be turned into a [`TargetDocument`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("record has no identifier")]
    MissingIdentifier,

    #[error("record identifier is not a 64-bit integer: {0}")]
    InvalidIdentifier(String),
}

/// Reshape a decoded record into a [`TargetDocument`].
///
/// Authors are flattened from `{"name": ...}` objects to plain names (bare
/// strings are accepted as names too); references keep only entries that
/// are integers or integer strings.
pub fn transform(raw: &Value) -> Result<TargetDocument, TransformError> {
    let obj = raw.as_object().ok_or(TransformError::MissingIdentifier)?;
    let id = identifier(obj)?;

    Ok(TargetDocument {
        id,
        title: text_field(obj, "title"),
        year: obj.get("year").and_then(as_year),
        publisher: text_field(obj, "publisher"),
        doi: text_field(obj, "doi"),
        author_names: author_names(obj),
        references: references(obj),
    })
}

fn identifier(obj: &Map<String, Value>) -> Result<i64, TransformError> {
    match obj.get("id") {
        None | Some(Value::Null) => Err(TransformError::MissingIdentifier),
        Some(value) => {
            as_long(value).ok_or_else(|| TransformError::InvalidIdentifier(value.to_string()))
        }
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn as_long(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_year(value: &Value) -> Option<i32> {
    as_long(value).and_then(|y| i32::try_from(y).ok())
}

fn author_names(obj: &Map<String, Value>) -> Vec<String> {
    let Some(Value::Array(authors)) = obj.get("authors") else {
        return Vec::new();
    };
    authors
        .iter()
        .filter_map(|author| match author {
            Value::Object(a) => a.get("name").and_then(Value::as_str).map(str::to_string),
            Value::String(name) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

fn references(obj: &Map<String, Value>) -> Vec<i64> {
    match obj.get("references") {
        Some(Value::Array(refs)) => refs.iter().filter_map(as_long).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_record() {
        let raw = json!({
            "id": 1091,
            "title": "Preliminary Design of a Network Protocol Learning Tool",
            "year": 2013,
            "publisher": "IEEE",
            "doi": "10.1109/example.2013.1",
            "authors": [{"name": "Ada Lovelace", "org": "X"}, {"name": "Alan Turing"}],
            "references": [2000, 3000],
            "venue": {"raw": "ignored"}
        });
        let doc = transform(&raw).unwrap();
        assert_eq!(doc.id, 1091);
        assert_eq!(doc.title, "Preliminary Design of a Network Protocol Learning Tool");
        assert_eq!(doc.year, Some(2013));
        assert_eq!(doc.publisher, "IEEE");
        assert_eq!(doc.doi, "10.1109/example.2013.1");
        assert_eq!(doc.author_names, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(doc.references, vec![2000, 3000]);
    }

    #[test]
    fn test_only_identifier() {
        let doc = transform(&json!({"id": 7})).unwrap();
        assert_eq!(doc.id, 7);
        assert_eq!(doc.title, "");
        assert_eq!(doc.year, None);
        assert_eq!(doc.publisher, "");
        assert_eq!(doc.doi, "");
        assert!(doc.author_names.is_empty());
        assert!(doc.references.is_empty());
    }

    #[test]
    fn test_identifier_preserved_at_extremes() {
        for id in [0, -1, i64::MAX, i64::MIN, 53_000_000_001] {
            assert_eq!(transform(&json!({"id": id})).unwrap().id, id);
        }
    }

    #[test]
    fn test_string_identifier_parsed() {
        assert_eq!(transform(&json!({"id": "42"})).unwrap().id, 42);
    }

    #[test]
    fn test_missing_identifier() {
        assert_eq!(
            transform(&json!({"title": "No id"})),
            Err(TransformError::MissingIdentifier)
        );
        assert_eq!(
            transform(&json!({"id": null})),
            Err(TransformError::MissingIdentifier)
        );
    }

    #[test]
    fn test_non_object_has_no_identifier() {
        assert_eq!(transform(&json!([1, 2])), Err(TransformError::MissingIdentifier));
        assert_eq!(transform(&json!(12)), Err(TransformError::MissingIdentifier));
    }

    #[test]
    fn test_unusable_identifier() {
        assert!(matches!(
            transform(&json!({"id": "abc"})),
            Err(TransformError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            transform(&json!({"id": 1.5})),
            Err(TransformError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_malformed_optionals_degrade() {
        let raw = json!({
            "id": 5,
            "title": null,
            "year": "unknown",
            "publisher": ["not", "a", "string"],
            "authors": "nobody",
            "references": {"not": "a list"}
        });
        let doc = transform(&raw).unwrap();
        assert_eq!(doc.id, 5);
        assert_eq!(doc.title, "");
        assert_eq!(doc.year, None);
        assert_eq!(doc.publisher, "");
        assert!(doc.author_names.is_empty());
        assert!(doc.references.is_empty());
    }

    #[test]
    fn test_authors_without_name_dropped() {
        let raw = json!({
            "id": 9,
            "authors": [{"name": "Grace Hopper"}, {"org": "Navy"}, "Edsger Dijkstra", 17]
        });
        let doc = transform(&raw).unwrap();
        assert_eq!(doc.author_names, vec!["Grace Hopper", "Edsger Dijkstra"]);
    }

    #[test]
    fn test_references_keep_integers_only() {
        let raw = json!({"id": 9, "references": [1, "2", "x", null, 3.5, 4]});
        assert_eq!(transform(&raw).unwrap().references, vec![1, 2, 4]);
    }

    #[test]
    fn test_year_out_of_range() {
        let doc = transform(&json!({"id": 1, "year": 9_999_999_999i64})).unwrap();
        assert_eq!(doc.year, None);
    }

    #[test]
    fn test_wire_shape() {
        let doc = transform(&json!({"id": 3, "authors": [{"name": "A"}]})).unwrap();
        let wire = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            wire,
            json!({
                "id": 3,
                "title": "",
                "year": null,
                "publisher": "",
                "doi": "",
                "author_names": ["A"],
                "references": []
            })
        );
    }
}
