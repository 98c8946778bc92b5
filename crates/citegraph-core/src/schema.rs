//! Field definitions for the citation graph collection.
//!
//! [`citation_schema`] is the single place the document shape is declared.
//! The provisioner walks it in order and adds whatever the collection is
//! missing; adding a field to the domain model means adding one row to
//! [`CITATION_FIELDS`].

use serde::{Deserialize, Serialize};

/// Value type of a schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// 32-bit integer (`pint`).
    Integer,
    /// 64-bit integer (`plong`).
    Long,
    /// Tokenized full text (`text_general`).
    Text,
    /// Exact-match string (`string`).
    String,
    /// A type this crate does not model, kept verbatim when read back from a cluster.
    Other(std::string::String),
}

impl FieldType {
    /// Solr type name for this value type.
    ///
    /// Numeric and exact-string types have distinct multi-valued variants in
    /// Solr's `_default` config set (`plongs`, `pints`, `strings`);
    /// `text_general` is used for both.
    pub fn solr_name(&self, multi_valued: bool) -> &str {
        match (self, multi_valued) {
            (FieldType::Integer, false) => "pint",
            (FieldType::Integer, true) => "pints",
            (FieldType::Long, false) => "plong",
            (FieldType::Long, true) => "plongs",
            (FieldType::Text, _) => "text_general",
            (FieldType::String, false) => "string",
            (FieldType::String, true) => "strings",
            (FieldType::Other(name), _) => name.as_str(),
        }
    }

    /// Parse a Solr type name back into a value type.
    ///
    /// Returns the type and whether the name itself implies multiple values.
    pub fn from_solr_name(name: &str) -> (FieldType, bool) {
        match name {
            "pint" => (FieldType::Integer, false),
            "pints" => (FieldType::Integer, true),
            "plong" => (FieldType::Long, false),
            "plongs" => (FieldType::Long, true),
            "text_general" => (FieldType::Text, false),
            "string" => (FieldType::String, false),
            "strings" => (FieldType::String, true),
            other => (FieldType::Other(other.to_string()), false),
        }
    }
}

/// One field of the collection schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub stored: bool,
    pub multi_valued: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            stored: true,
            multi_valued: false,
        }
    }

    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    /// The Solr type name this field is declared with.
    pub fn solr_type(&self) -> &str {
        self.field_type.solr_name(self.multi_valued)
    }
}

/// `(name, type, multi_valued)` for every field of a citation document.
/// All fields are stored.
pub const CITATION_FIELDS: &[(&str, FieldType, bool)] = &[
    ("id", FieldType::Long, false),
    ("title", FieldType::Text, false),
    ("year", FieldType::Integer, false),
    ("publisher", FieldType::Text, false),
    ("doi", FieldType::String, false),
    ("author_names", FieldType::Text, true),
    ("references", FieldType::Long, true),
];

/// The ordered field set a citation collection must carry.
pub fn citation_schema() -> Vec<FieldDefinition> {
    CITATION_FIELDS
        .iter()
        .map(|(name, field_type, multi)| {
            let field = FieldDefinition::new(*name, field_type.clone());
            if *multi {
                field.multi_valued()
            } else {
                field
            }
        })
        .collect()
}
