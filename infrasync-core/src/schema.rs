//! Infrahub schema model.
//!
//! Mirrors the subset of `GET /api/schema` that the tool reflects over:
//! node kinds, their attributes (with value kinds) and their relationships
//! (with peer kind and cardinality). Unknown keys in the payload are ignored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::SyncConfig;

/// Whether a relationship points at one peer or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::One => write!(f, "one"),
            Cardinality::Many => write!(f, "many"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub name: String,
    /// Value kind (`Text`, `Number`, `Boolean`, `IPHost`, ...).
    pub kind: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipSchema {
    pub name: String,
    /// Kind of the peer node.
    pub peer: String,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSchema {
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeSchema>,
    #[serde(default)]
    pub relationships: Vec<RelationshipSchema>,
}

impl NodeSchema {
    /// Fully qualified kind: namespace followed by name (`LocationSite`).
    pub fn kind(&self) -> String {
        format!("{}{}", self.namespace, self.name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipSchema> {
        self.relationships.iter().find(|r| r.name == name)
    }
}

/// Root of the schema payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SchemaRoot {
    #[serde(default)]
    pub nodes: Vec<NodeSchema>,
    #[serde(default)]
    pub generics: Vec<NodeSchema>,
}

impl SchemaRoot {
    /// Node (not generic) with the given kind.
    pub fn node(&self, kind: &str) -> Option<&NodeSchema> {
        self.nodes.iter().find(|n| n.kind() == kind)
    }
}

/// Mapped model names with no matching node kind in `schema`, in declaration order.
pub fn find_missing_schema_models(config: &SyncConfig, schema: &SchemaRoot) -> Vec<String> {
    config
        .schema_mapping
        .iter()
        .filter(|model| schema.node(&model.name).is_none())
        .map(|model| model.name.clone())
        .collect()
}
