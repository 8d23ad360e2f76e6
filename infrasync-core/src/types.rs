//! Sync configuration types.
//!
//! A sync configuration (`config.yml`) names a source and a destination
//! adapter and describes how every model is mapped between them. All types
//! deserialize from YAML via serde + serde_yaml.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a sync configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncName(pub String);

impl fmt::Display for SyncName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SyncName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SyncName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Flags altering which differences are acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncFlag {
    /// Ignore items present only in the source (no creates).
    SkipUnmatchedSrc,
    /// Ignore items present only in the destination (no deletes).
    SkipUnmatchedDst,
}

/// Which side of a sync an adapter serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterRole {
    Source,
    Destination,
}

impl fmt::Display for AdapterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterRole::Source => write!(f, "source"),
            AdapterRole::Destination => write!(f, "destination"),
        }
    }
}

/// Comparison applied by a [`FilterRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperation {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not contains")]
    NotContains,
    #[serde(rename = "is_empty")]
    IsEmpty,
    #[serde(rename = "is_not_empty")]
    IsNotEmpty,
    #[serde(rename = "regex")]
    Regex,
}

impl FilterOperation {
    /// Operations that compare against no value.
    pub fn is_unary(&self) -> bool {
        matches!(self, FilterOperation::IsEmpty | FilterOperation::IsNotEmpty)
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One side of a sync: the adapter factory key plus free-form settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncAdapterConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Map<String, Value>>,
}

impl SyncAdapterConfig {
    /// Raw setting value.
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.as_ref().and_then(|s| s.get(key))
    }

    /// String setting; empty strings count as unset.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.setting(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Keep a record only if `field` satisfies `operation` against `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    /// Dotted path into the raw record.
    pub field: String,
    pub operation: FilterOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Re-render `field` with a template expression after mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRule {
    pub field: String,
    pub expression: String,
}

/// How a single model field is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMappingField {
    pub name: String,
    /// Dotted path into the source record. Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<String>,
    /// Constant value, used instead of any lookup.
    #[serde(rename = "static", default, skip_serializing_if = "Option::is_none")]
    pub static_value: Option<Value>,
    /// Name of the peer model this field points at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl SchemaMappingField {
    /// Path read on the source side.
    pub fn source_path(&self) -> &str {
        self.mapping.as_deref().unwrap_or(&self.name)
    }
}

/// Mapping of one model between source and destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMappingModel {
    /// Model name; the destination kind for Infrahub.
    pub name: String,
    /// Source resource the records are fetched from.
    pub mapping: String,
    #[serde(default)]
    pub identifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<TransformRule>,
    #[serde(default)]
    pub fields: Vec<SchemaMappingField>,
}

impl SchemaMappingModel {
    pub fn field(&self, name: &str) -> Option<&SchemaMappingField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that are not identifiers, in declaration order.
    pub fn attribute_fields(&self) -> impl Iterator<Item = &SchemaMappingField> {
        self.fields
            .iter()
            .filter(move |f| !self.identifiers.contains(&f.name))
    }
}

/// Root of a `config.yml` sync configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub name: SyncName,
    pub source: SyncAdapterConfig,
    pub destination: SyncAdapterConfig,
    /// Model processing order; models not listed follow in declaration order.
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default, alias = "diffsync_flags", skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<SyncFlag>,
    #[serde(default)]
    pub schema_mapping: Vec<SchemaMappingModel>,
}

impl SyncConfig {
    /// Adapter configuration for one side.
    pub fn adapter(&self, role: AdapterRole) -> &SyncAdapterConfig {
        match role {
            AdapterRole::Source => &self.source,
            AdapterRole::Destination => &self.destination,
        }
    }

    pub fn model(&self, name: &str) -> Option<&SchemaMappingModel> {
        self.schema_mapping.iter().find(|m| m.name == name)
    }

    pub fn has_flag(&self, flag: SyncFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Models in processing order: `order` first, then the remaining ones as declared.
    pub fn ordered_models(&self) -> Vec<&SchemaMappingModel> {
        let mut models: Vec<&SchemaMappingModel> =
            self.order.iter().filter_map(|name| self.model(name)).collect();
        for model in &self.schema_mapping {
            if !self.order.contains(&model.name) {
                models.push(model);
            }
        }
        models
    }
}

/// A parsed configuration plus the directory it was loaded from.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncInstance {
    pub config: SyncConfig,
    /// Directory containing the configuration file; relative adapter
    /// settings (file paths, templates) resolve against it.
    pub directory: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
name: from-netbox
source:
  name: rest
  settings:
    url: http://netbox.local
destination:
  name: infrahub
order: [LocationSite, BuiltinTag]
diffsync_flags: [SKIP_UNMATCHED_DST]
schema_mapping:
  - name: BuiltinTag
    mapping: extras.tags
    identifiers: [name]
    fields:
      - name: name
        mapping: name
  - name: LocationSite
    mapping: dcim.sites
    identifiers: [name]
    filters:
      - field: status.value
        operation: "=="
        value: active
    fields:
      - name: name
      - name: tags
        mapping: tags
        reference: BuiltinTag
      - name: status
        static: active
"#;

    #[test]
    fn sync_name_display() {
        assert_eq!(SyncName::from("from-netbox").to_string(), "from-netbox");
    }

    #[test]
    fn parses_full_config() {
        let config: SyncConfig = serde_yaml::from_str(CONFIG).expect("parse");
        assert_eq!(config.name.0, "from-netbox");
        assert!(config.has_flag(SyncFlag::SkipUnmatchedDst));
        assert_eq!(config.source.setting_str("url"), Some("http://netbox.local"));
        assert!(config.destination.settings.is_none());

        let site = config.model("LocationSite").expect("site");
        assert_eq!(site.filters[0].operation, FilterOperation::Equal);
        assert_eq!(site.field("name").unwrap().source_path(), "name");
        assert_eq!(site.field("tags").unwrap().reference.as_deref(), Some("BuiltinTag"));
        assert_eq!(
            site.field("status").unwrap().static_value,
            Some(Value::from("active"))
        );
        let attrs: Vec<_> = site.attribute_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(attrs, vec!["tags", "status"]);
    }

    #[test]
    fn ordered_models_follow_order_then_declaration() {
        let config: SyncConfig = serde_yaml::from_str(CONFIG).expect("parse");
        let names: Vec<_> = config.ordered_models().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["LocationSite", "BuiltinTag"]);
    }

    #[test]
    fn empty_string_setting_is_unset() {
        let adapter: SyncAdapterConfig =
            serde_yaml::from_str("name: infrahub\nsettings:\n  token: ''\n").expect("parse");
        assert_eq!(adapter.setting_str("token"), None);
    }
}
