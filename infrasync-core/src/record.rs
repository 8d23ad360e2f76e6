//! Dotted-path value lookup and identifier derivation over heterogeneous records.
//!
//! Records arriving from source and destination systems come in two shapes:
//! plain key/value documents (JSON objects decoded from an API or a file) and
//! typed objects exposing named attributes (e.g. a fetched graph node). Both are
//! addressed through [`Record`], whose variant is chosen explicitly rather than
//! by probing the value.
//!
//! # Truthiness
//!
//! Intermediate path segments and `*_id` candidates use the same "falsy means
//! no value" test as the sync configurations expect: `null`, `false`, zero, the
//! empty string, the empty array and the empty object are all treated as absent.
//! See [`is_truthy`].

use std::borrow::Cow;

use serde_json::{Map, Value};
use thiserror::Error;

/// Separator between segments of a field path (`location.name`).
pub const PATH_DELIMITER: char = '.';

/// Key with the highest precedence in [`derive_identifier`].
pub const IDENTIFIER_KEY: &str = "id";

/// Suffix of secondary identifier keys (`device_id`, `site_id`, ...).
pub const IDENTIFIER_SUFFIX: &str = "_id";

// ---------------------------------------------------------------------------
// Record access
// ---------------------------------------------------------------------------

/// Named-attribute access for record types that are not plain mappings.
pub trait Attributes {
    /// Value of attribute `name`, or `None` when the attribute does not exist.
    ///
    /// Implementations must not fail: an attribute that cannot be produced is
    /// reported as `None`.
    fn attribute(&self, name: &str) -> Option<Value>;
}

/// Scalars and arrays expose no attributes.
struct NoAttributes;

impl Attributes for NoAttributes {
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }
}

static NO_ATTRIBUTES: NoAttributes = NoAttributes;

/// A borrowed record, either key-addressable or attribute-bearing.
#[derive(Clone, Copy)]
pub enum Record<'a> {
    /// Key/value document; fields are looked up by key.
    Mapping(&'a Map<String, Value>),
    /// Typed object; fields are looked up by attribute name.
    Object(&'a dyn Attributes),
}

impl<'a> Record<'a> {
    /// Wrap an attribute-bearing object.
    pub fn object(object: &'a dyn Attributes) -> Self {
        Record::Object(object)
    }

    /// Direct (single segment) field lookup.
    pub fn field(&self, name: &str) -> Option<Cow<'a, Value>> {
        match *self {
            Record::Mapping(map) => map.get(name).map(Cow::Borrowed),
            Record::Object(object) => object.attribute(name).map(Cow::Owned),
        }
    }
}

impl<'a> From<&'a Map<String, Value>> for Record<'a> {
    fn from(map: &'a Map<String, Value>) -> Self {
        Record::Mapping(map)
    }
}

impl<'a> From<&'a Value> for Record<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Record::Mapping(map),
            _ => Record::Object(&NO_ATTRIBUTES),
        }
    }
}

impl std::fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Record::Mapping(map) => f.debug_tuple("Mapping").field(map).finish(),
            Record::Object(_) => f.write_str("Object(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Path resolution
// ---------------------------------------------------------------------------

/// Resolve a dot-separated `path` against `record`.
///
/// Returns `None` (absent) when any segment is missing, when an intermediate
/// segment holds a falsy value, or when the final value is `null`. Never fails.
///
/// ```
/// use infrasync_core::record::get_value;
/// use serde_json::json;
///
/// let site = json!({"location": {"name": "DC1"}});
/// assert_eq!(get_value(&site, "location.name"), Some(json!("DC1")));
/// assert_eq!(get_value(&site, "location.code"), None);
/// ```
pub fn get_value<'a>(record: impl Into<Record<'a>>, path: &str) -> Option<Value> {
    let record = record.into();
    let (head, mut rest) = split_path(path);
    let mut found = record.field(head)?;

    while let Some(remaining) = rest {
        if !is_truthy(&found) {
            return None;
        }
        let (head, tail) = split_path(remaining);
        found = match found {
            Cow::Borrowed(value) => Record::from(value).field(head)?,
            Cow::Owned(value) => Cow::Owned(Record::from(&value).field(head)?.into_owned()),
        };
        rest = tail;
    }

    match found.into_owned() {
        Value::Null => None,
        value => Some(value),
    }
}

fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once(PATH_DELIMITER) {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

/// `false` for `null`, `false`, zero, `""`, `[]` and `{}`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

// ---------------------------------------------------------------------------
// Identifier derivation
// ---------------------------------------------------------------------------

/// The record carries neither a usable `id` nor a usable `*_id` field.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("no suitable identifier key found in object with keys [{}]", key_list(.record))]
pub struct NoIdentifierFound {
    /// The offending record.
    pub record: Map<String, Value>,
}

fn key_list(record: &Map<String, Value>) -> String {
    record.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Best-effort unique identifier of a flat record.
///
/// A truthy `id` wins outright. Otherwise the first key (in insertion order)
/// ending in `_id` with a truthy value is used.
pub fn derive_identifier(record: &Map<String, Value>) -> Result<Value, NoIdentifierFound> {
    if let Some(id) = record.get(IDENTIFIER_KEY).filter(|v| is_truthy(v)) {
        return Ok(id.clone());
    }

    record
        .iter()
        .find(|(key, value)| key.ends_with(IDENTIFIER_SUFFIX) && is_truthy(value))
        .map(|(_, value)| value.clone())
        .ok_or_else(|| NoIdentifierFound {
            record: record.clone(),
        })
}

/// Render a scalar for use as a lookup key: strings verbatim, everything else as JSON.
pub fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
