//! Adapter trait, raw record shape, and the adapter factory.
//!
//! An adapter knows how to read raw records from one system and, for
//! destinations, how to write translated payloads back. Translation between
//! raw records and [`Item`](crate::store::Item)s is not the adapter's job; it
//! lives in [`store`](crate::store).

use serde_json::{Map, Value};

use infrasync_core::{
    record::{derive_identifier, key_string, Attributes, NoIdentifierFound, Record},
    AdapterRole, SchemaMappingModel, SyncInstance,
};

use crate::adapters::{file::FileAdapter, infrahub::InfrahubAdapter, rest::RestAdapter};
use crate::error::SyncError;

/// Factory key of the local file adapter.
pub const FILE_ADAPTER: &str = "file";
/// Factory key of the generic JSON REST adapter.
pub const REST_ADAPTER: &str = "rest";
/// Factory key of the Infrahub GraphQL adapter.
pub const INFRAHUB_ADAPTER: &str = "infrahub";

// ---------------------------------------------------------------------------
// Raw records
// ---------------------------------------------------------------------------

/// A typed node fetched from a graph API.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub kind: String,
    /// Flattened attribute values and relationship peer ids.
    pub fields: Map<String, Value>,
}

impl Attributes for Node {
    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.clone())),
            "kind" => Some(Value::String(self.kind.clone())),
            _ => self.fields.get(name).cloned(),
        }
    }
}

/// A stored key/value entry whose local id is assigned by its adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// `None` when the entry carries no id of its own.
    pub local_id: Option<String>,
    pub fields: Map<String, Value>,
}

/// A record as returned by an adapter, before translation.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRecord {
    /// Key/value document (REST payloads).
    Document(Map<String, Value>),
    /// Key/value entry of a data file.
    Entry(Entry),
    /// Typed node (Infrahub).
    Node(Node),
}

impl SourceRecord {
    /// Borrow as a [`Record`] for path lookups.
    pub fn as_record(&self) -> Record<'_> {
        match self {
            SourceRecord::Document(map) => Record::Mapping(map),
            SourceRecord::Entry(entry) => Record::Mapping(&entry.fields),
            SourceRecord::Node(node) => Record::object(node),
        }
    }

    /// Identifier of the record in its own system.
    pub fn identifier(&self) -> Result<Value, NoIdentifierFound> {
        match self {
            SourceRecord::Document(map) => derive_identifier(map),
            SourceRecord::Entry(entry) => derive_identifier(&entry.fields),
            SourceRecord::Node(node) => Ok(Value::String(node.id.clone())),
        }
    }

    /// Identifier used to address the record in its own system.
    ///
    /// Documents use [`identifier`](Self::identifier); entries use the id
    /// their adapter assigned, never a derived `*_id` value.
    pub fn local_id(&self) -> Option<String> {
        match self {
            SourceRecord::Entry(entry) => entry.local_id.clone(),
            _ => self.identifier().ok().map(|id| key_string(&id)),
        }
    }
}

// ---------------------------------------------------------------------------
// Adapter trait
// ---------------------------------------------------------------------------

/// One side of a sync.
///
/// `local_id` is the record's identifier in this adapter's system.
pub trait Adapter {
    /// Factory key this adapter was built from.
    fn name(&self) -> &str;

    /// Fetch every raw record of `resource` for `model`.
    fn fetch(
        &mut self,
        model: &SchemaMappingModel,
        resource: &str,
    ) -> Result<Vec<SourceRecord>, SyncError>;

    /// Create a record; returns its new local id when the system assigns one.
    fn create(
        &mut self,
        model: &SchemaMappingModel,
        unique_id: &str,
        payload: &Map<String, Value>,
    ) -> Result<Option<String>, SyncError>;

    /// Apply `payload` (changed fields only) to an existing record.
    fn update(
        &mut self,
        model: &SchemaMappingModel,
        local_id: &str,
        payload: &Map<String, Value>,
    ) -> Result<(), SyncError>;

    fn delete(&mut self, model: &SchemaMappingModel, local_id: &str) -> Result<(), SyncError>;

    /// Persist buffered writes.
    fn flush(&mut self) -> Result<(), SyncError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Instantiate the adapter configured for `role` in `instance`.
///
/// `branch` is the CLI-provided Infrahub branch, used when the adapter
/// settings do not pin one.
pub fn build_adapter(
    instance: &SyncInstance,
    role: AdapterRole,
    branch: Option<&str>,
) -> Result<Box<dyn Adapter>, SyncError> {
    let config = instance.config.adapter(role);
    tracing::debug!(adapter = %config.name, %role, "building adapter");
    match config.name.as_str() {
        FILE_ADAPTER => Ok(Box::new(FileAdapter::from_settings(config, &instance.directory)?)),
        REST_ADAPTER => Ok(Box::new(RestAdapter::from_settings(config)?)),
        INFRAHUB_ADAPTER => Ok(Box::new(InfrahubAdapter::from_settings(config, branch)?)),
        other => Err(SyncError::UnknownAdapter {
            name: other.to_string(),
        }),
    }
}
