//! Translation of raw adapter records into comparable [`Item`]s.
//!
//! Both sides of a sync are loaded into a [`Store`]. Items are keyed by model
//! and `unique_id`, the join of their identifier values, so that the same
//! object coming from two systems lands on the same key.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use infrasync_core::{
    get_value,
    record::{derive_identifier, key_string},
    AdapterRole, SchemaMappingField, SchemaMappingModel,
};
use infrasync_renderer::render_expression;

use crate::adapter::SourceRecord;
use crate::error::SyncError;
use crate::filter::Filters;

/// Separator between identifier values in a `unique_id`.
pub const UNIQUE_ID_SEPARATOR: &str = "__";

/// One translated object.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub model: String,
    pub unique_id: String,
    /// Identifier in the system the item was loaded from, if it has one.
    pub local_id: Option<String>,
    pub identifiers: Map<String, Value>,
    pub attributes: Map<String, Value>,
}

impl Item {
    /// Identifier and attribute values together, identifiers first.
    pub fn values(&self) -> Map<String, Value> {
        let mut values = self.identifiers.clone();
        values.extend(self.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        values
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Items of one side of a sync.
#[derive(Debug, Default, Clone)]
pub struct Store {
    models: BTreeMap<String, BTreeMap<String, Item>>,
    /// model -> local id -> unique id
    local_index: HashMap<String, HashMap<String, String>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `item`. Returns `false` and keeps the existing item when the
    /// `unique_id` is already taken.
    pub fn insert(&mut self, item: Item) -> bool {
        let items = self.models.entry(item.model.clone()).or_default();
        if items.contains_key(&item.unique_id) {
            return false;
        }
        if let Some(local_id) = &item.local_id {
            self.local_index
                .entry(item.model.clone())
                .or_default()
                .insert(local_id.clone(), item.unique_id.clone());
        }
        items.insert(item.unique_id.clone(), item);
        true
    }

    pub fn get(&self, model: &str, unique_id: &str) -> Option<&Item> {
        self.models.get(model)?.get(unique_id)
    }

    pub fn get_mut(&mut self, model: &str, unique_id: &str) -> Option<&mut Item> {
        self.models.get_mut(model)?.get_mut(unique_id)
    }

    pub fn remove(&mut self, model: &str, unique_id: &str) -> Option<Item> {
        let item = self.models.get_mut(model)?.remove(unique_id)?;
        if let (Some(local_id), Some(index)) = (&item.local_id, self.local_index.get_mut(model)) {
            index.remove(local_id);
        }
        Some(item)
    }

    /// Items of `model`, sorted by `unique_id`.
    pub fn items<'a>(&'a self, model: &str) -> impl Iterator<Item = &'a Item> + 'a {
        self.models.get(model).into_iter().flat_map(|items| items.values())
    }

    /// `unique_id` of the `model` item whose local id is `local_id`.
    pub fn unique_id_for(&self, model: &str, local_id: &str) -> Option<&str> {
        self.local_index
            .get(model)?
            .get(local_id)
            .map(String::as_str)
    }

    pub fn count(&self, model: &str) -> usize {
        self.models.get(model).map_or(0, BTreeMap::len)
    }

    pub fn len(&self) -> usize {
        self.models.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Translation
// ---------------------------------------------------------------------------

/// Translate and insert every record of `model`. Returns the number of items added.
///
/// Referenced models must already be loaded for references to resolve.
pub fn load_model(
    store: &mut Store,
    model: &SchemaMappingModel,
    records: &[SourceRecord],
    role: AdapterRole,
) -> Result<usize, SyncError> {
    let filters = Filters::compile(&model.filters)?;
    let mut added = 0;
    for record in records {
        let Some(item) = translate_with(store, model, &filters, record, role)? else {
            continue;
        };
        let unique_id = item.unique_id.clone();
        if store.insert(item) {
            added += 1;
        } else {
            tracing::warn!(model = %model.name, %unique_id, %role, "duplicate item ignored");
        }
    }
    tracing::info!(model = %model.name, %role, count = added, "loaded items");
    Ok(added)
}

/// Translate one raw record. `Ok(None)` when the record is filtered out.
pub fn translate(
    store: &Store,
    model: &SchemaMappingModel,
    record: &SourceRecord,
    role: AdapterRole,
) -> Result<Option<Item>, SyncError> {
    let filters = Filters::compile(&model.filters)?;
    translate_with(store, model, &filters, record, role)
}

/// [`translate`] with the model's filters already compiled.
pub fn translate_with(
    store: &Store,
    model: &SchemaMappingModel,
    filters: &Filters,
    record: &SourceRecord,
    role: AdapterRole,
) -> Result<Option<Item>, SyncError> {
    let source_side = role == AdapterRole::Source;
    if source_side && !filters.matches(record.as_record()) {
        tracing::debug!(model = %model.name, "record filtered out");
        return Ok(None);
    }

    let mut values = Map::new();
    for field in &model.fields {
        let value = field_value(store, model, field, record, source_side);
        values.insert(field.name.clone(), value);
    }

    if source_side {
        for transform in &model.transforms {
            let rendered = render_expression(&transform.expression, &values)?;
            values.insert(transform.field.clone(), Value::String(rendered));
        }
    }

    let unique_id = if model.identifiers.is_empty() {
        key_string(&record.identifier()?)
    } else {
        join_identifiers(model.identifiers.iter().map(|name| values.get(name)))
    };

    let mut identifiers = Map::new();
    for name in &model.identifiers {
        identifiers.insert(name.clone(), values.remove(name).unwrap_or(Value::Null));
    }
    let attributes = model
        .attribute_fields()
        .map(|field| {
            let value = values.remove(&field.name).unwrap_or(Value::Null);
            (field.name.clone(), value)
        })
        .collect();

    Ok(Some(Item {
        model: model.name.clone(),
        unique_id,
        local_id: record.local_id(),
        identifiers,
        attributes,
    }))
}

/// Join identifier values into a `unique_id`; absent and `null` values join as "".
pub fn join_identifiers<'a>(values: impl IntoIterator<Item = Option<&'a Value>>) -> String {
    values
        .into_iter()
        .map(|value| match value {
            None | Some(Value::Null) => String::new(),
            Some(other) => key_string(other),
        })
        .collect::<Vec<_>>()
        .join(UNIQUE_ID_SEPARATOR)
}

fn field_value(
    store: &Store,
    model: &SchemaMappingModel,
    field: &SchemaMappingField,
    record: &SourceRecord,
    source_side: bool,
) -> Value {
    if let Some(value) = &field.static_value {
        return value.clone();
    }
    let path = if source_side {
        field.source_path()
    } else {
        field.name.as_str()
    };
    let raw = get_value(record.as_record(), path).unwrap_or(Value::Null);

    match &field.reference {
        Some(peer) => resolve_reference(store, peer, &raw).unwrap_or_else(|| {
            tracing::warn!(
                model = %model.name,
                field = %field.name,
                %peer,
                "unable to resolve reference"
            );
            Value::Null
        }),
        None => raw,
    }
}

/// Map a raw reference value to the peer's `unique_id` (or a sorted list of them).
///
/// `Some(Value::Null)` for an empty reference; `None` when a peer is unknown.
pub fn resolve_reference(store: &Store, peer: &str, raw: &Value) -> Option<Value> {
    match raw {
        Value::Null => Some(Value::Null),
        Value::Array(values) => {
            let mut ids = values
                .iter()
                .map(|value| resolve_one(store, peer, value))
                .collect::<Option<Vec<String>>>()?;
            ids.sort();
            ids.dedup();
            Some(Value::Array(ids.into_iter().map(Value::String).collect()))
        }
        value => resolve_one(store, peer, value).map(Value::String),
    }
}

fn resolve_one(store: &Store, peer: &str, value: &Value) -> Option<String> {
    let local_id = match value {
        Value::Object(map) => key_string(&derive_identifier(map).ok()?),
        Value::Null | Value::Array(_) => return None,
        scalar => key_string(scalar),
    };
    store.unique_id_for(peer, &local_id).map(str::to_owned)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
