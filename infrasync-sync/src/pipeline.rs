//! Sync job: load both sides, diff them, and apply the diff to the destination.

use serde_json::{Map, Value};

use infrasync_core::{AdapterRole, SchemaMappingModel, SyncInstance};

use crate::adapter::{build_adapter, Adapter};
use crate::diff::{Diff, DiffAction, DiffElement, DiffSummary};
use crate::error::SyncError;
use crate::store::{load_model, Item, Store};

/// A configured sync between two adapters.
pub struct SyncJob {
    instance: SyncInstance,
    source: Box<dyn Adapter>,
    destination: Box<dyn Adapter>,
    source_store: Store,
    destination_store: Store,
}

impl SyncJob {
    /// Build both adapters from the instance configuration.
    pub fn from_instance(instance: SyncInstance, branch: Option<&str>) -> Result<Self, SyncError> {
        let source = build_adapter(&instance, AdapterRole::Source, branch)?;
        let destination = build_adapter(&instance, AdapterRole::Destination, branch)?;
        Ok(Self::new(instance, source, destination))
    }

    pub fn new(
        instance: SyncInstance,
        source: Box<dyn Adapter>,
        destination: Box<dyn Adapter>,
    ) -> Self {
        SyncJob {
            instance,
            source,
            destination,
            source_store: Store::new(),
            destination_store: Store::new(),
        }
    }

    pub fn instance(&self) -> &SyncInstance {
        &self.instance
    }

    pub fn source_store(&self) -> &Store {
        &self.source_store
    }

    pub fn destination_store(&self) -> &Store {
        &self.destination_store
    }

    /// Fetch and translate every source model. Returns the number of items loaded.
    pub fn source_load(&mut self) -> Result<usize, SyncError> {
        tracing::info!(adapter = self.source.name(), "loading source");
        let mut store = Store::new();
        let mut total = 0;
        for model in self.instance.config.ordered_models() {
            let records = self.source.fetch(model, &model.mapping)?;
            total += load_model(&mut store, model, &records, AdapterRole::Source)?;
        }
        self.source_store = store;
        Ok(total)
    }

    /// Fetch and translate every destination model. Returns the number of items loaded.
    pub fn destination_load(&mut self) -> Result<usize, SyncError> {
        tracing::info!(adapter = self.destination.name(), "loading destination");
        let mut store = Store::new();
        let mut total = 0;
        for model in self.instance.config.ordered_models() {
            let records = self.destination.fetch(model, &model.name)?;
            total += load_model(&mut store, model, &records, AdapterRole::Destination)?;
        }
        self.destination_store = store;
        Ok(total)
    }

    /// Compare the loaded stores.
    pub fn diff(&self) -> Diff {
        Diff::compute(
            &self.instance.config,
            &self.source_store,
            &self.destination_store,
        )
    }

    /// Apply `diff` to the destination and flush it.
    ///
    /// Creates and updates follow model order so that referenced items exist
    /// first; deletes run in reverse.
    pub fn sync(&mut self, diff: &Diff) -> Result<DiffSummary, SyncError> {
        let mut applied = DiffSummary::default();

        for element in &diff.elements {
            match element.action {
                DiffAction::Create => {
                    self.create(element)?;
                    applied.create += 1;
                }
                DiffAction::Update => {
                    self.update(element)?;
                    applied.update += 1;
                }
                DiffAction::Delete => {}
            }
        }
        for element in diff.with_action(DiffAction::Delete).collect::<Vec<_>>().into_iter().rev() {
            self.delete(element)?;
            applied.delete += 1;
        }

        self.destination.flush()?;
        tracing::info!(%applied, "sync applied");
        Ok(applied)
    }

    fn model(&self, name: &str) -> Result<SchemaMappingModel, SyncError> {
        self.instance.config.model(name).cloned().ok_or_else(|| {
            SyncError::RecordNotFound {
                adapter: self.destination.name().to_string(),
                model: name.to_string(),
                id: String::new(),
            }
        })
    }

    fn create(&mut self, element: &DiffElement) -> Result<(), SyncError> {
        let model = self.model(&element.model)?;
        let Some(item) = self.source_store.get(&model.name, &element.unique_id).cloned() else {
            tracing::warn!(model = %model.name, unique_id = %element.unique_id, "source item vanished");
            return Ok(());
        };
        let payload = self.payload(&model, &item.values());
        let local_id = self
            .destination
            .create(&model, &item.unique_id, &payload)?
            .unwrap_or_else(|| item.unique_id.clone());
        self.destination_store.insert(Item {
            local_id: Some(local_id),
            ..item
        });
        Ok(())
    }

    fn update(&mut self, element: &DiffElement) -> Result<(), SyncError> {
        let model = self.model(&element.model)?;
        let local_id = self.local_id(&model.name, &element.unique_id);
        let changed: Map<String, Value> = element
            .changes
            .iter()
            .map(|change| (change.name.clone(), change.source.clone()))
            .collect();
        let payload = self.payload(&model, &changed);
        self.destination.update(&model, &local_id, &payload)?;
        if let Some(existing) = self.destination_store.get_mut(&model.name, &element.unique_id) {
            existing.attributes.extend(changed);
        }
        Ok(())
    }

    fn delete(&mut self, element: &DiffElement) -> Result<(), SyncError> {
        let model = self.model(&element.model)?;
        let local_id = self.local_id(&model.name, &element.unique_id);
        self.destination.delete(&model, &local_id)?;
        self.destination_store.remove(&model.name, &element.unique_id);
        Ok(())
    }

    /// Destination local id of an item, falling back to its `unique_id`.
    fn local_id(&self, model: &str, unique_id: &str) -> String {
        self.destination_store
            .get(model, unique_id)
            .and_then(|item| item.local_id.clone())
            .unwrap_or_else(|| unique_id.to_string())
    }

    /// Replace reference values (peer `unique_id`s) with destination local ids.
    fn payload(&self, model: &SchemaMappingModel, values: &Map<String, Value>) -> Map<String, Value> {
        values
            .iter()
            .map(|(name, value)| {
                let peer = model.field(name).and_then(|f| f.reference.as_deref());
                let converted = match peer {
                    Some(peer) => self.peer_local_ids(&model.name, name, peer, value),
                    None => value.clone(),
                };
                (name.clone(), converted)
            })
            .collect()
    }

    fn peer_local_ids(&self, model: &str, field: &str, peer: &str, value: &Value) -> Value {
        let lookup = |unique_id: &str| -> Option<Value> {
            let item = self.destination_store.get(peer, unique_id);
            if item.is_none() {
                tracing::warn!(%model, %field, %peer, %unique_id, "peer missing from destination");
            }
            item.map(|peer_item| {
                Value::String(
                    peer_item
                        .local_id
                        .clone()
                        .unwrap_or_else(|| unique_id.to_string()),
                )
            })
        };
        match value {
            Value::String(unique_id) => lookup(unique_id.as_str()).unwrap_or(Value::Null),
            Value::Array(unique_ids) => Value::Array(
                unique_ids
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(lookup)
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SourceRecord;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::rc::Rc;

    type Calls = Rc<RefCell<Vec<String>>>;

    /// In-memory adapter recording every write.
    struct Memory {
        data: HashMap<String, Vec<Value>>,
        calls: Calls,
        next_id: usize,
    }

    impl Memory {
        fn new(data: Value, calls: Calls) -> Self {
            let data = match data {
                Value::Object(map) => map
                    .into_iter()
                    .map(|(k, v)| (k, v.as_array().cloned().unwrap_or_default()))
                    .collect(),
                _ => HashMap::new(),
            };
            Memory {
                data,
                calls,
                next_id: 100,
            }
        }
    }

    impl Adapter for Memory {
        fn name(&self) -> &str {
            "memory"
        }

        fn fetch(
            &mut self,
            _model: &SchemaMappingModel,
            resource: &str,
        ) -> Result<Vec<SourceRecord>, SyncError> {
            Ok(self
                .data
                .get(resource)
                .into_iter()
                .flatten()
                .filter_map(|v| v.as_object().cloned().map(SourceRecord::Document))
                .collect())
        }

        fn create(
            &mut self,
            model: &SchemaMappingModel,
            unique_id: &str,
            payload: &Map<String, Value>,
        ) -> Result<Option<String>, SyncError> {
            self.next_id += 1;
            self.calls.borrow_mut().push(format!(
                "create {} {unique_id} {}",
                model.name,
                Value::Object(payload.clone())
            ));
            Ok(Some(self.next_id.to_string()))
        }

        fn update(
            &mut self,
            model: &SchemaMappingModel,
            local_id: &str,
            payload: &Map<String, Value>,
        ) -> Result<(), SyncError> {
            self.calls.borrow_mut().push(format!(
                "update {} {local_id} {}",
                model.name,
                Value::Object(payload.clone())
            ));
            Ok(())
        }

        fn delete(&mut self, model: &SchemaMappingModel, local_id: &str) -> Result<(), SyncError> {
            self.calls
                .borrow_mut()
                .push(format!("delete {} {local_id}", model.name));
            Ok(())
        }

        fn flush(&mut self) -> Result<(), SyncError> {
            self.calls.borrow_mut().push("flush".into());
            Ok(())
        }
    }

    fn instance() -> SyncInstance {
        let config = serde_yaml::from_str(
            r#"
name: demo
source: { name: file }
destination: { name: file }
order: [Tag, Site]
schema_mapping:
  - name: Tag
    mapping: tags
    identifiers: [name]
    fields:
      - { name: name, mapping: slug }
  - name: Site
    mapping: sites
    identifiers: [name]
    fields:
      - { name: name }
      - { name: description }
      - { name: tags, reference: Tag }
"#,
        )
        .expect("config");
        SyncInstance {
            config,
            directory: PathBuf::from("."),
        }
    }

    fn job(calls: &Calls) -> SyncJob {
        let source = Memory::new(
            json!({
                "tags": [{"id": 1, "slug": "core"}, {"id": 2, "slug": "edge"}],
                "sites": [
                    {"id": 10, "name": "ams", "description": "Amsterdam", "tags": [1, 2]},
                    {"id": 11, "name": "fra", "description": "Frankfurt", "tags": []}
                ]
            }),
            calls.clone(),
        );
        let destination = Memory::new(
            json!({
                "Tag": [{"id": "t-core", "name": "core"}, {"id": "t-old", "name": "old"}],
                "Site": [
                    {"id": "s-fra", "name": "fra", "description": "old", "tags": []},
                    {"id": "s-lon", "name": "lon", "tags": ["t-old"]}
                ]
            }),
            calls.clone(),
        );
        SyncJob::new(instance(), Box::new(source), Box::new(destination))
    }

    #[test]
    fn loads_both_sides() {
        let calls = Calls::default();
        let mut job = job(&calls);
        assert_eq!(job.source_load().unwrap(), 4);
        assert_eq!(job.destination_load().unwrap(), 4);
        assert_eq!(
            job.destination_store().get("Site", "lon").unwrap().attributes["tags"],
            json!(["old"])
        );
    }

    #[test]
    fn sync_applies_in_dependency_order() {
        let calls = Calls::default();
        let mut job = job(&calls);
        job.source_load().unwrap();
        job.destination_load().unwrap();
        let diff = job.diff();
        let applied = job.sync(&diff).unwrap();
        assert_eq!(
            applied,
            DiffSummary {
                create: 2,
                update: 1,
                delete: 2
            }
        );

        let calls = calls.borrow();
        assert_eq!(
            *calls,
            vec![
                r#"create Tag edge {"name":"edge"}"#.to_string(),
                r#"create Site ams {"name":"ams","description":"Amsterdam","tags":["t-core","101"]}"#.to_string(),
                r#"update Site s-fra {"description":"Frankfurt"}"#.to_string(),
                "delete Site s-lon".to_string(),
                "delete Tag t-old".to_string(),
                "flush".to_string(),
            ]
        );
    }

    #[test]
    fn empty_diff_only_flushes() {
        let calls = Calls::default();
        let mut job = job(&calls);
        let applied = job.sync(&Diff::default()).unwrap();
        assert_eq!(applied, DiffSummary::default());
        assert_eq!(*calls.borrow(), vec!["flush".to_string()]);
    }
}
