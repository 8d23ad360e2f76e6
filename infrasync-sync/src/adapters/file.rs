//! Local data file adapter.
//!
//! The file holds one document mapping resources to lists of records:
//!
//! ```yaml
//! dcim.sites:
//!   - { id: 1, name: ams, status: { value: active } }
//! ```
//!
//! JSON is used when the path ends in `.json`, YAML otherwise. Writes are
//! buffered in memory and persisted atomically by [`Adapter::flush`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use infrasync_core::{
    get_value,
    record::{is_truthy, key_string, IDENTIFIER_KEY},
    Record, SchemaMappingModel, SyncAdapterConfig,
};

use crate::adapter::{Adapter, Entry, SourceRecord, FILE_ADAPTER};
use crate::error::{io_err, SyncError};
use crate::store::join_identifiers;
use crate::writer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

#[derive(Debug)]
pub struct FileAdapter {
    path: PathBuf,
    format: Format,
    document: Option<Map<String, Value>>,
    dirty: bool,
}

impl FileAdapter {
    /// Build from `settings.path`, resolved against the sync `directory`.
    pub fn from_settings(config: &SyncAdapterConfig, directory: &Path) -> Result<Self, SyncError> {
        let path = config
            .setting_str("path")
            .ok_or_else(|| SyncError::MissingSetting {
                adapter: FILE_ADAPTER.to_string(),
                setting: "path".to_string(),
            })?;
        Ok(Self::new(directory.join(path)))
    }

    pub fn new(path: PathBuf) -> Self {
        FileAdapter {
            format: Format::for_path(&path),
            path,
            document: None,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn document(&mut self) -> Result<&mut Map<String, Value>, SyncError> {
        if self.document.is_none() {
            self.document = Some(read_document(&self.path, self.format)?);
        }
        Ok(self.document.get_or_insert_with(Map::new))
    }

    fn entries(&mut self, model: &str) -> Result<&mut Vec<Value>, SyncError> {
        let path = self.path.clone();
        let slot = self
            .document()?
            .entry(model.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match slot {
            Value::Array(entries) => Ok(entries),
            _ => Err(SyncError::Document {
                path,
                message: format!("'{model}' is not a list"),
            }),
        }
    }

    /// Index of the entry addressed by `local_id`: its `id` first, then
    /// the join of the model's identifier fields.
    fn position(&mut self, model: &SchemaMappingModel, local_id: &str) -> Result<usize, SyncError> {
        let entries = self.entries(&model.name)?;
        let found = entries
            .iter()
            .position(|entry| entry_id(entry).as_deref() == Some(local_id))
            .or_else(|| {
                entries
                    .iter()
                    .position(|entry| entry_unique_id(model, entry).as_deref() == Some(local_id))
            });
        found.ok_or_else(|| SyncError::RecordNotFound {
            adapter: FILE_ADAPTER.to_string(),
            model: model.name.clone(),
            id: local_id.to_string(),
        })
    }
}

/// The entry's own truthy `id`.
fn entry_id(entry: &Value) -> Option<String> {
    entry
        .get(IDENTIFIER_KEY)
        .filter(|id| is_truthy(id))
        .map(key_string)
}

fn entry_unique_id(model: &SchemaMappingModel, entry: &Value) -> Option<String> {
    let Value::Object(map) = entry else {
        return None;
    };
    if model.identifiers.is_empty() {
        return None;
    }
    let values: Vec<Option<Value>> = model
        .identifiers
        .iter()
        .map(|name| match model.field(name).and_then(|f| f.static_value.clone()) {
            Some(value) => Some(value),
            None => get_value(Record::Mapping(map), name),
        })
        .collect();
    Some(join_identifiers(values.iter().map(Option::as_ref)))
}

fn read_document(path: &Path, format: Format) -> Result<Map<String, Value>, SyncError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!("{} does not exist yet; starting empty", path.display());
            return Ok(Map::new());
        }
        Err(err) => return Err(io_err(path, err)),
    };
    if text.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = match format {
        Format::Json => serde_json::from_str(&text)?,
        Format::Yaml => serde_yaml::from_str(&text)?,
    };
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(SyncError::Document {
            path: path.to_path_buf(),
            message: "top level must be a mapping of resource to records".to_string(),
        }),
    }
}

fn render_document(document: &Map<String, Value>, format: Format) -> Result<String, SyncError> {
    Ok(match format {
        Format::Json => format!("{}\n", serde_json::to_string_pretty(document)?),
        Format::Yaml => serde_yaml::to_string(document)?,
    })
}

impl Adapter for FileAdapter {
    fn name(&self) -> &str {
        FILE_ADAPTER
    }

    fn fetch(
        &mut self,
        model: &SchemaMappingModel,
        resource: &str,
    ) -> Result<Vec<SourceRecord>, SyncError> {
        let path = self.path.clone();
        let document = self.document()?;
        let found = match document.get(resource) {
            Some(value) => Some(value.clone()),
            None => get_value(Record::Mapping(document), resource),
        };
        let entries = match found {
            None => Vec::new(),
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                return Err(SyncError::Document {
                    path,
                    message: format!("'{resource}' is not a list"),
                })
            }
        };

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                Value::Object(fields) => {
                    let local_id = fields
                        .get(IDENTIFIER_KEY)
                        .filter(|id| is_truthy(id))
                        .map(key_string);
                    records.push(SourceRecord::Entry(Entry { local_id, fields }));
                }
                other => tracing::warn!(model = %model.name, %resource, "skipping non-mapping entry {other}"),
            }
        }
        Ok(records)
    }

    fn create(
        &mut self,
        model: &SchemaMappingModel,
        unique_id: &str,
        payload: &Map<String, Value>,
    ) -> Result<Option<String>, SyncError> {
        let mut entry = payload.clone();
        let local_id = match entry.get(IDENTIFIER_KEY).filter(|id| is_truthy(id)) {
            Some(id) => key_string(id),
            None => {
                entry.insert(IDENTIFIER_KEY.to_string(), Value::String(unique_id.to_string()));
                unique_id.to_string()
            }
        };
        self.entries(&model.name)?.push(Value::Object(entry));
        self.dirty = true;
        Ok(Some(local_id))
    }

    fn update(
        &mut self,
        model: &SchemaMappingModel,
        local_id: &str,
        payload: &Map<String, Value>,
    ) -> Result<(), SyncError> {
        let index = self.position(model, local_id)?;
        if let Some(Value::Object(entry)) = self.entries(&model.name)?.get_mut(index) {
            for (key, value) in payload {
                entry.insert(key.clone(), value.clone());
            }
        }
        self.dirty = true;
        Ok(())
    }

    fn delete(&mut self, model: &SchemaMappingModel, local_id: &str) -> Result<(), SyncError> {
        let index = self.position(model, local_id)?;
        self.entries(&model.name)?.remove(index);
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SyncError> {
        if !self.dirty {
            return Ok(());
        }
        let content = match &self.document {
            Some(document) => render_document(document, self.format)?,
            None => return Ok(()),
        };
        writer::write_file(&self.path, &content, false)?;
        self.dirty = false;
        Ok(())
    }
}
