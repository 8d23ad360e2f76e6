//! `generate`: render per-adapter model files from the Infrahub schema.

use std::path::Path;

use infrasync_core::{
    schema::{find_missing_schema_models, SchemaRoot},
    AdapterRole, SyncInstance,
};
use infrasync_renderer::{GenerateContext, TemplateEngine};

use crate::adapter::INFRAHUB_ADAPTER;
use crate::adapters::infrahub::InfrahubClient;
use crate::error::{io_err, SyncError};
use crate::writer::{write_file, WriteResult};

/// The side of `instance` served by Infrahub, destination first.
pub fn infrahub_side(instance: &SyncInstance) -> Option<AdapterRole> {
    [AdapterRole::Destination, AdapterRole::Source]
        .into_iter()
        .find(|role| instance.config.adapter(*role).name == INFRAHUB_ADAPTER)
}

/// Schema from `settings.schema_file` when set, otherwise downloaded from Infrahub.
pub fn load_schema(instance: &SyncInstance, branch: Option<&str>) -> Result<SchemaRoot, SyncError> {
    let role = infrahub_side(instance).ok_or(SyncError::NoInfrahubSide)?;
    let config = instance.config.adapter(role);
    match config.setting_str("schema_file") {
        Some(file) => read_schema_file(&instance.directory.join(file)),
        None => InfrahubClient::from_settings(config, branch)?.schema(),
    }
}

fn read_schema_file(path: &Path) -> Result<SchemaRoot, SyncError> {
    tracing::info!("reading schema from {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    Ok(if is_json {
        serde_json::from_str(&text)?
    } else {
        serde_yaml::from_str(&text)?
    })
}

/// One rendered output and what happened to it on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub template: String,
    pub result: WriteResult,
}

/// Render and write the model files of every adapter of `instance`.
///
/// Fails before writing anything when a mapped model is not in `schema`.
pub fn generate(
    instance: &SyncInstance,
    schema: &SchemaRoot,
    dry_run: bool,
) -> Result<Vec<GeneratedFile>, SyncError> {
    let missing = find_missing_schema_models(&instance.config, schema);
    if !missing.is_empty() {
        return Err(SyncError::MissingSchemaModels(missing));
    }

    let engine = TemplateEngine::for_directory(&instance.directory)?;
    let mut rendered_for: Vec<&str> = Vec::new();
    let mut results = Vec::new();

    for role in [AdapterRole::Source, AdapterRole::Destination] {
        let adapter = instance.config.adapter(role).name.as_str();
        if rendered_for.contains(&adapter) {
            continue;
        }
        rendered_for.push(adapter);

        let ctx = GenerateContext::from_instance(instance, role, schema);
        for file in engine.render(&ctx, &instance.directory)? {
            let result = write_file(&file.path, &file.content, dry_run)?;
            results.push(GeneratedFile {
                template: file.template,
                result,
            });
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
name: tags
source: { name: file, settings: { path: tags.yml } }
destination: { name: infrahub, settings: { url: "http://localhost:8000", schema_file: schema.json } }
schema_mapping:
  - name: BuiltinTag
    mapping: tags
    identifiers: [name]
    fields:
      - { name: name }
"#;

    const SCHEMA: &str = r#"{"nodes": [{"namespace": "Builtin", "name": "Tag",
        "attributes": [{"name": "name", "kind": "Text"}]}]}"#;

    fn instance(dir: &Path, config: &str) -> SyncInstance {
        SyncInstance {
            config: serde_yaml::from_str(config).expect("config"),
            directory: dir.to_path_buf(),
        }
    }

    #[test]
    fn infrahub_side_prefers_destination() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            infrahub_side(&instance(dir.path(), CONFIG)),
            Some(AdapterRole::Destination)
        );
        let reversed = CONFIG
            .replace("source: { name: file", "source: { name: infrahub")
            .replace("destination: { name: infrahub", "destination: { name: file");
        assert_eq!(
            infrahub_side(&instance(dir.path(), &reversed)),
            Some(AdapterRole::Source)
        );
        let none = CONFIG.replace("destination: { name: infrahub", "destination: { name: file");
        assert!(matches!(
            load_schema(&instance(dir.path(), &none), None),
            Err(SyncError::NoInfrahubSide)
        ));
    }

    #[test]
    fn schema_file_is_read_relative_to_sync_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("schema.json"), SCHEMA).unwrap();
        let schema = load_schema(&instance(dir.path(), CONFIG), None).unwrap();
        assert!(schema.node("BuiltinTag").is_some());
    }

    #[test]
    fn writes_files_for_each_adapter_then_skips_unchanged() {
        let dir = TempDir::new().unwrap();
        let instance = instance(dir.path(), CONFIG);
        let schema: SchemaRoot = serde_json::from_str(SCHEMA).unwrap();

        let first = generate(&instance, &schema, false).unwrap();
        assert_eq!(first.len(), 4);
        assert!(first.iter().all(|r| matches!(r.result, WriteResult::Written { .. })));
        assert!(dir.path().join("file/sync_models.yaml").exists());
        assert!(dir.path().join("infrahub/README.md").exists());
        assert_eq!(first[0].template, "sync_models.yaml.tera");

        let second = generate(&instance, &schema, false).unwrap();
        assert!(second.iter().all(|r| matches!(r.result, WriteResult::Unchanged { .. })));
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let instance = instance(dir.path(), CONFIG);
        let schema: SchemaRoot = serde_json::from_str(SCHEMA).unwrap();
        let results = generate(&instance, &schema, true).unwrap();
        assert!(results.iter().all(|r| matches!(r.result, WriteResult::WouldWrite { .. })));
        assert!(!dir.path().join("file").exists());
    }

    #[test]
    fn missing_models_abort_before_writing() {
        let dir = TempDir::new().unwrap();
        let instance = instance(dir.path(), CONFIG);
        let err = generate(&instance, &SchemaRoot::default(), false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "one or more models are not present in the schema - BuiltinTag"
        );
        assert!(!dir.path().join("infrahub").exists());
    }
}
