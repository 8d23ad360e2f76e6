//! Sync configuration discovery.
//!
//! # Storage layout
//!
//! ```text
//! <directory>/
//!   from-netbox/
//!     config.yml          (one sync per directory)
//!     netbox_data.yml     (adapter-specific files, resolved relative to config.yml)
//!   to-file/
//!     config.yaml
//! ```
//!
//! Directories are walked recursively in sorted order so listings are
//! deterministic. Hidden directories (`.git`, `.venv`, ...) are skipped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{io_err, ConfigError};
use crate::types::{SyncConfig, SyncInstance};

/// File names recognised as sync configurations.
pub const CONFIG_FILE_NAMES: &[&str] = &["config.yml", "config.yaml"];

/// How the caller designates a sync: by name (searched under a directory) or
/// by an explicit configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncSelector {
    Name(String),
    ConfigFile(PathBuf),
}

// ---------------------------------------------------------------------------
// 1. Discovery
// ---------------------------------------------------------------------------

/// Every sync configuration found under `directory`, sorted by path.
///
/// Files that fail to parse or validate are skipped with a warning; I/O
/// errors still abort the walk.
pub fn list_syncs_at(directory: &Path) -> Result<Vec<SyncInstance>, ConfigError> {
    if !directory.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_config_files(directory, &mut files)?;

    let mut instances = Vec::with_capacity(files.len());
    for path in &files {
        match load_config_file(path) {
            Ok(instance) => instances.push(instance),
            Err(err @ (ConfigError::Parse { .. } | ConfigError::Invalid { .. })) => {
                tracing::warn!(path = %path.display(), "skipping sync configuration: {err}");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(instances)
}

fn collect_config_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ConfigError> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .filter_map(|e| e.ok())
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;
        if file_type.is_dir() {
            if !name.starts_with('.') {
                collect_config_files(&path, out)?;
            }
        } else if CONFIG_FILE_NAMES.contains(&name.as_ref()) {
            out.push(path);
        }
    }
    Ok(())
}

/// Find the sync named `name` under `directory`.
pub fn find_sync_at(directory: &Path, name: &str) -> Result<SyncInstance, ConfigError> {
    list_syncs_at(directory)?
        .into_iter()
        .find(|instance| instance.config.name.0 == name)
        .ok_or_else(|| ConfigError::SyncNotFound {
            name: name.to_string(),
            directory: directory.to_path_buf(),
        })
}

/// Resolve a [`SyncSelector`] to a loaded instance.
pub fn get_instance(selector: &SyncSelector, directory: &Path) -> Result<SyncInstance, ConfigError> {
    match selector {
        SyncSelector::Name(name) => find_sync_at(directory, name),
        SyncSelector::ConfigFile(path) => load_config_file(path),
    }
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load and validate a single configuration file.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML,
/// `ConfigError::Invalid` if model references do not line up.
pub fn load_config_file(path: &Path) -> Result<SyncInstance, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let config: SyncConfig = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate(&config).map_err(|message| ConfigError::Invalid {
        path: path.to_path_buf(),
        message,
    })?;

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tracing::debug!(sync = %config.name, path = %path.display(), "loaded sync configuration");
    Ok(SyncInstance { config, directory })
}

// ---------------------------------------------------------------------------
// 3. Validation
// ---------------------------------------------------------------------------

fn validate(config: &SyncConfig) -> Result<(), String> {
    let mut seen = HashSet::new();
    for model in &config.schema_mapping {
        if !seen.insert(model.name.as_str()) {
            return Err(format!("model '{}' is mapped more than once", model.name));
        }
    }

    for name in &config.order {
        if !seen.contains(name.as_str()) {
            return Err(format!("order lists '{name}' which is not in schema_mapping"));
        }
    }

    for model in &config.schema_mapping {
        for identifier in &model.identifiers {
            if model.field(identifier).is_none() {
                return Err(format!(
                    "identifier '{identifier}' of model '{}' is not one of its fields",
                    model.name
                ));
            }
        }
        for field in &model.fields {
            if field.static_value.is_some() && field.mapping.is_some() {
                return Err(format!(
                    "field '{}.{}' sets both 'static' and 'mapping'",
                    model.name, field.name
                ));
            }
            if let Some(peer) = &field.reference {
                if !seen.contains(peer.as_str()) {
                    return Err(format!(
                        "field '{}.{}' references '{peer}' which is not in schema_mapping",
                        model.name, field.name
                    ));
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(root: &Path, dir: &str, file: &str, name: &str) -> PathBuf {
        let dir = root.join(dir);
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join(file);
        std::fs::write(
            &path,
            format!(
                "name: {name}\nsource:\n  name: file\ndestination:\n  name: infrahub\nschema_mapping: []\n"
            ),
        )
        .expect("write");
        path
    }

    #[test]
    fn list_is_sorted_and_recursive() {
        let root = TempDir::new().expect("tempdir");
        write_config(root.path(), "b-sync", "config.yml", "bravo");
        write_config(root.path(), "a-sync/nested", "config.yaml", "alpha");
        write_config(root.path(), ".hidden", "config.yml", "hidden");

        let names: Vec<_> = list_syncs_at(root.path())
            .expect("list")
            .into_iter()
            .map(|i| i.config.name.0)
            .collect();
        assert_eq!(names, vec!["alpha", "bravo"]);
    }

    #[test]
    fn list_missing_directory_is_empty() {
        let root = TempDir::new().expect("tempdir");
        let list = list_syncs_at(&root.path().join("nope")).expect("list");
        assert!(list.is_empty());
    }

    #[test]
    fn instance_directory_is_config_parent() {
        let root = TempDir::new().expect("tempdir");
        let path = write_config(root.path(), "demo", "config.yml", "demo");
        let instance = load_config_file(&path).expect("load");
        assert_eq!(instance.directory, root.path().join("demo"));
    }

    #[test]
    fn find_unknown_sync_is_not_found() {
        let root = TempDir::new().expect("tempdir");
        write_config(root.path(), "demo", "config.yml", "demo");
        let err = find_sync_at(root.path(), "other").unwrap_err();
        assert!(matches!(err, ConfigError::SyncNotFound { .. }));
        assert!(err.to_string().contains("list command"));
    }
}
