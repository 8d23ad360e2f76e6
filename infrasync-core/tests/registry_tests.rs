//! Configuration discovery error messages and validation.

use assert_fs::prelude::*;
use infrasync_core::{
    registry::{self, SyncSelector},
    ConfigError,
};
use predicates::prelude::predicate;

const VALID: &str = "\
name: demo
source:
  name: file
  settings:
    path: source.yml
destination:
  name: file
order: [Tag]
schema_mapping:
  - name: Tag
    mapping: tags
    identifiers: [name]
    fields:
      - name: name
";

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_file_returns_not_found() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let err = registry::load_config_file(&dir.path().join("config.yml")).unwrap_err();
    assert!(matches!(err, ConfigError::ConfigNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yml");
    file.write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed").expect("write");

    let err = registry::load_config_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yml"));
}

#[test]
fn load_wrong_shape_returns_parse_error() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yml");
    file.write_str("- this is a list, not a mapping\n").expect("write");

    let err = registry::load_config_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Validation
// ---------------------------------------------------------------------------

fn load_invalid(yaml: &str) -> String {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yml");
    file.write_str(yaml).expect("write");
    let err = registry::load_config_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }), "got: {err}");
    err.to_string()
}

#[test]
fn order_must_name_mapped_models() {
    let msg = load_invalid(&VALID.replace("order: [Tag]", "order: [Tag, Site]"));
    assert!(msg.contains("'Site'"), "got: {msg}");
}

#[test]
fn reference_must_name_mapped_model() {
    let yaml = format!("{VALID}      - name: site\n        reference: Site\n");
    let msg = load_invalid(&yaml);
    assert!(msg.contains("references 'Site'"), "got: {msg}");
}

#[test]
fn static_and_mapping_are_exclusive() {
    let yaml = format!("{VALID}      - name: color\n        mapping: colour\n        static: red\n");
    let msg = load_invalid(&yaml);
    assert!(msg.contains("both 'static' and 'mapping'"), "got: {msg}");
}

#[test]
fn identifiers_must_be_fields() {
    let msg = load_invalid(&VALID.replace("identifiers: [name]", "identifiers: [slug]"));
    assert!(msg.contains("identifier 'slug'"), "got: {msg}");
}

#[test]
fn duplicate_models_are_rejected() {
    let yaml = format!("{VALID}  - name: Tag\n    mapping: labels\n");
    let msg = load_invalid(&yaml);
    assert!(msg.contains("more than once"), "got: {msg}");
}

// ---------------------------------------------------------------------------
// 3. Selector
// ---------------------------------------------------------------------------

#[test]
fn selector_by_name_and_by_file_agree() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child("demo").create_dir_all().expect("mkdir");
    let file = dir.child("demo").child("config.yml");
    file.write_str(VALID).expect("write");
    file.assert(predicate::path::exists());

    let by_name =
        registry::get_instance(&SyncSelector::Name("demo".into()), dir.path()).expect("by name");
    let by_file = registry::get_instance(
        &SyncSelector::ConfigFile(file.path().to_path_buf()),
        dir.path(),
    )
    .expect("by file");
    assert_eq!(by_name, by_file);
    assert_eq!(by_name.config.schema_mapping[0].name, "Tag");
}

#[test]
fn unparseable_configs_are_skipped_during_discovery() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child("demo/config.yml").write_str(VALID).expect("write");
    dir.child("broken/config.yml")
        .write_str("name: [unclosed\n")
        .expect("write");
    dir.child("target/vendor/config.yml")
        .write_str("version: 2\nservices: {}\n")
        .expect("write");

    let names: Vec<_> = registry::list_syncs_at(dir.path())
        .expect("list")
        .into_iter()
        .map(|i| i.config.name.0)
        .collect();
    assert_eq!(names, vec!["demo"]);

    let found = registry::find_sync_at(dir.path(), "demo").expect("demo is still found");
    assert_eq!(found.directory, dir.path().join("demo"));
    let err = registry::find_sync_at(dir.path(), "broken").unwrap_err();
    assert!(matches!(err, ConfigError::SyncNotFound { .. }), "got: {err}");
}
