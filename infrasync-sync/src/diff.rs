//! Differences between the source and destination stores.

use std::fmt;

use serde_json::Value;

use infrasync_core::{SyncConfig, SyncFlag};

use crate::store::{Item, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffAction {
    Create,
    Update,
    Delete,
}

impl DiffAction {
    fn marker(self) -> char {
        match self {
            DiffAction::Create => '+',
            DiffAction::Update => '~',
            DiffAction::Delete => '-',
        }
    }
}

/// One attribute whose value differs between the sides.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    pub name: String,
    pub source: Value,
    pub destination: Value,
}

/// One item to create, update, or delete in the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffElement {
    pub action: DiffAction,
    pub model: String,
    pub unique_id: String,
    /// Set for updates only.
    pub changes: Vec<AttributeChange>,
}

/// Create/update/delete counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "create: {}, update: {}, delete: {}",
            self.create, self.update, self.delete
        )
    }
}

/// Ordered set of changes that would make the destination match the source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    /// Grouped by model in processing order; within a model sorted by `unique_id`.
    pub elements: Vec<DiffElement>,
}

impl Diff {
    /// Compare `source` against `destination` for every model of `config`.
    pub fn compute(config: &SyncConfig, source: &Store, destination: &Store) -> Self {
        let skip_src = config.has_flag(SyncFlag::SkipUnmatchedSrc);
        let skip_dst = config.has_flag(SyncFlag::SkipUnmatchedDst);
        let mut elements = Vec::new();

        for model in config.ordered_models() {
            let mut model_elements = Vec::new();
            for item in source.items(&model.name) {
                match destination.get(&model.name, &item.unique_id) {
                    None if skip_src => {}
                    None => model_elements.push(element(DiffAction::Create, item, Vec::new())),
                    Some(existing) => {
                        let changes = attribute_changes(item, existing);
                        if !changes.is_empty() {
                            model_elements.push(element(DiffAction::Update, item, changes));
                        }
                    }
                }
            }
            if !skip_dst {
                for item in destination.items(&model.name) {
                    if source.get(&model.name, &item.unique_id).is_none() {
                        model_elements.push(element(DiffAction::Delete, item, Vec::new()));
                    }
                }
            }
            model_elements.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
            elements.extend(model_elements);
        }

        Diff { elements }
    }

    pub fn has_diffs(&self) -> bool {
        !self.elements.is_empty()
    }

    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for element in &self.elements {
            match element.action {
                DiffAction::Create => summary.create += 1,
                DiffAction::Update => summary.update += 1,
                DiffAction::Delete => summary.delete += 1,
            }
        }
        summary
    }

    /// Elements with the given action, in diff order.
    pub fn with_action(&self, action: DiffAction) -> impl Iterator<Item = &DiffElement> {
        self.elements.iter().filter(move |e| e.action == action)
    }
}

fn element(action: DiffAction, item: &Item, changes: Vec<AttributeChange>) -> DiffElement {
    DiffElement {
        action,
        model: item.model.clone(),
        unique_id: item.unique_id.clone(),
        changes,
    }
}

fn attribute_changes(source: &Item, destination: &Item) -> Vec<AttributeChange> {
    source
        .attributes
        .iter()
        .filter_map(|(name, value)| {
            let current = destination.attributes.get(name).unwrap_or(&Value::Null);
            (current != value).then(|| AttributeChange {
                name: name.clone(),
                source: value.clone(),
                destination: current.clone(),
            })
        })
        .collect()
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut model: Option<&str> = None;
        for element in &self.elements {
            if model != Some(element.model.as_str()) {
                writeln!(f, "{}", element.model)?;
                model = Some(element.model.as_str());
            }
            writeln!(f, "  {} {}", element.action.marker(), element.unique_id)?;
            for change in &element.changes {
                writeln!(
                    f,
                    "      {}: {} -> {}",
                    change.name, change.destination, change.source
                )?;
            }
        }
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn item(model: &str, unique_id: &str, attributes: Value) -> Item {
        Item {
            model: model.into(),
            unique_id: unique_id.into(),
            local_id: None,
            identifiers: Map::new(),
            attributes: match attributes {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    fn config(flags: &str) -> SyncConfig {
        serde_yaml::from_str(&format!(
            r#"
name: demo
source: {{ name: file }}
destination: {{ name: file }}
order: [Tag, Site]
{flags}
schema_mapping:
  - {{ name: Site, mapping: sites }}
  - {{ name: Tag, mapping: tags }}
"#
        ))
        .expect("config")
    }

    fn stores() -> (Store, Store) {
        let mut source = Store::new();
        source.insert(item("Tag", "core", json!({"color": "red"})));
        source.insert(item("Tag", "edge", json!({"color": "blue"})));
        source.insert(item("Site", "ams", json!({"tags": ["core"]})));

        let mut destination = Store::new();
        destination.insert(item("Tag", "core", json!({"color": "green"})));
        destination.insert(item("Site", "ams", json!({"tags": ["core"]})));
        destination.insert(item("Site", "fra", json!({})));
        (source, destination)
    }

    #[test]
    fn computes_creates_updates_and_deletes_in_order() {
        let (source, destination) = stores();
        let diff = Diff::compute(&config(""), &source, &destination);
        let actions: Vec<_> = diff
            .elements
            .iter()
            .map(|e| (e.model.as_str(), e.unique_id.as_str(), e.action))
            .collect();
        assert_eq!(
            actions,
            vec![
                ("Tag", "core", DiffAction::Update),
                ("Tag", "edge", DiffAction::Create),
                ("Site", "fra", DiffAction::Delete),
            ]
        );
        assert_eq!(diff.elements[0].changes[0].destination, json!("green"));
        assert_eq!(
            diff.summary(),
            DiffSummary {
                create: 1,
                update: 1,
                delete: 1
            }
        );
    }

    #[test]
    fn flags_suppress_unmatched_items() {
        let (source, destination) = stores();
        let diff = Diff::compute(
            &config("diffsync_flags: [SKIP_UNMATCHED_SRC, SKIP_UNMATCHED_DST]"),
            &source,
            &destination,
        );
        assert_eq!(diff.summary().create, 0);
        assert_eq!(diff.summary().delete, 0);
        assert_eq!(diff.summary().update, 1);
    }

    #[test]
    fn identical_stores_have_no_diffs() {
        let (source, _) = stores();
        let diff = Diff::compute(&config(""), &source, &source.clone());
        assert!(!diff.has_diffs());
        assert_eq!(diff.to_string(), "create: 0, update: 0, delete: 0");
    }

    #[test]
    fn display_lists_models_and_changes() {
        let (source, destination) = stores();
        let rendered = Diff::compute(&config(""), &source, &destination).to_string();
        assert_eq!(
            rendered,
            "Tag\n  ~ core\n      color: \"green\" -> \"red\"\n  + edge\nSite\n  - fra\ncreate: 1, update: 1, delete: 1"
        );
    }
}
