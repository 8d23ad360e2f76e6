//! Template context: serializable rendering payload built from a [`SyncInstance`]
//! and the Infrahub schema it is reflected against.

use serde::{Deserialize, Serialize};

use infrasync_core::{
    schema::{NodeSchema, SchemaRoot},
    AdapterRole, SchemaMappingField, SchemaMappingModel, SyncInstance,
};

use crate::error::RenderError;

/// Rendering payload for one side of a sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateContext {
    pub sync_name: String,
    pub adapter: AdapterCtx,
    pub models: Vec<ModelCtx>,
    pub meta: MetaCtx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterCtx {
    pub name: String,
    pub role: String,
    /// The other side's adapter name.
    pub peer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCtx {
    pub name: String,
    /// Resource the adapter reads this model from.
    pub resource: String,
    pub identifiers: Vec<String>,
    pub fields: Vec<FieldCtx>,
    pub filters: usize,
    pub transforms: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCtx {
    pub name: String,
    /// Path read from the adapter's records; `None` for static fields.
    pub path: Option<String>,
    /// JSON-encoded static value.
    pub static_value: Option<String>,
    pub reference: Option<String>,
    /// Attribute kind from the schema, `Relationship`, or `Unknown`.
    pub kind: String,
    pub cardinality: Option<String>,
    pub optional: bool,
    pub identifier: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaCtx {
    pub infrasync_version: String,
}

impl GenerateContext {
    /// Build the context for the adapter on `role`'s side of `instance`.
    pub fn from_instance(instance: &SyncInstance, role: AdapterRole, schema: &SchemaRoot) -> Self {
        let config = &instance.config;
        let adapter = config.adapter(role);
        let peer = match role {
            AdapterRole::Source => config.adapter(AdapterRole::Destination),
            AdapterRole::Destination => config.adapter(AdapterRole::Source),
        };
        // Mapping paths describe source records; the destination is addressed by field name.
        let mapped = role == AdapterRole::Source;

        let models = config
            .ordered_models()
            .into_iter()
            .map(|model| model_ctx(model, schema.node(&model.name), mapped))
            .collect();

        GenerateContext {
            sync_name: config.name.0.clone(),
            adapter: AdapterCtx {
                name: adapter.name.clone(),
                role: role.to_string(),
                peer: peer.name.clone(),
            },
            models,
            meta: MetaCtx {
                infrasync_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

fn model_ctx(model: &SchemaMappingModel, node: Option<&NodeSchema>, mapped: bool) -> ModelCtx {
    ModelCtx {
        name: model.name.clone(),
        resource: if mapped {
            model.mapping.clone()
        } else {
            model.name.clone()
        },
        identifiers: model.identifiers.clone(),
        fields: model
            .fields
            .iter()
            .map(|field| field_ctx(field, node, mapped, model.identifiers.contains(&field.name)))
            .collect(),
        filters: model.filters.len(),
        transforms: model.transforms.len(),
    }
}

fn field_ctx(
    field: &SchemaMappingField,
    node: Option<&NodeSchema>,
    mapped: bool,
    identifier: bool,
) -> FieldCtx {
    let path = match (&field.static_value, mapped) {
        (Some(_), _) => None,
        (None, true) => Some(field.source_path().to_string()),
        (None, false) => Some(field.name.clone()),
    };

    let attribute = node.and_then(|n| n.attribute(&field.name));
    let relationship = node.and_then(|n| n.relationship(&field.name));
    let (kind, cardinality, optional) = match (attribute, relationship) {
        (Some(attr), _) => (attr.kind.clone(), None, attr.optional),
        (None, Some(rel)) => (
            "Relationship".to_string(),
            Some(rel.cardinality.to_string()),
            rel.optional,
        ),
        (None, None) if field.reference.is_some() => ("Relationship".to_string(), None, true),
        (None, None) => ("Unknown".to_string(), None, true),
    };

    FieldCtx {
        name: field.name.clone(),
        path,
        static_value: field.static_value.as_ref().map(|v| v.to_string()),
        reference: field.reference.clone(),
        kind,
        cardinality,
        optional,
        identifier,
    }
}
