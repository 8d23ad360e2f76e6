//! Infrahub adapter: schema download, paged GraphQL queries, and mutations.
//!
//! Settings (each falls back as noted):
//!
//! | setting     | fallback                                  |
//! |-------------|-------------------------------------------|
//! | `url`       | `INFRAHUB_ADDRESS`                        |
//! | `token`     | `INFRAHUB_API_TOKEN` (sent as `X-INFRAHUB-KEY`) |
//! | `branch`    | `--branch`, then `main`                   |
//! | `page_size` | 100                                       |

use std::time::Duration;

use serde_json::{json, Map, Value};

use infrasync_core::{
    schema::{Cardinality, NodeSchema, SchemaRoot},
    SchemaMappingModel, SyncAdapterConfig,
};

use crate::adapter::{Adapter, Node, SourceRecord, INFRAHUB_ADAPTER};
use crate::error::{http_err, SyncError};

pub const ADDRESS_ENV: &str = "INFRAHUB_ADDRESS";
pub const TOKEN_ENV: &str = "INFRAHUB_API_TOKEN";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_PAGE_SIZE: usize = 100;

const TOKEN_HEADER: &str = "X-INFRAHUB-KEY";
const TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Thin HTTP client for the Infrahub REST and GraphQL endpoints.
pub struct InfrahubClient {
    address: String,
    token: Option<String>,
    branch: String,
    agent: ureq::Agent,
}

impl InfrahubClient {
    pub fn from_settings(
        config: &SyncAdapterConfig,
        cli_branch: Option<&str>,
    ) -> Result<Self, SyncError> {
        let address = config
            .setting_str("url")
            .map(str::to_owned)
            .or_else(|| env_setting(ADDRESS_ENV))
            .ok_or_else(|| SyncError::MissingSetting {
                adapter: INFRAHUB_ADAPTER.to_string(),
                setting: format!("url (or {ADDRESS_ENV})"),
            })?;
        let token = config
            .setting_str("token")
            .map(str::to_owned)
            .or_else(|| env_setting(TOKEN_ENV));
        Ok(InfrahubClient {
            address: address.trim_end_matches('/').to_string(),
            token,
            branch: resolve_branch(config, cli_branch),
            agent: ureq::AgentBuilder::new().timeout(TIMEOUT).build(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    fn authorize(&self, request: ureq::Request) -> ureq::Request {
        match &self.token {
            Some(token) => request.set(TOKEN_HEADER, token),
            None => request,
        }
    }

    /// Download the schema of the configured branch.
    pub fn schema(&self) -> Result<SchemaRoot, SyncError> {
        let url = format!("{}/api/schema", self.address);
        tracing::info!(%url, branch = %self.branch, "downloading schema");
        let request = self.agent.get(&url).query("branch", &self.branch);
        let response = self
            .authorize(request)
            .call()
            .map_err(|e| http_err(&url, e))?;
        response
            .into_json::<SchemaRoot>()
            .map_err(|e| SyncError::Response {
                url,
                message: e.to_string(),
            })
    }

    /// Run a GraphQL document and return its `data`.
    pub fn execute(&self, query: &str, variables: Value) -> Result<Value, SyncError> {
        let url = format!("{}/graphql/{}", self.address, self.branch);
        tracing::debug!(%url, "graphql request");
        let request = self.authorize(self.agent.post(&url));
        let response = request
            .send_json(json!({"query": query, "variables": variables}))
            .map_err(|e| http_err(&url, e))?;
        let body: Value = response.into_json().map_err(|e| SyncError::Response {
            url: url.clone(),
            message: e.to_string(),
        })?;
        graphql_data(&url, body)
    }
}

fn env_setting(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// `settings.branch`, then the CLI `--branch`, then `main`.
pub fn resolve_branch(config: &SyncAdapterConfig, cli_branch: Option<&str>) -> String {
    config
        .setting_str("branch")
        .or(cli_branch.filter(|b| !b.is_empty()))
        .unwrap_or(DEFAULT_BRANCH)
        .to_string()
}

/// Extract `data`, turning GraphQL `errors` into [`SyncError::GraphQl`].
pub fn graphql_data(url: &str, mut body: Value) -> Result<Value, SyncError> {
    if let Some(Value::Array(errors)) = body.get("errors") {
        if !errors.is_empty() {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| {
                    e.get("message")
                        .and_then(Value::as_str)
                        .map_or_else(|| e.to_string(), str::to_owned)
                })
                .collect();
            return Err(SyncError::GraphQl(messages.join("; ")));
        }
    }
    match body.get_mut("data").map(Value::take) {
        Some(Value::Null) | None => Err(SyncError::Response {
            url: url.to_string(),
            message: "response carries no data".to_string(),
        }),
        Some(data) => Ok(data),
    }
}

// ---------------------------------------------------------------------------
// Query and mutation documents
// ---------------------------------------------------------------------------

/// Paged query selecting every attribute value and relationship peer id of `node`.
pub fn build_query(node: &NodeSchema, offset: usize, limit: usize) -> String {
    let mut selection = String::from("id");
    for attribute in &node.attributes {
        selection.push_str(&format!(" {} {{ value }}", attribute.name));
    }
    for relationship in &node.relationships {
        match relationship.cardinality {
            Cardinality::One => selection.push_str(&format!(" {} {{ node {{ id }} }}", relationship.name)),
            Cardinality::Many => selection.push_str(&format!(
                " {} {{ edges {{ node {{ id }} }} }}",
                relationship.name
            )),
        }
    }
    format!(
        "query {{ {kind}(offset: {offset}, limit: {limit}) {{ count edges {{ node {{ {selection} }} }} }} }}",
        kind = node.kind()
    )
}

pub fn create_mutation(kind: &str) -> String {
    format!("mutation($data: {kind}CreateInput!) {{ {kind}Create(data: $data) {{ ok object {{ id }} }} }}")
}

pub fn update_mutation(kind: &str) -> String {
    format!("mutation($data: {kind}UpdateInput!) {{ {kind}Update(data: $data) {{ ok }} }}")
}

pub fn delete_mutation(kind: &str) -> String {
    format!("mutation($data: DeleteInput!) {{ {kind}Delete(data: $data) {{ ok }} }}")
}

/// Flatten one queried node to `{attr: value, rel: peer_id | [peer_ids]}`.
pub fn flatten_node(node: &NodeSchema, raw: &Value) -> Option<Node> {
    let id = raw.get("id")?.as_str()?.to_string();
    let mut fields = Map::new();
    for attribute in &node.attributes {
        let value = raw
            .get(&attribute.name)
            .and_then(|a| a.get("value"))
            .cloned()
            .unwrap_or(Value::Null);
        fields.insert(attribute.name.clone(), value);
    }
    for relationship in &node.relationships {
        let raw_rel = raw.get(&relationship.name);
        let value = match relationship.cardinality {
            Cardinality::One => raw_rel
                .and_then(|r| r.get("node"))
                .and_then(|n| n.get("id"))
                .cloned()
                .unwrap_or(Value::Null),
            Cardinality::Many => Value::Array(
                raw_rel
                    .and_then(|r| r.get("edges"))
                    .and_then(Value::as_array)
                    .map(|edges| {
                        edges
                            .iter()
                            .filter_map(|e| e.get("node")?.get("id").cloned())
                            .collect()
                    })
                    .unwrap_or_default(),
            ),
        };
        fields.insert(relationship.name.clone(), value);
    }
    Some(Node {
        id,
        kind: node.kind(),
        fields,
    })
}

/// Mutation input for `payload`: attributes as `{value}`, relationships as `{id}` peers.
///
/// Null relationships are omitted on create and cleared on update.
pub fn mutation_data(node: &NodeSchema, payload: &Map<String, Value>, update: bool) -> Map<String, Value> {
    let mut data = Map::new();
    for (name, value) in payload {
        let Some(relationship) = node.relationship(name) else {
            data.insert(name.clone(), json!({ "value": value }));
            continue;
        };
        let peer = |id: &Value| json!({ "id": id });
        let converted = match (relationship.cardinality, value) {
            (_, Value::Null) if !update => continue,
            (Cardinality::One, Value::Null) => Value::Null,
            (Cardinality::Many, Value::Null) => Value::Array(Vec::new()),
            (Cardinality::Many, Value::Array(ids)) => Value::Array(ids.iter().map(peer).collect()),
            (Cardinality::Many, id) => Value::Array(vec![peer(id)]),
            (Cardinality::One, id) => peer(id),
        };
        data.insert(name.clone(), converted);
    }
    data
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

pub struct InfrahubAdapter {
    client: InfrahubClient,
    schema: Option<SchemaRoot>,
    page_size: usize,
}

impl InfrahubAdapter {
    pub fn from_settings(
        config: &SyncAdapterConfig,
        cli_branch: Option<&str>,
    ) -> Result<Self, SyncError> {
        let page_size = config
            .setting("page_size")
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Ok(InfrahubAdapter {
            client: InfrahubClient::from_settings(config, cli_branch)?,
            schema: None,
            page_size,
        })
    }

    fn node_schema(&mut self, kind: &str) -> Result<NodeSchema, SyncError> {
        if self.schema.is_none() {
            self.schema = Some(self.client.schema()?);
        }
        self.schema
            .as_ref()
            .and_then(|schema| schema.node(kind))
            .cloned()
            .ok_or_else(|| SyncError::MissingSchemaModels(vec![kind.to_string()]))
    }
}

impl Adapter for InfrahubAdapter {
    fn name(&self) -> &str {
        INFRAHUB_ADAPTER
    }

    fn fetch(
        &mut self,
        model: &SchemaMappingModel,
        resource: &str,
    ) -> Result<Vec<SourceRecord>, SyncError> {
        let node = self.node_schema(resource)?;
        let kind = node.kind();
        let mut records = Vec::new();
        let mut offset = 0;

        loop {
            let data = self
                .client
                .execute(&build_query(&node, offset, self.page_size), json!({}))?;
            let page = &data[kind.as_str()];
            let edges = page["edges"].as_array().cloned().unwrap_or_default();
            let fetched = edges.len();
            for edge in &edges {
                match flatten_node(&node, &edge["node"]) {
                    Some(flat) => records.push(SourceRecord::Node(flat)),
                    None => tracing::warn!(model = %model.name, %kind, "skipping node without id"),
                }
            }
            offset += fetched;
            let total = page["count"].as_u64().map(|c| c as usize).unwrap_or(offset);
            if fetched == 0 || offset >= total {
                break;
            }
        }
        tracing::debug!(%kind, count = records.len(), "fetched nodes");
        Ok(records)
    }

    fn create(
        &mut self,
        model: &SchemaMappingModel,
        unique_id: &str,
        payload: &Map<String, Value>,
    ) -> Result<Option<String>, SyncError> {
        let node = self.node_schema(&model.name)?;
        let kind = node.kind();
        let data = mutation_data(&node, payload, false);
        tracing::info!(%kind, %unique_id, "creating node");
        let result = self
            .client
            .execute(&create_mutation(&kind), json!({ "data": data }))?;
        Ok(result[format!("{kind}Create").as_str()]["object"]["id"]
            .as_str()
            .map(str::to_owned))
    }

    fn update(
        &mut self,
        model: &SchemaMappingModel,
        local_id: &str,
        payload: &Map<String, Value>,
    ) -> Result<(), SyncError> {
        let node = self.node_schema(&model.name)?;
        let kind = node.kind();
        let mut data = Map::new();
        data.insert("id".to_string(), Value::String(local_id.to_string()));
        data.extend(mutation_data(&node, payload, true));
        tracing::info!(%kind, id = %local_id, "updating node");
        self.client
            .execute(&update_mutation(&kind), json!({ "data": data }))?;
        Ok(())
    }

    fn delete(&mut self, model: &SchemaMappingModel, local_id: &str) -> Result<(), SyncError> {
        let kind = self.node_schema(&model.name)?.kind();
        tracing::info!(%kind, id = %local_id, "deleting node");
        self.client
            .execute(&delete_mutation(&kind), json!({ "data": { "id": local_id } }))?;
        Ok(())
    }
}
