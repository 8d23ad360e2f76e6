//! Generic JSON REST source.
//!
//! Settings:
//!
//! ```yaml
//! source:
//!   name: rest
//!   settings:
//!     url: https://netbox.example.com
//!     token: 0123abcd        # sent as `Authorization: Token <token>`
//!     resources:             # optional resource -> path overrides
//!       dcim.sites: /api/dcim/sites/?limit=500
//! ```
//!
//! Without an override, resource `dcim.sites` is read from `/api/dcim/sites/`.
//! Responses are either a bare list or a `{"results": [...], "next": <url>}`
//! page; pages are followed until `next` is null.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::{Map, Value};

use infrasync_core::{SchemaMappingModel, SyncAdapterConfig};

use crate::adapter::{Adapter, SourceRecord, REST_ADAPTER};
use crate::error::{http_err, SyncError};

const TIMEOUT: Duration = Duration::from_secs(30);

pub struct RestAdapter {
    url: String,
    token: Option<String>,
    resources: Map<String, Value>,
    agent: ureq::Agent,
}

impl RestAdapter {
    pub fn from_settings(config: &SyncAdapterConfig) -> Result<Self, SyncError> {
        let url = config
            .setting_str("url")
            .ok_or_else(|| SyncError::MissingSetting {
                adapter: REST_ADAPTER.to_string(),
                setting: "url".to_string(),
            })?;
        let resources = match config.setting("resources") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        Ok(RestAdapter {
            url: url.trim_end_matches('/').to_string(),
            token: config.setting_str("token").map(str::to_owned),
            resources,
            agent: ureq::AgentBuilder::new().timeout(TIMEOUT).build(),
        })
    }

    /// Absolute URL of the first page of `resource`.
    pub fn resource_url(&self, resource: &str) -> String {
        let path = match self.resources.get(resource).and_then(Value::as_str) {
            Some(path) => path.to_string(),
            None => default_path(resource),
        };
        if path.starts_with("http://") || path.starts_with("https://") {
            path
        } else {
            format!("{}/{}", self.url, path.trim_start_matches('/'))
        }
    }

    fn get(&self, url: &str) -> Result<Value, SyncError> {
        let mut request = self.agent.get(url).set("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Token {token}"));
        }
        let response = request.call().map_err(|e| http_err(url, e))?;
        response.into_json::<Value>().map_err(|e| SyncError::Response {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// `dcim.sites` -> `/api/dcim/sites/`
pub fn default_path(resource: &str) -> String {
    format!("/api/{}/", resource.replace('.', "/"))
}

/// Split one response body into its records and the next page URL.
pub fn parse_page(url: &str, body: Value) -> Result<(Vec<Value>, Option<String>), SyncError> {
    match body {
        Value::Array(records) => Ok((records, None)),
        Value::Object(mut envelope) => {
            let records = match envelope.remove("results") {
                Some(Value::Array(records)) => records,
                _ => {
                    return Err(SyncError::Response {
                        url: url.to_string(),
                        message: "expected a list or an object with 'results'".to_string(),
                    })
                }
            };
            let next = envelope
                .get("next")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned);
            Ok((records, next))
        }
        _ => Err(SyncError::Response {
            url: url.to_string(),
            message: "expected a list or an object with 'results'".to_string(),
        }),
    }
}

impl Adapter for RestAdapter {
    fn name(&self) -> &str {
        REST_ADAPTER
    }

    fn fetch(
        &mut self,
        model: &SchemaMappingModel,
        resource: &str,
    ) -> Result<Vec<SourceRecord>, SyncError> {
        let mut url = Some(self.resource_url(resource));
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        while let Some(current) = url.take() {
            if !seen.insert(current.clone()) {
                tracing::warn!(%current, "pagination loop detected; stopping");
                break;
            }
            tracing::debug!(model = %model.name, url = %current, "fetching page");
            let (page, next) = parse_page(&current, self.get(&current)?)?;
            for record in page {
                match record {
                    Value::Object(map) => records.push(SourceRecord::Document(map)),
                    other => tracing::warn!(%resource, "skipping non-object record {other}"),
                }
            }
            url = next;
        }
        Ok(records)
    }

    fn create(
        &mut self,
        _model: &SchemaMappingModel,
        _unique_id: &str,
        _payload: &Map<String, Value>,
    ) -> Result<Option<String>, SyncError> {
        Err(SyncError::ReadOnly {
            adapter: REST_ADAPTER.to_string(),
        })
    }

    fn update(
        &mut self,
        _model: &SchemaMappingModel,
        _local_id: &str,
        _payload: &Map<String, Value>,
    ) -> Result<(), SyncError> {
        Err(SyncError::ReadOnly {
            adapter: REST_ADAPTER.to_string(),
        })
    }

    fn delete(&mut self, _model: &SchemaMappingModel, _local_id: &str) -> Result<(), SyncError> {
        Err(SyncError::ReadOnly {
            adapter: REST_ADAPTER.to_string(),
        })
    }
}
