//! Error types for infrasync-sync.

use std::path::PathBuf;

use thiserror::Error;

use infrasync_core::{ConfigError, NoIdentifierFound};
use infrasync_renderer::RenderError;

/// All errors that can arise from loading, diffing, syncing, and generating.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from configuration discovery.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error from the rendering engine (generate or transforms).
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// A record of a model without configured identifiers carries no `id`.
    #[error(transparent)]
    Identifier(#[from] NoIdentifierFound),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A data file that does not have the expected shape.
    #[error("invalid document {path}: {message}")]
    Document { path: PathBuf, message: String },

    /// Transport-level or HTTP status failure.
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    /// The remote API answered but the payload was not what was expected.
    #[error("unexpected response from {url}: {message}")]
    Response { url: String, message: String },

    /// GraphQL `errors` returned by Infrahub.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("unknown adapter '{name}'; expected one of: file, rest, infrahub")]
    UnknownAdapter { name: String },

    #[error("adapter '{adapter}' requires the '{setting}' setting")]
    MissingSetting { adapter: String, setting: String },

    #[error("adapter '{adapter}' is read-only and cannot be used as a destination")]
    ReadOnly { adapter: String },

    #[error("{model} '{id}' not found in adapter '{adapter}'")]
    RecordNotFound {
        adapter: String,
        model: String,
        id: String,
    },

    #[error("neither the source nor the destination of this sync is infrahub")]
    NoInfrahubSide,

    #[error("one or more models are not present in the schema - {}", .0.join(", "))]
    MissingSchemaModels(Vec<String>),

    #[error("invalid filter on '{field}': {message}")]
    Filter { field: String, message: String },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Http`] from a `ureq` failure.
pub(crate) fn http_err(url: &str, err: ureq::Error) -> SyncError {
    let message = match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            format!("HTTP {code}: {}", body.trim())
        }
        ureq::Error::Transport(transport) => transport.to_string(),
    };
    SyncError::Http {
        url: url.to_string(),
        message,
    }
}
