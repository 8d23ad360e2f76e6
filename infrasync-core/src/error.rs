//! Error types for infrasync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while locating and loading sync configurations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, unreadable directory, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, with file path and line context from serde_yaml.
    #[error("failed to parse sync configuration at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The configuration file did not exist at the given path.
    #[error("sync configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// No configuration under the search directory carries this name.
    #[error("unable to find the sync '{name}' under {directory}; use the list command to see the syncs available")]
    SyncNotFound { name: String, directory: PathBuf },

    /// The configuration parsed but is internally inconsistent.
    #[error("invalid sync configuration at {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
