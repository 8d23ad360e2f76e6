//! infrasync core library: sync configuration types, discovery, schema model,
//! and the record helpers shared by every adapter.
//!
//! - [`types`]: configuration structs parsed from `config.yml`
//! - [`registry`]: locate and load sync configurations on disk
//! - [`schema`]: Infrahub schema model used by `generate` and the Infrahub adapter
//! - [`record`]: dotted-path lookup and identifier derivation
//! - [`error`]: [`ConfigError`]

pub mod error;
pub mod record;
pub mod registry;
pub mod schema;
pub mod types;

pub use error::ConfigError;
pub use record::{derive_identifier, get_value, Attributes, NoIdentifierFound, Record};
pub use types::{
    AdapterRole, FilterOperation, FilterRule, SchemaMappingField, SchemaMappingModel, SyncAdapterConfig,
    SyncConfig, SyncFlag, SyncInstance, SyncName, TransformRule,
};
