//! # infrasync-sync
//!
//! Adapters, item translation, diffing, and the sync pipeline.
//!
//! A [`SyncJob`] loads both sides of a [`SyncInstance`](infrasync_core::SyncInstance)
//! into [`Store`]s, computes a [`Diff`], and applies it to the destination.
//! [`generate`](generate::generate) renders per-adapter model files from the
//! Infrahub schema.

pub mod adapter;
pub mod adapters;
pub mod diff;
pub mod error;
pub mod filter;
pub mod generate;
pub mod pipeline;
pub mod store;
pub mod writer;

pub use adapter::{build_adapter, Adapter, Entry, Node, SourceRecord};
pub use diff::{AttributeChange, Diff, DiffAction, DiffElement, DiffSummary};
pub use error::SyncError;
pub use pipeline::SyncJob;
pub use store::{Item, Store};
pub use writer::{write_file, WriteResult};
