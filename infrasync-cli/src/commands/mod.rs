//! Subcommand implementations.

pub mod diff;
pub mod generate;
pub mod list;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};

use infrasync_core::{
    registry::{self, SyncSelector},
    SyncInstance,
};

/// How a single sync is selected; shared by `diff`, `sync`, and `generate`.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("selector").required(true).args(["name", "config_file"])))]
pub struct SelectorArgs {
    /// Name of the sync to use.
    #[arg(long)]
    pub name: Option<String>,

    /// Path to a sync configuration file.
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Base directory to search for sync configurations.
    #[arg(long, default_value = ".")]
    pub directory: PathBuf,

    /// Infrahub branch, when the configuration does not set one.
    #[arg(long)]
    pub branch: Option<String>,
}

impl SelectorArgs {
    pub fn selector(&self) -> Option<SyncSelector> {
        match (&self.name, &self.config_file) {
            (Some(name), _) => Some(SyncSelector::Name(name.clone())),
            (None, Some(path)) => Some(SyncSelector::ConfigFile(path.clone())),
            (None, None) => None,
        }
    }

    /// Load the selected sync.
    pub fn instance(&self) -> Result<SyncInstance> {
        let selector = self
            .selector()
            .context("provide --name or --config-file")?;
        let instance = registry::get_instance(&selector, &self.directory)?;
        tracing::info!(sync = %instance.config.name, "selected sync");
        Ok(instance)
    }
}
