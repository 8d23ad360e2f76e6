//! `infrasync list`: show every sync configuration under a directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use infrasync_core::registry;

/// Arguments for `infrasync list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Base directory to search for sync configurations.
    #[arg(long, default_value = ".")]
    pub directory: PathBuf,
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let instances = registry::list_syncs_at(&self.directory).with_context(|| {
            format!(
                "failed to read sync configurations under {}",
                self.directory.display()
            )
        })?;

        if instances.is_empty() {
            println!("No sync configurations found in {}", self.directory.display());
            return Ok(());
        }

        for instance in instances {
            let config = &instance.config;
            println!(
                "{} | {} >> {} | {}",
                config.name.to_string().bold(),
                config.source.name,
                config.destination.name,
                instance.directory.display()
            );
        }
        Ok(())
    }
}
