//! `infrasync generate`: render per-adapter model files from the Infrahub schema.

use anyhow::{Context, Result};
use clap::Args;

use infrasync_sync::{
    generate::{generate, load_schema},
    WriteResult,
};

use super::SelectorArgs;

/// Arguments for `infrasync generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub selector: SelectorArgs,

    /// Show what would be written without writing any files.
    #[arg(long)]
    pub dry_run: bool,
}

impl GenerateArgs {
    pub fn run(self) -> Result<()> {
        let instance = self.selector.instance()?;
        let schema = load_schema(&instance, self.selector.branch.as_deref())
            .context("failed to load the Infrahub schema")?;

        let files = generate(&instance, &schema, self.dry_run)?;
        for file in files {
            match &file.result {
                WriteResult::Written { path } => {
                    println!("Rendered template {} to {}", file.template, path.display())
                }
                WriteResult::WouldWrite { path } => println!(
                    "[dry-run] Would render template {} to {}",
                    file.template,
                    path.display()
                ),
                WriteResult::Unchanged { path } => {
                    println!("Unchanged {} ({})", path.display(), file.template)
                }
            }
        }
        Ok(())
    }
}
