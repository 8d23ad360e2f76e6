//! `infrasync diff`: show what a sync would change in the destination.

use anyhow::{Context, Result};
use clap::Args;

use infrasync_sync::SyncJob;

use super::SelectorArgs;

/// Arguments for `infrasync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub selector: SelectorArgs,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let instance = self.selector.instance()?;
        let name = instance.config.name.clone();
        let mut job = SyncJob::from_instance(instance, self.selector.branch.as_deref())?;

        job.source_load()
            .with_context(|| format!("failed to load the source of '{name}'"))?;
        job.destination_load()
            .with_context(|| format!("failed to load the destination of '{name}'"))?;

        let diff = job.diff();
        if diff.has_diffs() {
            println!("{diff}");
        } else {
            println!("No difference found");
        }
        Ok(())
    }
}
