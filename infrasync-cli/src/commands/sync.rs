//! `infrasync sync`: apply the diff between source and destination.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use infrasync_sync::SyncJob;

use super::SelectorArgs;

/// Arguments for `infrasync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub selector: SelectorArgs,

    /// Print the differences before applying them (default).
    #[arg(long, overrides_with = "no_diff")]
    pub diff: bool,

    /// Apply without printing the differences.
    #[arg(long, overrides_with = "diff")]
    pub no_diff: bool,
}

impl SyncArgs {
    /// The last of `--diff` / `--no-diff` wins; neither means show.
    pub fn show_diff(&self) -> bool {
        self.diff || !self.no_diff
    }

    pub fn run(self) -> Result<()> {
        let instance = self.selector.instance()?;
        let name = instance.config.name.clone();
        let mut job = SyncJob::from_instance(instance, self.selector.branch.as_deref())?;

        job.source_load()
            .with_context(|| format!("failed to load the source of '{name}'"))?;
        job.destination_load()
            .with_context(|| format!("failed to load the destination of '{name}'"))?;

        let diff = job.diff();
        if !diff.has_diffs() {
            println!("No difference found. Nothing to sync");
            return Ok(());
        }

        if self.show_diff() {
            println!("{diff}");
        }

        let started = Instant::now();
        job.sync(&diff)
            .with_context(|| format!("sync failed for '{name}'"))?;
        println!(
            "Sync: Completed in {:.3} sec",
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }
}
