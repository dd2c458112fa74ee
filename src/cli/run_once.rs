//! Run-once command: a single poll cycle.

use std::path::Path;

use anyhow::Result;
use clap::Parser;

use crate::engine::CycleOutcome;

/// Run-once command options.
#[derive(Parser)]
pub struct RunOnceCommand {}

impl RunOnceCommand {
    /// Executes the run-once command.
    ///
    /// Cycle-level failures are reported but do not fail the command; the
    /// affected commits are retried by the next cycle.
    pub async fn execute(self, config: Option<&Path>) -> Result<()> {
        let report = crate::runner::run_once(config).await?;

        match &report.outcome {
            CycleOutcome::Completed => {}
            CycleOutcome::RepositoryUnavailable(reason) => {
                println!("repository unavailable: {reason}");
            }
            CycleOutcome::EmptyRepository => println!("repository has no commits yet"),
            CycleOutcome::StateRecovered => {
                println!("state file was invalid; baseline reset to current HEAD");
            }
            CycleOutcome::Failed(failure) => println!("cycle ended early: {failure}"),
        }

        println!(
            "processed {} commit(s): {} kept, {} skipped, {} draft(s) queued",
            report.processed,
            report.kept,
            report.skipped,
            report.queued.len()
        );
        for path in &report.queued {
            println!("  {}", path.display());
        }
        Ok(())
    }
}
