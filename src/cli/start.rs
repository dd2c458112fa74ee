//! Start command: runs the daemon in the foreground.

use std::path::Path;

use anyhow::Result;
use clap::Parser;

/// Start command options.
#[derive(Parser)]
pub struct StartCommand {}

impl StartCommand {
    /// Executes the start command.
    pub async fn execute(self, config: Option<&Path>) -> Result<()> {
        crate::runner::start(config).await
    }
}
