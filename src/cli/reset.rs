//! Reset command.

use std::path::Path;

use anyhow::Result;
use clap::Parser;

use crate::runner::{load_config, reset_state};

/// Reset command options.
#[derive(Parser)]
pub struct ResetCommand {}

impl ResetCommand {
    /// Executes the reset command.
    pub fn execute(self, config: Option<&Path>) -> Result<()> {
        let state = reset_state(&load_config(config)?)?;
        println!(
            "State reset complete. cursor: {}",
            state.cursor.as_deref().unwrap_or("none")
        );
        Ok(())
    }
}
