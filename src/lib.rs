//! # shipnote
//!
//! Watches a git repository and turns significant commits into queued
//! social post drafts.
//!
//! A poll cycle discovers commits after a persisted cursor, filters out
//! trivial ones, redacts secrets from the diff, asks a generation service
//! for drafts and writes them to a queue directory. Each commit is
//! processed once; state is checkpointed after every commit so a crash
//! replays at most the commit in flight.
//!
//! ## Quick Start
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! let report = shipnote::runner::run_once(None).await?;
//! println!("{} commit(s) processed", report.processed);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod ai;
pub mod cli;
pub mod config;
pub mod context;
pub mod daemon;
pub mod engine;
pub mod filter;
pub mod generation;
pub mod git;
pub mod lock;
pub mod queue;
pub mod redact;
pub mod runner;
pub mod scaffold;
pub mod state;
pub mod templates;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::cli::Cli;

/// The current version of shipnote.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
