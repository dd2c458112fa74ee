//! Utility functions and helpers.

pub mod atomic;
pub mod clock;

pub use atomic::{write_atomic, StagedFile};
pub use clock::{format_timestamp, utc_timestamp, week_start};
