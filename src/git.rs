//! Git operations: the commit source the poll cycle reads from.

pub mod commit;
pub mod repository;
pub mod source;

pub use commit::CommitRecord;
pub use repository::GitRepository;
pub use source::{CommitSource, SourceControlError};

/// Number of hex characters to show in abbreviated commit hashes.
pub const SHORT_HASH_LEN: usize = 7;

/// Abbreviates a commit id for log output.
pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_HASH_LEN).unwrap_or(id)
}
