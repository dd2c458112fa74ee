//! Crash-safe file replacement.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Content written to a temporary file beside its destination, not yet
/// visible at the destination path.
///
/// Dropping a staged file without calling [`commit`](Self::commit) removes
/// the temporary file and leaves the destination untouched.
pub struct StagedFile {
    tmp: NamedTempFile,
    dest: PathBuf,
}

impl StagedFile {
    /// Writes `data` to a temporary file in the destination's directory.
    pub fn stage(dest: &Path, data: &[u8]) -> io::Result<Self> {
        let parent = dest.parent().filter(|p| !p.as_os_str().is_empty()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no parent dir for {}", dest.display()),
            )
        })?;
        fs::create_dir_all(parent)?;
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(data)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        Ok(Self {
            tmp,
            dest: dest.to_path_buf(),
        })
    }

    /// Atomically renames the staged content over the destination.
    pub fn commit(self) -> io::Result<()> {
        self.tmp.persist(&self.dest).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Atomic write: stage to a temp file in the same directory, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    StagedFile::stage(path, data)?.commit()
}
