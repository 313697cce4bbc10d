//! Scratch request file

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Default scratch file name, relative to the working directory
pub const DEFAULT_SCRATCH_FILE: &str = "test_input.json";

/// File holding the request payload; removed on cleanup or drop
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    removed: bool,
}

impl ScratchFile {
    /// Write `contents` to `path`, replacing any existing file
    pub async fn write(path: impl Into<PathBuf>, contents: &[u8]) -> std::io::Result<Self> {
        let path = path.into();
        tokio::fs::write(&path, contents).await?;
        debug!(path = %path.display(), bytes = contents.len(), "Wrote scratch file");
        Ok(Self {
            path,
            removed: false,
        })
    }

    /// Location of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file; a file that is already gone counts as removed
    pub async fn remove(&mut self) -> std::io::Result<()> {
        if self.removed {
            return Ok(());
        }

        let result = tokio::fs::remove_file(&self.path).await;
        self.finish_removal(result)
    }

    fn remove_blocking(&mut self) -> std::io::Result<()> {
        if self.removed {
            return Ok(());
        }

        let result = std::fs::remove_file(&self.path);
        self.finish_removal(result)
    }

    fn finish_removal(&mut self, result: std::io::Result<()>) -> std::io::Result<()> {
        match result {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        self.removed = true;
        debug!(path = %self.path.display(), "Removed scratch file");
        Ok(())
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = self.remove_blocking() {
            warn!(path = %self.path.display(), error = %e, "Failed to remove scratch file");
        }
    }
}
