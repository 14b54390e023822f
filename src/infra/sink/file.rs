//! Append-only file sink for completion records.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use parking_lot::Mutex;

use crate::core::{AppResult, CompletionSink};

/// File sink holding one handle opened in append mode.
///
/// Writes from concurrent drain loops are serialized so lines never interleave.
/// `append` blocks on disk I/O; callers on an async runtime run it through
/// `spawn_blocking`.
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    /// Open (or create) the log at `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the file
    /// cannot be opened for appending.
    pub fn new(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent)
                .with_context(|| format!("creating sink directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Location of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CompletionSink for FileSink {
    fn append(&self, line: &str) -> AppResult<()> {
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .with_context(|| format!("appending to {}", self.path.display()))?;
        Ok(())
    }
}
