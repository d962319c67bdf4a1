use crate::error::RunnerError;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The directory the engine runs in.
///
/// A temporary directory is removed when this value is dropped unless retention was requested.
/// A caller-supplied directory is left in place.
#[derive(Debug)]
pub enum WorkingDir {
    Temporary(TempDir),
    Retained(PathBuf),
    Supplied(PathBuf),
}

impl WorkingDir {
    pub fn create(supplied: Option<&Path>, retain: bool) -> Result<Self, RunnerError> {
        if let Some(path) = supplied {
            fs::create_dir_all(path).map_err(|e| RunnerError::io(path, e))?;
            return Ok(Self::Supplied(path.to_owned()));
        }
        let dir = tempfile::Builder::new()
            .prefix("rdfox-runner-")
            .tempdir()
            .map_err(|e| RunnerError::io(std::env::temp_dir(), e))?;
        tracing::debug!(path = %dir.path().display(), "Created working directory");
        if retain {
            let path = dir.keep();
            tracing::info!(path = %path.display(), "Retaining working directory");
            Ok(Self::Retained(path))
        } else {
            Ok(Self::Temporary(dir))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Temporary(dir) => dir.path(),
            Self::Retained(path) | Self::Supplied(path) => path,
        }
    }

    /// Deletes files or directories an earlier run left at `relative` paths.
    pub fn remove_stale(&self, relative: &[PathBuf]) -> Result<(), RunnerError> {
        for entry in relative {
            let path = self.path().join(entry);
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else if path.exists() {
                fs::remove_file(&path)
            } else {
                continue;
            };
            removed.map_err(|e| RunnerError::io(&path, e))?;
            tracing::debug!(path = %path.display(), "Removed output of an earlier run");
        }
        Ok(())
    }

    /// Removes the directory now, reporting failures instead of ignoring them on drop.
    pub fn close(self) -> Result<(), RunnerError> {
        match self {
            Self::Temporary(dir) => {
                let path = dir.path().to_owned();
                dir.close().map_err(|e| RunnerError::io(path, e))
            }
            Self::Retained(path) | Self::Supplied(path) => {
                tracing::info!(path = %path.display(), "Leaving working directory in place");
                Ok(())
            }
        }
    }
}
