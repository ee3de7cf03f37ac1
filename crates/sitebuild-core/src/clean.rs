//! Clean task - removes the output directory before a build.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{BuildError, Result};
use crate::task::{Task, TaskFuture};

pub struct CleanTask {
    target: PathBuf,
}

impl CleanTask {
    pub fn new(target: impl AsRef<Path>) -> Self {
        Self {
            target: target.as_ref().to_path_buf(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Remove the target recursively. Returns whether anything was removed;
    /// an already-absent target is a successful no-op.
    pub async fn clean(&self) -> Result<bool> {
        match tokio::fs::remove_dir_all(&self.target).await {
            Ok(()) => {
                info!("Removed {}", self.target.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(BuildError::DestinationWrite {
                path: self.target.clone(),
                source,
            }),
        }
    }
}

impl Task for CleanTask {
    fn name(&self) -> &str {
        "clean"
    }

    fn run(&self) -> TaskFuture<'_> {
        Box::pin(async move {
            self.clean().await?;
            Ok(())
        })
    }
}
