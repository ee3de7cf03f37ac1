//! Transform task - one asset group through its step pipeline
//!
//! Read every file the group's glob matches, push the whole set through the
//! steps in order, write what comes out below the group's destination.
//! Source files are never modified. A glob that matches nothing completes
//! with nothing written.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::config::AssetGroup;
use crate::error::{BuildError, Result};
use crate::source;
use crate::steps::Asset;
use crate::task::{Task, TaskFuture};

/// What one run of a transform task did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformReport {
    pub group: String,
    pub read: usize,
    /// Written files, relative to the project root.
    pub written: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TransformTask {
    root: PathBuf,
    group: AssetGroup,
}

impl TransformTask {
    pub fn new(root: impl AsRef<Path>, group: AssetGroup) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            group,
        }
    }

    pub fn group(&self) -> &AssetGroup {
        &self.group
    }

    /// Run the pipeline on the current thread.
    pub fn execute(&self) -> Result<TransformReport> {
        let start = Instant::now();
        let sources = source::find_sources(&self.root, &self.group.src)?;
        let base = self.root.join(self.group.base());

        let mut assets = Vec::with_capacity(sources.len());
        for path in &sources {
            let contents = fs::read(path).map_err(|source| BuildError::SourceRead {
                path: path.clone(),
                source,
            })?;
            assets.push(Asset::new(source::relative_to(path, &base), contents));
        }
        let read = assets.len();

        for step in &self.group.steps {
            assets = step.apply(assets)?;
            debug!("[{}] {} -> {} file(s)", self.group.name, step.name(), assets.len());
        }

        let dest = Path::new(&self.group.dest);
        let mut written = Vec::with_capacity(assets.len());
        for asset in assets {
            let relative = dest.join(&asset.path);
            let out = self.root.join(&relative);
            write_file(&out, &asset.contents)?;
            written.push(relative);
        }

        info!(
            "[{}] {} read, {} written in {:?}",
            self.group.name,
            read,
            written.len(),
            start.elapsed()
        );

        Ok(TransformReport {
            group: self.group.name.clone(),
            read,
            written,
        })
    }

    /// Run the pipeline on the blocking pool.
    pub async fn execute_async(&self) -> anyhow::Result<TransformReport> {
        let this = self.clone();
        let report = tokio::task::spawn_blocking(move || this.execute()).await??;
        Ok(report)
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    let fail = |source| BuildError::DestinationWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(fail)?;
    }
    fs::write(path, contents).map_err(fail)
}

impl Task for TransformTask {
    fn name(&self) -> &str {
        &self.group.name
    }

    fn run(&self) -> TaskFuture<'_> {
        Box::pin(async move {
            self.execute_async().await?;
            Ok(())
        })
    }
}
