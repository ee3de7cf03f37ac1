//! File watcher over the source directories
//!
//! notify delivers events (inotify on Linux, FSEvents on macOS) into a std
//! channel; `poll()` drains it without blocking.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;
use tracing::{debug, info, warn};

use sitebuild_core::{BuildError, Result};

/// File change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Modify,
    Delete,
}

impl ChangeKind {
    fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Create),
            EventKind::Modify(_) => Some(ChangeKind::Modify),
            EventKind::Remove(_) => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

pub struct FileWatcher {
    roots: Vec<PathBuf>,
    poll_interval: Duration,
    watcher: Option<RecommendedWatcher>,
    receiver: Option<Receiver<notify::Result<Event>>>,
}

impl FileWatcher {
    /// Watch every directory in `roots` recursively.
    pub fn new(roots: Vec<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            roots,
            poll_interval,
            watcher: None,
            receiver: None,
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// Start watching files
    pub fn start(&mut self) -> Result<()> {
        let (tx, rx) = channel();
        let config = Config::default().with_poll_interval(self.poll_interval);

        let mut watcher = RecommendedWatcher::new(tx, config)
            .map_err(|e| BuildError::Watch(e.to_string()))?;
        for root in &self.roots {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| BuildError::Watch(format!("{}: {}", root.display(), e)))?;
            info!("Watching {}", root.display());
        }

        self.watcher = Some(watcher);
        self.receiver = Some(rx);
        Ok(())
    }

    /// Stop watching
    pub fn stop(&mut self) {
        if self.watcher.take().is_some() {
            debug!("File watcher stopped");
        }
        self.receiver = None;
    }

    /// Drain pending changes (non-blocking)
    pub fn poll(&self) -> Vec<FileChange> {
        let mut changes = Vec::new();
        let Some(rx) = &self.receiver else {
            return changes;
        };

        while let Ok(result) = rx.try_recv() {
            match result {
                Ok(event) => {
                    let Some(kind) = ChangeKind::from_event(&event.kind) else {
                        continue;
                    };
                    for path in event.paths {
                        debug!("File change: {:?} ({:?})", path, kind);
                        changes.push(FileChange { path, kind });
                    }
                }
                Err(e) => warn!("Watch error: {}", e),
            }
        }
        changes
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
