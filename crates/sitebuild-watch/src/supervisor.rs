//! Watch supervisor - re-run a group's transform when its sources change
//!
//! Changes are mapped to the groups whose glob matches them. A group runs
//! once no change for it arrived for `debounce_ms`. A group already running
//! is not started again; the change stays pending and runs after the
//! in-flight run ends. Clean and publish never run from here.

use anyhow::Result;
use glob::Pattern;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use sitebuild_core::source;
use sitebuild_core::{AssetGroup, SiteConfig, TransformReport, TransformTask};

use crate::watcher::FileWatcher;

/// Counters returned when the supervisor stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub reruns: usize,
    pub failures: usize,
}

type Rerun = JoinHandle<Result<TransformReport>>;
type RerunFuture = Pin<Box<dyn Future<Output = Result<TransformReport>> + Send>>;
type Runner = Arc<dyn Fn(TransformTask) -> RerunFuture + Send + Sync>;

fn transform(task: TransformTask) -> RerunFuture {
    Box::pin(async move { task.execute_async().await })
}

pub struct WatchSupervisor {
    root: PathBuf,
    groups: Vec<(AssetGroup, Pattern)>,
    debounce: Duration,
    poll_interval: Duration,
    runner: Runner,
}

impl WatchSupervisor {
    pub fn new(root: impl AsRef<Path>, config: &SiteConfig) -> Result<Self> {
        let root = root.as_ref();
        // notify reports resolved paths on some platforms
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        let groups = config
            .groups
            .iter()
            .map(|group| -> Result<(AssetGroup, Pattern)> {
                Ok((group.clone(), source::compile(&group.src)?))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            root,
            groups,
            debounce: Duration::from_millis(config.watch.debounce_ms),
            poll_interval: Duration::from_millis(config.watch.poll_interval_ms.max(1)),
            runner: Arc::new(transform),
        })
    }

    #[cfg(test)]
    fn with_runner(mut self, runner: Runner) -> Self {
        self.runner = runner;
        self
    }

    /// Names of the groups whose glob matches `path` (absolute or
    /// root-relative).
    pub fn groups_for(&self, path: &Path) -> Vec<&str> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.groups
            .iter()
            .filter(|(_, pattern)| source::matches(pattern, relative))
            .map(|(group, _)| group.name.as_str())
            .collect()
    }

    /// Directories to watch: each glob base, or its nearest existing
    /// ancestor, without nested duplicates.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self
            .groups
            .iter()
            .map(|(group, _)| {
                let mut dir = self.root.join(group.base());
                while !dir.is_dir() && dir != self.root {
                    if !dir.pop() {
                        break;
                    }
                }
                dir
            })
            .collect();

        roots.sort();
        roots.dedup();
        let mut distinct: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !distinct.iter().any(|kept| root.starts_with(kept)) {
                distinct.push(root);
            }
        }
        distinct
    }

    /// Watch until `shutdown` turns true (or its sender is dropped), then
    /// wait for in-flight reruns.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<WatchStats> {
        let mut watcher = FileWatcher::new(self.watch_roots(), self.poll_interval);
        watcher.start()?;
        info!("👀 Watching {} group(s), Ctrl-C to stop", self.groups.len());

        let mut stats = WatchStats::default();
        let mut pending: HashMap<String, Instant> = HashMap::new();
        let mut running: HashMap<String, Rerun> = HashMap::new();

        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            for change in watcher.poll() {
                for group in self.groups_for(&change.path) {
                    pending.insert(group.to_string(), Instant::now());
                }
            }

            let finished: Vec<String> = running
                .iter()
                .filter(|(_, handle)| handle.is_finished())
                .map(|(name, _)| name.clone())
                .collect();
            for name in finished {
                if let Some(handle) = running.remove(&name) {
                    record(&name, handle.await, &mut stats);
                }
            }

            let now = Instant::now();
            let ready: Vec<String> = pending
                .iter()
                .filter(|(name, last)| {
                    now.duration_since(**last) >= self.debounce && !running.contains_key(*name)
                })
                .map(|(name, _)| name.clone())
                .collect();
            for name in ready {
                pending.remove(&name);
                if let Some(handle) = self.spawn_rerun(&name) {
                    running.insert(name, handle);
                }
            }
        }

        info!("Stopping watch, waiting for {} rerun(s)", running.len());
        for (name, handle) in running {
            record(&name, handle.await, &mut stats);
        }
        watcher.stop();
        Ok(stats)
    }

    fn spawn_rerun(&self, name: &str) -> Option<Rerun> {
        let (group, _) = self.groups.iter().find(|(g, _)| g.name == name)?;
        let task = TransformTask::new(&self.root, group.clone());
        debug!("Re-running '{}'", name);
        Some(tokio::spawn((self.runner)(task)))
    }
}

fn record(
    name: &str,
    outcome: std::result::Result<Result<TransformReport>, tokio::task::JoinError>,
    stats: &mut WatchStats,
) {
    stats.reruns += 1;
    match outcome {
        Ok(Ok(report)) => info!("✅ {} rebuilt ({} file(s))", name, report.written.len()),
        Ok(Err(e)) => {
            stats.failures += 1;
            error!("❌ {} failed: {:#}", name, e);
        }
        Err(e) => {
            stats.failures += 1;
            error!("❌ {} panicked: {}", name, e);
        }
    }
}
