//! Build graph - the named entry points and the order they run in
//!
//! `build` is clean, then every asset group in parallel, then publish.
//! Every other name runs one task on its own.

use anyhow::{anyhow, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::clean::CleanTask;
use crate::config::SiteConfig;
use crate::error::Result;
use crate::graph::Stage;
use crate::publish::{ObjectStore, PublishTask};
use crate::scheduler::{Scheduler, TaskResult, TaskStatus};
use crate::transform::TransformTask;

pub const BUILD: &str = "build";
pub const CLEAN: &str = "clean";
pub const PUBLISH: &str = "publish";

/// Result of running one entry point.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub target: String,
    pub results: Vec<TaskResult>,
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.status == TaskStatus::Completed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.iter().filter(|r| r.status == TaskStatus::Failed)
    }

    pub fn status(&self, task: &str) -> Option<TaskStatus> {
        self.results.iter().find(|r| r.name == task).map(|r| r.status)
    }

    /// Err with the first failure, if any.
    pub fn into_result(self) -> anyhow::Result<Self> {
        if let Some(failed) = self.failures().next() {
            bail!(
                "task '{}' failed: {}",
                failed.name,
                failed.error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(self)
    }
}

pub struct BuildGraph {
    root: PathBuf,
    config: SiteConfig,
    store: Arc<dyn ObjectStore>,
}

impl BuildGraph {
    pub fn new(root: impl AsRef<Path>, config: SiteConfig, store: Arc<dyn ObjectStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            config,
            store,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Every name `run` accepts.
    pub fn task_names(&self) -> Vec<String> {
        let mut names = vec![CLEAN.to_string()];
        names.extend(self.config.groups.iter().map(|g| g.name.clone()));
        names.push(PUBLISH.to_string());
        names.push(BUILD.to_string());
        names
    }

    pub fn transform(&self, group: &str) -> Option<TransformTask> {
        self.config
            .group(group)
            .map(|g| TransformTask::new(&self.root, g.clone()))
    }

    pub fn clean_task(&self) -> CleanTask {
        CleanTask::new(self.config.output_path(&self.root))
    }

    pub fn publish_task(&self) -> PublishTask {
        PublishTask::new(
            &self.root,
            &self.config.output_dir,
            self.config.publish.clone(),
            self.store.clone(),
        )
    }

    /// Stage for a named entry point.
    pub fn stage(&self, name: &str) -> Option<Stage> {
        match name {
            CLEAN => Some(Stage::task(self.clean_task())),
            PUBLISH => Some(Stage::task(self.publish_task())),
            BUILD => {
                let transforms = self
                    .config
                    .groups
                    .iter()
                    .map(|g| Stage::task(TransformTask::new(&self.root, g.clone())))
                    .collect();
                Some(Stage::Series(vec![
                    Stage::task(self.clean_task()),
                    Stage::Parallel(transforms),
                    Stage::task(self.publish_task()),
                ]))
            }
            group => self.transform(group).map(Stage::task),
        }
    }

    /// Run a named entry point to completion. Task failures are reported in
    /// the outcome; an unknown name or a failed pre-flight check is an error.
    pub async fn run(&self, name: &str) -> anyhow::Result<BuildOutcome> {
        let stage = self.stage(name).ok_or_else(|| {
            anyhow!(
                "Unknown task '{}' (expected one of: {})",
                name,
                self.task_names().join(", ")
            )
        })?;

        if name != CLEAN && name != PUBLISH {
            self.config.check_output_conflicts(&self.root)?;
        }

        let scheduler = match self.config.concurrency {
            Some(limit) => Scheduler::new(limit),
            None => Scheduler::with_default_concurrency(),
        };

        let start = Instant::now();
        info!("Running '{}'", name);
        let results = scheduler.fail_fast(true).execute(stage.into_tasks()).await?;
        let outcome = BuildOutcome {
            target: name.to_string(),
            results,
        };
        info!(
            "'{}' {} in {:?}",
            name,
            if outcome.is_success() { "finished" } else { "failed" },
            start.elapsed()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssetGroup;
    use crate::publish::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn project(root: &Path) {
        write(root, "src/index.html", "<html><body>  <!-- c --> <p>home</p></body></html>");
        write(root, "src/pages/about.html", "<p>about</p>");
        write(root, "src/pages/about.css", "p { color: blue; }");
        write(root, "src/styles/css/site.css", "body { margin: 0; }");
        write(root, "src/scripts/js/a.js", "var a = 1;");
        write(root, "src/scripts/js/b.js", "var b = a + 1;");
        write(root, "src/shared/robots.txt", "User-agent: *");
    }

    fn graph(root: &Path, store: &Arc<MemoryStore>) -> BuildGraph {
        let mut config = SiteConfig::default();
        config.publish.bucket = "test-bucket".into();
        config.concurrency = Some(2);
        BuildGraph::new(root, config, store.clone()).unwrap()
    }

    #[test]
    fn test_task_names() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let names = graph(tmp.path(), &store).task_names();
        assert_eq!(
            names,
            vec![
                "clean", "images", "styles", "scripts", "pagesHtml", "pageHome", "pagesCSS",
                "shared", "publish", "build"
            ]
        );
    }

    #[test]
    fn test_build_stage_orders_clean_transforms_publish() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let tasks = graph(tmp.path(), &store).stage(BUILD).unwrap().into_tasks();

        assert_eq!(tasks.len(), 9);
        let deps = |name: &str| {
            let mut deps = tasks.iter().find(|t| t.name == name).unwrap().dependencies.clone();
            deps.sort();
            deps
        };
        assert!(deps("clean").is_empty());
        assert_eq!(deps("images"), vec!["clean"]);
        assert_eq!(deps("shared"), vec!["clean"]);
        assert_eq!(deps("publish").len(), 7);
    }

    #[test]
    fn test_clean_target_is_output_dir() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let graph = graph(tmp.path(), &store);
        assert_eq!(graph.clean_task().target(), tmp.path().join("www"));
    }

    #[tokio::test]
    async fn test_full_build_publishes_output() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        project(root);
        write(root, "www/stale.txt", "left over");
        let store = Arc::new(MemoryStore::new());

        let outcome = graph(root, &store).run(BUILD).await.unwrap();
        assert!(outcome.is_success(), "{:?}", outcome.results);
        assert_eq!(outcome.results.len(), 9);

        assert!(!root.join("www/stale.txt").exists());
        assert_eq!(
            store.keys(),
            vec![
                "index.html",
                "pages/about.css",
                "pages/about.html",
                "scripts/js/app.js",
                "shared/robots.txt",
                "styles/css/site.css",
            ]
        );
        let home = String::from_utf8(store.object("index.html").unwrap().body).unwrap();
        assert!(!home.contains("<!--"));
    }

    #[tokio::test]
    async fn test_failed_transform_prevents_publish() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        project(root);
        write(root, "src/scripts/js/broken.js", "function ( {");
        let store = Arc::new(MemoryStore::new());

        let outcome = graph(root, &store).run(BUILD).await.unwrap();
        assert!(!outcome.is_success());
        assert_eq!(outcome.status("scripts"), Some(TaskStatus::Failed));
        assert_eq!(outcome.status("publish"), Some(TaskStatus::Cancelled));
        assert_eq!(store.put_count(), 0);
        assert!(outcome.into_result().is_err());
    }

    #[tokio::test]
    async fn test_single_group_runs_alone() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        project(root);
        let store = Arc::new(MemoryStore::new());

        let outcome = graph(root, &store).run("styles").await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert!(root.join("www/styles/css/site.css").exists());
        assert!(!root.join("www/index.html").exists());
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let err = graph(tmp.path(), &store).run("deploy").await.unwrap_err();
        assert!(err.to_string().contains("Unknown task"));
    }

    #[tokio::test]
    async fn test_output_conflict_stops_before_running() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "src/a/x.txt", "a");
        write(root, "src/b/x.txt", "b");
        write(root, "www/keep.txt", "kept");

        let config = SiteConfig {
            groups: vec![
                AssetGroup::new("first", "src/a/*.txt", "www/out", Vec::new()),
                AssetGroup::new("second", "src/b/*.txt", "www/out", Vec::new()),
            ],
            ..SiteConfig::default()
        };
        let store = Arc::new(MemoryStore::new());
        let graph = BuildGraph::new(root, config, store.clone()).unwrap();

        assert!(graph.run(BUILD).await.is_err());
        assert!(root.join("www/keep.txt").exists());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let tmp = TempDir::new().unwrap();
        let config = SiteConfig {
            groups: vec![AssetGroup::new("escape", "src/*.txt", "elsewhere", Vec::new())],
            ..SiteConfig::default()
        };
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        assert!(BuildGraph::new(tmp.path(), config, store).is_err());
    }
}
