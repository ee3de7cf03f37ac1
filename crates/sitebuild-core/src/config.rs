//! Site configuration
//!
//! Loaded once from `sitebuild.json` at the project root, falling back to the
//! built-in layout when the file does not exist. Immutable after load: the
//! build graph and the watcher each hold their own copy.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use crate::build::{BUILD, CLEAN, PUBLISH};
use crate::error::{BuildError, Result};
use crate::source;
use crate::steps::{
    ConcatOptions, HtmlOptions, ImageOptions, RenameOptions, ScriptOptions, Step, StripOptions,
    TranspileOptions,
};

pub const CONFIG_FILE: &str = "sitebuild.json";

/// One content category: where it comes from, where it goes, what happens on the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetGroup {
    pub name: String,
    /// Source glob, relative to the project root.
    pub src: String,
    /// Destination directory, relative to the project root.
    pub dest: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl AssetGroup {
    pub fn new(name: &str, src: &str, dest: &str, steps: Vec<Step>) -> Self {
        Self {
            name: name.to_string(),
            src: src.to_string(),
            dest: dest.to_string(),
            steps,
        }
    }

    /// Literal directory prefix of the source glob.
    pub fn base(&self) -> PathBuf {
        source::glob_base(&self.src)
    }

    /// Output path (relative to `dest`) of a source path relative to `base()`.
    pub fn output_path(&self, relative: &Path) -> PathBuf {
        self.steps
            .iter()
            .fold(relative.to_path_buf(), |path, step| step.output_path(&path))
    }
}

/// Remote bucket the output tree is published to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub region: String,
    pub bucket: String,
    /// S3 endpoint; `https://s3.<region>.amazonaws.com` when unset.
    pub endpoint: Option<String>,
    /// Profile name in the shared credentials file.
    pub profile: String,
    pub cache_control: String,
    /// Extensions uploaded gzip-encoded.
    pub gzip_extensions: Vec<String>,
    /// Publish manifest, relative to the project root.
    pub cache_file: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            bucket: "webdev-class.lawrencemcdaniel.com".to_string(),
            endpoint: None,
            profile: "default".to_string(),
            cache_control: "max-age=315360000, no-transform, public".to_string(),
            gzip_extensions: vec!["js".to_string()],
            cache_file: None,
        }
    }
}

impl PublishConfig {
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.region))
    }

    pub fn cache_path(&self, root: &Path) -> PathBuf {
        match &self.cache_file {
            Some(file) => root.join(file),
            None => root
                .join(".sitebuild")
                .join(format!("publish-{}.json", self.bucket)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period after the last change before a group is rebuilt.
    pub debounce_ms: u64,
    /// How often pending file events are drained.
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 200,
            poll_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Output root. Cleaned before a build, published after it.
    pub output_dir: String,
    pub groups: Vec<AssetGroup>,
    pub publish: PublishConfig,
    pub watch: WatchConfig,
    /// Max tasks in flight; available parallelism when unset.
    pub concurrency: Option<usize>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let minify_html = || {
            vec![
                Step::StripComments(StripOptions::default()),
                Step::MinifyHtml(HtmlOptions::default()),
            ]
        };
        let minify_css = || vec![Step::MinifyCss, Step::Rename(RenameOptions::default())];

        Self {
            output_dir: "www".to_string(),
            groups: vec![
                AssetGroup::new(
                    "images",
                    "src/assets/img/**/*.*",
                    "www/assets/img",
                    vec![Step::CompressImage(ImageOptions::default())],
                ),
                AssetGroup::new("styles", "src/styles/css/**/*.css", "www/styles/css", minify_css()),
                AssetGroup::new(
                    "scripts",
                    "src/scripts/js/**/*.js",
                    "www/scripts/js",
                    vec![
                        Step::StripComments(StripOptions::default()),
                        Step::Transpile(TranspileOptions::default()),
                        Step::MinifyScript(ScriptOptions::default()),
                        Step::Concat(ConcatOptions::default()),
                    ],
                ),
                AssetGroup::new("pagesHtml", "src/pages/**/*.html", "www/pages", minify_html()),
                AssetGroup::new("pageHome", "src/index.html", "www", minify_html()),
                AssetGroup::new("pagesCSS", "src/pages/**/*.css", "www/pages", minify_css()),
                AssetGroup::new("shared", "src/shared/**/*.*", "www/shared", Vec::new()),
            ],
            publish: PublishConfig::default(),
            watch: WatchConfig::default(),
            concurrency: None,
        }
    }
}

impl SiteConfig {
    /// Load `sitebuild.json` from `root`, or the defaults when it is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: SiteConfig = serde_json::from_str(&content)
            .map_err(|e| BuildError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join(CONFIG_FILE);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| BuildError::Config(e.to_string()))?;
        std::fs::write(&path, content)?;

        tracing::info!("Config saved to {:?}", path);
        Ok(())
    }

    pub fn group(&self, name: &str) -> Option<&AssetGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn output_path(&self, root: &Path) -> PathBuf {
        root.join(&self.output_dir)
    }

    /// Static checks that need no filesystem access.
    pub fn validate(&self) -> Result<()> {
        let output = Path::new(&self.output_dir);
        if self.output_dir.trim().is_empty() || output.components().count() == 0 {
            return Err(BuildError::Config("output_dir must not be empty".into()));
        }
        if escapes(output) {
            return Err(BuildError::Config(format!(
                "output_dir {} must not contain '..'",
                self.output_dir
            )));
        }

        let mut names = HashSet::new();
        let mut claims = HashSet::new();
        for group in &self.groups {
            if group.name.is_empty() {
                return Err(BuildError::Config("group with empty name".into()));
            }
            if [CLEAN, PUBLISH, BUILD].contains(&group.name.as_str()) {
                return Err(BuildError::Config(format!(
                    "group name '{}' is reserved for a build entry point",
                    group.name
                )));
            }
            if !names.insert(group.name.as_str()) {
                return Err(BuildError::Config(format!("duplicate group '{}'", group.name)));
            }
            source::compile(&group.src)?;

            let dest = Path::new(&group.dest);
            if escapes(dest) || !dest.starts_with(output) {
                return Err(BuildError::Config(format!(
                    "group '{}' writes to {} outside output dir {}",
                    group.name, group.dest, self.output_dir
                )));
            }
            if !claims.insert((dest.to_path_buf(), group.src.trim_start_matches("./"))) {
                return Err(BuildError::Config(format!(
                    "group '{}' repeats the source and destination of another group",
                    group.name
                )));
            }
        }
        Ok(())
    }

    /// Enumerate every group's planned outputs and fail if two groups would
    /// write the same file.
    pub fn check_output_conflicts(&self, root: &Path) -> Result<()> {
        let mut owners: HashMap<PathBuf, &str> = HashMap::new();

        for group in &self.groups {
            let base = root.join(group.base());
            let dest = Path::new(&group.dest);
            let planned: HashSet<PathBuf> = source::find_sources(root, &group.src)?
                .iter()
                .map(|path| dest.join(group.output_path(&source::relative_to(path, &base))))
                .collect();

            for path in planned {
                if let Some(first) = owners.insert(path.clone(), &group.name) {
                    return Err(BuildError::OutputConflict {
                        path,
                        first: first.to_string(),
                        second: group.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn escapes(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}
