//! Transform steps
//!
//! A step takes the files flowing through a group and returns the files that
//! continue down the pipeline. Most steps map each file to exactly one file;
//! `concat` folds the whole stream into one.
//!
//! Each variant carries its own typed options record. In `sitebuild.json`:
//!
//! ```json
//! { "step": "minify_html", "collapse_whitespace": true }
//! ```

mod comments;
mod concat;
mod css;
mod html;
mod image;
mod rename;
mod script;

pub use comments::StripOptions;
pub use concat::ConcatOptions;
pub use html::HtmlOptions;
pub use image::ImageOptions;
pub use rename::RenameOptions;
pub use script::{ScriptOptions, TranspileOptions};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

/// A file in flight: path relative to the group's glob base, plus contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

impl Asset {
    pub fn new(path: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            contents,
        }
    }

    /// Contents as UTF-8, or a transform error naming the step that needed text.
    pub(crate) fn text(&self, step: &'static str) -> Result<&str> {
        std::str::from_utf8(&self.contents)
            .map_err(|e| BuildError::transform(step, &self.path, e))
    }
}

/// One stage of a group's pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    CompressImage(ImageOptions),
    MinifyCss,
    Rename(RenameOptions),
    StripComments(StripOptions),
    MinifyHtml(HtmlOptions),
    Transpile(TranspileOptions),
    MinifyScript(ScriptOptions),
    Concat(ConcatOptions),
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::CompressImage(_) => "compress_image",
            Step::MinifyCss => "minify_css",
            Step::Rename(_) => "rename",
            Step::StripComments(_) => "strip_comments",
            Step::MinifyHtml(_) => "minify_html",
            Step::Transpile(_) => "transpile",
            Step::MinifyScript(_) => "minify_script",
            Step::Concat(_) => "concat",
        }
    }

    /// Run the step over every file in the stream.
    pub fn apply(&self, assets: Vec<Asset>) -> Result<Vec<Asset>> {
        match self {
            Step::CompressImage(opts) => each(assets, |a| image::compress(a, opts)),
            Step::MinifyCss => each(assets, css::minify),
            Step::Rename(opts) => each(assets, |a| Ok(rename::apply(a, opts))),
            Step::StripComments(opts) => each(assets, |a| comments::strip(a, opts)),
            Step::MinifyHtml(opts) => each(assets, |a| html::minify(a, opts)),
            Step::Transpile(opts) => each(assets, |a| script::transpile(a, opts)),
            Step::MinifyScript(opts) => each(assets, |a| script::minify(a, opts)),
            Step::Concat(opts) => Ok(concat::concat(assets, opts).into_iter().collect()),
        }
    }

    /// Where a file at `path` ends up after this step, without running it.
    pub fn output_path(&self, path: &Path) -> PathBuf {
        match self {
            Step::Rename(opts) => rename::rename_path(path, opts),
            Step::Concat(opts) => PathBuf::from(&opts.file_name),
            _ => path.to_path_buf(),
        }
    }
}

fn each<F>(assets: Vec<Asset>, f: F) -> Result<Vec<Asset>>
where
    F: Fn(Asset) -> Result<Asset>,
{
    assets.into_iter().map(f).collect()
}

/// Lowercased extension, empty when there is none.
pub(crate) fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}
