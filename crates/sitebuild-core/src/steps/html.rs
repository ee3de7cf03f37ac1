//! HTML minification with minify-html.

use serde::{Deserialize, Serialize};

use super::Asset;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlOptions {
    /// Collapse whitespace between and around tags.
    pub collapse_whitespace: bool,
    /// Keep optional closing tags such as `</p>` and `</li>`.
    pub keep_closing_tags: bool,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            keep_closing_tags: true,
        }
    }
}

pub(crate) fn minify(mut asset: Asset, options: &HtmlOptions) -> Result<Asset> {
    // Without whitespace collapsing there is nothing left for the minifier to do
    if !options.collapse_whitespace {
        return Ok(asset);
    }

    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = options.keep_closing_tags;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;

    asset.contents = minify_html::minify(&asset.contents, &cfg);
    Ok(asset)
}
