//! Concatenation of a whole stream into one file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::Asset;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcatOptions {
    pub file_name: String,
    pub separator: String,
}

impl Default for ConcatOptions {
    fn default() -> Self {
        Self {
            file_name: "app.js".to_string(),
            separator: "\n".to_string(),
        }
    }
}

/// Join all files in stream order. An empty stream produces no file.
pub(crate) fn concat(assets: Vec<Asset>, options: &ConcatOptions) -> Option<Asset> {
    if assets.is_empty() {
        return None;
    }

    let mut contents = Vec::new();
    for (i, asset) in assets.into_iter().enumerate() {
        if i > 0 {
            contents.extend_from_slice(options.separator.as_bytes());
        }
        contents.extend(asset.contents);
    }

    Some(Asset::new(PathBuf::from(&options.file_name), contents))
}
