//! Path renaming. With every option empty the path is unchanged.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::Asset;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameOptions {
    pub prefix: String,
    pub suffix: String,
    /// Replaces the file stem when set.
    pub basename: Option<String>,
    /// Replaces the extension (with its dot, e.g. `".min.css"`) when set.
    pub extname: Option<String>,
}

pub(crate) fn apply(mut asset: Asset, options: &RenameOptions) -> Asset {
    asset.path = rename_path(&asset.path, options);
    asset
}

pub(crate) fn rename_path(path: &Path, options: &RenameOptions) -> PathBuf {
    let stem = match &options.basename {
        Some(name) => name.clone(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let ext = match &options.extname {
        Some(ext) => ext.clone(),
        None => path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default(),
    };

    let file_name = format!("{}{}{}{}", options.prefix, stem, options.suffix, ext);
    match path.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_options_are_passthrough() {
        let path = Path::new("pages/about/style.css");
        assert_eq!(rename_path(path, &RenameOptions::default()), path);
    }

    #[test]
    fn test_prefix_suffix_and_extname() {
        let options = RenameOptions {
            prefix: "x-".into(),
            suffix: "-v2".into(),
            basename: None,
            extname: Some(".min.css".into()),
        };
        assert_eq!(
            rename_path(Path::new("css/site.css"), &options),
            PathBuf::from("css/x-site-v2.min.css")
        );
    }

    #[test]
    fn test_basename_replaces_stem() {
        let options = RenameOptions {
            basename: Some("main".into()),
            ..RenameOptions::default()
        };
        assert_eq!(rename_path(Path::new("a/b.css"), &options), PathBuf::from("a/main.css"));
    }
}
