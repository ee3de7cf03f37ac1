//! Source globs
//!
//! Patterns are relative to the project root. A matched file keeps its path
//! relative to the glob base (the literal directories before the first
//! wildcard), so `src/pages/**/*.html` maps `src/pages/a/b.html` to `a/b.html`.

use glob::{MatchOptions, Pattern};
use std::path::{Component, Path, PathBuf};

use crate::error::{BuildError, Result};

const WILDCARDS: &[char] = &['*', '?', '[', '{'];

/// `*` and `?` never cross a `/`; only `**` spans directories. Wildcards
/// never match a leading `.`, so dotfiles and dot-directories are skipped.
pub fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    }
}

/// Literal directory prefix of a pattern. A pattern without wildcards is a
/// single file, whose base is its parent directory.
pub fn glob_base(pattern: &str) -> PathBuf {
    let pattern = pattern.trim_start_matches("./");
    let parts: Vec<&str> = pattern.split('/').filter(|p| !p.is_empty()).collect();

    match parts.iter().position(|p| p.contains(WILDCARDS)) {
        Some(i) => parts[..i].iter().collect(),
        None => parts[..parts.len().saturating_sub(1)].iter().collect(),
    }
}

/// Compile a root-relative pattern for matching root-relative paths.
pub fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern.trim_start_matches("./"))
        .map_err(|e| BuildError::Config(format!("bad glob {}: {}", pattern, e)))
}

/// Does a root-relative path match the pattern?
pub fn matches(pattern: &Pattern, relative: &Path) -> bool {
    pattern.matches_path_with(relative, match_options())
}

/// All files under `root` matching `pattern`, in enumeration order.
pub fn find_sources(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let escaped = Pattern::escape(&root.to_string_lossy());
    let full = format!("{}/{}", escaped.trim_end_matches('/'), pattern.trim_start_matches("./"));

    let paths = glob::glob_with(&full, match_options())
        .map_err(|e| BuildError::Config(format!("bad glob {}: {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| BuildError::SourceRead {
            path: e.path().to_path_buf(),
            source: e.into_error(),
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// Strip `base` from `path`, dropping `.` components along the way.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path = path.strip_prefix(base).unwrap_or(path);
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
