//! BLAKE3 content hashing over the output tree
//!
//! - Walks without ignore rules; `walk_files` skips hidden entries,
//!   `hash_tree` includes them
//! - Hashes in parallel with Rayon
//! - Keys are `/`-separated paths relative to the walked root

use ignore::WalkBuilder;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

/// Hash a byte slice, hex encoded.
pub fn hash_bytes(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

/// Every regular, non-hidden file below `root`, sorted. A missing root has
/// no files.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    walk(root, false)
}

fn walk(root: &Path, include_hidden: bool) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkBuilder::new(root)
        .hidden(!include_hidden)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .build()
    {
        let entry = entry.map_err(|e| BuildError::SourceRead {
            path: root.to_path_buf(),
            source: e.into_io_error().unwrap_or_else(|| std::io::Error::other("walk failed")),
        })?;
        if entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Object key for a file: its path below `root` with `/` separators.
pub fn key_for(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Key → content hash for every file below `root`.
pub fn hash_tree(root: &Path) -> Result<BTreeMap<String, String>> {
    let files = walk(root, true)?;

    // Parallel hashing with Rayon
    files
        .par_iter()
        .map(|path| {
            let content = fs::read(path).map_err(|source| BuildError::SourceRead {
                path: path.clone(),
                source,
            })?;
            Ok::<_, BuildError>((key_for(root, path), hash_bytes(&content)))
        })
        .collect()
}
