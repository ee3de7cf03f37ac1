//! Publish manifest: object key → hash of what was last uploaded under it

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    bucket: String,
    entries: BTreeMap<String, String>,
}

/// JSON-backed record of earlier uploads, one file per bucket.
pub struct PublishCache {
    path: PathBuf,
    manifest: Manifest,
    dirty: bool,
}

impl PublishCache {
    /// Load the manifest at `path`; a missing file is an empty cache.
    /// A manifest written for a different bucket is discarded.
    pub fn open(path: impl AsRef<Path>, bucket: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let fail = |message: String| BuildError::Cache {
            path: path.clone(),
            message,
        };

        let manifest = match fs::read_to_string(&path) {
            Ok(content) => {
                let manifest: Manifest =
                    serde_json::from_str(&content).map_err(|e| fail(e.to_string()))?;
                if manifest.bucket == bucket {
                    manifest
                } else {
                    Manifest::default()
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Manifest::default(),
            Err(e) => return Err(fail(e.to_string())),
        };

        Ok(Self {
            manifest: Manifest {
                bucket: bucket.to_string(),
                entries: manifest.entries,
            },
            path,
            dirty: false,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.manifest.entries.get(key).map(String::as_str)
    }

    pub fn put(&mut self, key: &str, hash: &str) {
        if self.get(key) != Some(hash) {
            self.manifest.entries.insert(key.to_string(), hash.to_string());
            self.dirty = true;
        }
    }

    pub fn remove(&mut self, key: &str) {
        if self.manifest.entries.remove(key).is_some() {
            self.dirty = true;
        }
    }

    /// Write the manifest back if anything changed.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let fail = |message: String| BuildError::Cache {
            path: self.path.clone(),
            message,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(&self.manifest).map_err(|e| fail(e.to_string()))?;
        fs::write(&self.path, content).map_err(|e| fail(e.to_string()))?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_manifest_is_empty() {
        let tmp = TempDir::new().unwrap();
        let cache = PublishCache::open(tmp.path().join("m.json"), "b").unwrap();
        assert_eq!(cache.get("index.html"), None);
    }

    #[test]
    fn test_put_save_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".sitebuild/publish-b.json");

        let mut cache = PublishCache::open(&path, "b").unwrap();
        cache.put("index.html", "h1");
        cache.put("app.js", "h2");
        cache.remove("app.js");
        cache.save().unwrap();

        let cache = PublishCache::open(&path, "b").unwrap();
        assert_eq!(cache.get("index.html"), Some("h1"));
        assert_eq!(cache.get("app.js"), None);
    }

    #[test]
    fn test_other_bucket_manifest_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("m.json");

        let mut cache = PublishCache::open(&path, "first").unwrap();
        cache.put("k", "h");
        cache.save().unwrap();

        let cache = PublishCache::open(&path, "second").unwrap();
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_corrupt_manifest_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("m.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            PublishCache::open(&path, "b"),
            Err(BuildError::Cache { .. })
        ));
    }
}
