//! Publish task - sync the output tree to the bucket
//!
//! One object per file below the output directory, keyed by its path
//! relative to that directory. Files whose extension is listed in
//! `gzip_extensions` are uploaded once, gzip-compressed, with
//! `Content-Encoding: gzip`. Every object carries the configured
//! `Cache-Control` and a `Content-Type`.
//!
//! A file is skipped when the manifest holds the same hash for its key and
//! the key still exists remotely. Remote keys with no local file are deleted
//! after all uploads succeed. An upload failure stops the publish; objects
//! uploaded before it stay recorded in the manifest.

mod cache;
mod credentials;
mod encoding;
mod report;
mod store;

pub use cache::PublishCache;
pub use credentials::{parse_profile, AwsCredentials, CredentialProvider, ProfileCredentials};
pub use encoding::{content_type, gzip};
pub use report::{PublishAction, PublishRecord, PublishReport};
pub use store::{ObjectStore, RemoteObject, S3Store, StoreFuture};

#[cfg(test)]
pub(crate) use store::memory::MemoryStore;

use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::config::PublishConfig;
use crate::error::{BuildError, Result};
use crate::hasher::{key_for, walk_files};
use crate::steps::extension;
use crate::task::{Task, TaskFuture};

/// One local file, encoded and ready to send.
#[derive(Debug)]
struct PlannedUpload {
    key: String,
    body: Vec<u8>,
    hash: String,
    headers: Vec<(String, String)>,
}

#[derive(Clone)]
pub struct PublishTask {
    root: PathBuf,
    output_dir: PathBuf,
    config: PublishConfig,
    store: Arc<dyn ObjectStore>,
}

impl PublishTask {
    /// `output_dir` is relative to `root`.
    pub fn new(
        root: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        config: PublishConfig,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            config,
            store,
        }
    }

    pub async fn publish(&self) -> Result<PublishReport> {
        let start = Instant::now();
        self.store.connect().await?;

        let output = self.root.join(&self.output_dir);
        let config = self.config.clone();
        let planned = tokio::task::spawn_blocking(move || plan_uploads(&output, &config))
            .await
            .map_err(|e| BuildError::Io(std::io::Error::other(e)))??;

        let remote: HashSet<String> = self
            .store
            .list()
            .await?
            .into_iter()
            .map(|object| object.key)
            .collect();

        let mut cache = PublishCache::open(self.config.cache_path(&self.root), &self.config.bucket)?;
        let mut report = PublishReport::default();
        let mut local = HashSet::with_capacity(planned.len());

        for upload in planned {
            local.insert(upload.key.clone());
            let exists = remote.contains(&upload.key);

            if exists && cache.get(&upload.key) == Some(upload.hash.as_str()) {
                report.push(PublishRecord {
                    key: upload.key,
                    action: PublishAction::Skip,
                    headers: upload.headers,
                });
                continue;
            }

            if let Err(e) = self.store.put(&upload.key, upload.body, &upload.headers).await {
                error!("[failed] {}: {}", upload.key, e);
                cache.save()?;
                return Err(e);
            }
            cache.put(&upload.key, &upload.hash);
            report.push(PublishRecord {
                key: upload.key,
                action: if exists {
                    PublishAction::Update
                } else {
                    PublishAction::Create
                },
                headers: upload.headers,
            });
        }

        let mut stale: Vec<&String> = remote.iter().filter(|key| !local.contains(*key)).collect();
        stale.sort();
        for key in stale {
            if let Err(e) = self.store.delete(key).await {
                error!("[failed] {}: {}", key, e);
                cache.save()?;
                return Err(e);
            }
            cache.remove(key);
            report.push(PublishRecord {
                key: key.clone(),
                action: PublishAction::Delete,
                headers: Vec::new(),
            });
        }

        cache.save()?;
        info!(
            "📦 {}: {} in {:?}",
            self.config.bucket,
            report.summary(),
            start.elapsed()
        );
        Ok(report)
    }
}

impl Task for PublishTask {
    fn name(&self) -> &str {
        "publish"
    }

    fn run(&self) -> TaskFuture<'_> {
        Box::pin(async move {
            self.publish().await?;
            Ok(())
        })
    }
}

/// Read, encode and hash every file under `output`, sorted by key.
fn plan_uploads(output: &Path, config: &PublishConfig) -> Result<Vec<PlannedUpload>> {
    let files = walk_files(output)?;

    let mut planned = files
        .par_iter()
        .map(|path| {
            let key = key_for(output, path);
            let contents = fs::read(path).map_err(|source| BuildError::SourceRead {
                path: path.clone(),
                source,
            })?;

            let mut headers = vec![
                ("Cache-Control".to_string(), config.cache_control.clone()),
                ("Content-Type".to_string(), content_type(&key).to_string()),
            ];
            let compress = config
                .gzip_extensions
                .iter()
                .any(|ext| ext.eq_ignore_ascii_case(&extension(path)));
            let body = if compress {
                headers.push(("Content-Encoding".to_string(), "gzip".to_string()));
                gzip(&contents)?
            } else {
                contents
            };

            let hash = upload_hash(&body, &headers);
            Ok::<_, BuildError>(PlannedUpload {
                key,
                body,
                hash,
                headers,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    planned.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(planned)
}

/// Hash of body and headers, so a header change forces a re-upload.
fn upload_hash(body: &[u8], headers: &[(String, String)]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(body);
    for (name, value) in headers {
        hasher.update(b"\n");
        hasher.update(name.as_bytes());
        hasher.update(b":");
        hasher.update(value.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn site(root: &Path) {
        write(root, "www/index.html", "<p>home</p>");
        write(root, "www/scripts/js/app.js", "function a(){return 1}");
        write(root, "www/styles/css/site.css", "body{color:red}");
    }

    fn task(root: &Path, store: &Arc<MemoryStore>) -> PublishTask {
        let config = PublishConfig {
            bucket: "test-bucket".into(),
            ..PublishConfig::default()
        };
        PublishTask::new(root, "www", config, store.clone())
    }

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[tokio::test]
    async fn test_first_publish_creates_everything() {
        let tmp = TempDir::new().unwrap();
        site(tmp.path());
        let store = Arc::new(MemoryStore::new());

        let report = task(tmp.path(), &store).publish().await.unwrap();

        assert_eq!(report.count(PublishAction::Create), 3);
        assert_eq!(
            store.keys(),
            vec!["index.html", "scripts/js/app.js", "styles/css/site.css"]
        );
        for key in store.keys() {
            let object = store.object(&key).unwrap();
            assert_eq!(
                header(&object.headers, "Cache-Control"),
                Some("max-age=315360000, no-transform, public")
            );
            assert!(header(&object.headers, "Content-Type").is_some());
        }
    }

    #[tokio::test]
    async fn test_scripts_upload_once_gzipped() {
        let tmp = TempDir::new().unwrap();
        site(tmp.path());
        let store = Arc::new(MemoryStore::new());

        task(tmp.path(), &store).publish().await.unwrap();

        let puts = store.puts.lock().unwrap().clone();
        assert_eq!(puts.iter().filter(|k| k.ends_with("app.js")).count(), 1);

        let script = store.object("scripts/js/app.js").unwrap();
        assert_eq!(header(&script.headers, "Content-Encoding"), Some("gzip"));
        let mut decoded = String::new();
        GzDecoder::new(script.body.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "function a(){return 1}");

        let page = store.object("index.html").unwrap();
        assert_eq!(header(&page.headers, "Content-Encoding"), None);
        assert_eq!(page.body, b"<p>home</p>");
    }

    #[tokio::test]
    async fn test_unchanged_second_publish_skips_everything() {
        let tmp = TempDir::new().unwrap();
        site(tmp.path());
        let store = Arc::new(MemoryStore::new());

        task(tmp.path(), &store).publish().await.unwrap();
        store.clear_log();
        let report = task(tmp.path(), &store).publish().await.unwrap();

        assert_eq!(report.count(PublishAction::Skip), 3);
        assert_eq!(store.put_count(), 0);
        assert!(tmp.path().join(".sitebuild/publish-test-bucket.json").exists());
    }

    #[tokio::test]
    async fn test_changed_file_is_updated() {
        let tmp = TempDir::new().unwrap();
        site(tmp.path());
        let store = Arc::new(MemoryStore::new());

        task(tmp.path(), &store).publish().await.unwrap();
        store.clear_log();
        write(tmp.path(), "www/index.html", "<p>changed</p>");
        let report = task(tmp.path(), &store).publish().await.unwrap();

        assert_eq!(report.record("index.html").unwrap().action, PublishAction::Update);
        assert_eq!(report.count(PublishAction::Skip), 2);
        assert_eq!(*store.puts.lock().unwrap(), vec!["index.html".to_string()]);
    }

    #[tokio::test]
    async fn test_remote_missing_key_is_reuploaded() {
        let tmp = TempDir::new().unwrap();
        site(tmp.path());
        let store = Arc::new(MemoryStore::new());

        task(tmp.path(), &store).publish().await.unwrap();
        store.objects.lock().unwrap().remove("index.html");
        store.clear_log();

        let report = task(tmp.path(), &store).publish().await.unwrap();
        assert_eq!(report.record("index.html").unwrap().action, PublishAction::Create);
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn test_remote_only_keys_are_deleted() {
        let tmp = TempDir::new().unwrap();
        site(tmp.path());
        let store = Arc::new(MemoryStore::new());
        store.insert("old/page.html", b"stale");

        let report = task(tmp.path(), &store).publish().await.unwrap();

        assert_eq!(report.record("old/page.html").unwrap().action, PublishAction::Delete);
        assert_eq!(*store.deletes.lock().unwrap(), vec!["old/page.html".to_string()]);
        assert!(store.object("old/page.html").is_none());
    }

    #[tokio::test]
    async fn test_auth_failure_uploads_nothing() {
        let tmp = TempDir::new().unwrap();
        site(tmp.path());
        let store = Arc::new(MemoryStore::rejecting_auth());

        let err = task(tmp.path(), &store).publish().await.unwrap_err();
        assert!(matches!(err, BuildError::Auth(_)));
        assert_eq!(store.put_count(), 0);
        assert!(!tmp.path().join(".sitebuild").exists());
    }

    #[tokio::test]
    async fn test_upload_failure_stops_and_keeps_earlier_uploads() {
        let tmp = TempDir::new().unwrap();
        site(tmp.path());
        let store = Arc::new(MemoryStore::failing_put("scripts/js/app.js"));
        store.insert("stray.txt", b"x");

        let err = task(tmp.path(), &store).publish().await.unwrap_err();
        assert!(matches!(err, BuildError::Upload { .. }));
        assert_eq!(*store.puts.lock().unwrap(), vec!["index.html".to_string()]);
        assert!(store.deletes.lock().unwrap().is_empty());

        let cache = PublishCache::open(
            tmp.path().join(".sitebuild/publish-test-bucket.json"),
            "test-bucket",
        )
        .unwrap();
        assert!(cache.get("index.html").is_some());
        assert!(cache.get("scripts/js/app.js").is_none());
    }

    #[tokio::test]
    async fn test_dotfiles_are_not_published() {
        let tmp = TempDir::new().unwrap();
        site(tmp.path());
        write(tmp.path(), "www/.DS_Store", "finder");
        write(tmp.path(), "www/shared/.env.local", "SECRET=1");
        let store = Arc::new(MemoryStore::new());

        task(tmp.path(), &store).publish().await.unwrap();

        assert_eq!(
            store.keys(),
            vec!["index.html", "scripts/js/app.js", "styles/css/site.css"]
        );
    }

    #[tokio::test]
    async fn test_missing_output_dir_deletes_remote() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("index.html", b"x");

        let report = task(tmp.path(), &store).publish().await.unwrap();
        assert_eq!(report.count(PublishAction::Delete), 1);
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_header_change_changes_hash() {
        let a = upload_hash(b"body", &[("Cache-Control".into(), "max-age=1".into())]);
        let b = upload_hash(b"body", &[("Cache-Control".into(), "max-age=2".into())]);
        assert_ne!(a, b);
    }
}
