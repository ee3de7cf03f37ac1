//! Object storage the output tree is published to

use rusty_s3::actions::ListObjectsV2;
use rusty_s3::{Bucket, Credentials, S3Action, UrlStyle};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;

use super::credentials::CredentialProvider;
use crate::config::PublishConfig;
use crate::error::{BuildError, Result};

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

const SIGN_TTL: Duration = Duration::from_secs(300);

/// An object already present in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
}

/// Remote key/value store of published files.
pub trait ObjectStore: Send + Sync {
    /// Authenticate. Must succeed before any other call.
    fn connect(&self) -> StoreFuture<'_, ()>;
    fn list(&self) -> StoreFuture<'_, Vec<RemoteObject>>;
    fn put<'a>(
        &'a self,
        key: &'a str,
        body: Vec<u8>,
        headers: &'a [(String, String)],
    ) -> StoreFuture<'a, ()>;
    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// S3 (or S3-compatible) bucket over presigned requests.
pub struct S3Store {
    bucket: Bucket,
    provider: Arc<dyn CredentialProvider>,
    credentials: OnceLock<Credentials>,
    client: reqwest::Client,
}

impl S3Store {
    pub fn new(config: &PublishConfig, provider: Arc<dyn CredentialProvider>) -> Result<Self> {
        let endpoint = config.endpoint_url();
        let url = endpoint
            .parse()
            .map_err(|_| BuildError::Config(format!("invalid endpoint URL '{}'", endpoint)))?;

        let bucket = Bucket::new(url, UrlStyle::Path, config.bucket.clone(), config.region.clone())
            .map_err(|e| BuildError::Config(format!("invalid bucket '{}': {}", config.bucket, e)))?;

        Ok(Self {
            bucket,
            provider,
            credentials: OnceLock::new(),
            client: reqwest::Client::new(),
        })
    }

    fn credentials(&self) -> Result<&Credentials> {
        self.credentials
            .get()
            .ok_or_else(|| BuildError::Auth("store used before connect".into()))
    }

    async fn list_page(&self, credentials: &Credentials, token: Option<&str>, max_keys: Option<usize>) -> Result<String> {
        let mut action = self.bucket.list_objects_v2(Some(credentials));
        if let Some(token) = token {
            action.with_continuation_token(token);
        }
        if let Some(max_keys) = max_keys {
            action.with_max_keys(max_keys);
        }
        let url = action.sign(SIGN_TTL);

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BuildError::Remote(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(BuildError::Auth(format!(
                "bucket '{}' rejected the credentials ({})",
                self.bucket.name(),
                status
            )));
        }
        let body = resp.text().await.map_err(|e| BuildError::Remote(e.to_string()))?;
        if !status.is_success() {
            return Err(BuildError::Remote(format!("list returned {}: {}", status, body)));
        }
        Ok(body)
    }
}

impl ObjectStore for S3Store {
    fn connect(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if self.credentials.get().is_some() {
                return Ok(());
            }
            let resolved = self.provider.resolve()?;
            let credentials = match resolved.session_token {
                Some(token) => {
                    Credentials::new_with_token(resolved.access_key, resolved.secret_key, token)
                }
                None => Credentials::new(resolved.access_key, resolved.secret_key),
            };

            self.list_page(&credentials, None, Some(1)).await?;
            debug!("connected to bucket {}", self.bucket.name());
            let _ = self.credentials.set(credentials);
            Ok(())
        })
    }

    fn list(&self) -> StoreFuture<'_, Vec<RemoteObject>> {
        Box::pin(async move {
            let credentials = self.credentials()?;
            let mut objects = Vec::new();
            let mut token: Option<String> = None;

            loop {
                let body = self.list_page(credentials, token.as_deref(), None).await?;
                let page = ListObjectsV2::parse_response(&body)
                    .map_err(|e| BuildError::Remote(format!("unreadable listing: {}", e)))?;

                objects.extend(page.contents.into_iter().map(|object| RemoteObject {
                    key: object.key,
                }));

                match page.next_continuation_token {
                    Some(next) => token = Some(next),
                    None => break,
                }
            }

            Ok(objects)
        })
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        body: Vec<u8>,
        headers: &'a [(String, String)],
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let fail = |message: String| BuildError::Upload {
                key: key.to_string(),
                message,
            };
            let url = self.bucket.put_object(Some(self.credentials()?), key).sign(SIGN_TTL);

            let mut request = self.client.put(url).body(body);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let resp = request.send().await.map_err(|e| fail(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(fail(format!("{}: {}", status, text)));
            }
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let url = self.bucket.delete_object(Some(self.credentials()?), key).sign(SIGN_TTL);

            let resp = self
                .client
                .delete(url)
                .send()
                .await
                .map_err(|e| BuildError::Remote(format!("delete of {} failed: {}", key, e)))?;
            if !resp.status().is_success() {
                return Err(BuildError::Remote(format!(
                    "delete of {} returned {}",
                    key,
                    resp.status()
                )));
            }
            Ok(())
        })
    }
}


#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub(crate) struct StoredObject {
        pub body: Vec<u8>,
        pub headers: Vec<(String, String)>,
    }

    /// In-process store recording every call.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub objects: Mutex<BTreeMap<String, StoredObject>>,
        pub puts: Mutex<Vec<String>>,
        pub deletes: Mutex<Vec<String>>,
        pub reject_auth: bool,
        pub fail_put: Option<String>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn rejecting_auth() -> Self {
            Self {
                reject_auth: true,
                ..Self::default()
            }
        }

        pub fn failing_put(key: &str) -> Self {
            Self {
                fail_put: Some(key.to_string()),
                ..Self::default()
            }
        }

        pub fn insert(&self, key: &str, body: &[u8]) {
            self.objects.lock().unwrap().insert(
                key.to_string(),
                StoredObject {
                    body: body.to_vec(),
                    headers: Vec::new(),
                },
            );
        }

        pub fn object(&self, key: &str) -> Option<StoredObject> {
            self.objects.lock().unwrap().get(key).cloned()
        }

        pub fn keys(&self) -> Vec<String> {
            self.objects.lock().unwrap().keys().cloned().collect()
        }

        pub fn put_count(&self) -> usize {
            self.puts.lock().unwrap().len()
        }

        pub fn clear_log(&self) {
            self.puts.lock().unwrap().clear();
            self.deletes.lock().unwrap().clear();
        }
    }

    impl ObjectStore for MemoryStore {
        fn connect(&self) -> StoreFuture<'_, ()> {
            Box::pin(async move {
                if self.reject_auth {
                    return Err(BuildError::Auth("credentials rejected".into()));
                }
                Ok(())
            })
        }

        fn list(&self) -> StoreFuture<'_, Vec<RemoteObject>> {
            Box::pin(async move {
                Ok(self
                    .objects
                    .lock()
                    .unwrap()
                    .keys()
                    .map(|key| RemoteObject { key: key.clone() })
                    .collect())
            })
        }

        fn put<'a>(
            &'a self,
            key: &'a str,
            body: Vec<u8>,
            headers: &'a [(String, String)],
        ) -> StoreFuture<'a, ()> {
            Box::pin(async move {
                if self.fail_put.as_deref() == Some(key) {
                    return Err(BuildError::Upload {
                        key: key.to_string(),
                        message: "connection reset".into(),
                    });
                }
                self.puts.lock().unwrap().push(key.to_string());
                self.objects.lock().unwrap().insert(
                    key.to_string(),
                    StoredObject {
                        body,
                        headers: headers.to_vec(),
                    },
                );
                Ok(())
            })
        }

        fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
            Box::pin(async move {
                self.deletes.lock().unwrap().push(key.to_string());
                self.objects.lock().unwrap().remove(key);
                Ok(())
            })
        }
    }
}
