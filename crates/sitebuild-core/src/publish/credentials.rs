//! Credentials for the publish target
//!
//! Resolved once per publish, before anything is uploaded. The production
//! provider reads a named profile from the shared credentials file:
//!
//! ```ini
//! [default]
//! aws_access_key_id = AKIA...
//! aws_secret_access_key = ...
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::{BuildError, Result};

#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Source of credentials, swappable in tests.
pub trait CredentialProvider: Send + Sync {
    fn resolve(&self) -> Result<AwsCredentials>;
}

/// Named profile from `AWS_SHARED_CREDENTIALS_FILE` or `~/.aws/credentials`.
pub struct ProfileCredentials {
    profile: String,
    file: Option<PathBuf>,
}

impl ProfileCredentials {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            file: None,
        }
    }

    /// Read from an explicit file instead of the default location.
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    fn credentials_file(&self) -> Result<PathBuf> {
        if let Some(file) = &self.file {
            return Ok(file.clone());
        }
        if let Some(file) = std::env::var_os("AWS_SHARED_CREDENTIALS_FILE") {
            return Ok(PathBuf::from(file));
        }
        dirs::home_dir()
            .map(|home| home.join(".aws").join("credentials"))
            .ok_or_else(|| BuildError::Auth("cannot locate home directory".into()))
    }
}

impl CredentialProvider for ProfileCredentials {
    fn resolve(&self) -> Result<AwsCredentials> {
        let path = self.credentials_file()?;
        let content = std::fs::read_to_string(&path)
            .map_err(|e| BuildError::Auth(format!("cannot read {}: {}", path.display(), e)))?;

        let section = parse_profile(&content, &self.profile).ok_or_else(|| {
            BuildError::Auth(format!("profile '{}' not found in {}", self.profile, path.display()))
        })?;

        let field = |key: &str| {
            section
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| {
                    BuildError::Auth(format!("profile '{}' has no {}", self.profile, key))
                })
        };

        Ok(AwsCredentials {
            access_key: field("aws_access_key_id")?,
            secret_key: field("aws_secret_access_key")?,
            session_token: section.get("aws_session_token").cloned(),
        })
    }
}

/// Fixed credentials for tests.
#[cfg(test)]
pub(crate) struct StaticCredentials(pub AwsCredentials);

#[cfg(test)]
impl StaticCredentials {
    pub(crate) fn example() -> Self {
        Self(AwsCredentials {
            access_key: "AKIDEXAMPLE".into(),
            secret_key: "wJalrXUtnFEMI/K7MDENG".into(),
            session_token: None,
        })
    }
}

#[cfg(test)]
impl CredentialProvider for StaticCredentials {
    fn resolve(&self) -> Result<AwsCredentials> {
        Ok(self.0.clone())
    }
}

/// Key/value pairs of one `[profile]` section. Keys are lowercased.
pub fn parse_profile(content: &str, profile: &str) -> Option<HashMap<String, String>> {
    let mut current: Option<&str> = None;
    let mut found = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = header.trim();
            let name = name.strip_prefix("profile ").map(str::trim).unwrap_or(name);
            current = Some(name);
            if name == profile {
                found.get_or_insert_with(HashMap::new);
            }
            continue;
        }

        if current != Some(profile) {
            continue;
        }
        if let (Some((key, value)), Some(section)) = (line.split_once('='), found.as_mut()) {
            section.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    found
}
