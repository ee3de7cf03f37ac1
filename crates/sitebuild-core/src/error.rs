//! Build errors
//!
//! One variant per failure class. Everything except an individual upload
//! aborts the enclosing task; an upload failure aborts the publish step.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot read source {path}: {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} failed on {path}: {message}")]
    Transform {
        step: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("cannot write {path}: {source}")]
    DestinationWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{path} is written by both '{first}' and '{second}'")]
    OutputConflict {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("upload of {key} failed: {message}")]
    Upload { key: String, message: String },

    #[error("remote store error: {0}")]
    Remote(String),

    #[error("publish cache {path}: {message}")]
    Cache { path: PathBuf, message: String },

    #[error("watch error: {0}")]
    Watch(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BuildError {
    pub(crate) fn transform(step: &'static str, path: impl Into<PathBuf>, message: impl ToString) -> Self {
        BuildError::Transform {
            step,
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;
