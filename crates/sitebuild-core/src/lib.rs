//! Sitebuild Core - static site build pipeline
//!
//! Asset groups are read from `src/`, pushed through their transform steps
//! and written below the output directory. `build` cleans the output,
//! runs every group in parallel, then syncs the output to the bucket.

pub mod build;
pub mod clean;
pub mod config;
pub mod error;
pub mod graph;
pub mod hasher;
pub mod publish;
pub mod scheduler;
pub mod source;
pub mod steps;
pub mod task;
pub mod transform;

pub use build::{BuildGraph, BuildOutcome, BUILD, CLEAN, PUBLISH};
pub use clean::CleanTask;
pub use config::{AssetGroup, PublishConfig, SiteConfig, WatchConfig, CONFIG_FILE};
pub use error::{BuildError, Result};
pub use graph::{Stage, TaskGraph};
pub use publish::{
    CredentialProvider, ObjectStore, ProfileCredentials, PublishAction, PublishRecord,
    PublishReport, PublishTask, S3Store,
};
pub use scheduler::{Scheduler, SchedulerTask, TaskResult, TaskStatus};
pub use steps::{Asset, Step};
pub use task::{Task, TaskFuture};
pub use transform::{TransformReport, TransformTask};
