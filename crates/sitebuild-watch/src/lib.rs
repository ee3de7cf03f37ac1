//! Sitebuild Watch - rebuild asset groups as their sources change
//!
//! Only the affected group's transform re-runs; the output directory is
//! never cleaned and nothing is published from watch mode.

pub mod supervisor;
pub mod watcher;

pub use supervisor::{WatchStats, WatchSupervisor};
pub use watcher::{ChangeKind, FileChange, FileWatcher};
