//! The unit of work the scheduler runs.

use std::future::Future;
use std::pin::Pin;

pub type TaskFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// A named, runnable piece of the build.
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self) -> TaskFuture<'_>;
}
