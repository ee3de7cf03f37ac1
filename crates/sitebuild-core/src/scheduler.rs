//! Parallel Task Scheduler - Dependency-aware parallel execution
//!
//! Features:
//! - Runs tasks concurrently as soon as their dependencies completed
//! - Semaphore for concurrency control
//! - Fail-fast: after the first failure nothing new starts, tasks already
//!   running finish, tasks never started are reported as cancelled
//! - Rejects unknown dependencies and cycles before anything runs

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};

use crate::graph::TaskGraph;
use crate::task::Task;

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Task result
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub name: String,
    pub status: TaskStatus,
    pub duration: Duration,
    pub error: Option<String>,
}

/// A schedulable task
pub struct SchedulerTask {
    pub name: String,
    pub dependencies: Vec<String>,
    pub task: Arc<dyn Task>,
}

impl SchedulerTask {
    pub fn new(task: Arc<dyn Task>, deps: Vec<String>) -> Self {
        Self {
            name: task.name().to_string(),
            dependencies: deps,
            task,
        }
    }
}

/// Parallel task scheduler
pub struct Scheduler {
    concurrency: usize,
    fail_fast: bool,
}

impl Scheduler {
    /// Create new scheduler with concurrency limit
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            fail_fast: true,
        }
    }

    /// Create scheduler with default concurrency (CPU cores)
    pub fn with_default_concurrency() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4);
        Self::new(cpus)
    }

    /// Set fail-fast behavior
    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    /// Execute tasks respecting dependencies
    pub async fn execute(&self, tasks: Vec<SchedulerTask>) -> Result<Vec<TaskResult>> {
        if tasks.is_empty() {
            return Ok(vec![]);
        }

        TaskGraph::from_tasks(&tasks)?.build_order()?;

        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (tx, mut rx) = mpsc::channel::<TaskResult>(tasks.len());

        // Input order decides spawn order among ready tasks
        let order: Vec<String> = tasks.iter().map(|t| t.name.clone()).collect();
        let mut dep_map: HashMap<String, Vec<String>> = HashMap::new();
        let mut pending: HashMap<String, Arc<dyn Task>> = HashMap::new();
        for task in tasks {
            dep_map.insert(task.name.clone(), task.dependencies);
            pending.insert(task.name, task.task);
        }

        let mut completed: HashSet<String> = HashSet::new();
        let mut failed = false;
        let mut in_flight = 0usize;
        let mut results = Vec::new();

        loop {
            if !(failed && self.fail_fast) {
                let ready: Vec<String> = order
                    .iter()
                    .filter(|name| pending.contains_key(*name))
                    .filter(|name| {
                        dep_map
                            .get(*name)
                            .map(|deps| deps.iter().all(|d| completed.contains(d)))
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect();

                for name in ready {
                    if let Some(task) = pending.remove(&name) {
                        spawn_task(name, task, Arc::clone(&semaphore), tx.clone());
                        in_flight += 1;
                    }
                }
            }

            if in_flight == 0 {
                break;
            }

            let Some(result) = rx.recv().await else {
                break;
            };
            in_flight -= 1;

            match result.status {
                TaskStatus::Completed => {
                    completed.insert(result.name.clone());
                }
                TaskStatus::Failed => {
                    tracing::error!(
                        "Task {} failed: {}",
                        result.name,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                    failed = true;
                }
                TaskStatus::Cancelled => {}
            }
            results.push(result);
        }

        // Whatever is still pending never started
        for name in order {
            if pending.contains_key(&name) {
                results.push(TaskResult {
                    name,
                    status: TaskStatus::Cancelled,
                    duration: Duration::ZERO,
                    error: Some("Cancelled due to earlier failure".into()),
                });
            }
        }

        tracing::info!(
            "Scheduler completed {} tasks in {:?}",
            results.len(),
            start.elapsed()
        );

        Ok(results)
    }
}

/// Spawn a single task
fn spawn_task(
    name: String,
    task: Arc<dyn Task>,
    semaphore: Arc<Semaphore>,
    tx: mpsc::Sender<TaskResult>,
) {
    tokio::spawn(async move {
        // Acquire semaphore permit
        let _permit = semaphore.acquire_owned().await;

        let start = Instant::now();
        tracing::info!("▶ {}", name);

        // Separate spawn so a panicking task is reported instead of lost
        let outcome = tokio::spawn(async move { task.run().await }).await;

        let (status, error) = match outcome {
            Ok(Ok(())) => (TaskStatus::Completed, None),
            Ok(Err(e)) => (TaskStatus::Failed, Some(format!("{:#}", e))),
            Err(e) => (TaskStatus::Failed, Some(format!("Task panicked: {}", e))),
        };

        let duration = start.elapsed();
        if status == TaskStatus::Completed {
            tracing::info!("✓ {} in {:?}", name, duration);
        }

        let _ = tx
            .send(TaskResult {
                name,
                status,
                duration,
                error,
            })
            .await;
    });
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::with_default_concurrency()
    }
}
