//! Task graph - petgraph-based ordering of build tasks, and the
//! series/parallel stage composition that produces it.

use anyhow::{anyhow, bail, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::sync::Arc;

use crate::scheduler::SchedulerTask;
use crate::task::Task;

/// Dependency graph between named tasks. An edge `a -> b` means a runs after b.
pub struct TaskGraph {
    graph: DiGraph<String, ()>,
    name_to_index: HashMap<String, NodeIndex>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_to_index: HashMap::new(),
        }
    }

    /// Build the graph for a scheduler batch. Duplicate names and unknown
    /// dependencies are errors.
    pub fn from_tasks(tasks: &[SchedulerTask]) -> Result<Self> {
        let mut graph = Self::new();
        for task in tasks {
            if !graph.add_task(&task.name) {
                bail!("Task '{}' is scheduled twice", task.name);
            }
        }
        for task in tasks {
            for dep in &task.dependencies {
                if !graph.add_dependency(&task.name, dep) {
                    bail!("Task '{}' depends on unknown task '{}'", task.name, dep);
                }
            }
        }
        Ok(graph)
    }

    /// Add a task; false when the name is already present.
    pub fn add_task(&mut self, name: &str) -> bool {
        if self.name_to_index.contains_key(name) {
            return false;
        }
        let idx = self.graph.add_node(name.to_string());
        self.name_to_index.insert(name.to_string(), idx);
        true
    }

    /// Add a dependency edge (from runs after to)
    pub fn add_dependency(&mut self, from: &str, to: &str) -> bool {
        let from_idx = self.name_to_index.get(from);
        let to_idx = self.name_to_index.get(to);

        match (from_idx, to_idx) {
            (Some(&f), Some(&t)) => {
                self.graph.add_edge(f, t, ());
                true
            }
            _ => false,
        }
    }

    /// Topological order, dependencies first
    pub fn build_order(&self) -> Result<Vec<String>> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| {
            let name = self
                .graph
                .node_weight(cycle.node_id())
                .cloned()
                .unwrap_or_default();
            anyhow!("Dependency cycle through task '{}'", name)
        })?;

        Ok(sorted
            .iter()
            .rev()
            .filter_map(|idx| self.graph.node_weight(*idx))
            .cloned()
            .collect())
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Composition of tasks: a series runs each member after the previous one
/// fully completed; a parallel group starts all members together.
#[derive(Clone)]
pub enum Stage {
    Task(Arc<dyn Task>),
    Series(Vec<Stage>),
    Parallel(Vec<Stage>),
}

impl Stage {
    pub fn task(task: impl Task + 'static) -> Self {
        Stage::Task(Arc::new(task))
    }

    /// Flatten into scheduler tasks with explicit dependency lists.
    pub fn into_tasks(self) -> Vec<SchedulerTask> {
        let mut out = Vec::new();
        self.flatten(&[], &mut out);
        out
    }

    /// Emit tasks that run after `after`; returns the tasks whose completion
    /// marks the end of this stage.
    fn flatten(self, after: &[String], out: &mut Vec<SchedulerTask>) -> Vec<String> {
        match self {
            Stage::Task(task) => {
                let scheduled = SchedulerTask::new(task, after.to_vec());
                let name = scheduled.name.clone();
                out.push(scheduled);
                vec![name]
            }
            Stage::Series(stages) => {
                let mut previous = after.to_vec();
                for stage in stages {
                    let terminals = stage.flatten(&previous, out);
                    // An empty member does not reset the ordering
                    if !terminals.is_empty() {
                        previous = terminals;
                    }
                }
                previous
            }
            Stage::Parallel(stages) => {
                let mut terminals = Vec::new();
                for stage in stages {
                    terminals.extend(stage.flatten(after, out));
                }
                terminals
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::tests::FnTask;
    use std::sync::Mutex;

    fn leaf(name: &str) -> Stage {
        let log = Arc::new(Mutex::new(Vec::new()));
        Stage::task(FnTask::new(name, &log))
    }

    fn deps_of(tasks: &[SchedulerTask], name: &str) -> Vec<String> {
        let mut deps = tasks
            .iter()
            .find(|t| t.name == name)
            .unwrap()
            .dependencies
            .clone();
        deps.sort();
        deps
    }

    #[test]
    fn test_series_of_parallel_flattens() {
        let stage = Stage::Series(vec![
            leaf("clean"),
            Stage::Parallel(vec![leaf("a"), leaf("b")]),
            leaf("publish"),
        ]);
        let tasks = stage.into_tasks();

        assert_eq!(tasks.len(), 4);
        assert!(deps_of(&tasks, "clean").is_empty());
        assert_eq!(deps_of(&tasks, "a"), vec!["clean"]);
        assert_eq!(deps_of(&tasks, "b"), vec!["clean"]);
        assert_eq!(deps_of(&tasks, "publish"), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_parallel_keeps_ordering() {
        let stage = Stage::Series(vec![leaf("first"), Stage::Parallel(vec![]), leaf("last")]);
        let tasks = stage.into_tasks();
        assert_eq!(deps_of(&tasks, "last"), vec!["first"]);
    }

    #[test]
    fn test_build_order() {
        let tasks = Stage::Series(vec![leaf("x"), leaf("y"), leaf("z")]).into_tasks();
        let graph = TaskGraph::from_tasks(&tasks).unwrap();
        assert_eq!(graph.build_order().unwrap(), vec!["x", "y", "z"]);
        assert_eq!(deps_of(&tasks, "z"), vec!["y"]);
    }

    #[test]
    fn test_cycle_detected() {
        let mut graph = TaskGraph::new();
        graph.add_task("a");
        graph.add_task("b");
        assert!(graph.add_dependency("a", "b"));
        assert!(graph.add_dependency("b", "a"));
        assert!(graph.build_order().is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let tasks = Stage::Parallel(vec![leaf("same"), leaf("same")]).into_tasks();
        assert!(TaskGraph::from_tasks(&tasks).is_err());
    }
}
