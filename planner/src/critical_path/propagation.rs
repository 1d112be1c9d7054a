//! Priority propagation from dependents to their upstream dependencies.

use rustc_hash::FxHashMap;

use crate::graph::TaskGraph;
use crate::models::{TaskId, TaskStatus};

/// Compute each task's effective priority.
///
/// A task that blocks important work inherits that work's priority: the
/// effective priority is the max of the task's own priority and the effective
/// priority of every successor. Completed tasks keep their own priority and do
/// not pass anything upstream.
pub fn effective_priorities(graph: &TaskGraph) -> FxHashMap<TaskId, i32> {
    let order = graph.topological_order();
    let mut priorities: FxHashMap<TaskId, i32> = order
        .iter()
        .filter_map(|id| graph.get(id))
        .map(|t| (t.id.clone(), t.priority))
        .collect();

    // Dependents come after their dependencies in topological order, so walk backwards
    for task_id in order.iter().rev() {
        let Some(task) = graph.get(task_id) else {
            continue;
        };
        if task.status == TaskStatus::Done {
            continue;
        }
        let task_priority = priorities.get(task_id).copied().unwrap_or(task.priority);

        for dep in graph.predecessors(task_id) {
            let done = graph
                .get(&dep.predecessor)
                .map(|p| p.status == TaskStatus::Done)
                .unwrap_or(true);
            if done {
                continue;
            }
            priorities
                .entry(dep.predecessor.clone())
                .and_modify(|p| *p = (*p).max(task_priority))
                .or_insert(task_priority);
        }
    }

    priorities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DependencyKind, Task};

    fn graph(tasks: &[(&str, i32)], deps: &[(&str, &str)]) -> TaskGraph {
        let mut g = TaskGraph::new();
        for (id, priority) in tasks {
            g.add_task(Task::new(*id, *id, "m1").with_estimate(1.0).with_priority(*priority))
                .unwrap();
        }
        for (pred, succ) in deps {
            g.add_dependency(pred, succ, DependencyKind::FinishToStart, 0.0)
                .unwrap();
        }
        g
    }

    #[test]
    fn test_priority_flows_upstream() {
        let g = graph(&[("a", 50), ("b", 80)], &[("a", "b")]);
        let result = effective_priorities(&g);
        assert_eq!(result.get("a"), Some(&80));
        assert_eq!(result.get("b"), Some(&80));
    }

    #[test]
    fn test_diamond_takes_maximum() {
        let g = graph(
            &[("a", 10), ("b", 30), ("c", 70), ("d", 20)],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        );
        let result = effective_priorities(&g);
        assert_eq!(result.get("a"), Some(&70));
        assert_eq!(result.get("b"), Some(&30));
        assert_eq!(result.get("d"), Some(&20));
    }

    #[test]
    fn test_done_task_not_raised() {
        let mut g = graph(&[("a", 50), ("b", 90)], &[("a", "b")]);
        g.set_status("a", TaskStatus::Done).unwrap();
        let result = effective_priorities(&g);
        assert_eq!(result.get("a"), Some(&50));
    }
}
