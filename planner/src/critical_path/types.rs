//! Types for critical path analysis.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::models::TaskId;

/// Slack values within this distance of the project float count as critical.
pub const CRITICAL_EPSILON: f64 = 1e-9;

/// How to pick the primary chain among equally long, equally prioritized chains.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainTieBreak {
    /// Lexicographically smallest sequence of task IDs
    #[default]
    EarliestTaskId,
    /// Lexicographically largest sequence of task IDs
    LatestTaskId,
}

/// Options for [`analyze_with`](super::analyze_with).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Explicit deadline in hours from plan start; the backward pass runs from
    /// here instead of the forward-pass completion.
    pub deadline_hours: Option<f64>,
    pub tie_break: ChainTieBreak,
}

/// Per-task timing information from the forward and backward passes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskTiming {
    /// Earliest possible start time (from forward pass).
    pub earliest_start: f64,
    /// Earliest possible finish time (from forward pass).
    pub earliest_finish: f64,
    /// Latest allowable start time (from backward pass).
    pub latest_start: f64,
    /// Latest allowable finish time (from backward pass).
    pub latest_finish: f64,
    /// Slack = latest_start - earliest_start.
    pub slack: f64,
}

impl TaskTiming {
    /// Critical when the slack equals the project float (zero without a deadline).
    pub fn is_critical(&self, project_float: f64) -> bool {
        (self.slack - project_float).abs() < CRITICAL_EPSILON
    }
}

/// A chain of critical tasks linked by driving dependencies.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticalChain {
    pub task_ids: Vec<TaskId>,
    /// Span from the first task's start to the last task's finish.
    pub length_hours: f64,
    pub priority_sum: i64,
}

/// Result of analyzing a task graph.
#[derive(Clone, Debug, Default)]
pub struct CriticalPathResult {
    /// Timing information for each non-fragment task.
    pub task_timings: FxHashMap<TaskId, TaskTiming>,
    /// Topological order the passes ran in.
    pub order: Vec<TaskId>,
    /// Forward-pass completion (earliest project finish).
    pub makespan_hours: f64,
    /// End point of the backward pass (deadline or makespan).
    pub horizon_hours: f64,
    /// Slack shared by every critical task: horizon - makespan.
    pub project_float: f64,
    /// Set of task IDs with minimal slack.
    pub critical_tasks: FxHashSet<TaskId>,
    /// Longest zero-slack chain, highest cumulative priority on ties.
    pub primary_chain: CriticalChain,
    /// Total work (sum of all remaining task durations).
    pub total_work: f64,
}

impl CriticalPathResult {
    pub fn slack(&self, task_id: &str) -> Option<f64> {
        self.task_timings.get(task_id).map(|t| t.slack)
    }

    /// Slack measured against the makespan rather than the horizon.
    pub fn relative_slack(&self, task_id: &str) -> Option<f64> {
        self.slack(task_id).map(|s| (s - self.project_float).max(0.0))
    }

    pub fn is_critical(&self, task_id: &str) -> bool {
        self.critical_tasks.contains(task_id)
    }

    pub fn timing(&self, task_id: &str) -> Option<&TaskTiming> {
        self.task_timings.get(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_timing_critical() {
        let timing = TaskTiming {
            earliest_start: 0.0,
            earliest_finish: 5.0,
            latest_start: 0.0,
            latest_finish: 5.0,
            slack: 0.0,
        };
        assert!(timing.is_critical(0.0));

        let timing_with_slack = TaskTiming {
            earliest_start: 0.0,
            earliest_finish: 5.0,
            latest_start: 2.0,
            latest_finish: 7.0,
            slack: 2.0,
        };
        assert!(!timing_with_slack.is_critical(0.0));
        // a 2h deadline cushion makes 2h of slack the critical amount
        assert!(timing_with_slack.is_critical(2.0));
    }
}
