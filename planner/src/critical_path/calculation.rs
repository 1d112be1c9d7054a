//! Critical path calculation using forward and backward passes.

use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use thiserror::Error;

use crate::graph::{GraphError, TaskGraph};
use crate::models::{Task, TaskId, TaskStatus};

use super::types::{
    AnalysisOptions, ChainTieBreak, CriticalChain, CriticalPathResult, TaskTiming,
    CRITICAL_EPSILON,
};

/// Error types for critical path analysis.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CriticalPathError {
    #[error(
        "Deadline of {deadline_hours}h is infeasible: earliest completion is {earliest_completion_hours}h via {critical_path:?}"
    )]
    InfeasibleDeadline {
        deadline_hours: f64,
        earliest_completion_hours: f64,
        critical_path: Vec<TaskId>,
    },
    #[error("Tasks have no duration estimate: {0:?}")]
    MissingDuration(Vec<TaskId>),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Remaining work of a task; completed tasks contribute nothing.
fn remaining_hours(task: &Task) -> f64 {
    if task.status == TaskStatus::Done {
        0.0
    } else {
        task.duration_hours()
    }
}

/// Analyze a graph, running the backward pass from the makespan.
pub fn analyze(graph: &TaskGraph) -> Result<CriticalPathResult, CriticalPathError> {
    analyze_with(graph, &AnalysisOptions::default())
}

/// Analyze a graph against an explicit deadline (hours from plan start).
pub fn analyze_with_deadline(
    graph: &TaskGraph,
    deadline_hours: f64,
) -> Result<CriticalPathResult, CriticalPathError> {
    analyze_with(
        graph,
        &AnalysisOptions {
            deadline_hours: Some(deadline_hours),
            ..AnalysisOptions::default()
        },
    )
}

/// Compute earliest/latest start-finish, slack and the primary critical chain.
///
/// Fails with `InfeasibleDeadline` when the forward-pass completion exceeds
/// `options.deadline_hours`, reporting the earliest achievable completion.
pub fn analyze_with(
    graph: &TaskGraph,
    options: &AnalysisOptions,
) -> Result<CriticalPathResult, CriticalPathError> {
    let order = graph.topological_order();

    let mut missing: Vec<TaskId> = order
        .iter()
        .filter_map(|id| graph.get(id))
        .filter(|t| t.status != TaskStatus::Done && t.estimated_hours.is_none())
        .map(|t| t.id.clone())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(CriticalPathError::MissingDuration(missing));
    }

    let durations: FxHashMap<&str, f64> = order
        .iter()
        .filter_map(|id| graph.get(id))
        .map(|t| (t.id.as_str(), remaining_hours(t)))
        .collect();
    let duration_of = |id: &str| durations.get(id).copied().unwrap_or(0.0);

    // Forward pass: earliest start = max over all dependency constraints
    let mut timings: FxHashMap<TaskId, TaskTiming> =
        FxHashMap::with_capacity_and_hasher(order.len(), Default::default());
    let mut total_work = 0.0;
    for task_id in &order {
        let duration = duration_of(task_id);
        total_work += duration;

        let mut earliest_start: f64 = 0.0;
        for dep in graph.predecessors(task_id) {
            if let Some(pred) = timings.get(&dep.predecessor) {
                let bound = dep.successor_earliest_start(
                    pred.earliest_start,
                    pred.earliest_finish,
                    duration,
                );
                earliest_start = earliest_start.max(bound);
            }
        }

        timings.insert(
            task_id.clone(),
            TaskTiming {
                earliest_start,
                earliest_finish: earliest_start + duration,
                ..TaskTiming::default()
            },
        );
    }

    let makespan = timings
        .values()
        .map(|t| t.earliest_finish)
        .fold(0.0_f64, f64::max);

    let horizon = match options.deadline_hours {
        Some(deadline) if makespan > deadline + CRITICAL_EPSILON => {
            // Report the chain that blows the deadline
            let result = backward_and_select(graph, &order, timings, makespan, makespan, total_work, options);
            return Err(CriticalPathError::InfeasibleDeadline {
                deadline_hours: deadline,
                earliest_completion_hours: makespan,
                critical_path: result.primary_chain.task_ids,
            });
        }
        Some(deadline) => deadline,
        None => makespan,
    };

    Ok(backward_and_select(
        graph, &order, timings, makespan, horizon, total_work, options,
    ))
}

fn backward_and_select(
    graph: &TaskGraph,
    order: &[TaskId],
    mut timings: FxHashMap<TaskId, TaskTiming>,
    makespan: f64,
    horizon: f64,
    total_work: f64,
    options: &AnalysisOptions,
) -> CriticalPathResult {
    // Backward pass in reverse topological order
    for task_id in order.iter().rev() {
        let duration = timings
            .get(task_id)
            .map(|t| t.earliest_finish - t.earliest_start)
            .unwrap_or(0.0);

        let mut latest_finish = horizon;
        for dep in graph.successors(task_id) {
            if let Some(succ) = timings.get(&dep.successor) {
                let bound =
                    dep.predecessor_latest_finish(succ.latest_start, succ.latest_finish, duration);
                latest_finish = latest_finish.min(bound);
            }
        }

        if let Some(timing) = timings.get_mut(task_id) {
            timing.latest_finish = latest_finish;
            timing.latest_start = latest_finish - duration;
            timing.slack = timing.latest_start - timing.earliest_start;
        }
    }

    let project_float = if timings.is_empty() {
        0.0
    } else {
        timings
            .values()
            .map(|t| t.slack)
            .fold(f64::INFINITY, f64::min)
    };

    let critical_tasks: FxHashSet<TaskId> = timings
        .iter()
        .filter(|(_, t)| t.is_critical(project_float))
        .map(|(id, _)| id.clone())
        .collect();

    let primary_chain = select_primary_chain(graph, order, &timings, &critical_tasks, options.tie_break);

    CriticalPathResult {
        task_timings: timings,
        order: order.to_vec(),
        makespan_hours: makespan,
        horizon_hours: horizon,
        project_float,
        critical_tasks,
        primary_chain,
        total_work,
    }
}

/// Compare two candidate chains; `Ordering::Greater` means `a` is preferred.
fn compare_chains(a: &CriticalChain, b: &CriticalChain, tie_break: ChainTieBreak) -> Ordering {
    let by_length = if (a.length_hours - b.length_hours).abs() < CRITICAL_EPSILON {
        Ordering::Equal
    } else if a.length_hours > b.length_hours {
        Ordering::Greater
    } else {
        Ordering::Less
    };
    by_length
        .then(a.priority_sum.cmp(&b.priority_sum))
        .then_with(|| match tie_break {
            ChainTieBreak::EarliestTaskId => b.task_ids.cmp(&a.task_ids),
            ChainTieBreak::LatestTaskId => a.task_ids.cmp(&b.task_ids),
        })
}

/// Longest chain of critical tasks connected by driving (tight) dependencies.
///
/// Dynamic programming over the topological order: the best chain ending at a
/// task extends the best chain ending at one of its critical driving
/// predecessors.
fn select_primary_chain(
    graph: &TaskGraph,
    order: &[TaskId],
    timings: &FxHashMap<TaskId, TaskTiming>,
    critical: &FxHashSet<TaskId>,
    tie_break: ChainTieBreak,
) -> CriticalChain {
    let mut best_ending_at: FxHashMap<&str, CriticalChain> = FxHashMap::default();
    let mut overall: Option<CriticalChain> = None;

    for task_id in order {
        if !critical.contains(task_id) {
            continue;
        }
        let Some(timing) = timings.get(task_id) else {
            continue;
        };
        let priority = graph.get(task_id).map(|t| t.priority as i64).unwrap_or(0);
        let duration = timing.earliest_finish - timing.earliest_start;

        let mut best = CriticalChain {
            task_ids: vec![task_id.clone()],
            length_hours: duration,
            priority_sum: priority,
        };

        for dep in graph.predecessors(task_id) {
            let (Some(chain), Some(pred)) = (
                best_ending_at.get(dep.predecessor.as_str()),
                timings.get(&dep.predecessor),
            ) else {
                continue;
            };
            let driven = dep.successor_earliest_start(pred.earliest_start, pred.earliest_finish, duration);
            if (driven - timing.earliest_start).abs() > CRITICAL_EPSILON {
                continue;
            }
            let first_start = chain
                .task_ids
                .first()
                .and_then(|id| timings.get(id))
                .map(|t| t.earliest_start)
                .unwrap_or(timing.earliest_start);
            let mut task_ids = chain.task_ids.clone();
            task_ids.push(task_id.clone());
            let candidate = CriticalChain {
                task_ids,
                length_hours: timing.earliest_finish - first_start,
                priority_sum: chain.priority_sum + priority,
            };
            if compare_chains(&candidate, &best, tie_break) == Ordering::Greater {
                best = candidate;
            }
        }

        let replace = match &overall {
            Some(current) => compare_chains(&best, current, tie_break) == Ordering::Greater,
            None => true,
        };
        if replace {
            overall = Some(best.clone());
        }
        best_ending_at.insert(task_id.as_str(), best);
    }

    overall.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DependencyKind;

    fn make_task(id: &str, hours: f64, priority: i32) -> Task {
        Task::new(id, id, "m1").with_estimate(hours).with_priority(priority)
    }

    fn build(tasks: &[(&str, f64, i32)], deps: &[(&str, &str, DependencyKind, f64)]) -> TaskGraph {
        let mut g = TaskGraph::new();
        for (id, hours, priority) in tasks {
            g.add_task(make_task(id, *hours, *priority)).unwrap();
        }
        for (pred, succ, kind, lag) in deps {
            g.add_dependency(pred, succ, *kind, *lag).unwrap();
        }
        g
    }

    use DependencyKind::*;

    #[test]
    fn test_chain_critical_path() {
        let g = build(
            &[("a", 2.0, 50), ("b", 3.0, 50), ("c", 4.0, 50)],
            &[("a", "b", FinishToStart, 0.0), ("b", "c", FinishToStart, 0.0)],
        );
        let result = analyze(&g).unwrap();

        assert_eq!(result.makespan_hours, 9.0);
        assert_eq!(result.total_work, 9.0);
        assert_eq!(result.primary_chain.task_ids, vec!["a", "b", "c"]);
        assert!(result.is_critical("a") && result.is_critical("b") && result.is_critical("c"));
    }

    #[test]
    fn test_parallel_paths_with_slack() {
        let g = build(
            &[("a", 2.0, 50), ("b", 5.0, 50), ("target", 1.0, 50)],
            &[
                ("a", "target", FinishToStart, 0.0),
                ("b", "target", FinishToStart, 0.0),
            ],
        );
        let result = analyze(&g).unwrap();

        assert_eq!(result.makespan_hours, 6.0);
        assert_eq!(result.total_work, 8.0);
        assert!(!result.is_critical("a"));
        assert!((result.slack("a").unwrap() - 3.0).abs() < 1e-9);
        assert_eq!(result.primary_chain.task_ids, vec!["b", "target"]);
    }

    #[test]
    fn test_lag_and_lead() {
        let g = build(
            &[("a", 2.0, 50), ("b", 1.0, 50)],
            &[("a", "b", FinishToStart, 3.0)],
        );
        assert_eq!(analyze(&g).unwrap().makespan_hours, 6.0);

        // A 1h lead lets b overlap the end of a
        let g = build(
            &[("a", 2.0, 50), ("b", 1.0, 50)],
            &[("a", "b", FinishToStart, -1.0)],
        );
        let result = analyze(&g).unwrap();
        assert!((result.timing("b").unwrap().earliest_start - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_dependency_kinds_forward_pass() {
        // a runs [0, 4)
        let g = build(
            &[("a", 4.0, 50), ("ss", 2.0, 50), ("ff", 2.0, 50), ("sf", 2.0, 50)],
            &[
                ("a", "ss", StartToStart, 1.0),
                ("a", "ff", FinishToFinish, 0.0),
                ("a", "sf", StartToFinish, 3.0),
            ],
        );
        let result = analyze(&g).unwrap();
        assert!((result.timing("ss").unwrap().earliest_start - 1.0).abs() < 1e-9);
        assert!((result.timing("ff").unwrap().earliest_finish - 4.0).abs() < 1e-9);
        assert!((result.timing("sf").unwrap().earliest_finish - 3.0).abs() < 1e-9);
        assert_eq!(result.makespan_hours, 4.0);
    }

    #[test]
    fn test_backward_pass_start_to_start() {
        // b must start 1h after a starts; b (6h) drives the makespan of 7h
        let g = build(
            &[("a", 2.0, 50), ("b", 6.0, 50)],
            &[("a", "b", StartToStart, 1.0)],
        );
        let result = analyze(&g).unwrap();
        assert_eq!(result.makespan_hours, 7.0);
        let a = result.timing("a").unwrap();
        // a may start no later than b's latest start - lag = 0
        assert!((a.latest_start - 0.0).abs() < 1e-9);
        assert!(result.is_critical("a"));
        assert_eq!(result.primary_chain.task_ids, vec!["a", "b"]);
    }

    #[test]
    fn test_infeasible_deadline_reports_earliest_completion() {
        // A(4h) -> B(8h), A -> C(2h), deadline 10h
        let g = build(
            &[("A", 4.0, 50), ("B", 8.0, 50), ("C", 2.0, 50)],
            &[("A", "B", FinishToStart, 0.0), ("A", "C", FinishToStart, 0.0)],
        );
        let err = analyze_with_deadline(&g, 10.0).unwrap_err();
        match err {
            CriticalPathError::InfeasibleDeadline {
                deadline_hours,
                earliest_completion_hours,
                critical_path,
            } => {
                assert_eq!(deadline_hours, 10.0);
                assert_eq!(earliest_completion_hours, 12.0);
                assert_eq!(critical_path, vec!["A", "B"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_feasible_deadline_shifts_slack() {
        let g = build(
            &[("A", 4.0, 50), ("B", 8.0, 50), ("C", 2.0, 50)],
            &[("A", "B", FinishToStart, 0.0), ("A", "C", FinishToStart, 0.0)],
        );
        let result = analyze_with_deadline(&g, 15.0).unwrap();
        assert_eq!(result.horizon_hours, 15.0);
        assert!((result.project_float - 3.0).abs() < 1e-9);
        assert!(result.is_critical("A") && result.is_critical("B"));
        assert!(!result.is_critical("C"));
        assert!((result.relative_slack("C").unwrap() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_equal_chains_prefer_priority_then_id() {
        // Two 5h chains into end: a->c and b->c
        let g = build(
            &[("a", 3.0, 40), ("b", 3.0, 90), ("c", 2.0, 50)],
            &[("a", "c", FinishToStart, 0.0), ("b", "c", FinishToStart, 0.0)],
        );
        let result = analyze(&g).unwrap();
        assert_eq!(result.primary_chain.task_ids, vec!["b", "c"]);
        assert_eq!(result.primary_chain.priority_sum, 140);

        let g = build(
            &[("a", 3.0, 50), ("b", 3.0, 50), ("c", 2.0, 50)],
            &[("a", "c", FinishToStart, 0.0), ("b", "c", FinishToStart, 0.0)],
        );
        let result = analyze(&g).unwrap();
        assert_eq!(result.primary_chain.task_ids, vec!["a", "c"]);

        let options = AnalysisOptions {
            deadline_hours: None,
            tie_break: ChainTieBreak::LatestTaskId,
        };
        let result = analyze_with(&g, &options).unwrap();
        assert_eq!(result.primary_chain.task_ids, vec!["b", "c"]);
    }

    #[test]
    fn test_done_tasks_contribute_no_duration() {
        let mut g = build(
            &[("a", 10.0, 50), ("b", 5.0, 50)],
            &[("a", "b", FinishToStart, 0.0)],
        );
        g.set_status("a", TaskStatus::Done).unwrap();
        let result = analyze(&g).unwrap();
        assert_eq!(result.makespan_hours, 5.0);
        assert_eq!(result.total_work, 5.0);
    }

    #[test]
    fn test_missing_duration_is_reported() {
        let mut g = TaskGraph::new();
        g.add_task(Task::new("x", "x", "m1")).unwrap();
        assert_eq!(
            analyze(&g).unwrap_err(),
            CriticalPathError::MissingDuration(vec!["x".to_string()])
        );
    }
}
