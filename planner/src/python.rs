//! Python bindings for the estimation and critical path algorithms.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::collections::HashMap;

use crate::critical_path::{analyze_with, AnalysisOptions, ChainTieBreak};
use crate::estimation::three_point;
use crate::graph::TaskGraph;
use crate::models::{Dependency, DependencyKind, Task};

/// PERT estimate (Python view).
#[pyclass(name = "PertEstimate")]
#[derive(Clone, Debug)]
pub struct PyPertEstimate {
    #[pyo3(get)]
    pub expected: f64,
    #[pyo3(get)]
    pub std_dev: f64,
    #[pyo3(get)]
    pub low: f64,
    #[pyo3(get)]
    pub high: f64,
}

#[pymethods]
impl PyPertEstimate {
    fn __repr__(&self) -> String {
        format!(
            "PertEstimate(expected={:.3}, std_dev={:.3}, interval=({:.3}, {:.3}))",
            self.expected, self.std_dev, self.low, self.high
        )
    }
}

/// Timing of one task (Python view).
#[pyclass(name = "TaskTiming")]
#[derive(Clone, Debug)]
pub struct PyTaskTiming {
    #[pyo3(get)]
    pub earliest_start: f64,
    #[pyo3(get)]
    pub earliest_finish: f64,
    #[pyo3(get)]
    pub latest_start: f64,
    #[pyo3(get)]
    pub latest_finish: f64,
    #[pyo3(get)]
    pub slack: f64,
}

/// Critical path analysis result (Python view).
#[pyclass(name = "CriticalPath")]
#[derive(Clone, Debug)]
pub struct PyCriticalPath {
    #[pyo3(get)]
    pub timings: HashMap<String, PyTaskTiming>,
    #[pyo3(get)]
    pub critical_path: Vec<String>,
    #[pyo3(get)]
    pub makespan_hours: f64,
    #[pyo3(get)]
    pub project_float: f64,
}

fn parse_kind(kind: &str) -> PyResult<DependencyKind> {
    match kind {
        "fs" | "finish_to_start" => Ok(DependencyKind::FinishToStart),
        "ss" | "start_to_start" => Ok(DependencyKind::StartToStart),
        "ff" | "finish_to_finish" => Ok(DependencyKind::FinishToFinish),
        "sf" | "start_to_finish" => Ok(DependencyKind::StartToFinish),
        other => Err(PyValueError::new_err(format!("Unknown dependency kind: {}", other))),
    }
}

/// Three-point estimate of a task's duration.
///
/// # Raises
/// * ValueError unless optimistic <= most_likely <= pessimistic
#[pyfunction]
fn pert_estimate(optimistic: f64, most_likely: f64, pessimistic: f64) -> PyResult<PyPertEstimate> {
    let outcome = three_point("<python>", optimistic, most_likely, pessimistic)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(PyPertEstimate {
        expected: outcome.expected,
        std_dev: outcome.std_dev,
        low: outcome.interval.0,
        high: outcome.interval.1,
    })
}

/// Forward/backward pass over a task list.
///
/// # Arguments
/// * `tasks` - (task_id, duration_hours, priority) tuples
/// * `dependencies` - (predecessor, successor, kind, lag_hours) tuples; kind is
///   one of "fs", "ss", "ff", "sf"
/// * `deadline_hours` - Optional deadline from plan start
/// * `prefer_latest_id` - Break equal-chain ties toward the larger task IDs
///
/// # Raises
/// * ValueError on cycles, unknown tasks or an infeasible deadline
#[pyfunction]
#[pyo3(signature = (tasks, dependencies, deadline_hours=None, prefer_latest_id=false))]
fn critical_path(
    tasks: Vec<(String, f64, i32)>,
    dependencies: Vec<(String, String, String, f64)>,
    deadline_hours: Option<f64>,
    prefer_latest_id: bool,
) -> PyResult<PyCriticalPath> {
    let to_py = |e: &dyn std::fmt::Display| PyValueError::new_err(e.to_string());

    let mut graph = TaskGraph::new();
    for (id, hours, priority) in tasks {
        let task = Task::new(id.clone(), id, "").with_estimate(hours).with_priority(priority);
        graph.add_task(task).map_err(|e| to_py(&e))?;
    }
    for (pred, succ, kind, lag) in dependencies {
        graph
            .add_edge(&Dependency::new(pred, succ, parse_kind(&kind)?, lag))
            .map_err(|e| to_py(&e))?;
    }

    let options = AnalysisOptions {
        deadline_hours,
        tie_break: if prefer_latest_id {
            ChainTieBreak::LatestTaskId
        } else {
            ChainTieBreak::EarliestTaskId
        },
    };
    let result = analyze_with(&graph, &options).map_err(|e| to_py(&e))?;

    let timings = result
        .task_timings
        .iter()
        .map(|(id, t)| {
            (
                id.clone(),
                PyTaskTiming {
                    earliest_start: t.earliest_start,
                    earliest_finish: t.earliest_finish,
                    latest_start: t.latest_start,
                    latest_finish: t.latest_finish,
                    slack: t.slack,
                },
            )
        })
        .collect();

    Ok(PyCriticalPath {
        timings,
        critical_path: result.primary_chain.task_ids,
        makespan_hours: result.makespan_hours,
        project_float: result.project_float,
    })
}

/// The goal_planner Python module.
#[pymodule]
fn goal_planner(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPertEstimate>()?;
    m.add_class::<PyTaskTiming>()?;
    m.add_class::<PyCriticalPath>()?;

    m.add_function(wrap_pyfunction!(pert_estimate, m)?)?;
    m.add_function(wrap_pyfunction!(critical_path, m)?)?;

    Ok(())
}
