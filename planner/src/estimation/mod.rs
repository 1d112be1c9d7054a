//! Effort estimation with interchangeable methods.
//!
//! - **Expert**: a direct duration and confidence from a human or AI source
//! - **Analogy**: similarity-weighted average over completed tasks
//! - **PERT**: three-point estimate with a ±1 standard deviation interval
//!
//! Estimates are append-only: every call adds a new record, and the latest
//! record per task is what gets applied to the task graph.

mod accuracy;
mod analogy;
mod pert;

pub use accuracy::{AccuracyTracker, MethodAccuracy};
pub use analogy::{estimate_by_analogy, AnalogyOutcome, AnalogyRequest, HistoricalTask, SimilarityScorer};
pub use pert::{three_point, PertOutcome};

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::graph::{GraphError, TaskGraph};
use crate::log_changes;
use crate::models::{Estimate, EstimationMethod, TaskId};

/// Errors that can occur while estimating.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimationError {
    #[error("Invalid estimate input for {task_id}: {reason}")]
    InvalidEstimateInput { task_id: TaskId, reason: String },
    #[error("No similar historical tasks for {0}")]
    EmptyCorpus(TaskId),
    #[error("No estimate recorded for {0}")]
    NoEstimate(TaskId),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Method selection and parameters for one estimate.
pub enum EstimateRequest<'a> {
    Expert { hours: f64, confidence: f64 },
    Analogy(AnalogyRequest<'a>),
    Pert {
        optimistic: f64,
        most_likely: f64,
        pessimistic: f64,
    },
}

impl EstimateRequest<'_> {
    pub fn method(&self) -> EstimationMethod {
        match self {
            Self::Expert { .. } => EstimationMethod::Expert,
            Self::Analogy(_) => EstimationMethod::Analogy,
            Self::Pert { .. } => EstimationMethod::Pert,
        }
    }
}

/// Produces estimates and tracks how accurate each method turns out to be.
#[derive(Clone, Debug, Default)]
pub struct EstimationEngine {
    history: Vec<Estimate>,
    latest: FxHashMap<TaskId, usize>,
    accuracy: AccuracyTracker,
    verbosity: u8,
}

impl EstimationEngine {
    pub fn new(verbosity: u8) -> Self {
        Self {
            verbosity,
            ..Self::default()
        }
    }

    /// Estimate a task with the requested method and record the result.
    pub fn estimate(
        &mut self,
        task_id: &str,
        request: &EstimateRequest<'_>,
    ) -> Result<Estimate, EstimationError> {
        let method = request.method();
        let mut estimate = match request {
            EstimateRequest::Expert { hours, confidence } => {
                expert_judgment(task_id, *hours, *confidence)?
            }
            EstimateRequest::Analogy(analogy) => {
                let outcome = estimate_by_analogy(task_id, analogy)?;
                Estimate {
                    task_id: task_id.to_string(),
                    method,
                    optimistic_hours: None,
                    most_likely_hours: None,
                    pessimistic_hours: None,
                    expected_hours: outcome.expected,
                    std_dev_hours: None,
                    interval: Some(outcome.interval),
                    confidence: outcome.raw_confidence,
                    similar_task_ids: outcome.similar_task_ids,
                }
            }
            EstimateRequest::Pert {
                optimistic,
                most_likely,
                pessimistic,
            } => {
                let outcome = three_point(task_id, *optimistic, *most_likely, *pessimistic)?;
                Estimate {
                    task_id: task_id.to_string(),
                    method,
                    optimistic_hours: Some(*optimistic),
                    most_likely_hours: Some(*most_likely),
                    pessimistic_hours: Some(*pessimistic),
                    expected_hours: outcome.expected,
                    std_dev_hours: Some(outcome.std_dev),
                    interval: Some(outcome.interval),
                    confidence: outcome.raw_confidence,
                    similar_task_ids: Vec::new(),
                }
            }
        };
        estimate.confidence = self.accuracy.calibrate(method, estimate.confidence);

        log_changes!(
            self.verbosity,
            task_id,
            ?method,
            expected_hours = estimate.expected_hours,
            confidence = estimate.confidence,
            "Estimated task"
        );

        self.latest.insert(task_id.to_string(), self.history.len());
        self.history.push(estimate.clone());
        Ok(estimate)
    }

    /// Estimate and write the expected duration onto the task.
    pub fn estimate_into(
        &mut self,
        graph: &mut TaskGraph,
        task_id: &str,
        request: &EstimateRequest<'_>,
    ) -> Result<Estimate, EstimationError> {
        if !graph.contains(task_id) {
            return Err(GraphError::UnknownTask(task_id.to_string()).into());
        }
        let estimate = self.estimate(task_id, request)?;
        graph.set_estimate(task_id, estimate.expected_hours)?;
        Ok(estimate)
    }

    pub fn latest(&self, task_id: &str) -> Option<&Estimate> {
        self.latest.get(task_id).map(|&i| &self.history[i])
    }

    /// Every estimate ever produced, oldest first.
    pub fn history(&self) -> &[Estimate] {
        &self.history
    }

    /// Feed the actual duration of a completed task into the accuracy metric.
    ///
    /// Returns the absolute percentage error of the latest estimate (fraction).
    pub fn record_actual(&mut self, task_id: &str, actual_hours: f64) -> Result<f64, EstimationError> {
        check_actual(task_id, actual_hours)?;
        let estimate = self
            .latest(task_id)
            .ok_or_else(|| EstimationError::NoEstimate(task_id.to_string()))?;
        let (method, expected) = (estimate.method, estimate.expected_hours);
        Ok(self.accuracy.record(method, expected, actual_hours))
    }

    /// Score an estimate this engine never produced, such as a duration
    /// imported with the task record.
    ///
    /// Imported durations count as expert judgment.
    pub fn record_imported(
        &mut self,
        task_id: &str,
        estimated_hours: f64,
        actual_hours: f64,
    ) -> Result<f64, EstimationError> {
        check_actual(task_id, actual_hours)?;
        Ok(self
            .accuracy
            .record(EstimationMethod::Expert, estimated_hours, actual_hours))
    }

    pub fn accuracy(&self) -> &AccuracyTracker {
        &self.accuracy
    }
}

pub(crate) fn check_actual(task_id: &str, actual_hours: f64) -> Result<(), EstimationError> {
    if actual_hours.is_finite() && actual_hours > 0.0 {
        return Ok(());
    }
    Err(EstimationError::InvalidEstimateInput {
        task_id: task_id.to_string(),
        reason: format!("actual hours must be positive, got {}", actual_hours),
    })
}

fn expert_judgment(task_id: &str, hours: f64, confidence: f64) -> Result<Estimate, EstimationError> {
    if !(hours.is_finite() && hours >= 0.0) {
        return Err(EstimationError::InvalidEstimateInput {
            task_id: task_id.to_string(),
            reason: format!("hours must be finite and non-negative, got {}", hours),
        });
    }
    if !(0.0..=1.0).contains(&confidence) {
        return Err(EstimationError::InvalidEstimateInput {
            task_id: task_id.to_string(),
            reason: format!("confidence must be in [0, 1], got {}", confidence),
        });
    }
    Ok(Estimate {
        task_id: task_id.to_string(),
        method: EstimationMethod::Expert,
        optimistic_hours: None,
        most_likely_hours: None,
        pessimistic_hours: None,
        expected_hours: hours,
        std_dev_hours: None,
        interval: None,
        confidence,
        similar_task_ids: Vec::new(),
    })
}
