//! Configuration types for the planning engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::critical_path::ChainTieBreak;
use crate::logging::Verbosity;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Weights of the slot score terms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotWeights {
    /// Weight for normalized task priority
    pub priority: f64,
    /// Weight for closeness to the critical path
    pub dependency: f64,
    /// Weight for how well the slot suits the task (earliness, adjacency, fit)
    pub preference: f64,
}

impl Default for SlotWeights {
    fn default() -> Self {
        Self {
            priority: 0.5,
            dependency: 0.3,
            preference: 0.2,
        }
    }
}

/// What to do when a second scheduling pass arrives for a goal already being planned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// Wait in FIFO order for the running pass to finish
    Queue,
    /// Fail immediately with `AlreadyScheduling`
    Reject,
}

/// Configuration for estimation, placement, optimization and session handling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub weights: SlotWeights,
    /// Urgency decay parameter K (higher = more tolerant of slack)
    pub urgency_k: f64,
    /// Maximum block size when a capacity profile does not set one
    pub default_max_block_hours: f64,
    /// Utilization above this fraction counts as overallocation
    pub utilization_ceiling: f64,
    /// Optimizer iteration cap = factor x task count
    pub iteration_cap_factor: usize,
    pub concurrency: ConcurrencyPolicy,
    /// Timeout for the advisory collaborator
    pub advisory_timeout_secs: u64,
    /// Priority used when a store record carries none (0-100)
    pub default_priority: i32,
    /// Primary critical chain choice among equal-length, equal-priority chains
    pub tie_break: ChainTieBreak,
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug
    pub verbosity: u8,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            weights: SlotWeights::default(),
            urgency_k: 2.0,
            default_max_block_hours: 2.0,
            utilization_ceiling: 0.9,
            iteration_cap_factor: 3,
            concurrency: ConcurrencyPolicy::Queue,
            advisory_timeout_secs: 10,
            default_priority: 50,
            tie_break: ChainTieBreak::EarliestTaskId,
            verbosity: 0,
        }
    }
}

impl PlannerConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.weights;
        if w.priority < 0.0 || w.dependency < 0.0 || w.preference < 0.0 {
            return Err(ConfigError::Invalid("slot weights must be non-negative".to_string()));
        }
        if !(self.utilization_ceiling > 0.0 && self.utilization_ceiling <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "utilization_ceiling must be in (0, 1], got {}",
                self.utilization_ceiling
            )));
        }
        if self.default_max_block_hours <= 0.0 {
            return Err(ConfigError::Invalid(
                "default_max_block_hours must be positive".to_string(),
            ));
        }
        if self.urgency_k <= 0.0 {
            return Err(ConfigError::Invalid("urgency_k must be positive".to_string()));
        }
        if !(0..=100).contains(&self.default_priority) {
            return Err(ConfigError::Invalid(format!(
                "default_priority must be 0-100, got {}",
                self.default_priority
            )));
        }
        if Verbosity::from_level(self.verbosity).is_none() {
            return Err(ConfigError::Invalid(format!(
                "verbosity must be 0-3, got {}",
                self.verbosity
            )));
        }
        Ok(())
    }

    pub fn iteration_cap(&self, task_count: usize) -> usize {
        self.iteration_cap_factor.max(1) * task_count.max(1)
    }
}
