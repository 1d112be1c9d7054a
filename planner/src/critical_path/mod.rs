//! Critical path analysis over a task graph.
//!
//! The forward pass computes earliest start/finish honoring every dependency
//! kind and lag; the backward pass runs from the makespan (or an explicit
//! deadline) to produce latest start/finish and slack. Tasks whose slack equals
//! the project float are critical, and the longest chain of them is reported as
//! the primary critical path.

mod calculation;
mod propagation;
mod types;

pub use calculation::{analyze, analyze_with, analyze_with_deadline, CriticalPathError};
pub use propagation::effective_priorities;
pub use types::{
    AnalysisOptions, ChainTieBreak, CriticalChain, CriticalPathResult, TaskTiming,
    CRITICAL_EPSILON,
};
