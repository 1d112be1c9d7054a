//! Goal decomposition and constrained scheduling engine.
//!
//! Turns a goal's milestones into a dependency-ordered, capacity-bounded plan:
//! critical path analysis over typed dependencies, effort estimation, slot
//! scoring and placement with task splitting, capacity rebalancing across
//! actors, and conflict detection. [`GoalSession`] is the per-goal entry point;
//! [`PlanningSessions`] serializes passes per goal.

pub mod advisory;
pub mod capacity;
pub mod config;
pub mod conflicts;
pub mod critical_path;
pub mod engine;
pub mod estimation;
pub mod graph;
pub mod history;
pub mod interner;
pub mod logging;
pub mod models;
pub mod optimizer;
#[cfg(feature = "python")]
mod python;
pub mod scheduler;
pub mod session;
pub mod store;

pub use advisory::{consult, parse_advice, Advice, AdvisoryError, AdvisoryRequest, Advisor};
pub use capacity::{CapacityError, CapacityStore, PlanningWindow, PreferenceUpdate};
pub use config::{ConcurrencyPolicy, ConfigError, PlannerConfig, SlotWeights};
pub use conflicts::{ConflictDetector, ConflictLog, ConflictLogError};
pub use critical_path::{
    analyze, analyze_with, analyze_with_deadline, AnalysisOptions, ChainTieBreak,
    CriticalPathError, CriticalPathResult,
};
pub use engine::{
    AdvisedPlan, CapacityReport, DependencyGraphView, GoalSession, GraphNode, PlannerError,
    ScheduleConstraints, SchedulePlan,
};
pub use estimation::{EstimateRequest, EstimationEngine, EstimationError, HistoricalTask};
pub use graph::{GraphError, TaskGraph};
pub use history::{BlockHistory, GenerationDiff};
pub use interner::TaskIdx;
pub use models::{
    ActorId, CapacityProfile, Conflict, ConflictKind, Dependency, DependencyKind, Estimate,
    EstimationMethod, GoalId, Milestone, MilestoneId, ResolutionStatus, ScheduledBlock,
    SlotSource, Task, TaskId, TaskStatus, TimeSlot,
};
pub use optimizer::{
    AnySkill, CapacityOptimizer, OptimizationIncomplete, OptimizationOutcome, Reassignment,
    SkillMatcher,
};
pub use scheduler::{ScheduleOutcome, ScheduleRequest, SlotScheduler, Unplaced, UnplacedReason};
pub use session::{PlanningSessions, SessionGuard};
pub use store::{AvailabilitySource, GoalStore, InMemoryCalendar, InMemoryGoalStore, StoreError};
