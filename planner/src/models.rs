//! Core data types for the planning engine.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

pub type TaskId = String;
pub type ActorId = String;
pub type MilestoneId = String;
pub type GoalId = String;

/// Convert fractional hours to a calendar duration (minute granularity).
pub fn hours_to_duration(hours: f64) -> Duration {
    Duration::minutes((hours * 60.0).round() as i64)
}

/// Hours elapsed between two instants (negative if `end` precedes `start`).
pub fn hours_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    (end - start).num_minutes() as f64 / 60.0
}

/// Lifecycle status of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Scheduled,
    InProgress,
    Done,
    Blocked,
}

/// A unit of work inside a milestone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub milestone_id: MilestoneId,
    /// Effort in hours; `None` until an estimate has been applied.
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub status: TaskStatus,
    /// Ordinal priority, 0 (lowest) to 100 (highest).
    pub priority: i32,
    /// Set only on split fragments; points back at the original task.
    pub parent_task_id: Option<TaskId>,
    pub assigned_actor: Option<ActorId>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>, milestone_id: impl Into<MilestoneId>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            milestone_id: milestone_id.into(),
            estimated_hours: None,
            actual_hours: None,
            status: TaskStatus::Pending,
            priority: 50,
            parent_task_id: None,
            assigned_actor: None,
        }
    }

    pub fn with_estimate(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn assigned_to(mut self, actor_id: impl Into<ActorId>) -> Self {
        self.assigned_actor = Some(actor_id.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_fragment(&self) -> bool {
        self.parent_task_id.is_some()
    }

    /// Duration used by the planners; unestimated tasks count as zero.
    pub fn duration_hours(&self) -> f64 {
        self.estimated_hours.unwrap_or(0.0)
    }
}

/// How a successor's timing relates to its predecessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl DependencyKind {
    /// Whether the constraint is anchored on the predecessor's finish.
    pub fn anchors_on_finish(&self) -> bool {
        matches!(self, Self::FinishToStart | Self::FinishToFinish)
    }

    /// Whether the constraint bounds the successor's finish (rather than its start).
    pub fn constrains_finish(&self) -> bool {
        matches!(self, Self::FinishToFinish | Self::StartToFinish)
    }
}

/// A typed precedence edge between two tasks with signed lag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub predecessor: TaskId,
    pub successor: TaskId,
    pub kind: DependencyKind,
    /// Lag in hours; negative values are leads.
    pub lag_hours: f64,
}

impl Dependency {
    pub fn new(predecessor: impl Into<TaskId>, successor: impl Into<TaskId>, kind: DependencyKind, lag_hours: f64) -> Self {
        Self {
            predecessor: predecessor.into(),
            successor: successor.into(),
            kind,
            lag_hours,
        }
    }

    pub fn finish_to_start(predecessor: impl Into<TaskId>, successor: impl Into<TaskId>) -> Self {
        Self::new(predecessor, successor, DependencyKind::FinishToStart, 0.0)
    }

    /// Earliest permissible start of the successor, in offset hours, given the
    /// predecessor's start/finish offsets and the successor's duration.
    pub fn successor_earliest_start(&self, pred_start: f64, pred_finish: f64, succ_duration: f64) -> f64 {
        let anchor = if self.kind.anchors_on_finish() {
            pred_finish
        } else {
            pred_start
        };
        let bound = anchor + self.lag_hours;
        if self.kind.constrains_finish() {
            bound - succ_duration
        } else {
            bound
        }
    }

    /// Latest permissible finish of the predecessor, in offset hours, given the
    /// successor's latest start/finish and the predecessor's duration.
    pub fn predecessor_latest_finish(&self, succ_latest_start: f64, succ_latest_finish: f64, pred_duration: f64) -> f64 {
        let anchor = if self.kind.constrains_finish() {
            succ_latest_finish
        } else {
            succ_latest_start
        };
        let bound = anchor - self.lag_hours;
        if self.kind.anchors_on_finish() {
            bound
        } else {
            bound + pred_duration
        }
    }
}

/// A milestone groups the tasks produced by one decomposition step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub goal_id: GoalId,
    pub title: String,
    /// Explicit deadline in working hours from the plan start.
    pub deadline_hours: Option<f64>,
}

/// Estimation technique that produced an [`Estimate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMethod {
    Expert,
    Analogy,
    Pert,
}

/// An effort estimate for one task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub task_id: TaskId,
    pub method: EstimationMethod,
    pub optimistic_hours: Option<f64>,
    pub most_likely_hours: Option<f64>,
    pub pessimistic_hours: Option<f64>,
    pub expected_hours: f64,
    pub std_dev_hours: Option<f64>,
    /// (low, high) bounds, ±1 standard deviation for PERT.
    pub interval: Option<(f64, f64)>,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Historical tasks that informed an analogy estimate.
    pub similar_task_ids: Vec<TaskId>,
}

/// Per-actor available-hours model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapacityProfile {
    pub actor_id: ActorId,
    /// Maximum hours of scheduled work per day.
    pub hours_per_day: f64,
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
    pub weekends_allowed: bool,
    /// Minimum contiguous duration of a usable slot.
    pub min_focus_block_hours: f64,
    /// Largest single block; falls back to the planner default when unset.
    pub max_block_hours: Option<f64>,
}

impl CapacityProfile {
    /// A weekday 09:00-17:00 profile with 8 hours per day.
    pub fn standard(actor_id: impl Into<ActorId>) -> Self {
        Self {
            actor_id: actor_id.into(),
            hours_per_day: 8.0,
            work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            work_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            weekends_allowed: false,
            min_focus_block_hours: 0.0,
            max_block_hours: None,
        }
    }

    pub fn window_hours(&self) -> f64 {
        ((self.work_end - self.work_start).num_minutes() as f64 / 60.0).max(0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotSource {
    Free,
    Busy,
}

/// A free/busy interval reported by the calendar collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub actor_id: ActorId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub source: SlotSource,
}

impl TimeSlot {
    pub fn free(actor_id: impl Into<ActorId>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            actor_id: actor_id.into(),
            start,
            end,
            source: SlotSource::Free,
        }
    }

    pub fn busy(actor_id: impl Into<ActorId>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            actor_id: actor_id.into(),
            start,
            end,
            source: SlotSource::Busy,
        }
    }

    pub fn hours(&self) -> f64 {
        hours_between(self.start, self.end)
    }
}

/// A placed block of work, emitted to the calendar collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduledBlock {
    /// Task or split-fragment ID.
    pub task_id: TaskId,
    /// Original task when `task_id` is a fragment.
    pub parent_task_id: Option<TaskId>,
    pub actor_id: ActorId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub is_focus_time: bool,
    /// Planning pass that produced this block.
    pub generation: u32,
}

impl ScheduledBlock {
    pub fn hours(&self) -> f64 {
        hours_between(self.start, self.end)
    }

    /// The schedulable task this block belongs to (the parent for fragments).
    pub fn root_task_id(&self) -> &str {
        self.parent_task_id.as_deref().unwrap_or(&self.task_id)
    }

    pub fn overlaps(&self, other: &ScheduledBlock) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Overlap,
    DependencyViolation,
    CapacityBreach,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Pending,
    Resolved,
    Ignored,
}

/// A constraint violation found in a generation of blocks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub task_ids: Vec<TaskId>,
    pub actor_id: Option<ActorId>,
    pub description: String,
    pub resolution: ResolutionStatus,
}

impl Conflict {
    pub fn new(kind: ConflictKind, task_ids: Vec<TaskId>, actor_id: Option<ActorId>, description: String) -> Self {
        Self {
            kind,
            task_ids,
            actor_id,
            description,
            resolution: ResolutionStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_hours_conversion() {
        assert_eq!(hours_to_duration(1.5), Duration::minutes(90));
        assert!((hours_between(dt(3, 9), dt(3, 17)) - 8.0).abs() < 1e-9);
        assert!((hours_between(dt(3, 17), dt(3, 9)) + 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_dependency_earliest_start_by_kind() {
        // pred runs [2, 6), successor lasts 3h, lag 1h
        let cases = [
            (DependencyKind::FinishToStart, 7.0),
            (DependencyKind::StartToStart, 3.0),
            (DependencyKind::FinishToFinish, 4.0),
            (DependencyKind::StartToFinish, 0.0),
        ];
        for (kind, expected) in cases {
            let dep = Dependency::new("p", "s", kind, 1.0);
            let es = dep.successor_earliest_start(2.0, 6.0, 3.0);
            assert!((es - expected).abs() < 1e-9, "{:?}: {}", kind, es);
        }
    }

    #[test]
    fn test_dependency_latest_finish_by_kind() {
        // successor may run [10, 13), predecessor lasts 4h, lag 1h
        let cases = [
            (DependencyKind::FinishToStart, 9.0),
            (DependencyKind::StartToStart, 13.0),
            (DependencyKind::FinishToFinish, 12.0),
            (DependencyKind::StartToFinish, 16.0),
        ];
        for (kind, expected) in cases {
            let dep = Dependency::new("p", "s", kind, 1.0);
            let lf = dep.predecessor_latest_finish(10.0, 13.0, 4.0);
            assert!((lf - expected).abs() < 1e-9, "{:?}: {}", kind, lf);
        }
    }

    #[test]
    fn test_block_overlap_and_root() {
        let a = ScheduledBlock {
            task_id: "t#1".to_string(),
            parent_task_id: Some("t".to_string()),
            actor_id: "ann".to_string(),
            start: dt(3, 9),
            end: dt(3, 11),
            is_focus_time: true,
            generation: 1,
        };
        let mut b = a.clone();
        b.task_id = "u".to_string();
        b.parent_task_id = None;
        b.start = dt(3, 11);
        b.end = dt(3, 12);

        assert!(!a.overlaps(&b));
        assert_eq!(a.root_task_id(), "t");
        assert_eq!(b.root_task_id(), "u");
        b.start = dt(3, 10);
        assert!(a.overlaps(&b));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
