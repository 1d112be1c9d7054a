//! Seams to the goal/task store and the calendar, with in-memory implementations.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::capacity::PlanningWindow;
use crate::models::{
    ActorId, CapacityProfile, Dependency, GoalId, Milestone, Task, TaskId, TimeSlot,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Milestone not found: {0}")]
    MilestoneNotFound(String),
    #[error("Store backend failed: {0}")]
    Backend(String),
}

/// Where goals, milestones, tasks and dependencies come from.
pub trait GoalStore: Send + Sync {
    fn milestone(&self, milestone_id: &str) -> Result<Milestone, StoreError>;

    fn milestones(&self, goal_id: &str) -> Result<Vec<Milestone>, StoreError>;

    /// Tasks produced by decomposing a milestone.
    fn tasks(&self, milestone_id: &str) -> Result<Vec<Task>, StoreError>;

    /// Dependencies whose successor belongs to the milestone.
    fn dependencies(&self, milestone_id: &str) -> Result<Vec<Dependency>, StoreError>;

    fn capacity_profiles(&self) -> Result<Vec<CapacityProfile>, StoreError>;
}

/// Free/busy time per actor, supplied by the calendar collaborator.
pub trait AvailabilitySource: Send + Sync {
    fn availability(&self, actor_ids: &[ActorId], window: &PlanningWindow) -> Vec<TimeSlot>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryGoalStore {
    milestones: BTreeMap<String, Milestone>,
    tasks: Vec<Task>,
    dependencies: Vec<Dependency>,
    profiles: BTreeMap<ActorId, CapacityProfile>,
}

impl InMemoryGoalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_milestone(mut self, milestone: Milestone) -> Self {
        self.milestones.insert(milestone.id.clone(), milestone);
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_profile(mut self, profile: CapacityProfile) -> Self {
        self.profiles.insert(profile.actor_id.clone(), profile);
        self
    }

    fn milestone_of(&self, task_id: &TaskId) -> Option<&str> {
        self.tasks
            .iter()
            .find(|t| &t.id == task_id)
            .map(|t| t.milestone_id.as_str())
    }
}

impl GoalStore for InMemoryGoalStore {
    fn milestone(&self, milestone_id: &str) -> Result<Milestone, StoreError> {
        self.milestones
            .get(milestone_id)
            .cloned()
            .ok_or_else(|| StoreError::MilestoneNotFound(milestone_id.to_string()))
    }

    fn milestones(&self, goal_id: &str) -> Result<Vec<Milestone>, StoreError> {
        Ok(self
            .milestones
            .values()
            .filter(|m| m.goal_id == goal_id)
            .cloned()
            .collect())
    }

    fn tasks(&self, milestone_id: &str) -> Result<Vec<Task>, StoreError> {
        self.milestone(milestone_id)?;
        Ok(self
            .tasks
            .iter()
            .filter(|t| t.milestone_id == milestone_id)
            .cloned()
            .collect())
    }

    fn dependencies(&self, milestone_id: &str) -> Result<Vec<Dependency>, StoreError> {
        self.milestone(milestone_id)?;
        Ok(self
            .dependencies
            .iter()
            .filter(|d| self.milestone_of(&d.successor) == Some(milestone_id))
            .cloned()
            .collect())
    }

    fn capacity_profiles(&self) -> Result<Vec<CapacityProfile>, StoreError> {
        Ok(self.profiles.values().cloned().collect())
    }
}

/// A fixed set of slots, clipped to the requested window.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCalendar {
    slots: Vec<TimeSlot>,
}

impl InMemoryCalendar {
    pub fn new(slots: Vec<TimeSlot>) -> Self {
        Self { slots }
    }

    pub fn push(&mut self, slot: TimeSlot) {
        self.slots.push(slot);
    }
}

impl AvailabilitySource for InMemoryCalendar {
    fn availability(&self, actor_ids: &[ActorId], window: &PlanningWindow) -> Vec<TimeSlot> {
        self.slots
            .iter()
            .filter(|s| actor_ids.contains(&s.actor_id))
            .filter_map(|s| {
                let start = s.start.max(window.start);
                let end = s.end.min(window.end);
                (start < end).then(|| TimeSlot {
                    start,
                    end,
                    ..s.clone()
                })
            })
            .collect()
    }
}

/// Goals a store knows about, for callers that only hold milestone IDs.
pub fn goal_of(store: &dyn GoalStore, milestone_id: &str) -> Result<GoalId, StoreError> {
    store.milestone(milestone_id).map(|m| m.goal_id)
}
