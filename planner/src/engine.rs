//! Per-goal planning session: the request/response surface of the engine.
//!
//! A [`GoalSession`] owns everything one goal needs between passes: the task
//! graph, capacity profiles, estimate history, block generations and conflict
//! log. Each scheduling operation snapshots that state, runs the pure
//! placement and optimization passes, and commits the result as a new
//! generation.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::advisory::{consult, Advice, AdvisoryRequest, Advisor};
use crate::capacity::{available_hours_by_actor, utilization, CapacityError, CapacityStore, PlanningWindow, PreferenceUpdate};
use crate::config::{ConfigError, PlannerConfig};
use crate::conflicts::{ConflictDetector, ConflictLog, ConflictLogError};
use crate::critical_path::{
    analyze_with, effective_priorities, AnalysisOptions, CriticalPathError, CriticalPathResult,
    TaskTiming,
};
use crate::estimation::{check_actual, EstimateRequest, EstimationEngine, EstimationError};
use crate::graph::{GraphError, TaskGraph};
use crate::history::BlockHistory;
use crate::models::{
    ActorId, CapacityProfile, Conflict, Dependency, Estimate, GoalId, Milestone, MilestoneId,
    ResolutionStatus, ScheduledBlock, Task, TaskId, TaskStatus, TimeSlot,
};
use crate::optimizer::{CapacityOptimizer, OptimizationIncomplete, Reassignment, SkillMatcher};
use crate::scheduler::{
    PlacementLedger, PlacementState, ScheduleOutcome, ScheduleRequest, SlotScheduler,
    TaskPlacement, Unplaced,
};
use crate::store::{AvailabilitySource, GoalStore, StoreError};
use crate::{log_changes, log_checks};

/// Errors surfaced to callers of the planning engine.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    CriticalPath(#[from] CriticalPathError),
    #[error(transparent)]
    Estimation(#[from] EstimationError),
    #[error(transparent)]
    Capacity(CapacityError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    ConflictLog(#[from] ConflictLogError),
    #[error("Goal {goal_id} already has a scheduling pass in flight")]
    AlreadyScheduling { goal_id: GoalId },
    #[error("Milestone {milestone_id} does not belong to goal {goal_id}")]
    UnknownMilestone {
        goal_id: GoalId,
        milestone_id: MilestoneId,
    },
    #[error("Unknown actor: {0}")]
    UnknownActor(ActorId),
}

impl From<CapacityError> for PlannerError {
    fn from(e: CapacityError) -> Self {
        match e {
            CapacityError::UnknownActor(actor_id) => PlannerError::UnknownActor(actor_id),
            other => PlannerError::Capacity(other),
        }
    }
}

/// Caller constraints for a scheduling pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConstraints {
    pub window: PlanningWindow,
    /// Force a task onto an actor, ignoring its assignment.
    #[serde(default)]
    pub actor_overrides: BTreeMap<TaskId, ActorId>,
}

impl ScheduleConstraints {
    pub fn new(window: PlanningWindow) -> Self {
        Self {
            window,
            actor_overrides: BTreeMap::new(),
        }
    }
}

/// Response of `schedule`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulePlan {
    pub generation: u32,
    /// Every block of the generation, including work carried over from
    /// earlier passes that were outside this pass's scope.
    pub blocks: Vec<ScheduledBlock>,
    pub unplaced: Vec<Unplaced>,
    pub conflicts: Vec<Conflict>,
    pub utilization: BTreeMap<ActorId, f64>,
}

/// Response of `optimize_capacity`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapacityReport {
    pub generation: u32,
    pub reassignments: Vec<Reassignment>,
    pub utilization_before: BTreeMap<ActorId, f64>,
    pub utilization_after: BTreeMap<ActorId, f64>,
    pub incomplete: Option<OptimizationIncomplete>,
    pub conflicts: Vec<Conflict>,
}

/// A schedule together with whatever the advisor had to say about it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdvisedPlan {
    pub plan: SchedulePlan,
    pub advice: Advice,
}

/// One task in the dependency graph view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub task_id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub estimated_hours: Option<f64>,
    pub priority: i32,
    /// Own priority raised to the highest priority of any downstream task.
    pub effective_priority: i32,
    pub timing: TaskTiming,
    pub critical: bool,
}

/// Response of `compute_dependency_graph`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraphView {
    pub milestone_id: MilestoneId,
    /// Nodes in topological order.
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Dependency>,
    pub critical_path: Vec<TaskId>,
    pub makespan_hours: f64,
    pub project_float: f64,
}

/// Inputs of one placement pass, snapshotted from the session.
struct PassInputs {
    analysis: CriticalPathResult,
    profiles: BTreeMap<ActorId, CapacityProfile>,
    availability: Vec<TimeSlot>,
    request: ScheduleRequest,
    /// Blocks from the previous generation that this pass leaves alone.
    carried: Vec<ScheduledBlock>,
}

/// All planning state for one goal.
///
/// Only one pass may mutate a session at a time; [`PlanningSessions`]
/// enforces that across callers.
///
/// [`PlanningSessions`]: crate::session::PlanningSessions
#[derive(Debug)]
pub struct GoalSession {
    goal_id: GoalId,
    config: PlannerConfig,
    graph: TaskGraph,
    milestones: BTreeMap<MilestoneId, Milestone>,
    capacity: CapacityStore,
    estimation: EstimationEngine,
    history: BlockHistory,
    conflicts: ConflictLog,
    ledger: PlacementLedger,
}

impl GoalSession {
    pub fn new(goal_id: impl Into<GoalId>, config: PlannerConfig) -> Result<Self, PlannerError> {
        config.validate()?;
        let verbosity = config.verbosity;
        Ok(Self {
            goal_id: goal_id.into(),
            config,
            graph: TaskGraph::new(),
            milestones: BTreeMap::new(),
            capacity: CapacityStore::new(),
            estimation: EstimationEngine::new(verbosity),
            history: BlockHistory::new(),
            conflicts: ConflictLog::new(),
            ledger: PlacementLedger::new(),
        })
    }

    pub fn goal_id(&self) -> &str {
        &self.goal_id
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn capacity(&self) -> &CapacityStore {
        &self.capacity
    }

    pub fn estimation(&self) -> &EstimationEngine {
        &self.estimation
    }

    pub fn history(&self) -> &BlockHistory {
        &self.history
    }

    pub fn conflict_log(&self) -> &ConflictLog {
        &self.conflicts
    }

    pub fn placement_states(&self) -> &PlacementLedger {
        &self.ledger
    }

    /// Load a decomposed milestone's tasks and dependencies into the graph.
    ///
    /// The load is all-or-nothing: a cycle or bad record leaves the graph as it
    /// was. Tasks already in the graph keep their current state. Returns the
    /// milestone's tasks in topological order.
    pub fn generate_wbs(
        &mut self,
        store: &dyn GoalStore,
        milestone_id: &str,
    ) -> Result<Vec<Task>, PlannerError> {
        let milestone = store.milestone(milestone_id)?;
        if milestone.goal_id != self.goal_id {
            return Err(PlannerError::UnknownMilestone {
                goal_id: self.goal_id.clone(),
                milestone_id: milestone_id.to_string(),
            });
        }

        let mut graph = self.graph.clone();
        for mut task in store.tasks(milestone_id)? {
            if graph.contains(&task.id) {
                continue;
            }
            if !(0..=100).contains(&task.priority) {
                log_checks!(
                    self.config.verbosity,
                    task_id = %task.id,
                    priority = task.priority,
                    "Priority out of range, using default"
                );
                task.priority = self.config.default_priority;
            }
            graph.add_task(task)?;
        }
        for dep in store.dependencies(milestone_id)? {
            let known = graph
                .predecessors(&dep.successor)
                .iter()
                .any(|d| d.predecessor == dep.predecessor);
            if !known {
                graph.add_edge(&dep)?;
            }
        }
        self.graph = graph;
        self.milestones.insert(milestone.id.clone(), milestone);

        let tasks: Vec<Task> = self
            .graph
            .topological_order()
            .iter()
            .filter_map(|id| self.graph.get(id))
            .filter(|t| t.milestone_id == milestone_id)
            .cloned()
            .collect();
        log_changes!(
            self.config.verbosity,
            goal_id = %self.goal_id,
            milestone_id,
            tasks = tasks.len(),
            "Loaded work breakdown"
        );
        Ok(tasks)
    }

    /// Replace the capacity profiles with the store's.
    pub fn load_capacity(&mut self, store: &dyn GoalStore) -> Result<usize, PlannerError> {
        let mut capacity = CapacityStore::new();
        for profile in store.capacity_profiles()? {
            capacity.upsert(profile)?;
        }
        self.capacity = capacity;
        Ok(self.capacity.len())
    }

    pub fn upsert_profile(&mut self, profile: CapacityProfile) -> Result<(), PlannerError> {
        Ok(self.capacity.upsert(profile)?)
    }

    pub fn update_preferences(
        &mut self,
        actor_id: &str,
        update: &PreferenceUpdate,
    ) -> Result<CapacityProfile, PlannerError> {
        let profile = self.capacity.update_preferences(actor_id, update)?.clone();
        log_changes!(self.config.verbosity, actor_id, "Updated capacity preferences");
        Ok(profile)
    }

    /// Timings, typed edges and the primary critical chain of one milestone.
    ///
    /// Runs against the milestone's deadline when it has one.
    pub fn compute_dependency_graph(
        &self,
        milestone_id: &str,
    ) -> Result<DependencyGraphView, PlannerError> {
        let milestone = self.milestone(milestone_id)?;
        let sub = self.graph.milestone_subgraph(milestone_id)?;
        let analysis = analyze_with(
            &sub,
            &AnalysisOptions {
                deadline_hours: milestone.deadline_hours,
                tie_break: self.config.tie_break,
            },
        )?;
        let priorities = effective_priorities(&sub);

        let nodes = analysis
            .order
            .iter()
            .filter_map(|id| sub.get(id))
            .map(|task| GraphNode {
                task_id: task.id.clone(),
                title: task.title.clone(),
                status: task.status,
                estimated_hours: task.estimated_hours,
                priority: task.priority,
                effective_priority: priorities.get(&task.id).copied().unwrap_or(task.priority),
                timing: analysis.timing(&task.id).cloned().unwrap_or_default(),
                critical: analysis.is_critical(&task.id),
            })
            .collect();

        Ok(DependencyGraphView {
            milestone_id: milestone_id.to_string(),
            nodes,
            edges: sub.dependencies().to_vec(),
            critical_path: analysis.primary_chain.task_ids.clone(),
            makespan_hours: analysis.makespan_hours,
            project_float: analysis.project_float,
        })
    }

    /// Estimate a task and apply the expected duration to it.
    pub fn estimate(
        &mut self,
        task_id: &str,
        request: &EstimateRequest<'_>,
    ) -> Result<Estimate, PlannerError> {
        Ok(self.estimation.estimate_into(&mut self.graph, task_id, request)?)
    }

    /// Mark a task done with its actual duration.
    ///
    /// Returns the absolute percentage error of the estimate the task was
    /// planned with: the latest one produced here, else the duration it was
    /// loaded with. `None` when it never had an estimate.
    pub fn record_actual(
        &mut self,
        task_id: &str,
        actual_hours: f64,
    ) -> Result<Option<f64>, PlannerError> {
        let loaded = self
            .graph
            .get(task_id)
            .ok_or_else(|| GraphError::UnknownTask(task_id.to_string()))?
            .estimated_hours;
        let error = if self.estimation.latest(task_id).is_some() {
            Some(self.estimation.record_actual(task_id, actual_hours)?)
        } else if let Some(estimated_hours) = loaded {
            Some(
                self.estimation
                    .record_imported(task_id, estimated_hours, actual_hours)?,
            )
        } else {
            check_actual(task_id, actual_hours)?;
            None
        };
        if let Some(task) = self.graph.get_mut(task_id) {
            task.actual_hours = Some(actual_hours);
            task.status = TaskStatus::Done;
        }
        log_changes!(
            self.config.verbosity,
            task_id,
            actual_hours,
            ?error,
            "Recorded actual duration"
        );
        Ok(error)
    }

    /// Place tasks (all of them when `task_ids` is `None`) into free time.
    ///
    /// Tasks that cannot be placed come back in `unplaced`; the pass itself
    /// only fails on bad input such as an unknown task or actor.
    pub fn schedule(
        &mut self,
        task_ids: Option<Vec<TaskId>>,
        constraints: &ScheduleConstraints,
        calendar: &dyn AvailabilitySource,
    ) -> Result<SchedulePlan, PlannerError> {
        let inputs = self.prepare(task_ids, constraints, calendar)?;
        let outcome = SlotScheduler::new(
            &self.graph,
            &inputs.analysis,
            &inputs.profiles,
            &inputs.availability,
            &self.config,
        )
        .schedule(&inputs.request);

        let unplaced = outcome.unplaced.clone();
        let (generation, blocks, conflicts, utilization) = self.commit(&inputs, outcome)?;
        Ok(SchedulePlan {
            generation,
            blocks,
            unplaced,
            conflicts,
            utilization,
        })
    }

    /// Place a milestone's tasks, then move work off overallocated actors.
    ///
    /// Accepted moves are written back as task assignments so later passes
    /// keep them.
    pub fn optimize_capacity(
        &mut self,
        milestone_id: &str,
        constraints: &ScheduleConstraints,
        calendar: &dyn AvailabilitySource,
        skills: &dyn SkillMatcher,
    ) -> Result<CapacityReport, PlannerError> {
        self.milestone(milestone_id)?;
        let scope: Vec<TaskId> = self
            .graph
            .tasks()
            .filter(|t| t.milestone_id == milestone_id && !t.is_fragment())
            .map(|t| t.id.clone())
            .collect();
        let inputs = self.prepare(Some(scope), constraints, calendar)?;

        let optimized = {
            let scheduler = SlotScheduler::new(
                &self.graph,
                &inputs.analysis,
                &inputs.profiles,
                &inputs.availability,
                &self.config,
            );
            let initial = scheduler.schedule(&inputs.request);
            CapacityOptimizer::new(
                &self.graph,
                &inputs.analysis,
                &inputs.profiles,
                &inputs.availability,
                &self.config,
                skills,
            )
            .optimize(&inputs.request, initial)
        };

        for moved in &optimized.reassignments {
            if let Some(task) = self.graph.get_mut(&moved.task_id) {
                task.assigned_actor = Some(moved.to.clone());
            }
        }
        if let Some(incomplete) = &optimized.incomplete {
            tracing::warn!(
                goal_id = %self.goal_id,
                milestone_id,
                iterations = incomplete.iterations,
                residual = incomplete.residual.len(),
                "Capacity optimization incomplete"
            );
        }

        let (generation, _, conflicts, _) = self.commit(&inputs, optimized.schedule)?;
        Ok(CapacityReport {
            generation,
            reassignments: optimized.reassignments,
            utilization_before: optimized.utilization_before,
            utilization_after: optimized.utilization_after,
            incomplete: optimized.incomplete,
            conflicts,
        })
    }

    /// Schedule, then ask the advisor about the result within the configured timeout.
    ///
    /// The plan is committed before the advisor is consulted and stands
    /// whatever the advisor returns.
    pub async fn schedule_with_advice(
        &mut self,
        task_ids: Option<Vec<TaskId>>,
        constraints: &ScheduleConstraints,
        calendar: &dyn AvailabilitySource,
        advisor: &dyn Advisor,
    ) -> Result<AdvisedPlan, PlannerError> {
        let plan = self.schedule(task_ids, constraints, calendar)?;
        let request = AdvisoryRequest {
            goal_id: self.goal_id.clone(),
            generation: plan.generation,
            blocks: plan.blocks.clone(),
            conflicts: plan.conflicts.clone(),
            unplaced: plan.unplaced.clone(),
        };
        let limit = Duration::from_secs(self.config.advisory_timeout_secs);
        let advice = consult(advisor, &request, limit).await;
        Ok(AdvisedPlan { plan, advice })
    }

    /// Confirm every placement of the latest generation.
    pub fn confirm_latest(&mut self) -> Option<u32> {
        let (generation, _) = self.history.latest()?;
        self.ledger.confirm_all();
        log_changes!(self.config.verbosity, generation, "Confirmed placements");
        Some(generation)
    }

    /// Mark a recorded conflict resolved or ignored.
    pub fn resolve_conflict(
        &mut self,
        generation: u32,
        index: usize,
        status: ResolutionStatus,
    ) -> Result<Conflict, PlannerError> {
        Ok(self.conflicts.mark(generation, index, status)?.clone())
    }

    fn milestone(&self, milestone_id: &str) -> Result<&Milestone, PlannerError> {
        self.milestones
            .get(milestone_id)
            .ok_or_else(|| PlannerError::UnknownMilestone {
                goal_id: self.goal_id.clone(),
                milestone_id: milestone_id.to_string(),
            })
    }

    /// Snapshot the session into the inputs of one placement pass.
    ///
    /// Confirmed placements, and for scoped passes everything out of scope,
    /// are carried over from the latest generation as fixed work.
    fn prepare(
        &self,
        task_ids: Option<Vec<TaskId>>,
        constraints: &ScheduleConstraints,
        calendar: &dyn AvailabilitySource,
    ) -> Result<PassInputs, PlannerError> {
        if let Some(ids) = &task_ids {
            if let Some(missing) = ids.iter().find(|id| !self.graph.contains(id)) {
                return Err(GraphError::UnknownTask(missing.clone()).into());
            }
        }
        if let Some(actor_id) = constraints
            .actor_overrides
            .values()
            .find(|a| self.capacity.get(a).is_none())
        {
            return Err(PlannerError::UnknownActor(actor_id.clone()));
        }

        // Unestimated tasks stay out of the analysis; the scheduler reports them.
        let analyzable: Vec<TaskId> = self
            .graph
            .tasks()
            .filter(|t| !t.is_fragment())
            .filter(|t| t.estimated_hours.is_some() || t.status == TaskStatus::Done)
            .map(|t| t.id.clone())
            .collect();
        self.check_deadlines(&analyzable, task_ids.as_deref())?;
        let analysis = analyze_with(
            &self.graph.subgraph(&analyzable)?,
            &AnalysisOptions {
                deadline_hours: None,
                tie_break: self.config.tie_break,
            },
        )?;

        let profiles = self.capacity.snapshot();
        let actor_ids: Vec<ActorId> = profiles.keys().cloned().collect();
        let availability = calendar.availability(&actor_ids, &constraints.window);

        let generation = self.history.next_generation();
        let mut request = ScheduleRequest::new(constraints.window, generation);
        request.actor_overrides = constraints.actor_overrides.clone();

        let confirmed: FxHashSet<&str> = self
            .ledger
            .iter()
            .filter(|(_, state)| **state == PlacementState::Confirmed)
            .map(|(id, _)| id.as_str())
            .collect();
        let scope: Option<FxHashSet<&str>> = task_ids
            .as_ref()
            .map(|ids| ids.iter().map(String::as_str).collect());
        let carried: Vec<ScheduledBlock> = match self.history.latest() {
            Some((_, previous)) => previous
                .iter()
                .filter(|b| {
                    let root = b.root_task_id();
                    confirmed.contains(root) || scope.as_ref().map_or(false, |s| !s.contains(root))
                })
                .map(|b| ScheduledBlock {
                    generation,
                    ..b.clone()
                })
                .collect(),
            None => Vec::new(),
        };
        request.fixed = fixed_placements(&carried);
        request.reserved = carried.clone();
        request.task_ids = if confirmed.is_empty() {
            task_ids
        } else {
            let open = task_ids.unwrap_or_else(|| {
                self.graph
                    .tasks()
                    .filter(|t| !t.is_fragment())
                    .map(|t| t.id.clone())
                    .collect()
            });
            Some(
                open.into_iter()
                    .filter(|id| !confirmed.contains(id.as_str()))
                    .collect(),
            )
        };

        log_checks!(
            self.config.verbosity,
            goal_id = %self.goal_id,
            generation,
            actors = actor_ids.len(),
            carried = carried.len(),
            confirmed = confirmed.len(),
            "Prepared scheduling pass"
        );
        Ok(PassInputs {
            analysis,
            profiles,
            availability,
            request,
            carried,
        })
    }

    /// Fail when a milestone the pass touches cannot finish by its deadline.
    fn check_deadlines(
        &self,
        analyzable: &[TaskId],
        scope: Option<&[TaskId]>,
    ) -> Result<(), PlannerError> {
        let touched: FxHashSet<&str> = match scope {
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.graph.get(id))
                .map(|t| t.milestone_id.as_str())
                .collect(),
            None => self.milestones.keys().map(String::as_str).collect(),
        };
        for milestone in self.milestones.values() {
            let Some(deadline_hours) = milestone.deadline_hours else {
                continue;
            };
            if !touched.contains(milestone.id.as_str()) {
                continue;
            }
            let ids: Vec<TaskId> = analyzable
                .iter()
                .filter(|id| {
                    self.graph
                        .get(id)
                        .map_or(false, |t| t.milestone_id == milestone.id)
                })
                .cloned()
                .collect();
            analyze_with(
                &self.graph.subgraph(&ids)?,
                &AnalysisOptions {
                    deadline_hours: Some(deadline_hours),
                    tie_break: self.config.tie_break,
                },
            )?;
        }
        Ok(())
    }

    /// Record a pass as a new generation: splits, statuses, blocks, conflicts.
    fn commit(
        &mut self,
        inputs: &PassInputs,
        outcome: ScheduleOutcome,
    ) -> Result<(u32, Vec<ScheduledBlock>, Vec<Conflict>, BTreeMap<ActorId, f64>), PlannerError> {
        let generation = outcome.generation;
        let mut blocks = inputs.carried.clone();
        blocks.extend(outcome.blocks.iter().cloned());

        let available = available_hours_by_actor(
            &inputs.profiles,
            &inputs.availability,
            &inputs.request.window,
        );
        let util = utilization(&booked_by_actor(&blocks), &available);
        let conflicts = ConflictDetector::new(
            &self.graph,
            self.config.utilization_ceiling,
            self.config.verbosity,
        )
        .detect(&blocks, &util);

        // Fragments follow their parent's current assignment and status.
        for (parent_id, fragments) in &outcome.splits {
            let Some(parent) = self.graph.get(parent_id) else {
                continue;
            };
            let owner = parent.assigned_actor.clone();
            let status = match parent.status {
                TaskStatus::Pending => TaskStatus::Scheduled,
                other => other,
            };
            let fragments = fragments
                .iter()
                .cloned()
                .map(|mut fragment| {
                    fragment.assigned_actor = owner.clone();
                    fragment.status = status;
                    fragment
                })
                .collect();
            self.graph.record_split(parent_id, fragments)?;
        }
        for task_id in outcome.placements.keys() {
            if let Some(task) = self.graph.get_mut(task_id) {
                if task.status == TaskStatus::Pending {
                    task.status = TaskStatus::Scheduled;
                }
            }
        }

        let mut ledger = outcome.states;
        for block in &inputs.carried {
            let root = block.root_task_id();
            ledger.carry(root, self.ledger.get(root));
        }
        self.history.push(generation, blocks.clone());
        self.conflicts.record(generation, conflicts.clone());
        self.ledger = ledger;

        log_changes!(
            self.config.verbosity,
            goal_id = %self.goal_id,
            generation,
            blocks = blocks.len(),
            unplaced = outcome.unplaced.len(),
            conflicts = conflicts.len(),
            "Committed schedule generation"
        );
        Ok((generation, blocks, conflicts, util))
    }
}

fn booked_by_actor(blocks: &[ScheduledBlock]) -> BTreeMap<ActorId, f64> {
    let mut booked: BTreeMap<ActorId, f64> = BTreeMap::new();
    for block in blocks {
        *booked.entry(block.actor_id.clone()).or_insert(0.0) += block.hours();
    }
    booked
}

/// Span and actor of each task that already has blocks.
fn fixed_placements(blocks: &[ScheduledBlock]) -> BTreeMap<TaskId, TaskPlacement> {
    let mut fixed: BTreeMap<TaskId, TaskPlacement> = BTreeMap::new();
    for block in blocks {
        let entry = fixed
            .entry(block.root_task_id().to_string())
            .or_insert_with(|| TaskPlacement {
                actor_id: Some(block.actor_id.clone()),
                start: block.start,
                end: block.end,
                fragments: 0,
            });
        entry.start = entry.start.min(block.start);
        entry.end = entry.end.max(block.end);
        if block.parent_task_id.is_some() {
            entry.fragments += 1;
        }
    }
    fixed
}
