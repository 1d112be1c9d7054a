//! Core slot scheduler implementation.

use chrono::NaiveDateTime;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::capacity::{available_intervals, PlanningWindow};
use crate::config::PlannerConfig;
use crate::critical_path::CriticalPathResult;
use crate::graph::TaskGraph;
use crate::models::{
    hours_between, hours_to_duration, ActorId, CapacityProfile, ScheduledBlock, Task, TaskId,
    TaskStatus, TimeSlot,
};
use crate::{log_changes, log_checks, log_debug};

use super::resource_schedule::ActorSchedule;
use super::scoring::{dependency_urgency, preference_match, priority_norm, slot_score, SlotFit};
use super::splitting::{chunk_hours, split_task};
use super::state::{PlacementLedger, PlacementState};

const SCORE_EPSILON: f64 = 1e-12;

/// Why a task could not be placed in this pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnplacedReason {
    /// The task has no duration estimate yet
    MissingEstimate,
    /// A predecessor is neither done nor placed
    PredecessorUnplaced { predecessor: TaskId },
    /// The assigned actor has no capacity profile, or there are no actors
    NoEligibleActor { actor_id: Option<ActorId> },
    /// Free time exists but no contiguous slot meets the focus minimum
    FocusBlockUnsatisfied,
    /// No free time left in the planning window
    NoSlotInWindow,
}

impl fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEstimate => write!(f, "no duration estimate"),
            Self::PredecessorUnplaced { predecessor } => {
                write!(f, "predecessor {} is not placed", predecessor)
            }
            Self::NoEligibleActor { actor_id: Some(a) } => {
                write!(f, "actor {} has no capacity profile", a)
            }
            Self::NoEligibleActor { actor_id: None } => write!(f, "no actors available"),
            Self::FocusBlockUnsatisfied => {
                write!(f, "no free slot satisfies the minimum focus block")
            }
            Self::NoSlotInWindow => write!(f, "no free slot in the planning window"),
        }
    }
}

/// A task left out of the schedule, with the reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unplaced {
    pub task_id: TaskId,
    pub reason: UnplacedReason,
}

/// Where a schedulable task landed: first start to last end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPlacement {
    /// `None` for zero-duration tasks, which occupy no one's time.
    pub actor_id: Option<ActorId>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub fragments: usize,
}

/// Inputs of one placement pass besides the graph and calendars.
#[derive(Clone, Debug)]
pub struct ScheduleRequest {
    pub window: PlanningWindow,
    /// Restrict the pass to these tasks; `None` places every open task.
    pub task_ids: Option<Vec<TaskId>>,
    /// Actor pins that take precedence over a task's own assignment.
    pub actor_overrides: BTreeMap<TaskId, ActorId>,
    /// Placements of tasks outside this pass that successors must respect.
    pub fixed: BTreeMap<TaskId, TaskPlacement>,
    /// Blocks already on calendars that this pass must keep clear of.
    pub reserved: Vec<ScheduledBlock>,
    pub generation: u32,
}

impl ScheduleRequest {
    pub fn new(window: PlanningWindow, generation: u32) -> Self {
        Self {
            window,
            task_ids: None,
            actor_overrides: BTreeMap::new(),
            fixed: BTreeMap::new(),
            reserved: Vec::new(),
            generation,
        }
    }
}

/// Result of one placement pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    pub generation: u32,
    /// Blocks in placement order.
    pub blocks: Vec<ScheduledBlock>,
    pub unplaced: Vec<Unplaced>,
    pub placements: BTreeMap<TaskId, TaskPlacement>,
    /// Fragments created by splitting, keyed by parent task.
    pub splits: BTreeMap<TaskId, Vec<Task>>,
    pub states: PlacementLedger,
}

impl ScheduleOutcome {
    pub fn actor_of(&self, task_id: &str) -> Option<&str> {
        self.placements
            .get(task_id)
            .and_then(|p| p.actor_id.as_deref())
    }

    /// Hours booked per actor by this pass.
    pub fn booked_hours(&self) -> BTreeMap<ActorId, f64> {
        let mut booked: BTreeMap<ActorId, f64> = BTreeMap::new();
        for block in &self.blocks {
            *booked.entry(block.actor_id.clone()).or_insert(0.0) += block.hours();
        }
        booked
    }
}

/// Placement of every block of one task on one actor.
struct ActorPlan {
    actor_id: ActorId,
    blocks: Vec<(NaiveDateTime, NaiveDateTime)>,
    /// Score of the first block; plans compete on it.
    score: f64,
    schedule: ActorSchedule,
}

/// Task-level terms of the slot score, constant across candidate slots.
#[derive(Clone, Copy)]
struct TaskTerms {
    priority: f64,
    urgency: f64,
}

/// Places tasks into free calendar slots, in dependency order.
///
/// Each task gets the highest-scoring slot on an eligible actor; ties go to the
/// earliest slot start, then the actor ID. Tasks longer than the actor's block
/// size are split into fragments placed on the same actor. The pass is a pure
/// function of its inputs: running it twice yields identical blocks.
pub struct SlotScheduler<'a> {
    graph: &'a TaskGraph,
    analysis: &'a CriticalPathResult,
    profiles: &'a BTreeMap<ActorId, CapacityProfile>,
    availability: &'a [TimeSlot],
    config: &'a PlannerConfig,
}

impl<'a> SlotScheduler<'a> {
    pub fn new(
        graph: &'a TaskGraph,
        analysis: &'a CriticalPathResult,
        profiles: &'a BTreeMap<ActorId, CapacityProfile>,
        availability: &'a [TimeSlot],
        config: &'a PlannerConfig,
    ) -> Self {
        Self {
            graph,
            analysis,
            profiles,
            availability,
            config,
        }
    }

    pub fn schedule(&self, request: &ScheduleRequest) -> ScheduleOutcome {
        let verbosity = self.config.verbosity;
        let mut actors = self.build_actor_schedules(request);
        let mut outcome = ScheduleOutcome {
            generation: request.generation,
            ..ScheduleOutcome::default()
        };

        let scope: Option<FxHashSet<&str>> = request
            .task_ids
            .as_ref()
            .map(|ids| ids.iter().map(String::as_str).collect());
        let order: Vec<TaskId> = self
            .graph
            .topological_order()
            .into_iter()
            .filter(|id| scope.as_ref().map_or(true, |s| s.contains(id.as_str())))
            .collect();

        let task_count = self.analysis.task_timings.len().max(1);
        let avg_duration = self.analysis.total_work / task_count as f64;

        log_checks!(
            verbosity,
            tasks = order.len(),
            actors = actors.len(),
            generation = request.generation,
            "Starting placement pass"
        );

        for task_id in &order {
            let Some(task) = self.graph.get(task_id) else {
                continue;
            };
            if task.status == TaskStatus::Done {
                continue;
            }

            match self.place_task(task, request, &actors, &outcome.placements, avg_duration) {
                Ok(Some(plan)) => self.commit(task, plan, request.generation, &mut actors, &mut outcome),
                Ok(None) => {
                    // Zero-duration task: pinned to its earliest start, no block
                    if let Ok((start, finish)) = self.earliest_bounds(task, request, &outcome.placements) {
                        let at = finish.map_or(start, |f| start.max(f));
                        outcome.placements.insert(
                            task.id.clone(),
                            TaskPlacement {
                                actor_id: None,
                                start: at,
                                end: at,
                                fragments: 0,
                            },
                        );
                        outcome.states.transition(&task.id, PlacementState::Placed);
                    }
                }
                Err(reason) => {
                    log_checks!(verbosity, task_id = %task.id, %reason, "Task left unplaced");
                    outcome.unplaced.push(Unplaced {
                        task_id: task.id.clone(),
                        reason,
                    });
                }
            }
        }

        log_changes!(
            verbosity,
            blocks = outcome.blocks.len(),
            unplaced = outcome.unplaced.len(),
            generation = request.generation,
            "Placement pass finished"
        );
        outcome
    }

    fn build_actor_schedules(&self, request: &ScheduleRequest) -> BTreeMap<ActorId, ActorSchedule> {
        self.profiles
            .iter()
            .map(|(actor_id, profile)| {
                let free = available_intervals(profile, self.availability, &request.window);
                let mut schedule =
                    ActorSchedule::new(profile, free, self.config.default_max_block_hours);
                for block in request.reserved.iter().filter(|b| &b.actor_id == actor_id) {
                    schedule.book(block.start, block.end);
                }
                (actor_id.clone(), schedule)
            })
            .collect()
    }

    /// Earliest start, and the earliest finish if a finish-anchored dependency applies.
    fn earliest_bounds(
        &self,
        task: &Task,
        request: &ScheduleRequest,
        placements: &BTreeMap<TaskId, TaskPlacement>,
    ) -> Result<(NaiveDateTime, Option<NaiveDateTime>), UnplacedReason> {
        let mut start_bound = request.window.start;
        let mut finish_bound: Option<NaiveDateTime> = None;

        for dep in self.graph.predecessors(&task.id) {
            let done = self
                .graph
                .get(&dep.predecessor)
                .map_or(false, |p| p.status == TaskStatus::Done);
            if done {
                continue;
            }
            let span = placements
                .get(&dep.predecessor)
                .or_else(|| request.fixed.get(&dep.predecessor))
                .ok_or_else(|| UnplacedReason::PredecessorUnplaced {
                    predecessor: dep.predecessor.clone(),
                })?;

            let anchor = if dep.kind.anchors_on_finish() {
                span.end
            } else {
                span.start
            };
            let bound = anchor + hours_to_duration(dep.lag_hours);
            if dep.kind.constrains_finish() {
                finish_bound = Some(finish_bound.map_or(bound, |f| f.max(bound)));
            } else {
                start_bound = start_bound.max(bound);
            }
        }
        Ok((start_bound, finish_bound))
    }

    fn candidate_actors(
        &self,
        task: &Task,
        request: &ScheduleRequest,
        actors: &BTreeMap<ActorId, ActorSchedule>,
    ) -> Result<Vec<ActorId>, UnplacedReason> {
        let pinned = request
            .actor_overrides
            .get(&task.id)
            .or(task.assigned_actor.as_ref());
        match pinned {
            Some(actor_id) if actors.contains_key(actor_id) => Ok(vec![actor_id.clone()]),
            Some(actor_id) => Err(UnplacedReason::NoEligibleActor {
                actor_id: Some(actor_id.clone()),
            }),
            None if actors.is_empty() => Err(UnplacedReason::NoEligibleActor { actor_id: None }),
            None => Ok(actors.keys().cloned().collect()),
        }
    }

    /// Best plan for a task across its candidate actors; `None` for zero-duration tasks.
    fn place_task(
        &self,
        task: &Task,
        request: &ScheduleRequest,
        actors: &BTreeMap<ActorId, ActorSchedule>,
        placements: &BTreeMap<TaskId, TaskPlacement>,
        avg_duration: f64,
    ) -> Result<Option<ActorPlan>, UnplacedReason> {
        let duration = task.estimated_hours.ok_or(UnplacedReason::MissingEstimate)?;
        let (start_bound, finish_bound) = self.earliest_bounds(task, request, placements)?;
        if duration <= 0.0 {
            return Ok(None);
        }
        let candidates = self.candidate_actors(task, request, actors)?;

        let slack = self.analysis.relative_slack(&task.id).unwrap_or(0.0);
        let terms = TaskTerms {
            priority: priority_norm(task.priority),
            urgency: dependency_urgency(slack, self.config.urgency_k, avg_duration),
        };

        let mut best: Option<ActorPlan> = None;
        let mut focus_blocked = false;
        for actor_id in candidates {
            let Some(schedule) = actors.get(&actor_id) else {
                continue;
            };
            match self.plan_on_actor(task, duration, schedule, start_bound, finish_bound, terms) {
                Ok(plan) => {
                    let better = match &best {
                        None => true,
                        Some(current) => {
                            plan.score > current.score + SCORE_EPSILON
                                || ((plan.score - current.score).abs() <= SCORE_EPSILON
                                    && plan.blocks[0].0 < current.blocks[0].0)
                        }
                    };
                    if better {
                        best = Some(plan);
                    }
                }
                Err(UnplacedReason::FocusBlockUnsatisfied) => focus_blocked = true,
                Err(_) => {}
            }
        }

        match best {
            Some(plan) => Ok(Some(plan)),
            None if focus_blocked => Err(UnplacedReason::FocusBlockUnsatisfied),
            None => Err(UnplacedReason::NoSlotInWindow),
        }
    }

    /// Place every block of a task on one actor, working on a copy of its schedule.
    fn plan_on_actor(
        &self,
        task: &Task,
        duration: f64,
        schedule: &ActorSchedule,
        start_bound: NaiveDateTime,
        finish_bound: Option<NaiveDateTime>,
        terms: TaskTerms,
    ) -> Result<ActorPlan, UnplacedReason> {
        let chunks = chunk_hours(duration, schedule.max_block_hours);
        let last = chunks.len() - 1;
        let mut sim = schedule.clone();
        let mut blocks = Vec::with_capacity(chunks.len());
        let mut cursor = start_bound;
        let mut previous_end: Option<NaiveDateTime> = None;
        let mut first_score = 0.0;

        for (i, &hours) in chunks.iter().enumerate() {
            let mut not_before = cursor;
            if i == last {
                if let Some(finish) = finish_bound {
                    not_before = not_before.max(finish - hours_to_duration(hours));
                }
            }
            let (start, score) = self.best_slot(task, &sim, not_before, hours, previous_end, terms)?;
            let end = start + hours_to_duration(hours);
            sim.book(start, end);
            blocks.push((start, end));
            if i == 0 {
                first_score = score;
            }
            previous_end = Some(end);
            cursor = end;
        }

        Ok(ActorPlan {
            actor_id: schedule.actor_id.clone(),
            blocks,
            score: first_score,
            schedule: sim,
        })
    }

    /// Highest-scoring open slot for a block of `hours`; ties go to the earliest start.
    fn best_slot(
        &self,
        task: &Task,
        schedule: &ActorSchedule,
        not_before: NaiveDateTime,
        hours: f64,
        previous_end: Option<NaiveDateTime>,
        terms: TaskTerms,
    ) -> Result<(NaiveDateTime, f64), UnplacedReason> {
        let verbosity = self.config.verbosity;
        let mut best: Option<(NaiveDateTime, f64)> = None;
        let mut capacity_found = false;

        for (seg_start, seg_end) in schedule.open_segments(not_before) {
            let seg_hours = hours_between(seg_start, seg_end);
            let usable = seg_hours.min(schedule.remaining_on(seg_start.date()));
            if usable + 1e-9 < hours {
                continue;
            }
            capacity_found = true;
            if !schedule.satisfies_focus(seg_hours, hours) {
                continue;
            }

            let fit = SlotFit {
                earliest: not_before,
                slot_start: seg_start,
                slot_hours: seg_hours,
                block_hours: hours,
                previous_end,
            };
            let score = slot_score(
                &self.config.weights,
                terms.priority,
                terms.urgency,
                preference_match(&fit),
            );
            log_debug!(
                verbosity,
                task_id = %task.id,
                actor_id = %schedule.actor_id,
                slot_start = %seg_start,
                score,
                "Scored slot"
            );

            let better = match best {
                None => true,
                Some((best_start, best_score)) => {
                    score > best_score + SCORE_EPSILON
                        || ((score - best_score).abs() <= SCORE_EPSILON && seg_start < best_start)
                }
            };
            if better {
                best = Some((seg_start, score));
            }
        }

        match best {
            Some(found) => Ok(found),
            None if capacity_found => Err(UnplacedReason::FocusBlockUnsatisfied),
            None => Err(UnplacedReason::NoSlotInWindow),
        }
    }

    fn commit(
        &self,
        task: &Task,
        plan: ActorPlan,
        generation: u32,
        actors: &mut BTreeMap<ActorId, ActorSchedule>,
        outcome: &mut ScheduleOutcome,
    ) {
        let verbosity = self.config.verbosity;
        let fragments = if plan.blocks.len() > 1 {
            split_task(task, plan.schedule.max_block_hours)
        } else {
            Vec::new()
        };

        for (i, &(start, end)) in plan.blocks.iter().enumerate() {
            let (block_id, parent) = match fragments.get(i) {
                Some(fragment) => (fragment.id.clone(), Some(task.id.clone())),
                None => (task.id.clone(), None),
            };
            outcome.blocks.push(ScheduledBlock {
                task_id: block_id,
                parent_task_id: parent,
                actor_id: plan.actor_id.clone(),
                start,
                end,
                is_focus_time: plan.schedule.is_focus_block(hours_between(start, end)),
                generation,
            });
        }

        let (first, last) = match (plan.blocks.first(), plan.blocks.last()) {
            (Some(first), Some(last)) => (first.0, last.1),
            _ => return,
        };
        outcome.states.transition(&task.id, PlacementState::Placed);
        if !fragments.is_empty() {
            outcome.states.transition(&task.id, PlacementState::Split);
        }
        outcome.placements.insert(
            task.id.clone(),
            TaskPlacement {
                actor_id: Some(plan.actor_id.clone()),
                start: first,
                end: last,
                fragments: plan.blocks.len(),
            },
        );

        log_changes!(
            verbosity,
            task_id = %task.id,
            actor_id = %plan.actor_id,
            start = %first,
            end = %last,
            fragments = plan.blocks.len(),
            "Placed task"
        );

        if !fragments.is_empty() {
            outcome.splits.insert(task.id.clone(), fragments);
        }
        actors.insert(plan.actor_id, plan.schedule);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::open_calendar;
    use crate::critical_path::analyze;
    use crate::models::{Dependency, DependencyKind};
    use chrono::NaiveDate;

    fn dt(day: u32, hour: u32) -> NaiveDateTime {
        // March 2025: the 3rd is a Monday
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn make_task(id: &str, hours: f64) -> Task {
        Task::new(id, id.to_uppercase(), "m1").with_estimate(hours)
    }

    fn profiles(actors: &[&str]) -> BTreeMap<ActorId, CapacityProfile> {
        actors
            .iter()
            .map(|a| (a.to_string(), CapacityProfile::standard(*a)))
            .collect()
    }

    fn calendars(actors: &[&str], window: &PlanningWindow) -> Vec<TimeSlot> {
        actors.iter().flat_map(|a| open_calendar(a, window)).collect()
    }

    fn two_days() -> PlanningWindow {
        PlanningWindow::new(dt(3, 0), dt(5, 0))
    }

    fn run(
        graph: &TaskGraph,
        profiles: &BTreeMap<ActorId, CapacityProfile>,
        slots: &[TimeSlot],
        request: &ScheduleRequest,
    ) -> ScheduleOutcome {
        let analysis = analyze(graph).unwrap_or_default();
        let config = PlannerConfig::default();
        SlotScheduler::new(graph, &analysis, profiles, slots, &config).schedule(request)
    }

    fn block<'o>(outcome: &'o ScheduleOutcome, task_id: &str) -> &'o ScheduledBlock {
        outcome
            .blocks
            .iter()
            .find(|b| b.task_id == task_id)
            .unwrap()
    }

    #[test]
    fn test_simple_sequential_tasks() {
        let mut graph = TaskGraph::new();
        graph.add_task(make_task("a", 2.0).assigned_to("ann")).unwrap();
        graph.add_task(make_task("b", 2.0).assigned_to("ann")).unwrap();
        graph.add_edge(&Dependency::finish_to_start("a", "b")).unwrap();

        let window = two_days();
        let outcome = run(
            &graph,
            &profiles(&["ann"]),
            &calendars(&["ann"], &window),
            &ScheduleRequest::new(window, 1),
        );

        assert!(outcome.unplaced.is_empty());
        assert_eq!((block(&outcome, "a").start, block(&outcome, "a").end), (dt(3, 9), dt(3, 11)));
        assert_eq!((block(&outcome, "b").start, block(&outcome, "b").end), (dt(3, 11), dt(3, 13)));
        assert!(outcome.blocks.iter().all(|b| b.generation == 1));
        assert_eq!(outcome.states.get("a"), PlacementState::Placed);
    }

    #[test]
    fn test_long_task_split_into_adjacent_fragments() {
        let mut graph = TaskGraph::new();
        graph.add_task(make_task("t", 6.0).assigned_to("ann")).unwrap();

        let window = two_days();
        let outcome = run(
            &graph,
            &profiles(&["ann"]),
            &calendars(&["ann"], &window),
            &ScheduleRequest::new(window, 1),
        );

        let ids: Vec<&str> = outcome.blocks.iter().map(|b| b.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t#1", "t#2", "t#3"]);
        assert!(outcome
            .blocks
            .iter()
            .all(|b| b.parent_task_id.as_deref() == Some("t")));
        let total: f64 = outcome.blocks.iter().map(|b| b.hours()).sum();
        assert!((total - 6.0).abs() < 1e-9);
        assert_eq!(block(&outcome, "t#2").start, dt(3, 11));
        assert_eq!(block(&outcome, "t#3").end, dt(3, 15));

        assert_eq!(outcome.states.get("t"), PlacementState::Split);
        assert_eq!(outcome.splits["t"].len(), 3);
        assert_eq!(outcome.placements["t"].fragments, 3);
    }

    #[test]
    fn test_busy_time_and_daily_cap_respected() {
        let mut graph = TaskGraph::new();
        graph.add_task(make_task("t", 6.0).assigned_to("ann")).unwrap();

        let window = two_days();
        let mut people = profiles(&["ann"]);
        if let Some(p) = people.get_mut("ann") {
            p.hours_per_day = 4.0;
        }
        let mut slots = calendars(&["ann"], &window);
        slots.push(TimeSlot::busy("ann", dt(3, 9), dt(3, 10)));

        let outcome = run(&graph, &people, &slots, &ScheduleRequest::new(window, 1));

        assert_eq!(block(&outcome, "t#1").start, dt(3, 10));
        assert_eq!(block(&outcome, "t#2").start, dt(3, 12));
        // Monday is full at 4h, so the last fragment moves to Tuesday
        assert_eq!(block(&outcome, "t#3").start, dt(4, 9));
    }

    #[test]
    fn test_focus_block_minimum() {
        let mut graph = TaskGraph::new();
        graph.add_task(make_task("t", 1.0).assigned_to("ann")).unwrap();

        let mut people = profiles(&["ann"]);
        if let Some(p) = people.get_mut("ann") {
            p.min_focus_block_hours = 2.0;
        }
        let window = two_days();
        let mut slots = calendars(&["ann"], &window);
        // Monday leaves only 1h gaps at 9-10 and 16-17
        slots.push(TimeSlot::busy("ann", dt(3, 10), dt(3, 16)));

        let outcome = run(&graph, &people, &slots, &ScheduleRequest::new(window, 1));
        assert_eq!(block(&outcome, "t").start, dt(4, 9));
        assert!(!block(&outcome, "t").is_focus_time);

        let monday = PlanningWindow::new(dt(3, 0), dt(4, 0));
        let outcome = run(&graph, &people, &slots, &ScheduleRequest::new(monday, 1));
        assert_eq!(
            outcome.unplaced,
            vec![Unplaced {
                task_id: "t".to_string(),
                reason: UnplacedReason::FocusBlockUnsatisfied,
            }]
        );
    }

    #[test]
    fn test_unplaced_reasons_propagate() {
        let mut graph = TaskGraph::new();
        graph.add_task(Task::new("a", "A", "m1").assigned_to("ann")).unwrap();
        graph.add_task(make_task("b", 1.0).assigned_to("ann")).unwrap();
        graph.add_task(make_task("c", 1.0).assigned_to("zed")).unwrap();
        graph.add_edge(&Dependency::finish_to_start("a", "b")).unwrap();

        let window = two_days();
        let outcome = run(
            &graph,
            &profiles(&["ann"]),
            &calendars(&["ann"], &window),
            &ScheduleRequest::new(window, 1),
        );

        let reasons: BTreeMap<&str, &UnplacedReason> = outcome
            .unplaced
            .iter()
            .map(|u| (u.task_id.as_str(), &u.reason))
            .collect();
        assert_eq!(reasons["a"], &UnplacedReason::MissingEstimate);
        assert_eq!(
            reasons["b"],
            &UnplacedReason::PredecessorUnplaced {
                predecessor: "a".to_string()
            }
        );
        assert_eq!(
            reasons["c"],
            &UnplacedReason::NoEligibleActor {
                actor_id: Some("zed".to_string())
            }
        );
        assert!(outcome.blocks.is_empty());
    }

    #[test]
    fn test_unassigned_task_picks_free_actor() {
        let mut graph = TaskGraph::new();
        graph.add_task(make_task("x", 8.0).assigned_to("ann")).unwrap();
        graph.add_task(make_task("y", 2.0)).unwrap();

        let window = PlanningWindow::new(dt(3, 0), dt(4, 0));
        let outcome = run(
            &graph,
            &profiles(&["ann", "bob"]),
            &calendars(&["ann", "bob"], &window),
            &ScheduleRequest::new(window, 1),
        );

        assert_eq!(outcome.actor_of("x"), Some("ann"));
        assert_eq!(outcome.actor_of("y"), Some("bob"));
        assert_eq!(block(&outcome, "y").start, dt(3, 9));
    }

    #[test]
    fn test_actor_tie_goes_to_lowest_id() {
        let mut graph = TaskGraph::new();
        graph.add_task(make_task("y", 2.0)).unwrap();

        let window = two_days();
        let outcome = run(
            &graph,
            &profiles(&["bob", "ann"]),
            &calendars(&["ann", "bob"], &window),
            &ScheduleRequest::new(window, 1),
        );
        assert_eq!(outcome.actor_of("y"), Some("ann"));
    }

    #[test]
    fn test_dependency_kinds_and_lag() {
        let mut graph = TaskGraph::new();
        graph.add_task(make_task("a", 2.0).assigned_to("ann")).unwrap();
        graph.add_task(make_task("s", 1.0).assigned_to("bob")).unwrap();
        graph.add_task(make_task("f", 1.0).assigned_to("cat")).unwrap();
        graph
            .add_edge(&Dependency::new("a", "s", DependencyKind::StartToStart, 1.0))
            .unwrap();
        graph
            .add_edge(&Dependency::new("a", "f", DependencyKind::FinishToFinish, 2.0))
            .unwrap();

        let window = two_days();
        let actors = ["ann", "bob", "cat"];
        let outcome = run(
            &graph,
            &profiles(&actors),
            &calendars(&actors, &window),
            &ScheduleRequest::new(window, 1),
        );

        // a runs 9-11; s may start an hour after a starts
        assert_eq!(block(&outcome, "s").start, dt(3, 10));
        // f may finish no earlier than 2h after a finishes
        assert_eq!(block(&outcome, "f").end, dt(3, 13));
    }

    #[test]
    fn test_done_predecessor_does_not_block() {
        let mut graph = TaskGraph::new();
        graph
            .add_task(make_task("a", 4.0).with_status(TaskStatus::Done))
            .unwrap();
        graph.add_task(make_task("b", 1.0).assigned_to("ann")).unwrap();
        graph.add_edge(&Dependency::finish_to_start("a", "b")).unwrap();

        let window = two_days();
        let outcome = run(
            &graph,
            &profiles(&["ann"]),
            &calendars(&["ann"], &window),
            &ScheduleRequest::new(window, 1),
        );
        assert_eq!(outcome.blocks.len(), 1);
        assert_eq!(block(&outcome, "b").start, dt(3, 9));
    }

    #[test]
    fn test_scoped_pass_uses_fixed_and_reserved_work() {
        let mut graph = TaskGraph::new();
        graph.add_task(make_task("a", 2.0).assigned_to("ann")).unwrap();
        graph.add_task(make_task("b", 1.0).assigned_to("ann")).unwrap();
        graph.add_edge(&Dependency::finish_to_start("a", "b")).unwrap();

        let window = two_days();
        let people = profiles(&["ann"]);
        let slots = calendars(&["ann"], &window);

        let mut request = ScheduleRequest::new(window, 2);
        request.task_ids = Some(vec!["b".to_string()]);
        let outcome = run(&graph, &people, &slots, &request);
        assert_eq!(outcome.unplaced[0].task_id, "b");

        request.fixed.insert(
            "a".to_string(),
            TaskPlacement {
                actor_id: Some("ann".to_string()),
                start: dt(3, 9),
                end: dt(3, 11),
                fragments: 1,
            },
        );
        request.reserved.push(ScheduledBlock {
            task_id: "a".to_string(),
            parent_task_id: None,
            actor_id: "ann".to_string(),
            start: dt(3, 9),
            end: dt(3, 12),
            is_focus_time: false,
            generation: 1,
        });
        let outcome = run(&graph, &people, &slots, &request);
        assert_eq!(outcome.blocks.len(), 1);
        assert_eq!(block(&outcome, "b").start, dt(3, 12));
    }

    #[test]
    fn test_placement_is_idempotent() {
        let mut graph = TaskGraph::new();
        for (id, hours) in [("a", 3.0), ("b", 2.5), ("c", 1.0), ("d", 4.0)] {
            graph.add_task(make_task(id, hours)).unwrap();
        }
        graph.add_edge(&Dependency::finish_to_start("a", "c")).unwrap();
        graph.add_edge(&Dependency::finish_to_start("b", "d")).unwrap();

        let window = two_days();
        let people = profiles(&["ann", "bob"]);
        let slots = calendars(&["ann", "bob"], &window);
        let request = ScheduleRequest::new(window, 1);

        let first = run(&graph, &people, &slots, &request);
        let second = run(&graph, &people, &slots, &request);
        assert_eq!(first, second);
        assert!(first.unplaced.is_empty());
    }

    #[test]
    fn test_blocks_never_overlap_per_actor() {
        let mut graph = TaskGraph::new();
        for i in 0..8 {
            graph.add_task(make_task(&format!("t{}", i), 1.5)).unwrap();
        }
        let window = two_days();
        let people = profiles(&["ann", "bob"]);
        let slots = calendars(&["ann", "bob"], &window);
        let outcome = run(&graph, &people, &slots, &ScheduleRequest::new(window, 1));

        for (i, a) in outcome.blocks.iter().enumerate() {
            for b in &outcome.blocks[i + 1..] {
                assert!(a.actor_id != b.actor_id || !a.overlaps(b), "{:?} / {:?}", a, b);
            }
        }
    }
}
