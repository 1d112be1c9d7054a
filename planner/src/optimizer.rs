//! Capacity rebalancing across actors.
//!
//! After placement, actors above the utilization ceiling hand their least
//! critical tasks (critical-path work only as a last resort) to the least
//! loaded compatible actor, one move at a time,
//! until nobody is overallocated or no move helps. Every trial move re-runs
//! the deterministic placement pass with the task pinned to its new actor.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::capacity::{available_hours_by_actor, utilization};
use crate::config::PlannerConfig;
use crate::conflicts::ConflictDetector;
use crate::critical_path::{effective_priorities, CriticalPathResult};
use crate::graph::TaskGraph;
use crate::models::{ActorId, CapacityProfile, Conflict, Task, TaskId, TaskStatus, TimeSlot};
use crate::scheduler::{ScheduleOutcome, ScheduleRequest, SlotScheduler};
use crate::{log_changes, log_checks};

/// Caller-supplied skill check: may `actor_id` take over `task`?
pub trait SkillMatcher {
    fn can_take(&self, task: &Task, actor_id: &str) -> bool;
}

impl<F> SkillMatcher for F
where
    F: Fn(&Task, &str) -> bool,
{
    fn can_take(&self, task: &Task, actor_id: &str) -> bool {
        self(task, actor_id)
    }
}

/// Every actor can take every task.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnySkill;

impl SkillMatcher for AnySkill {
    fn can_take(&self, _task: &Task, _actor_id: &str) -> bool {
        true
    }
}

/// One accepted move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    pub task_id: TaskId,
    pub from: ActorId,
    pub to: ActorId,
}

/// The optimizer stopped with actors still above the ceiling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationIncomplete {
    pub iterations: usize,
    /// Capacity breaches left in the best-found assignment.
    pub residual: Vec<Conflict>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub reassignments: Vec<Reassignment>,
    pub utilization_before: BTreeMap<ActorId, f64>,
    pub utilization_after: BTreeMap<ActorId, f64>,
    /// Placement pass of the best-found assignment.
    pub schedule: ScheduleOutcome,
    /// Actor pins that produced `schedule`.
    pub actor_overrides: BTreeMap<TaskId, ActorId>,
    pub iterations: usize,
    pub incomplete: Option<OptimizationIncomplete>,
}

/// Greedy reassignment of tasks away from overallocated actors.
pub struct CapacityOptimizer<'a> {
    graph: &'a TaskGraph,
    analysis: &'a CriticalPathResult,
    profiles: &'a BTreeMap<ActorId, CapacityProfile>,
    availability: &'a [TimeSlot],
    config: &'a PlannerConfig,
    skills: &'a dyn SkillMatcher,
}

impl<'a> CapacityOptimizer<'a> {
    pub fn new(
        graph: &'a TaskGraph,
        analysis: &'a CriticalPathResult,
        profiles: &'a BTreeMap<ActorId, CapacityProfile>,
        availability: &'a [TimeSlot],
        config: &'a PlannerConfig,
        skills: &'a dyn SkillMatcher,
    ) -> Self {
        Self {
            graph,
            analysis,
            profiles,
            availability,
            config,
            skills,
        }
    }

    /// Rebalance `initial`, which must be the outcome of `request`.
    pub fn optimize(&self, request: &ScheduleRequest, initial: ScheduleOutcome) -> OptimizationOutcome {
        let verbosity = self.config.verbosity;
        let ceiling = self.config.utilization_ceiling;
        let available = available_hours_by_actor(self.profiles, self.availability, &request.window);
        let scheduler = SlotScheduler::new(
            self.graph,
            self.analysis,
            self.profiles,
            self.availability,
            self.config,
        );
        let priorities = effective_priorities(self.graph);
        let cap = self.config.iteration_cap(self.graph.len());

        let utilization_before = utilization(&initial.booked_hours(), &available);
        let mut current = initial;
        let mut current_util = utilization_before.clone();
        let mut overrides = request.actor_overrides.clone();
        let mut reassignments = Vec::new();
        let mut iterations = 0;

        'search: loop {
            let mut overloaded: Vec<(ActorId, f64)> = current_util
                .iter()
                .filter(|&(_, &u)| u > ceiling + 1e-9)
                .map(|(a, &u)| (a.clone(), u))
                .collect();
            if overloaded.is_empty() {
                break;
            }
            overloaded.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });

            for (actor_id, _) in &overloaded {
                for task_id in self.movable_tasks(&current, actor_id, &priorities) {
                    let Some(task) = self.graph.get(&task_id) else {
                        continue;
                    };
                    for target in self.targets(task, actor_id, &current_util, ceiling) {
                        if iterations >= cap {
                            log_checks!(verbosity, iterations, "Optimizer hit iteration cap");
                            break 'search;
                        }
                        iterations += 1;

                        let mut trial_request = request.clone();
                        trial_request.actor_overrides = overrides.clone();
                        trial_request
                            .actor_overrides
                            .insert(task_id.clone(), target.clone());
                        let trial = scheduler.schedule(&trial_request);
                        let trial_util = utilization(&trial.booked_hours(), &available);

                        if self.accept(&task_id, actor_id, &target, &current, &current_util, &trial, &trial_util) {
                            log_changes!(
                                verbosity,
                                task_id = %task_id,
                                from = %actor_id,
                                to = %target,
                                "Reassigned task"
                            );
                            reassignments.push(Reassignment {
                                task_id: task_id.clone(),
                                from: actor_id.clone(),
                                to: target.clone(),
                            });
                            overrides = trial_request.actor_overrides;
                            current = trial;
                            current_util = trial_util;
                            continue 'search;
                        }
                        log_checks!(
                            verbosity,
                            task_id = %task_id,
                            target = %target,
                            "Rejected reassignment"
                        );
                    }
                }
            }
            // No move helped
            break;
        }

        let detector = ConflictDetector::new(self.graph, ceiling, verbosity);
        let residual = detector.capacity_breaches(&current.blocks, &current_util);
        let incomplete = (!residual.is_empty()).then(|| OptimizationIncomplete {
            iterations,
            residual,
        });

        OptimizationOutcome {
            reassignments,
            utilization_before,
            utilization_after: current_util,
            schedule: current,
            actor_overrides: overrides,
            iterations,
            incomplete,
        }
    }

    /// Tasks on `actor_id` that may move, least critical first.
    ///
    /// In-progress work never moves. Critical-path tasks are candidates only
    /// after every non-critical one. Within each group: effective priority
    /// (ascending), then slack (descending), then ID.
    fn movable_tasks(
        &self,
        outcome: &ScheduleOutcome,
        actor_id: &str,
        priorities: &FxHashMap<TaskId, i32>,
    ) -> Vec<TaskId> {
        let mut candidates: Vec<(bool, i32, f64, &TaskId)> = outcome
            .placements
            .iter()
            .filter(|(_, p)| p.actor_id.as_deref() == Some(actor_id))
            .filter_map(|(id, _)| self.graph.get(id).map(|t| (id, t)))
            .filter(|(_, t)| t.status != TaskStatus::InProgress)
            .map(|(id, t)| {
                let critical = self.analysis.is_critical(id);
                let priority = priorities.get(id).copied().unwrap_or(t.priority);
                let slack = self.analysis.slack(id).unwrap_or(0.0);
                (critical, priority, slack, id)
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.cmp(&b.1))
                .then(b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal))
                .then(a.3.cmp(b.3))
        });
        candidates.into_iter().map(|(_, _, _, id)| id.clone()).collect()
    }

    /// Compatible actors below the ceiling, least utilized first.
    fn targets(
        &self,
        task: &Task,
        from: &str,
        util: &BTreeMap<ActorId, f64>,
        ceiling: f64,
    ) -> Vec<ActorId> {
        let mut targets: Vec<(&ActorId, f64)> = util
            .iter()
            .filter(|(a, _)| a.as_str() != from)
            .filter(|&(_, &u)| u < ceiling)
            .filter(|(a, _)| self.skills.can_take(task, a))
            .map(|(a, &u)| (a, u))
            .collect();
        targets.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        targets.into_iter().map(|(a, _)| a.clone()).collect()
    }

    /// A move is kept when the task lands on the target, nothing else drops
    /// out of the schedule, the source gets lighter and the target stays
    /// within the ceiling.
    #[allow(clippy::too_many_arguments)]
    fn accept(
        &self,
        task_id: &str,
        from: &str,
        to: &str,
        current: &ScheduleOutcome,
        current_util: &BTreeMap<ActorId, f64>,
        trial: &ScheduleOutcome,
        trial_util: &BTreeMap<ActorId, f64>,
    ) -> bool {
        let landed = trial.actor_of(task_id) == Some(to);
        let no_new_shortfall = trial.unplaced.len() <= current.unplaced.len();
        let source_before = current_util.get(from).copied().unwrap_or(0.0);
        let source_after = trial_util.get(from).copied().unwrap_or(0.0);
        let target_after = trial_util.get(to).copied().unwrap_or(0.0);
        landed
            && no_new_shortfall
            && source_after < source_before
            && target_after <= self.config.utilization_ceiling + 1e-9
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::{open_calendar, PlanningWindow};
    use crate::critical_path::analyze;
    use chrono::{NaiveDate, NaiveDateTime};

    fn dt(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn make_task(id: &str, hours: f64, priority: i32, actor: &str) -> Task {
        Task::new(id, id, "m1")
            .with_estimate(hours)
            .with_priority(priority)
            .assigned_to(actor)
    }

    struct Fixture {
        graph: TaskGraph,
        profiles: BTreeMap<ActorId, CapacityProfile>,
        slots: Vec<TimeSlot>,
        request: ScheduleRequest,
        config: PlannerConfig,
    }

    impl Fixture {
        /// One Monday, 8h each: ann at 95% with three low-priority tasks, bob at 40%.
        fn overloaded() -> Self {
            let mut graph = TaskGraph::new();
            graph.add_task(make_task("a1", 2.6, 10, "ann")).unwrap();
            graph.add_task(make_task("a2", 2.5, 10, "ann")).unwrap();
            graph.add_task(make_task("a3", 2.5, 10, "ann")).unwrap();
            graph.add_task(make_task("b1", 3.2, 90, "bob")).unwrap();

            let window = PlanningWindow::new(dt(3, 0), dt(4, 0));
            let profiles = ["ann", "bob"]
                .iter()
                .map(|a| (a.to_string(), CapacityProfile::standard(*a)))
                .collect();
            let slots = ["ann", "bob"]
                .iter()
                .flat_map(|a| open_calendar(a, &window))
                .collect();
            Self {
                graph,
                profiles,
                slots,
                request: ScheduleRequest::new(window, 1),
                config: PlannerConfig::default(),
            }
        }

        fn run(&self, skills: &dyn SkillMatcher) -> OptimizationOutcome {
            let analysis = analyze(&self.graph).unwrap();
            let initial = SlotScheduler::new(
                &self.graph,
                &analysis,
                &self.profiles,
                &self.slots,
                &self.config,
            )
            .schedule(&self.request);
            CapacityOptimizer::new(
                &self.graph,
                &analysis,
                &self.profiles,
                &self.slots,
                &self.config,
                skills,
            )
            .optimize(&self.request, initial)
        }
    }

    #[test]
    fn test_moves_work_off_overloaded_actor() {
        let fixture = Fixture::overloaded();
        let outcome = fixture.run(&AnySkill);

        assert!((outcome.utilization_before["ann"] - 0.95).abs() < 1e-6);
        assert!((outcome.utilization_before["bob"] - 0.40).abs() < 1e-6);

        assert!(!outcome.reassignments.is_empty());
        // equal priority: the task with the most slack moves first, ties by ID
        assert_eq!(
            outcome.reassignments[0],
            Reassignment {
                task_id: "a2".to_string(),
                from: "ann".to_string(),
                to: "bob".to_string(),
            }
        );
        assert!(outcome.utilization_after["ann"] < 0.9);
        assert!(outcome.utilization_after["bob"] <= 0.9);
        assert!(outcome.incomplete.is_none());
        assert_eq!(outcome.schedule.actor_of("a2"), Some("bob"));
        assert_eq!(outcome.actor_overrides.get("a2").map(String::as_str), Some("bob"));
    }

    #[test]
    fn test_critical_chain_moves_when_nothing_else_can() {
        let mut fixture = Fixture::overloaded();
        for (pred, succ) in [("a1", "a2"), ("a2", "a3")] {
            fixture
                .graph
                .add_edge(&crate::models::Dependency::finish_to_start(pred, succ))
                .unwrap();
        }
        let analysis = analyze(&fixture.graph).unwrap();
        assert!(["a1", "a2", "a3"].iter().all(|id| analysis.is_critical(id)));

        let outcome = fixture.run(&AnySkill);

        assert!((outcome.utilization_before["ann"] - 0.95).abs() < 1e-6);
        assert!(!outcome.reassignments.is_empty());
        let moved = &outcome.reassignments[0];
        assert!(["a1", "a2", "a3"].contains(&moved.task_id.as_str()));
        assert_eq!((moved.from.as_str(), moved.to.as_str()), ("ann", "bob"));
        assert!(outcome
            .utilization_after
            .values()
            .all(|&u| u <= fixture.config.utilization_ceiling + 1e-9));
        assert!(outcome.incomplete.is_none());
        assert!(outcome.schedule.unplaced.is_empty());
    }

    #[test]
    fn test_never_moves_in_progress_work() {
        let mut fixture = Fixture::overloaded();
        for id in ["a1", "a2", "a3"] {
            fixture.graph.set_status(id, TaskStatus::InProgress).unwrap();
        }
        let outcome = fixture.run(&AnySkill);

        assert!(outcome.reassignments.is_empty());
        let incomplete = outcome.incomplete.unwrap();
        assert_eq!(incomplete.residual.len(), 1);
        assert_eq!(incomplete.residual[0].actor_id.as_deref(), Some("ann"));
    }

    #[test]
    fn test_skill_matcher_limits_targets() {
        let fixture = Fixture::overloaded();
        let nobody_else = |_task: &Task, actor: &str| actor == "ann";
        let outcome = fixture.run(&nobody_else);

        assert!(outcome.reassignments.is_empty());
        assert!(outcome.incomplete.is_some());
        assert_eq!(outcome.utilization_after, outcome.utilization_before);
    }

    #[test]
    fn test_balanced_plan_untouched() {
        let mut fixture = Fixture::overloaded();
        fixture.graph = TaskGraph::new();
        fixture.graph.add_task(make_task("x", 2.0, 50, "ann")).unwrap();
        let outcome = fixture.run(&AnySkill);

        assert!(outcome.reassignments.is_empty());
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.incomplete.is_none());
    }
}
