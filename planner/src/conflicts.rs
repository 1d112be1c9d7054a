//! Post-scheduling validation and conflict bookkeeping.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::graph::TaskGraph;
use crate::log_checks;
use crate::models::{
    hours_to_duration, ActorId, Conflict, ConflictKind, ResolutionStatus, ScheduledBlock, TaskId,
};

/// Scans a set of blocks for overlaps, dependency violations and capacity breaches.
///
/// Produces one [`Conflict`] per violation and never changes the blocks.
pub struct ConflictDetector<'a> {
    graph: &'a TaskGraph,
    utilization_ceiling: f64,
    verbosity: u8,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(graph: &'a TaskGraph, utilization_ceiling: f64, verbosity: u8) -> Self {
        Self {
            graph,
            utilization_ceiling,
            verbosity,
        }
    }

    /// Every conflict in `blocks`, overlaps first, then dependency violations, then breaches.
    pub fn detect(
        &self,
        blocks: &[ScheduledBlock],
        utilization: &BTreeMap<ActorId, f64>,
    ) -> Vec<Conflict> {
        let mut conflicts = self.overlaps(blocks);
        conflicts.extend(self.dependency_violations(blocks));
        conflicts.extend(self.capacity_breaches(blocks, utilization));
        log_checks!(
            self.verbosity,
            blocks = blocks.len(),
            conflicts = conflicts.len(),
            "Conflict scan finished"
        );
        conflicts
    }

    /// Pairs of blocks on the same actor whose intervals intersect.
    pub fn overlaps(&self, blocks: &[ScheduledBlock]) -> Vec<Conflict> {
        let mut by_actor: BTreeMap<&str, Vec<&ScheduledBlock>> = BTreeMap::new();
        for block in blocks {
            by_actor.entry(block.actor_id.as_str()).or_default().push(block);
        }

        let mut conflicts = Vec::new();
        for (actor_id, mut actor_blocks) in by_actor {
            actor_blocks.sort_by(|a, b| (a.start, &a.task_id).cmp(&(b.start, &b.task_id)));
            for (i, first) in actor_blocks.iter().enumerate() {
                // Sorted by start, so only later blocks starting before `first` ends can overlap
                for second in actor_blocks[i + 1..]
                    .iter()
                    .take_while(|b| b.start < first.end)
                {
                    conflicts.push(Conflict::new(
                        ConflictKind::Overlap,
                        vec![first.task_id.clone(), second.task_id.clone()],
                        Some(actor_id.to_string()),
                        format!(
                            "{} ({} - {}) overlaps {} ({} - {}) for {}",
                            first.task_id,
                            first.start,
                            first.end,
                            second.task_id,
                            second.start,
                            second.end,
                            actor_id
                        ),
                    ));
                }
            }
        }
        conflicts
    }

    /// Successors whose blocks start (or finish) before their dependency allows.
    pub fn dependency_violations(&self, blocks: &[ScheduledBlock]) -> Vec<Conflict> {
        // Span of each schedulable task: first fragment start to last fragment end
        let mut spans: BTreeMap<&str, (NaiveDateTime, NaiveDateTime)> = BTreeMap::new();
        for block in blocks {
            spans
                .entry(block.root_task_id())
                .and_modify(|(s, e)| {
                    *s = (*s).min(block.start);
                    *e = (*e).max(block.end);
                })
                .or_insert((block.start, block.end));
        }

        let mut conflicts = Vec::new();
        for dep in self.graph.dependencies() {
            let (Some(pred), Some(succ)) = (
                spans.get(dep.predecessor.as_str()),
                spans.get(dep.successor.as_str()),
            ) else {
                continue;
            };

            let anchor = if dep.kind.anchors_on_finish() {
                pred.1
            } else {
                pred.0
            };
            let bound = anchor + hours_to_duration(dep.lag_hours);
            let (checked, label) = if dep.kind.constrains_finish() {
                (succ.1, "finishes")
            } else {
                (succ.0, "starts")
            };
            if checked < bound {
                conflicts.push(Conflict::new(
                    ConflictKind::DependencyViolation,
                    vec![dep.predecessor.clone(), dep.successor.clone()],
                    None,
                    format!(
                        "{} {} at {} but {:?} dependency on {} requires {} or later",
                        dep.successor, label, checked, dep.kind, dep.predecessor, bound
                    ),
                ));
            }
        }
        conflicts
    }

    /// Actors whose utilization is above the ceiling.
    pub fn capacity_breaches(
        &self,
        blocks: &[ScheduledBlock],
        utilization: &BTreeMap<ActorId, f64>,
    ) -> Vec<Conflict> {
        utilization
            .iter()
            .filter(|&(_, &u)| u > self.utilization_ceiling + 1e-9)
            .map(|(actor_id, &u)| {
                let task_ids: BTreeSet<TaskId> = blocks
                    .iter()
                    .filter(|b| &b.actor_id == actor_id)
                    .map(|b| b.root_task_id().to_string())
                    .collect();
                Conflict::new(
                    ConflictKind::CapacityBreach,
                    task_ids.into_iter().collect(),
                    Some(actor_id.clone()),
                    format!(
                        "{} is at {:.1}% utilization, above the {:.1}% ceiling",
                        actor_id,
                        u * 100.0,
                        self.utilization_ceiling * 100.0
                    ),
                )
            })
            .collect()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConflictLogError {
    #[error("No conflicts recorded for generation {0}")]
    UnknownGeneration(u32),
    #[error("Generation {generation} has no conflict #{index}")]
    UnknownConflict { generation: u32, index: usize },
}

/// Conflicts of every planning generation, with their resolution status.
///
/// Each generation keeps its own records; resolving a conflict in one
/// generation leaves earlier generations untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConflictLog {
    generations: BTreeMap<u32, Vec<Conflict>>,
}

impl ConflictLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, generation: u32, conflicts: Vec<Conflict>) {
        self.generations.insert(generation, conflicts);
    }

    pub fn generation(&self, generation: u32) -> Option<&[Conflict]> {
        self.generations.get(&generation).map(Vec::as_slice)
    }

    pub fn latest(&self) -> Option<(u32, &[Conflict])> {
        self.generations
            .iter()
            .next_back()
            .map(|(g, c)| (*g, c.as_slice()))
    }

    /// Set the resolution status of one conflict.
    pub fn mark(
        &mut self,
        generation: u32,
        index: usize,
        status: ResolutionStatus,
    ) -> Result<&Conflict, ConflictLogError> {
        let conflicts = self
            .generations
            .get_mut(&generation)
            .ok_or(ConflictLogError::UnknownGeneration(generation))?;
        let conflict = conflicts
            .get_mut(index)
            .ok_or(ConflictLogError::UnknownConflict { generation, index })?;
        conflict.resolution = status;
        Ok(&*conflict)
    }

    /// Conflicts of a generation still awaiting resolution.
    pub fn pending(&self, generation: u32) -> Vec<&Conflict> {
        self.generations
            .get(&generation)
            .map(|cs| {
                cs.iter()
                    .filter(|c| c.resolution == ResolutionStatus::Pending)
                    .collect()
            })
            .unwrap_or_default()
    }
}
