//! Task arena with typed dependency edges and incremental cycle detection.

use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use thiserror::Error;

use crate::interner::{TaskIdInterner, TaskIdx};
use crate::models::{Dependency, DependencyKind, Task, TaskId, TaskStatus};

/// Tolerance for comparing summed fragment durations.
const SPLIT_EPSILON: f64 = 1e-6;

/// Errors raised when mutating or querying a [`TaskGraph`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Dependency {predecessor} -> {successor} would create a cycle through {path:?}")]
    Cycle {
        predecessor: TaskId,
        successor: TaskId,
        /// Existing path from the successor back to the predecessor.
        path: Vec<TaskId>,
    },
    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),
    #[error("Duplicate task: {0}")]
    DuplicateTask(TaskId),
    #[error("Invalid task {task_id}: {reason}")]
    InvalidTask { task_id: TaskId, reason: String },
    #[error("Invalid split of {parent}: {reason}")]
    InvalidSplit { parent: TaskId, reason: String },
}

/// Holds tasks, parent/child fragment links and dependency edges.
///
/// Tasks live in an arena addressed by [`TaskIdx`]. The dependency set is kept
/// acyclic at all times: an edge that would close a cycle is rejected before
/// anything is mutated.
#[derive(Clone, Debug, Default)]
pub struct TaskGraph {
    index: TaskIdInterner,
    tasks: Vec<Task>,
    edges: Vec<Dependency>,
    /// Per task: indices into `edges` where it is the successor.
    incoming: Vec<Vec<usize>>,
    /// Per task: indices into `edges` where it is the predecessor.
    outgoing: Vec<Vec<usize>>,
    /// Parent task -> its current split fragments, in order.
    children: FxHashMap<TaskIdx, Vec<TaskIdx>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Add a task to the arena.
    pub fn add_task(&mut self, task: Task) -> Result<TaskIdx, GraphError> {
        validate_task(&task)?;
        let idx = self
            .index
            .insert(&task.id)
            .ok_or_else(|| GraphError::DuplicateTask(task.id.clone()))?;
        self.tasks.push(task);
        self.incoming.push(Vec::new());
        self.outgoing.push(Vec::new());
        Ok(idx)
    }

    /// Add a dependency edge, rejecting it if it would create a cycle.
    ///
    /// Only the region reachable from `successor` is traversed: the edge closes a
    /// cycle exactly when `predecessor` is already reachable from `successor`.
    pub fn add_dependency(
        &mut self,
        predecessor: &str,
        successor: &str,
        kind: DependencyKind,
        lag_hours: f64,
    ) -> Result<(), GraphError> {
        let pred = self.require(predecessor)?;
        let succ = self.require(successor)?;

        if let Some(path) = self.path_between(succ, pred) {
            return Err(GraphError::Cycle {
                predecessor: predecessor.to_string(),
                successor: successor.to_string(),
                path,
            });
        }

        let edge_idx = self.edges.len();
        self.edges
            .push(Dependency::new(predecessor, successor, kind, lag_hours));
        self.outgoing[pred as usize].push(edge_idx);
        self.incoming[succ as usize].push(edge_idx);
        Ok(())
    }

    /// Convenience for [`add_dependency`](Self::add_dependency) with an owned edge.
    pub fn add_edge(&mut self, dep: &Dependency) -> Result<(), GraphError> {
        self.add_dependency(&dep.predecessor, &dep.successor, dep.kind, dep.lag_hours)
    }

    /// Depth-first search for a path `from -> ... -> to` along successor edges.
    fn path_between(&self, from: TaskIdx, to: TaskIdx) -> Option<Vec<TaskId>> {
        let mut visited = vec![false; self.tasks.len()];
        let mut parent: Vec<Option<TaskIdx>> = vec![None; self.tasks.len()];
        let mut stack = vec![from];
        visited[from as usize] = true;

        while let Some(node) = stack.pop() {
            if node == to {
                let mut path = vec![self.tasks[node as usize].id.clone()];
                let mut cursor = node;
                while let Some(p) = parent[cursor as usize] {
                    path.push(self.tasks[p as usize].id.clone());
                    cursor = p;
                }
                path.reverse();
                return Some(path);
            }
            for &edge_idx in &self.outgoing[node as usize] {
                let next = self.idx_of(&self.edges[edge_idx].successor);
                if let Some(next) = next {
                    if !visited[next as usize] {
                        visited[next as usize] = true;
                        parent[next as usize] = Some(node);
                        stack.push(next);
                    }
                }
            }
        }
        None
    }

    /// Deterministic topological order of schedulable (non-fragment) tasks.
    ///
    /// Kahn's algorithm with a min-heap, so ties are broken by ascending task ID.
    pub fn topological_order(&self) -> Vec<TaskId> {
        let mut in_degree: Vec<usize> = self.incoming.iter().map(|e| e.len()).collect();
        let mut ready: BinaryHeap<Reverse<(&str, TaskIdx)>> = BinaryHeap::new();
        for (i, task) in self.tasks.iter().enumerate() {
            if in_degree[i] == 0 && !task.is_fragment() {
                ready.push(Reverse((task.id.as_str(), i as TaskIdx)));
            }
        }

        let mut order = Vec::with_capacity(self.tasks.len());
        while let Some(Reverse((id, idx))) = ready.pop() {
            order.push(id.to_string());
            for &edge_idx in &self.outgoing[idx as usize] {
                if let Some(next) = self.idx_of(&self.edges[edge_idx].successor) {
                    let degree = &mut in_degree[next as usize];
                    *degree -= 1;
                    if *degree == 0 {
                        let task = &self.tasks[next as usize];
                        ready.push(Reverse((task.id.as_str(), next)));
                    }
                }
            }
        }
        order
    }

    /// Tasks that may start immediately: not done, and every predecessor done.
    pub fn phase_zero(&self) -> Vec<TaskId> {
        let mut ready: Vec<TaskId> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_fragment() && t.status != TaskStatus::Done)
            .filter(|(i, _)| {
                self.incoming[*i].iter().all(|&e| {
                    self.get(&self.edges[e].predecessor)
                        .map(|p| p.status == TaskStatus::Done)
                        .unwrap_or(true)
                })
            })
            .map(|(_, t)| t.id.clone())
            .collect();
        ready.sort();
        ready
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.idx_of(id).map(|i| &self.tasks[i as usize])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.idx_of(id).map(|i| &mut self.tasks[i as usize])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.idx_of(id).is_some()
    }

    #[inline]
    fn idx_of(&self, id: &str) -> Option<TaskIdx> {
        self.index.index_of(id)
    }

    fn require(&self, id: &str) -> Result<TaskIdx, GraphError> {
        self.idx_of(id)
            .ok_or_else(|| GraphError::UnknownTask(id.to_string()))
    }

    /// All tasks in insertion order, fragments included.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.edges
    }

    /// Edges where `id` is the successor.
    pub fn predecessors(&self, id: &str) -> Vec<&Dependency> {
        match self.idx_of(id) {
            Some(i) => self.incoming[i as usize]
                .iter()
                .map(|&e| &self.edges[e])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Edges where `id` is the predecessor.
    pub fn successors(&self, id: &str) -> Vec<&Dependency> {
        match self.idx_of(id) {
            Some(i) => self.outgoing[i as usize]
                .iter()
                .map(|&e| &self.edges[e])
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn set_estimate(&mut self, id: &str, hours: f64) -> Result<(), GraphError> {
        if !(hours.is_finite() && hours >= 0.0) {
            return Err(GraphError::InvalidTask {
                task_id: id.to_string(),
                reason: format!("estimated hours must be finite and non-negative, got {}", hours),
            });
        }
        let task = self
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownTask(id.to_string()))?;
        task.estimated_hours = Some(hours);
        Ok(())
    }

    pub fn set_status(&mut self, id: &str, status: TaskStatus) -> Result<(), GraphError> {
        let task = self
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownTask(id.to_string()))?;
        task.status = status;
        Ok(())
    }

    /// Record the fragments a task was split into.
    ///
    /// Each fragment must point back at `parent_id`, be no longer than the
    /// parent, and together the fragments must sum to the parent's duration.
    /// Re-recording a split replaces the fragment list: fragments with a known
    /// ID are updated in place and earlier fragments left out are removed.
    pub fn record_split(&mut self, parent_id: &str, fragments: Vec<Task>) -> Result<(), GraphError> {
        let parent_idx = self.require(parent_id)?;
        let parent = &self.tasks[parent_idx as usize];
        let invalid = |reason: String| GraphError::InvalidSplit {
            parent: parent_id.to_string(),
            reason,
        };

        if parent.is_fragment() {
            return Err(invalid("fragments cannot be split again".to_string()));
        }
        let Some(total) = parent.estimated_hours else {
            return Err(invalid("parent has no estimate".to_string()));
        };
        if fragments.is_empty() {
            return Err(invalid("no fragments given".to_string()));
        }

        let mut sum = 0.0;
        for fragment in &fragments {
            if fragment.parent_task_id.as_deref() != Some(parent_id) {
                return Err(invalid(format!("{} does not reference its parent", fragment.id)));
            }
            let hours = fragment
                .estimated_hours
                .ok_or_else(|| invalid(format!("{} has no duration", fragment.id)))?;
            if hours > total + SPLIT_EPSILON {
                return Err(invalid(format!(
                    "{} lasts {}h, longer than the parent's {}h",
                    fragment.id, hours, total
                )));
            }
            sum += hours;
        }
        if (sum - total).abs() > SPLIT_EPSILON {
            return Err(invalid(format!(
                "fragments sum to {}h but the parent lasts {}h",
                sum, total
            )));
        }

        let kept: FxHashSet<&str> = fragments.iter().map(|f| f.id.as_str()).collect();
        let stale: FxHashSet<TaskIdx> = self
            .children
            .get(&parent_idx)
            .into_iter()
            .flatten()
            .copied()
            .filter(|&k| !kept.contains(self.tasks[k as usize].id.as_str()))
            .collect();
        drop(kept);
        if !stale.is_empty() {
            self.remove_tasks(&stale);
        }
        let parent_idx = self.require(parent_id)?;

        let mut child_indices = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            match self.idx_of(&fragment.id) {
                Some(existing) => {
                    self.tasks[existing as usize] = fragment;
                    child_indices.push(existing);
                }
                None => {
                    let idx = self
                        .index
                        .insert(&fragment.id)
                        .ok_or_else(|| GraphError::DuplicateTask(fragment.id.clone()))?;
                    self.tasks.push(fragment);
                    self.incoming.push(Vec::new());
                    self.outgoing.push(Vec::new());
                    child_indices.push(idx);
                }
            }
        }
        self.children.insert(parent_idx, child_indices);
        Ok(())
    }

    /// Drop edgeless tasks from the arena, compacting indices.
    fn remove_tasks(&mut self, stale: &FxHashSet<TaskIdx>) {
        let TaskGraph {
            tasks,
            edges,
            incoming,
            outgoing,
            children,
            ..
        } = std::mem::take(self);

        let mut remap: FxHashMap<TaskIdx, TaskIdx> = FxHashMap::default();
        for (i, ((task, inc), out)) in tasks.into_iter().zip(incoming).zip(outgoing).enumerate() {
            let old = i as TaskIdx;
            if stale.contains(&old) {
                continue;
            }
            if let Some(idx) = self.index.insert(&task.id) {
                remap.insert(old, idx);
                self.tasks.push(task);
                self.incoming.push(inc);
                self.outgoing.push(out);
            }
        }
        self.edges = edges;
        self.children = children
            .into_iter()
            .filter_map(|(parent, kids)| {
                let parent = *remap.get(&parent)?;
                let kids = kids.iter().filter_map(|k| remap.get(k).copied()).collect();
                Some((parent, kids))
            })
            .collect();
    }

    /// Current split fragments of a task, in order.
    pub fn children(&self, parent_id: &str) -> Vec<&Task> {
        self.idx_of(parent_id)
            .and_then(|i| self.children.get(&i))
            .map(|kids| kids.iter().map(|&k| &self.tasks[k as usize]).collect())
            .unwrap_or_default()
    }

    /// Copy of the graph restricted to `ids`, keeping only edges between them.
    pub fn subgraph(&self, ids: &[TaskId]) -> Result<TaskGraph, GraphError> {
        let mut sub = TaskGraph::new();
        for id in ids {
            let task = self
                .get(id)
                .ok_or_else(|| GraphError::UnknownTask(id.clone()))?;
            if !sub.contains(id) {
                sub.add_task(task.clone())?;
            }
        }
        for edge in &self.edges {
            if sub.contains(&edge.predecessor) && sub.contains(&edge.successor) {
                sub.add_edge(edge)?;
            }
        }
        Ok(sub)
    }

    /// Subgraph of the non-fragment tasks belonging to one milestone.
    pub fn milestone_subgraph(&self, milestone_id: &str) -> Result<TaskGraph, GraphError> {
        let ids: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|t| t.milestone_id == milestone_id && !t.is_fragment())
            .map(|t| t.id.clone())
            .collect();
        self.subgraph(&ids)
    }
}

fn validate_task(task: &Task) -> Result<(), GraphError> {
    let invalid = |reason: String| GraphError::InvalidTask {
        task_id: task.id.clone(),
        reason,
    };
    if task.id.is_empty() {
        return Err(invalid("empty task id".to_string()));
    }
    if !(0..=100).contains(&task.priority) {
        return Err(invalid(format!("priority must be 0-100, got {}", task.priority)));
    }
    if let Some(hours) = task.estimated_hours {
        if !(hours.is_finite() && hours >= 0.0) {
            return Err(invalid(format!("estimated hours must be non-negative, got {}", hours)));
        }
    }
    Ok(())
}
