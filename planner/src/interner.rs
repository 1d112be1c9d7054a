//! Dense arena indices for task IDs.
//!
//! The graph keeps adjacency lists and parent links as `u32` indices into its
//! task arena; this maps the external string IDs onto them. Indices are handed
//! out in insertion order.

use rustc_hash::FxHashMap;

use crate::models::TaskId;

/// Arena index of a task.
pub type TaskIdx = u32;

#[derive(Debug, Clone, Default)]
pub struct TaskIdInterner {
    lookup: FxHashMap<TaskId, TaskIdx>,
}

impl TaskIdInterner {
    /// Assign the next index to `id`; `None` if it already has one.
    pub fn insert(&mut self, id: &str) -> Option<TaskIdx> {
        if self.lookup.contains_key(id) {
            return None;
        }
        let idx = self.lookup.len() as TaskIdx;
        self.lookup.insert(id.to_string(), idx);
        Some(idx)
    }

    #[inline]
    pub fn index_of(&self, id: &str) -> Option<TaskIdx> {
        self.lookup.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}
