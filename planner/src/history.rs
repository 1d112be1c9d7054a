//! Generations of scheduled blocks, kept for audit and before/after comparison.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{ScheduledBlock, TaskId};

/// Block-level differences between two generations, by block task ID.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationDiff {
    pub from: u32,
    pub to: u32,
    /// Present only in the later generation.
    pub added: Vec<TaskId>,
    /// Present only in the earlier generation.
    pub removed: Vec<TaskId>,
    /// Present in both, with a different actor or time.
    pub moved: Vec<TaskId>,
}

impl GenerationDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.moved.is_empty()
    }
}

/// Append-only store of block generations.
///
/// A new planning pass never rewrites an earlier generation; it supersedes it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlockHistory {
    generations: BTreeMap<u32, Vec<ScheduledBlock>>,
}

impl BlockHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation number the next pass should use.
    pub fn next_generation(&self) -> u32 {
        self.generations.keys().next_back().map_or(1, |g| g + 1)
    }

    /// Store a generation. Returns false if that generation already exists.
    pub fn push(&mut self, generation: u32, blocks: Vec<ScheduledBlock>) -> bool {
        if self.generations.contains_key(&generation) {
            return false;
        }
        self.generations.insert(generation, blocks);
        true
    }

    pub fn generation(&self, generation: u32) -> Option<&[ScheduledBlock]> {
        self.generations.get(&generation).map(Vec::as_slice)
    }

    pub fn latest(&self) -> Option<(u32, &[ScheduledBlock])> {
        self.generations
            .iter()
            .next_back()
            .map(|(g, b)| (*g, b.as_slice()))
    }

    pub fn generations(&self) -> impl Iterator<Item = u32> + '_ {
        self.generations.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// Compare two stored generations; `None` if either is missing.
    pub fn diff(&self, from: u32, to: u32) -> Option<GenerationDiff> {
        let before = index_blocks(self.generations.get(&from)?);
        let after = index_blocks(self.generations.get(&to)?);

        let before_ids: BTreeSet<&str> = before.keys().copied().collect();
        let after_ids: BTreeSet<&str> = after.keys().copied().collect();

        let added = after_ids
            .difference(&before_ids)
            .map(|id| id.to_string())
            .collect();
        let removed = before_ids
            .difference(&after_ids)
            .map(|id| id.to_string())
            .collect();
        let moved = before_ids
            .intersection(&after_ids)
            .filter(|id| {
                let (a, b) = (before[**id], after[**id]);
                a.actor_id != b.actor_id || a.start != b.start || a.end != b.end
            })
            .map(|id| id.to_string())
            .collect();

        Some(GenerationDiff {
            from,
            to,
            added,
            removed,
            moved,
        })
    }
}

fn index_blocks(blocks: &[ScheduledBlock]) -> BTreeMap<&str, &ScheduledBlock> {
    blocks.iter().map(|b| (b.task_id.as_str(), b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn dt(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn make_block(task_id: &str, actor: &str, start: u32, generation: u32) -> ScheduledBlock {
        ScheduledBlock {
            task_id: task_id.to_string(),
            parent_task_id: None,
            actor_id: actor.to_string(),
            start: dt(start),
            end: dt(start + 1),
            is_focus_time: false,
            generation,
        }
    }

    #[test]
    fn test_generations_are_append_only() {
        let mut history = BlockHistory::new();
        assert_eq!(history.next_generation(), 1);
        assert!(history.push(1, vec![make_block("a", "ann", 9, 1)]));
        assert!(!history.push(1, vec![]));
        assert_eq!(history.generation(1).map(|b| b.len()), Some(1));
        assert_eq!(history.next_generation(), 2);
    }

    #[test]
    fn test_diff_between_generations() {
        let mut history = BlockHistory::new();
        history.push(
            1,
            vec![
                make_block("a", "ann", 9, 1),
                make_block("b", "ann", 10, 1),
                make_block("c", "ann", 11, 1),
            ],
        );
        history.push(
            2,
            vec![
                make_block("a", "ann", 9, 2),
                make_block("b", "bob", 9, 2),
                make_block("d", "ann", 10, 2),
            ],
        );

        let diff = history.diff(1, 2).unwrap();
        assert_eq!(diff.added, vec!["d".to_string()]);
        assert_eq!(diff.removed, vec!["c".to_string()]);
        assert_eq!(diff.moved, vec!["b".to_string()]);
        assert!(history.diff(1, 1).unwrap().is_empty());
        assert!(history.diff(1, 7).is_none());
        assert_eq!(history.latest().map(|(g, _)| g), Some(2));
    }
}
