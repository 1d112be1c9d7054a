//! Placement lifecycle of schedulable tasks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::TaskId;

/// Where a task stands in the placement lifecycle.
///
/// `Unscheduled -> Placed -> (Split) -> Confirmed`. A task the pass could not
/// place stays `Unscheduled`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementState {
    Unscheduled,
    /// Placed as a single block
    Placed,
    /// Placed as several fragments
    Split,
    /// Accepted by the caller; later passes keep its blocks as they are
    Confirmed,
}

impl PlacementState {
    pub fn can_transition_to(self, next: PlacementState) -> bool {
        use PlacementState::*;
        matches!(
            (self, next),
            (Unscheduled, Placed)
                | (Placed, Split)
                | (Placed, Confirmed)
                | (Split, Confirmed)
                // A new pass may move a non-confirmed task again
                | (Placed, Unscheduled)
                | (Split, Unscheduled)
        )
    }

    pub fn is_placed(self) -> bool {
        !matches!(self, PlacementState::Unscheduled)
    }
}

/// Placement state per task, rejecting illegal transitions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementLedger {
    states: BTreeMap<TaskId, PlacementState>,
}

impl PlacementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task_id: &str) -> PlacementState {
        self.states
            .get(task_id)
            .copied()
            .unwrap_or(PlacementState::Unscheduled)
    }

    /// Move a task to `next`; returns false (and changes nothing) if illegal.
    pub fn transition(&mut self, task_id: &str, next: PlacementState) -> bool {
        let current = self.get(task_id);
        if current == next {
            return true;
        }
        if !current.can_transition_to(next) {
            return false;
        }
        self.states.insert(task_id.to_string(), next);
        true
    }

    /// Keep a state from an earlier pass for a task this pass did not place.
    pub fn carry(&mut self, task_id: &str, state: PlacementState) {
        if state.is_placed() && !self.states.contains_key(task_id) {
            self.states.insert(task_id.to_string(), state);
        }
    }

    /// Confirm every placed or split task.
    pub fn confirm_all(&mut self) {
        for state in self.states.values_mut() {
            if matches!(state, PlacementState::Placed | PlacementState::Split) {
                *state = PlacementState::Confirmed;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskId, &PlacementState)> {
        self.states.iter()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut ledger = PlacementLedger::new();
        assert_eq!(ledger.get("a"), PlacementState::Unscheduled);

        assert!(!ledger.transition("a", PlacementState::Split));
        assert!(ledger.transition("a", PlacementState::Placed));
        assert!(ledger.transition("a", PlacementState::Split));
        assert!(ledger.transition("a", PlacementState::Confirmed));
        assert_eq!(ledger.get("a"), PlacementState::Confirmed);

        // confirmed work is not moved again
        assert!(!ledger.transition("a", PlacementState::Unscheduled));
        assert!(!ledger.transition("b", PlacementState::Confirmed));
    }

    #[test]
    fn test_confirm_all() {
        let mut ledger = PlacementLedger::new();
        ledger.transition("a", PlacementState::Placed);
        ledger.transition("b", PlacementState::Placed);
        ledger.transition("b", PlacementState::Split);
        ledger.confirm_all();
        assert_eq!(ledger.get("a"), PlacementState::Confirmed);
        assert_eq!(ledger.get("b"), PlacementState::Confirmed);
        assert_eq!(ledger.get("c"), PlacementState::Unscheduled);
    }

    #[test]
    fn test_carry_keeps_untouched_tasks() {
        let mut ledger = PlacementLedger::new();
        ledger.transition("a", PlacementState::Placed);

        ledger.carry("a", PlacementState::Confirmed);
        ledger.carry("b", PlacementState::Confirmed);
        ledger.carry("c", PlacementState::Unscheduled);
        assert_eq!(ledger.get("a"), PlacementState::Placed);
        assert_eq!(ledger.get("b"), PlacementState::Confirmed);
        assert_eq!(ledger.len(), 2);
    }
}
