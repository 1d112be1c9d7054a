//! Per-actor free time and booked blocks with sorted, non-overlapping intervals.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

use crate::capacity::{merge_intervals, subtract_intervals, Interval};
use crate::models::{hours_between, ActorId, CapacityProfile};

/// Tracks what an actor has free and what the current pass has booked.
///
/// Maintains the invariant that both `free` and `booked` are sorted by start and
/// contain no overlapping intervals, so lookups can binary search.
#[derive(Clone, Debug)]
pub struct ActorSchedule {
    pub actor_id: ActorId,
    /// Free working time from the calendar, clipped to the working window.
    free: Vec<Interval>,
    /// Blocks booked during this pass.
    booked: Vec<Interval>,
    /// Booked hours per day, for the daily capacity cap.
    daily_booked: BTreeMap<NaiveDate, f64>,
    pub hours_per_day: f64,
    pub min_focus_hours: f64,
    pub max_block_hours: f64,
}

impl ActorSchedule {
    pub fn new(profile: &CapacityProfile, free: Vec<Interval>, default_max_block_hours: f64) -> Self {
        Self {
            actor_id: profile.actor_id.clone(),
            free: merge_intervals(free),
            booked: Vec::new(),
            daily_booked: BTreeMap::new(),
            hours_per_day: profile.hours_per_day,
            min_focus_hours: profile.min_focus_block_hours,
            max_block_hours: profile.max_block_hours.unwrap_or(default_max_block_hours),
        }
    }

    /// Book a block, merging with adjacent or overlapping bookings.
    pub fn book(&mut self, start: NaiveDateTime, end: NaiveDateTime) {
        if start >= end {
            return;
        }
        *self.daily_booked.entry(start.date()).or_insert(0.0) += hours_between(start, end);

        // Find insertion point using binary search
        let idx = self.booked.partition_point(|(s, _)| *s < start);

        let mut new_start = start;
        let mut new_end = end;
        let mut merge_start = idx;
        let mut merge_end = idx;

        // Merge with previous booking if overlapping or touching
        if idx > 0 {
            let (prev_start, prev_end) = self.booked[idx - 1];
            if prev_end >= start {
                new_start = prev_start;
                new_end = new_end.max(prev_end);
                merge_start = idx - 1;
            }
        }

        // Merge with subsequent bookings if overlapping or touching
        while merge_end < self.booked.len() {
            let (next_start, next_end) = self.booked[merge_end];
            if next_start <= new_end {
                new_end = new_end.max(next_end);
                merge_end += 1;
            } else {
                break;
            }
        }

        self.booked.drain(merge_start..merge_end);
        self.booked.insert(merge_start, (new_start, new_end));
    }

    /// Unbooked free time starting no earlier than `not_before`.
    pub fn open_segments(&self, not_before: NaiveDateTime) -> Vec<Interval> {
        let first = self.free.partition_point(|(_, e)| *e <= not_before);
        let clipped: Vec<Interval> = self.free[first..]
            .iter()
            .map(|&(s, e)| (s.max(not_before), e))
            .filter(|(s, e)| s < e)
            .collect();
        subtract_intervals(&clipped, &self.booked)
    }

    /// Hours still available on `day` under the daily cap.
    pub fn remaining_on(&self, day: NaiveDate) -> f64 {
        let booked = self.daily_booked.get(&day).copied().unwrap_or(0.0);
        (self.hours_per_day - booked).max(0.0)
    }

    /// Total hours booked during this pass.
    pub fn booked_hours(&self) -> f64 {
        self.daily_booked.values().sum()
    }

    /// Whether a block of `hours` can sit in a slot of `slot_hours` under the focus rule.
    pub fn satisfies_focus(&self, slot_hours: f64, hours: f64) -> bool {
        slot_hours + 1e-9 >= hours.max(self.min_focus_hours)
    }

    pub fn is_focus_block(&self, hours: f64) -> bool {
        self.min_focus_hours > 0.0 && hours + 1e-9 >= self.min_focus_hours
    }
}
