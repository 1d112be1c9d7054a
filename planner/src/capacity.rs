//! Per-actor capacity profiles and available working time.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::models::{hours_between, ActorId, CapacityProfile, SlotSource, TimeSlot};

/// A closed-open interval of calendar time.
pub type Interval = (NaiveDateTime, NaiveDateTime);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapacityError {
    #[error("Unknown actor: {0}")]
    UnknownActor(ActorId),
    #[error("Invalid capacity profile for {actor_id}: {reason}")]
    InvalidProfile { actor_id: ActorId, reason: String },
}

/// The calendar range a planning pass may place work in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl PlanningWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let first = self.start.date();
        let last = self.end.date();
        first.iter_days().take_while(move |d| *d <= last)
    }
}

/// Partial update of an actor's scheduling preferences.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceUpdate {
    pub hours_per_day: Option<f64>,
    pub work_start: Option<chrono::NaiveTime>,
    pub work_end: Option<chrono::NaiveTime>,
    pub weekends_allowed: Option<bool>,
    pub min_focus_block_hours: Option<f64>,
    /// `Some(None)` clears the per-actor block size.
    pub max_block_hours: Option<Option<f64>>,
}

/// Capacity profiles keyed by actor.
///
/// Profiles change only through explicit preference updates; scheduling
/// passes work on a cloned snapshot.
#[derive(Clone, Debug, Default)]
pub struct CapacityStore {
    profiles: BTreeMap<ActorId, CapacityProfile>,
}

impl CapacityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, profile: CapacityProfile) -> Result<(), CapacityError> {
        validate_profile(&profile)?;
        self.profiles.insert(profile.actor_id.clone(), profile);
        Ok(())
    }

    pub fn update_preferences(
        &mut self,
        actor_id: &str,
        update: &PreferenceUpdate,
    ) -> Result<&CapacityProfile, CapacityError> {
        let current = self
            .profiles
            .get(actor_id)
            .ok_or_else(|| CapacityError::UnknownActor(actor_id.to_string()))?;

        let mut next = current.clone();
        if let Some(h) = update.hours_per_day {
            next.hours_per_day = h;
        }
        if let Some(t) = update.work_start {
            next.work_start = t;
        }
        if let Some(t) = update.work_end {
            next.work_end = t;
        }
        if let Some(w) = update.weekends_allowed {
            next.weekends_allowed = w;
        }
        if let Some(f) = update.min_focus_block_hours {
            next.min_focus_block_hours = f;
        }
        if let Some(b) = update.max_block_hours {
            next.max_block_hours = b;
        }
        validate_profile(&next)?;

        self.profiles.insert(actor_id.to_string(), next);
        self.profiles
            .get(actor_id)
            .ok_or_else(|| CapacityError::UnknownActor(actor_id.to_string()))
    }

    pub fn get(&self, actor_id: &str) -> Option<&CapacityProfile> {
        self.profiles.get(actor_id)
    }

    pub fn actors(&self) -> impl Iterator<Item = &ActorId> {
        self.profiles.keys()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &CapacityProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Read-only copy for a scheduling pass.
    pub fn snapshot(&self) -> BTreeMap<ActorId, CapacityProfile> {
        self.profiles.clone()
    }
}

fn validate_profile(profile: &CapacityProfile) -> Result<(), CapacityError> {
    let invalid = |reason: String| CapacityError::InvalidProfile {
        actor_id: profile.actor_id.clone(),
        reason,
    };
    if !(profile.hours_per_day > 0.0 && profile.hours_per_day <= 24.0) {
        return Err(invalid(format!(
            "hours_per_day must be in (0, 24], got {}",
            profile.hours_per_day
        )));
    }
    if profile.work_end <= profile.work_start {
        return Err(invalid("working window ends before it starts".to_string()));
    }
    if profile.min_focus_block_hours < 0.0 {
        return Err(invalid("min_focus_block_hours must be non-negative".to_string()));
    }
    if let Some(max) = profile.max_block_hours {
        if max <= 0.0 {
            return Err(invalid("max_block_hours must be positive".to_string()));
        }
        if max < profile.min_focus_block_hours {
            return Err(invalid(
                "max_block_hours is smaller than min_focus_block_hours".to_string(),
            ));
        }
    }
    Ok(())
}

/// Merge overlapping or touching intervals into a sorted, non-overlapping list.
pub fn merge_intervals(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.retain(|(s, e)| s < e);
    if intervals.is_empty() {
        return Vec::new();
    }

    intervals.sort();
    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Remove every `cut` interval from `base`. Both inputs must be merged.
pub fn subtract_intervals(base: &[Interval], cuts: &[Interval]) -> Vec<Interval> {
    let mut result = Vec::with_capacity(base.len());
    for &(start, end) in base {
        let mut cursor = start;
        // Cuts are sorted; only those overlapping [start, end) matter
        let first = cuts.partition_point(|(_, e)| *e <= start);
        for &(cut_start, cut_end) in &cuts[first..] {
            if cut_start >= end {
                break;
            }
            if cut_start > cursor {
                result.push((cursor, cut_start));
            }
            cursor = cursor.max(cut_end);
            if cursor >= end {
                break;
            }
        }
        if cursor < end {
            result.push((cursor, end));
        }
    }
    result
}

fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The actor's working-hours window on each day of the planning window.
fn working_windows(profile: &CapacityProfile, window: &PlanningWindow) -> Vec<Interval> {
    window
        .days()
        .filter(|d| profile.weekends_allowed || !is_weekend(*d))
        .filter_map(|d| {
            let start = d.and_time(profile.work_start).max(window.start);
            let end = d.and_time(profile.work_end).min(window.end);
            (start < end).then_some((start, end))
        })
        .collect()
}

/// Free time of one actor: free slots, clipped to the working window on
/// allowed days, minus busy slots.
pub fn available_intervals(
    profile: &CapacityProfile,
    slots: &[TimeSlot],
    window: &PlanningWindow,
) -> Vec<Interval> {
    let mine = slots.iter().filter(|s| s.actor_id == profile.actor_id);
    let (free, busy): (Vec<&TimeSlot>, Vec<&TimeSlot>) =
        mine.partition(|s| s.source == SlotSource::Free);

    let free = merge_intervals(free.iter().map(|s| (s.start, s.end)).collect());
    let busy = merge_intervals(busy.iter().map(|s| (s.start, s.end)).collect());
    let work = working_windows(profile, window);

    let mut clipped = Vec::new();
    for &(ws, we) in &work {
        let first = free.partition_point(|(_, e)| *e <= ws);
        for &(fs, fe) in &free[first..] {
            if fs >= we {
                break;
            }
            let (s, e) = (fs.max(ws), fe.min(we));
            if s < e {
                clipped.push((s, e));
            }
        }
    }
    subtract_intervals(&clipped, &busy)
}

/// Hours an actor can work in the window: free working time, capped per day.
pub fn available_hours(profile: &CapacityProfile, slots: &[TimeSlot], window: &PlanningWindow) -> f64 {
    let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (start, end) in available_intervals(profile, slots, window) {
        *per_day.entry(start.date()).or_insert(0.0) += hours_between(start, end);
    }
    per_day
        .values()
        .map(|h| h.min(profile.hours_per_day))
        .sum()
}

/// Available hours for every profiled actor over the window.
pub fn available_hours_by_actor(
    profiles: &BTreeMap<ActorId, CapacityProfile>,
    slots: &[TimeSlot],
    window: &PlanningWindow,
) -> BTreeMap<ActorId, f64> {
    profiles
        .iter()
        .map(|(id, p)| (id.clone(), available_hours(p, slots, window)))
        .collect()
}

/// Utilization = scheduled hours / available hours, for every actor in `available`.
///
/// Actors with no available time report zero.
pub fn utilization(
    scheduled: &BTreeMap<ActorId, f64>,
    available: &BTreeMap<ActorId, f64>,
) -> BTreeMap<ActorId, f64> {
    available
        .iter()
        .map(|(id, &hours)| {
            let booked = scheduled.get(id).copied().unwrap_or(0.0);
            let ratio = if hours > 0.0 { booked / hours } else { 0.0 };
            (id.clone(), ratio)
        })
        .collect()
}

/// Convenience: an always-free calendar for an actor over the window.
pub fn open_calendar(actor_id: &str, window: &PlanningWindow) -> Vec<TimeSlot> {
    vec![TimeSlot::free(actor_id, window.start, window.end)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn dt(day: u32, hour: u32) -> NaiveDateTime {
        // March 2025: the 3rd is a Monday, the 8th/9th a weekend
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_merge_intervals() {
        let merged = merge_intervals(vec![
            (dt(3, 12), dt(3, 14)),
            (dt(3, 9), dt(3, 10)),
            (dt(3, 10), dt(3, 11)),
            (dt(3, 13), dt(3, 15)),
            (dt(3, 16), dt(3, 16)),
        ]);
        assert_eq!(merged, vec![(dt(3, 9), dt(3, 11)), (dt(3, 12), dt(3, 15))]);
    }

    #[test]
    fn test_subtract_intervals() {
        let base = vec![(dt(3, 9), dt(3, 17))];
        let cuts = vec![(dt(3, 8), dt(3, 10)), (dt(3, 12), dt(3, 13))];
        assert_eq!(
            subtract_intervals(&base, &cuts),
            vec![(dt(3, 10), dt(3, 12)), (dt(3, 13), dt(3, 17))]
        );
        assert!(subtract_intervals(&base, &[(dt(3, 0), dt(3, 23))]).is_empty());
    }

    #[test]
    fn test_available_intervals_respect_window_weekend_and_busy() {
        let profile = CapacityProfile::standard("ann");
        let window = PlanningWindow::new(dt(7, 0), dt(10, 0)); // Fri..Mon 00:00
        let slots = vec![
            TimeSlot::free("ann", dt(7, 0), dt(10, 23)),
            TimeSlot::busy("ann", dt(7, 11), dt(7, 13)),
            TimeSlot::busy("bob", dt(7, 9), dt(7, 17)),
        ];
        let free = available_intervals(&profile, &slots, &window);
        // Friday 9-11 and 13-17; weekend skipped; Monday clipped by window end
        assert_eq!(free, vec![(dt(7, 9), dt(7, 11)), (dt(7, 13), dt(7, 17))]);
        assert!((available_hours(&profile, &slots, &window) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_available_hours_capped_per_day() {
        let mut profile = CapacityProfile::standard("ann");
        profile.hours_per_day = 4.0;
        let window = PlanningWindow::new(dt(3, 0), dt(5, 0)); // Mon, Tue
        let slots = open_calendar("ann", &window);
        assert!((available_hours(&profile, &slots, &window) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_utilization_per_actor() {
        let window = PlanningWindow::new(dt(3, 0), dt(4, 0));
        let profiles: BTreeMap<ActorId, CapacityProfile> = ["ann", "bob"]
            .iter()
            .map(|a| (a.to_string(), CapacityProfile::standard(*a)))
            .collect();
        let slots = open_calendar("ann", &window);
        let available = available_hours_by_actor(&profiles, &slots, &window);
        assert_eq!(available["ann"], 8.0);
        assert_eq!(available["bob"], 0.0);

        let scheduled = BTreeMap::from([("ann".to_string(), 6.0)]);
        let util = utilization(&scheduled, &available);
        assert!((util["ann"] - 0.75).abs() < 1e-9);
        assert_eq!(util["bob"], 0.0);
    }

    #[test]
    fn test_preference_update_validates() {
        let mut store = CapacityStore::new();
        store.upsert(CapacityProfile::standard("ann")).unwrap();

        let update = PreferenceUpdate {
            weekends_allowed: Some(true),
            max_block_hours: Some(Some(3.0)),
            ..PreferenceUpdate::default()
        };
        let profile = store.update_preferences("ann", &update).unwrap();
        assert!(profile.weekends_allowed);
        assert_eq!(profile.max_block_hours, Some(3.0));

        let bad = PreferenceUpdate {
            work_end: NaiveTime::from_hms_opt(8, 0, 0),
            ..PreferenceUpdate::default()
        };
        assert!(matches!(
            store.update_preferences("ann", &bad),
            Err(CapacityError::InvalidProfile { .. })
        ));
        // rejected updates leave the profile unchanged
        assert_eq!(
            store.get("ann").unwrap().work_end,
            NaiveTime::from_hms_opt(17, 0, 0).unwrap()
        );
        assert!(matches!(
            store.update_preferences("zed", &update),
            Err(CapacityError::UnknownActor(_))
        ));
    }
}
