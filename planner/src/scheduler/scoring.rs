//! Slot scoring.
//!
//! `score = w_priority * priority_norm + w_dependency * dependency_urgency
//!        + w_preference * preference_match`

use chrono::NaiveDateTime;

use crate::config::SlotWeights;
use crate::models::hours_between;

/// Normalize a 0-100 priority to [0, 1].
pub fn priority_norm(priority: i32) -> f64 {
    priority.clamp(0, 100) as f64 / 100.0
}

/// Urgency from slack: 1.0 on the critical path, decaying exponentially.
///
/// Formula: `urgency = exp(-slack / (K * avg_duration))`
pub fn dependency_urgency(slack_hours: f64, k: f64, avg_duration_hours: f64) -> f64 {
    if slack_hours <= 0.0 {
        return 1.0;
    }
    let denominator = k * avg_duration_hours.max(1.0);
    (-slack_hours / denominator).exp()
}

/// How well a candidate slot suits a block, in [0, 1].
#[derive(Clone, Copy, Debug)]
pub struct SlotFit {
    /// Earliest instant the block is allowed to start.
    pub earliest: NaiveDateTime,
    pub slot_start: NaiveDateTime,
    pub slot_hours: f64,
    pub block_hours: f64,
    /// End of the previous fragment of the same task, if any.
    pub previous_end: Option<NaiveDateTime>,
}

/// Preference term: sooner slots, tight fits and adjacency to the previous fragment score higher.
pub fn preference_match(fit: &SlotFit) -> f64 {
    let wait_hours = hours_between(fit.earliest, fit.slot_start).max(0.0);
    let earliness = 1.0 / (1.0 + wait_hours / 24.0);
    // A tight fit leaves larger gaps intact for other tasks
    let tightness = if fit.slot_hours > 0.0 {
        (fit.block_hours / fit.slot_hours).min(1.0)
    } else {
        0.0
    };

    match fit.previous_end {
        Some(prev) => {
            let gap = hours_between(prev, fit.slot_start).max(0.0);
            let adjacency = 1.0 / (1.0 + gap);
            0.4 * earliness + 0.4 * adjacency + 0.2 * tightness
        }
        None => 0.7 * earliness + 0.3 * tightness,
    }
}

pub fn slot_score(weights: &SlotWeights, priority: f64, urgency: f64, preference: f64) -> f64 {
    weights.priority * priority + weights.dependency * urgency + weights.preference * preference
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_urgency_max_on_critical_path() {
        assert_eq!(dependency_urgency(0.0, 2.0, 4.0), 1.0);
        let loose = dependency_urgency(16.0, 2.0, 4.0);
        let tight = dependency_urgency(2.0, 2.0, 4.0);
        assert!(tight > loose);
        assert!((loose - (-2.0_f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn test_priority_norm_clamps() {
        assert_eq!(priority_norm(50), 0.5);
        assert_eq!(priority_norm(150), 1.0);
        assert_eq!(priority_norm(-3), 0.0);
    }

    #[test]
    fn test_preference_favors_earlier_and_adjacent() {
        let base = SlotFit {
            earliest: dt(3, 9),
            slot_start: dt(3, 9),
            slot_hours: 2.0,
            block_hours: 2.0,
            previous_end: None,
        };
        let later = SlotFit {
            slot_start: dt(4, 9),
            ..base
        };
        assert!(preference_match(&base) > preference_match(&later));
        assert!((preference_match(&base) - 1.0).abs() < 1e-9);

        let adjacent = SlotFit {
            slot_start: dt(3, 11),
            previous_end: Some(dt(3, 11)),
            ..base
        };
        let gapped = SlotFit {
            slot_start: dt(3, 11),
            previous_end: Some(dt(3, 9)),
            ..base
        };
        assert!(preference_match(&adjacent) > preference_match(&gapped));
    }

    #[test]
    fn test_weighted_score() {
        let weights = SlotWeights {
            priority: 0.5,
            dependency: 0.3,
            preference: 0.2,
        };
        assert!((slot_score(&weights, 1.0, 1.0, 1.0) - 1.0).abs() < 1e-9);
        assert!((slot_score(&weights, 0.5, 0.0, 0.0) - 0.25).abs() < 1e-9);
    }
}
