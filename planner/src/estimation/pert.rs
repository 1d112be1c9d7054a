//! Three-point (PERT) estimation.

use super::EstimationError;

/// Output of the PERT formula before confidence calibration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PertOutcome {
    pub expected: f64,
    pub std_dev: f64,
    /// Expected value ±1 standard deviation.
    pub interval: (f64, f64),
    pub raw_confidence: f64,
}

/// Compute `expected = (o + 4m + p) / 6` and `std_dev = (p - o) / 6`.
///
/// Inputs must be finite, non-negative and satisfy `o <= m <= p`.
pub fn three_point(
    task_id: &str,
    optimistic: f64,
    most_likely: f64,
    pessimistic: f64,
) -> Result<PertOutcome, EstimationError> {
    let invalid = |reason: String| EstimationError::InvalidEstimateInput {
        task_id: task_id.to_string(),
        reason,
    };

    if ![optimistic, most_likely, pessimistic]
        .iter()
        .all(|v| v.is_finite() && *v >= 0.0)
    {
        return Err(invalid(format!(
            "three-point values must be finite and non-negative, got ({}, {}, {})",
            optimistic, most_likely, pessimistic
        )));
    }
    if !(optimistic <= most_likely && most_likely <= pessimistic) {
        return Err(invalid(format!(
            "expected optimistic <= most_likely <= pessimistic, got ({}, {}, {})",
            optimistic, most_likely, pessimistic
        )));
    }

    let expected = (optimistic + 4.0 * most_likely + pessimistic) / 6.0;
    let std_dev = (pessimistic - optimistic) / 6.0;
    // Relative spread: a tight range relative to the estimate is a confident one
    let raw_confidence = if expected > 0.0 {
        (1.0 - std_dev / expected).clamp(0.0, 1.0)
    } else {
        1.0
    };

    Ok(PertOutcome {
        expected,
        std_dev,
        interval: ((expected - std_dev).max(0.0), expected + std_dev),
        raw_confidence,
    })
}
