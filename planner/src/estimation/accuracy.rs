//! Running per-method estimation accuracy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::EstimationMethod;

/// Largest confidence discount applied by calibration.
const MAX_CALIBRATION_DISCOUNT: f64 = 0.9;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Samples {
    count: usize,
    /// Sum of absolute percentage errors as fractions.
    ape_sum: f64,
}

/// Accuracy summary for one estimation method.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodAccuracy {
    pub method: EstimationMethod,
    pub samples: usize,
    /// Mean absolute percentage error, in percent.
    pub mape_percent: f64,
}

/// Mean absolute percentage error per estimation method.
///
/// Feeding an actual duration never rewrites past estimates; it only changes
/// how much confidence future estimates from the same method receive.
#[derive(Clone, Debug, Default)]
pub struct AccuracyTracker {
    by_method: BTreeMap<EstimationMethod, Samples>,
}

impl AccuracyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed task; returns the absolute percentage error (fraction).
    pub fn record(&mut self, method: EstimationMethod, estimated: f64, actual: f64) -> f64 {
        let ape = (actual - estimated).abs() / actual;
        let entry = self.by_method.entry(method).or_default();
        entry.count += 1;
        entry.ape_sum += ape;
        ape
    }

    /// Mean absolute percentage error in percent, if any samples exist.
    pub fn mape(&self, method: EstimationMethod) -> Option<f64> {
        self.by_method
            .get(&method)
            .filter(|s| s.count > 0)
            .map(|s| s.ape_sum / s.count as f64 * 100.0)
    }

    /// Scale a raw confidence by the method's track record.
    pub fn calibrate(&self, method: EstimationMethod, raw_confidence: f64) -> f64 {
        let discount = self
            .mape(method)
            .map(|m| (m / 100.0).min(MAX_CALIBRATION_DISCOUNT))
            .unwrap_or(0.0);
        (raw_confidence * (1.0 - discount)).clamp(0.0, 1.0)
    }

    pub fn report(&self) -> Vec<MethodAccuracy> {
        self.by_method
            .iter()
            .filter(|(_, s)| s.count > 0)
            .map(|(method, s)| MethodAccuracy {
                method: *method,
                samples: s.count,
                mape_percent: s.ape_sum / s.count as f64 * 100.0,
            })
            .collect()
    }
}
