//! Analogy-based estimation from historically completed tasks.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::TaskId;

use super::EstimationError;

/// A completed task with a known actual duration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalTask {
    pub id: TaskId,
    pub title: String,
    pub actual_hours: f64,
}

/// Caller-supplied similarity between the target task and a historical one.
///
/// Scores are expected in [0, 1]; anything outside is clamped.
pub trait SimilarityScorer {
    fn score(&self, candidate: &HistoricalTask) -> f64;
}

impl<F> SimilarityScorer for F
where
    F: Fn(&HistoricalTask) -> f64,
{
    fn score(&self, candidate: &HistoricalTask) -> f64 {
        self(candidate)
    }
}

/// Inputs for an analogy estimate.
pub struct AnalogyRequest<'a> {
    pub corpus: &'a [HistoricalTask],
    pub similarity: &'a dyn SimilarityScorer,
    /// Number of most similar tasks to average over.
    pub top_k: usize,
    /// Relative adjustment, e.g. 0.2 for "20% more complex than the analogues".
    pub complexity_delta: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnalogyOutcome {
    pub expected: f64,
    pub interval: (f64, f64),
    pub raw_confidence: f64,
    pub similar_task_ids: Vec<TaskId>,
}

/// Similarity-weighted average of the top-k analogues, scaled by the complexity delta.
///
/// Confidence is the mean similarity discounted by the spread of the selected
/// similarity scores, so disagreeing analogues lower it.
pub fn estimate_by_analogy(
    task_id: &str,
    request: &AnalogyRequest<'_>,
) -> Result<AnalogyOutcome, EstimationError> {
    if !(request.complexity_delta.is_finite() && request.complexity_delta > -1.0) {
        return Err(EstimationError::InvalidEstimateInput {
            task_id: task_id.to_string(),
            reason: format!(
                "complexity delta must be greater than -1, got {}",
                request.complexity_delta
            ),
        });
    }

    let mut scored: Vec<(f64, &HistoricalTask)> = request
        .corpus
        .iter()
        .filter(|h| h.actual_hours.is_finite() && h.actual_hours > 0.0)
        .map(|h| (request.similarity.score(h), h))
        .filter(|(s, _)| s.is_finite() && *s > 0.0)
        .map(|(s, h)| (s.min(1.0), h))
        .collect();

    if scored.is_empty() {
        return Err(EstimationError::EmptyCorpus(task_id.to_string()));
    }

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.id.cmp(&b.1.id))
    });
    scored.truncate(request.top_k.max(1));

    let weight_sum: f64 = scored.iter().map(|(s, _)| s).sum();
    let weighted: f64 = scored.iter().map(|(s, h)| s * h.actual_hours).sum();
    let factor = 1.0 + request.complexity_delta;
    let expected = weighted / weight_sum * factor;

    let n = scored.len() as f64;
    let mean_similarity = weight_sum / n;
    let spread = (scored
        .iter()
        .map(|(s, _)| (s - mean_similarity).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();
    let raw_confidence = (mean_similarity * (1.0 - spread)).clamp(0.0, 1.0);

    let low = scored
        .iter()
        .map(|(_, h)| h.actual_hours)
        .fold(f64::INFINITY, f64::min)
        * factor;
    let high = scored
        .iter()
        .map(|(_, h)| h.actual_hours)
        .fold(0.0_f64, f64::max)
        * factor;

    Ok(AnalogyOutcome {
        expected,
        interval: (low, high),
        raw_confidence,
        similar_task_ids: scored.iter().map(|(_, h)| h.id.clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> Vec<HistoricalTask> {
        vec![
            HistoricalTask {
                id: "h1".to_string(),
                title: "login page".to_string(),
                actual_hours: 10.0,
            },
            HistoricalTask {
                id: "h2".to_string(),
                title: "signup page".to_string(),
                actual_hours: 20.0,
            },
            HistoricalTask {
                id: "h3".to_string(),
                title: "billing export".to_string(),
                actual_hours: 100.0,
            },
        ]
    }

    fn by_id(h: &HistoricalTask) -> f64 {
        match h.id.as_str() {
            "h1" => 0.8,
            "h2" => 0.8,
            _ => 0.1,
        }
    }

    #[test]
    fn test_top_k_weighted_average() {
        let corpus = history();
        let request = AnalogyRequest {
            corpus: &corpus,
            similarity: &by_id,
            top_k: 2,
            complexity_delta: 0.0,
        };
        let outcome = estimate_by_analogy("t", &request).unwrap();
        assert!((outcome.expected - 15.0).abs() < 1e-9);
        assert_eq!(outcome.similar_task_ids, vec!["h1", "h2"]);
        assert_eq!(outcome.interval, (10.0, 20.0));
        // identical similarities: confidence is the similarity itself
        assert!((outcome.raw_confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_complexity_delta_scales_result() {
        let corpus = history();
        let request = AnalogyRequest {
            corpus: &corpus,
            similarity: &by_id,
            top_k: 2,
            complexity_delta: 0.5,
        };
        let outcome = estimate_by_analogy("t", &request).unwrap();
        assert!((outcome.expected - 22.5).abs() < 1e-9);
    }

    #[test]
    fn test_divergent_similarities_lower_confidence() {
        let corpus = history();
        let tight = AnalogyRequest {
            corpus: &corpus,
            similarity: &by_id,
            top_k: 2,
            complexity_delta: 0.0,
        };
        let spread_scorer = |h: &HistoricalTask| if h.id == "h1" { 0.95 } else { 0.65 };
        let spread = AnalogyRequest {
            corpus: &corpus,
            similarity: &spread_scorer,
            top_k: 2,
            complexity_delta: 0.0,
        };
        let tight_conf = estimate_by_analogy("t", &tight).unwrap().raw_confidence;
        let spread_conf = estimate_by_analogy("t", &spread).unwrap().raw_confidence;
        // same mean similarity (0.8), wider spread
        assert!(spread_conf < tight_conf);
    }

    #[test]
    fn test_no_similar_tasks() {
        let corpus = history();
        let zero = |_: &HistoricalTask| 0.0;
        let request = AnalogyRequest {
            corpus: &corpus,
            similarity: &zero,
            top_k: 3,
            complexity_delta: 0.0,
        };
        assert!(matches!(
            estimate_by_analogy("t", &request),
            Err(EstimationError::EmptyCorpus(_))
        ));
    }
}
