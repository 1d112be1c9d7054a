//! Optional advice from an external model, bounded by a timeout.
//!
//! The advisor never changes the schedule. Whatever it says (or fails to say)
//! the deterministic placement stands; a timeout, transport error or malformed
//! reply becomes [`Advice::Fallback`] and is logged, not returned as an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::models::{Conflict, GoalId, ScheduledBlock};
use crate::scheduler::Unplaced;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdvisoryError {
    #[error("Advisor did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Advisor request failed: {0}")]
    Transport(String),
    #[error("Advisor response is malformed: {0}")]
    Malformed(String),
}

/// What the advisor gets to look at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    pub goal_id: GoalId,
    pub generation: u32,
    pub blocks: Vec<ScheduledBlock>,
    pub conflicts: Vec<Conflict>,
    pub unplaced: Vec<Unplaced>,
}

/// Advisor output, or the reason the deterministic plan stands alone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Advice {
    Available {
        suggestion: String,
        alternatives: Vec<String>,
    },
    Fallback {
        reason: String,
    },
}

impl Advice {
    pub fn is_available(&self) -> bool {
        matches!(self, Advice::Available { .. })
    }
}

/// External advisory collaborator. Returns its raw JSON reply.
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn advise(&self, request: &AdvisoryRequest) -> Result<String, AdvisoryError>;
}

#[derive(Deserialize)]
struct AdvicePayload {
    suggestion: Option<String>,
    #[serde(default)]
    alternatives: Vec<String>,
}

/// Parse an advisor reply; a reply without a suggestion is malformed.
pub fn parse_advice(raw: &str) -> Result<Advice, AdvisoryError> {
    let payload: AdvicePayload =
        serde_json::from_str(raw).map_err(|e| AdvisoryError::Malformed(e.to_string()))?;
    let suggestion = payload
        .suggestion
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AdvisoryError::Malformed("missing suggestion".to_string()))?;
    Ok(Advice::Available {
        suggestion,
        alternatives: payload.alternatives,
    })
}

/// Ask the advisor once, falling back on timeout, error or a malformed reply.
pub async fn consult(advisor: &dyn Advisor, request: &AdvisoryRequest, limit: Duration) -> Advice {
    let result = match tokio::time::timeout(limit, advisor.advise(request)).await {
        Ok(Ok(raw)) => parse_advice(&raw),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(AdvisoryError::Timeout(limit)),
    };

    match result {
        Ok(advice) => advice,
        Err(e) => {
            warn!(
                goal_id = %request.goal_id,
                generation = request.generation,
                error = %e,
                "Advisor unavailable, keeping deterministic plan"
            );
            Advice::Fallback {
                reason: e.to_string(),
            }
        }
    }
}
