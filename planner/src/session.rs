//! One planning session per goal, with a single writer at a time.
//!
//! Sessions for different goals never share state, so passes for independent
//! goals run in parallel. A second pass for the same goal either waits its
//! turn (FIFO, the order `tokio::sync::Mutex` grants the lock) or is rejected
//! with [`PlannerError::AlreadyScheduling`], per [`ConcurrencyPolicy`].

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{Mutex as SessionLock, OwnedMutexGuard};

use crate::config::{ConcurrencyPolicy, PlannerConfig};
use crate::engine::{GoalSession, PlannerError};
use crate::log_checks;
use crate::models::GoalId;

/// Exclusive access to one goal's session; released on drop.
pub type SessionGuard = OwnedMutexGuard<GoalSession>;

/// Registry of goal sessions.
pub struct PlanningSessions {
    config: PlannerConfig,
    sessions: Mutex<FxHashMap<GoalId, Arc<SessionLock<GoalSession>>>>,
}

impl PlanningSessions {
    pub fn new(config: PlannerConfig) -> Result<Self, PlannerError> {
        config.validate()?;
        Ok(Self {
            config,
            sessions: Mutex::new(FxHashMap::default()),
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Goals with an open session, sorted.
    pub fn goals(&self) -> Vec<GoalId> {
        let mut goals: Vec<GoalId> = self.sessions.lock().keys().cloned().collect();
        goals.sort();
        goals
    }

    /// Drop a goal's session (e.g. when the goal is archived).
    ///
    /// A pass already holding the session keeps it until the pass ends.
    pub fn close(&self, goal_id: &str) -> bool {
        self.sessions.lock().remove(goal_id).is_some()
    }

    fn session(&self, goal_id: &str) -> Result<Arc<SessionLock<GoalSession>>, PlannerError> {
        let mut sessions = self.sessions.lock();
        if let Some(existing) = sessions.get(goal_id) {
            return Ok(Arc::clone(existing));
        }
        let created = Arc::new(SessionLock::new(GoalSession::new(
            goal_id,
            self.config.clone(),
        )?));
        sessions.insert(goal_id.to_string(), Arc::clone(&created));
        Ok(created)
    }

    /// Take the goal's session, creating it on first use.
    pub async fn acquire(&self, goal_id: &str) -> Result<SessionGuard, PlannerError> {
        let session = self.session(goal_id)?;
        match self.config.concurrency {
            ConcurrencyPolicy::Queue => Ok(session.lock_owned().await),
            ConcurrencyPolicy::Reject => session.try_lock_owned().map_err(|_| {
                log_checks!(self.config.verbosity, goal_id, "Rejected concurrent pass");
                PlannerError::AlreadyScheduling {
                    goal_id: goal_id.to_string(),
                }
            }),
        }
    }

    /// Run `f` with exclusive access to the goal's session.
    pub async fn with_session<R, F>(&self, goal_id: &str, f: F) -> Result<R, PlannerError>
    where
        F: FnOnce(&mut GoalSession) -> Result<R, PlannerError>,
    {
        let mut guard = self.acquire(goal_id).await?;
        f(&mut *guard)
    }
}
