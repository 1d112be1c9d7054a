//! Verbosity-gated `tracing` events.
//!
//! `PlannerConfig::verbosity` selects how much of the planner's reasoning is
//! emitted. The gate is checked before any field is formatted, so a silent
//! planner pays one integer comparison per call site. Warnings (advisor
//! fallbacks, incomplete optimization) go straight to `tracing::warn!` and are
//! never gated.

use serde::{Deserialize, Serialize};

/// How much the planner logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Verbosity {
    Silent = 0,
    /// Placements, splits, reassignments, committed generations
    Changes = 1,
    /// Rejected slots and moves, unplaced reasons
    Checks = 2,
    /// Per-slot scores and pass internals
    Debug = 3,
}

impl Verbosity {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::Silent),
            1 => Some(Self::Changes),
            2 => Some(Self::Checks),
            3 => Some(Self::Debug),
            _ => None,
        }
    }

    #[inline]
    pub fn allows(level: u8, at: Verbosity) -> bool {
        level >= at as u8
    }
}

/// `tracing::info!` when verbosity is at least [`Verbosity::Changes`].
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $crate::logging::Verbosity::allows($verbosity, $crate::logging::Verbosity::Changes) {
            ::tracing::info!($($arg)*);
        }
    };
}

/// `tracing::debug!` when verbosity is at least [`Verbosity::Checks`].
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $crate::logging::Verbosity::allows($verbosity, $crate::logging::Verbosity::Checks) {
            ::tracing::debug!($($arg)*);
        }
    };
}

/// `tracing::trace!` when verbosity is [`Verbosity::Debug`].
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $crate::logging::Verbosity::allows($verbosity, $crate::logging::Verbosity::Debug) {
            ::tracing::trace!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        assert_eq!(Verbosity::from_level(2), Some(Verbosity::Checks));
        assert_eq!(Verbosity::from_level(4), None);
        assert!(Verbosity::allows(2, Verbosity::Changes));
        assert!(Verbosity::allows(2, Verbosity::Checks));
        assert!(!Verbosity::allows(2, Verbosity::Debug));
        assert!(!Verbosity::allows(0, Verbosity::Changes));
    }

    #[test]
    fn test_macros_accept_fields_and_format_args() {
        let verbosity = Verbosity::Debug as u8;
        log_changes!(verbosity, "placed {}", "a");
        log_checks!(verbosity, task_id = "b", "skipping");
        log_debug!(verbosity, "score {:.2}", 0.5);
    }
}
