//! Slot scheduler: places estimated tasks into actors' free calendar time.
//!
//! Tasks are visited in dependency order. Each one goes to the highest-scoring
//! free slot on an eligible actor, subject to dependency timing, the daily
//! hours cap and the minimum focus block. Tasks longer than the block size are
//! split into fragments.

mod core;
mod resource_schedule;
mod scoring;
mod splitting;
mod state;

pub use core::{
    ScheduleOutcome, ScheduleRequest, SlotScheduler, TaskPlacement, Unplaced, UnplacedReason,
};
pub use resource_schedule::ActorSchedule;
pub use scoring::{dependency_urgency, preference_match, priority_norm, slot_score, SlotFit};
pub use splitting::{chunk_hours, fragment_id, split_task};
pub use state::{PlacementLedger, PlacementState};
