//! Splitting long tasks into block-sized fragments.

use crate::models::Task;

const SPLIT_EPSILON: f64 = 1e-6;

/// Fragment ID for the `n`th (1-based) piece of `parent_id`.
pub fn fragment_id(parent_id: &str, n: usize) -> String {
    format!("{}#{}", parent_id, n)
}

/// Chunk sizes for `duration` hours in blocks of at most `max_block` hours.
///
/// Every chunk is `max_block` long except possibly the last.
pub fn chunk_hours(duration: f64, max_block: f64) -> Vec<f64> {
    if duration <= max_block + SPLIT_EPSILON || max_block <= 0.0 {
        return vec![duration];
    }
    let mut chunks = Vec::new();
    let mut remaining = duration;
    while remaining > max_block + SPLIT_EPSILON {
        chunks.push(max_block);
        remaining -= max_block;
    }
    if remaining > SPLIT_EPSILON {
        chunks.push(remaining);
    }
    chunks
}

/// Split a task into fragments no longer than `max_block` hours.
///
/// Returns an empty list when the task already fits in one block.
pub fn split_task(task: &Task, max_block: f64) -> Vec<Task> {
    let chunks = chunk_hours(task.duration_hours(), max_block);
    if chunks.len() < 2 {
        return Vec::new();
    }
    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, hours)| Task {
            id: fragment_id(&task.id, i + 1),
            title: format!("{} ({}/{})", task.title, i + 1, total),
            milestone_id: task.milestone_id.clone(),
            estimated_hours: Some(hours),
            actual_hours: None,
            status: task.status,
            priority: task.priority,
            parent_task_id: Some(task.id.clone()),
            assigned_actor: task.assigned_actor.clone(),
        })
        .collect()
}
