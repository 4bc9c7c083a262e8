//! Assignment lifecycle.
//!
//! ```text
//! assigned ──> accepted ──> in_progress ──> completed
//!    │            │  └───────────────────────────^
//!    └────────────┴──────────────┴──> rejected
//! ```
//!
//! `completed` and `rejected` are terminal. Everything here is pure: the
//! caller persists the returned value and owns rollback if persistence fails.

use chrono::{DateTime, Utc};

use crate::error::{CareError, CareResult};
use crate::models::{Assignment, Status};

/// Whether `to` is directly reachable from `from`.
pub fn can_transition(from: Status, to: Status) -> bool {
    use Status::*;
    matches!(
        (from, to),
        (Assigned, Accepted)
            | (Assigned, Rejected)
            | (Accepted, InProgress)
            | (Accepted, Completed)
            | (Accepted, Rejected)
            | (InProgress, Completed)
            | (InProgress, Rejected)
    )
}

/// Statuses reachable in one step from `from`, in lifecycle order.
pub fn allowed_targets(from: Status) -> Vec<Status> {
    Status::ALL
        .iter()
        .copied()
        .filter(|to| can_transition(from, *to))
        .collect()
}

/// Validates a move without building the new value.
pub fn check(assignment: &Assignment, to: Status) -> CareResult<()> {
    if can_transition(assignment.status, to) {
        Ok(())
    } else {
        Err(CareError::InvalidTransition { from: assignment.status, to })
    }
}

/// Returns a copy of `assignment` moved to `to`.
///
/// Notes replace the previous ones when provided and non-blank. Entering
/// `in_progress` stamps `started_at` once; entering `completed` stamps
/// `completed_at` and sets progress to 100.
pub fn transition(
    assignment: &Assignment,
    to: Status,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> CareResult<Assignment> {
    check(assignment, to)?;

    let mut next = assignment.clone();
    next.status = to;
    next.updated_at = now;
    if let Some(n) = notes.map(str::trim).filter(|n| !n.is_empty()) {
        next.notes = n.to_string();
    }
    match to {
        Status::InProgress => {
            if next.started_at.is_none() {
                next.started_at = Some(now);
            }
        }
        Status::Completed => {
            next.completed_at = Some(now);
            next.progress = 100;
        }
        _ => {}
    }
    if to.is_terminal() {
        // No countdown is shown for a closed assignment.
        next.countdown = None;
    } else if let Some(snap) = next.countdown.as_mut() {
        // The snapshot is read relative to `updated_at`; rebase it so the
        // deadline does not move.
        let elapsed = (now - assignment.updated_at).num_milliseconds().max(0);
        snap.remaining_ms = (snap.remaining_ms - elapsed).max(0);
        snap.expired = snap.expired || snap.remaining_ms == 0;
    }
    Ok(next)
}

/// User-facing verbs mapped onto target statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Accept,
    Start,
    Complete,
    Reject,
}

impl Action {
    pub fn target(&self) -> Status {
        match self {
            Action::Accept => Status::Accepted,
            Action::Start => Status::InProgress,
            Action::Complete => Status::Completed,
            Action::Reject => Status::Rejected,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Action::Accept => "accepted",
            Action::Start => "started",
            Action::Complete => "completed",
            Action::Reject => "rejected",
        }
    }
}
