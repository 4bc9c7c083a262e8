//! Referral window countdowns.
//!
//! [`Countdown::compute`] is a pure function of a deadline and the current
//! time. [`Ticker`] is the single shared 1 Hz scheduler that recomputes every
//! visible countdown from its stored deadline, so individual rows never drift
//! against each other.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::models::Assignment;
use crate::referral::is_referral_eligible;

/// Below this many milliseconds a running countdown is flagged urgent.
pub const URGENT_THRESHOLD_MS: i64 = 3_600_000;

/// Remaining time until a deadline at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub remaining_ms: i64,
}

impl Countdown {
    pub fn compute(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Countdown {
        Countdown { remaining_ms: (deadline - now).num_milliseconds() }
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_ms <= 0
    }

    /// Advisory only: under an hour left and not yet expired.
    pub fn is_urgent(&self) -> bool {
        !self.is_expired() && self.remaining_ms < URGENT_THRESHOLD_MS
    }

    /// `HH:MM:SS`, clamped at `00:00:00` once expired. Partial seconds are dropped.
    pub fn display(&self) -> String {
        if self.is_expired() {
            return "00:00:00".to_string();
        }
        let secs = self.remaining_ms / 1000;
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// The instant a referral window closes for `assignment`, if it has one.
///
/// A snapshot reported by the scheduler wins; it is anchored on `updated_at`.
/// Otherwise the definition's timer runs from `created_at`. No transition
/// moves it, so starting the task never reopens a closed window.
pub fn deadline_for(assignment: &Assignment) -> Option<DateTime<Utc>> {
    if let Some(snap) = assignment.countdown {
        let remaining = if snap.expired { 0 } else { snap.remaining_ms.max(0) };
        return Some(assignment.updated_at + chrono::Duration::milliseconds(remaining));
    }
    let minutes = assignment.task.referral_timer_minutes?;
    Some(assignment.created_at + chrono::Duration::minutes(i64::from(minutes)))
}

/// Whether a live countdown belongs on this row at all.
pub fn shows_countdown(assignment: &Assignment) -> bool {
    assignment.active && !assignment.status.is_terminal() && is_referral_eligible(assignment)
}

/// Deadlines of every row that should be ticking.
pub fn visible_deadlines<'a, I>(assignments: I) -> Vec<(u64, DateTime<Utc>)>
where
    I: IntoIterator<Item = &'a Assignment>,
{
    assignments
        .into_iter()
        .filter(|a| shows_countdown(a))
        .filter_map(|a| deadline_for(a).map(|d| (a.id, d)))
        .collect()
}

#[derive(Debug, Clone)]
struct Watched {
    deadline: DateTime<Utc>,
    value: Countdown,
    frozen: bool,
}

/// Shared scheduler driving all visible countdowns.
#[derive(Debug)]
pub struct Ticker {
    interval: Duration,
    watched: HashMap<u64, Watched>,
    next_due: Option<Instant>,
}

impl Ticker {
    pub fn new(interval: Duration) -> Ticker {
        Ticker { interval, watched: HashMap::new(), next_due: None }
    }

    /// Replaces the watched set with the rows currently on screen.
    ///
    /// Rows that left the screen are dropped. A new or changed deadline is
    /// computed immediately and restarts the interval instead of adding a
    /// second schedule. With nothing left to tick the schedule is cleared.
    pub fn sync(&mut self, deadlines: &[(u64, DateTime<Utc>)], now: DateTime<Utc>, at: Instant) {
        let mut changed = self.watched.len() != deadlines.len();
        let mut next = HashMap::with_capacity(deadlines.len());
        for &(id, deadline) in deadlines {
            match self.watched.remove(&id) {
                Some(w) if w.deadline == deadline => {
                    next.insert(id, w);
                }
                _ => {
                    changed = true;
                    let value = Countdown::compute(deadline, now);
                    next.insert(id, Watched { deadline, value, frozen: value.is_expired() });
                }
            }
        }
        self.watched = next;

        if !self.is_active() {
            self.next_due = None;
        } else if changed || self.next_due.is_none() {
            self.next_due = Some(at + self.interval);
        }
    }

    /// Whether any watched countdown is still running.
    pub fn is_active(&self) -> bool {
        self.watched.values().any(|w| !w.frozen)
    }

    /// Time left before the next tick is due, `None` when idle.
    pub fn timeout(&self, at: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(at))
    }

    /// Recomputes every running countdown if the tick is due.
    ///
    /// Countdowns that reach zero freeze at `00:00:00` and stop ticking.
    /// Returns whether a tick happened.
    pub fn tick(&mut self, now: DateTime<Utc>, at: Instant) -> bool {
        match self.next_due {
            Some(due) if at >= due => {}
            _ => return false,
        }
        for w in self.watched.values_mut().filter(|w| !w.frozen) {
            w.value = Countdown::compute(w.deadline, now);
            if w.value.is_expired() {
                w.frozen = true;
                tracing::debug!(deadline = %w.deadline, "countdown expired");
            }
        }
        self.next_due = if self.is_active() { Some(at + self.interval) } else { None };
        true
    }

    pub fn get(&self, id: u64) -> Option<Countdown> {
        self.watched.get(&id).map(|w| w.value)
    }

    pub fn clear(&mut self) {
        self.watched.clear();
        self.next_due = None;
    }
}
