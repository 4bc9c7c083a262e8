use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Assignment, Status};

/// Summary counts over a set of assignments.
///
/// Always produced by a full fold over the set; there is no way to adjust
/// an existing value, so it cannot drift from the data it describes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Statistics {
    pub total: usize,
    /// Assigned or accepted.
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    /// Past due and not yet completed or rejected.
    pub overdue: usize,
}

impl Statistics {
    pub fn tally<'a, I>(assignments: I, today: NaiveDate) -> Statistics
    where
        I: IntoIterator<Item = &'a Assignment>,
    {
        assignments.into_iter().fold(Statistics::default(), |mut s, a| {
            s.total += 1;
            match a.status {
                Status::Assigned | Status::Accepted => s.pending += 1,
                Status::InProgress => s.in_progress += 1,
                Status::Completed => s.completed += 1,
                Status::Rejected => {}
            }
            if a.is_overdue(today) {
                s.overdue += 1;
            }
            s
        })
    }

    /// Share of the set that is completed, as a whole percentage.
    pub fn completion_rate(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed * 100) / self.total) as u8
    }
}
