use chrono::{DateTime, Duration, Utc};

use crate::error::CareResult;
use crate::models::{Assignment, ReferralRecord, TaskKind};
use crate::scheduler::Scheduler;

/// Whether referral affordances belong on this assignment.
///
/// True for definitions of kind `new_user`, definitions whose title mentions
/// a referral, and anything that already carries referrals. This never gates
/// the lifecycle.
pub fn is_referral_eligible(assignment: &Assignment) -> bool {
    assignment.task.kind == TaskKind::NewUser
        || assignment.task.title.to_lowercase().contains("referral")
        || assignment.referral_count > 0
}

/// Session-scoped holder of the staff member's referral code.
///
/// The code is fetched on first use and then served from memory; it does not
/// change for the rest of the session.
#[derive(Debug, Default)]
pub struct ReferralTracker {
    code: Option<String>,
}

impl ReferralTracker {
    pub fn new() -> ReferralTracker {
        ReferralTracker::default()
    }

    pub fn code<S: Scheduler + ?Sized>(&mut self, scheduler: &S, staff_id: &str) -> CareResult<&str> {
        if self.code.is_none() {
            let code = scheduler.fetch_referral_code(staff_id)?;
            tracing::debug!(staff_id, %code, "referral code cached");
            self.code = Some(code);
        }
        Ok(self.code.as_deref().unwrap_or_default())
    }

    pub fn cached(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// Totals over a staff member's converted referrals.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferralSummary {
    pub total: usize,
    pub last_week: usize,
    /// Newest first.
    pub recent: Vec<ReferralRecord>,
}

impl ReferralSummary {
    pub fn from_records(records: &[ReferralRecord], now: DateTime<Utc>, recent: usize) -> ReferralSummary {
        let week_ago = now - Duration::days(7);
        let mut sorted = records.to_vec();
        sorted.sort_by(|a, b| b.joined_at.cmp(&a.joined_at).then(b.id.cmp(&a.id)));
        sorted.truncate(recent);
        ReferralSummary {
            total: records.len(),
            last_week: records.iter().filter(|r| r.joined_at > week_ago).count(),
            recent: sorted,
        }
    }
}
