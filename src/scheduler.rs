//! Contract of the external scheduling and referral authority.

use serde::{Deserialize, Serialize};

use crate::error::CareResult;
use crate::models::{Assignment, ReferralRecord, StaffSession, Status};
use crate::stats::Statistics;

/// One page of assignments as returned by the scheduler.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AssignmentPage {
    pub items: Vec<Assignment>,
    pub total_pages: u32,
}

/// Operations the core consumes from the scheduling authority.
///
/// Implementations report `Unauthorized` when the session is invalid,
/// `Network` on transport failure and `Conflict` when a transition no longer
/// applies to the stored status.
pub trait Scheduler {
    /// Lists one 1-indexed page of the staff member's assignments, filtered
    /// server-side by status when `filter` is set.
    fn fetch_assignments(
        &self,
        staff_id: &str,
        filter: Option<Status>,
        page: u32,
    ) -> CareResult<AssignmentPage>;

    fn fetch_assignment(&self, id: u64) -> CareResult<Assignment>;

    fn persist_transition(
        &self,
        id: u64,
        status: Status,
        notes: Option<&str>,
    ) -> CareResult<Assignment>;

    /// Aggregate counts over every assignment of the staff member, not just one page.
    fn fetch_statistics(&self, staff_id: &str) -> CareResult<Statistics>;

    fn fetch_referral_code(&self, staff_id: &str) -> CareResult<String>;

    fn fetch_referrals(&self, staff_id: &str) -> CareResult<Vec<ReferralRecord>>;

    fn fetch_staff_session(&self) -> CareResult<StaffSession>;
}
