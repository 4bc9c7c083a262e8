#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use clinitask::error::{CareError, CareResult};
use clinitask::lifecycle;
use clinitask::models::{
    Assignment, Priority, ReferralRecord, StaffCategory, StaffSession, Status, TaskDefinition, TaskKind,
};
use clinitask::scheduler::{AssignmentPage, Scheduler};
use clinitask::share::Clipboard;
use clinitask::stats::Statistics;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()
}

pub fn session() -> StaffSession {
    StaffSession {
        staff_id: "dr-lee".into(),
        display_name: "Dr. Lee".into(),
        category: StaffCategory::Doctor,
    }
}

pub fn assignment(id: u64, status: Status) -> Assignment {
    Assignment {
        id,
        task: TaskDefinition {
            id: 500 + id,
            title: format!("Ward round {}", id),
            description: String::new(),
            kind: TaskKind::Daily,
            priority: Priority::Medium,
            due_date: None,
            referral_timer_minutes: None,
            active: true,
            created_at: t0(),
        },
        staff_id: "dr-lee".into(),
        status,
        notes: String::new(),
        started_at: None,
        completed_at: None,
        referral_count: 0,
        progress: 0,
        active: true,
        created_at: t0() + Duration::minutes(id as i64),
        updated_at: t0(),
        countdown: None,
    }
}

pub fn referral_assignment(id: u64, status: Status, timer_minutes: u32) -> Assignment {
    let mut a = assignment(id, status);
    a.task.kind = TaskKind::NewUser;
    a.task.title = "Invite new patients".into();
    a.task.referral_timer_minutes = Some(timer_minutes);
    a
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Scheduler double holding everything in memory.
pub struct MemoryScheduler {
    pub assignments: RefCell<Vec<Assignment>>,
    pub page_size: usize,
    pub code: String,
    pub referrals: Vec<ReferralRecord>,
    pub persist_calls: Cell<usize>,
    pub code_calls: Cell<usize>,
    pub fail_list: Cell<bool>,
    pub fail_persist: Cell<bool>,
    pub fail_stats: Cell<bool>,
    pub fail_referrals: Cell<bool>,
    pub fail_fetch: Cell<bool>,
    /// Every call reports an expired session.
    pub unauthorized: Cell<bool>,
    /// Status silently written by "someone else" before the next persist.
    pub concurrent: Cell<Option<Status>>,
}

impl MemoryScheduler {
    pub fn new(assignments: Vec<Assignment>, page_size: usize) -> MemoryScheduler {
        MemoryScheduler {
            assignments: RefCell::new(assignments),
            page_size,
            code: "DOC123".into(),
            referrals: Vec::new(),
            persist_calls: Cell::new(0),
            code_calls: Cell::new(0),
            fail_list: Cell::new(false),
            fail_persist: Cell::new(false),
            fail_stats: Cell::new(false),
            fail_referrals: Cell::new(false),
            fail_fetch: Cell::new(false),
            unauthorized: Cell::new(false),
            concurrent: Cell::new(None),
        }
    }

    fn visible(&self, staff_id: &str) -> Vec<Assignment> {
        self.assignments
            .borrow()
            .iter()
            .filter(|a| a.staff_id == staff_id && a.active)
            .cloned()
            .collect()
    }
}

impl Scheduler for MemoryScheduler {
    fn fetch_assignments(&self, staff_id: &str, filter: Option<Status>, page: u32) -> CareResult<AssignmentPage> {
        if self.unauthorized.get() {
            return Err(CareError::Unauthorized);
        }
        if self.fail_list.get() {
            return Err(CareError::Network("connection reset".into()));
        }
        let mut all = self.visible(staff_id);
        if let Some(st) = filter {
            all.retain(|a| a.status == st);
        }
        let total_pages = all.len().div_ceil(self.page_size).max(1) as u32;
        let items = all
            .into_iter()
            .skip((page as usize - 1) * self.page_size)
            .take(self.page_size)
            .collect();
        Ok(AssignmentPage { items, total_pages })
    }

    fn fetch_assignment(&self, id: u64) -> CareResult<Assignment> {
        if self.fail_fetch.get() {
            return Err(CareError::Network("connection reset".into()));
        }
        self.assignments
            .borrow()
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| CareError::NotFound(format!("assignment {}", id)))
    }

    fn persist_transition(&self, id: u64, status: Status, notes: Option<&str>) -> CareResult<Assignment> {
        self.persist_calls.set(self.persist_calls.get() + 1);
        if self.fail_persist.get() {
            return Err(CareError::Network("timeout".into()));
        }
        let mut all = self.assignments.borrow_mut();
        let a = all
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| CareError::NotFound(format!("assignment {}", id)))?;
        if let Some(st) = self.concurrent.take() {
            a.status = st;
        }
        let next = lifecycle::transition(a, status, notes, t0() + Duration::hours(1))
            .map_err(|_| CareError::Conflict { id, current: a.status })?;
        *a = next.clone();
        Ok(next)
    }

    fn fetch_statistics(&self, staff_id: &str) -> CareResult<Statistics> {
        if self.unauthorized.get() {
            return Err(CareError::Unauthorized);
        }
        if self.fail_stats.get() {
            return Err(CareError::Network("stats endpoint down".into()));
        }
        Ok(Statistics::tally(&self.visible(staff_id), date(2024, 4, 1)))
    }

    fn fetch_referral_code(&self, _staff_id: &str) -> CareResult<String> {
        self.code_calls.set(self.code_calls.get() + 1);
        Ok(self.code.clone())
    }

    fn fetch_referrals(&self, _staff_id: &str) -> CareResult<Vec<ReferralRecord>> {
        if self.fail_referrals.get() {
            return Err(CareError::Network("referrals down".into()));
        }
        Ok(self.referrals.clone())
    }

    fn fetch_staff_session(&self) -> CareResult<StaffSession> {
        Ok(session())
    }
}

/// Clipboard double keeping everything copied.
#[derive(Clone, Default)]
pub struct RecordingClipboard {
    pub copied: Rc<RefCell<Vec<String>>>,
    pub fail: Rc<Cell<bool>>,
}

impl Clipboard for RecordingClipboard {
    fn copy(&mut self, text: &str) -> CareResult<()> {
        if self.fail.get() {
            return Err(CareError::Clipboard("no terminal".into()));
        }
        self.copied.borrow_mut().push(text.to_string());
        Ok(())
    }
}
