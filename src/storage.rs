//! Local JSON-file stand-in for the scheduling and referral authority.
//!
//! Every call reads the files fresh and writes them back whole, so the
//! binary behaves like a client of a remote service: nothing is cached here.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CareError, CareResult};
use crate::lifecycle;
use crate::models::{
    Assignment, Priority, ReferralRecord, StaffCategory, StaffSession, Status, TaskDefinition, TaskKind,
};
use crate::referral::is_referral_eligible;
use crate::scheduler::{AssignmentPage, Scheduler};
use crate::stats::Statistics;

/// Assignment as stored: the definition is kept by reference.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct AssignmentRow {
    id: u64,
    task_id: u64,
    staff_id: String,
    status: Status,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    referral_count: u32,
    #[serde(default)]
    progress: u8,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AssignmentRow {
    fn populate(&self, task: &TaskDefinition) -> Assignment {
        Assignment {
            id: self.id,
            task: task.clone(),
            staff_id: self.staff_id.clone(),
            status: self.status,
            notes: self.notes.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            referral_count: self.referral_count,
            progress: self.progress,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
            countdown: None,
        }
    }

    fn absorb(&mut self, a: &Assignment) {
        self.status = a.status;
        self.notes = a.notes.clone();
        self.started_at = a.started_at;
        self.completed_at = a.completed_at;
        self.progress = a.progress;
        self.updated_at = a.updated_at;
    }
}

/// Referral codes by staff id, plus every converted referral.
#[derive(Serialize, Deserialize, Debug, Default)]
struct ReferralBook {
    #[serde(default)]
    codes: BTreeMap<String, String>,
    #[serde(default)]
    records: Vec<ReferralRecord>,
}

/// Scheduler backed by JSON files in one directory.
#[derive(Debug, Clone)]
pub struct JsonScheduler {
    dir: PathBuf,
    page_size: u32,
}

impl JsonScheduler {
    pub fn new(dir: impl Into<PathBuf>, page_size: u32) -> JsonScheduler {
        JsonScheduler { dir: dir.into(), page_size: page_size.max(1) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn tasks_path(&self) -> PathBuf {
        self.dir.join("tasks.json")
    }

    fn assignments_path(&self) -> PathBuf {
        self.dir.join("assignments.json")
    }

    fn referrals_path(&self) -> PathBuf {
        self.dir.join("referrals.json")
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join("session.json")
    }

    fn definitions(&self) -> CareResult<Vec<TaskDefinition>> {
        read_json(&self.tasks_path())
    }

    fn rows(&self) -> CareResult<Vec<AssignmentRow>> {
        read_json(&self.assignments_path())
    }

    fn book(&self) -> CareResult<ReferralBook> {
        read_json(&self.referrals_path())
    }

    /// Fails with `Unauthorized` unless `staff_id` is the signed-in member.
    fn authorize(&self, staff_id: &str) -> CareResult<()> {
        let session = self.fetch_staff_session()?;
        if session.staff_id != staff_id {
            return Err(CareError::Unauthorized);
        }
        Ok(())
    }

    /// Rows of `staff_id` with their definitions filled in, newest first.
    fn joined(&self, staff_id: &str) -> CareResult<Vec<Assignment>> {
        let defs: BTreeMap<u64, TaskDefinition> =
            self.definitions()?.into_iter().map(|d| (d.id, d)).collect();
        let mut out: Vec<Assignment> = self
            .rows()?
            .iter()
            .filter(|r| r.staff_id == staff_id && r.active)
            .filter_map(|r| defs.get(&r.task_id).map(|d| r.populate(d)))
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    fn join_one(&self, row: &AssignmentRow) -> CareResult<Assignment> {
        let def = self
            .definitions()?
            .into_iter()
            .find(|d| d.id == row.task_id)
            .ok_or_else(|| CareError::NotFound(format!("task definition {}", row.task_id)))?;
        Ok(row.populate(&def))
    }

    /// Adds a task definition.
    pub fn define_task(
        &self,
        title: &str,
        description: &str,
        kind: TaskKind,
        priority: Priority,
        due_date: Option<NaiveDate>,
        referral_timer_minutes: Option<u32>,
    ) -> CareResult<TaskDefinition> {
        if title.trim().is_empty() {
            return Err(CareError::InvalidInput("task title is empty".into()));
        }
        let mut defs = self.definitions()?;
        let def = TaskDefinition {
            id: defs.iter().map(|d| d.id).max().unwrap_or(0) + 1,
            title: title.trim().to_string(),
            description: description.to_string(),
            kind,
            priority,
            due_date,
            referral_timer_minutes,
            active: true,
            created_at: Utc::now(),
        };
        defs.push(def.clone());
        write_json(&self.tasks_path(), &defs)?;
        tracing::info!(task_id = def.id, title = %def.title, "task defined");
        Ok(def)
    }

    pub fn list_definitions(&self) -> CareResult<Vec<TaskDefinition>> {
        self.definitions()
    }

    /// Assigns an active definition to a staff member.
    pub fn assign(&self, task_id: u64, staff_id: &str) -> CareResult<Assignment> {
        let def = self
            .definitions()?
            .into_iter()
            .find(|d| d.id == task_id)
            .ok_or_else(|| CareError::NotFound(format!("task definition {}", task_id)))?;
        if !def.active {
            return Err(CareError::InvalidInput(format!("task definition {} is inactive", task_id)));
        }
        let mut rows = self.rows()?;
        let now = Utc::now();
        let row = AssignmentRow {
            id: rows.iter().map(|r| r.id).max().unwrap_or(0) + 1,
            task_id,
            staff_id: staff_id.to_string(),
            status: Status::Assigned,
            notes: String::new(),
            started_at: None,
            completed_at: None,
            referral_count: 0,
            progress: 0,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let assignment = row.populate(&def);
        rows.push(row);
        write_json(&self.assignments_path(), &rows)?;
        tracing::info!(assignment_id = assignment.id, task_id, staff_id, "task assigned");
        Ok(assignment)
    }

    /// Marks an assignment inactive. Assignments are never removed.
    pub fn deactivate(&self, id: u64) -> CareResult<()> {
        let mut rows = self.rows()?;
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| CareError::NotFound(format!("assignment {}", id)))?;
        row.active = false;
        row.updated_at = Utc::now();
        write_json(&self.assignments_path(), &rows)?;
        tracing::info!(assignment_id = id, "assignment deactivated");
        Ok(())
    }

    /// Records a converted referral for `code`.
    ///
    /// Each open, referral-eligible assignment of the code's owner gains one
    /// referral. Returns the new record.
    pub fn record_conversion(
        &self,
        code: &str,
        name: &str,
        email: Option<String>,
        phone: Option<String>,
    ) -> CareResult<ReferralRecord> {
        let mut book = self.book()?;
        let owner = book
            .codes
            .iter()
            .find(|(_, c)| c.as_str() == code)
            .map(|(staff, _)| staff.clone())
            .ok_or_else(|| CareError::NotFound(format!("referral code {}", code)))?;

        let record = ReferralRecord {
            id: book.records.iter().map(|r| r.id).max().unwrap_or(0) + 1,
            name: name.to_string(),
            email,
            phone,
            joined_at: Utc::now(),
            referral_code: code.to_string(),
        };
        book.records.push(record.clone());

        let defs: BTreeMap<u64, TaskDefinition> =
            self.definitions()?.into_iter().map(|d| (d.id, d)).collect();
        let mut rows = self.rows()?;
        let mut credited = 0;
        for row in rows.iter_mut().filter(|r| r.staff_id == owner && r.active && !r.status.is_terminal()) {
            let eligible = defs.get(&row.task_id).map(|d| is_referral_eligible(&row.populate(d)));
            if eligible == Some(true) {
                row.referral_count += 1;
                row.updated_at = record.joined_at;
                credited += 1;
            }
        }
        // Both files describe the same conversion: commit them together.
        write_json_pair(
            (self.assignments_path().as_path(), &rows),
            (self.referrals_path().as_path(), &book),
        )?;
        tracing::info!(code, staff_id = %owner, credited, "referral converted");
        Ok(record)
    }

    /// Writes the session normally produced by the sign-in flow.
    pub fn save_session(&self, session: &StaffSession) -> CareResult<()> {
        write_json(&self.session_path(), session)
    }

    pub fn clear_session(&self) -> CareResult<()> {
        let path = self.session_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl Scheduler for JsonScheduler {
    fn fetch_assignments(&self, staff_id: &str, filter: Option<Status>, page: u32) -> CareResult<AssignmentPage> {
        self.authorize(staff_id)?;
        let mut all = self.joined(staff_id)?;
        if let Some(st) = filter {
            all.retain(|a| a.status == st);
        }
        let size = self.page_size as usize;
        let total_pages = all.len().div_ceil(size).max(1) as u32;
        let skip = (page.max(1) as usize - 1) * size;
        let items = all.into_iter().skip(skip).take(size).collect();
        Ok(AssignmentPage { items, total_pages })
    }

    fn fetch_assignment(&self, id: u64) -> CareResult<Assignment> {
        let rows = self.rows()?;
        let row = rows
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| CareError::NotFound(format!("assignment {}", id)))?;
        self.join_one(row)
    }

    fn persist_transition(&self, id: u64, status: Status, notes: Option<&str>) -> CareResult<Assignment> {
        let mut rows = self.rows()?;
        let pos = rows
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| CareError::NotFound(format!("assignment {}", id)))?;
        let current = self.join_one(&rows[pos])?;
        let next = lifecycle::transition(&current, status, notes, Utc::now()).map_err(|_| CareError::Conflict {
            id,
            current: current.status,
        })?;
        rows[pos].absorb(&next);
        write_json(&self.assignments_path(), &rows)?;
        tracing::info!(assignment_id = id, from = %current.status, to = %status, "transition stored");
        Ok(next)
    }

    fn fetch_statistics(&self, staff_id: &str) -> CareResult<Statistics> {
        self.authorize(staff_id)?;
        let all = self.joined(staff_id)?;
        Ok(Statistics::tally(&all, Local::now().date_naive()))
    }

    fn fetch_referral_code(&self, staff_id: &str) -> CareResult<String> {
        let mut book = self.book()?;
        if let Some(code) = book.codes.get(staff_id) {
            return Ok(code.clone());
        }
        let session = self.fetch_staff_session()?;
        let prefix = match session.category {
            StaffCategory::Doctor => "DOC",
            StaffCategory::Dietitian => "DIET",
        };
        let code = format!("{}{}", prefix, 100 + book.codes.len() + 1);
        book.codes.insert(staff_id.to_string(), code.clone());
        write_json(&self.referrals_path(), &book)?;
        tracing::info!(staff_id, %code, "referral code issued");
        Ok(code)
    }

    fn fetch_referrals(&self, staff_id: &str) -> CareResult<Vec<ReferralRecord>> {
        let book = self.book()?;
        let Some(code) = book.codes.get(staff_id) else {
            return Ok(Vec::new());
        };
        Ok(book.records.iter().filter(|r| &r.referral_code == code).cloned().collect())
    }

    fn fetch_staff_session(&self) -> CareResult<StaffSession> {
        let path = self.session_path();
        if !path.exists() {
            return Err(CareError::Unauthorized);
        }
        read_json::<Option<StaffSession>>(&path)?.ok_or(CareError::Unauthorized)
    }
}

/// Reads a JSON file, returning the default value when it does not exist.
fn read_json<T: DeserializeOwned + Default>(path: &Path) -> CareResult<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let mut f = OpenOptions::new().read(true).open(path)?;
    let mut s = String::new();
    f.read_to_string(&mut s)?;
    if s.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&s)?)
}

/// Writes `value` next to `path` without touching `path` itself.
fn stage_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> CareResult<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staged = path.with_extension("json.tmp");
    let s = serde_json::to_string_pretty(value)?;
    let mut f = OpenOptions::new().create(true).write(true).truncate(true).open(&staged)?;
    f.write_all(s.as_bytes())?;
    f.sync_all()?;
    Ok(staged)
}

/// Overwrites a JSON file, creating its directory if needed.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> CareResult<()> {
    let staged = stage_json(path, value)?;
    fs::rename(staged, path)?;
    Ok(())
}

/// Overwrites two files that must agree. Both are staged before either is
/// replaced; if staging fails neither file changes.
fn write_json_pair<A, B>(first: (&Path, &A), second: (&Path, &B)) -> CareResult<()>
where
    A: Serialize + ?Sized,
    B: Serialize + ?Sized,
{
    let staged_first = stage_json(first.0, first.1)?;
    let staged_second = match stage_json(second.0, second.1) {
        Ok(p) => p,
        Err(e) => {
            let _ = fs::remove_file(&staged_first);
            return Err(e);
        }
    };
    fs::rename(staged_first, first.0)?;
    fs::rename(staged_second, second.0)?;
    Ok(())
}
