use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::CareError;

/// Cadence of a task definition.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Daily,
    Weekly,
    Monthly,
    /// Onboarding new users; the referral-bearing kind.
    #[value(name = "new_user")]
    NewUser,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Lifecycle status of an assignment.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Assigned,
    Accepted,
    #[value(name = "in_progress")]
    InProgress,
    Completed,
    Rejected,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Assigned,
        Status::Accepted,
        Status::InProgress,
        Status::Completed,
        Status::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Assigned => "assigned",
            Status::Accepted => "accepted",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Rejected => "rejected",
        }
    }

    /// `completed` and `rejected` are absorbing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Rejected)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Assigned => "Assigned",
            Status::Accepted => "Accepted",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
            Status::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = CareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .iter()
            .copied()
            .find(|st| st.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| CareError::InvalidInput(format!("unknown status '{}'", s)))
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Daily => "daily",
            TaskKind::Weekly => "weekly",
            TaskKind::Monthly => "monthly",
            TaskKind::NewUser => "new_user",
        })
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        })
    }
}

/// Shared work item owned by the scheduling authority.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    /// Unique identifier for the definition.
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub priority: Priority,
    /// Date after which a non-terminal assignment counts as overdue.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Length of the referral window, in minutes.
    #[serde(default)]
    pub referral_timer_minutes: Option<u32>,
    #[serde(default = "default_true")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Remaining time of a referral window as reported with an assignment snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownSnapshot {
    pub remaining_ms: i64,
    pub expired: bool,
}

/// One staff member's instance of a task definition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Assignment {
    pub id: u64,
    /// The definition this assignment was created from, populated by the scheduler.
    pub task: TaskDefinition,
    pub staff_id: String,
    pub status: Status,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Converted referrals attributed to this assignment. Never decremented.
    #[serde(default)]
    pub referral_count: u32,
    /// Progress percentage, 0 to 100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default = "default_true")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub countdown: Option<CountdownSnapshot>,
}

impl Assignment {
    /// Whether the definition's due date lies strictly before `today` while
    /// the assignment is still open.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        matches!(self.task.due_date, Some(due) if due < today)
    }
}

/// A referred person who joined with a staff member's code.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReferralRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub referral_code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StaffCategory {
    Doctor,
    Dietitian,
}

impl fmt::Display for StaffCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StaffCategory::Doctor => "doctor",
            StaffCategory::Dietitian => "dietitian",
        })
    }
}

/// Identity of the signed-in staff member, handed to the board explicitly.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StaffSession {
    pub staff_id: String,
    pub display_name: String,
    pub category: StaffCategory,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for st in Status::ALL {
            assert_eq!(st.as_str().parse::<Status>().unwrap(), st);
        }
        assert!("done".parse::<Status>().is_err());
    }

    #[test]
    fn definition_uses_type_key() {
        let json = r#"{"id":1,"title":"Referral drive","type":"new_user","priority":"high",
            "created_at":"2024-01-01T00:00:00Z"}"#;
        let def: TaskDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.kind, TaskKind::NewUser);
        assert!(def.active);
        assert_eq!(def.due_date, None);
    }
}
