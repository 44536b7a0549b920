//! Task-related data models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub text: String,
    pub priority: Priority,
    pub estimated_minutes: u32,
    /// Grows only through completed focus sessions bound to this task.
    pub actual_minutes: u32,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub text: String,
    pub priority: Priority,
    pub estimated_minutes: u32,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Partial update; `None` fields are left untouched.
///
/// Accrued minutes are not writable here; they grow only through completed
/// focus sessions, and a body naming them is rejected as an unknown field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskUpdate {
    pub fn completion(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskHistoryEntry {
    pub task_id: i64,
    pub date: NaiveDate,
    pub status: TaskStatus,
    pub text: String,
    pub priority: Priority,
    pub estimated_minutes: u32,
    pub actual_minutes: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    Day,
    Week,
    Month,
}

impl StatsPeriod {
    /// Number of calendar days covered, today included.
    pub fn days(&self) -> i64 {
        match self {
            StatsPeriod::Day => 1,
            StatsPeriod::Week => 7,
            StatsPeriod::Month => 30,
        }
    }
}

/// Per-day counts of task history statuses, index-aligned with `dates`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub dates: Vec<NaiveDate>,
    pub completed: Vec<u32>,
    pub failed: Vec<u32>,
    pub in_progress: Vec<u32>,
    pub completion_rate: Vec<u32>,
}

impl TaskStats {
    /// Builds the stats from `(date, status, count)` rows sorted by date.
    pub fn from_counts(rows: &[(NaiveDate, TaskStatus, u32)]) -> Self {
        let mut stats = TaskStats::default();
        for (date, status, count) in rows {
            if stats.dates.last() != Some(date) {
                stats.dates.push(*date);
                stats.completed.push(0);
                stats.failed.push(0);
                stats.in_progress.push(0);
            }
            let slot = match status {
                TaskStatus::Completed => &mut stats.completed,
                TaskStatus::Failed => &mut stats.failed,
                TaskStatus::InProgress => &mut stats.in_progress,
            };
            if let Some(last) = slot.last_mut() {
                *last += count;
            }
        }

        stats.completion_rate = (0..stats.dates.len())
            .map(|i| {
                let total = stats.completed[i] + stats.failed[i] + stats.in_progress[i];
                if total == 0 {
                    0
                } else {
                    (f64::from(stats.completed[i]) * 100.0 / f64::from(total)).round() as u32
                }
            })
            .collect();

        stats
    }
}
