use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};

use crate::db::models::{Priority, SessionKind, TaskStatus};

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} contains out-of-range value {value}"))
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").with_context(|| format!("failed to parse {field}"))
}

/// UTC bounds `[start, end)` of a calendar day, formatted for comparison.
pub fn day_bounds(date: NaiveDate) -> (String, String) {
    let start = date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
    let end = date
        .succ_opt()
        .and_then(|next| next.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt));
    (
        start.map(|dt| format_datetime(&dt)).unwrap_or_default(),
        end.map(|dt| format_datetime(&dt))
            .unwrap_or_else(|| "9999-12-31T23:59:59.999Z".into()),
    )
}

pub fn parse_session_kind(value: &str) -> Result<SessionKind> {
    match value {
        "focus" => Ok(SessionKind::Focus),
        "break" => Ok(SessionKind::Break),
        other => Err(anyhow!("unknown session type {other}")),
    }
}

pub fn parse_priority(value: &str) -> Result<Priority> {
    match value {
        "urgent" => Ok(Priority::Urgent),
        "high" => Ok(Priority::High),
        "medium" => Ok(Priority::Medium),
        "low" => Ok(Priority::Low),
        other => Err(anyhow!("unknown priority {other}")),
    }
}

pub fn parse_task_status(value: &str) -> Result<TaskStatus> {
    match value {
        "in_progress" => Ok(TaskStatus::InProgress),
        "completed" => Ok(TaskStatus::Completed),
        "failed" => Ok(TaskStatus::Failed),
        other => Err(anyhow!("unknown task status {other}")),
    }
}
