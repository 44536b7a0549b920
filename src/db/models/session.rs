//! Pomodoro session records and the per-day history view built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Focus,
    Break,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Focus => "focus",
            SessionKind::Break => "break",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub task_id: Option<i64>,
    #[serde(rename = "durationSeconds")]
    pub duration_secs: u32,
    #[serde(rename = "type")]
    pub kind: SessionKind,
    pub started_at: DateTime<Utc>,
    pub completed: bool,
}

impl Session {
    /// Minutes credited to the bound task when a focus session completes.
    pub fn accrued_minutes(&self) -> u32 {
        self.duration_secs.div_ceil(60)
    }
}

/// Request to open a session, shared by the recorder trait and the HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub task_id: Option<i64>,
    #[serde(rename = "durationSeconds")]
    pub duration_secs: u32,
    #[serde(rename = "type")]
    pub kind: SessionKind,
}

/// A session as listed in the day history, with the bound task's text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(flatten)]
    pub session: Session,
    pub task_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_sessions: u32,
    pub focus_sessions: u32,
    pub break_sessions: u32,
    pub completed_focus_sessions: u32,
    pub total_focus_time_seconds: u64,
    pub total_break_time_seconds: u64,
    /// Percentage of focus sessions completed, rounded; 0 when there are none.
    pub completion_rate: u32,
}

impl SessionStats {
    pub fn from_sessions<'a, I>(sessions: I) -> Self
    where
        I: IntoIterator<Item = &'a Session>,
    {
        let mut stats = SessionStats::default();
        for session in sessions {
            stats.total_sessions += 1;
            match session.kind {
                SessionKind::Focus => {
                    stats.focus_sessions += 1;
                    stats.total_focus_time_seconds += u64::from(session.duration_secs);
                    if session.completed {
                        stats.completed_focus_sessions += 1;
                    }
                }
                SessionKind::Break => {
                    stats.break_sessions += 1;
                    stats.total_break_time_seconds += u64::from(session.duration_secs);
                }
            }
        }

        if stats.focus_sessions > 0 {
            let rate = f64::from(stats.completed_focus_sessions) / f64::from(stats.focus_sessions);
            stats.completion_rate = (rate * 100.0).round() as u32;
        }

        stats
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionHistory {
    pub sessions: Vec<SessionRecord>,
    pub stats: SessionStats,
}

impl SessionHistory {
    pub fn new(sessions: Vec<SessionRecord>) -> Self {
        let stats = SessionStats::from_sessions(sessions.iter().map(|record| &record.session));
        Self { sessions, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(kind: SessionKind, duration_secs: u32, completed: bool) -> Session {
        Session {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: None,
            duration_secs,
            kind,
            started_at: Utc::now(),
            completed,
        }
    }

    #[test]
    fn accrued_minutes_rounds_up() {
        assert_eq!(session(SessionKind::Focus, 1500, true).accrued_minutes(), 25);
        assert_eq!(session(SessionKind::Focus, 61, true).accrued_minutes(), 2);
        assert_eq!(session(SessionKind::Focus, 1, true).accrued_minutes(), 1);
    }

    #[test]
    fn stats_for_mixed_day() {
        let sessions = vec![
            session(SessionKind::Focus, 1500, true),
            session(SessionKind::Focus, 1500, false),
            session(SessionKind::Focus, 1500, true),
            session(SessionKind::Break, 300, true),
        ];

        let stats = SessionStats::from_sessions(&sessions);
        assert_eq!(stats.total_sessions, 4);
        assert_eq!(stats.focus_sessions, 3);
        assert_eq!(stats.break_sessions, 1);
        assert_eq!(stats.completed_focus_sessions, 2);
        assert_eq!(stats.total_focus_time_seconds, 4500);
        assert_eq!(stats.total_break_time_seconds, 300);
        assert_eq!(stats.completion_rate, 67);
    }

    #[test]
    fn stats_without_focus_sessions_has_zero_rate() {
        let sessions = vec![session(SessionKind::Break, 300, true)];
        let stats = SessionStats::from_sessions(&sessions);
        assert_eq!(stats.completion_rate, 0);
        assert_eq!(stats.focus_sessions, 0);
    }

    #[test]
    fn session_serializes_with_wire_names() {
        let mut s = session(SessionKind::Break, 300, false);
        s.task_id = Some(7);
        let value = serde_json::to_value(&s).unwrap();
        assert_eq!(value["type"], "break");
        assert_eq!(value["durationSeconds"], 300);
        assert_eq!(value["taskId"], 7);
        assert_eq!(value["completed"], false);
        assert!(value.get("startedAt").is_some());
    }

    #[test]
    fn history_record_flattens_session() {
        let record = SessionRecord {
            session: session(SessionKind::Focus, 1500, true),
            task_text: Some("write report".into()),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["taskText"], "write report");
        assert_eq!(value["type"], "focus");

        let back: SessionRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
