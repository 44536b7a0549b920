use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{day_bounds, format_datetime, parse_datetime, parse_session_kind, to_u32},
    models::{NewSession, Session, SessionHistory, SessionKind, SessionRecord},
};

fn row_to_session(row: &Row) -> Result<Session> {
    let duration_secs: i64 = row.get("duration_secs")?;
    let kind: String = row.get("kind")?;
    let started_at: String = row.get("started_at")?;

    Ok(Session {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        duration_secs: to_u32(duration_secs, "duration_secs")?,
        kind: parse_session_kind(&kind)?,
        started_at: parse_datetime(&started_at, "started_at")?,
        completed: row.get("completed")?,
    })
}

fn load_session(conn: &Connection, user_id: i64, session_id: &str) -> Result<Option<Session>> {
    let mut stmt = conn.prepare(
        "SELECT id, task_id, duration_secs, kind, started_at, completed
         FROM pomodoro_sessions
         WHERE id = ?1 AND user_id = ?2",
    )?;
    let mut rows = stmt.query(params![session_id, user_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_session(row)?)),
        None => Ok(None),
    }
}

impl Database {
    /// Opens a session record. Returns `None` when `task_id` names a task
    /// the user does not own.
    pub async fn insert_session(
        &self,
        user_id: i64,
        request: NewSession,
    ) -> Result<Option<Session>> {
        self.execute(move |conn| {
            if let Some(task_id) = request.task_id {
                let owned: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM tasks WHERE id = ?1 AND user_id = ?2",
                        params![task_id, user_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if owned.is_none() {
                    return Ok(None);
                }
            }

            let session = Session {
                id: Uuid::new_v4().to_string(),
                task_id: request.task_id,
                duration_secs: request.duration_secs,
                kind: request.kind,
                started_at: Utc::now(),
                completed: false,
            };

            conn.execute(
                "INSERT INTO pomodoro_sessions (id, user_id, task_id, duration_secs, kind, started_at, completed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
                params![
                    session.id,
                    user_id,
                    session.task_id,
                    session.duration_secs,
                    session.kind.as_str(),
                    format_datetime(&session.started_at),
                ],
            )?;

            // Read back so the returned timestamp matches its stored precision.
            load_session(conn, user_id, &session.id)
        })
        .await
    }

    pub async fn get_session(&self, user_id: i64, session_id: &str) -> Result<Option<Session>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| load_session(conn, user_id, &session_id))
            .await
    }

    /// Marks a session completed. The first completion of a focus session
    /// bound to a task credits the task with the session's minutes; repeated
    /// completions change nothing.
    pub async fn complete_session(
        &self,
        user_id: i64,
        session_id: &str,
    ) -> Result<Option<Session>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let Some(mut session) = load_session(&tx, user_id, &session_id)? else {
                return Ok(None);
            };

            if !session.completed {
                tx.execute(
                    "UPDATE pomodoro_sessions SET completed = 1 WHERE id = ?1 AND completed = 0",
                    params![session.id],
                )?;

                if let (SessionKind::Focus, Some(task_id)) = (session.kind, session.task_id) {
                    tx.execute(
                        "UPDATE tasks
                         SET actual_minutes = actual_minutes + ?1
                         WHERE id = ?2 AND user_id = ?3",
                        params![session.accrued_minutes(), task_id, user_id],
                    )?;
                }

                session.completed = true;
            }

            tx.commit()?;
            Ok(Some(session))
        })
        .await
    }

    /// All sessions started on `date` (UTC), newest first, with statistics.
    pub async fn session_history(&self, user_id: i64, date: NaiveDate) -> Result<SessionHistory> {
        let (start, end) = day_bounds(date);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT ps.id, ps.task_id, ps.duration_secs, ps.kind, ps.started_at, ps.completed,
                        t.text AS task_text
                 FROM pomodoro_sessions ps
                 LEFT JOIN tasks t ON ps.task_id = t.id
                 WHERE ps.user_id = ?1 AND ps.started_at >= ?2 AND ps.started_at < ?3
                 ORDER BY ps.started_at DESC",
            )?;

            let mut rows = stmt.query(params![user_id, start, end])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(SessionRecord {
                    session: row_to_session(row)?,
                    task_text: row.get("task_text")?,
                });
            }

            Ok(SessionHistory::new(sessions))
        })
        .await
    }
}
