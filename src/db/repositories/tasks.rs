use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{
        format_datetime, parse_date, parse_datetime, parse_optional_datetime, parse_priority,
        parse_task_status, to_u32,
    },
    models::{NewTask, StatsPeriod, Task, TaskHistoryEntry, TaskStats, TaskStatus, TaskUpdate},
};

const TASK_COLUMNS: &str = "id, text, priority, estimated_minutes, actual_minutes, due_date, \
                            completed, completed_at, created_at";

const PRIORITY_ORDER: &str = "CASE priority \
                              WHEN 'urgent' THEN 0 \
                              WHEN 'high' THEN 1 \
                              WHEN 'medium' THEN 2 \
                              ELSE 3 END";

fn row_to_task(row: &Row) -> Result<Task> {
    let priority: String = row.get("priority")?;
    let estimated_minutes: i64 = row.get("estimated_minutes")?;
    let actual_minutes: i64 = row.get("actual_minutes")?;
    let due_date: Option<String> = row.get("due_date")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    let created_at: String = row.get("created_at")?;

    Ok(Task {
        id: row.get("id")?,
        text: row.get("text")?,
        priority: parse_priority(&priority)?,
        estimated_minutes: to_u32(estimated_minutes, "estimated_minutes")?,
        actual_minutes: to_u32(actual_minutes, "actual_minutes")?,
        due_date: due_date
            .map(|raw| parse_date(&raw, "due_date"))
            .transpose()?,
        completed: row.get("completed")?,
        completed_at: parse_optional_datetime(completed_at, "completed_at")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

pub(crate) fn load_task(conn: &Connection, user_id: i64, task_id: i64) -> Result<Option<Task>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND user_id = ?2"
    ))?;
    let mut rows = stmt.query(params![task_id, user_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_task(row)?)),
        None => Ok(None),
    }
}

/// Writes the day's status for a task, replacing any earlier status of that day.
fn record_history(
    conn: &Connection,
    user_id: i64,
    task_id: i64,
    date: NaiveDate,
    status: TaskStatus,
) -> Result<()> {
    conn.execute(
        "INSERT INTO task_history (task_id, user_id, date, status)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(task_id, date) DO UPDATE SET status = excluded.status",
        params![task_id, user_id, date.to_string(), status.as_str()],
    )?;
    Ok(())
}

impl Database {
    /// Tasks without a due date or due on `day`, most urgent first.
    pub async fn list_tasks_for_day(&self, user_id: i64, day: NaiveDate) -> Result<Vec<Task>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS}
                 FROM tasks
                 WHERE user_id = ?1 AND (due_date IS NULL OR due_date = ?2)
                 ORDER BY {PRIORITY_ORDER} ASC, created_at ASC, id ASC"
            ))?;

            let mut rows = stmt.query(params![user_id, day.to_string()])?;
            let mut tasks = Vec::new();
            while let Some(row) = rows.next()? {
                tasks.push(row_to_task(row)?);
            }
            Ok(tasks)
        })
        .await
    }

    pub async fn create_task(&self, user_id: i64, task: NewTask) -> Result<Task> {
        self.execute(move |conn| {
            let now = Utc::now();
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO tasks (user_id, text, priority, estimated_minutes, due_date, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user_id,
                    task.text,
                    task.priority.as_str(),
                    task.estimated_minutes,
                    task.due_date.map(|d| d.to_string()),
                    format_datetime(&now),
                ],
            )?;
            let task_id = tx.last_insert_rowid();

            record_history(&tx, user_id, task_id, now.date_naive(), TaskStatus::InProgress)?;

            let created = load_task(&tx, user_id, task_id)?
                .ok_or_else(|| anyhow::anyhow!("Task not found after insert"))?;
            tx.commit()?;
            Ok(created)
        })
        .await
    }

    pub async fn get_task(&self, user_id: i64, task_id: i64) -> Result<Option<Task>> {
        self.execute(move |conn| load_task(conn, user_id, task_id))
            .await
    }

    /// Applies a partial update. Returns `None` when the task is not owned by the user.
    pub async fn update_task(
        &self,
        user_id: i64,
        task_id: i64,
        update: TaskUpdate,
    ) -> Result<Option<Task>> {
        self.execute(move |conn| {
            let now = Utc::now();
            let tx = conn.transaction()?;

            let Some(existing) = load_task(&tx, user_id, task_id)? else {
                return Ok(None);
            };

            let mut assignments: Vec<&str> = Vec::new();
            let mut values: Vec<Value> = Vec::new();

            if let Some(text) = update.text {
                assignments.push("text = ?");
                values.push(Value::Text(text));
            }
            if let Some(priority) = update.priority {
                assignments.push("priority = ?");
                values.push(Value::Text(priority.as_str().to_string()));
            }
            if let Some(estimated) = update.estimated_minutes {
                assignments.push("estimated_minutes = ?");
                values.push(Value::Integer(i64::from(estimated)));
            }
            if let Some(due_date) = update.due_date {
                assignments.push("due_date = ?");
                values.push(Value::Text(due_date.to_string()));
            }

            let status_change = match update.completed {
                Some(completed) => {
                    assignments.push("completed = ?");
                    values.push(Value::Integer(i64::from(completed)));
                    match (existing.completed, completed) {
                        (false, true) => {
                            assignments.push("completed_at = ?");
                            values.push(Value::Text(format_datetime(&now)));
                            Some(TaskStatus::Completed)
                        }
                        (true, false) => {
                            assignments.push("completed_at = NULL");
                            Some(TaskStatus::InProgress)
                        }
                        _ => None,
                    }
                }
                None => None,
            };

            if !assignments.is_empty() {
                values.push(Value::Integer(task_id));
                values.push(Value::Integer(user_id));
                tx.execute(
                    &format!(
                        "UPDATE tasks SET {} WHERE id = ? AND user_id = ?",
                        assignments.join(", ")
                    ),
                    params_from_iter(values),
                )?;
            }

            if let Some(status) = status_change {
                record_history(&tx, user_id, task_id, now.date_naive(), status)?;
            }

            let updated = load_task(&tx, user_id, task_id)?;
            tx.commit()?;
            Ok(updated)
        })
        .await
    }

    /// Deletes a task together with its history rows and sessions.
    /// Returns `false` when the task is not owned by the user.
    pub async fn delete_task(&self, user_id: i64, task_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let owned: Option<i64> = tx
                .query_row(
                    "SELECT id FROM tasks WHERE id = ?1 AND user_id = ?2",
                    params![task_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            if owned.is_none() {
                return Ok(false);
            }

            tx.execute(
                "DELETE FROM task_history WHERE task_id = ?1",
                params![task_id],
            )?;
            tx.execute(
                "DELETE FROM pomodoro_sessions WHERE task_id = ?1",
                params![task_id],
            )?;
            tx.execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
                params![task_id, user_id],
            )?;

            tx.commit()?;
            Ok(true)
        })
        .await
    }

    pub async fn task_history(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TaskHistoryEntry>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT th.task_id, th.date, th.status, t.text, t.priority,
                        t.estimated_minutes, t.actual_minutes
                 FROM task_history th
                 JOIN tasks t ON th.task_id = t.id
                 WHERE th.user_id = ?1 AND th.date >= ?2 AND th.date <= ?3
                 ORDER BY th.date DESC, th.task_id ASC",
            )?;

            let mut rows = stmt.query(params![user_id, start.to_string(), end.to_string()])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                let date: String = row.get(1)?;
                let status: String = row.get(2)?;
                let priority: String = row.get(4)?;
                entries.push(TaskHistoryEntry {
                    task_id: row.get(0)?,
                    date: parse_date(&date, "date")?,
                    status: parse_task_status(&status)?,
                    text: row.get(3)?,
                    priority: parse_priority(&priority)?,
                    estimated_minutes: to_u32(row.get(5)?, "estimated_minutes")?,
                    actual_minutes: to_u32(row.get(6)?, "actual_minutes")?,
                });
            }
            Ok(entries)
        })
        .await
    }

    /// Daily status counts for the period ending on `today`.
    pub async fn task_stats(
        &self,
        user_id: i64,
        period: StatsPeriod,
        today: NaiveDate,
    ) -> Result<TaskStats> {
        let start = today - Duration::days(period.days() - 1);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT date, status, COUNT(*)
                 FROM task_history
                 WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
                 GROUP BY date, status
                 ORDER BY date ASC",
            )?;

            let mut rows = stmt.query(params![user_id, start.to_string(), today.to_string()])?;
            let mut counts = Vec::new();
            while let Some(row) = rows.next()? {
                let date: String = row.get(0)?;
                let status: String = row.get(1)?;
                counts.push((
                    parse_date(&date, "date")?,
                    parse_task_status(&status)?,
                    to_u32(row.get(2)?, "count")?,
                ));
            }
            Ok(TaskStats::from_counts(&counts))
        })
        .await
    }
}
