//! Seams between the timer and whatever persists its sessions.

use std::future::Future;

use anyhow::{anyhow, Result};

use crate::db::{Database, NewSession, Session, TaskUpdate};

/// Persists focus and break sessions on behalf of the timer.
pub trait SessionRecorder: Send + Sync + 'static {
    fn open(&self, request: NewSession) -> impl Future<Output = Result<Session>> + Send;

    fn complete(&self, session_id: &str) -> impl Future<Output = Result<Session>> + Send;
}

/// Receives the "task done" signal raised when a bound focus phase finishes.
pub trait TaskCompleter: Send + Sync + 'static {
    fn complete_task(&self, task_id: i64) -> impl Future<Output = Result<()>> + Send;
}

/// Records straight into the local SQLite store for a single user.
#[derive(Clone)]
pub struct LocalRecorder {
    db: Database,
    user_id: i64,
}

impl LocalRecorder {
    pub fn new(db: Database, user_id: i64) -> Self {
        Self { db, user_id }
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }
}

impl SessionRecorder for LocalRecorder {
    async fn open(&self, request: NewSession) -> Result<Session> {
        let task_id = request.task_id;
        self.db
            .insert_session(self.user_id, request)
            .await?
            .ok_or_else(|| anyhow!("task {task_id:?} not found"))
    }

    async fn complete(&self, session_id: &str) -> Result<Session> {
        self.db
            .complete_session(self.user_id, session_id)
            .await?
            .ok_or_else(|| anyhow!("session {session_id} not found"))
    }
}

impl TaskCompleter for LocalRecorder {
    async fn complete_task(&self, task_id: i64) -> Result<()> {
        self.db
            .update_task(self.user_id, task_id, TaskUpdate::completion(true))
            .await?
            .map(|_| ())
            .ok_or_else(|| anyhow!("task {task_id} not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewTask, Priority, SessionKind};

    async fn recorder_with_task() -> (LocalRecorder, i64) {
        let db = Database::open_in_memory().unwrap();
        let (user, _) = db.ensure_user("alice").await.unwrap();
        let task = db
            .create_task(
                user.id,
                NewTask {
                    text: "write report".into(),
                    priority: Priority::High,
                    estimated_minutes: 50,
                    due_date: None,
                },
            )
            .await
            .unwrap();
        (LocalRecorder::new(db, user.id), task.id)
    }

    #[tokio::test]
    async fn local_recorder_round_trip() {
        let (recorder, task_id) = recorder_with_task().await;

        let session = recorder
            .open(NewSession {
                task_id: Some(task_id),
                duration_secs: 90,
                kind: SessionKind::Focus,
            })
            .await
            .unwrap();
        assert!(!session.completed);

        let completed = recorder.complete(&session.id).await.unwrap();
        assert!(completed.completed);

        recorder.complete_task(task_id).await.unwrap();
        let task = recorder
            .db
            .get_task(recorder.user_id(), task_id)
            .await
            .unwrap()
            .unwrap();
        assert!(task.completed);
        assert_eq!(task.actual_minutes, 2);
    }

    #[tokio::test]
    async fn local_recorder_rejects_unknown_ids() {
        let (recorder, _) = recorder_with_task().await;

        let open = recorder
            .open(NewSession {
                task_id: Some(999),
                duration_secs: 60,
                kind: SessionKind::Focus,
            })
            .await;
        assert!(open.is_err());
        assert!(recorder.complete("missing").await.is_err());
        assert!(recorder.complete_task(999).await.is_err());
    }
}
