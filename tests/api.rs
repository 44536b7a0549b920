use std::{sync::Arc, time::Duration};

use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use taskfocus::{
    api::USER_HEADER,
    db::{NewSession, NewTask, Priority, SessionKind, TaskStatus, TaskUpdate},
    serve_on,
    timer::{TickSource, TimerController, TimerDurations, TimerPhase},
    ApiClient, AppState, Database,
};

struct TestServer {
    base_url: String,
    shutdown: CancellationToken,
}

impl TestServer {
    async fn start() -> Self {
        let db = Database::open_in_memory().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        tokio::spawn(serve_on(
            listener,
            AppState::new(db, "local"),
            shutdown.clone(),
        ));
        Self {
            base_url: format!("http://{addr}"),
            shutdown,
        }
    }

    fn client(&self, user: &str) -> ApiClient {
        ApiClient::new(&self.base_url).with_user(user)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn new_task(text: &str) -> NewTask {
    NewTask {
        text: text.into(),
        priority: Priority::Medium,
        estimated_minutes: 25,
        due_date: None,
    }
}

#[tokio::test]
async fn completing_focus_session_accrues_minutes_once() {
    let server = TestServer::start().await;
    let client = server.client("alice");

    let task = client.create_task(&new_task("write tests")).await.unwrap();
    let session = client
        .open_session(&NewSession {
            task_id: Some(task.id),
            duration_secs: 90,
            kind: SessionKind::Focus,
        })
        .await
        .unwrap();
    assert!(!session.completed);
    assert_eq!(session.task_id, Some(task.id));

    let first = client.complete_session(&session.id).await.unwrap();
    let second = client.complete_session(&session.id).await.unwrap();
    assert!(first.completed && second.completed);

    let tasks = client.list_tasks().await.unwrap();
    let stored = tasks.iter().find(|t| t.id == task.id).unwrap();
    assert_eq!(stored.actual_minutes, 2);

    let history = client
        .session_history(Utc::now().date_naive())
        .await
        .unwrap();
    assert_eq!(history.sessions.len(), 1);
    assert_eq!(history.sessions[0].task_text.as_deref(), Some("write tests"));
    assert_eq!(history.stats.completed_focus_sessions, 1);
    assert_eq!(history.stats.total_focus_time_seconds, 90);
    assert_eq!(history.stats.completion_rate, 100);
}

#[tokio::test]
async fn accrued_minutes_cannot_be_overwritten() {
    let server = TestServer::start().await;
    let client = server.client("alice");

    let task = client.create_task(&new_task("essay")).await.unwrap();
    let session = client
        .open_session(&NewSession {
            task_id: Some(task.id),
            duration_secs: 1500,
            kind: SessionKind::Focus,
        })
        .await
        .unwrap();
    client.complete_session(&session.id).await.unwrap();

    let http = reqwest::Client::new();
    for body in [json!({"actualMinutes": 0}), json!({"completed": true, "actualMinutes": 0})] {
        let response = http
            .put(server.url(&format!("/tasks/{}", task.id)))
            .header(USER_HEADER, "alice")
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
    }

    let tasks = client.list_tasks().await.unwrap();
    let stored = tasks.iter().find(|t| t.id == task.id).unwrap();
    assert_eq!(stored.actual_minutes, 25);
    assert!(!stored.completed);
}

#[tokio::test]
async fn break_sessions_do_not_accrue() {
    let server = TestServer::start().await;
    let client = server.client("alice");

    let task = client.create_task(&new_task("stretch")).await.unwrap();
    let session = client
        .open_session(&NewSession {
            task_id: Some(task.id),
            duration_secs: 300,
            kind: SessionKind::Break,
        })
        .await
        .unwrap();
    client.complete_session(&session.id).await.unwrap();

    let tasks = client.list_tasks().await.unwrap();
    assert_eq!(tasks[0].actual_minutes, 0);
}

#[tokio::test]
async fn invalid_requests_are_rejected_with_400() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();

    for body in [
        json!({"durationSeconds": 1500, "type": "nap"}),
        json!({"durationSeconds": 0, "type": "focus"}),
        json!({"type": "focus"}),
    ] {
        let response = http
            .post(server.url("/sessions/start"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        let error: Value = response.json().await.unwrap();
        assert!(error["error"].is_string());
    }

    let malformed = http
        .post(server.url("/sessions/start"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    for path in [
        "/sessions/history",
        "/sessions/history?date=yesterday",
        "/tasks/history?startDate=2024-01-01",
        "/tasks/stats?period=year",
    ] {
        let response = http.get(server.url(path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
    }

    let missing_fields = http
        .post(server.url("/tasks"))
        .json(&json!({"text": "no priority"}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing_fields.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn records_of_other_users_are_not_found() {
    let server = TestServer::start().await;
    let alice = server.client("alice");
    let bob = server.client("bob");

    let task = alice.create_task(&new_task("private")).await.unwrap();
    let session = alice
        .open_session(&NewSession {
            task_id: Some(task.id),
            duration_secs: 60,
            kind: SessionKind::Focus,
        })
        .await
        .unwrap();

    let err = bob.complete_session(&session.id).await.unwrap_err();
    assert!(err.to_string().contains("404"), "{err}");

    let err = bob
        .open_session(&NewSession {
            task_id: Some(task.id),
            duration_secs: 60,
            kind: SessionKind::Focus,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("404"), "{err}");

    assert!(bob
        .update_task(task.id, &TaskUpdate::completion(true))
        .await
        .is_err());
    assert!(bob.delete_task(task.id).await.is_err());
    assert!(bob.list_tasks().await.unwrap().is_empty());

    let history = bob
        .session_history(Utc::now().date_naive())
        .await
        .unwrap();
    assert!(history.sessions.is_empty());
    assert_eq!(history.stats.completion_rate, 0);
}

#[tokio::test]
async fn user_endpoint_gets_or_creates() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();

    let created = http
        .post(server.url("/user"))
        .json(&json!({"username": "carol"}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let created: Value = created.json().await.unwrap();

    let existing = http
        .post(server.url("/user"))
        .json(&json!({"username": "carol"}))
        .send()
        .await
        .unwrap();
    assert_eq!(existing.status(), StatusCode::OK);
    let existing: Value = existing.json().await.unwrap();
    assert_eq!(created["id"], existing["id"]);

    let current: Value = http
        .get(server.url("/user"))
        .header(USER_HEADER, "carol")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current["username"], "carol");

    let default_user = server.client("local").current_user().await.unwrap();
    assert_eq!(default_user.username, "local");
}

#[tokio::test]
async fn task_lifecycle_keeps_one_history_row_per_day() {
    let server = TestServer::start().await;
    let client = server.client("dana");
    let today = Utc::now().date_naive();

    let task = client.create_task(&new_task("review PR")).await.unwrap();
    let tomorrow = client
        .create_task(&NewTask {
            due_date: Some(today + chrono::Duration::days(1)),
            ..new_task("later")
        })
        .await
        .unwrap();

    let listed = client.list_tasks().await.unwrap();
    assert!(listed.iter().any(|t| t.id == task.id));
    assert!(!listed.iter().any(|t| t.id == tomorrow.id));

    let done = client
        .update_task(task.id, &TaskUpdate::completion(true))
        .await
        .unwrap();
    assert!(done.completed && done.completed_at.is_some());
    let undone = client
        .update_task(task.id, &TaskUpdate::completion(false))
        .await
        .unwrap();
    assert!(!undone.completed && undone.completed_at.is_none());
    client
        .update_task(task.id, &TaskUpdate::completion(true))
        .await
        .unwrap();

    let http = reqwest::Client::new();
    let history: Vec<Value> = http
        .get(server.url(&format!(
            "/tasks/history?startDate={today}&endDate={today}"
        )))
        .header(USER_HEADER, "dana")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows: Vec<_> = history
        .iter()
        .filter(|row| row["taskId"] == json!(task.id))
        .collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], TaskStatus::Completed.as_str());

    let stats: Value = http
        .get(server.url("/tasks/stats?period=week"))
        .header(USER_HEADER, "dana")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["completed"].as_array().unwrap().last(), Some(&json!(1)));

    client.delete_task(task.id).await.unwrap();
    assert!(client
        .update_task(task.id, &TaskUpdate::completion(false))
        .await
        .is_err());
}

#[tokio::test]
async fn timer_records_sessions_through_the_api() {
    let server = TestServer::start().await;
    let client = Arc::new(server.client("erin"));
    let task = client.create_task(&new_task("deep work")).await.unwrap();

    let timer = TimerController::spawn(
        Arc::clone(&client),
        Arc::clone(&client),
        TimerDurations::new(3, 2),
        TickSource::Manual,
    );
    timer.select_task(task.id).await.unwrap();
    timer.start().await.unwrap();

    let mut updates = timer.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        updates.wait_for(|s| s.session_id.is_some()),
    )
    .await
    .unwrap()
    .unwrap();

    for _ in 0..3 {
        timer.tick().await.unwrap();
    }
    assert_eq!(timer.snapshot().phase, TimerPhase::IdleBreak);

    let today = Utc::now().date_naive();
    let mut finished = false;
    for _ in 0..100 {
        let history = client.session_history(today).await.unwrap();
        let tasks = client.list_tasks().await.unwrap();
        let stored = tasks.iter().find(|t| t.id == task.id).unwrap();
        if history.stats.completed_focus_sessions == 1 && stored.completed {
            assert_eq!(stored.actual_minutes, 1);
            finished = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(finished, "session and task were not completed");
    timer.shutdown();
}
