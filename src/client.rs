//! HTTP client for a running `taskfocus serve` instance.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    api::USER_HEADER,
    db::{NewSession, NewTask, Session, SessionHistory, Task, TaskUpdate, User},
    timer::{SessionRecorder, TaskCompleter},
};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    user: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: None,
        }
    }

    /// Sends every request on behalf of `user` instead of the server default.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn current_user(&self) -> Result<User> {
        self.send(self.http.get(self.url("/user"))).await
    }

    pub async fn open_session(&self, request: &NewSession) -> Result<Session> {
        self.send(self.http.post(self.url("/sessions/start")).json(request))
            .await
    }

    pub async fn complete_session(&self, session_id: &str) -> Result<Session> {
        let path = format!("/sessions/{session_id}/complete");
        self.send(self.http.put(self.url(&path))).await
    }

    pub async fn session_history(&self, date: NaiveDate) -> Result<SessionHistory> {
        let request = self
            .http
            .get(self.url("/sessions/history"))
            .query(&[("date", date.to_string())]);
        self.send(request).await
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.send(self.http.get(self.url("/tasks"))).await
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<Task> {
        self.send(self.http.post(self.url("/tasks")).json(task)).await
    }

    pub async fn update_task(&self, task_id: i64, update: &TaskUpdate) -> Result<Task> {
        let path = format!("/tasks/{task_id}");
        self.send(self.http.put(self.url(&path)).json(update)).await
    }

    pub async fn delete_task(&self, task_id: i64) -> Result<()> {
        let path = format!("/tasks/{task_id}");
        let _: serde_json::Value = self.send(self.http.delete(self.url(&path))).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = match &self.user {
            Some(user) => request.header(USER_HEADER, user),
            None => request,
        };
        let response = request
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.base_url))?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .with_context(|| format!("malformed {status} response"));
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
    };
    Err(anyhow!("server returned {status}: {message}"))
}

impl SessionRecorder for ApiClient {
    async fn open(&self, request: NewSession) -> Result<Session> {
        self.open_session(&request).await
    }

    async fn complete(&self, session_id: &str) -> Result<Session> {
        self.complete_session(session_id).await
    }
}

impl TaskCompleter for ApiClient {
    async fn complete_task(&self, task_id: i64) -> Result<()> {
        self.update_task(task_id, &TaskUpdate::completion(true))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalised() {
        let client = ApiClient::new("http://localhost:3000/");
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(client.url("/tasks"), "http://localhost:3000/tasks");
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        let client = ApiClient::new("http://127.0.0.1:9").with_user("alice");
        assert!(client.list_tasks().await.is_err());
    }
}
