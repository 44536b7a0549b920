//! HTTP surface: sessions, tasks and the current user.

mod error;
mod sessions;
mod tasks;
mod users;

use std::time::Instant;

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{request::Parts, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use log::info;

use crate::db::{Database, User};

pub use error::{ApiError, ApiResult};

/// Header naming the calling user.
pub const USER_HEADER: &str = "x-user";

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Used when a request carries no user header.
    pub default_user: String,
}

impl AppState {
    pub fn new(db: Database, default_user: impl Into<String>) -> Self {
        Self {
            db,
            default_user: default_user.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sessions/start", post(sessions::start_session))
        .route("/sessions/{id}/complete", put(sessions::complete_session))
        .route("/sessions/history", get(sessions::session_history))
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/tasks/history", get(tasks::task_history))
        .route("/tasks/stats", get(tasks::task_stats))
        .route(
            "/tasks/{id}",
            put(tasks::update_task).delete(tasks::delete_task),
        )
        .route("/user", get(users::current_user).post(users::register_user))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;
    info!(
        "{method} {path} -> {} in {}ms",
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

/// The caller, created on first sight.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> ApiResult<Self> {
        let username = match parts.headers.get(USER_HEADER) {
            Some(value) => value
                .to_str()
                .map_err(|_| ApiError::validation("x-user header must be visible ASCII"))?
                .trim()
                .to_string(),
            None => state.default_user.clone(),
        };
        if username.is_empty() {
            return Err(ApiError::validation("username must not be empty"));
        }

        let (user, _) = state.db.ensure_user(&username).await?;
        Ok(CurrentUser(user))
    }
}
