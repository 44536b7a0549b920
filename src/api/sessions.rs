use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::db::{helpers::parse_date, NewSession, Session, SessionHistory, SessionKind};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSession {
    #[serde(default)]
    task_id: Option<i64>,
    #[serde(default)]
    duration_seconds: Option<u32>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl StartSession {
    fn validate(self) -> ApiResult<NewSession> {
        let kind = match self.kind.as_deref() {
            Some("focus") => SessionKind::Focus,
            Some("break") => SessionKind::Break,
            _ => return Err(ApiError::validation("type must be focus or break")),
        };
        let duration_secs = match self.duration_seconds {
            Some(secs) if secs > 0 => secs,
            _ => return Err(ApiError::validation("durationSeconds must be a positive integer")),
        };
        Ok(NewSession {
            task_id: self.task_id,
            duration_secs,
            kind,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    date: Option<String>,
}

pub async fn start_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<StartSession>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let Json(body) = payload?;
    let request = body.validate()?;

    let session = state
        .db
        .insert_session(user.id, request)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn complete_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Session>> {
    state
        .db
        .complete_session(user.id, &session_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Session not found"))
}

pub async fn session_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<SessionHistory>> {
    let Query(query) = query?;
    let raw = query
        .date
        .ok_or_else(|| ApiError::validation("date is required (YYYY-MM-DD)"))?;
    let date = parse_date(&raw, "date").map_err(|err| ApiError::validation(err.to_string()))?;

    Ok(Json(state.db.session_history(user.id, date).await?))
}
