use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::db::{
    helpers::{parse_date, parse_priority},
    NewTask, StatsPeriod, Task, TaskHistoryEntry, TaskStats, TaskUpdate,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    estimated_minutes: Option<u32>,
    #[serde(default)]
    due_date: Option<String>,
}

impl CreateTask {
    fn validate(self) -> ApiResult<NewTask> {
        let text = self.text.as_deref().map(str::trim).unwrap_or_default();
        let (Some(priority), Some(estimated_minutes)) = (self.priority, self.estimated_minutes)
        else {
            return Err(ApiError::validation(
                "text, priority and estimatedMinutes are required",
            ));
        };
        if text.is_empty() || estimated_minutes == 0 {
            return Err(ApiError::validation(
                "text, priority and estimatedMinutes are required",
            ));
        }

        let priority = parse_priority(&priority).map_err(|err| ApiError::validation(err.to_string()))?;
        let due_date = self
            .due_date
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| date_param(&raw, "dueDate"))
            .transpose()?;

        Ok(NewTask {
            text: text.to_string(),
            priority,
            estimated_minutes,
            due_date,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRange {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    message: String,
}

fn date_param(raw: &str, field: &str) -> ApiResult<NaiveDate> {
    parse_date(raw, field).map_err(|err| ApiError::validation(err.to_string()))
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Tasks due today or undated, most urgent first.
pub async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.db.list_tasks_for_day(user.id, today()).await?))
}

pub async fn create_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<CreateTask>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let Json(body) = payload?;
    let task = state.db.create_task(user.id, body.validate()?).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<i64>,
    payload: Result<Json<TaskUpdate>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let Json(update) = payload?;
    if update.is_empty() {
        return Err(ApiError::validation("no fields to update"));
    }
    if update.text.as_deref().is_some_and(|text| text.trim().is_empty()) {
        return Err(ApiError::validation("text must not be empty"));
    }

    state
        .db
        .update_task(user.id, task_id, update)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Task not found"))
}

pub async fn delete_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<Deleted>> {
    if !state.db.delete_task(user.id, task_id).await? {
        return Err(ApiError::not_found("Task not found"));
    }
    Ok(Json(Deleted {
        message: "Task deleted successfully".into(),
    }))
}

pub async fn task_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<HistoryRange>, QueryRejection>,
) -> ApiResult<Json<Vec<TaskHistoryEntry>>> {
    let Query(range) = query?;
    let (Some(start), Some(end)) = (range.start_date, range.end_date) else {
        return Err(ApiError::validation("startDate and endDate are required"));
    };
    let start = date_param(&start, "startDate")?;
    let end = date_param(&end, "endDate")?;

    Ok(Json(state.db.task_history(user.id, start, end).await?))
}

pub async fn task_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<StatsQuery>, QueryRejection>,
) -> ApiResult<Json<TaskStats>> {
    let Query(query) = query?;
    let period = match query.period.as_deref() {
        Some("day") => StatsPeriod::Day,
        Some("week") => StatsPeriod::Week,
        Some("month") => StatsPeriod::Month,
        _ => return Err(ApiError::validation("period must be day, week or month")),
    };

    Ok(Json(state.db.task_stats(user.id, period, today()).await?))
}
