use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::db::User;

#[derive(Debug, Deserialize)]
pub struct RegisterUser {
    #[serde(default)]
    username: Option<String>,
}

pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// Get-or-create: `201` for a new user, `200` when the name already exists.
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let Json(body) = payload?;
    let username = body.username.as_deref().map(str::trim).unwrap_or_default();
    if username.is_empty() {
        return Err(ApiError::validation("username is required"));
    }

    let (user, created) = state.db.ensure_user(username).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(user)))
}
