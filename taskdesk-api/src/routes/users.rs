/// User endpoints
///
/// # Endpoints
///
/// - `POST   /api/v1/users` - Register
/// - `GET    /api/v1/users` - List users, newest first
/// - `GET    /api/v1/users/username/:username` - Look up by username
/// - `GET    /api/v1/users/:id` - Get a user
/// - `PUT    /api/v1/users/:id` - Update nickname, avatar or phone
/// - `DELETE /api/v1/users/:id` - Delete the user and all of their tasks
/// - `POST   /api/v1/users/:id/login` - Stamp the last login time
/// - `GET    /api/v1/users/:id/tasks` - The user's tasks
/// - `GET    /api/v1/users/:id/tasks/stats` - Per-status task counts

use super::TaskQueryParams;
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use taskdesk_shared::models::{
    Page, PageRequest, RegisterUserRequest, TaskDetail, TaskStats, UpdateUserRequest, User,
};

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/users
/// Content-Type: application/json
///
/// {
///   "username": "alice",
///   "email": "alice@example.com",
///   "password": "s3cret!",
///   "nickname": "Alice"
/// }
/// ```
///
/// Responds `201` with the user; the password hash is never returned.
///
/// # Errors
///
/// - `409 Conflict`: username or email already taken
/// - `400 Bad Request`: validation failed
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let Json(req) = payload?;
    let user = state.users.register(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<PageRequest>, QueryRejection>,
) -> ApiResult<Json<Page<User>>> {
    let Query(page) = query?;
    Ok(Json(state.users.list_users(&page).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<User>> {
    let Path(user_id) = path?;
    Ok(Json(state.users.get_user(user_id).await?))
}

pub async fn get_user_by_username(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<User>> {
    let Path(username) = path?;
    Ok(Json(state.users.get_user_by_username(&username).await?))
}

/// Update profile fields; absent fields are left unchanged
pub async fn update_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let Path(user_id) = path?;
    let Json(req) = payload?;
    Ok(Json(state.users.update_user(user_id, req).await?))
}

/// Delete a user together with their tasks; responds `204`
pub async fn delete_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(user_id) = path?;
    state.users.delete_user(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stamp the user's last login time; responds `204`
pub async fn record_login(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(user_id) = path?;
    state.users.record_login(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The user's tasks; the other task filters still apply
pub async fn list_user_tasks(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    query: Result<Query<TaskQueryParams>, QueryRejection>,
) -> ApiResult<Json<Page<TaskDetail>>> {
    let Path(user_id) = path?;
    let Query(params) = query?;

    state.users.get_user(user_id).await?;

    let (mut filter, page) = params.into_parts();
    filter.user_id = Some(user_id);
    Ok(Json(state.tasks.query_tasks(&filter, &page).await?))
}

/// Recount the user's tasks per status
///
/// # Response
///
/// ```json
/// {
///   "pending": 3,
///   "in_progress": 1,
///   "completed": 7,
///   "cancelled": 0,
///   "total": 11,
///   "overdue": 2
/// }
/// ```
pub async fn user_task_stats(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<TaskStats>> {
    let Path(user_id) = path?;
    Ok(Json(state.tasks.user_task_stats(user_id).await?))
}
