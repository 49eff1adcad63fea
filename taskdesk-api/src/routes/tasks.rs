/// Task endpoints
///
/// Writes act for the user named in `X-User-ID` and are refused with `403`
/// when that user does not own the task.
///
/// # Endpoints
///
/// - `POST   /api/v1/tasks` - Create a task (always `pending`)
/// - `GET    /api/v1/tasks` - Query tasks
/// - `GET    /api/v1/tasks/:id` - Get a task with its user and tags
/// - `PUT    /api/v1/tasks/:id` - Partially update a task
/// - `DELETE /api/v1/tasks/:id` - Delete a task
/// - `POST   /api/v1/tasks/:id/complete` - Mark a task completed

use super::TaskQueryParams;
use crate::{app::AppState, error::ApiResult, extract::ActingUser};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use taskdesk_shared::models::{CreateTaskRequest, Page, TaskDetail, UpdateTaskRequest};

/// Create a task
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/tasks
/// X-User-ID: 1
/// Content-Type: application/json
///
/// {
///   "title": "Write report",
///   "priority": "high",
///   "due_date": "2025-06-01T12:00:00Z",
///   "tag_ids": [1, 2]
/// }
/// ```
///
/// Unknown tag ids are ignored. Responds `201` with the task, its user and
/// its tags.
///
/// # Errors
///
/// - `401 Unauthorized`: missing `X-User-ID`
/// - `404 Not Found`: the acting user does not exist
/// - `400 Bad Request`: validation failed
pub async fn create_task(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TaskDetail>)> {
    let Json(req) = payload?;
    let task = state.tasks.create_task(user_id, req).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Query tasks
///
/// Accepts `status`, `priority`, `user_id`, `tag_id`, `keyword`, `due_before`,
/// `due_after`, `page` and `page_size`. Newest first.
pub async fn query_tasks(
    State(state): State<AppState>,
    query: Result<Query<TaskQueryParams>, QueryRejection>,
) -> ApiResult<Json<Page<TaskDetail>>> {
    let Query(params) = query?;
    let (filter, page) = params.into_parts();
    Ok(Json(state.tasks.query_tasks(&filter, &page).await?))
}

/// Get a task
pub async fn get_task(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<TaskDetail>> {
    let Path(task_id) = path?;
    Ok(Json(state.tasks.get_task(task_id).await?))
}

/// Update a task
///
/// Only the fields present in the body change. `tag_ids` replaces the whole
/// tag set when present (`[]` clears it). Moving to `in_progress` stamps
/// `start_time` and moving to `completed` stamps `end_time`, each only once.
///
/// # Errors
///
/// - `403 Forbidden`: the acting user does not own the task
/// - `404 Not Found`: no such task
/// - `400 Bad Request`: validation failed
pub async fn update_task(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> ApiResult<Json<TaskDetail>> {
    let Path(task_id) = path?;
    let Json(req) = payload?;
    Ok(Json(state.tasks.update_task(task_id, user_id, req).await?))
}

/// Delete a task; responds `204`
pub async fn delete_task(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(task_id) = path?;
    state.tasks.delete_task(task_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark a task completed
pub async fn complete_task(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<TaskDetail>> {
    let Path(task_id) = path?;
    Ok(Json(state.tasks.complete_task(task_id, user_id).await?))
}
