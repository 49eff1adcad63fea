/// Tag endpoints
///
/// - `POST /api/v1/tags` - Create a tag
/// - `GET  /api/v1/tags` - List tags by name
/// - `GET  /api/v1/tags/:id` - Get a tag
/// - `GET  /api/v1/tags/:id/tasks` - Tasks carrying the tag

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
use taskdesk_shared::models::{CreateTagRequest, Page, Tag, TaskDetail};

/// Create a tag
///
/// ```text
/// POST /api/v1/tags
///
/// { "name": "urgent", "color": "#ff0000" }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: a tag with this name exists
/// - `400 Bad Request`: empty name or malformed color
pub async fn create_tag(
    State(state): State<AppState>,
    payload: Result<Json<CreateTagRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Tag>)> {
    let Json(req) = payload?;
    let tag = state.tags.create_tag(req).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn list_tags(State(state): State<AppState>) -> ApiResult<Json<Vec<Tag>>> {
    Ok(Json(state.tags.list_tags().await?))
}

pub async fn get_tag(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Tag>> {
    let Path(tag_id) = path?;
    Ok(Json(state.tags.get_tag(tag_id).await?))
}

/// Tasks carrying a tag; the other task filters still apply
pub async fn list_tag_tasks(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    query: Result<Query<TaskQueryParams>, QueryRejection>,
) -> ApiResult<Json<Page<TaskDetail>>> {
    let Path(tag_id) = path?;
    let Query(params) = query?;

    state.tags.get_tag(tag_id).await?;

    let (mut filter, page) = params.into_parts();
    filter.tag_id = Some(tag_id);
    Ok(Json(state.tasks.query_tasks(&filter, &page).await?))
}
