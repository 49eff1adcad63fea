/// API route handlers
///
/// - `health`: store and cache health
/// - `users`: registration, profiles and per-user task views
/// - `tasks`: the task mutation workflow and task queries
/// - `tags`: tag management and per-tag task views

pub mod health;
pub mod tags;
pub mod tasks;
pub mod users;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use taskdesk_shared::models::{PageRequest, TaskFilter, TaskPriority, TaskStatus};

/// Query string accepted by every task listing
///
/// Kept flat because `serde_urlencoded` cannot drive `#[serde(flatten)]`
/// into typed fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskQueryParams {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub user_id: Option<i64>,
    pub tag_id: Option<i64>,
    pub keyword: Option<String>,
    pub due_before: Option<DateTime<Utc>>,
    pub due_after: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl TaskQueryParams {
    pub fn into_parts(self) -> (TaskFilter, PageRequest) {
        let filter = TaskFilter {
            status: self.status,
            priority: self.priority,
            user_id: self.user_id,
            tag_id: self.tag_id,
            keyword: self.keyword,
            due_before: self.due_before,
            due_after: self.due_after,
        };
        let page = PageRequest {
            page: self.page,
            page_size: self.page_size,
        };
        (filter, page)
    }
}
