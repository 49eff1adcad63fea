//! Task model and database operations
//!
//! Tasks belong to exactly one user and carry any number of tags. Reads return
//! [`TaskDetail`], which bundles the owner and the tags with the row.
//!
//! # Lifecycle
//!
//! ```text
//! pending → in_progress → completed
//!         ↘             ↘ cancelled
//! ```
//!
//! Any transition is accepted. Moving into `in_progress` stamps `start_time`
//! once; moving into `completed` stamps `end_time` once (see
//! [`TaskChanges::from_request`]).
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE task_status AS ENUM ('pending', 'in_progress', 'completed', 'cancelled');
//! CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high', 'urgent');
//!
//! CREATE TABLE tasks (
//!     id BIGSERIAL PRIMARY KEY,
//!     title VARCHAR(200) NOT NULL,
//!     description TEXT NOT NULL DEFAULT '',
//!     status task_status NOT NULL DEFAULT 'pending',
//!     priority task_priority NOT NULL DEFAULT 'medium',
//!     start_time TIMESTAMPTZ,
//!     end_time TIMESTAMPTZ,
//!     due_date TIMESTAMPTZ,
//!     user_id BIGINT NOT NULL REFERENCES users(id),
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     deleted_at TIMESTAMPTZ
//! );
//! ```
//!
//! # Example
//!
//! ```no_run
//! use taskdesk_shared::models::task::{NewTask, Task, TaskPriority};
//! use taskdesk_shared::db::pool::{create_pool, DatabaseConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! let mut tx = pool.begin().await?;
//!
//! let task = Task::create(&mut *tx, NewTask {
//!     user_id: 1,
//!     title: "Write release notes".to_string(),
//!     description: String::new(),
//!     priority: TaskPriority::High,
//!     due_date: None,
//! }).await?;
//!
//! tx.commit().await?;
//! println!("created task {}", task.id);
//! # Ok(())
//! # }
//! ```

use super::{tag::Tag, user::User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use validator::Validate;

const TASK_COLUMNS: &str = "id, title, description, status, priority, start_time, end_time, \
                            due_date, user_id, created_at, updated_at";

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    /// Every status, in lifecycle order
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
    ];

    /// Database and cache-key spelling of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Task row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,

    /// Set the first time the task moves into `in_progress`
    pub start_time: Option<DateTime<Utc>>,

    /// Set the first time the task moves into `completed`
    pub end_time: Option<DateTime<Utc>>,

    pub due_date: Option<DateTime<Utc>>,

    /// Owner; never changes after creation
    pub user_id: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task with its owner and tags, as returned to callers and cached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub user: User,
    pub tags: Vec<Tag>,
}

/// Task creation payload
///
/// There is no status field: new tasks always start as `pending`, and a
/// `status` key in the JSON body is ignored.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub priority: TaskPriority,

    pub due_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

/// Partial task update payload
///
/// Absent fields are left untouched. `tag_ids` distinguishes absent (keep the
/// current tags) from an empty list (remove all tags).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: Option<String>,

    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub tag_ids: Option<Vec<i64>>,
}

/// Input for inserting a task row
#[derive(Debug, Clone)]
pub struct NewTask {
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn from_request(user_id: i64, req: &CreateTaskRequest) -> Self {
        Self {
            user_id,
            title: req.title.clone(),
            description: req.description.clone(),
            priority: req.priority,
            due_date: req.due_date,
        }
    }
}

/// Sparse set of column changes for one task update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskChanges {
    /// Builds the change set for `req` against the task's current state
    ///
    /// Moving into `in_progress` while `start_time` is unset stamps it with
    /// `now`; moving into `completed` while `end_time` is unset stamps that.
    /// A `start_time`/`end_time` given explicitly in the request always wins.
    pub fn from_request(req: &UpdateTaskRequest, current: &Task, now: DateTime<Utc>) -> Self {
        let mut changes = Self {
            title: req.title.clone(),
            description: req.description.clone(),
            status: req.status,
            priority: req.priority,
            start_time: req.start_time,
            end_time: req.end_time,
            due_date: req.due_date,
        };

        match req.status {
            Some(TaskStatus::InProgress)
                if current.start_time.is_none() && changes.start_time.is_none() =>
            {
                changes.start_time = Some(now);
            }
            Some(TaskStatus::Completed)
                if current.end_time.is_none() && changes.end_time.is_none() =>
            {
                changes.end_time = Some(now);
            }
            _ => {}
        }

        changes
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the change set to an in-memory row
    pub fn apply_to(&self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(start_time) = self.start_time {
            task.start_time = Some(start_time);
        }
        if let Some(end_time) = self.end_time {
            task.end_time = Some(end_time);
        }
        if let Some(due_date) = self.due_date {
            task.due_date = Some(due_date);
        }
        task.updated_at = now;
    }
}

/// Optional predicates for task queries, AND-ed together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub user_id: Option<i64>,
    pub tag_id: Option<i64>,

    /// Case-insensitive substring of title or description
    pub keyword: Option<String>,

    /// Only tasks due strictly before this instant
    pub due_before: Option<DateTime<Utc>>,

    /// Only tasks due strictly after this instant
    pub due_after: Option<DateTime<Utc>>,
}

impl TaskFilter {
    /// The keyword, trimmed, if it is non-empty
    pub fn keyword(&self) -> Option<&str> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
    }

    /// Evaluates the filter against an in-memory row
    ///
    /// `tag_ids` are the IDs currently linked to the task.
    pub fn matches(&self, task: &Task, tag_ids: &[i64]) -> bool {
        if self.status.is_some_and(|status| task.status != status) {
            return false;
        }
        if self.priority.is_some_and(|priority| task.priority != priority) {
            return false;
        }
        if self.user_id.is_some_and(|user_id| task.user_id != user_id) {
            return false;
        }
        if self.tag_id.is_some_and(|tag_id| !tag_ids.contains(&tag_id)) {
            return false;
        }
        if let Some(keyword) = self.keyword() {
            let keyword = keyword.to_lowercase();
            if !task.title.to_lowercase().contains(&keyword)
                && !task.description.to_lowercase().contains(&keyword)
            {
                return false;
            }
        }
        if let Some(before) = self.due_before {
            if !task.due_date.is_some_and(|due| due < before) {
                return false;
            }
        }
        if let Some(after) = self.due_after {
            if !task.due_date.is_some_and(|due| due > after) {
                return false;
            }
        }
        true
    }

    /// Appends the WHERE clause for this filter to a query over `tasks`
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE tasks.deleted_at IS NULL");

        if let Some(status) = self.status {
            builder.push(" AND tasks.status = ").push_bind(status);
        }
        if let Some(priority) = self.priority {
            builder.push(" AND tasks.priority = ").push_bind(priority);
        }
        if let Some(user_id) = self.user_id {
            builder.push(" AND tasks.user_id = ").push_bind(user_id);
        }
        if let Some(tag_id) = self.tag_id {
            builder
                .push(" AND EXISTS (SELECT 1 FROM task_tags WHERE task_tags.task_id = tasks.id AND task_tags.tag_id = ")
                .push_bind(tag_id)
                .push(")");
        }
        if let Some(keyword) = self.keyword() {
            let pattern = format!("%{}%", escape_like(keyword));
            builder
                .push(" AND (tasks.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR tasks.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(before) = self.due_before {
            builder.push(" AND tasks.due_date < ").push_bind(before);
        }
        if let Some(after) = self.due_after {
            builder.push(" AND tasks.due_date > ").push_bind(after);
        }
    }
}

/// Escapes LIKE metacharacters with the default `\` escape
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Per-status task counts for one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub total: i64,

    /// Due in the past and not completed
    pub overdue: i64,
}

impl TaskStats {
    pub fn get(&self, status: TaskStatus) -> i64 {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::InProgress => self.in_progress,
            TaskStatus::Completed => self.completed,
            TaskStatus::Cancelled => self.cancelled,
        }
    }

    pub fn set(&mut self, status: TaskStatus, count: i64) {
        match status {
            TaskStatus::Pending => self.pending = count,
            TaskStatus::InProgress => self.in_progress = count,
            TaskStatus::Completed => self.completed = count,
            TaskStatus::Cancelled => self.cancelled = count,
        }
    }
}

impl Task {
    /// Inserts a new task in `pending` state inside a caller-owned transaction
    pub async fn create(conn: &mut PgConnection, data: NewTask) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (title, description, status, priority, due_date, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(data.title)
        .bind(data.description)
        .bind(TaskStatus::Pending)
        .bind(data.priority)
        .bind(data.due_date)
        .bind(data.user_id)
        .fetch_one(conn)
        .await
    }

    /// Finds a live task by ID
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Writes a change set inside a caller-owned transaction
    ///
    /// Returns `false` if no live task has this ID.
    pub async fn update(
        conn: &mut PgConnection,
        id: i64,
        changes: &TaskChanges,
    ) -> Result<bool, sqlx::Error> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("UPDATE tasks SET updated_at = NOW()");

        if let Some(title) = &changes.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(description) = &changes.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(status) = changes.status {
            builder.push(", status = ").push_bind(status);
        }
        if let Some(priority) = changes.priority {
            builder.push(", priority = ").push_bind(priority);
        }
        if let Some(start_time) = changes.start_time {
            builder.push(", start_time = ").push_bind(start_time);
        }
        if let Some(end_time) = changes.end_time {
            builder.push(", end_time = ").push_bind(end_time);
        }
        if let Some(due_date) = changes.due_date {
            builder.push(", due_date = ").push_bind(due_date);
        }

        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND deleted_at IS NULL");

        let result = builder.build().execute(conn).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-deletes a task inside a caller-owned transaction
    pub async fn soft_delete(conn: &mut PgConnection, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Soft-deletes every live task of a user, returning their IDs
    pub async fn soft_delete_for_user(
        conn: &mut PgConnection,
        user_id: i64,
    ) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE tasks SET deleted_at = NOW() \
             WHERE user_id = $1 AND deleted_at IS NULL \
             RETURNING id",
        )
        .bind(user_id)
        .fetch_all(conn)
        .await
    }

    /// Fetches one page of tasks matching `filter`, newest first
    pub async fn query(
        pool: &PgPool,
        filter: &TaskFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM tasks"));
        filter.push_where(&mut builder);
        builder
            .push(" ORDER BY tasks.created_at DESC, tasks.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        builder.build_query_as::<Task>().fetch_all(pool).await
    }

    /// Counts all tasks matching `filter`
    pub async fn count(pool: &PgPool, filter: &TaskFilter) -> Result<i64, sqlx::Error> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM tasks");
        filter.push_where(&mut builder);

        let (count,): (i64,) = builder.build_query_as().fetch_one(pool).await?;
        Ok(count)
    }

    /// Counts a user's live tasks grouped by status
    ///
    /// Statuses with no tasks are absent from the result.
    pub async fn count_by_status(
        pool: &PgPool,
        user_id: i64,
    ) -> Result<Vec<(TaskStatus, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (TaskStatus, i64)>(
            "SELECT status, COUNT(*) FROM tasks \
             WHERE user_id = $1 AND deleted_at IS NULL \
             GROUP BY status",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Counts a user's live tasks that are past due and not completed
    pub async fn count_overdue(
        pool: &PgPool,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tasks \
             WHERE user_id = $1 AND deleted_at IS NULL \
             AND due_date < $2 AND status <> 'completed'",
        )
        .bind(user_id)
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Attaches owners and tags to a batch of rows, preserving their order
    pub async fn load_details(
        pool: &PgPool,
        tasks: Vec<Task>,
    ) -> Result<Vec<TaskDetail>, sqlx::Error> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let task_ids: Vec<i64> = tasks.iter().map(|task| task.id).collect();
        let mut user_ids: Vec<i64> = tasks.iter().map(|task| task.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let users: HashMap<i64, User> = User::find_many(pool, &user_ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
        for (task_id, tag) in Tag::for_tasks(pool, &task_ids).await? {
            tags.entry(task_id).or_default().push(tag);
        }

        let mut details = Vec::with_capacity(tasks.len());
        for task in tasks {
            let user = users.get(&task.user_id).cloned().ok_or_else(|| {
                sqlx::Error::Protocol(format!("owner {} of task {} not found", task.user_id, task.id))
            })?;
            let task_tags = tags.remove(&task.id).unwrap_or_default();
            details.push(TaskDetail {
                task,
                user,
                tags: task_tags,
            });
        }

        Ok(details)
    }
}
