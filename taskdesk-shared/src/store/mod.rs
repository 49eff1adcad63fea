/// Data-access traits
///
/// Services talk to persistence only through these traits, which keeps the
/// workflow independent of the backend. Two implementations ship with the
/// crate:
///
/// - [`postgres::PgStore`]: the production store over a `PgPool`
/// - [`crate::memory::MemoryStore`]: an in-process store for tests
///
/// Every multi-row write (`create_task`, `update_task`, `delete_task`,
/// `delete_user_cascade`) is atomic: either all of its rows change or none do.

pub mod postgres;

pub use postgres::PgStore;

use crate::models::{
    NewTag, NewTask, NewUser, PageRequest, Tag, TaskChanges, TaskDetail, TaskFilter, TaskStatus,
    UpdateUserRequest, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique index rejected the write; carries the index name
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The row to modify does not exist (or is soft-deleted)
    #[error("Row not found")]
    RowNotFound,

    /// The backend cannot be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Any other database error
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::RowNotFound,
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::UniqueViolation(db_err.constraint().unwrap_or_default().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

/// User persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Applies the present profile fields; `RowNotFound` if the user is gone
    async fn update_user(&self, id: i64, changes: &UpdateUserRequest) -> StoreResult<()>;

    /// Soft-deletes the user and all of their tasks in one transaction
    ///
    /// Returns the IDs of the tasks that were deleted.
    async fn delete_user_cascade(&self, id: i64) -> StoreResult<Vec<i64>>;

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()>;

    /// One page of live users, newest first, plus the total count
    async fn list_users(&self, page: &PageRequest) -> StoreResult<(Vec<User>, i64)>;
}

/// Tag persistence
#[async_trait]
pub trait TagStore: Send + Sync {
    async fn insert_tag(&self, tag: NewTag) -> StoreResult<Tag>;

    async fn find_tag(&self, id: i64) -> StoreResult<Option<Tag>>;

    async fn find_tag_by_name(&self, name: &str) -> StoreResult<Option<Tag>>;

    /// Live tags ordered by name
    async fn list_tags(&self) -> StoreResult<Vec<Tag>>;
}

/// Task persistence
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Inserts a `pending` task and links the resolvable subset of `tag_ids`
    ///
    /// Returns the new task ID. Nothing is written if any step fails.
    async fn create_task(&self, task: NewTask, tag_ids: &[i64]) -> StoreResult<i64>;

    /// Loads a live task with its owner and tags
    async fn find_task(&self, id: i64) -> StoreResult<Option<TaskDetail>>;

    /// Writes `changes` and, when `tag_ids` is `Some`, replaces the tag links
    ///
    /// `Some(&[])` removes every link. Nothing is written if any step fails.
    async fn update_task(
        &self,
        id: i64,
        changes: &TaskChanges,
        tag_ids: Option<&[i64]>,
    ) -> StoreResult<()>;

    /// Clears the task's tag links and soft-deletes it
    async fn delete_task(&self, id: i64) -> StoreResult<()>;

    /// One page of matching tasks, newest first, plus the total match count
    async fn query_tasks(
        &self,
        filter: &TaskFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<TaskDetail>, i64)>;

    /// Live task counts for a user, grouped by status
    async fn count_by_status(&self, user_id: i64) -> StoreResult<Vec<(TaskStatus, i64)>>;

    /// Live tasks of a user with a past due date that are not completed
    async fn count_overdue(&self, user_id: i64, now: DateTime<Utc>) -> StoreResult<i64>;

    /// Verifies the backend answers
    async fn ping(&self) -> StoreResult<()>;
}

/// Convenience bound for a backend that stores everything
pub trait Store: UserStore + TagStore + TaskStore {}

impl<T: UserStore + TagStore + TaskStore> Store for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::RowNotFound
        ));
    }

    #[test]
    fn test_pool_timeout_is_unavailable() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn test_other_errors_are_database() {
        let err = StoreError::from(sqlx::Error::Protocol("bad".to_string()));
        assert!(matches!(err, StoreError::Database(_)));
        assert!(err.to_string().contains("bad"));
    }
}
