//! PostgreSQL-backed store
//!
//! Composes the model-level SQL in [`crate::models`] into the transactional
//! operations the services need. Dropping an uncommitted `Transaction` rolls it
//! back, so an early `?` return (or a cancelled request) never leaves a partial
//! write behind.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskdesk_shared::db::pool::{create_pool, DatabaseConfig};
//! use taskdesk_shared::store::postgres::PgStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! let store = Arc::new(PgStore::new(pool));
//! # Ok(())
//! # }
//! ```

use super::{StoreError, StoreResult, TagStore, TaskStore, UserStore};
use crate::db::pool::health_check;
use crate::models::{
    NewTag, NewTask, NewUser, PageRequest, Tag, Task, TaskChanges, TaskDetail, TaskFilter,
    TaskStatus, UpdateUserRequest, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

/// Store over a PostgreSQL pool; cheap to clone
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        Ok(User::create(&self.pool, user).await?)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_username(&self.pool, username).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn update_user(&self, id: i64, changes: &UpdateUserRequest) -> StoreResult<()> {
        if User::update(&self.pool, id, changes).await? {
            Ok(())
        } else {
            Err(StoreError::RowNotFound)
        }
    }

    async fn delete_user_cascade(&self, id: i64) -> StoreResult<Vec<i64>> {
        let mut tx = self.pool.begin().await?;

        let task_ids = Task::soft_delete_for_user(&mut *tx, id).await?;
        if !User::soft_delete(&mut *tx, id).await? {
            return Err(StoreError::RowNotFound);
        }

        tx.commit().await?;
        debug!(user_id = id, tasks_deleted = task_ids.len(), "User soft-deleted");
        Ok(task_ids)
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        if User::record_login(&self.pool, id, at).await? {
            Ok(())
        } else {
            Err(StoreError::RowNotFound)
        }
    }

    async fn list_users(&self, page: &PageRequest) -> StoreResult<(Vec<User>, i64)> {
        let users = User::list(&self.pool, page.limit(), page.offset()).await?;
        let total = User::count(&self.pool).await?;
        Ok((users, total))
    }
}

#[async_trait]
impl TagStore for PgStore {
    async fn insert_tag(&self, tag: NewTag) -> StoreResult<Tag> {
        Ok(Tag::create(&self.pool, tag).await?)
    }

    async fn find_tag(&self, id: i64) -> StoreResult<Option<Tag>> {
        Ok(Tag::find_by_id(&self.pool, id).await?)
    }

    async fn find_tag_by_name(&self, name: &str) -> StoreResult<Option<Tag>> {
        Ok(Tag::find_by_name(&self.pool, name).await?)
    }

    async fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        Ok(Tag::list(&self.pool).await?)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create_task(&self, task: NewTask, tag_ids: &[i64]) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await?;

        let created = Task::create(&mut *tx, task).await?;
        if !tag_ids.is_empty() {
            let resolved = Tag::resolve_ids(&mut *tx, tag_ids).await?;
            Tag::link_to_task(&mut *tx, created.id, &resolved).await?;
        }

        tx.commit().await?;
        Ok(created.id)
    }

    async fn find_task(&self, id: i64) -> StoreResult<Option<TaskDetail>> {
        let Some(task) = Task::find_by_id(&self.pool, id).await? else {
            return Ok(None);
        };

        let mut details = Task::load_details(&self.pool, vec![task]).await?;
        Ok(details.pop())
    }

    async fn update_task(
        &self,
        id: i64,
        changes: &TaskChanges,
        tag_ids: Option<&[i64]>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        if !Task::update(&mut *tx, id, changes).await? {
            return Err(StoreError::RowNotFound);
        }

        if let Some(tag_ids) = tag_ids {
            Tag::clear_for_task(&mut *tx, id).await?;
            if !tag_ids.is_empty() {
                let resolved = Tag::resolve_ids(&mut *tx, tag_ids).await?;
                Tag::link_to_task(&mut *tx, id, &resolved).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_task(&self, id: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        Tag::clear_for_task(&mut *tx, id).await?;
        if !Task::soft_delete(&mut *tx, id).await? {
            return Err(StoreError::RowNotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query_tasks(
        &self,
        filter: &TaskFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<TaskDetail>, i64)> {
        let total = Task::count(&self.pool, filter).await?;
        if total == 0 {
            return Ok((Vec::new(), 0));
        }

        let tasks = Task::query(&self.pool, filter, page.limit(), page.offset()).await?;
        let details = Task::load_details(&self.pool, tasks).await?;
        Ok((details, total))
    }

    async fn count_by_status(&self, user_id: i64) -> StoreResult<Vec<(TaskStatus, i64)>> {
        Ok(Task::count_by_status(&self.pool, user_id).await?)
    }

    async fn count_overdue(&self, user_id: i64, now: DateTime<Utc>) -> StoreResult<i64> {
        Ok(Task::count_overdue(&self.pool, user_id, now).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(health_check(&self.pool).await?)
    }
}
