//! Task mutation workflow
//!
//! Create, update and delete keep four things in step: the task row, its tag
//! links, the `task:<id>` cache entry and the owner's per-status counters.
//! The row and its links change inside one store transaction; the cache is
//! touched only after that transaction has committed, and only best-effort.
//!
//! ```text
//! create:  tx{insert pending, link tags} → reload → cache task:<id>
//!                                                → del user_tasks:<uid>
//!                                                → incr task_count:<uid>:pending
//! update:  get (cache-aside) → owner check → tx{apply changes, replace tags}
//!          → reload → del task:<id>, del user_tasks:<uid>
//!          → (status changed) decr old counter, incr new counter
//! delete:  get (cache-aside) → owner check → tx{clear tags, soft-delete}
//!          → del task:<id>, del user_tasks:<uid>, decr counter
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskdesk_shared::cache::CacheTtls;
//! use taskdesk_shared::memory::{MemoryCache, MemoryStore};
//! use taskdesk_shared::models::CreateTaskRequest;
//! use taskdesk_shared::services::TaskService;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let service = TaskService::new(store.clone(), store, Arc::new(MemoryCache::new()), CacheTtls::default());
//!
//! let task = service
//!     .create_task(1, CreateTaskRequest { title: "Ship it".to_string(), ..Default::default() })
//!     .await?;
//! service.complete_task(task.task.id, 1).await?;
//! # Ok(())
//! # }
//! ```

use super::{invalidate, ServiceError, ServiceResult};
use crate::cache::{self, keys, Cache, CacheTtls};
use crate::models::{
    CreateTaskRequest, NewTask, Page, PageRequest, TaskChanges, TaskDetail, TaskFilter, TaskStats,
    TaskStatus, UpdateTaskRequest,
};
use crate::store::{StoreError, TaskStore, UserStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use validator::Validate;

/// Task operations; cheap to clone
#[derive(Clone)]
pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    users: Arc<dyn UserStore>,
    cache: Arc<dyn Cache>,
    ttls: CacheTtls,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        users: Arc<dyn UserStore>,
        cache: Arc<dyn Cache>,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            tasks,
            users,
            cache,
            ttls,
        }
    }

    /// Creates a `pending` task owned by `user_id`
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user does not exist, checked before the payload
    /// - `InvalidArgument` if the payload is invalid
    /// - `Internal` if the insert transaction fails (nothing is written)
    pub async fn create_task(
        &self,
        user_id: i64,
        req: CreateTaskRequest,
    ) -> ServiceResult<TaskDetail> {
        if self.users.find_user(user_id).await?.is_none() {
            return Err(ServiceError::not_found("user", user_id));
        }

        req.validate()?;

        let task_id = self
            .tasks
            .create_task(NewTask::from_request(user_id, &req), &req.tag_ids)
            .await
            .map_err(|e| {
                error!(user_id, error = %e, "Failed to create task");
                ServiceError::Internal(format!("failed to create task: {e}"))
            })?;

        let detail = self.reload(task_id).await?;

        self.cache_task(&detail).await;
        invalidate(&*self.cache, &keys::user_tasks_key(user_id)).await;
        self.adjust_counter(user_id, TaskStatus::Pending, 1).await;

        info!(task_id, user_id, tags = detail.tags.len(), "Task created");
        Ok(detail)
    }

    /// Fetches a task, serving from the cache when possible
    ///
    /// A miss, an undecodable entry or a cache error all fall through to the
    /// store; the result is then written back to the cache.
    pub async fn get_task(&self, task_id: i64) -> ServiceResult<TaskDetail> {
        let key = keys::task_key(task_id);

        match cache::get_json::<TaskDetail>(&*self.cache, &key).await {
            Ok(Some(detail)) => {
                debug!(task_id, "Task cache hit");
                return Ok(detail);
            }
            Ok(None) => debug!(task_id, "Task cache miss"),
            Err(e) => warn!(task_id, error = %e, "Task cache read failed, falling back to store"),
        }

        let detail = self
            .tasks
            .find_task(task_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("task", task_id))?;

        self.cache_task(&detail).await;
        Ok(detail)
    }

    /// Applies a partial update on behalf of `user_id`
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the payload is invalid
    /// - `NotFound` if the task does not exist
    /// - `PermissionDenied` if `user_id` does not own the task (nothing is written)
    /// - `Internal` if the update transaction fails (nothing is written)
    pub async fn update_task(
        &self,
        task_id: i64,
        user_id: i64,
        req: UpdateTaskRequest,
    ) -> ServiceResult<TaskDetail> {
        req.validate()?;

        let current = self.owned_task(task_id, user_id).await?;
        let old_status = current.task.status;
        let changes = TaskChanges::from_request(&req, &current.task, Utc::now());

        self.tasks
            .update_task(task_id, &changes, req.tag_ids.as_deref())
            .await
            .map_err(|e| transaction_error("update", task_id, e))?;

        let detail = self.reload(task_id).await?;

        invalidate(&*self.cache, &keys::task_key(task_id)).await;
        invalidate(&*self.cache, &keys::user_tasks_key(user_id)).await;
        if let Some(new_status) = changes.status.filter(|status| *status != old_status) {
            self.adjust_counter(user_id, old_status, -1).await;
            self.adjust_counter(user_id, new_status, 1).await;
        }

        info!(task_id, user_id, status = %detail.task.status, "Task updated");
        Ok(detail)
    }

    /// Marks a task completed; same rules as [`TaskService::update_task`]
    pub async fn complete_task(&self, task_id: i64, user_id: i64) -> ServiceResult<TaskDetail> {
        let req = UpdateTaskRequest {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        self.update_task(task_id, user_id, req).await
    }

    /// Soft-deletes a task on behalf of `user_id`
    pub async fn delete_task(&self, task_id: i64, user_id: i64) -> ServiceResult<()> {
        let current = self.owned_task(task_id, user_id).await?;

        self.tasks
            .delete_task(task_id)
            .await
            .map_err(|e| transaction_error("delete", task_id, e))?;

        invalidate(&*self.cache, &keys::task_key(task_id)).await;
        invalidate(&*self.cache, &keys::user_tasks_key(user_id)).await;
        self.adjust_counter(user_id, current.task.status, -1).await;

        info!(task_id, user_id, "Task deleted");
        Ok(())
    }

    /// Lists tasks matching `filter`, newest first
    pub async fn query_tasks(
        &self,
        filter: &TaskFilter,
        page: &PageRequest,
    ) -> ServiceResult<Page<TaskDetail>> {
        let (list, total) = self.tasks.query_tasks(filter, page).await?;
        Ok(Page::new(list, page, total))
    }

    /// Recounts a user's tasks from the store and refreshes their counters
    pub async fn user_task_stats(&self, user_id: i64) -> ServiceResult<TaskStats> {
        if self.users.find_user(user_id).await?.is_none() {
            return Err(ServiceError::not_found("user", user_id));
        }

        let mut stats = TaskStats::default();
        for (status, count) in self.tasks.count_by_status(user_id).await? {
            stats.set(status, count);
        }
        stats.total = TaskStatus::ALL.iter().map(|status| stats.get(*status)).sum();
        stats.overdue = self.tasks.count_overdue(user_id, Utc::now()).await?;

        for status in TaskStatus::ALL {
            self.store_counter(user_id, status, stats.get(status)).await;
        }

        Ok(stats)
    }

    /// Number of a user's tasks in `status`
    ///
    /// Served from the counter when present; otherwise recounted from the
    /// store and written back.
    pub async fn status_count(&self, user_id: i64, status: TaskStatus) -> ServiceResult<i64> {
        let key = keys::task_count_key(user_id, status);

        match cache::get_counter(&*self.cache, &key).await {
            Ok(Some(count)) => return Ok(count),
            Ok(None) => {}
            Err(e) => warn!(user_id, %status, error = %e, "Counter read failed, recounting"),
        }

        let count = self
            .tasks
            .count_by_status(user_id)
            .await?
            .into_iter()
            .find_map(|(counted, count)| (counted == status).then_some(count))
            .unwrap_or(0);

        self.store_counter(user_id, status, count).await;
        Ok(count)
    }

    /// Fetches a task and checks that `user_id` owns it
    async fn owned_task(&self, task_id: i64, user_id: i64) -> ServiceResult<TaskDetail> {
        let current = self.get_task(task_id).await?;

        if current.task.user_id != user_id {
            warn!(task_id, user_id, owner = current.task.user_id, "Task access denied");
            return Err(ServiceError::PermissionDenied(
                "No permission to modify this task".to_string(),
            ));
        }

        Ok(current)
    }

    /// Reads a freshly written task from the store, bypassing the cache
    async fn reload(&self, task_id: i64) -> ServiceResult<TaskDetail> {
        self.tasks
            .find_task(task_id)
            .await?
            .ok_or_else(|| ServiceError::Internal(format!("task {task_id} missing after commit")))
    }

    async fn cache_task(&self, detail: &TaskDetail) {
        let key = keys::task_key(detail.task.id);
        if let Err(e) = cache::set_json(&*self.cache, &key, detail, self.ttls.task()).await {
            warn!(task_id = detail.task.id, error = %e, "Failed to cache task");
        }
    }

    async fn adjust_counter(&self, user_id: i64, status: TaskStatus, delta: i64) {
        let key = keys::task_count_key(user_id, status);
        let ttl = self.ttls.counter();

        let result = if delta >= 0 {
            self.cache.increment(&key, delta, ttl).await
        } else {
            self.cache.decrement(&key, -delta, ttl).await
        };

        if let Err(e) = result {
            warn!(user_id, %status, delta, error = %e, "Failed to adjust task counter");
        }
    }

    async fn store_counter(&self, user_id: i64, status: TaskStatus, count: i64) {
        let key = keys::task_count_key(user_id, status);
        if let Err(e) = self
            .cache
            .set(&key, count.to_string(), self.ttls.counter())
            .await
        {
            warn!(user_id, %status, error = %e, "Failed to store task counter");
        }
    }
}

/// Maps a failed update/delete transaction; a vanished row stays `NotFound`
fn transaction_error(action: &str, task_id: i64, err: StoreError) -> ServiceError {
    match err {
        StoreError::RowNotFound => ServiceError::not_found("task", task_id),
        other => {
            error!(task_id, action, error = %other, "Task transaction failed");
            ServiceError::Internal(format!("failed to {action} task: {other}"))
        }
    }
}
