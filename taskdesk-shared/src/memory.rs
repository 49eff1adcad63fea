//! In-process store and cache
//!
//! [`MemoryStore`] implements every store trait over a mutex-guarded snapshot
//! of the tables. A multi-row write clones the snapshot, mutates the clone and
//! swaps it in only when every step succeeded, which gives the same
//! all-or-nothing behavior as a database transaction.
//!
//! [`MemoryCache`] implements [`Cache`] with real TTL bookkeeping.
//!
//! Both carry failure switches so tests can exercise the rollback and
//! best-effort paths of the services.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use taskdesk_shared::cache::CacheTtls;
//! use taskdesk_shared::memory::{MemoryCache, MemoryStore};
//! use taskdesk_shared::services::TaskService;
//!
//! let store = Arc::new(MemoryStore::new());
//! let cache = Arc::new(MemoryCache::new());
//! let tasks = TaskService::new(store.clone(), store, cache, CacheTtls::default());
//! ```

use crate::cache::{Cache, CacheError, CacheResult};
use crate::models::{
    NewTag, NewTask, NewUser, PageRequest, Tag, Task, TaskChanges, TaskDetail, TaskFilter,
    TaskStatus, UpdateUserRequest, User, UserStatus,
};
use crate::store::{StoreError, StoreResult, TagStore, TaskStore, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct UserRow {
    user: User,
    password_hash: String,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct TagRow {
    tag: Tag,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct TaskRow {
    task: Task,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, UserRow>,
    tags: BTreeMap<i64, TagRow>,
    tasks: BTreeMap<i64, TaskRow>,

    /// (task_id, tag_id)
    task_tags: BTreeSet<(i64, i64)>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn live_user(&self, id: i64) -> Option<&UserRow> {
        self.users.get(&id).filter(|row| row.deleted_at.is_none())
    }

    fn live_task_mut(&mut self, id: i64) -> Option<&mut TaskRow> {
        self.tasks.get_mut(&id).filter(|row| row.deleted_at.is_none())
    }

    fn tag_ids_of(&self, task_id: i64) -> Vec<i64> {
        self.task_tags
            .range((task_id, i64::MIN)..=(task_id, i64::MAX))
            .map(|&(_, tag_id)| tag_id)
            .collect()
    }

    fn resolve_tags(&self, ids: &[i64]) -> Vec<i64> {
        let mut resolved: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| self.tags.get(id).is_some_and(|row| row.deleted_at.is_none()))
            .collect();
        resolved.sort_unstable();
        resolved.dedup();
        resolved
    }

    fn clear_tags(&mut self, task_id: i64) {
        self.task_tags.retain(|&(linked, _)| linked != task_id);
    }

    fn detail(&self, task: &Task) -> StoreResult<TaskDetail> {
        let user = self
            .users
            .get(&task.user_id)
            .map(|row| row.user.clone())
            .ok_or(StoreError::RowNotFound)?;

        let tags = self
            .tag_ids_of(task.id)
            .into_iter()
            .filter_map(|tag_id| self.tags.get(&tag_id))
            .filter(|row| row.deleted_at.is_none())
            .map(|row| row.tag.clone())
            .collect();

        Ok(TaskDetail {
            task: task.clone(),
            user,
            tags,
        })
    }

    fn unique_user(&self, username: &str, email: &str) -> StoreResult<()> {
        for row in self.users.values().filter(|row| row.deleted_at.is_none()) {
            if row.user.username == username {
                return Err(StoreError::UniqueViolation("users_username_live_key".to_string()));
            }
            if row.user.email == email {
                return Err(StoreError::UniqueViolation("users_email_live_key".to_string()));
            }
        }
        Ok(())
    }
}

/// In-memory implementation of every store trait
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
    fail_tag_resolution: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail with `StoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes tag resolution inside `create_task`/`update_task` fail
    pub fn fail_tag_resolution(&self, fail: bool) {
        self.fail_tag_resolution.store(fail, Ordering::SeqCst);
    }

    /// Number of task rows, including soft-deleted ones
    pub fn task_row_count(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Stored password hash of a user
    pub fn password_hash(&self, user_id: i64) -> Option<String> {
        self.lock()
            .users
            .get(&user_id)
            .map(|row| row.password_hash.clone())
    }

    /// Whether the task row exists and is soft-deleted
    pub fn is_soft_deleted(&self, task_id: i64) -> bool {
        self.lock()
            .tasks
            .get(&task_id)
            .is_some_and(|row| row.deleted_at.is_some())
    }

    /// Tag IDs linked to a task, including links of soft-deleted tasks
    pub fn linked_tag_ids(&self, task_id: i64) -> Vec<i64> {
        self.lock().tag_ids_of(task_id)
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_tag_resolution(&self) -> StoreResult<()> {
        if self.fail_tag_resolution.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("tag resolution failed".to_string()))
        } else {
            Ok(())
        }
    }

    /// Runs `f` against a copy of the tables and keeps the copy only on success
    fn transaction<T>(&self, f: impl FnOnce(&mut Tables) -> StoreResult<T>) -> StoreResult<T> {
        self.check_available()?;
        let mut tables = self.lock();
        let mut working = tables.clone();
        let value = f(&mut working)?;
        *tables = working;
        Ok(value)
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> StoreResult<T>) -> StoreResult<T> {
        self.check_available()?;
        f(&*self.lock())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        self.transaction(|tables| {
            tables.unique_user(&user.username, &user.email)?;

            let now = Utc::now();
            let id = tables.next_id();
            let row = User {
                id,
                username: user.username,
                email: user.email,
                nickname: user.nickname,
                avatar: String::new(),
                phone: user.phone,
                status: UserStatus::Enabled,
                last_login_at: None,
                created_at: now,
                updated_at: now,
            };
            tables.users.insert(
                id,
                UserRow {
                    user: row.clone(),
                    password_hash: user.password_hash,
                    deleted_at: None,
                },
            );
            Ok(row)
        })
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        self.read(|tables| Ok(tables.live_user(id).map(|row| row.user.clone())))
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.read(|tables| {
            Ok(tables
                .users
                .values()
                .find(|row| row.deleted_at.is_none() && row.user.username == username)
                .map(|row| row.user.clone()))
        })
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.read(|tables| {
            Ok(tables
                .users
                .values()
                .find(|row| row.deleted_at.is_none() && row.user.email == email)
                .map(|row| row.user.clone()))
        })
    }

    async fn update_user(&self, id: i64, changes: &UpdateUserRequest) -> StoreResult<()> {
        self.transaction(|tables| {
            let row = tables
                .users
                .get_mut(&id)
                .filter(|row| row.deleted_at.is_none())
                .ok_or(StoreError::RowNotFound)?;

            if let Some(nickname) = &changes.nickname {
                row.user.nickname = nickname.clone();
            }
            if let Some(avatar) = &changes.avatar {
                row.user.avatar = avatar.clone();
            }
            if let Some(phone) = &changes.phone {
                row.user.phone = phone.clone();
            }
            row.user.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn delete_user_cascade(&self, id: i64) -> StoreResult<Vec<i64>> {
        self.transaction(|tables| {
            let now = Utc::now();
            let mut task_ids = Vec::new();
            for row in tables.tasks.values_mut() {
                if row.task.user_id == id && row.deleted_at.is_none() {
                    row.deleted_at = Some(now);
                    task_ids.push(row.task.id);
                }
            }

            let row = tables
                .users
                .get_mut(&id)
                .filter(|row| row.deleted_at.is_none())
                .ok_or(StoreError::RowNotFound)?;
            row.deleted_at = Some(now);
            Ok(task_ids)
        })
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        self.transaction(|tables| {
            let row = tables
                .users
                .get_mut(&id)
                .filter(|row| row.deleted_at.is_none())
                .ok_or(StoreError::RowNotFound)?;
            row.user.last_login_at = Some(at);
            row.user.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn list_users(&self, page: &PageRequest) -> StoreResult<(Vec<User>, i64)> {
        self.read(|tables| {
            let mut users: Vec<User> = tables
                .users
                .values()
                .filter(|row| row.deleted_at.is_none())
                .map(|row| row.user.clone())
                .collect();
            users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

            let total = users.len() as i64;
            let list = paginate(users, page);
            Ok((list, total))
        })
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn insert_tag(&self, tag: NewTag) -> StoreResult<Tag> {
        self.transaction(|tables| {
            let taken = tables
                .tags
                .values()
                .any(|row| row.deleted_at.is_none() && row.tag.name == tag.name);
            if taken {
                return Err(StoreError::UniqueViolation("tags_name_live_key".to_string()));
            }

            let now = Utc::now();
            let id = tables.next_id();
            let row = Tag {
                id,
                name: tag.name,
                color: tag.color,
                created_at: now,
                updated_at: now,
            };
            tables.tags.insert(
                id,
                TagRow {
                    tag: row.clone(),
                    deleted_at: None,
                },
            );
            Ok(row)
        })
    }

    async fn find_tag(&self, id: i64) -> StoreResult<Option<Tag>> {
        self.read(|tables| {
            Ok(tables
                .tags
                .get(&id)
                .filter(|row| row.deleted_at.is_none())
                .map(|row| row.tag.clone()))
        })
    }

    async fn find_tag_by_name(&self, name: &str) -> StoreResult<Option<Tag>> {
        self.read(|tables| {
            Ok(tables
                .tags
                .values()
                .find(|row| row.deleted_at.is_none() && row.tag.name == name)
                .map(|row| row.tag.clone()))
        })
    }

    async fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        self.read(|tables| {
            let mut tags: Vec<Tag> = tables
                .tags
                .values()
                .filter(|row| row.deleted_at.is_none())
                .map(|row| row.tag.clone())
                .collect();
            tags.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            Ok(tags)
        })
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_task(&self, task: NewTask, tag_ids: &[i64]) -> StoreResult<i64> {
        self.transaction(|tables| {
            if tables.live_user(task.user_id).is_none() {
                return Err(StoreError::Database(sqlx::Error::Protocol(format!(
                    "foreign key violation: user {} does not exist",
                    task.user_id
                ))));
            }

            let now = Utc::now();
            let id = tables.next_id();
            tables.tasks.insert(
                id,
                TaskRow {
                    task: Task {
                        id,
                        title: task.title,
                        description: task.description,
                        status: TaskStatus::Pending,
                        priority: task.priority,
                        start_time: None,
                        end_time: None,
                        due_date: task.due_date,
                        user_id: task.user_id,
                        created_at: now,
                        updated_at: now,
                    },
                    deleted_at: None,
                },
            );

            if !tag_ids.is_empty() {
                self.check_tag_resolution()?;
                for tag_id in tables.resolve_tags(tag_ids) {
                    tables.task_tags.insert((id, tag_id));
                }
            }

            Ok(id)
        })
    }

    async fn find_task(&self, id: i64) -> StoreResult<Option<TaskDetail>> {
        self.read(|tables| match tables.tasks.get(&id) {
            Some(row) if row.deleted_at.is_none() => tables.detail(&row.task).map(Some),
            _ => Ok(None),
        })
    }

    async fn update_task(
        &self,
        id: i64,
        changes: &TaskChanges,
        tag_ids: Option<&[i64]>,
    ) -> StoreResult<()> {
        self.transaction(|tables| {
            let row = tables.live_task_mut(id).ok_or(StoreError::RowNotFound)?;
            changes.apply_to(&mut row.task, Utc::now());

            if let Some(tag_ids) = tag_ids {
                tables.clear_tags(id);
                if !tag_ids.is_empty() {
                    self.check_tag_resolution()?;
                    for tag_id in tables.resolve_tags(tag_ids) {
                        tables.task_tags.insert((id, tag_id));
                    }
                }
            }
            Ok(())
        })
    }

    async fn delete_task(&self, id: i64) -> StoreResult<()> {
        self.transaction(|tables| {
            tables.clear_tags(id);
            let row = tables.live_task_mut(id).ok_or(StoreError::RowNotFound)?;
            row.deleted_at = Some(Utc::now());
            Ok(())
        })
    }

    async fn query_tasks(
        &self,
        filter: &TaskFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<TaskDetail>, i64)> {
        self.read(|tables| {
            let mut matching: Vec<&Task> = tables
                .tasks
                .values()
                .filter(|row| row.deleted_at.is_none())
                .map(|row| &row.task)
                .filter(|task| filter.matches(task, &tables.tag_ids_of(task.id)))
                .collect();
            matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

            let total = matching.len() as i64;
            let details = paginate(matching, page)
                .into_iter()
                .map(|task| tables.detail(task))
                .collect::<StoreResult<Vec<_>>>()?;
            Ok((details, total))
        })
    }

    async fn count_by_status(&self, user_id: i64) -> StoreResult<Vec<(TaskStatus, i64)>> {
        self.read(|tables| {
            let mut counts: HashMap<TaskStatus, i64> = HashMap::new();
            for row in tables.tasks.values() {
                if row.deleted_at.is_none() && row.task.user_id == user_id {
                    *counts.entry(row.task.status).or_default() += 1;
                }
            }
            Ok(counts.into_iter().collect())
        })
    }

    async fn count_overdue(&self, user_id: i64, now: DateTime<Utc>) -> StoreResult<i64> {
        self.read(|tables| {
            Ok(tables
                .tasks
                .values()
                .filter(|row| row.deleted_at.is_none() && row.task.user_id == user_id)
                .filter(|row| row.task.status != TaskStatus::Completed)
                .filter(|row| row.task.due_date.is_some_and(|due| due < now))
                .count() as i64)
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }
}

fn paginate<T>(items: Vec<T>, page: &PageRequest) -> Vec<T> {
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit()).unwrap_or(0);
    items.into_iter().skip(offset).take(limit).collect()
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory implementation of [`Cache`]
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    failing: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail with `CacheError::Connection`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Whether a live entry exists, ignoring the failure switch
    pub fn contains(&self, key: &str) -> bool {
        self.live(key).is_some()
    }

    /// Remaining lifetime of a live entry, ignoring the failure switch
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.live(key)
            .map(|entry| entry.expires_at.saturating_duration_since(Instant::now()))
    }

    /// Raw value of a live entry, ignoring the failure switch
    pub fn peek(&self, key: &str) -> Option<String> {
        self.live(key).map(|entry| entry.value)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(&self, key: &str) -> Option<Entry> {
        self.lock()
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .cloned()
    }

    fn check(&self) -> CacheResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Connection("memory cache switched off".to_string()))
        } else {
            Ok(())
        }
    }

    fn counter(entries: &HashMap<String, Entry>, key: &str) -> CacheResult<Option<i64>> {
        match entries.get(key).filter(|entry| entry.expires_at > Instant::now()) {
            Some(entry) => entry
                .value
                .parse()
                .map(Some)
                .map_err(|_| CacheError::Command(format!("value at {key} is not an integer"))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.check()?;
        Ok(self.live(key).map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        self.check()?;
        self.lock().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.check()?;
        self.lock().remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str, delta: i64, ttl: Duration) -> CacheResult<i64> {
        self.check()?;
        let mut entries = self.lock();
        let value = Self::counter(&entries, key)?.unwrap_or(0) + delta;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(value)
    }

    async fn decrement(&self, key: &str, delta: i64, ttl: Duration) -> CacheResult<i64> {
        self.check()?;
        let mut entries = self.lock();
        let Some(current) = Self::counter(&entries, key)? else {
            entries.remove(key);
            return Ok(0);
        };

        let value = (current - delta).max(0);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(value)
    }

    async fn ping(&self) -> CacheResult<()> {
        self.check()
    }
}
