/// User management
///
/// Users are cached under `user:<id>` for reads; every write invalidates that
/// entry rather than rewriting it.

use super::{invalidate, ServiceError, ServiceResult};
use crate::auth::password::hash_password_async;
use crate::cache::{self, keys, Cache, CacheTtls};
use crate::models::{
    NewUser, Page, PageRequest, RegisterUserRequest, TaskStatus, UpdateUserRequest, User,
};
use crate::store::UserStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

/// User operations; cheap to clone
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    cache: Arc<dyn Cache>,
    ttls: CacheTtls,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, cache: Arc<dyn Cache>, ttls: CacheTtls) -> Self {
        Self { users, cache, ttls }
    }

    /// Registers a new enabled user
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the payload is invalid
    /// - `Conflict` if the username or email is taken by a live user
    pub async fn register(&self, req: RegisterUserRequest) -> ServiceResult<User> {
        req.validate()?;

        if self.users.find_user_by_username(&req.username).await?.is_some() {
            return Err(ServiceError::Conflict("Username already exists".to_string()));
        }
        if self.users.find_user_by_email(&req.email).await?.is_some() {
            return Err(ServiceError::Conflict("Email already exists".to_string()));
        }

        let password_hash = hash_password_async(req.password).await?;

        // The unique indexes still catch a concurrent registration that slips
        // past the checks above; it surfaces as Conflict.
        let user = self
            .users
            .insert_user(NewUser {
                username: req.username,
                email: req.email,
                password_hash,
                nickname: req.nickname,
                phone: req.phone,
            })
            .await?;

        self.cache_user(&user).await;

        info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Fetches a user, serving from the cache when possible
    pub async fn get_user(&self, user_id: i64) -> ServiceResult<User> {
        let key = keys::user_key(user_id);

        match cache::get_json::<User>(&*self.cache, &key).await {
            Ok(Some(user)) => return Ok(user),
            Ok(None) => debug!(user_id, "User cache miss"),
            Err(e) => warn!(user_id, error = %e, "User cache read failed, falling back to store"),
        }

        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", user_id))?;

        self.cache_user(&user).await;
        Ok(user)
    }

    pub async fn get_user_by_username(&self, username: &str) -> ServiceResult<User> {
        self.users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {username} not found")))
    }

    /// Updates the present profile fields and returns the fresh user
    pub async fn update_user(&self, user_id: i64, req: UpdateUserRequest) -> ServiceResult<User> {
        req.validate()?;

        self.users.update_user(user_id, &req).await.map_err(|e| match ServiceError::from(e) {
            ServiceError::NotFound(_) => ServiceError::not_found("user", user_id),
            other => other,
        })?;
        invalidate(&*self.cache, &keys::user_key(user_id)).await;

        self.users
            .find_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", user_id))
    }

    /// Soft-deletes a user together with all of their tasks
    ///
    /// Afterwards the user, their tasks, their task list marker and their
    /// counters are evicted from the cache.
    pub async fn delete_user(&self, user_id: i64) -> ServiceResult<()> {
        let task_ids = self
            .users
            .delete_user_cascade(user_id)
            .await
            .map_err(|e| match ServiceError::from(e) {
                ServiceError::NotFound(_) => ServiceError::not_found("user", user_id),
                other => other,
            })?;

        let cache = &*self.cache;
        invalidate(cache, &keys::user_key(user_id)).await;
        invalidate(cache, &keys::user_tasks_key(user_id)).await;
        for status in TaskStatus::ALL {
            invalidate(cache, &keys::task_count_key(user_id, status)).await;
        }
        for task_id in &task_ids {
            invalidate(cache, &keys::task_key(*task_id)).await;
        }

        info!(user_id, tasks_deleted = task_ids.len(), "User deleted");
        Ok(())
    }

    /// Lists live users, newest first
    pub async fn list_users(&self, page: &PageRequest) -> ServiceResult<Page<User>> {
        let (list, total) = self.users.list_users(page).await?;
        Ok(Page::new(list, page, total))
    }

    /// Stamps the user's last login time
    pub async fn record_login(&self, user_id: i64) -> ServiceResult<()> {
        self.users
            .record_login(user_id, Utc::now())
            .await
            .map_err(|e| match ServiceError::from(e) {
                ServiceError::NotFound(_) => ServiceError::not_found("user", user_id),
                other => other,
            })?;

        invalidate(&*self.cache, &keys::user_key(user_id)).await;
        debug!(user_id, "Login recorded");
        Ok(())
    }

    async fn cache_user(&self, user: &User) {
        let key = keys::user_key(user.id);
        if let Err(e) = cache::set_json(&*self.cache, &key, user, self.ttls.user()).await {
            warn!(user_id = user.id, error = %e, "Failed to cache user");
        }
    }
}
