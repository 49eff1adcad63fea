/// Business logic over the store and cache
///
/// - `task_service`: the task mutation workflow, cache-aside reads, queries and counters
/// - `user_service`: registration, profile updates, deletion and login stamping
/// - `tag_service`: tag creation and lookup
///
/// Services hold `Arc<dyn ...>` handles and are cheap to clone. Every store
/// transaction commits before any cache call is made, and cache side effects
/// are best-effort: their failures are logged and never returned.

pub mod error;
pub mod tag_service;
pub mod task_service;
pub mod user_service;

pub use error::{ServiceError, ServiceResult};
pub use tag_service::TagService;
pub use task_service::TaskService;
pub use user_service::UserService;

use crate::cache::Cache;
use tracing::warn;

/// Deletes a cache entry, logging instead of failing
pub(crate) async fn invalidate(cache: &dyn Cache, key: &str) {
    if let Err(e) = cache.delete(key).await {
        warn!(key, error = %e, "Failed to invalidate cache entry");
    }
}
