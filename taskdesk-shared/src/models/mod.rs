//! Database models for TaskDesk
//!
//! Each model carries its row struct, the request payloads that produce it and
//! the SQL that reads and writes it. Transactions are composed one level up, in
//! [`crate::store::postgres`].
//!
//! # Models
//!
//! - `user`: accounts, profile fields and login stamping
//! - `task`: tasks, their status/priority enums, change sets and query filters
//! - `tag`: tags and the `task_tags` association
//! - `page`: pagination input and paged results
//!
//! # Example
//!
//! ```no_run
//! use taskdesk_shared::models::user::{NewUser, User};
//! use taskdesk_shared::db::pool::{create_pool, DatabaseConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//!
//! let user = User::create(&pool, NewUser {
//!     username: "alice".to_string(),
//!     email: "alice@example.com".to_string(),
//!     password_hash: "$argon2id$...".to_string(),
//!     nickname: String::new(),
//!     phone: String::new(),
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod page;
pub mod tag;
pub mod task;
pub mod user;

pub use page::{Page, PageInfo, PageRequest};
pub use tag::{CreateTagRequest, NewTag, Tag};
pub use task::{
    CreateTaskRequest, NewTask, Task, TaskChanges, TaskDetail, TaskFilter, TaskPriority,
    TaskStats, TaskStatus, UpdateTaskRequest,
};
pub use user::{NewUser, RegisterUserRequest, UpdateUserRequest, User, UserStatus};
