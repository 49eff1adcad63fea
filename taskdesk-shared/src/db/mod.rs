//! Database layer for TaskDesk
//!
//! - `pool`: PostgreSQL connection pool with health checks
//! - `migrations`: embedded sqlx migration runner
//!
//! Row types and their SQL live in [`crate::models`]; the transactional store
//! built on top of them is [`crate::store::postgres::PgStore`].
//!
//! # Example
//!
//! ```no_run
//! use taskdesk_shared::db::{migrations::run_migrations, pool::{create_pool, DatabaseConfig}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig {
//!         url: std::env::var("DATABASE_URL")?,
//!         ..Default::default()
//!     };
//!
//!     let pool = create_pool(&config).await?;
//!     run_migrations(&pool).await?;
//!     Ok(())
//! }
//! ```

pub mod migrations;
pub mod pool;
