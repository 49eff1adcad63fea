//! # TaskDesk Shared Library
//!
//! Domain types, persistence, caching and business logic used by the TaskDesk
//! API server.
//!
//! ## Module Organization
//!
//! - `models`: row types, request payloads and their SQL
//! - `db`: connection pool and migrations
//! - `store`: data-access traits and the PostgreSQL implementation
//! - `cache`: cache trait, key layout and the Redis implementation
//! - `memory`: in-process store and cache backends
//! - `services`: task workflow, user and tag management
//! - `auth`: password hashing

pub mod auth;
pub mod cache;
pub mod db;
pub mod memory;
pub mod models;
pub mod services;
pub mod store;

/// Current version of the TaskDesk shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
