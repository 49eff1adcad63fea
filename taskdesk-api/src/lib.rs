//! # TaskDesk API Server Library
//!
//! HTTP surface over the TaskDesk services.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Layered configuration
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: The `X-User-ID` acting-user extractor
//! - `middleware`: Request id tagging
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
