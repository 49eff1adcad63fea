//! Application state and router builder
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskdesk_api::{app::{build_router, AppState}, config::Config};
//! use taskdesk_shared::cache::redis::RedisCache;
//! use taskdesk_shared::db::pool::create_pool;
//! use taskdesk_shared::store::PgStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let pool = create_pool(&config.database).await?;
//! let cache = RedisCache::connect(config.redis.clone()).await?;
//! let state = AppState::new(Arc::new(PgStore::new(pool)), Arc::new(cache), config);
//! let app = build_router(state);
//! # Ok(())
//! # }
//! ```

use crate::{
    config::Config,
    extract::USER_ID_HEADER,
    middleware::request_id::{RequestIdLayer, REQUEST_ID_HEADER},
};
use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method, Request},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use taskdesk_shared::cache::Cache;
use taskdesk_shared::services::{TagService, TaskService, UserService};
use taskdesk_shared::store::{Store, TaskStore};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; every field
/// is an `Arc` or wraps one.
#[derive(Clone)]
pub struct AppState {
    pub tasks: TaskService,
    pub users: UserService,
    pub tags: TagService,

    /// Store handle used for health checks
    pub store: Arc<dyn TaskStore>,

    /// Cache handle used for health checks
    pub cache: Arc<dyn Cache>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the services over one store and one cache
    pub fn new<S>(store: Arc<S>, cache: Arc<dyn Cache>, config: Config) -> Self
    where
        S: Store + 'static,
    {
        let ttls = config.cache;

        Self {
            tasks: TaskService::new(store.clone(), store.clone(), cache.clone(), ttls),
            users: UserService::new(store.clone(), cache.clone(), ttls),
            tags: TagService::new(store.clone()),
            store,
            cache,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # Store + cache health (public)
/// └── /api/v1/
///     ├── /users/
///     │   ├── POST   /                 # Register
///     │   ├── GET    /                 # List (page, page_size)
///     │   ├── GET    /username/:name   # Look up by username
///     │   ├── GET    /:id              # Get
///     │   ├── PUT    /:id              # Update profile
///     │   ├── DELETE /:id              # Delete with tasks
///     │   ├── POST   /:id/login        # Stamp last login
///     │   ├── GET    /:id/tasks        # User's tasks
///     │   └── GET    /:id/tasks/stats  # Per-status counts
///     ├── /tasks/                      # X-User-ID required on writes
///     │   ├── POST   /                 # Create
///     │   ├── GET    /                 # Query
///     │   ├── GET    /:id              # Get (cache-aside)
///     │   ├── PUT    /:id              # Update
///     │   ├── DELETE /:id              # Delete
///     │   └── POST   /:id/complete     # Mark completed
///     └── /tags/
///         ├── POST   /                 # Create
///         ├── GET    /                 # List
///         ├── GET    /:id              # Get
///         └── GET    /:id/tasks        # Tasks carrying the tag
/// ```
///
/// # Middleware Stack
///
/// Outermost first: request id, CORS, tracing. The request id is assigned
/// before the trace span opens so every log line of a request carries it.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let user_routes = Router::new()
        .route("/", post(routes::users::register).get(routes::users::list_users))
        .route("/username/:username", get(routes::users::get_user_by_username))
        .route(
            "/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route("/:id/login", post(routes::users::record_login))
        .route("/:id/tasks", get(routes::users::list_user_tasks))
        .route("/:id/tasks/stats", get(routes::users::user_task_stats));

    let task_routes = Router::new()
        .route("/", post(routes::tasks::create_task).get(routes::tasks::query_tasks))
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/:id/complete", post(routes::tasks::complete_task));

    let tag_routes = Router::new()
        .route("/", post(routes::tags::create_tag).get(routes::tags::list_tags))
        .route("/:id", get(routes::tags::get_tag))
        .route("/:id/tasks", get(routes::tags::list_tag_tasks));

    let v1_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/tasks", task_routes)
        .nest("/tags", tag_routes);

    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(&REQUEST_ID_HEADER)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or_default();
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(RequestIdLayer)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(USER_ID_HEADER),
            REQUEST_ID_HEADER,
        ])
        .expose_headers([REQUEST_ID_HEADER])
        .max_age(std::time::Duration::from_secs(3600))
}
