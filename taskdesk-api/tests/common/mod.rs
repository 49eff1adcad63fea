/// Common test utilities for API tests
///
/// Builds the full router over the in-memory store and cache so requests run
/// through routing, extraction, services and error mapping without external
/// services.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use taskdesk_api::app::{build_router, AppState};
use taskdesk_api::config::Config;
use taskdesk_shared::memory::{MemoryCache, MemoryStore};
use tower::ServiceExt;

/// Test context with the router and handles on its backends
pub struct TestContext {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
}

/// Decoded response
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let state = AppState::new(store.clone(), cache.clone(), Config::default());

        Self {
            app: build_router(state),
            store,
            cache,
        }
    }

    /// Sends a request; `user` becomes the `X-User-ID` header
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        user: Option<i64>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user {
            builder = builder.header("x-user-id", user_id.to_string());
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send_request(request).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Registers a user and returns their id
    pub async fn create_user(&self, username: &str) -> i64 {
        let response = self
            .send(
                "POST",
                "/api/v1/users",
                None,
                Some(serde_json::json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "secret1",
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_i64().unwrap()
    }

    /// Creates a task for `user_id` and returns its id
    pub async fn create_task(&self, user_id: i64, body: Value) -> i64 {
        let response = self
            .send("POST", "/api/v1/tasks", Some(user_id), Some(body))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_i64().unwrap()
    }

    /// Creates a tag and returns its id
    pub async fn create_tag(&self, name: &str) -> i64 {
        let response = self
            .send(
                "POST",
                "/api/v1/tags",
                None,
                Some(serde_json::json!({ "name": name, "color": "#00ff00" })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_i64().unwrap()
    }
}
