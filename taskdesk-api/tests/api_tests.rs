/// HTTP tests for the TaskDesk API
///
/// Run with: cargo test -p taskdesk-api --test api_tests

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestContext;
use serde_json::json;
use taskdesk_shared::cache::keys;
use taskdesk_shared::models::TaskStatus;

#[tokio::test]
async fn test_health_reports_backends() {
    let ctx = TestContext::new();

    let response = ctx.send("GET", "/health", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
    assert_eq!(response.body["database"], "connected");
    assert_eq!(response.body["cache"], "connected");

    ctx.cache.set_failing(true);
    let response = ctx.send("GET", "/health", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "degraded");
    assert_eq!(response.body["cache"], "disconnected");

    ctx.store.set_unavailable(true);
    let response = ctx.send("GET", "/health", None, None).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["status"], "unhealthy");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let ctx = TestContext::new();

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-me")
        .body(Body::empty())
        .unwrap();
    let response = ctx.send_request(request).await;
    assert_eq!(response.headers["x-request-id"], "trace-me");

    let response = ctx.send("GET", "/health", None, None).await;
    assert!(response.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_register_and_fetch_user() {
    let ctx = TestContext::new();
    let user_id = ctx.create_user("alice").await;

    let response = ctx
        .send("GET", &format!("/api/v1/users/{user_id}"), None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["username"], "alice");
    assert_eq!(response.body["status"], "enabled");
    assert!(response.body.get("password").is_none());
    assert!(response.body.get("password_hash").is_none());

    let response = ctx
        .send("GET", "/api/v1/users/username/alice", None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], user_id);

    let response = ctx.send("GET", "/api/v1/users?page_size=5", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["page_info"]["total"], 1);
    assert_eq!(response.body["page_info"]["page_size"], 5);
}

#[tokio::test]
async fn test_register_conflict_and_validation() {
    let ctx = TestContext::new();
    ctx.create_user("alice").await;

    let response = ctx
        .send(
            "POST",
            "/api/v1/users",
            None,
            Some(json!({
                "username": "alice",
                "email": "second@example.com",
                "password": "secret1"
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["error"], "conflict");
    assert_eq!(response.body["message"], "Username already exists");

    let response = ctx
        .send(
            "POST",
            "/api/v1/users",
            None,
            Some(json!({
                "username": "al",
                "email": "not-an-email",
                "password": "123"
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "invalid_argument");
    let fields: Vec<&str> = response.body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|detail| detail["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["email", "password", "username"]);
}

#[tokio::test]
async fn test_user_profile_login_and_delete() {
    let ctx = TestContext::new();
    let user_id = ctx.create_user("alice").await;
    let task_id = ctx.create_task(user_id, json!({ "title": "Mine" })).await;

    let response = ctx
        .send(
            "PUT",
            &format!("/api/v1/users/{user_id}"),
            None,
            Some(json!({ "nickname": "Al", "phone": "555-0100" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["nickname"], "Al");
    assert_eq!(response.body["phone"], "555-0100");

    let response = ctx
        .send("POST", &format!("/api/v1/users/{user_id}/login"), None, None)
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    let response = ctx
        .send("GET", &format!("/api/v1/users/{user_id}"), None, None)
        .await;
    assert!(response.body["last_login_at"].is_string());

    let response = ctx
        .send("DELETE", &format!("/api/v1/users/{user_id}"), None, None)
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = ctx
        .send("GET", &format!("/api/v1/users/{user_id}"), None, None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let response = ctx
        .send("GET", &format!("/api/v1/tasks/{task_id}"), None, None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_task_writes_require_acting_user() {
    let ctx = TestContext::new();
    let user_id = ctx.create_user("alice").await;

    let response = ctx
        .send("POST", "/api/v1/tasks", None, Some(json!({ "title": "Anonymous" })))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "unauthorized");

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/tasks")
        .header("x-user-id", "alice")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "title": "Named" }).to_string()))
        .unwrap();
    let response = ctx.send_request(request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = ctx
        .send("POST", "/api/v1/tasks", Some(user_id + 100), Some(json!({ "title": "Ghost" })))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(ctx.store.task_row_count(), 0);
}

#[tokio::test]
async fn test_create_task_returns_pending_detail() {
    let ctx = TestContext::new();
    let user_id = ctx.create_user("alice").await;
    let tag_id = ctx.create_tag("work").await;

    let response = ctx
        .send(
            "POST",
            "/api/v1/tasks",
            Some(user_id),
            Some(json!({
                "title": "write spec",
                "priority": "high",
                "status": "completed",
                "tag_ids": [tag_id, 9999]
            })),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["status"], "pending");
    assert_eq!(response.body["priority"], "high");
    assert_eq!(response.body["user"]["id"], user_id);
    assert_eq!(response.body["tags"].as_array().unwrap().len(), 1);
    assert_eq!(response.body["tags"][0]["name"], "work");
    assert_eq!(
        ctx.cache
            .peek(&keys::task_count_key(user_id, TaskStatus::Pending))
            .as_deref(),
        Some("1")
    );
}

#[tokio::test]
async fn test_bad_payloads_are_rejected() {
    let ctx = TestContext::new();
    let user_id = ctx.create_user("alice").await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/tasks")
        .header("x-user-id", user_id.to_string())
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = ctx.send_request(request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "bad_request");

    let response = ctx
        .send("POST", "/api/v1/tasks", Some(user_id), Some(json!({ "title": "" })))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["details"][0]["field"], "title");

    let response = ctx
        .send("POST", "/api/v1/tasks", Some(9999), Some(json!({ "title": "" })))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = ctx
        .send("POST", "/api/v1/tasks", Some(user_id), Some(json!({ "title": "x", "priority": "someday" })))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = ctx.send("GET", "/api/v1/tasks/abc", None, None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = ctx.send("GET", "/api/v1/tasks?status=sleeping", None, None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_and_complete_flow() {
    let ctx = TestContext::new();
    let owner = ctx.create_user("owner").await;
    let other = ctx.create_user("other").await;
    let task_id = ctx.create_task(owner, json!({ "title": "Ship it" })).await;
    let uri = format!("/api/v1/tasks/{task_id}");

    let response = ctx
        .send("PUT", &uri, Some(other), Some(json!({ "title": "Mine now" })))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "forbidden");

    let response = ctx
        .send("PUT", &uri, Some(owner), Some(json!({ "status": "in_progress" })))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "in_progress");
    assert!(response.body["start_time"].is_string());
    assert_eq!(response.body["title"], "Ship it");

    let response = ctx
        .send("POST", &format!("{uri}/complete"), Some(owner), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "completed");
    assert!(response.body["end_time"].is_string());

    let response = ctx.send("GET", &uri, None, None).await;
    assert_eq!(response.body["status"], "completed");

    let response = ctx
        .send("GET", &format!("/api/v1/users/{owner}/tasks/stats"), None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["completed"], 1);
    assert_eq!(response.body["in_progress"], 0);
    assert_eq!(response.body["total"], 1);
}

#[tokio::test]
async fn test_delete_task() {
    let ctx = TestContext::new();
    let owner = ctx.create_user("owner").await;
    let other = ctx.create_user("other").await;
    let task_id = ctx.create_task(owner, json!({ "title": "Temporary" })).await;
    let uri = format!("/api/v1/tasks/{task_id}");

    let response = ctx.send("DELETE", &uri, Some(other), None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(ctx.send("GET", &uri, None, None).await.status, StatusCode::OK);

    let response = ctx.send("DELETE", &uri, Some(owner), None).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(response.body, serde_json::Value::Null);

    let response = ctx.send("GET", &uri, None, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "not_found");

    let response = ctx.send("DELETE", &uri, Some(owner), None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_task_listings() {
    let ctx = TestContext::new();
    let alice = ctx.create_user("alice").await;
    let bob = ctx.create_user("bob").await;
    let tag_id = ctx.create_tag("urgent").await;

    for n in 0..3 {
        ctx.create_task(alice, json!({ "title": format!("Alice {n}") })).await;
    }
    let tagged = ctx
        .create_task(bob, json!({ "title": "Bob urgent", "priority": "urgent", "tag_ids": [tag_id] }))
        .await;

    let response = ctx
        .send("GET", "/api/v1/tasks?page=1&page_size=2", None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["page_info"]["total"], 4);
    assert_eq!(response.body["list"].as_array().unwrap().len(), 2);
    assert_eq!(response.body["list"][0]["id"], tagged);

    let response = ctx
        .send("GET", &format!("/api/v1/users/{alice}/tasks"), None, None)
        .await;
    assert_eq!(response.body["page_info"]["total"], 3);

    let response = ctx
        .send("GET", &format!("/api/v1/tags/{tag_id}/tasks"), None, None)
        .await;
    assert_eq!(response.body["page_info"]["total"], 1);
    assert_eq!(response.body["list"][0]["user"]["username"], "bob");

    let response = ctx
        .send("GET", "/api/v1/tasks?priority=urgent&keyword=bob", None, None)
        .await;
    assert_eq!(response.body["page_info"]["total"], 1);

    let response = ctx.send("GET", "/api/v1/tags/999/tasks", None, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let response = ctx.send("GET", "/api/v1/users/999/tasks", None, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tags() {
    let ctx = TestContext::new();
    let work = ctx.create_tag("work").await;
    ctx.create_tag("home").await;

    let response = ctx.send("GET", "/api/v1/tags", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body[0]["name"], "home");
    assert_eq!(response.body[1]["name"], "work");

    let response = ctx
        .send("GET", &format!("/api/v1/tags/{work}"), None, None)
        .await;
    assert_eq!(response.body["color"], "#00ff00");

    let response = ctx
        .send("POST", "/api/v1/tags", None, Some(json!({ "name": "work" })))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["message"], "Tag name already exists");

    let response = ctx
        .send("POST", "/api/v1/tags", None, Some(json!({ "name": "odd", "color": "green" })))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["details"][0]["field"], "color");
}

#[tokio::test]
async fn test_cache_outage_is_invisible_to_clients() {
    let ctx = TestContext::new();
    let user_id = ctx.create_user("alice").await;
    ctx.cache.set_failing(true);

    let task_id = ctx.create_task(user_id, json!({ "title": "No cache" })).await;
    let response = ctx
        .send("GET", &format!("/api/v1/tasks/{task_id}"), None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["title"], "No cache");
}

#[tokio::test]
async fn test_store_outage_is_internal_error() {
    let ctx = TestContext::new();
    ctx.store.set_unavailable(true);

    let response = ctx.send("GET", "/api/v1/tags", None, None).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["message"], "An internal error occurred");
}
