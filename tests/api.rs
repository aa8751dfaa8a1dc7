#![cfg(feature = "server")]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use expense_tracker::api::{router, AppState};
use expense_tracker::setup_database;
use rusqlite::Connection;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    // Keeps the static directory alive for the test's duration
    _static_dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("login.html"), "<h1>login</h1>").unwrap();

        let state = AppState::new(conn, chrono::Duration::hours(1));
        TestApp {
            app: router(state, static_dir.path()),
            _static_dir: static_dir,
        }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        self.send_raw(method, uri, token, body.map(|body| body.to_string().into_bytes()))
            .await
    }

    /// Like `send`, but the JSON body is passed through as raw bytes
    async fn send_raw(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Vec<u8>>) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn json(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = self.send(method, uri, token, body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Register + login, returning the bearer token
    async fn sign_up(&self, username: &str) -> String {
        let (status, _) = self
            .json(
                Method::POST,
                "/api/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "correct-horse",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .json(
                Method::POST,
                "/api/login",
                None,
                Some(json!({ "username": username, "password": "correct-horse" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "bearer");
        body["access_token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_and_categories() {
    let app = TestApp::new();

    let (status, body) = app.json(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));

    let (status, body) = app.json(Method::GET, "/api/categories", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0], "Food & Drink");
    assert_eq!(body[9], "Other");
}

#[tokio::test]
async fn test_login_rejects_bad_password() {
    let app = TestApp::new();
    app.sign_up("alice").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong-horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = TestApp::new();
    app.sign_up("alice").await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/register",
            None,
            Some(json!({ "username": "alice", "email": "again@example.com", "password": "correct-horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_category_endpoint_requires_auth() {
    let app = TestApp::new();
    let (status, _) = app
        .json(Method::POST, "/api/ai/category", None, Some(json!({ "title": "coffee" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_category_endpoint_classifies() {
    let app = TestApp::new();
    let token = app.sign_up("alice").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/ai/category",
            Some(&token),
            Some(json!({ "title": "coffee shop", "description": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "category": "Food & Drink", "source": "rule-based" }));

    let (_, body) = app
        .json(
            Method::POST,
            "/api/ai/category",
            Some(&token),
            Some(json!({ "title": "", "description": "gymnastics" })),
        )
        .await;
    assert_eq!(body["category"], "Health");
}

#[tokio::test]
async fn test_category_endpoint_never_fails_on_malformed_input() {
    let app = TestApp::new();
    let token = app.sign_up("alice").await;

    for body in [json!({ "title": 17 }), json!([1, 2, 3]), json!({})] {
        let (status, value) = app
            .json(Method::POST, "/api/ai/category", Some(&token), Some(body))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value, json!({ "category": "Other", "source": "rule-based" }));
    }

    let (status, bytes) = app.send(Method::POST, "/api/ai/category", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["category"], "Other");

    let (status, bytes) = app
        .send_raw(Method::POST, "/api/ai/category", Some(&token), Some(b"{not json".to_vec()))
        .await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["category"], "Other");
}

#[tokio::test]
async fn test_category_endpoint_reads_fields_independently() {
    let app = TestApp::new();
    let token = app.sign_up("alice").await;

    let (status, value) = app
        .json(
            Method::POST,
            "/api/ai/category",
            Some(&token),
            Some(json!({ "title": "coffee", "description": 42 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!({ "category": "Food & Drink", "source": "rule-based" }));

    let (_, value) = app
        .json(
            Method::POST,
            "/api/ai/category",
            Some(&token),
            Some(json!({ "title": ["x"], "description": "taxi home" })),
        )
        .await;
    assert_eq!(value["category"], "Transport");
}

#[tokio::test]
async fn test_category_endpoint_accepts_large_bodies() {
    let app = TestApp::new();
    let token = app.sign_up("alice").await;

    // Well past the default 2 MB request body limit
    let title = "coffee ".repeat(450_000);
    let (status, value) = app
        .json(Method::POST, "/api/ai/category", Some(&token), Some(json!({ "title": title })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["category"], "Food & Drink");
}

#[tokio::test]
async fn test_bad_json_bodies_get_detail() {
    let app = TestApp::new();
    let token = app.sign_up("alice").await;

    // Missing amount
    let (status, body) = app
        .json(Method::POST, "/api/expenses", Some(&token), Some(json!({ "title": "Coffee" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().starts_with("Validation error:"));

    let (status, bytes) = app
        .send_raw(Method::POST, "/api/login", None, Some(b"{\"username\":".to_vec()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["detail"].is_string());

    let (status, body) = app
        .json(Method::PUT, "/api/expenses/1", Some(&token), Some(json!({ "amount": "ten" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_expense_crud_roundtrip() {
    let app = TestApp::new();
    let token = app.sign_up("alice").await;

    // Blank category -> classifier picks one
    let (status, created) = app
        .json(
            Method::POST,
            "/api/expenses",
            Some(&token),
            Some(json!({ "title": "Netflix", "amount": 9.99, "description": "monthly subscription", "category": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["category"], "Bills");
    let id = created["id"].as_i64().unwrap();

    let (status, listed) = app.json(Method::GET, "/api/expenses", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, updated) = app
        .json(
            Method::PUT,
            &format!("/api/expenses/{}", id),
            Some(&token),
            Some(json!({ "title": "Cinema night", "amount": 15.0, "category": "Fun" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["category"], "Fun");
    assert_eq!(updated["description"], "");

    let (status, fetched) = app
        .json(Method::GET, &format!("/api/expenses/{}", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], "Cinema night");

    let (status, body) = app
        .json(Method::DELETE, &format!("/api/expenses/{}", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "msg": "deleted" }));

    let (status, _) = app
        .json(Method::GET, &format!("/api/expenses/{}", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expense_validation() {
    let app = TestApp::new();
    let token = app.sign_up("alice").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/expenses",
            Some(&token),
            Some(json!({ "title": "   ", "amount": 5.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Validation error: Title is required.");

    let (status, _) = app
        .json(Method::GET, "/api/expenses?month=May", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_users_cannot_see_each_other() {
    let app = TestApp::new();
    let alice = app.sign_up("alice").await;
    let bob = app.sign_up("bob").await;

    let (_, created) = app
        .json(
            Method::POST,
            "/api/expenses",
            Some(&alice),
            Some(json!({ "title": "Groceries", "amount": 40.0 })),
        )
        .await;
    let id = created["id"].as_i64().unwrap();

    let (status, _) = app
        .json(Method::GET, &format!("/api/expenses/{}", id), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(Method::DELETE, &format!("/api/expenses/{}", id), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = app.json(Method::GET, "/api/expenses", Some(&bob), None).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_summary_and_export() {
    let app = TestApp::new();
    let token = app.sign_up("alice").await;

    for (title, amount) in [("Coffee", 3.5), ("Taxi to office", 12.0)] {
        app.json(
            Method::POST,
            "/api/expenses",
            Some(&token),
            Some(json!({ "title": title, "amount": amount })),
        )
        .await;
    }

    use chrono::Datelike;
    let today = chrono::Utc::now().weekday().num_days_from_sunday();
    let (status, listed) = app
        .json(Method::GET, &format!("/api/expenses?weekday={}", today), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 2);
    let (_, listed) = app
        .json(Method::GET, &format!("/api/expenses?weekday={}", (today + 1) % 7), Some(&token), None)
        .await;
    assert!(listed.as_array().unwrap().is_empty());

    let (status, summary) = app
        .json(Method::GET, "/api/expenses/summary", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["count"], 2);
    assert_eq!(summary["by_category"][0]["category"], "Food & Drink");
    assert_eq!(summary["by_category"][1]["category"], "Transport");

    let (status, bytes) = app
        .send(Method::GET, "/api/expenses/export.csv?sort=amount_asc", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let csv = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Title,Category,Amount,Description,Created");
    assert!(lines[1].starts_with("Coffee,Food & Drink,3.50,"));
    assert!(lines[2].starts_with("Taxi to office,Transport,12.00,"));
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = TestApp::new();
    let token = app.sign_up("alice").await;

    let (status, me) = app.json(Method::GET, "/api/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");

    let (status, _) = app.json(Method::POST, "/api/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.json(Method::GET, "/api/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_page_is_served() {
    let app = TestApp::new();
    let (status, bytes) = app.send(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"<h1>login</h1>");
}
