// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use stride_tracker::config::Config;
use stride_tracker::db::Db;
use stride_tracker::routes::create_router;
use stride_tracker::services::{FollowerHub, TrackingEngine};
use stride_tracker::AppState;
use tower::ServiceExt;

/// Create a test app backed by the in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_db(Db::new())
}

/// Create a test app whose store fails every call, for exercising
/// materialization-failure reporting.
#[allow(dead_code)]
pub fn create_test_app_offline() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_db(Db::new_offline())
}

fn create_test_app_with_db(db: Db) -> (axum::Router, Arc<AppState>) {
    let config = Config::default();
    let hub = Arc::new(FollowerHub::new(Duration::from_secs(
        config.hub_grace_seconds,
    )));
    let engine = TrackingEngine::new(db.clone(), hub.clone(), config.default_body_mass_kg);

    let state = Arc::new(AppState {
        config,
        db,
        hub,
        engine,
    });

    (create_router(state.clone()), state)
}

/// Mint a JWT accepted by the test app's auth middleware.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: u64, signing_key: &[u8]) -> String {
    stride_tracker::middleware::auth::create_jwt(user_id, signing_key)
        .expect("Failed to create test JWT")
}

/// Send an authenticated JSON request through the router.
#[allow(dead_code)]
pub async fn send_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            builder.body(Body::empty()).unwrap()
        }
    };

    let response = app.clone().oneshot(request).await.unwrap();
    into_json(response).await
}

/// Read a response body as JSON (empty object when there is no body).
#[allow(dead_code)]
pub async fn into_json(response: Response<Body>) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::json!({}))
    };
    (status, json)
}
