// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API input validation security tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

#[tokio::test]
async fn test_tracking_requires_auth() {
    let (app, _state) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/tracking/start")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "activity_type": "running",
                        "start": {"latitude": 41.0, "longitude": 2.0}
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_latitude_out_of_range() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(12345, &state.config.jwt_signing_key);

    let (status, body) = common::send_json(
        &app,
        "POST",
        "/api/tracking/start",
        &token,
        Some(json!({
            "activity_type": "running",
            "start": {"latitude": 95.0, "longitude": 2.0}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_longitude_out_of_range() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(12345, &state.config.jwt_signing_key);

    let (status, body) = common::send_json(
        &app,
        "POST",
        "/api/tracking/start",
        &token,
        Some(json!({
            "activity_type": "cycling",
            "start": {"latitude": 41.0, "longitude": -200.0}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_implausible_heart_rate_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(12345, &state.config.jwt_signing_key);

    let (status, _) = common::send_json(
        &app,
        "POST",
        "/api/tracking/start",
        &token,
        Some(json!({
            "activity_type": "running",
            "start": {"latitude": 41.0, "longitude": 2.0, "heart_rate": 600}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_name_too_long() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(12345, &state.config.jwt_signing_key);

    let long_name = "a".repeat(121);
    let (status, _) = common::send_json(
        &app,
        "POST",
        "/api/tracking/start",
        &token,
        Some(json!({
            "activity_type": "hiking",
            "name": long_name,
            "start": {"latitude": 41.0, "longitude": 2.0}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_follower_message_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(12345, &state.config.jwt_signing_key);

    // Start a session so the live channel exists
    let (status, session) = common::send_json(
        &app,
        "POST",
        "/api/tracking/start",
        &token,
        Some(json!({
            "activity_type": "running",
            "start": {"latitude": 41.0, "longitude": 2.0}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = session["id"].as_str().unwrap();

    let (status, body) = common::send_json(
        &app,
        "POST",
        &format!("/api/live/{}/message", session_id),
        &token,
        Some(json!({"text": ""})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_invalid_session_id_in_path() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(12345, &state.config.jwt_signing_key);

    let (status, _) = common::send_json(
        &app,
        "POST",
        "/api/tracking/not-a-uuid/pause",
        &token,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
