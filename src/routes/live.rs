// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live-follow routes: WebSocket event streaming plus follower queries
//! and direct publishes (messages, emergency alerts).
//!
//! A follower connects to `/api/live/{activity_id}/ws` and receives every
//! event the engine publishes for that activity, in order, as JSON
//! `{type, activity_id, payload, timestamp}` messages. In-band commands:
//!
//! - `{"action": "message", "text": "..."}`
//! - `{"action": "emergency", "message": "...", "latitude": .., "longitude": ..}`
//! - `{"action": "leave"}`

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::EventKind;
use crate::services::FollowerInfo;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Live-follow routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/live/{activity_id}/ws", get(ws_handler))
        .route("/api/live/{activity_id}/followers", get(get_followers))
        .route("/api/live/{activity_id}/message", post(send_message))
        .route("/api/live/{activity_id}/emergency", post(send_emergency_alert))
}

// ─── WebSocket Follow ────────────────────────────────────────

/// Commands a follower connection can send in-band.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientCommand {
    Message {
        text: String,
    },
    Emergency {
        message: Option<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    },
    Leave,
}

/// Upgrade a follower connection for a live activity.
async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    // Reject unknown/finished activities with a proper 404 before the
    // upgrade; the hub re-checks at join time.
    if !state.hub.contains(activity_id) {
        return Err(AppError::NotFound(format!(
            "live activity {} not found",
            activity_id
        )));
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, activity_id, user.user_id)))
}

/// Drive an established follower connection until it drops or leaves.
async fn handle_socket(
    mut socket: WebSocket,
    state: Arc<AppState>,
    activity_id: Uuid,
    user_id: u64,
) {
    let connection_id = Uuid::new_v4();

    let mut events = match state.hub.join(activity_id, connection_id, user_id) {
        Ok(receiver) => receiver,
        Err(err) => {
            // Torn down between upgrade and join
            tracing::debug!(%activity_id, error = %err, "Join refused after upgrade");
            let _ = socket.close().await;
            return;
        }
    };

    state.hub.publish(
        activity_id,
        EventKind::FollowerJoined,
        json!({ "user_id": user_id, "connection_id": connection_id }),
    );

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => {
                        let Ok(text) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    // Channel torn down; the stream is over.
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if handle_command(&state, activity_id, user_id, &text) {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong and binary frames
                    Some(Err(err)) => {
                        tracing::debug!(%activity_id, error = %err, "Follower socket error");
                        break;
                    }
                }
            }
        }
    }

    state.hub.leave(activity_id, connection_id);
    state.hub.publish(
        activity_id,
        EventKind::FollowerLeft,
        json!({ "user_id": user_id, "connection_id": connection_id }),
    );
}

/// Dispatch one in-band command. Returns `true` when the connection asked
/// to leave.
fn handle_command(state: &Arc<AppState>, activity_id: Uuid, user_id: u64, text: &str) -> bool {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(ClientCommand::Message { text }) => {
            if !text.is_empty() && text.len() <= MAX_MESSAGE_LENGTH {
                state.hub.publish(
                    activity_id,
                    EventKind::ActivityMessage,
                    json!({ "from": user_id, "text": text }),
                );
            }
            false
        }
        Ok(ClientCommand::Emergency {
            message,
            latitude,
            longitude,
        }) => {
            state.hub.publish(
                activity_id,
                EventKind::EmergencyAlert,
                emergency_payload(user_id, message, latitude, longitude),
            );
            false
        }
        Ok(ClientCommand::Leave) => true,
        Err(err) => {
            tracing::debug!(%activity_id, error = %err, "Ignoring malformed follower command");
            false
        }
    }
}

const MAX_MESSAGE_LENGTH: usize = 500;

fn emergency_payload(
    user_id: u64,
    message: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> serde_json::Value {
    json!({
        "from": user_id,
        "message": message,
        "location": match (latitude, longitude) {
            (Some(lat), Some(lon)) => json!({ "latitude": lat, "longitude": lon }),
            _ => serde_json::Value::Null,
        },
    })
}

// ─── Followers ───────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FollowersResponse {
    pub followers: Vec<FollowerInfo>,
    pub count: u32,
}

/// Snapshot of who is following a live activity.
async fn get_followers(
    State(state): State<Arc<AppState>>,
    Path(activity_id): Path<Uuid>,
) -> Result<Json<FollowersResponse>> {
    let followers = state.hub.subscribers(activity_id)?;
    let count = followers.len() as u32;
    Ok(Json(FollowersResponse { followers, count }))
}

// ─── Direct Publishes ────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct MessageRequest {
    #[validate(length(min = 1, max = 500, message = "message must be 1-500 characters"))]
    pub text: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmergencyRequest {
    #[validate(length(max = 500, message = "message is too long"))]
    pub message: Option<String>,
    #[validate(range(min = -90.0, max = 90.0, message = "latitude must be within [-90, 90]"))]
    pub latitude: Option<f64>,
    #[validate(range(
        min = -180.0,
        max = 180.0,
        message = "longitude must be within [-180, 180]"
    ))]
    pub longitude: Option<f64>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeliveredResponse {
    pub delivered: bool,
}

/// Send a chat message to everyone following the activity.
async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<Uuid>,
    Json(payload): Json<MessageRequest>,
) -> Result<Json<DeliveredResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if !state.hub.contains(activity_id) {
        return Err(AppError::NotFound(format!(
            "live activity {} not found",
            activity_id
        )));
    }

    state.hub.publish(
        activity_id,
        EventKind::ActivityMessage,
        json!({ "from": user.user_id, "text": payload.text }),
    );
    Ok(Json(DeliveredResponse { delivered: true }))
}

/// Broadcast an emergency alert tagged with the sender identity.
async fn send_emergency_alert(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<Uuid>,
    Json(payload): Json<EmergencyRequest>,
) -> Result<Json<DeliveredResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if !state.hub.contains(activity_id) {
        return Err(AppError::NotFound(format!(
            "live activity {} not found",
            activity_id
        )));
    }

    tracing::warn!(
        %activity_id,
        from = user.user_id,
        "Emergency alert broadcast"
    );
    state.hub.publish(
        activity_id,
        EventKind::EmergencyAlert,
        emergency_payload(
            user.user_id,
            payload.message,
            payload.latitude,
            payload.longitude,
        ),
    );
    Ok(Json(DeliveredResponse { delivered: true }))
}
