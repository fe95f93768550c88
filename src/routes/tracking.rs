// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tracking API routes: the request/response boundary of the engine.
//!
//! Handlers validate input shape, resolve the caller from the auth
//! middleware, delegate to the engine, and let `AppError` map failures to
//! stable externally visible codes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ActivityType, LocationSample, MetricsSnapshot, SessionSummary};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Tracking routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tracking/start", post(start_tracking))
        .route("/api/tracking/active", get(get_active_session))
        .route("/api/tracking/{session_id}/location", post(update_location))
        .route("/api/tracking/{session_id}/pause", post(pause_tracking))
        .route("/api/tracking/{session_id}/resume", post(resume_tracking))
        .route("/api/tracking/{session_id}/finish", post(finish_tracking))
        .route("/api/tracking/{session_id}/cancel", post(cancel_tracking))
}

// ─── Request Shapes ──────────────────────────────────────────

/// One incoming GPS/sensor reading.
#[derive(Debug, Deserialize, Validate)]
pub struct SampleInput {
    #[validate(range(min = -90.0, max = 90.0, message = "latitude must be within [-90, 90]"))]
    pub latitude: f64,
    #[validate(range(
        min = -180.0,
        max = 180.0,
        message = "longitude must be within [-180, 180]"
    ))]
    pub longitude: f64,
    pub altitude: Option<f64>,
    /// Defaults to the server clock when the device sends none.
    pub timestamp: Option<DateTime<Utc>>,
    #[validate(range(max = 250, message = "heart rate is implausible"))]
    pub heart_rate: Option<u32>,
    #[validate(range(max = 300, message = "cadence is implausible"))]
    pub cadence: Option<u32>,
    #[validate(range(min = 0.0, message = "speed cannot be negative"))]
    pub speed: Option<f64>,
}

impl SampleInput {
    fn into_sample(self) -> LocationSample {
        LocationSample {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            heart_rate: self.heart_rate,
            cadence: self.cadence,
            speed: self.speed,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartTrackingRequest {
    pub activity_type: ActivityType,
    /// Title for the materialized activity
    #[validate(length(max = 120, message = "name is too long"))]
    pub name: Option<String>,
    #[validate(nested)]
    pub start: SampleInput,
}

// ─── Response Shapes ─────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FinishResponse {
    pub session: SessionSummary,
    /// ID of the materialized activity, absent when materialization failed
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub activity_id: Option<Uuid>,
    /// Present when the permanent record could not be written; the
    /// session itself is still completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materialization_error: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CancelResponse {
    pub cancelled: bool,
}

// ─── Handlers ────────────────────────────────────────────────

/// Start tracking a new activity.
async fn start_tracking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<StartTrackingRequest>,
) -> Result<Json<SessionSummary>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    tracing::debug!(
        user_id = user.user_id,
        activity_type = %payload.activity_type,
        "Start tracking requested"
    );

    let summary = state
        .engine
        .start(
            user.user_id,
            payload.activity_type,
            payload.name,
            payload.start.into_sample(),
        )
        .await?;

    Ok(Json(summary))
}

/// Record a location sample for an active session.
async fn update_location(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SampleInput>,
) -> Result<Json<MetricsSnapshot>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let snapshot = state
        .engine
        .update_location(session_id, user.user_id, payload.into_sample())
        .await?;

    Ok(Json(snapshot))
}

/// Pause an active session.
async fn pause_tracking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSummary>> {
    let summary = state.engine.pause(session_id, user.user_id).await?;
    Ok(Json(summary))
}

/// Resume a paused session.
async fn resume_tracking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSummary>> {
    let summary = state.engine.resume(session_id, user.user_id).await?;
    Ok(Json(summary))
}

/// Finish a session and materialize the permanent activity.
async fn finish_tracking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<FinishResponse>> {
    let outcome = state.engine.finish(session_id, user.user_id).await?;

    Ok(Json(FinishResponse {
        session: outcome.summary,
        activity_id: outcome.activity.map(|a| a.id),
        materialization_error: outcome.materialization_error,
    }))
}

/// Cancel a session without materializing it.
async fn cancel_tracking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<CancelResponse>> {
    state.engine.cancel(session_id, user.user_id).await?;
    Ok(Json(CancelResponse { cancelled: true }))
}

/// Get the caller's live session, if any.
async fn get_active_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SessionSummary>> {
    let summary = state.engine.get_active(user.user_id).await?;
    Ok(Json(summary))
}
