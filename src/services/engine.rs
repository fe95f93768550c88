// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live tracking engine.
//!
//! Owns the registry of in-progress sessions and orchestrates the full
//! workflow per operation:
//! 1. Resolve the session and serialize against concurrent mutations
//! 2. Run the state transition / metric fold on the session aggregate
//! 3. Broadcast the resulting event to followers
//! 4. On finish, materialize the permanent activity and update user totals
//!
//! Concurrency model: operations on different sessions are independent;
//! operations on one session are serialized by a per-session async mutex
//! that is held across store awaits, so same-session mutations queue rather
//! than interleave. The one-live-session-per-owner invariant is enforced by
//! an atomic claim on the owner index.

use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::Db;
use crate::error::AppError;
use crate::models::{
    Activity, ActivityType, EventKind, LocationSample, MetricsSnapshot, SessionSummary,
    TrackingSession,
};
use crate::services::FollowerHub;

struct SessionSlot {
    session: Mutex<TrackingSession>,
}

/// Result of finishing a session.
///
/// Materialization failure does not roll back completion; the error rides
/// alongside the tracking result so the client can retry activity creation
/// out of band.
#[derive(Debug)]
pub struct FinishOutcome {
    pub summary: SessionSummary,
    pub activity: Option<Activity>,
    pub materialization_error: Option<String>,
}

/// The live activity tracking engine.
#[derive(Clone)]
pub struct TrackingEngine {
    sessions: Arc<DashMap<Uuid, Arc<SessionSlot>>>,
    /// owner id → live session id; the uniqueness guard for starts.
    owners: Arc<DashMap<u64, Uuid>>,
    db: Db,
    hub: Arc<FollowerHub>,
    default_body_mass_kg: f64,
}

impl TrackingEngine {
    pub fn new(db: Db, hub: Arc<FollowerHub>, default_body_mass_kg: f64) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            owners: Arc::new(DashMap::new()),
            db,
            hub,
            default_body_mass_kg,
        }
    }

    /// Start tracking a new activity for `owner_id`.
    ///
    /// Exactly one of two racing starts for the same owner wins; the loser
    /// fails with `Conflict`.
    pub async fn start(
        &self,
        owner_id: u64,
        activity_type: ActivityType,
        name: Option<String>,
        first_sample: LocationSample,
    ) -> Result<SessionSummary, AppError> {
        // Profile lookup is advisory; an unreachable store falls back to
        // the configured default body mass.
        let body_mass_kg = self
            .db
            .get_user(owner_id)
            .await
            .ok()
            .flatten()
            .and_then(|u| u.body_mass_kg)
            .unwrap_or(self.default_body_mass_kg);

        let session =
            TrackingSession::new(owner_id, activity_type, name, body_mass_kg, first_sample);
        let session_id = session.id;
        let summary = session.summary(session.start_time);

        // Slot goes in first so the owner index never points at a missing
        // session, then the owner claim decides the race.
        self.sessions.insert(
            session_id,
            Arc::new(SessionSlot {
                session: Mutex::new(session),
            }),
        );
        match self.owners.entry(owner_id) {
            Entry::Occupied(_) => {
                self.sessions.remove(&session_id);
                return Err(AppError::Conflict(
                    "an activity is already being tracked for this user".to_string(),
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(session_id);
            }
        }

        self.hub.open(session_id);
        self.hub
            .publish(session_id, EventKind::ActivityStarted, json!(summary));

        tracing::info!(
            owner_id,
            session_id = %session_id,
            activity_type = %activity_type,
            "Tracking session started"
        );
        Ok(summary)
    }

    /// Append a location sample to an active session and recompute metrics.
    pub async fn update_location(
        &self,
        session_id: Uuid,
        owner_id: u64,
        sample: LocationSample,
    ) -> Result<MetricsSnapshot, AppError> {
        let slot = self.slot(session_id)?;
        let mut session = slot.session.lock().await;
        Self::check_owner(&session, owner_id)?;

        let sample_time = sample.timestamp;
        let milestones = session.apply_sample(sample)?;
        let snapshot = session.metrics(session.active_seconds(sample_time));

        self.hub
            .publish(session_id, EventKind::LocationUpdate, json!(snapshot));
        for milestone in &milestones {
            tracing::info!(session_id = %session_id, ?milestone, "Milestone reached");
            self.hub
                .publish(session_id, EventKind::MilestoneReached, json!(milestone));
        }

        Ok(snapshot)
    }

    /// Pause an active session.
    pub async fn pause(&self, session_id: Uuid, owner_id: u64) -> Result<SessionSummary, AppError> {
        let slot = self.slot(session_id)?;
        let mut session = slot.session.lock().await;
        Self::check_owner(&session, owner_id)?;

        let now = Utc::now();
        session.pause(now)?;
        let summary = session.summary(now);
        self.hub
            .publish(session_id, EventKind::ActivityPaused, json!(summary));
        tracing::info!(session_id = %session_id, "Tracking session paused");
        Ok(summary)
    }

    /// Resume a paused session.
    pub async fn resume(
        &self,
        session_id: Uuid,
        owner_id: u64,
    ) -> Result<SessionSummary, AppError> {
        let slot = self.slot(session_id)?;
        let mut session = slot.session.lock().await;
        Self::check_owner(&session, owner_id)?;

        let now = Utc::now();
        session.resume(now)?;
        let summary = session.summary(now);
        self.hub
            .publish(session_id, EventKind::ActivityResumed, json!(summary));
        tracing::info!(session_id = %session_id, "Tracking session resumed");
        Ok(summary)
    }

    /// Finish a session: complete the state machine, then materialize the
    /// permanent activity and bump the owner's lifetime totals.
    pub async fn finish(&self, session_id: Uuid, owner_id: u64) -> Result<FinishOutcome, AppError> {
        let slot = self.slot(session_id)?;
        let mut session = slot.session.lock().await;
        Self::check_owner(&session, owner_id)?;

        let now = Utc::now();
        session.finish(now)?;
        // The owner may start a fresh activity as soon as this one is
        // completed, even while materialization is still in flight.
        self.owners.remove(&owner_id);

        let summary = session.summary(now);

        let (activity, materialization_error) =
            match self.db.materialize_session(&session).await {
                Ok(activity) => {
                    let totals_result = self
                        .db
                        .increment_user_totals(
                            owner_id,
                            activity.distance_meters,
                            activity.duration_seconds / 60.0,
                        )
                        .await;
                    match totals_result {
                        Ok(()) => (Some(activity), None),
                        Err(err) => {
                            tracing::warn!(
                                session_id = %session_id,
                                error = %err,
                                "User totals update failed after materialization"
                            );
                            (Some(activity), Some(err.to_string()))
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %err,
                        "Materialization failed; session stays completed"
                    );
                    (None, Some(err.to_string()))
                }
            };

        self.hub.publish(
            session_id,
            EventKind::ActivityFinished,
            json!({
                "summary": summary,
                "activity_id": activity.as_ref().map(|a| a.id),
            }),
        );

        drop(session);
        self.sessions.remove(&session_id);
        self.hub.teardown(session_id);

        tracing::info!(
            session_id = %session_id,
            owner_id,
            materialized = activity.is_some(),
            "Tracking session finished"
        );
        Ok(FinishOutcome {
            summary,
            activity,
            materialization_error,
        })
    }

    /// Cancel a session: discard it without materialization.
    pub async fn cancel(&self, session_id: Uuid, owner_id: u64) -> Result<(), AppError> {
        let slot = self.slot(session_id)?;
        let mut session = slot.session.lock().await;
        Self::check_owner(&session, owner_id)?;

        let now = Utc::now();
        session.cancel(now)?;
        self.owners.remove(&owner_id);

        self.hub.publish(
            session_id,
            EventKind::ActivityCancelled,
            json!({ "session_id": session_id }),
        );

        drop(session);
        self.sessions.remove(&session_id);
        self.hub.teardown(session_id);

        tracing::info!(session_id = %session_id, owner_id, "Tracking session cancelled");
        Ok(())
    }

    /// Snapshot of the owner's live session, if any.
    ///
    /// Read-only; may observe state that is about to change under a
    /// concurrent mutation.
    pub async fn get_active(&self, owner_id: u64) -> Result<SessionSummary, AppError> {
        let session_id = self
            .owners
            .get(&owner_id)
            .map(|entry| *entry)
            .ok_or_else(|| {
                AppError::NotFound(format!("no active session for user {}", owner_id))
            })?;

        let slot = self.slot(session_id)?;
        let session = slot.session.lock().await;
        Ok(session.summary(Utc::now()))
    }

    fn slot(&self, session_id: Uuid) -> Result<Arc<SessionSlot>, AppError> {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("session {} not found", session_id)))
    }

    /// Sessions belonging to another user answer `NotFound`, so probing
    /// cannot reveal whether a session id is live.
    fn check_owner(session: &TrackingSession, owner_id: u64) -> Result<(), AppError> {
        if session.owner_id != owner_id {
            return Err(AppError::NotFound(format!(
                "session {} not found",
                session.id
            )));
        }
        Ok(())
    }
}
