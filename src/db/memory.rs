// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory activity and user stores.
//!
//! A `Db` handle is cheap to clone and safe to share across tasks. The
//! offline constructor makes every call fail with a database error, which
//! integration tests use to exercise materialization-failure reporting.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use geo::{coord, LineString};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Activity, RoutePoint, TrackingSession, UserProfile};

/// Handle to the activity and user stores.
#[derive(Clone)]
pub struct Db {
    inner: Option<Arc<Stores>>,
}

#[derive(Default)]
struct Stores {
    activities: DashMap<Uuid, Activity>,
    users: DashMap<u64, UserProfile>,
}

impl Db {
    /// Create a connected in-memory store.
    pub fn new() -> Self {
        Self {
            inner: Some(Arc::new(Stores::default())),
        }
    }

    /// Create an offline store where every operation fails.
    pub fn new_offline() -> Self {
        Self { inner: None }
    }

    fn stores(&self) -> Result<&Stores, AppError> {
        self.inner
            .as_deref()
            .ok_or_else(|| AppError::Database("store is offline".to_string()))
    }

    // ─── Users ───────────────────────────────────────────────────

    pub async fn get_user(&self, user_id: u64) -> Result<Option<UserProfile>, AppError> {
        Ok(self.stores()?.users.get(&user_id).map(|u| u.clone()))
    }

    pub async fn upsert_user(&self, user: &UserProfile) -> Result<(), AppError> {
        self.stores()?.users.insert(user.user_id, user.clone());
        Ok(())
    }

    /// Atomically add a finished activity to the user's lifetime totals.
    ///
    /// A missing profile is created on the fly so totals are never lost.
    pub async fn increment_user_totals(
        &self,
        user_id: u64,
        distance_meters: f64,
        duration_minutes: f64,
    ) -> Result<(), AppError> {
        let now = crate::time_utils::format_utc_rfc3339(Utc::now());
        let mut entry = self
            .stores()?
            .users
            .entry(user_id)
            .or_insert_with(|| UserProfile {
                user_id,
                display_name: String::new(),
                body_mass_kg: None,
                total_distance_meters: 0.0,
                total_duration_minutes: 0.0,
                created_at: now.clone(),
                last_active: now.clone(),
            });
        entry.total_distance_meters += distance_meters;
        entry.total_duration_minutes += duration_minutes;
        entry.last_active = now;
        Ok(())
    }

    // ─── Activities ──────────────────────────────────────────────

    /// Persist a finished session as a permanent activity record.
    ///
    /// Each retained sample becomes a stored route point; the route is also
    /// condensed into an encoded summary polyline.
    pub async fn materialize_session(
        &self,
        session: &TrackingSession,
    ) -> Result<Activity, AppError> {
        let stores = self.stores()?;

        let end_time = session.end_time.ok_or_else(|| {
            AppError::Database("cannot materialize a session without an end time".to_string())
        })?;

        let route: Vec<RoutePoint> = session
            .samples
            .iter()
            .map(|s| RoutePoint {
                latitude: s.latitude,
                longitude: s.longitude,
                altitude: s.altitude,
                timestamp: s.timestamp,
                heart_rate: s.heart_rate,
            })
            .collect();

        let line: LineString<f64> = session
            .samples
            .iter()
            .map(|s| coord! { x: s.longitude, y: s.latitude })
            .collect();
        let summary_polyline = polyline::encode_coordinates(line, 5)
            .map_err(|e| AppError::Database(format!("polyline encoding failed: {}", e)))?;

        let name = session.name.clone().unwrap_or_else(|| {
            format!(
                "{} on {}",
                session.activity_type,
                session.start_time.format("%Y-%m-%d")
            )
        });

        let activity = Activity {
            id: session.id,
            owner_id: session.owner_id,
            name,
            activity_type: session.activity_type,
            start_time: session.start_time,
            end_time,
            duration_seconds: session.duration_seconds(),
            distance_meters: session.cumulative_distance_meters,
            elevation_gain_meters: session.cumulative_elevation_gain_meters,
            average_speed_mps: session.average_speed_mps,
            max_speed_mps: session.max_speed_mps,
            calories_burned: session.calories_burned,
            route,
            summary_polyline,
            created_at: Utc::now(),
        };

        stores.activities.insert(activity.id, activity.clone());
        Ok(activity)
    }

    pub async fn get_activity(&self, activity_id: Uuid) -> Result<Option<Activity>, AppError> {
        Ok(self
            .stores()?
            .activities
            .get(&activity_id)
            .map(|a| a.clone()))
    }

    pub async fn get_activities_for_user(
        &self,
        owner_id: u64,
    ) -> Result<Vec<Activity>, AppError> {
        let mut activities: Vec<Activity> = self
            .stores()?
            .activities
            .iter()
            .filter(|a| a.owner_id == owner_id)
            .map(|a| a.clone())
            .collect();
        activities.sort_by_key(|a| a.start_time);
        Ok(activities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityType, LocationSample};
    use chrono::TimeZone;

    fn finished_session() -> TrackingSession {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let mut session = TrackingSession::new(
            7,
            ActivityType::Running,
            None,
            70.0,
            LocationSample {
                latitude: 41.0,
                longitude: 2.0,
                altitude: Some(12.0),
                timestamp: start,
                heart_rate: Some(120),
                cadence: None,
                speed: None,
            },
        );
        session
            .apply_sample(LocationSample {
                latitude: 41.0009,
                longitude: 2.0,
                altitude: Some(14.0),
                timestamp: start + chrono::Duration::seconds(30),
                heart_rate: Some(140),
                cadence: None,
                speed: None,
            })
            .unwrap();
        session
            .finish(start + chrono::Duration::seconds(60))
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_materialize_builds_route_and_polyline() {
        let db = Db::new();
        let session = finished_session();

        let activity = db.materialize_session(&session).await.unwrap();

        assert_eq!(activity.id, session.id);
        assert_eq!(activity.route.len(), 2);
        assert!(!activity.summary_polyline.is_empty());
        assert!((activity.distance_meters - 100.0).abs() < 1.0);
        assert_eq!(activity.name, "running on 2024-06-01");

        let fetched = db.get_activity(session.id).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn test_increment_totals_creates_missing_profile() {
        let db = Db::new();
        db.increment_user_totals(42, 5000.0, 30.0).await.unwrap();
        db.increment_user_totals(42, 1000.0, 10.0).await.unwrap();

        let profile = db.get_user(42).await.unwrap().unwrap();
        assert_eq!(profile.total_distance_meters, 6000.0);
        assert_eq!(profile.total_duration_minutes, 40.0);
    }

    #[tokio::test]
    async fn test_offline_store_fails_every_call() {
        let db = Db::new_offline();
        let session = finished_session();

        assert!(matches!(
            db.materialize_session(&session).await,
            Err(AppError::Database(_))
        ));
        assert!(matches!(
            db.get_user(1).await,
            Err(AppError::Database(_))
        ));
    }
}
