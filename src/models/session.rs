// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live tracking session aggregate and its state machine.
//!
//! All transitions are pure methods taking an explicit `now` (or reading the
//! sample's own timestamp), so pause accounting and metric math are fully
//! unit-testable. The engine layer owns locking and clock access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::AppError;
use crate::geo::{self, Coordinate};
use crate::time_utils::elapsed_seconds;

/// Trailing tolerance for whole-kilometer milestone detection (meters).
const DISTANCE_MILESTONE_TOLERANCE_METERS: f64 = 100.0;
/// Duration milestone boundary interval (seconds).
const DURATION_MILESTONE_INTERVAL_SECONDS: f64 = 600.0;
/// Trailing tolerance for duration milestone detection (seconds).
const DURATION_MILESTONE_TOLERANCE_SECONDS: f64 = 30.0;

/// Supported outdoor activity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Running,
    Cycling,
    Hiking,
    Walking,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Running => "running",
            ActivityType::Cycling => "cycling",
            ActivityType::Hiking => "hiking",
            ActivityType::Walking => "walking",
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl SessionStatus {
    /// Whether this status counts as "live" for the one-per-owner invariant.
    pub fn is_live(&self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Paused)
    }
}

/// One GPS/sensor reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub heart_rate: Option<u32>,
    pub cadence: Option<u32>,
    /// Device-reported speed (m/s). Informational; derived metrics use the
    /// computed interval speed.
    pub speed: Option<f64>,
}

impl LocationSample {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A notable threshold crossing during an active session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Milestone {
    Distance { kilometers: u64 },
    Duration { minutes: u64 },
}

/// The live, mutable record of an in-progress or just-finished activity.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingSession {
    pub id: Uuid,
    pub owner_id: u64,
    pub activity_type: ActivityType,
    /// Title for the materialized activity; defaulted at finish if unset.
    pub name: Option<String>,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Start of the open pause interval; `None` when not paused.
    pub paused_at: Option<DateTime<Utc>>,
    /// Total seconds spent paused across all closed pause intervals.
    pub accumulated_pause_seconds: f64,
    /// Body mass frozen at start for calorie estimates (kg).
    pub body_mass_kg: f64,
    /// Append-only; insertion order is temporal order.
    pub samples: Vec<LocationSample>,
    pub cumulative_distance_meters: f64,
    pub cumulative_elevation_gain_meters: f64,
    pub current_speed_mps: f64,
    pub max_speed_mps: f64,
    pub average_speed_mps: f64,
    pub calories_burned: f64,
    /// Last whole-kilometer boundary accounted for.
    #[serde(skip)]
    last_km_boundary: u64,
    /// Last 10-minute boundary accounted for.
    #[serde(skip)]
    last_duration_boundary: u64,
}

impl TrackingSession {
    /// Create a new session in the `active` state from its first sample.
    pub fn new(
        owner_id: u64,
        activity_type: ActivityType,
        name: Option<String>,
        body_mass_kg: f64,
        first_sample: LocationSample,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            activity_type,
            name,
            status: SessionStatus::Active,
            start_time: first_sample.timestamp,
            end_time: None,
            paused_at: None,
            accumulated_pause_seconds: 0.0,
            body_mass_kg,
            samples: vec![first_sample],
            cumulative_distance_meters: 0.0,
            cumulative_elevation_gain_meters: 0.0,
            current_speed_mps: 0.0,
            max_speed_mps: 0.0,
            average_speed_mps: 0.0,
            calories_burned: 0.0,
            last_km_boundary: 0,
            last_duration_boundary: 0,
        }
    }

    /// Seconds of active (non-paused) time between start and `asof`.
    pub fn active_seconds(&self, asof: DateTime<Utc>) -> f64 {
        let mut paused = self.accumulated_pause_seconds;
        if let Some(pause_start) = self.paused_at {
            paused += elapsed_seconds(pause_start, asof);
        }
        (elapsed_seconds(self.start_time, asof) - paused).max(0.0)
    }

    /// Final duration net of pauses. Only meaningful once `end_time` is set;
    /// for live sessions callers pass a current timestamp to
    /// [`active_seconds`] instead.
    pub fn duration_seconds(&self) -> f64 {
        match self.end_time {
            Some(end) => self.active_seconds(end),
            None => 0.0,
        }
    }

    /// Append a sample and fold it into the running metrics.
    ///
    /// Incrementals are computed strictly against the immediately preceding
    /// sample. A sample with an identical or earlier timestamp is still
    /// appended and still accumulates distance, but its interval speed is
    /// reported as 0 and it burns no calories.
    ///
    /// Returns any milestones crossed by this sample.
    pub fn apply_sample(&mut self, sample: LocationSample) -> Result<Vec<Milestone>, AppError> {
        if self.status != SessionStatus::Active {
            return Err(AppError::InvalidState(format!(
                "cannot record location while session is {:?}",
                self.status
            )));
        }

        // Invariant: samples is non-empty from construction.
        let prev = self
            .samples
            .last()
            .expect("session always holds at least the starting sample");

        let interval_seconds = elapsed_seconds(prev.timestamp, sample.timestamp);
        let step_meters = geo::distance_meters(prev.coordinate(), sample.coordinate());

        self.cumulative_distance_meters += step_meters;
        if let (Some(prev_alt), Some(curr_alt)) = (prev.altitude, sample.altitude) {
            self.cumulative_elevation_gain_meters += geo::elevation_gain(prev_alt, curr_alt);
        }

        self.current_speed_mps = if interval_seconds > 0.0 {
            step_meters / interval_seconds
        } else {
            0.0
        };
        self.max_speed_mps = self.max_speed_mps.max(self.current_speed_mps);

        let active = self.active_seconds(sample.timestamp);
        self.average_speed_mps = if active > 0.0 {
            self.cumulative_distance_meters / active
        } else {
            0.0
        };

        let met = geo::met_value(self.activity_type, self.current_speed_mps);
        self.calories_burned +=
            geo::calories_increment(met, self.body_mass_kg, interval_seconds);

        self.samples.push(sample);

        Ok(self.detect_milestones(active))
    }

    /// Check whole-kilometer and 10-minute boundary crossings.
    ///
    /// Trackers always advance to the latest boundary so a large jump never
    /// causes a stale milestone to fire on a later sample; an event is
    /// emitted only when the crossing is within the trailing tolerance.
    fn detect_milestones(&mut self, active_seconds: f64) -> Vec<Milestone> {
        let mut milestones = Vec::new();

        let km = (self.cumulative_distance_meters / 1000.0).floor() as u64;
        if km > self.last_km_boundary {
            let past_boundary = self.cumulative_distance_meters - (km as f64) * 1000.0;
            if past_boundary <= DISTANCE_MILESTONE_TOLERANCE_METERS {
                milestones.push(Milestone::Distance { kilometers: km });
            }
            self.last_km_boundary = km;
        }

        let block = (active_seconds / DURATION_MILESTONE_INTERVAL_SECONDS).floor() as u64;
        if block > self.last_duration_boundary {
            let past_boundary =
                active_seconds - (block as f64) * DURATION_MILESTONE_INTERVAL_SECONDS;
            if past_boundary <= DURATION_MILESTONE_TOLERANCE_SECONDS {
                milestones.push(Milestone::Duration { minutes: block * 10 });
            }
            self.last_duration_boundary = block;
        }

        milestones
    }

    /// `active → paused`.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status != SessionStatus::Active {
            return Err(AppError::InvalidState(format!(
                "cannot pause a session that is {:?}",
                self.status
            )));
        }
        self.status = SessionStatus::Paused;
        self.paused_at = Some(now);
        Ok(())
    }

    /// `paused → active`; folds the closed pause interval into the
    /// accumulator.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status != SessionStatus::Paused {
            return Err(AppError::InvalidState(format!(
                "cannot resume a session that is {:?}",
                self.status
            )));
        }
        if let Some(pause_start) = self.paused_at.take() {
            self.accumulated_pause_seconds += elapsed_seconds(pause_start, now);
        }
        self.status = SessionStatus::Active;
        Ok(())
    }

    /// `{active, paused} → completed`; folds any open pause, stamps
    /// `end_time`, and fixes the final average speed.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.status.is_live() {
            return Err(AppError::InvalidState(format!(
                "cannot finish a session that is {:?}",
                self.status
            )));
        }
        if let Some(pause_start) = self.paused_at.take() {
            self.accumulated_pause_seconds += elapsed_seconds(pause_start, now);
        }
        self.end_time = Some(now);
        self.status = SessionStatus::Completed;

        let duration = self.duration_seconds();
        self.average_speed_mps = if duration > 0.0 {
            self.cumulative_distance_meters / duration
        } else {
            0.0
        };
        self.current_speed_mps = 0.0;
        Ok(())
    }

    /// `{active, paused} → cancelled`; the session is discarded and never
    /// materialized.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.status.is_live() {
            return Err(AppError::InvalidState(format!(
                "cannot cancel a session that is {:?}",
                self.status
            )));
        }
        if let Some(pause_start) = self.paused_at.take() {
            self.accumulated_pause_seconds += elapsed_seconds(pause_start, now);
        }
        self.end_time = Some(now);
        self.status = SessionStatus::Cancelled;
        Ok(())
    }

    /// Snapshot for API responses and follower broadcasts.
    pub fn summary(&self, asof: DateTime<Utc>) -> SessionSummary {
        let duration_seconds = if self.end_time.is_some() {
            self.duration_seconds()
        } else {
            self.active_seconds(asof)
        };
        SessionSummary {
            id: self.id,
            owner_id: self.owner_id,
            activity_type: self.activity_type,
            name: self.name.clone(),
            status: self.status,
            start_time: self.start_time,
            end_time: self.end_time,
            metrics: self.metrics(duration_seconds),
        }
    }

    /// The running-metrics portion of a snapshot.
    pub fn metrics(&self, duration_seconds: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            duration_seconds,
            distance_meters: self.cumulative_distance_meters,
            elevation_gain_meters: self.cumulative_elevation_gain_meters,
            current_speed_mps: self.current_speed_mps,
            max_speed_mps: self.max_speed_mps,
            average_speed_mps: self.average_speed_mps,
            calories_burned: self.calories_burned,
            sample_count: self.samples.len() as u32,
        }
    }
}

/// Point-in-time view of a session's derived metrics.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MetricsSnapshot {
    pub duration_seconds: f64,
    pub distance_meters: f64,
    pub elevation_gain_meters: f64,
    pub current_speed_mps: f64,
    pub max_speed_mps: f64,
    pub average_speed_mps: f64,
    pub calories_burned: f64,
    pub sample_count: u32,
}

/// Session state snapshot returned by the tracking API.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionSummary {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub id: Uuid,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub owner_id: u64,
    pub activity_type: ActivityType,
    pub name: Option<String>,
    pub status: SessionStatus,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_time: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
}
