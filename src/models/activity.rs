// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Permanent activity record produced by materializing a finished session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::ActivityType;

/// Stored activity record in the activity store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Activity ID (also used as document ID)
    pub id: Uuid,
    /// Owning user ID
    pub owner_id: u64,
    /// Activity name/title
    pub name: String,
    /// Sport type (running, cycling, hiking, walking)
    pub activity_type: ActivityType,
    /// When tracking started
    pub start_time: DateTime<Utc>,
    /// When tracking finished
    pub end_time: DateTime<Utc>,
    /// Duration net of pauses (seconds)
    pub duration_seconds: f64,
    /// Distance in meters
    pub distance_meters: f64,
    /// Total ascent in meters
    pub elevation_gain_meters: f64,
    /// Average moving speed (m/s)
    pub average_speed_mps: f64,
    /// Peak interval speed (m/s)
    pub max_speed_mps: f64,
    /// Estimated energy expenditure (kcal)
    pub calories_burned: f64,
    /// Full route, one point per retained sample
    pub route: Vec<RoutePoint>,
    /// Google encoded polyline of the route (precision 5)
    pub summary_polyline: String,
    /// When this record was materialized
    pub created_at: DateTime<Utc>,
}

/// One stored reference point of an activity route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub heart_rate: Option<u32>,
}
