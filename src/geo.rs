// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pure geodesic and energy-expenditure math.
//!
//! Everything in this module is stateless: haversine distance between GPS
//! fixes, elevation-gain deltas, and MET-based calorie estimates. The MET
//! step tables follow the Compendium of Physical Activities groupings for
//! each supported sport.

use crate::models::ActivityType;

/// Mean Earth radius in meters used for haversine distance.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// MET applied when no speed-specific table entry fits.
pub const DEFAULT_MET: f64 = 5.0;

/// Body mass assumed for calorie estimates when the profile has none (kg).
pub const DEFAULT_BODY_MASS_KG: f64 = 70.0;

/// A (latitude, longitude) pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Great-circle (haversine) distance between two coordinates, in meters.
///
/// Symmetric, and exactly zero for identical points.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Elevation gained between consecutive altitude readings, in meters.
///
/// Only ascents count; descents contribute zero gain, never negative.
pub fn elevation_gain(prev_altitude: f64, curr_altitude: f64) -> f64 {
    (curr_altitude - prev_altitude).max(0.0)
}

/// Metabolic Equivalent of Task for an activity at a given speed.
///
/// Speed breakpoints are in km/h. Values per activity:
/// - running: <8 → 7.0, <11 → 10.0, <14 → 12.5, else 14.0
/// - cycling: <16 → 6.0, <20 → 8.0, <25 → 10.0, else 12.0
/// - hiking: <4 → 5.3, <6 → 6.5, else 8.0
/// - walking: <4 → 3.0, <5.5 → 3.8, <7 → 5.0, else 6.3
pub fn met_value(activity_type: ActivityType, speed_mps: f64) -> f64 {
    let kmh = speed_mps * 3.6;
    match activity_type {
        ActivityType::Running => match kmh {
            s if s < 8.0 => 7.0,
            s if s < 11.0 => 10.0,
            s if s < 14.0 => 12.5,
            _ => 14.0,
        },
        ActivityType::Cycling => match kmh {
            s if s < 16.0 => 6.0,
            s if s < 20.0 => 8.0,
            s if s < 25.0 => 10.0,
            _ => 12.0,
        },
        ActivityType::Hiking => match kmh {
            s if s < 4.0 => 5.3,
            s if s < 6.0 => 6.5,
            _ => 8.0,
        },
        ActivityType::Walking => match kmh {
            s if s < 4.0 => 3.0,
            s if s < 5.5 => 3.8,
            s if s < 7.0 => 5.0,
            _ => 6.3,
        },
    }
}

/// Calories burned over an interval: `met * kg * hours`.
pub fn calories_increment(met: f64, body_mass_kg: f64, elapsed_seconds: f64) -> f64 {
    met * body_mass_kg * (elapsed_seconds / 3600.0)
}
