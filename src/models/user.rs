//! User profile model for storage and API.

use serde::{Deserialize, Serialize};

/// User profile stored in the user store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// User ID (also used as document ID)
    pub user_id: u64,
    /// Display name
    pub display_name: String,
    /// Body mass for calorie estimates (kg), if the user shared it
    pub body_mass_kg: Option<f64>,
    /// Lifetime tracked distance (meters)
    pub total_distance_meters: f64,
    /// Lifetime tracked time (minutes)
    pub total_duration_minutes: f64,
    /// When the user registered
    pub created_at: String,
    /// Last activity timestamp
    pub last_active: String,
}
