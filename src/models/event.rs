// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wire shape of events pushed to followers of a live activity.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time_utils::format_utc_rfc3339;

/// Event categories a follower connection can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ActivityStarted,
    LocationUpdate,
    ActivityPaused,
    ActivityResumed,
    ActivityFinished,
    ActivityCancelled,
    MilestoneReached,
    ActivityMessage,
    EmergencyAlert,
    FollowerJoined,
    FollowerLeft,
}

/// One event as delivered over the follower transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub activity_id: Uuid,
    pub payload: serde_json::Value,
    /// RFC3339 emission timestamp
    pub timestamp: String,
}

impl LiveEvent {
    pub fn new(kind: EventKind, activity_id: Uuid, payload: serde_json::Value) -> Self {
        Self {
            kind,
            activity_id,
            payload,
            timestamp: format_utc_rfc3339(Utc::now()),
        }
    }
}
