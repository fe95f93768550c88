// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod event;
pub mod session;
pub mod user;

pub use activity::{Activity, RoutePoint};
pub use event::{EventKind, LiveEvent};
pub use session::{
    ActivityType, LocationSample, MetricsSnapshot, Milestone, SessionStatus, SessionSummary,
    TrackingSession,
};
pub use user::UserProfile;
