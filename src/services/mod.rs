// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod engine;
pub mod hub;

pub use engine::{FinishOutcome, TrackingEngine};
pub use hub::{FollowerHub, FollowerInfo};
