// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stride-Tracker: live activity tracking for the Stride fitness platform
//!
//! This crate provides the backend service that ingests GPS samples for
//! in-progress activities, maintains running derived metrics, and fans out
//! real-time updates to followers.

pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::Db;
use services::{FollowerHub, TrackingEngine};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub hub: Arc<FollowerHub>,
    pub engine: TrackingEngine,
}
