// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stride-Tracker API Server
//!
//! Live activity tracking backend for the Stride fitness platform:
//! ingests GPS samples for in-progress activities, maintains running
//! metrics, and streams updates to followers.

use std::sync::Arc;
use std::time::Duration;

use stride_tracker::{
    config::Config,
    db::Db,
    services::{FollowerHub, TrackingEngine},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Stride-Tracker API");

    // Initialize the activity/user stores
    let db = Db::new();

    // Initialize the follower hub and tracking engine
    let hub = Arc::new(FollowerHub::new(Duration::from_secs(
        config.hub_grace_seconds,
    )));
    let engine = TrackingEngine::new(db.clone(), hub.clone(), config.default_body_mass_kg);
    tracing::info!("Tracking engine initialized");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        hub,
        engine,
    });

    // Build router
    let app = stride_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stride_tracker=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
