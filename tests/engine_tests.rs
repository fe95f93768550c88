// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tracking engine concurrency and lifecycle tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use stride_tracker::db::Db;
use stride_tracker::error::AppError;
use stride_tracker::models::{ActivityType, LocationSample};
use stride_tracker::services::{FollowerHub, TrackingEngine};

fn test_engine() -> (TrackingEngine, Db, Arc<FollowerHub>) {
    let db = Db::new();
    let hub = Arc::new(FollowerHub::new(Duration::ZERO));
    let engine = TrackingEngine::new(db.clone(), hub.clone(), 70.0);
    (engine, db, hub)
}

fn sample_at(lat: f64, lon: f64, seconds: i64) -> LocationSample {
    LocationSample {
        latitude: lat,
        longitude: lon,
        altitude: None,
        timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
            + chrono::Duration::seconds(seconds),
        heart_rate: None,
        cadence: None,
        speed: None,
    }
}

#[tokio::test]
async fn test_racing_starts_have_exactly_one_winner() {
    let (engine, _db, _hub) = test_engine();

    let mut handles = vec![];
    for i in 0..8u64 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .start(
                    77,
                    ActivityType::Running,
                    None,
                    sample_at(41.0, 2.0 + i as f64 * 0.001, 0),
                )
                .await
        }));
    }

    let mut winners = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.expect("task join failed") {
            Ok(_) => winners += 1,
            Err(AppError::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners, 1, "exactly one start must win");
    assert_eq!(conflicts, 7);

    // The winner's session is the active one
    assert!(engine.get_active(77).await.is_ok());
}

#[tokio::test]
async fn test_update_unknown_session_is_not_found() {
    let (engine, _db, _hub) = test_engine();

    let err = engine
        .update_location(uuid::Uuid::new_v4(), 1, sample_at(41.0, 2.0, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_metrics_accumulate_across_updates() {
    let (engine, _db, _hub) = test_engine();

    let summary = engine
        .start(1, ActivityType::Running, None, sample_at(41.0, 2.0, 0))
        .await
        .unwrap();

    let first = engine
        .update_location(summary.id, 1, sample_at(41.0009, 2.0, 30))
        .await
        .unwrap();
    let second = engine
        .update_location(summary.id, 1, sample_at(41.0018, 2.0, 60))
        .await
        .unwrap();

    assert!(first.distance_meters < second.distance_meters);
    assert!((second.distance_meters - 200.0).abs() < 2.0);
    assert_eq!(second.sample_count, 3);
}

#[tokio::test]
async fn test_finish_materializes_and_updates_totals() {
    let (engine, db, _hub) = test_engine();

    let summary = engine
        .start(9, ActivityType::Cycling, None, sample_at(41.0, 2.0, 0))
        .await
        .unwrap();
    engine
        .update_location(summary.id, 9, sample_at(41.0045, 2.0, 60))
        .await
        .unwrap();

    let outcome = engine.finish(summary.id, 9).await.unwrap();
    assert!(outcome.materialization_error.is_none());
    let activity = outcome.activity.expect("materialized activity");
    assert_eq!(activity.owner_id, 9);
    assert_eq!(activity.route.len(), 2);

    let profile = db.get_user(9).await.unwrap().expect("profile created");
    assert!(profile.total_distance_meters > 400.0);

    // The session is gone afterwards
    assert!(matches!(
        engine.get_active(9).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        engine.finish(summary.id, 9).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_finish_with_offline_store_still_completes() {
    let hub = Arc::new(FollowerHub::new(Duration::ZERO));
    let engine = TrackingEngine::new(Db::new_offline(), hub.clone(), 70.0);

    let summary = engine
        .start(5, ActivityType::Walking, None, sample_at(41.0, 2.0, 0))
        .await
        .unwrap();

    let outcome = engine.finish(summary.id, 5).await.unwrap();
    assert!(outcome.activity.is_none());
    assert!(outcome.materialization_error.is_some());

    // Completion released the owner slot despite the failure
    assert!(engine
        .start(5, ActivityType::Walking, None, sample_at(41.0, 2.0, 0))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_followers_receive_engine_events_in_order() {
    let (engine, _db, hub) = test_engine();

    let summary = engine
        .start(3, ActivityType::Running, None, sample_at(41.0, 2.0, 0))
        .await
        .unwrap();

    let mut events = hub.join(summary.id, uuid::Uuid::new_v4(), 42).unwrap();

    engine
        .update_location(summary.id, 3, sample_at(41.0009, 2.0, 10))
        .await
        .unwrap();
    engine.pause(summary.id, 3).await.unwrap();
    engine.resume(summary.id, 3).await.unwrap();
    engine.finish(summary.id, 3).await.unwrap();

    let mut kinds = vec![];
    while let Some(event) = events.recv().await {
        kinds.push(serde_json::to_value(&event).unwrap()["type"]
            .as_str()
            .unwrap()
            .to_string());
    }

    assert_eq!(
        kinds,
        vec![
            "location_update",
            "activity_paused",
            "activity_resumed",
            "activity_finished",
        ]
    );
}

#[tokio::test]
async fn test_cancel_broadcasts_and_discards() {
    let (engine, db, hub) = test_engine();

    let summary = engine
        .start(4, ActivityType::Hiking, None, sample_at(41.0, 2.0, 0))
        .await
        .unwrap();
    let mut events = hub.join(summary.id, uuid::Uuid::new_v4(), 99).unwrap();

    engine.cancel(summary.id, 4).await.unwrap();

    let event = events.recv().await.expect("cancellation event");
    assert_eq!(
        serde_json::to_value(&event).unwrap()["type"],
        "activity_cancelled"
    );

    assert!(db.get_activities_for_user(4).await.unwrap().is_empty());
    assert!(matches!(
        engine.get_active(4).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_milestone_event_emitted_on_km_crossing() {
    let (engine, _db, hub) = test_engine();

    let summary = engine
        .start(6, ActivityType::Running, None, sample_at(41.0, 2.0, 0))
        .await
        .unwrap();
    let mut events = hub.join(summary.id, uuid::Uuid::new_v4(), 7).unwrap();

    // Ten ~100m steps; the tenth crosses 1km within tolerance
    for i in 1..=10 {
        engine
            .update_location(
                summary.id,
                6,
                sample_at(41.0 + 0.0009 * i as f64, 2.0, i * 30),
            )
            .await
            .unwrap();
    }

    let mut saw_milestone = false;
    for _ in 0..11 {
        let event = events.recv().await.expect("event stream");
        let wire = serde_json::to_value(&event).unwrap();
        if wire["type"] == "milestone_reached" {
            assert_eq!(wire["payload"]["kind"], "distance");
            assert_eq!(wire["payload"]["kilometers"], 1);
            saw_milestone = true;
        }
    }
    assert!(saw_milestone, "expected a milestone_reached event");
}
