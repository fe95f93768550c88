// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Follower pub/sub hub.
//!
//! Routes ephemeral events to the connections following a live activity.
//! Delivery is fire-and-forget through per-connection unbounded channels:
//! a slow or dead connection never blocks the publisher or other
//! followers. Nothing here is persisted; the registry lives and dies with
//! the process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::AppError;
use crate::models::{EventKind, LiveEvent};

/// One registered follower of an activity.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FollowerInfo {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub user_id: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub connection_id: Uuid,
}

struct Subscriber {
    user_id: u64,
    sender: mpsc::UnboundedSender<LiveEvent>,
}

struct Channel {
    /// Set at teardown; joins are refused from then on.
    closed: AtomicBool,
    subscribers: DashMap<Uuid, Subscriber>,
}

impl Channel {
    fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            subscribers: DashMap::new(),
        }
    }
}

/// Pub/sub registry mapping an activity id to its follower connections.
pub struct FollowerHub {
    channels: DashMap<Uuid, Arc<Channel>>,
    /// How long a torn-down channel lingers so in-flight terminal events
    /// can drain.
    grace: Duration,
}

impl FollowerHub {
    pub fn new(grace: Duration) -> Self {
        Self {
            channels: DashMap::new(),
            grace,
        }
    }

    /// Create the channel for a newly started activity. Idempotent.
    pub fn open(&self, activity_id: Uuid) {
        self.channels
            .entry(activity_id)
            .or_insert_with(|| Arc::new(Channel::new()));
    }

    /// Whether an activity currently has a live channel.
    pub fn contains(&self, activity_id: Uuid) -> bool {
        self.channels
            .get(&activity_id)
            .map(|c| !c.closed.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Register a connection under the activity's subscriber set and hand
    /// back its event stream.
    ///
    /// Re-joining with the same connection id replaces the previous
    /// registration, so a connection never receives duplicates. Joining an
    /// unknown or torn-down activity fails with `NotFound`.
    pub fn join(
        &self,
        activity_id: Uuid,
        connection_id: Uuid,
        user_id: u64,
    ) -> Result<mpsc::UnboundedReceiver<LiveEvent>, AppError> {
        let channel = self
            .channels
            .get(&activity_id)
            .map(|c| c.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("live activity {} not found", activity_id)))?;

        if channel.closed.load(Ordering::Acquire) {
            return Err(AppError::NotFound(format!(
                "live activity {} has ended",
                activity_id
            )));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        channel
            .subscribers
            .insert(connection_id, Subscriber { user_id, sender });
        tracing::debug!(%activity_id, %connection_id, user_id, "Follower joined");
        Ok(receiver)
    }

    /// Remove a connection. No-op if it was never registered.
    pub fn leave(&self, activity_id: Uuid, connection_id: Uuid) {
        if let Some(channel) = self.channels.get(&activity_id) {
            if channel.subscribers.remove(&connection_id).is_some() {
                tracing::debug!(%activity_id, %connection_id, "Follower left");
            }
        }
    }

    /// Deliver an event to every follower of the activity, best-effort.
    ///
    /// Connections whose receiving task has gone away are dropped from the
    /// set. Publishing to an unknown activity is silently ignored.
    pub fn publish(&self, activity_id: Uuid, kind: EventKind, payload: serde_json::Value) {
        let Some(channel) = self.channels.get(&activity_id).map(|c| c.value().clone()) else {
            tracing::debug!(%activity_id, ?kind, "Publish to unknown activity ignored");
            return;
        };

        let event = LiveEvent::new(kind, activity_id, payload);

        let mut dead = Vec::new();
        for subscriber in channel.subscribers.iter() {
            if subscriber.sender.send(event.clone()).is_err() {
                dead.push(*subscriber.key());
            }
        }
        // Removal happens outside the iteration to avoid holding shard
        // locks while mutating.
        for connection_id in dead {
            channel.subscribers.remove(&connection_id);
            tracing::debug!(%activity_id, %connection_id, "Dropped dead follower connection");
        }
    }

    /// Snapshot of the activity's current followers.
    pub fn subscribers(&self, activity_id: Uuid) -> Result<Vec<FollowerInfo>, AppError> {
        let channel = self
            .channels
            .get(&activity_id)
            .map(|c| c.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("live activity {} not found", activity_id)))?;

        Ok(channel
            .subscribers
            .iter()
            .map(|s| FollowerInfo {
                user_id: s.user_id,
                connection_id: *s.key(),
            })
            .collect())
    }

    /// Close the channel to new joins immediately, then forget it after the
    /// grace delay so in-flight terminal events can still drain.
    pub fn teardown(self: &Arc<Self>, activity_id: Uuid) {
        let Some(channel) = self.channels.get(&activity_id).map(|c| c.value().clone()) else {
            return;
        };
        channel.closed.store(true, Ordering::Release);

        let hub = Arc::clone(self);
        let grace = self.grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            hub.channels.remove(&activity_id);
            tracing::debug!(%activity_id, "Follower channel removed");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_requires_open_channel() {
        let hub = Arc::new(FollowerHub::new(Duration::ZERO));
        let activity = Uuid::new_v4();

        let err = hub.join(activity, Uuid::new_v4(), 1).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        hub.open(activity);
        assert!(hub.join(activity, Uuid::new_v4(), 1).is_ok());
    }

    #[tokio::test]
    async fn test_publish_drops_dead_connections() {
        let hub = Arc::new(FollowerHub::new(Duration::ZERO));
        let activity = Uuid::new_v4();
        hub.open(activity);

        let alive = Uuid::new_v4();
        let dead = Uuid::new_v4();
        let mut rx = hub.join(activity, alive, 1).unwrap();
        let rx_dead = hub.join(activity, dead, 2).unwrap();
        drop(rx_dead);

        hub.publish(activity, EventKind::LocationUpdate, serde_json::json!({}));

        assert!(rx.recv().await.is_some());
        let followers = hub.subscribers(activity).unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].connection_id, alive);
    }
}
