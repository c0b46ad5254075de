// Change-Broadcast Engine
// Fans out one reload notice per committed booking change to connected calendar clients

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error};

use crate::db::RedisPool;
use crate::models::ReloadEvent;

/// Subscriber group every booking change is published to
pub const BOOKING_EVENTS_GROUP: &str = "events.booking";

#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A pub/sub transport that delivers JSON messages to a named group
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, group: &str, message: &Value) -> Result<(), BroadcastError>;
}

/// The reload message connected clients expect for one changed booking
pub fn reload_message(event: &ReloadEvent) -> Value {
    json!({
        "type": "booking.message",
        "message": {
            "actionName": "reload",
            "result": {
                "status": true,
                "message": "",
                "content": {
                    "id": event.id,
                    "year": event.year,
                    "month": event.month,
                },
            },
        },
    })
}

/// Publishes reload notices after commit.
///
/// Notices are queued to a spawned publishing task, so a slow transport never
/// holds up the request that committed the change. Transport failures are
/// logged there and never reach the caller.
#[derive(Clone, Default)]
pub struct ChangeBroadcaster {
    queue: Option<mpsc::UnboundedSender<ReloadEvent>>,
}

impl ChangeBroadcaster {
    /// Spawns the publishing task; call from within a tokio runtime
    pub fn new(transport: Arc<dyn Broadcaster>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ReloadEvent>();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let message = reload_message(&event);
                match transport.publish(BOOKING_EVENTS_GROUP, &message).await {
                    Ok(()) => debug!("Broadcast reload for booking {}", event.id),
                    Err(e) => error!("Dropping reload notice for booking {}: {}", event.id, e),
                }
            }
            debug!("Reload publisher stopped");
        });

        Self { queue: Some(tx) }
    }

    /// A broadcaster with no transport configured
    pub fn disabled() -> Self {
        Self { queue: None }
    }

    /// Queue one notice per distinct booking; returns without waiting on the transport
    pub fn broadcast(&self, events: &[ReloadEvent]) {
        let Some(queue) = &self.queue else {
            return;
        };

        let mut sent: Vec<ReloadEvent> = Vec::with_capacity(events.len());
        for event in events {
            if sent.contains(event) {
                continue;
            }
            sent.push(*event);

            if let Err(e) = queue.send(*event) {
                error!("Failed to queue reload notice for booking {}: {}", event.id, e);
            }
        }
    }
}

/// Redis pub/sub transport; the group name is the channel
#[derive(Clone)]
pub struct RedisBroadcaster {
    redis_pool: RedisPool,
}

impl RedisBroadcaster {
    pub fn new(redis_pool: RedisPool) -> Self {
        Self { redis_pool }
    }
}

#[async_trait]
impl Broadcaster for RedisBroadcaster {
    async fn publish(&self, group: &str, message: &Value) -> Result<(), BroadcastError> {
        let payload = serde_json::to_string(message)
            .map_err(|e| BroadcastError::Serialization(e.to_string()))?;
        self.redis_pool
            .publish(group, payload)
            .await
            .map_err(|e| BroadcastError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// In-process transport over a tokio broadcast channel.
///
/// Used when the calendar clients live in the same process, and by tests.
#[derive(Clone)]
pub struct LocalBroadcaster {
    sender: broadcast::Sender<(String, Value)>,
}

impl LocalBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(String, Value)> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl Broadcaster for LocalBroadcaster {
    async fn publish(&self, group: &str, message: &Value) -> Result<(), BroadcastError> {
        // No live subscriber is not an error for a fan-out channel
        let _ = self.sender.send((group.to_string(), message.clone()));
        Ok(())
    }
}
