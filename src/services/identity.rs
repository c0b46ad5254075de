// Session directory
// Maps an opaque session identifier to a resolved actor

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::db::RedisPool;
use crate::models::Actor;
use crate::utils::{BookingError, BookingResult};

const SESSION_KEY_PREFIX: &str = "session:";

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// The actor behind a session; unknown or expired sessions resolve to a guest
    async fn resolve(&self, session_id: &str) -> BookingResult<Actor>;

    /// Bind an actor to a session, e.g. after a guest is promoted
    async fn remember(&self, session_id: &str, actor: &Actor) -> BookingResult<()>;
}

/// Sessions stored as JSON under `session:{id}` with a sliding TTL
#[derive(Clone)]
pub struct RedisSessionResolver {
    redis_pool: RedisPool,
    ttl_seconds: u64,
}

impl RedisSessionResolver {
    pub fn new(redis_pool: RedisPool, ttl_seconds: u64) -> Self {
        Self {
            redis_pool,
            ttl_seconds,
        }
    }

    fn key(session_id: &str) -> String {
        format!("{}{}", SESSION_KEY_PREFIX, session_id)
    }
}

#[async_trait]
impl IdentityResolver for RedisSessionResolver {
    #[instrument(skip(self, session_id))]
    async fn resolve(&self, session_id: &str) -> BookingResult<Actor> {
        let key = Self::key(session_id);
        let Some(raw) = self.redis_pool.get(&key).await? else {
            debug!("Unknown session, treating caller as guest");
            return Ok(Actor::guest());
        };

        match serde_json::from_str::<Actor>(&raw) {
            Ok(actor) => {
                self.redis_pool.expire(&key, self.ttl_seconds).await?;
                Ok(actor)
            },
            Err(e) => {
                warn!("Discarding unreadable session: {}", e);
                self.redis_pool.del(&key).await?;
                Ok(Actor::guest())
            },
        }
    }

    async fn remember(&self, session_id: &str, actor: &Actor) -> BookingResult<()> {
        let payload = serde_json::to_string(actor)?;
        self.redis_pool
            .set_with_expiry(&Self::key(session_id), payload, self.ttl_seconds)
            .await?;
        Ok(())
    }
}

/// In-process session table
#[derive(Clone, Default)]
pub struct StaticIdentityResolver {
    sessions: Arc<RwLock<HashMap<String, Actor>>>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session_id: impl Into<String>, actor: Actor) {
        self.sessions.write().await.insert(session_id.into(), actor);
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, session_id: &str) -> BookingResult<Actor> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_else(Actor::guest))
    }

    async fn remember(&self, session_id: &str, actor: &Actor) -> BookingResult<()> {
        if session_id.is_empty() {
            return Err(BookingError::validation("session", "must not be empty"));
        }
        self.insert(session_id, actor.clone()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[tokio::test]
    async fn test_unknown_session_is_guest() {
        let resolver = StaticIdentityResolver::new();
        let actor = resolver.resolve("missing").await.unwrap();
        assert_eq!(actor, Actor::guest());
    }

    #[tokio::test]
    async fn test_remember_then_resolve() {
        let resolver = StaticIdentityResolver::new();
        let actor = Actor {
            id: Some(4),
            role: Role::Anonymous,
            email: Some("guest@example.com".into()),
            name: None,
            surname: None,
        };
        resolver.remember("abc", &actor).await.unwrap();
        assert_eq!(resolver.resolve("abc").await.unwrap(), actor);
        assert!(resolver.remember("", &actor).await.is_err());
    }

    #[test]
    fn test_session_key() {
        assert_eq!(RedisSessionResolver::key("abc"), "session:abc");
    }
}
