use super::{Session, SessionStore};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Process-local session store. Everything is lost on restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, sender: &str, now: DateTime<Utc>) -> Session {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(sender.to_string()).or_insert_with(|| {
            debug!(sender = %sender, "Creating session");
            Session::new(now)
        });
        session.last_active_at = now;
        session.clone()
    }

    async fn get(&self, sender: &str) -> Option<Session> {
        self.sessions.read().await.get(sender).cloned()
    }

    async fn put(&self, sender: &str, session: Session) {
        self.sessions
            .write()
            .await
            .insert(sender.to_string(), session);
    }

    async fn touch(&self, sender: &str, now: DateTime<Utc>) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(sender) else {
            return false;
        };
        session.last_active_at = now;
        true
    }

    async fn sweep_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now, ttl));
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "Swept expired sessions");
        }
        evicted
    }

    async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentKind, Stage};

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
    }

    #[tokio::test]
    async fn test_get_or_create_stamps_activity() {
        let store = InMemorySessionStore::new();

        let created = store.get_or_create("+1555", t0()).await;
        assert_eq!(created.last_active_at, t0());
        assert!(created.active_agent.is_none());

        let later = t0() + TimeDelta::minutes(5);
        let loaded = store.get_or_create("+1555", later).await;
        assert_eq!(loaded.last_active_at, later);
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_put_replaces_session() {
        let store = InMemorySessionStore::new();
        let mut session = store.get_or_create("+1555", t0()).await;
        session.active_agent = Some(AgentKind::Coach);
        session.engage(AgentKind::Coach).stage = Stage::Suggesting;
        store.put("+1555", session.clone()).await;

        assert_eq!(store.get("+1555").await, Some(session));
    }

    #[tokio::test]
    async fn test_touch_missing_session() {
        let store = InMemorySessionStore::new();
        assert!(!store.touch("+1555", t0()).await);
        store.get_or_create("+1555", t0()).await;
        assert!(store.touch("+1555", t0() + TimeDelta::hours(1)).await);
        assert_eq!(
            store.get("+1555").await.map(|s| s.last_active_at),
            Some(t0() + TimeDelta::hours(1))
        );
    }

    #[tokio::test]
    async fn test_sweep_evicts_idle_sessions_only() {
        let store = InMemorySessionStore::new();
        let ttl = TimeDelta::hours(12);
        store.get_or_create("+idle", t0()).await;
        store.get_or_create("+busy", t0() + TimeDelta::hours(6)).await;

        let evicted = store
            .sweep_expired(t0() + ttl + TimeDelta::seconds(1), ttl)
            .await;
        assert_eq!(evicted, 1);
        assert!(store.get("+idle").await.is_none());
        assert!(store.get("+busy").await.is_some());
    }
}
