//! In-memory session store
//!
//! Reference implementation for tests and embedding. Optional TTL: expired
//! records behave as absent and are dropped on the access that notices.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{SessionStore, StoreError};
use crate::domain::Session;

struct Entry {
    session: Session,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-process session store backed by a RwLock'd map
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Option<Duration>,
}

impl MemoryStore {
    /// Create a store whose records never expire
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: None,
        }
    }

    /// Create a store whose records expire `ttl` after their last write
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put(&self, session: &Session) -> Result<(), StoreError> {
        debug!(session_id = %session.id, "MemoryStore::put: called");
        let entry = Entry {
            session: session.clone(),
            expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().await.insert(session.id.clone(), entry);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        debug!(%id, "MemoryStore::get: called");
        {
            let entries = self.entries.read().await;
            match entries.get(id) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.session.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: drop the record so the map does not grow unbounded
        debug!(%id, "MemoryStore::get: record expired, dropping");
        let mut entries = self.entries.write().await;
        if entries.get(id).is_some_and(Entry::is_expired) {
            entries.remove(id);
        }
        Ok(None)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        debug!(%id, "MemoryStore::delete: called");
        self.entries.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        let session = Session::new("u1", "test request");
        let id = session.id.clone();

        store.put(&session).await.unwrap();
        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.owner_id, "u1");

        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());

        // Delete is idempotent
        store.delete(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryStore::new();
        let mut session = Session::new("u1", "test request");
        store.put(&session).await.unwrap();

        session.pending_questions.push("How often?".to_string());
        store.put(&session).await.unwrap();

        let loaded = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.pending_questions.len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = MemoryStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = MemoryStore::with_ttl(Duration::from_millis(20));
        let session = Session::new("u1", "test request");
        store.put(&session).await.unwrap();

        assert!(store.get(&session.id).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_refreshed_on_put() {
        let store = MemoryStore::with_ttl(Duration::from_millis(50));
        let session = Session::new("u1", "test request");
        store.put(&session).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        store.put(&session).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // 60ms after the first put but only 30ms after the second
        assert!(store.get(&session.id).await.unwrap().is_some());
    }
}
