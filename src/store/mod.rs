//! Session persistence
//!
//! The store is a plain key-value surface over sessions: `put` overwrites
//! (last-writer-wins, never merges), `get` returns the record or absence,
//! `delete` is idempotent. No multi-key operations — the engine never
//! touches two sessions atomically.

use async_trait::async_trait;
use thiserror::Error;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::domain::Session;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record for {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Durable key-value persistence of sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Overwrite any existing record for `session.id`
    async fn put(&self, session: &Session) -> Result<(), StoreError>;

    /// Fetch a session; `None` when absent (or expired, for TTL stores)
    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// Remove a session; no error if absent
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}
