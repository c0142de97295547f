//! File-backed session store
//!
//! One pretty-printed JSON document per session under a base directory.
//! Writes go to a temp file first and are renamed into place, so a reader
//! never observes a partially written record.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{SessionStore, StoreError};
use crate::domain::Session;

/// Session store persisting each session as `{id}.json`
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Open or create a store at the given directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = path.as_ref().to_path_buf();
        debug!(path = %base_path.display(), "FileStore::open: called");
        fs::create_dir_all(&base_path).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self { base_path })
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", id))
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn put(&self, session: &Session) -> Result<(), StoreError> {
        debug!(session_id = %session.id, "FileStore::put: called");
        let content =
            serde_json::to_vec_pretty(session).map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let path = self.session_path(&session.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        debug!(%id, "FileStore::get: called");
        let path = self.session_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Unavailable(e.to_string())),
        };

        let session = serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(session))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        debug!(%id, "FileStore::delete: called");
        match fs::remove_file(self.session_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }
}
