//! Session orchestrator
//!
//! Public-facing operations composing the state machine with the store and
//! provider. Guarantees:
//!
//! - per-session serialization: an exclusive async lock per session id is
//!   held across the whole read-modify-write, provider await included, so
//!   two concurrent continues can never interleave their updates
//! - idempotent replay: a `continue` whose payload hashes to the last
//!   applied input returns the persisted view without touching the provider
//! - atomic transitions: the session is persisted with a single `put` after
//!   the transition fully succeeds, or not at all
//!
//! Sessions never lock against each other.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::domain::{Session, SessionView, WorkingMemory, canonical_responses};
use crate::engine::RefinementMachine;
use crate::error::EngineError;
use crate::store::SessionStore;

/// Public operations over refinement sessions
pub struct SessionOrchestrator {
    store: Arc<dyn SessionStore>,
    machine: RefinementMachine,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionOrchestrator {
    /// Assemble an orchestrator from its collaborators.
    ///
    /// Lifecycle of the store and the machine's provider belongs to the
    /// process doing the assembling; the orchestrator only borrows them
    /// through these handles.
    pub fn new(store: Arc<dyn SessionStore>, machine: RefinementMachine) -> Self {
        Self {
            store,
            machine,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create a session and generate its initial clarifying questions
    pub async fn start(
        &self,
        owner_id: &str,
        initial_request: &str,
        seed: Option<WorkingMemory>,
    ) -> Result<SessionView, EngineError> {
        debug!(%owner_id, "start: called");
        let mut session = Session::new(owner_id, initial_request);

        self.machine.begin(&mut session, initial_request, seed).await?;

        self.store.put(&session).await.map_err(|source| EngineError::Store {
            stage: Some(session.stage),
            source,
        })?;

        info!(session_id = %session.id, %owner_id, "session created");
        Ok(session.view())
    }

    /// Apply one continue transition to an existing session
    pub async fn continue_session(
        &self,
        owner_id: &str,
        session_id: &str,
        responses: &BTreeMap<String, String>,
    ) -> Result<SessionView, EngineError> {
        debug!(%session_id, "continue_session: called");
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        let session = self
            .store
            .get(session_id)
            .await
            .map_err(|source| EngineError::Store { stage: None, source })?
            .ok_or_else(|| EngineError::NotFound(session_id.to_string()))?;

        if session.owner_id != owner_id {
            debug!(%session_id, "continue_session: owner mismatch");
            return Err(EngineError::Forbidden {
                session_id: session_id.to_string(),
            });
        }

        // Replay of the last accepted payload: return the persisted result
        // without re-invoking the provider. Checked before the terminal
        // guard so replaying the final confirmation stays idempotent.
        let input_hash = hash_responses(responses);
        if session.last_applied.as_deref() == Some(input_hash.as_str()) {
            info!(%session_id, "continue_session: idempotent replay");
            return Ok(session.view());
        }

        // Work on a copy; the stored record stays untouched unless the
        // whole transition succeeds.
        let mut updated = session.clone();
        self.machine.advance(&mut updated, responses).await?;
        updated.last_applied = Some(input_hash);

        self.store.put(&updated).await.map_err(|source| EngineError::Store {
            stage: Some(session.stage),
            source,
        })?;

        debug!(%session_id, stage = %updated.stage, "continue_session: transition persisted");
        Ok(updated.view())
    }

    /// Read-only view of a session; no mutation, no provider call
    pub async fn get_status(&self, session_id: &str) -> Result<SessionView, EngineError> {
        debug!(%session_id, "get_status: called");
        let session = self
            .store
            .get(session_id)
            .await
            .map_err(|source| EngineError::Store { stage: None, source })?
            .ok_or_else(|| EngineError::NotFound(session_id.to_string()))?;

        Ok(session.view())
    }

    /// Fetch the per-session lock, creating it on first use
    fn lock_for(&self, session_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("session lock map poisoned");
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

/// SHA-256 hex of the canonical responses encoding
fn hash_responses(responses: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_responses(responses).as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}
