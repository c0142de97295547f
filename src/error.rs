//! Engine error taxonomy
//!
//! Client-input errors (NotFound, Forbidden, InvalidState) surface directly
//! and are never retried. Transient-infrastructure errors (Provider, Store)
//! carry the session's last-known-good stage so a caller can retry
//! `continue` without data loss. The engine itself never retries.

use thiserror::Error;

use crate::domain::Stage;
use crate::provider::ProviderError;
use crate::store::StoreError;

/// Errors surfaced by the orchestrator and state machine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session {session_id} does not belong to the caller")]
    Forbidden { session_id: String },

    #[error("session is {stage}; no further transitions accepted")]
    InvalidState { stage: Stage },

    #[error("provider failure at stage {stage}: {source}")]
    Provider {
        stage: Stage,
        #[source]
        source: ProviderError,
    },

    #[error("store failure: {source}")]
    Store {
        stage: Option<Stage>,
        #[source]
        source: StoreError,
    },
}

impl EngineError {
    /// The session's last-known-good stage, where one exists
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EngineError::NotFound(_) | EngineError::Forbidden { .. } => None,
            EngineError::InvalidState { stage } => Some(*stage),
            EngineError::Provider { stage, .. } => Some(*stage),
            EngineError::Store { stage, .. } => *stage,
        }
    }

    /// Client-input errors are final; infrastructure errors may be retried
    /// by the caller.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound(_) | EngineError::Forbidden { .. } | EngineError::InvalidState { .. }
        )
    }
}
