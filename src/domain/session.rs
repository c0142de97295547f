//! Session record and view types
//!
//! A `Session` is the unit of conversation state: one refinement instance
//! identified by an opaque id, owned by a single principal, advancing
//! through the stage progression until it produces an artifact.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::artifact::Artifact;
use super::id::generate_id;

/// Accumulated context for a session, opaque to the state machine
/// beyond pass-through and the readiness predicate.
pub type WorkingMemory = BTreeMap<String, Value>;

/// Key under which the initial request is seeded into working memory
pub const INITIAL_REQUEST_KEY: &str = "initial_request";

/// Position in the refinement progression.
///
/// Ordering follows declaration order, so stage monotonicity is a plain
/// `>=` comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Gathering answers to clarifying questions
    #[default]
    Clarification,
    /// Merging answers and evaluating readiness (in-flight during a continue)
    Analysis,
    /// Enough context gathered, awaiting confirmation to synthesize
    ReadyForOutput,
    /// Artifact produced, terminal
    Complete,
}

impl Stage {
    /// Terminal sessions reject every further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Complete)
    }

    /// True while the session is still collecting clarification answers
    pub fn is_clarifying(&self) -> bool {
        matches!(self, Stage::Clarification | Stage::Analysis)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clarification => write!(f, "clarification"),
            Self::Analysis => write!(f, "analysis"),
            Self::ReadyForOutput => write!(f, "ready_for_output"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Turn author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the append-only conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a user turn stamped now
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create an assistant turn stamped now
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One conversational refinement instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque unique identifier, immutable
    pub id: String,

    /// Requesting principal, immutable
    pub owner_id: String,

    /// Current position in the progression
    pub stage: Stage,

    /// Append-only conversation history
    pub history: Vec<Turn>,

    /// Accumulated context (the source's "vault memory")
    pub working_memory: WorkingMemory,

    /// Questions awaiting answers; empty past Clarification
    pub pending_questions: Vec<String>,

    /// Final artifact, set iff `stage == Complete`
    pub result: Option<Artifact>,

    /// SHA-256 hex of the last accepted responses payload, for replay detection
    pub last_applied: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session in Clarification with an empty history
    pub fn new(owner_id: impl Into<String>, initial_request: &str) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(initial_request),
            owner_id: owner_id.into(),
            stage: Stage::Clarification,
            history: Vec::new(),
            working_memory: WorkingMemory::new(),
            pending_questions: Vec::new(),
            result: None,
            last_applied: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at`
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a turn and bump `updated_at`
    pub fn push_turn(&mut self, turn: Turn) {
        self.history.push(turn);
        self.touch();
    }

    /// Every question the assistant has asked so far, one line per question.
    ///
    /// Question generation filters its candidates against this list so a
    /// session never gets asked the same thing twice.
    pub fn asked_questions(&self) -> Vec<String> {
        self.history
            .iter()
            .filter(|turn| turn.role == Role::Assistant)
            .flat_map(|turn| turn.content.lines())
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Check the structural invariants the engine maintains
    pub fn invariants_hold(&self) -> bool {
        let result_matches_stage = self.result.is_some() == (self.stage == Stage::Complete);
        let questions_cleared = self.pending_questions.is_empty()
            || !matches!(self.stage, Stage::ReadyForOutput | Stage::Complete);
        result_matches_stage && questions_cleared
    }

    /// The caller-facing projection of this session
    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id.clone(),
            stage: self.stage,
            pending_questions: self.pending_questions.clone(),
            result: self.result.clone(),
        }
    }
}

/// Projection of a session returned to external callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub stage: Stage,
    pub pending_questions: Vec<String>,
    pub result: Option<Artifact>,
}

/// Canonical encoding of a responses payload.
///
/// `BTreeMap` iteration is key-ordered, so the encoding is deterministic;
/// both the history record and the replay hash are derived from it.
pub fn canonical_responses(responses: &BTreeMap<String, String>) -> String {
    serde_json::to_string(responses).unwrap_or_default()
}
