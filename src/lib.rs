//! refiner - Session-Driven Document-Refinement Engine
//!
//! refiner turns a vague request into a structured artifact through a
//! multi-turn clarification conversation. A typed state machine drives each
//! session through Clarification → Analysis → ReadyForOutput → Complete,
//! asking a text-generation provider for clarifying questions until a
//! pluggable readiness policy is satisfied, then asking it once more to
//! synthesize the final output.
//!
//! # Core Concepts
//!
//! - **Sessions Are Records**: all conversation state lives in a serde
//!   `Session` document; the engine holds nothing in memory between calls
//! - **One Writer Per Session**: a per-session lock serializes continues;
//!   different sessions never contend
//! - **All-Or-Nothing Transitions**: a session is persisted only after a
//!   transition fully succeeds, so a provider failure leaves it resumable
//! - **Untrusted Provider Output**: replies are parsed and validated;
//!   malformed output is a typed error, never a crash
//!
//! # Modules
//!
//! - [`domain`] - Session, Stage, Artifact, and view types
//! - [`engine`] - Refinement state machine and readiness policies
//! - [`orchestrator`] - Public start/continue/status operations
//! - [`store`] - Session persistence (memory and file backends)
//! - [`provider`] - Capability provider trait and Anthropic adapter
//! - [`prompts`] - Prompt templates and rendering
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod prompts;
pub mod provider;
pub mod store;

// Re-export commonly used types
pub use config::{Config, EngineConfig, ProviderConfig, ReadinessConfig, StorageConfig};
pub use domain::{Artifact, Role, Session, SessionView, Stage, Turn, WorkingMemory};
pub use engine::{MinAnswered, ReadinessPredicate, RefinementMachine, RequiredFields, readiness_from_config};
pub use error::EngineError;
pub use orchestrator::SessionOrchestrator;
pub use prompts::PromptLoader;
pub use provider::{AnthropicProvider, CapabilityProvider, GeneratedContent, ProviderError, StructuredPrompt};
pub use store::{FileStore, MemoryStore, SessionStore, StoreError};
