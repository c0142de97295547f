//! Capability provider boundary
//!
//! The engine delegates all text generation to a `CapabilityProvider`.
//! Requests carry a rendered instruction plus the prior conversation turns;
//! replies are untrusted text that the caller parses and validates.

use async_trait::async_trait;

mod anthropic;
mod error;

pub use anthropic::AnthropicProvider;
pub use error::ProviderError;

use crate::domain::{Role, Session};

/// A generation request: everything needed for one provider call
#[derive(Debug, Clone)]
pub struct StructuredPrompt {
    /// Role/instruction text (rendered from a prompt template)
    pub instruction: String,

    /// Prior conversation turns, oldest first
    pub turns: Vec<PromptTurn>,

    /// Max tokens for the reply
    pub max_tokens: u32,
}

impl StructuredPrompt {
    /// Create a prompt with no prior turns
    pub fn new(instruction: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            instruction: instruction.into(),
            turns: Vec::new(),
            max_tokens,
        }
    }

    /// Create a prompt carrying a session's conversation history
    pub fn with_history(instruction: impl Into<String>, session: &Session, max_tokens: u32) -> Self {
        Self {
            instruction: instruction.into(),
            turns: session
                .history
                .iter()
                .map(|turn| PromptTurn {
                    role: turn.role,
                    content: turn.content.clone(),
                })
                .collect(),
            max_tokens,
        }
    }
}

/// One prior turn in a generation request
#[derive(Debug, Clone)]
pub struct PromptTurn {
    pub role: Role,
    pub content: String,
}

/// Generated text returned by a provider
#[derive(Debug, Clone)]
pub struct GeneratedContent {
    pub text: String,
}

/// Stateless text-generation backend.
///
/// Each call is independent; no conversation state is held between calls.
/// The reply is untrusted text — callers parse and validate, and treat
/// parse failure as `ProviderError::InvalidResponse`, never as a crash.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    async fn generate(&self, prompt: StructuredPrompt) -> Result<GeneratedContent, ProviderError>;
}

pub mod mock {
    //! Scripted provider for tests and embedders.
    //!
    //! Compiled unconditionally so integration tests and downstream crates
    //! can script deterministic conversations.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing::debug;

    use super::*;

    /// Provider that replays a fixed script of replies
    pub struct MockProvider {
        responses: Vec<Result<String, ProviderError>>,
        call_count: AtomicUsize,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self {
                responses: Vec::new(),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Queue a successful text reply
        pub fn with_text(mut self, text: impl Into<String>) -> Self {
            self.responses.push(Ok(text.into()));
            self
        }

        /// Queue a failure
        pub fn with_error(mut self, error: ProviderError) -> Self {
            self.responses.push(Err(error));
            self
        }

        /// How many times `generate` has been invoked
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    impl Default for MockProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl CapabilityProvider for MockProvider {
        async fn generate(&self, _prompt: StructuredPrompt) -> Result<GeneratedContent, ProviderError> {
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            debug!(%idx, "MockProvider::generate: called");
            match self.responses.get(idx) {
                Some(Ok(text)) => Ok(GeneratedContent { text: text.clone() }),
                Some(Err(error)) => Err(error.clone()),
                None => Err(ProviderError::InvalidResponse(
                    "no scripted response left".to_string(),
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockProvider;
    use super::*;
    use crate::domain::{Session, Turn};

    #[tokio::test]
    async fn test_mock_provider_replays_script() {
        let provider = MockProvider::new()
            .with_text("first")
            .with_error(ProviderError::Unavailable("down".to_string()));

        let reply = provider
            .generate(StructuredPrompt::new("instr", 100))
            .await
            .unwrap();
        assert_eq!(reply.text, "first");

        let err = provider
            .generate(StructuredPrompt::new("instr", 100))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_provider_exhausted_script() {
        let provider = MockProvider::new();
        let err = provider
            .generate(StructuredPrompt::new("instr", 100))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_prompt_with_history_copies_turns() {
        let mut session = Session::new("u1", "test");
        session.push_turn(Turn::user("hello"));
        session.push_turn(Turn::assistant("A question?"));

        let prompt = StructuredPrompt::with_history("instr", &session, 256);
        assert_eq!(prompt.turns.len(), 2);
        assert_eq!(prompt.turns[0].role, Role::User);
        assert_eq!(prompt.turns[1].content, "A question?");
    }
}
