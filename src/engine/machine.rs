//! Refinement state machine
//!
//! Drives a session through Clarification → Analysis → ReadyForOutput →
//! Complete. The machine mutates the session it is handed and reports typed
//! errors; it never persists anything itself, so a caller that only stores
//! the session on success gets all-or-nothing transitions for free.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, info};

use super::readiness::{ReadinessPredicate, is_answered_key};
use crate::config::EngineConfig;
use crate::domain::{
    Artifact, INITIAL_REQUEST_KEY, Session, Stage, Turn, WorkingMemory, canonical_responses,
};
use crate::error::EngineError;
use crate::prompts::{ClarifyContext, ContextEntry, FollowUpContext, PromptLoader, SynthesizeContext};
use crate::provider::{CapabilityProvider, ProviderError, StructuredPrompt};

/// Token budget for question generation
const QUESTION_MAX_TOKENS: u32 = 1024;

/// Token budget for artifact synthesis
const SYNTHESIS_MAX_TOKENS: u32 = 4096;

/// Assistant line recorded when clarification ends
const READY_PROMPT: &str = "Context gathered. Confirm to generate the final output.";

/// The refinement state machine
pub struct RefinementMachine {
    provider: Arc<dyn CapabilityProvider>,
    readiness: Arc<dyn ReadinessPredicate>,
    prompts: PromptLoader,
    max_questions: usize,
    call_timeout: Duration,
}

impl RefinementMachine {
    pub fn new(
        provider: Arc<dyn CapabilityProvider>,
        readiness: Arc<dyn ReadinessPredicate>,
        prompts: PromptLoader,
        config: &EngineConfig,
    ) -> Self {
        Self {
            provider,
            readiness,
            prompts,
            max_questions: config.max_questions,
            call_timeout: Duration::from_millis(config.call_timeout_ms),
        }
    }

    /// Seed a fresh session and generate the initial clarifying questions
    pub async fn begin(
        &self,
        session: &mut Session,
        initial_request: &str,
        seed: Option<WorkingMemory>,
    ) -> Result<(), EngineError> {
        debug!(session_id = %session.id, "begin: called");

        if let Some(seed) = seed {
            session.working_memory.extend(seed);
        }
        session
            .working_memory
            .insert(INITIAL_REQUEST_KEY.to_string(), Value::String(initial_request.to_string()));
        session.push_turn(Turn::user(initial_request));

        let instruction = self.render(
            Stage::Clarification,
            "clarify",
            &ClarifyContext {
                initial_request: initial_request.to_string(),
                max_questions: self.max_questions,
            },
        )?;

        let reply = self
            .call_provider(
                Stage::Clarification,
                StructuredPrompt::with_history(instruction, session, QUESTION_MAX_TOKENS),
            )
            .await?;

        let questions = parse_questions(&reply, self.max_questions)
            .map_err(|source| EngineError::Provider {
                stage: Stage::Clarification,
                source,
            })?;

        info!(session_id = %session.id, question_count = questions.len(), "session started");
        if !questions.is_empty() {
            session.push_turn(Turn::assistant(questions.join("\n")));
        }
        session.pending_questions = questions;
        session.touch();
        Ok(())
    }

    /// Apply one continue transition
    pub async fn advance(
        &self,
        session: &mut Session,
        responses: &BTreeMap<String, String>,
    ) -> Result<(), EngineError> {
        debug!(session_id = %session.id, stage = %session.stage, "advance: called");
        match session.stage {
            Stage::Clarification | Stage::Analysis => self.advance_clarification(session, responses).await,
            Stage::ReadyForOutput => self.synthesize(session, responses).await,
            Stage::Complete => Err(EngineError::InvalidState { stage: Stage::Complete }),
        }
    }

    /// Merge answers, run the analysis step, and either ask again or
    /// advance to ReadyForOutput
    async fn advance_clarification(
        &self,
        session: &mut Session,
        responses: &BTreeMap<String, String>,
    ) -> Result<(), EngineError> {
        session.push_turn(Turn::user(canonical_responses(responses)));
        for (key, value) in responses {
            session
                .working_memory
                .insert(key.clone(), Value::String(value.clone()));
        }
        session.stage = Stage::Analysis;

        // The readiness predicate runs exactly once per continue.
        if self.readiness.is_ready(&session.working_memory) {
            debug!(session_id = %session.id, "advance_clarification: readiness met");
            finish_clarification(session);
            return Ok(());
        }

        let instruction = self.render(
            Stage::Clarification,
            "follow-up",
            &FollowUpContext {
                answered: answered_keys(&session.working_memory),
                asked: session.asked_questions(),
                max_questions: self.max_questions,
            },
        )?;

        let reply = self
            .call_provider(
                Stage::Clarification,
                StructuredPrompt::with_history(instruction, session, QUESTION_MAX_TOKENS),
            )
            .await?;

        let generated = parse_questions(&reply, self.max_questions)
            .map_err(|source| EngineError::Provider {
                stage: Stage::Clarification,
                source,
            })?;

        let novel = filter_repeats(generated, &session.asked_questions());
        if novel.is_empty() {
            // Nothing new left to ask; looping on repeats is forbidden
            debug!(session_id = %session.id, "advance_clarification: no novel questions, advancing");
            finish_clarification(session);
            return Ok(());
        }

        session.push_turn(Turn::assistant(novel.join("\n")));
        session.pending_questions = novel;
        session.stage = Stage::Clarification;
        session.touch();
        Ok(())
    }

    /// Synthesize the final artifact and complete the session
    async fn synthesize(
        &self,
        session: &mut Session,
        responses: &BTreeMap<String, String>,
    ) -> Result<(), EngineError> {
        session.push_turn(Turn::user(canonical_responses(responses)));

        let context = session
            .working_memory
            .iter()
            .map(|(key, value)| ContextEntry {
                key: key.clone(),
                value: match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            })
            .collect();

        let instruction = self.render(Stage::ReadyForOutput, "synthesize", &SynthesizeContext { context })?;

        let reply = self
            .call_provider(
                Stage::ReadyForOutput,
                StructuredPrompt::with_history(instruction, session, SYNTHESIS_MAX_TOKENS),
            )
            .await?;

        let artifact = parse_artifact(&reply).map_err(|source| EngineError::Provider {
            stage: Stage::ReadyForOutput,
            source,
        })?;

        info!(session_id = %session.id, "session complete");
        session.push_turn(Turn::assistant(
            serde_json::to_string(&artifact).unwrap_or_default(),
        ));
        session.result = Some(artifact);
        session.stage = Stage::Complete;
        session.pending_questions.clear();
        session.touch();
        Ok(())
    }

    /// Render a prompt template, mapping failure to a typed provider error
    fn render<C: Serialize>(&self, stage: Stage, name: &str, context: &C) -> Result<String, EngineError> {
        self.prompts.render(name, context).map_err(|e| EngineError::Provider {
            stage,
            source: ProviderError::InvalidResponse(format!("prompt template: {}", e)),
        })
    }

    /// One provider call, bounded by the configured timeout
    async fn call_provider(&self, stage: Stage, prompt: StructuredPrompt) -> Result<String, EngineError> {
        match timeout(self.call_timeout, self.provider.generate(prompt)).await {
            Ok(Ok(content)) => Ok(content.text),
            Ok(Err(source)) => Err(EngineError::Provider { stage, source }),
            Err(_) => Err(EngineError::Provider {
                stage,
                source: ProviderError::Timeout(self.call_timeout),
            }),
        }
    }
}

/// Leave Clarification: questions cleared, confirmation prompt recorded
fn finish_clarification(session: &mut Session) {
    session.pending_questions.clear();
    session.push_turn(Turn::assistant(READY_PROMPT));
    session.stage = Stage::ReadyForOutput;
    session.touch();
}

/// Answered (non-reserved) field names, for the follow-up prompt
fn answered_keys(memory: &WorkingMemory) -> Vec<String> {
    memory
        .keys()
        .filter(|key| is_answered_key(key))
        .cloned()
        .collect()
}

/// Drop generated questions that were already asked in this session
fn filter_repeats(generated: Vec<String>, asked: &[String]) -> Vec<String> {
    let seen: HashSet<String> = asked.iter().map(|q| normalize_question(q)).collect();
    generated
        .into_iter()
        .filter(|q| !seen.contains(&normalize_question(q)))
        .collect()
}

fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

/// Parse a provider reply as a JSON array of question strings
fn parse_questions(text: &str, max_questions: usize) -> Result<Vec<String>, ProviderError> {
    let cleaned = strip_fences(text);
    let questions: Vec<String> = serde_json::from_str(cleaned)
        .map_err(|e| ProviderError::InvalidResponse(format!("expected JSON question array: {}", e)))?;

    Ok(questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(max_questions)
        .collect())
}

/// Parse a provider reply as an artifact object
fn parse_artifact(text: &str) -> Result<Artifact, ProviderError> {
    let cleaned = strip_fences(text);
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| ProviderError::InvalidResponse(format!("expected JSON artifact object: {}", e)))?;

    Artifact::from_value(&value)
        .ok_or_else(|| ProviderError::InvalidResponse("artifact reply is not a JSON object".to_string()))
}

/// Strip a surrounding Markdown code fence, if any
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::readiness::MinAnswered;
    use crate::provider::mock::MockProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPredicate {
        inner: MinAnswered,
        calls: AtomicUsize,
    }

    impl CountingPredicate {
        fn new(min: usize) -> Self {
            Self {
                inner: MinAnswered::new(min),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ReadinessPredicate for CountingPredicate {
        fn is_ready(&self, memory: &WorkingMemory) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.is_ready(memory)
        }
    }

    fn machine_with(provider: Arc<MockProvider>, readiness: Arc<dyn ReadinessPredicate>) -> RefinementMachine {
        RefinementMachine::new(
            provider,
            readiness,
            PromptLoader::embedded_only(),
            &EngineConfig::default(),
        )
    }

    fn responses(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_begin_seeds_memory_and_questions() {
        let provider = MockProvider::new().with_text(r#"["How often?", "Who is the audience?"]"#);
        let provider = Arc::new(provider);
        let machine = machine_with(provider.clone(), Arc::new(MinAnswered::new(2)));

        let mut session = Session::new("u1", "Need a weekly report workflow");
        machine
            .begin(&mut session, "Need a weekly report workflow", None)
            .await
            .unwrap();

        assert_eq!(session.stage, Stage::Clarification);
        assert_eq!(session.pending_questions.len(), 2);
        assert_eq!(session.history.len(), 2);
        assert_eq!(
            session.working_memory.get(INITIAL_REQUEST_KEY),
            Some(&Value::String("Need a weekly report workflow".to_string()))
        );
        assert!(session.invariants_hold());
    }

    #[tokio::test]
    async fn test_begin_merges_seed_memory() {
        let provider = MockProvider::new().with_text(r#"["Q?"]"#);
        let provider = Arc::new(provider);
        let machine = machine_with(provider.clone(), Arc::new(MinAnswered::new(2)));

        let mut seed = WorkingMemory::new();
        seed.insert("_vault".to_string(), Value::String("prior context".to_string()));

        let mut session = Session::new("u1", "test");
        machine.begin(&mut session, "test", Some(seed)).await.unwrap();

        assert!(session.working_memory.contains_key("_vault"));
    }

    #[tokio::test]
    async fn test_advance_not_ready_asks_novel_questions() {
        let provider = MockProvider::new()
            .with_text(r#"["How often?", "Who is the audience?"]"#)
            .with_text(r#"["How often?", "What format?"]"#);
        let provider = Arc::new(provider);
        let machine = machine_with(provider.clone(), Arc::new(MinAnswered::new(2)));

        let mut session = Session::new("u1", "test");
        machine.begin(&mut session, "test", None).await.unwrap();

        machine
            .advance(&mut session, &responses(&[("frequency", "weekly")]))
            .await
            .unwrap();

        assert_eq!(session.stage, Stage::Clarification);
        // "How often?" was already asked and must be filtered out
        assert_eq!(session.pending_questions, vec!["What format?".to_string()]);
    }

    #[tokio::test]
    async fn test_advance_ready_skips_provider() {
        let provider = MockProvider::new().with_text(r#"["How often?"]"#);
        let provider = Arc::new(provider);
        let machine = machine_with(provider.clone(), Arc::new(MinAnswered::new(1)));

        let mut session = Session::new("u1", "test");
        machine.begin(&mut session, "test", None).await.unwrap();
        assert_eq!(provider.call_count(), 1);

        machine
            .advance(&mut session, &responses(&[("frequency", "weekly")]))
            .await
            .unwrap();

        assert_eq!(session.stage, Stage::ReadyForOutput);
        assert!(session.pending_questions.is_empty());
        assert!(session.invariants_hold());
        // Readiness was met, so no question-generation call happened
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_readiness_called_exactly_once_per_advance() {
        let provider = MockProvider::new()
            .with_text(r#"["Q1?"]"#)
            .with_text(r#"["Q2?"]"#);
        let counting = Arc::new(CountingPredicate::new(5));
        let provider = Arc::new(provider);
        let machine = machine_with(provider.clone(), counting.clone());

        let mut session = Session::new("u1", "test");
        machine.begin(&mut session, "test", None).await.unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);

        machine
            .advance(&mut session, &responses(&[("a", "1")]))
            .await
            .unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_advance_all_repeats_advances_stage() {
        let provider = MockProvider::new()
            .with_text(r#"["How often?"]"#)
            .with_text(r#"["HOW OFTEN?  "]"#);
        let provider = Arc::new(provider);
        let machine = machine_with(provider.clone(), Arc::new(MinAnswered::new(5)));

        let mut session = Session::new("u1", "test");
        machine.begin(&mut session, "test", None).await.unwrap();

        machine
            .advance(&mut session, &responses(&[("a", "1")]))
            .await
            .unwrap();

        assert_eq!(session.stage, Stage::ReadyForOutput);
        assert!(session.pending_questions.is_empty());
    }

    #[tokio::test]
    async fn test_synthesize_completes_session() {
        let provider = MockProvider::new()
            .with_text(r#"["Q1?"]"#)
            .with_text(
                r#"```json
{"primary": "The content", "call_to_action": "Do it", "positioning": "note"}
```"#,
            );
        let provider = Arc::new(provider);
        let machine = machine_with(provider.clone(), Arc::new(MinAnswered::new(1)));

        let mut session = Session::new("u1", "test");
        machine.begin(&mut session, "test", None).await.unwrap();
        machine
            .advance(&mut session, &responses(&[("a", "1")]))
            .await
            .unwrap();
        assert_eq!(session.stage, Stage::ReadyForOutput);

        machine
            .advance(&mut session, &responses(&[("confirm", "yes")]))
            .await
            .unwrap();

        assert_eq!(session.stage, Stage::Complete);
        let artifact = session.result.as_ref().unwrap();
        assert_eq!(artifact.primary.as_deref(), Some("The content"));
        assert_eq!(artifact.call_to_action.as_deref(), Some("Do it"));
        assert_eq!(artifact.annotations.len(), 1);
        assert!(session.invariants_hold());
    }

    #[tokio::test]
    async fn test_advance_on_complete_is_invalid_state() {
        let provider = MockProvider::new();
        let provider = Arc::new(provider);
        let machine = machine_with(provider.clone(), Arc::new(MinAnswered::new(1)));

        let mut session = Session::new("u1", "test");
        session.stage = Stage::Complete;
        session.result = Some(Artifact::default());

        let err = machine
            .advance(&mut session, &responses(&[("x", "y")]))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { stage: Stage::Complete }));
    }

    #[tokio::test]
    async fn test_provider_failure_surfaces_with_stage() {
        let provider = MockProvider::new()
            .with_text(r#"["Q1?"]"#)
            .with_error(ProviderError::Unavailable("down".to_string()));
        let provider = Arc::new(provider);
        let machine = machine_with(provider.clone(), Arc::new(MinAnswered::new(5)));

        let mut session = Session::new("u1", "test");
        machine.begin(&mut session, "test", None).await.unwrap();

        let err = machine
            .advance(&mut session, &responses(&[("a", "1")]))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Clarification));
        assert!(!err.is_client_error());
    }

    #[tokio::test]
    async fn test_malformed_question_reply_is_invalid_response() {
        let provider = MockProvider::new().with_text("Sure! Here are some questions...");
        let provider = Arc::new(provider);
        let machine = machine_with(provider.clone(), Arc::new(MinAnswered::new(2)));

        let mut session = Session::new("u1", "test");
        let err = machine.begin(&mut session, "test", None).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Provider {
                source: ProviderError::InvalidResponse(_),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_questions_plain_and_fenced() {
        let parsed = parse_questions(r#"["A?", "B?"]"#, 3).unwrap();
        assert_eq!(parsed, vec!["A?".to_string(), "B?".to_string()]);

        let parsed = parse_questions("```json\n[\"A?\"]\n```", 3).unwrap();
        assert_eq!(parsed, vec!["A?".to_string()]);
    }

    #[test]
    fn test_parse_questions_truncates_to_budget() {
        let parsed = parse_questions(r#"["A?", "B?", "C?", "D?"]"#, 2).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_parse_questions_drops_blank_entries() {
        let parsed = parse_questions(r#"["A?", "  ", ""]"#, 5).unwrap();
        assert_eq!(parsed, vec!["A?".to_string()]);
    }

    #[test]
    fn test_parse_artifact_rejects_array() {
        let err = parse_artifact(r#"["not", "an", "object"]"#).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_filter_repeats_case_insensitive() {
        let asked = vec!["How often?".to_string()];
        let novel = filter_repeats(
            vec!["how often?".to_string(), "What format?".to_string()],
            &asked,
        );
        assert_eq!(novel, vec!["What format?".to_string()]);
    }
}
