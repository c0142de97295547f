//! Embedded fallback prompts
//!
//! These are compiled into the binary and used when no override file exists.

/// Instruction for the initial round of clarifying questions
pub const CLARIFY: &str = r#"You are a refinement assistant helping turn a vague request into a precise brief.

The request so far:
{{initial_request}}

Your job right now is to ask the clarifying questions whose answers would most improve the final output.

Rules:
- Ask at most {{max_questions}} questions
- Each question must be answerable in one short sentence
- Never ask about something the request already states
- Output ONLY a JSON array of question strings, nothing else

Example output: ["How often should the report run?", "Who is the audience?"]
"#;

/// Instruction for follow-up questions after answers were merged
pub const FOLLOW_UP: &str = r#"You are a refinement assistant gathering the remaining context for a brief.

Fields answered so far:
{{#each answered}}
- {{this}}
{{/each}}

Questions already asked (do NOT repeat any of these):
{{#each asked}}
- {{this}}
{{/each}}

Ask the next clarifying questions that are still missing.

Rules:
- Ask at most {{max_questions}} questions
- Never repeat or rephrase a question from the list above
- Output ONLY a JSON array of question strings, nothing else
"#;

/// Instruction for final artifact synthesis
pub const SYNTHESIZE: &str = r#"You are a refinement assistant producing the final structured output for a completed brief.

Gathered context:
{{#each context}}
- {{this.key}}: {{this.value}}
{{/each}}

Produce the final output as a single JSON object with these keys:
- "primary": the main content, fully written out
- "call_to_action": an action-oriented closing
- any additional annotation keys you find useful (for example "positioning", "seo", "emotional_push")

Every value must be a string. Omit a key rather than filling it with a placeholder.
Output ONLY the JSON object, nothing else.
"#;

/// Look up an embedded template by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    match name {
        "clarify" => Some(CLARIFY),
        "follow-up" => Some(FOLLOW_UP),
        "synthesize" => Some(SYNTHESIZE),
        _ => None,
    }
}
