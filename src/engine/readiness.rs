//! Readiness policies
//!
//! The decision of when a session has gathered enough context to leave
//! Clarification is deployment policy, not engine logic. The machine calls
//! the configured predicate exactly once per continue and otherwise knows
//! nothing about it.

use std::sync::Arc;

use tracing::debug;

use crate::config::ReadinessConfig;
use crate::domain::{INITIAL_REQUEST_KEY, WorkingMemory};

/// Pluggable policy deciding when to leave Clarification
pub trait ReadinessPredicate: Send + Sync {
    fn is_ready(&self, memory: &WorkingMemory) -> bool;
}

/// Keys that never count as an answered field: the seeded request and
/// anything underscore-prefixed (engine-internal or embedder bookkeeping).
pub(crate) fn is_answered_key(key: &str) -> bool {
    key != INITIAL_REQUEST_KEY && !key.starts_with('_')
}

/// Ready once every named field has a non-empty answer
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }
}

impl ReadinessPredicate for RequiredFields {
    fn is_ready(&self, memory: &WorkingMemory) -> bool {
        let ready = self.fields.iter().all(|field| {
            memory
                .get(field)
                .is_some_and(|value| !value.as_str().is_some_and(|s| s.trim().is_empty()))
        });
        debug!(ready, field_count = self.fields.len(), "RequiredFields::is_ready");
        ready
    }
}

/// Ready once at least `min` fields have been answered
pub struct MinAnswered {
    min: usize,
}

impl MinAnswered {
    pub fn new(min: usize) -> Self {
        Self { min }
    }
}

impl ReadinessPredicate for MinAnswered {
    fn is_ready(&self, memory: &WorkingMemory) -> bool {
        let answered = memory.keys().filter(|key| is_answered_key(key)).count();
        debug!(answered, min = self.min, "MinAnswered::is_ready");
        answered >= self.min
    }
}

/// Build the configured predicate.
///
/// Unknown policy names were rejected by `ReadinessConfig::validate`; here
/// they conservatively fall back to `MinAnswered` so a stale config cannot
/// wedge sessions in Clarification forever.
pub fn from_config(config: &ReadinessConfig) -> Arc<dyn ReadinessPredicate> {
    match config.policy.as_str() {
        "required-fields" => Arc::new(RequiredFields::new(config.required_fields.clone())),
        _ => Arc::new(MinAnswered::new(config.min_answered)),
    }
}
