//! Final structured artifact of a completed session
//!
//! The artifact is assembled from provider output only. Blocks the provider
//! omits stay `None` / empty; the engine never invents content for them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Keys treated as the primary content block
const PRIMARY_KEYS: &[&str] = &["primary", "main", "main_prompt"];

/// Keys treated as the call-to-action block
const CTA_KEYS: &[&str] = &["call_to_action", "cta"];

/// Structured output of a completed refinement session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Main content block
    pub primary: Option<String>,

    /// Action-oriented closing block
    pub call_to_action: Option<String>,

    /// Auxiliary notes keyed by whatever the provider emitted
    /// (positioning, SEO, emotional framing, ...)
    pub annotations: BTreeMap<String, String>,
}

impl Artifact {
    /// Assemble an artifact from a parsed provider reply.
    ///
    /// Returns `None` unless `value` is a JSON object. String values under
    /// recognized keys become the primary/CTA blocks; every other
    /// string-valued key is carried through as an annotation.
    pub fn from_value(value: &Value) -> Option<Self> {
        debug!("Artifact::from_value: called");
        let object = value.as_object()?;

        let mut artifact = Artifact::default();
        for (key, val) in object {
            let Some(text) = val.as_str() else {
                debug!(%key, "Artifact::from_value: skipping non-string value");
                continue;
            };
            let key_lower = key.to_lowercase();
            if artifact.primary.is_none() && PRIMARY_KEYS.contains(&key_lower.as_str()) {
                artifact.primary = Some(text.to_string());
            } else if artifact.call_to_action.is_none() && CTA_KEYS.contains(&key_lower.as_str()) {
                artifact.call_to_action = Some(text.to_string());
            } else {
                artifact.annotations.insert(key.clone(), text.to_string());
            }
        }

        Some(artifact)
    }

    /// True when the provider produced no usable block at all
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.call_to_action.is_none() && self.annotations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_full() {
        let value = json!({
            "primary": "Core content",
            "call_to_action": "Sign up today",
            "positioning": "Trend-based framing",
            "seo": "keyword set",
        });

        let artifact = Artifact::from_value(&value).unwrap();
        assert_eq!(artifact.primary.as_deref(), Some("Core content"));
        assert_eq!(artifact.call_to_action.as_deref(), Some("Sign up today"));
        assert_eq!(artifact.annotations.len(), 2);
        assert_eq!(
            artifact.annotations.get("positioning").map(String::as_str),
            Some("Trend-based framing")
        );
    }

    #[test]
    fn test_from_value_aliases() {
        let value = json!({ "main": "body", "cta": "act now" });
        let artifact = Artifact::from_value(&value).unwrap();
        assert_eq!(artifact.primary.as_deref(), Some("body"));
        assert_eq!(artifact.call_to_action.as_deref(), Some("act now"));
        assert!(artifact.annotations.is_empty());
    }

    #[test]
    fn test_from_value_blocks_independently_nullable() {
        let value = json!({ "hook": "opening line" });
        let artifact = Artifact::from_value(&value).unwrap();
        assert!(artifact.primary.is_none());
        assert!(artifact.call_to_action.is_none());
        assert_eq!(artifact.annotations.len(), 1);
        assert!(!artifact.is_empty());
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        assert!(Artifact::from_value(&json!("just text")).is_none());
        assert!(Artifact::from_value(&json!(["a", "b"])).is_none());
    }

    #[test]
    fn test_from_value_skips_non_string_values() {
        let value = json!({ "primary": "text", "confidence": 0.92, "tags": ["a"] });
        let artifact = Artifact::from_value(&value).unwrap();
        assert_eq!(artifact.primary.as_deref(), Some("text"));
        assert!(artifact.annotations.is_empty());
    }

    #[test]
    fn test_empty_object_is_empty_artifact() {
        let artifact = Artifact::from_value(&json!({})).unwrap();
        assert!(artifact.is_empty());
    }
}
