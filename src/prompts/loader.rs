//! Prompt loader
//!
//! Loads prompt templates from an override directory or falls back to the
//! embedded defaults, then renders them with handlebars.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// Context for the initial clarify template
#[derive(Debug, Clone, Serialize)]
pub struct ClarifyContext {
    pub initial_request: String,
    pub max_questions: usize,
}

/// Context for the follow-up template
#[derive(Debug, Clone, Serialize)]
pub struct FollowUpContext {
    /// Field names answered so far
    pub answered: Vec<String>,
    /// Every question already asked in this session
    pub asked: Vec<String>,
    pub max_questions: usize,
}

/// One gathered key/value pair for the synthesis template
#[derive(Debug, Clone, Serialize)]
pub struct ContextEntry {
    pub key: String,
    pub value: String,
}

/// Context for the synthesis template
#[derive(Debug, Clone, Serialize)]
pub struct SynthesizeContext {
    pub context: Vec<ContextEntry>,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    /// User override directory (e.g. `~/.config/refiner/prompts/`)
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader with an optional override directory
    pub fn new(override_dir: Option<impl AsRef<Path>>) -> Self {
        let override_dir = override_dir
            .map(|dir| dir.as_ref().to_path_buf())
            .filter(|dir| dir.exists());
        Self {
            hbs: Handlebars::new(),
            override_dir,
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        Self {
            hbs: Handlebars::new(),
            override_dir: None,
        }
    }

    /// Load a template by name
    ///
    /// Checks the override directory for `{name}.pmt` first, then falls
    /// back to the embedded template.
    fn load_template(&self, name: &str) -> Result<String> {
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!("Loading prompt from override: {:?}", path);
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!("Using embedded prompt: {}", name);
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render<C: Serialize>(&self, template_name: &str, context: &C) -> Result<String> {
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_clarify() {
        let loader = PromptLoader::embedded_only();
        let rendered = loader
            .render(
                "clarify",
                &ClarifyContext {
                    initial_request: "Need a weekly report workflow".to_string(),
                    max_questions: 3,
                },
            )
            .unwrap();
        assert!(rendered.contains("Need a weekly report workflow"));
        assert!(rendered.contains("at most 3 questions"));
    }

    #[test]
    fn test_render_follow_up_lists_asked() {
        let loader = PromptLoader::embedded_only();
        let rendered = loader
            .render(
                "follow-up",
                &FollowUpContext {
                    answered: vec!["frequency".to_string()],
                    asked: vec!["How often should it run?".to_string()],
                    max_questions: 2,
                },
            )
            .unwrap();
        assert!(rendered.contains("- frequency"));
        assert!(rendered.contains("- How often should it run?"));
    }

    #[test]
    fn test_render_synthesize_inlines_context() {
        let loader = PromptLoader::embedded_only();
        let rendered = loader
            .render(
                "synthesize",
                &SynthesizeContext {
                    context: vec![ContextEntry {
                        key: "audience".to_string(),
                        value: "execs".to_string(),
                    }],
                },
            )
            .unwrap();
        assert!(rendered.contains("audience: execs"));
    }

    #[test]
    fn test_unknown_template() {
        let loader = PromptLoader::embedded_only();
        let result = loader.load_template("nonexistent");
        assert!(result.is_err());
    }

    #[test]
    fn test_override_dir_wins() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("clarify.pmt"), "custom {{initial_request}}").unwrap();

        let loader = PromptLoader::new(Some(temp.path()));
        let rendered = loader
            .render(
                "clarify",
                &ClarifyContext {
                    initial_request: "X".to_string(),
                    max_questions: 1,
                },
            )
            .unwrap();
        assert_eq!(rendered, "custom X");
    }
}
