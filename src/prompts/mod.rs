//! Prompt templates for the refinement engine

mod embedded;
mod loader;

pub use loader::{ClarifyContext, ContextEntry, FollowUpContext, PromptLoader, SynthesizeContext};
