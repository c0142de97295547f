//! Domain types for the refinement engine
//!
//! Core types: Session, Stage, Turn, Artifact, SessionView.
//! Sessions are plain serde records; persistence is the store layer's job.

mod artifact;
mod id;
mod session;

pub use artifact::Artifact;
pub use id::generate_id;
pub use session::{
    INITIAL_REQUEST_KEY, Role, Session, SessionView, Stage, Turn, WorkingMemory, canonical_responses,
};
