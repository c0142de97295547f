//! Refinement state machine and readiness policies

mod machine;
mod readiness;

pub use machine::RefinementMachine;
pub use readiness::{MinAnswered, ReadinessPredicate, RequiredFields, from_config as readiness_from_config};
