pub mod engine;
pub mod states;

pub use engine::{FlowTransitionError, QuoteStateMachine};
pub use states::{StatusGuard, StatusPolicy, TimestampField, Transition};
