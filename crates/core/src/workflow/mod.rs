pub mod engine;
pub mod states;

pub use engine::{TrackingFlow, TransitionError, WorkflowDefinition, WorkflowEngine};
pub use states::{TrackingAction, TrackingContext, TrackingEvent, TransitionOutcome};
