use thiserror::Error;

use crate::domain::tracking::TrackingStatus;
use crate::workflow::states::{TrackingAction, TrackingContext, TrackingEvent, TransitionOutcome};

pub trait WorkflowDefinition {
    fn initial_status(&self) -> TrackingStatus;
    fn transition(
        &self,
        current: &TrackingStatus,
        event: &TrackingEvent,
        context: &TrackingContext,
    ) -> Result<TransitionOutcome, TransitionError>;
}

/// Lifecycle of one tracked conversation starter, from first reaction to a
/// scheduled meeting.
#[derive(Clone, Debug, Default)]
pub struct TrackingFlow;

impl WorkflowDefinition for TrackingFlow {
    fn initial_status(&self) -> TrackingStatus {
        TrackingStatus::CollectingReactions
    }

    fn transition(
        &self,
        current: &TrackingStatus,
        event: &TrackingEvent,
        context: &TrackingContext,
    ) -> Result<TransitionOutcome, TransitionError> {
        transition_tracking(current, event, context)
    }
}

pub struct WorkflowEngine<F> {
    flow: F,
}

impl<F> WorkflowEngine<F>
where
    F: WorkflowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_status(&self) -> TrackingStatus {
        self.flow.initial_status()
    }

    pub fn apply(
        &self,
        current: &TrackingStatus,
        event: &TrackingEvent,
        context: &TrackingContext,
    ) -> Result<TransitionOutcome, TransitionError> {
        self.flow.transition(current, event, context)
    }
}

impl Default for WorkflowEngine<TrackingFlow> {
    fn default() -> Self {
        Self::new(TrackingFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid transition from {status:?} using event {event:?}")]
    InvalidTransition { status: TrackingStatus, event: TrackingEvent },
}

fn transition_tracking(
    current: &TrackingStatus,
    event: &TrackingEvent,
    context: &TrackingContext,
) -> Result<TransitionOutcome, TransitionError> {
    use TrackingAction::{
        CreateCalendarEvent, PersistReaction, PostCompletionSummary, PostProposal,
        RePromptForDatetime, ReportSchedulingFailure,
    };
    use TrackingEvent::{
        AttendeesUnavailable, CancelRequested, ReactionRecorded, ScheduleParsed,
        ScheduleUnparseable,
    };
    use TrackingStatus::{Cancelled, CollectingReactions, Completed, Scheduling};

    let (to, actions) = match (current, event) {
        (CollectingReactions, ReactionRecorded { distinct_reactors }) => {
            if *distinct_reactors >= context.proposal_threshold {
                (
                    Scheduling,
                    vec![PersistReaction, PostProposal { participant_count: *distinct_reactors }],
                )
            } else {
                (CollectingReactions, vec![PersistReaction])
            }
        }
        // Late reactions are still persisted but never re-fire the proposal.
        (Scheduling, ReactionRecorded { .. }) => (Scheduling, vec![PersistReaction]),
        (Scheduling, ScheduleParsed) => {
            (Completed, vec![CreateCalendarEvent, PostCompletionSummary])
        }
        (Scheduling, ScheduleUnparseable) => (Scheduling, vec![RePromptForDatetime]),
        (Scheduling, AttendeesUnavailable) => (Scheduling, vec![ReportSchedulingFailure]),
        (Completed, CancelRequested) | (Cancelled, CancelRequested) => {
            return Err(TransitionError::InvalidTransition {
                status: *current,
                event: event.clone(),
            });
        }
        (_, CancelRequested) => (Cancelled, Vec::new()),
        _ => {
            return Err(TransitionError::InvalidTransition {
                status: *current,
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}
