use serde::{Deserialize, Serialize};

use crate::domain::tracking::TrackingStatus;

/// Events fed into the tracking lifecycle. `ReactionRecorded` carries the
/// distinct reactor count already including the incoming reaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingEvent {
    ReactionRecorded { distinct_reactors: usize },
    ScheduleParsed,
    ScheduleUnparseable,
    AttendeesUnavailable,
    CancelRequested,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingAction {
    PersistReaction,
    PostProposal { participant_count: usize },
    CreateCalendarEvent,
    PostCompletionSummary,
    RePromptForDatetime,
    ReportSchedulingFailure,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingContext {
    /// Distinct reactors required before a meeting proposal fires.
    pub proposal_threshold: usize,
}

impl Default for TrackingContext {
    fn default() -> Self {
        Self { proposal_threshold: 3 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: TrackingStatus,
    pub to: TrackingStatus,
    pub event: TrackingEvent,
    pub actions: Vec<TrackingAction>,
}
