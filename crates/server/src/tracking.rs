use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use kindler_calendar::{CalendarGateway, EventDraft};
use kindler_core::schedule::{
    end_time, format_japanese, jst, parse_duration, resolve_datetime, Confidence,
    DEFAULT_DURATION_MINUTES,
};
use kindler_core::workflow::{
    TrackingAction, TrackingContext, TrackingEvent, TrackingFlow, TransitionError, WorkflowEngine,
};
use kindler_core::{ApplicationError, EventTracking, TrackingStatus, FALLBACK_MEETING_TITLE};
use kindler_db::repositories::{RepositoryError, TopicRepository, TrackingRepository};
use kindler_slack::blocks::{
    calendar_created_message, error_message, meeting_proposal_message, MessageTemplate,
    DATETIME_REPROMPT_TEXT, MEETING_LOCATION, NO_ATTENDEES_TEXT,
};
use kindler_slack::events::{
    EventContext, EventHandlerError, HandlerResult, ReactionAddedEvent, ReactionIngestService,
    ThreadMessageEvent, ThreadReplyService,
};
use kindler_slack::gateway::{ChatGateway, GatewayError};

#[derive(Debug, Error)]
pub enum TrackingServiceError {
    #[error("repository failure: {0}")]
    Repository(#[from] RepositoryError),
    #[error("chat gateway failure: {0}")]
    Chat(#[from] GatewayError),
    #[error("workflow rejected the event: {0}")]
    Transition(#[from] TransitionError),
}

impl From<TrackingServiceError> for ApplicationError {
    fn from(error: TrackingServiceError) -> Self {
        match error {
            TrackingServiceError::Repository(inner) => Self::Persistence(inner.to_string()),
            TrackingServiceError::Chat(inner) => Self::Integration(inner.to_string()),
            TrackingServiceError::Transition(inner) => Self::Domain(inner.into()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestAction {
    Ignored,
    ReactionRecorded,
    ProposalPosted,
    AskedDatetimeAgain,
    SchedulingFailed,
    EventScheduled,
}

/// Outcome of one ingested Slack event, also serialized into the HTTP
/// response body.
#[derive(Clone, Debug, Serialize)]
pub struct IngestOutcome {
    pub success: bool,
    pub action: IngestAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_event_id: Option<String>,
}

impl IngestOutcome {
    fn ignored(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            action: IngestAction::Ignored,
            reason: Some(reason.into()),
            reaction_count: None,
            calendar_event_id: None,
        }
    }

    fn reaction_recorded(reaction_count: usize) -> Self {
        Self {
            success: true,
            action: IngestAction::ReactionRecorded,
            reason: None,
            reaction_count: Some(reaction_count),
            calendar_event_id: None,
        }
    }

    fn proposal_posted(reaction_count: usize) -> Self {
        Self {
            success: true,
            action: IngestAction::ProposalPosted,
            reason: None,
            reaction_count: Some(reaction_count),
            calendar_event_id: None,
        }
    }

    fn asked_datetime_again() -> Self {
        Self {
            success: true,
            action: IngestAction::AskedDatetimeAgain,
            reason: None,
            reaction_count: None,
            calendar_event_id: None,
        }
    }

    fn scheduling_failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            action: IngestAction::SchedulingFailed,
            reason: Some(reason.into()),
            reaction_count: None,
            calendar_event_id: None,
        }
    }

    fn event_scheduled(calendar_event_id: String) -> Self {
        Self {
            success: true,
            action: IngestAction::EventScheduled,
            reason: None,
            reaction_count: None,
            calendar_event_id: Some(calendar_event_id),
        }
    }
}

/// Drives a tracked post from incoming reactions to a calendar event,
/// delegating every status change to the workflow engine.
pub struct TrackingService {
    tracking: Arc<dyn TrackingRepository>,
    topics: Arc<dyn TopicRepository>,
    chat: Arc<dyn ChatGateway>,
    calendar: Arc<dyn CalendarGateway>,
    engine: WorkflowEngine<TrackingFlow>,
    context: TrackingContext,
}

impl TrackingService {
    pub fn new(
        tracking: Arc<dyn TrackingRepository>,
        topics: Arc<dyn TopicRepository>,
        chat: Arc<dyn ChatGateway>,
        calendar: Arc<dyn CalendarGateway>,
        context: TrackingContext,
    ) -> Self {
        Self { tracking, topics, chat, calendar, engine: WorkflowEngine::default(), context }
    }

    /// Records one reaction against the tracked message it landed on. Posts
    /// the meeting proposal in-thread once the distinct reactor count reaches
    /// the threshold; the status only moves to scheduling after that post
    /// succeeds.
    pub async fn record_reaction(
        &self,
        event: &ReactionAddedEvent,
        ctx: &EventContext,
    ) -> Result<IngestOutcome, TrackingServiceError> {
        let Some(mut tracking) =
            self.tracking.find_active_by_message(&event.channel_id, &event.message_ts).await?
        else {
            info!(
                event_name = "app.tracking.reaction_ignored",
                correlation_id = %ctx.correlation_id,
                channel_id = %event.channel_id,
                message_ts = %event.message_ts,
                "reaction on an untracked message ignored"
            );
            return Ok(IngestOutcome::ignored("message is not tracked"));
        };

        let user_email = match self.chat.user_info(&event.reactor_user_id).await {
            Ok(user) => user.email.unwrap_or_default(),
            Err(error) => {
                warn!(
                    event_name = "app.tracking.user_lookup_failed",
                    correlation_id = %ctx.correlation_id,
                    user_id = %event.reactor_user_id,
                    error = %error,
                    "reactor profile lookup failed, recording without email"
                );
                String::new()
            }
        };

        tracking.add_reaction(&event.reactor_user_id, user_email, &event.reaction, Utc::now());
        let tracking_id = tracking.id.clone();
        // The reaction is durable before any proposal goes out; the count is
        // taken from the persisted record, not the in-memory aggregate.
        self.tracking.save(tracking).await?;
        let mut tracking = self
            .tracking
            .find_by_id(&tracking_id)
            .await?
            .ok_or(RepositoryError::Decode("tracking record missing after save".to_string()))?;
        let transition = self.engine.apply(
            &tracking.status,
            &TrackingEvent::ReactionRecorded {
                distinct_reactors: tracking.distinct_reactor_count(),
            },
            &self.context,
        )?;

        let proposal = transition.actions.iter().find_map(|action| match action {
            TrackingAction::PostProposal { participant_count } => Some(*participant_count),
            _ => None,
        });
        let Some(participant_count) = proposal else {
            return Ok(IngestOutcome::reaction_recorded(tracking.distinct_reactor_count()));
        };

        self.chat
            .post_message(
                &tracking.channel_id,
                Some(&tracking.message_ts),
                &meeting_proposal_message(participant_count),
            )
            .await?;
        tracking.status = transition.to;
        self.tracking.save(tracking).await?;

        info!(
            event_name = "app.tracking.proposal_posted",
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            message_ts = %event.message_ts,
            participant_count,
            "meeting proposal posted, tracking now scheduling"
        );
        Ok(IngestOutcome::proposal_posted(participant_count))
    }

    /// Interprets a thread reply under a tracked post as the meeting
    /// datetime. Unreadable replies are re-prompted; a readable one creates
    /// the calendar event and completes the tracking.
    pub async fn resolve_schedule(
        &self,
        event: &ThreadMessageEvent,
        ctx: &EventContext,
    ) -> Result<IngestOutcome, TrackingServiceError> {
        let Some(tracking) =
            self.tracking.find_active_by_message(&event.channel_id, &event.thread_ts).await?
        else {
            return Ok(IngestOutcome::ignored("thread is not tracked"));
        };
        if tracking.status != TrackingStatus::Scheduling {
            return Ok(IngestOutcome::ignored("tracking is not awaiting a schedule"));
        }

        let current_year = Utc::now().with_timezone(&jst()).year();
        let Some((start, confidence)) = resolve_datetime(&event.text, current_year) else {
            self.engine.apply(&tracking.status, &TrackingEvent::ScheduleUnparseable, &self.context)?;
            self.chat
                .post_message(
                    &event.channel_id,
                    Some(&event.thread_ts),
                    &MessageTemplate::plain(DATETIME_REPROMPT_TEXT),
                )
                .await?;
            info!(
                event_name = "app.tracking.datetime_reprompted",
                correlation_id = %ctx.correlation_id,
                channel_id = %event.channel_id,
                thread_ts = %event.thread_ts,
                "reply held no recognizable datetime, asked again"
            );
            return Ok(IngestOutcome::asked_datetime_again());
        };

        match self.schedule_event(tracking, event, ctx, start, confidence).await {
            Ok(outcome) => Ok(outcome),
            // Storage faults after a parsed datetime surface in the thread;
            // the record stays scheduling so another reply can retry.
            Err(TrackingServiceError::Repository(error)) => {
                warn!(
                    event_name = "app.tracking.schedule_persist_failed",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %event.channel_id,
                    thread_ts = %event.thread_ts,
                    error = %error,
                    "schedule resolution hit a storage failure"
                );
                self.chat
                    .post_message(
                        &event.channel_id,
                        Some(&event.thread_ts),
                        &error_message(
                            "スケジュール作成中にエラーが発生しました。",
                            Some(&error.to_string()),
                        ),
                    )
                    .await?;
                Ok(IngestOutcome::scheduling_failed("schedule resolution failed"))
            }
            Err(other) => Err(other),
        }
    }

    async fn schedule_event(
        &self,
        mut tracking: EventTracking,
        event: &ThreadMessageEvent,
        ctx: &EventContext,
        start: DateTime<FixedOffset>,
        confidence: Confidence,
    ) -> Result<IngestOutcome, TrackingServiceError> {
        let attendee_emails = tracking.participant_emails();
        if attendee_emails.is_empty() {
            self.engine.apply(&tracking.status, &TrackingEvent::AttendeesUnavailable, &self.context)?;
            self.chat
                .post_message(
                    &event.channel_id,
                    Some(&event.thread_ts),
                    &MessageTemplate::plain(NO_ATTENDEES_TEXT),
                )
                .await?;
            return Ok(IngestOutcome::scheduling_failed("no attendee emails resolved"));
        }

        let title = match &tracking.topic_id {
            Some(topic_id) => self
                .topics
                .find_by_id(topic_id)
                .await?
                .map(|topic| topic.meeting_title())
                .unwrap_or_else(|| FALLBACK_MEETING_TITLE.to_string()),
            None => FALLBACK_MEETING_TITLE.to_string(),
        };
        let duration_minutes = parse_duration(&event.text).unwrap_or(DEFAULT_DURATION_MINUTES);
        let draft = EventDraft {
            summary: title.clone(),
            description: source_message_reference(&tracking.channel_id, &tracking.message_ts),
            location: String::new(),
            start,
            end: end_time(start, duration_minutes),
            attendee_emails,
        };

        let created = match self.calendar.create_event(&draft).await {
            Ok(created) => created,
            Err(error) => {
                warn!(
                    event_name = "app.tracking.calendar_create_failed",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %event.channel_id,
                    thread_ts = %event.thread_ts,
                    error = %error,
                    "calendar event creation failed"
                );
                self.chat
                    .post_message(
                        &event.channel_id,
                        Some(&event.thread_ts),
                        &error_message(
                            "カレンダーイベントの作成に失敗しました。",
                            Some(&error.to_string()),
                        ),
                    )
                    .await?;
                return Ok(IngestOutcome::scheduling_failed("calendar event creation failed"));
            }
        };

        let transition =
            self.engine.apply(&tracking.status, &TrackingEvent::ScheduleParsed, &self.context)?;
        tracking.status = transition.to;
        tracking.event_title = Some(title.clone());
        tracking.calendar_event_id = Some(created.id.clone());
        tracking.updated_at = Utc::now();
        let reactor_user_ids = tracking.reactor_user_ids();
        self.tracking.save(tracking).await?;

        self.chat
            .post_message(
                &event.channel_id,
                Some(&event.thread_ts),
                &calendar_created_message(
                    &title,
                    &format_japanese(&start),
                    MEETING_LOCATION,
                    &reactor_user_ids,
                    &created.html_link,
                ),
            )
            .await?;

        info!(
            event_name = "app.tracking.event_scheduled",
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            thread_ts = %event.thread_ts,
            calendar_event_id = %created.id,
            confidence = confidence.as_str(),
            duration_minutes,
            "calendar event created, tracking completed"
        );
        Ok(IngestOutcome::event_scheduled(created.id))
    }
}

/// Meeting description pointing back at the Slack message that started it.
fn source_message_reference(channel_id: &str, message_ts: &str) -> String {
    let permalink_ts = message_ts.replace('.', "");
    format!(
        "Slackの話題から作成されたミーティングです。\n\n元のメッセージ: https://slack.com/archives/{channel_id}/p{permalink_ts}"
    )
}

#[async_trait]
impl ReactionIngestService for TrackingService {
    async fn record_reaction(
        &self,
        event: &ReactionAddedEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let outcome = TrackingService::record_reaction(self, event, ctx)
            .await
            .map_err(|error| EventHandlerError::Reaction(error.to_string()))?;
        Ok(match outcome.action {
            IngestAction::Ignored => HandlerResult::Ignored,
            _ => HandlerResult::Processed,
        })
    }
}

#[async_trait]
impl ThreadReplyService for TrackingService {
    async fn handle_thread_reply(
        &self,
        event: &ThreadMessageEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let outcome = TrackingService::resolve_schedule(self, event, ctx)
            .await
            .map_err(|error| EventHandlerError::ThreadReply(error.to_string()))?;
        Ok(match outcome.action {
            IngestAction::Ignored => HandlerResult::Ignored,
            _ => HandlerResult::Processed,
        })
    }
}
