use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::blocks::MessageTemplate;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    UrlVerification { challenge: String },
    ReactionAdded(ReactionAddedEvent),
    ThreadMessage(ThreadMessageEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::UrlVerification { .. } => SlackEventType::UrlVerification,
            Self::ReactionAdded(_) => SlackEventType::ReactionAdded,
            Self::ThreadMessage(_) => SlackEventType::ThreadMessage,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    UrlVerification,
    ReactionAdded,
    ThreadMessage,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionAddedEvent {
    pub reaction: String,
    pub reactor_user_id: String,
    pub channel_id: String,
    pub message_ts: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadMessageEvent {
    pub channel_id: String,
    pub thread_ts: String,
    pub message_ts: String,
    pub user_id: String,
    pub text: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventParseError {
    #[error("{event_type} event is missing required field `{field}`")]
    MissingField { event_type: &'static str, field: &'static str },
    #[error("envelope has no recognizable type")]
    UnknownEnvelope,
}

fn string_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str).filter(|text| !text.is_empty())
}

fn required<'a>(
    value: &'a Value,
    event_type: &'static str,
    field: &'static str,
) -> Result<&'a str, EventParseError> {
    string_field(value, field).ok_or(EventParseError::MissingField { event_type, field })
}

/// Parses an Events API envelope as delivered over HTTP.
///
/// Bot-authored and non-thread `message` events parse as `Unsupported` so the
/// dispatcher drops them without treating the request as malformed. A
/// `reaction_added` event with any required field absent is malformed.
pub fn parse_envelope(body: &Value) -> Result<SlackEvent, EventParseError> {
    match string_field(body, "type") {
        Some("url_verification") => {
            let challenge = required(body, "url_verification", "challenge")?;
            Ok(SlackEvent::UrlVerification { challenge: challenge.to_owned() })
        }
        Some("event_callback") => {
            let event = body.get("event").ok_or(EventParseError::MissingField {
                event_type: "event_callback",
                field: "event",
            })?;
            parse_callback_event(event)
        }
        Some(other) => Ok(SlackEvent::Unsupported { event_type: other.to_owned() }),
        None => Err(EventParseError::UnknownEnvelope),
    }
}

fn parse_callback_event(event: &Value) -> Result<SlackEvent, EventParseError> {
    match string_field(event, "type") {
        Some("reaction_added") => {
            let item = event.get("item").ok_or(EventParseError::MissingField {
                event_type: "reaction_added",
                field: "item",
            })?;
            Ok(SlackEvent::ReactionAdded(ReactionAddedEvent {
                reaction: required(event, "reaction_added", "reaction")?.to_owned(),
                reactor_user_id: required(event, "reaction_added", "user")?.to_owned(),
                channel_id: required(item, "reaction_added", "channel")?.to_owned(),
                message_ts: required(item, "reaction_added", "ts")?.to_owned(),
            }))
        }
        Some("message") => {
            if event.get("bot_id").is_some() || event.get("subtype").is_some() {
                return Ok(SlackEvent::Unsupported { event_type: "message".to_owned() });
            }
            let Some(thread_ts) = string_field(event, "thread_ts") else {
                return Ok(SlackEvent::Unsupported { event_type: "message".to_owned() });
            };
            let message_ts = string_field(event, "ts").unwrap_or(thread_ts);
            Ok(SlackEvent::ThreadMessage(ThreadMessageEvent {
                channel_id: required(event, "message", "channel")?.to_owned(),
                thread_ts: thread_ts.to_owned(),
                message_ts: message_ts.to_owned(),
                user_id: required(event, "message", "user")?.to_owned(),
                text: event.get("text").and_then(Value::as_str).unwrap_or("").to_owned(),
            }))
        }
        Some(other) => Ok(SlackEvent::Unsupported { event_type: other.to_owned() }),
        None => Err(EventParseError::MissingField { event_type: "event_callback", field: "type" }),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("reaction handler failure: {0}")]
    Reaction(String),
    #[error("thread reply handler failure: {0}")]
    ThreadReply(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(event, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Records a new reaction against a tracked message.
#[async_trait]
pub trait ReactionIngestService: Send + Sync {
    async fn record_reaction(
        &self,
        event: &ReactionAddedEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[async_trait]
impl<S> ReactionIngestService for Arc<S>
where
    S: ReactionIngestService + ?Sized,
{
    async fn record_reaction(
        &self,
        event: &ReactionAddedEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        self.as_ref().record_reaction(event, ctx).await
    }
}

pub struct ReactionAddedHandler<S> {
    service: S,
}

impl<S> ReactionAddedHandler<S>
where
    S: ReactionIngestService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ReactionAddedHandler<S>
where
    S: ReactionIngestService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ReactionAdded
    }

    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ReactionAdded(event) = event else {
            return Ok(HandlerResult::Ignored);
        };
        self.service.record_reaction(event, ctx).await
    }
}

/// Interprets a thread reply as a scheduling answer for the tracked message.
#[async_trait]
pub trait ThreadReplyService: Send + Sync {
    async fn handle_thread_reply(
        &self,
        event: &ThreadMessageEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[async_trait]
impl<S> ThreadReplyService for Arc<S>
where
    S: ThreadReplyService + ?Sized,
{
    async fn handle_thread_reply(
        &self,
        event: &ThreadMessageEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        self.as_ref().handle_thread_reply(event, ctx).await
    }
}

pub struct ThreadMessageHandler<S> {
    service: S,
}

impl<S> ThreadMessageHandler<S>
where
    S: ThreadReplyService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ThreadMessageHandler<S>
where
    S: ThreadReplyService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ThreadMessage
    }

    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ThreadMessage(event) = event else {
            return Ok(HandlerResult::Ignored);
        };
        self.service.handle_thread_reply(event, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        parse_envelope, EventContext, EventDispatcher, EventHandlerError, EventParseError,
        HandlerResult, ReactionAddedEvent, ReactionAddedHandler, ReactionIngestService, SlackEvent,
    };
    use async_trait::async_trait;

    #[test]
    fn parses_url_verification_challenge() {
        let body = json!({"type": "url_verification", "challenge": "abc123"});
        assert_eq!(
            parse_envelope(&body).expect("parse"),
            SlackEvent::UrlVerification { challenge: "abc123".to_owned() }
        );
    }

    #[test]
    fn parses_reaction_added_callback() {
        let body = json!({
            "type": "event_callback",
            "event": {
                "type": "reaction_added",
                "reaction": "thumbsup",
                "user": "U1",
                "item": {"channel": "C1", "ts": "1730000000.000100"}
            }
        });

        assert_eq!(
            parse_envelope(&body).expect("parse"),
            SlackEvent::ReactionAdded(ReactionAddedEvent {
                reaction: "thumbsup".to_owned(),
                reactor_user_id: "U1".to_owned(),
                channel_id: "C1".to_owned(),
                message_ts: "1730000000.000100".to_owned(),
            })
        );
    }

    #[test]
    fn reaction_added_without_user_is_malformed() {
        let body = json!({
            "type": "event_callback",
            "event": {
                "type": "reaction_added",
                "reaction": "thumbsup",
                "item": {"channel": "C1", "ts": "1730000000.000100"}
            }
        });

        assert_eq!(
            parse_envelope(&body),
            Err(EventParseError::MissingField { event_type: "reaction_added", field: "user" })
        );
    }

    #[test]
    fn thread_reply_parses_with_thread_anchor() {
        let body = json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "channel": "C1",
                "user": "U2",
                "text": "12/10 15:00でお願いします",
                "ts": "1730000001.000200",
                "thread_ts": "1730000000.000100"
            }
        });

        let event = parse_envelope(&body).expect("parse");
        let SlackEvent::ThreadMessage(event) = event else {
            panic!("expected thread message, got {event:?}");
        };
        assert_eq!(event.thread_ts, "1730000000.000100");
        assert_eq!(event.message_ts, "1730000001.000200");
        assert!(event.text.contains("12/10 15:00"));
    }

    #[test]
    fn bot_and_top_level_messages_parse_as_unsupported() {
        let bot = json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "channel": "C1",
                "bot_id": "B1",
                "text": "bot echo",
                "ts": "1.1",
                "thread_ts": "1.0"
            }
        });
        assert!(matches!(
            parse_envelope(&bot).expect("parse"),
            SlackEvent::Unsupported { event_type } if event_type == "message"
        ));

        let top_level = json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "channel": "C1",
                "user": "U2",
                "text": "not a reply",
                "ts": "1.1"
            }
        });
        assert!(matches!(
            parse_envelope(&top_level).expect("parse"),
            SlackEvent::Unsupported { event_type } if event_type == "message"
        ));
    }

    struct CountingReactionService;

    #[async_trait]
    impl ReactionIngestService for CountingReactionService {
        async fn record_reaction(
            &self,
            event: &ReactionAddedEvent,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            if event.reaction == "boom" {
                return Err(EventHandlerError::Reaction("scripted failure".to_owned()));
            }
            Ok(HandlerResult::Processed)
        }
    }

    #[tokio::test]
    async fn dispatcher_routes_reaction_events_and_ignores_unregistered_types() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(ReactionAddedHandler::new(CountingReactionService));
        assert_eq!(dispatcher.handler_count(), 1);

        let reaction = SlackEvent::ReactionAdded(ReactionAddedEvent {
            reaction: "thumbsup".to_owned(),
            reactor_user_id: "U1".to_owned(),
            channel_id: "C1".to_owned(),
            message_ts: "1.0".to_owned(),
        });
        let result =
            dispatcher.dispatch(&reaction, &EventContext::default()).await.expect("dispatch");
        assert_eq!(result, HandlerResult::Processed);

        let unsupported = SlackEvent::Unsupported { event_type: "channel_joined".to_owned() };
        let result =
            dispatcher.dispatch(&unsupported, &EventContext::default()).await.expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);
    }
}
