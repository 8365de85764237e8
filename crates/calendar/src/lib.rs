//! Google Calendar v3 client used to turn scheduled threads into real events.
//!
//! `CalendarGateway` is the seam the scheduling service talks to;
//! `HttpCalendarGateway` speaks the REST API with a bearer token, and
//! `RecordingCalendarGateway` stands in during tests.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const EVENT_TIMEZONE: &str = "Asia/Tokyo";

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("calendar transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("calendar api rejected the call ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("calendar api returned an unreadable response: {0}")]
    MalformedResponse(String),
}

/// The event the scheduling flow wants created, in JST.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventDraft {
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub attendee_emails: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedEvent {
    pub id: String,
    pub html_link: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    pub start: String,
    pub end: String,
    pub location: String,
    pub description: String,
    pub attendee_emails: Vec<String>,
    pub html_link: String,
}

/// Field updates applied to an existing event. `None` leaves a field as is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub summary: Option<String>,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub description: Option<String>,
    pub location: Option<String>,
}

#[async_trait]
pub trait CalendarGateway: Send + Sync {
    async fn create_event(&self, draft: &EventDraft) -> Result<CreatedEvent, CalendarError>;
    async fn get_event(&self, event_id: &str) -> Result<CalendarEvent, CalendarError>;
    async fn update_event(
        &self,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<CreatedEvent, CalendarError>;
    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError>;
}

pub struct HttpCalendarGateway {
    client: reqwest::Client,
    api_token: SecretString,
    calendar_id: String,
    api_base: String,
}

#[derive(Deserialize)]
struct EventResource {
    id: String,
    #[serde(default)]
    summary: String,
    #[serde(default, rename = "htmlLink")]
    html_link: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    start: EventTime,
    #[serde(default)]
    end: EventTime,
    #[serde(default)]
    attendees: Vec<AttendeeResource>,
}

#[derive(Default, Deserialize)]
struct EventTime {
    #[serde(default, rename = "dateTime")]
    date_time: String,
}

#[derive(Deserialize)]
struct AttendeeResource {
    email: String,
}

impl From<EventResource> for CalendarEvent {
    fn from(resource: EventResource) -> Self {
        Self {
            id: resource.id,
            summary: resource.summary,
            start: resource.start.date_time,
            end: resource.end.date_time,
            location: resource.location,
            description: resource.description,
            attendee_emails: resource.attendees.into_iter().map(|a| a.email).collect(),
            html_link: resource.html_link,
        }
    }
}

impl HttpCalendarGateway {
    pub fn new(api_token: SecretString, calendar_id: impl Into<String>) -> Self {
        Self::with_api_base(api_token, calendar_id, DEFAULT_API_BASE)
    }

    pub fn with_api_base(
        api_token: SecretString,
        calendar_id: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_token,
            calendar_id: calendar_id.into(),
            api_base: api_base.into(),
        }
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/{}/events", self.api_base, self.calendar_id)
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{event_id}", self.events_url())
    }

    async fn decode_event(response: reqwest::Response) -> Result<EventResource, CalendarError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CalendarError::Api { status: status.as_u16(), message });
        }
        response
            .json::<EventResource>()
            .await
            .map_err(|error| CalendarError::MalformedResponse(error.to_string()))
    }
}

fn draft_body(draft: &EventDraft) -> Value {
    let mut body = json!({
        "summary": draft.summary,
        "location": draft.location,
        "description": draft.description,
        "start": {
            "dateTime": draft.start.to_rfc3339(),
            "timeZone": EVENT_TIMEZONE,
        },
        "end": {
            "dateTime": draft.end.to_rfc3339(),
            "timeZone": EVENT_TIMEZONE,
        },
        "reminders": {
            "useDefault": false,
            "overrides": [
                {"method": "email", "minutes": 24 * 60},
                {"method": "popup", "minutes": 30},
            ],
        },
    });

    if !draft.attendee_emails.is_empty() {
        body["attendees"] = draft
            .attendee_emails
            .iter()
            .filter(|email| !email.is_empty())
            .map(|email| json!({"email": email}))
            .collect::<Vec<_>>()
            .into();
        body["guestsCanModify"] = json!(false);
        body["guestsCanInviteOthers"] = json!(false);
        body["guestsCanSeeOtherGuests"] = json!(true);
    }

    body
}

#[async_trait]
impl CalendarGateway for HttpCalendarGateway {
    async fn create_event(&self, draft: &EventDraft) -> Result<CreatedEvent, CalendarError> {
        let response = self
            .client
            .post(self.events_url())
            .bearer_auth(self.api_token.expose_secret())
            .query(&[("sendUpdates", "all")])
            .json(&draft_body(draft))
            .send()
            .await?;

        let created = Self::decode_event(response).await?;
        debug!(event_id = %created.id, "created calendar event");
        Ok(CreatedEvent { id: created.id, html_link: created.html_link })
    }

    async fn get_event(&self, event_id: &str) -> Result<CalendarEvent, CalendarError> {
        let response = self
            .client
            .get(self.event_url(event_id))
            .bearer_auth(self.api_token.expose_secret())
            .send()
            .await?;

        Ok(Self::decode_event(response).await?.into())
    }

    async fn update_event(
        &self,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<CreatedEvent, CalendarError> {
        // Read-modify-write; the API replaces the event wholesale on PUT.
        let existing = self.get_event(event_id).await?;

        let body = json!({
            "summary": patch.summary.clone().unwrap_or(existing.summary),
            "location": patch.location.clone().unwrap_or(existing.location),
            "description": patch.description.clone().unwrap_or(existing.description),
            "start": {
                "dateTime": patch
                    .start
                    .map(|start| start.to_rfc3339())
                    .unwrap_or(existing.start),
                "timeZone": EVENT_TIMEZONE,
            },
            "end": {
                "dateTime": patch.end.map(|end| end.to_rfc3339()).unwrap_or(existing.end),
                "timeZone": EVENT_TIMEZONE,
            },
            "attendees": existing
                .attendee_emails
                .iter()
                .map(|email| json!({"email": email}))
                .collect::<Vec<_>>(),
        });

        let response = self
            .client
            .put(self.event_url(event_id))
            .bearer_auth(self.api_token.expose_secret())
            .query(&[("sendUpdates", "all")])
            .json(&body)
            .send()
            .await?;

        let updated = Self::decode_event(response).await?;
        Ok(CreatedEvent { id: updated.id, html_link: updated.html_link })
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError> {
        let response = self
            .client
            .delete(self.event_url(event_id))
            .bearer_auth(self.api_token.expose_secret())
            .query(&[("sendUpdates", "all")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CalendarError::Api { status: status.as_u16(), message });
        }
        Ok(())
    }
}

/// In-process stand-in used by service tests; stores created events in order.
pub struct RecordingCalendarGateway {
    state: Mutex<RecordingState>,
    fail_creates: bool,
}

#[derive(Default)]
struct RecordingState {
    events: Vec<(String, EventDraft)>,
    next_id: u64,
}

impl Default for RecordingCalendarGateway {
    fn default() -> Self {
        Self { state: Mutex::new(RecordingState::default()), fail_creates: false }
    }
}

impl RecordingCalendarGateway {
    /// A gateway whose `create_event` always fails, for error-path tests.
    pub fn failing() -> Self {
        Self { state: Mutex::new(RecordingState::default()), fail_creates: true }
    }

    pub async fn created_events(&self) -> Vec<(String, EventDraft)> {
        self.state.lock().await.events.clone()
    }
}

#[async_trait]
impl CalendarGateway for RecordingCalendarGateway {
    async fn create_event(&self, draft: &EventDraft) -> Result<CreatedEvent, CalendarError> {
        if self.fail_creates {
            return Err(CalendarError::Api { status: 503, message: "scripted outage".to_owned() });
        }
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = format!("evt-{}", state.next_id);
        state.events.push((id.clone(), draft.clone()));
        Ok(CreatedEvent {
            id: id.clone(),
            html_link: format!("https://calendar.google.com/event?eid={id}"),
        })
    }

    async fn get_event(&self, event_id: &str) -> Result<CalendarEvent, CalendarError> {
        let state = self.state.lock().await;
        state
            .events
            .iter()
            .find(|(id, _)| id == event_id)
            .map(|(id, draft)| CalendarEvent {
                id: id.clone(),
                summary: draft.summary.clone(),
                start: draft.start.to_rfc3339(),
                end: draft.end.to_rfc3339(),
                location: draft.location.clone(),
                description: draft.description.clone(),
                attendee_emails: draft.attendee_emails.clone(),
                html_link: format!("https://calendar.google.com/event?eid={id}"),
            })
            .ok_or(CalendarError::Api { status: 404, message: "event not found".to_owned() })
    }

    async fn update_event(
        &self,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<CreatedEvent, CalendarError> {
        let mut state = self.state.lock().await;
        let Some((id, draft)) = state.events.iter_mut().find(|(id, _)| id == event_id) else {
            return Err(CalendarError::Api { status: 404, message: "event not found".to_owned() });
        };
        if let Some(summary) = &patch.summary {
            draft.summary = summary.clone();
        }
        if let Some(start) = patch.start {
            draft.start = start;
        }
        if let Some(end) = patch.end {
            draft.end = end;
        }
        if let Some(description) = &patch.description {
            draft.description = description.clone();
        }
        if let Some(location) = &patch.location {
            draft.location = location.clone();
        }
        let id = id.clone();
        Ok(CreatedEvent {
            id: id.clone(),
            html_link: format!("https://calendar.google.com/event?eid={id}"),
        })
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError> {
        let mut state = self.state.lock().await;
        let before = state.events.len();
        state.events.retain(|(id, _)| id != event_id);
        if state.events.len() == before {
            return Err(CalendarError::Api { status: 404, message: "event not found".to_owned() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};

    use super::{
        draft_body, CalendarGateway, EventDraft, EventPatch, RecordingCalendarGateway,
    };

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).expect("UTC+9 is a valid offset")
    }

    fn sample_draft() -> EventDraft {
        EventDraft {
            summary: "週末の過ごし方 - ミーティング".to_owned(),
            description: "Slackの話題から作成されたミーティングです。".to_owned(),
            location: String::new(),
            start: jst().with_ymd_and_hms(2025, 12, 10, 15, 0, 0).single().expect("valid"),
            end: jst().with_ymd_and_hms(2025, 12, 10, 16, 0, 0).single().expect("valid"),
            attendee_emails: vec!["tanaka@example.com".to_owned()],
        }
    }

    #[test]
    fn draft_body_carries_jst_times_and_reminder_overrides() {
        let body = draft_body(&sample_draft());
        assert_eq!(body["start"]["dateTime"], "2025-12-10T15:00:00+09:00");
        assert_eq!(body["start"]["timeZone"], "Asia/Tokyo");
        assert_eq!(body["reminders"]["useDefault"], false);
        assert_eq!(body["reminders"]["overrides"][0]["minutes"], 1440);
        assert_eq!(body["attendees"][0]["email"], "tanaka@example.com");
        assert_eq!(body["guestsCanModify"], false);
    }

    #[test]
    fn draft_body_omits_guest_policy_without_attendees() {
        let mut draft = sample_draft();
        draft.attendee_emails.clear();
        let body = draft_body(&draft);
        assert!(body.get("attendees").is_none());
        assert!(body.get("guestsCanModify").is_none());
    }

    #[tokio::test]
    async fn recording_gateway_round_trips_create_get_update_delete() {
        let gateway = RecordingCalendarGateway::default();
        let created = gateway.create_event(&sample_draft()).await.expect("create");
        assert_eq!(created.id, "evt-1");
        assert!(created.html_link.contains("evt-1"));

        let fetched = gateway.get_event("evt-1").await.expect("get");
        assert_eq!(fetched.summary, "週末の過ごし方 - ミーティング");

        gateway
            .update_event(
                "evt-1",
                &EventPatch { summary: Some("変更後".to_owned()), ..EventPatch::default() },
            )
            .await
            .expect("update");
        let fetched = gateway.get_event("evt-1").await.expect("get");
        assert_eq!(fetched.summary, "変更後");

        gateway.delete_event("evt-1").await.expect("delete");
        assert!(gateway.get_event("evt-1").await.is_err());
    }

    #[tokio::test]
    async fn failing_gateway_rejects_creates() {
        let gateway = RecordingCalendarGateway::failing();
        assert!(gateway.create_event(&sample_draft()).await.is_err());
        assert!(gateway.created_events().await.is_empty());
    }
}
