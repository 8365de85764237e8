use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::topic::TopicId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackingId(pub String);

impl TrackingId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Lifecycle status of one tracked post.
///
/// `Cancelled` is representable (and survives a round-trip through storage)
/// but no current operation produces it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    CollectingReactions,
    Scheduling,
    Completed,
    Cancelled,
}

impl TrackingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CollectingReactions => "collecting_reactions",
            Self::Scheduling => "scheduling",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "collecting_reactions" => Some(Self::CollectingReactions),
            "scheduling" => Some(Self::Scheduling),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// One reaction captured on the tracked message. Owned by its parent
/// `EventTracking`; never referenced independently.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub user_id: String,
    /// Resolved workspace email; empty when the profile does not expose one.
    pub user_email: String,
    pub reaction: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTracking {
    pub id: TrackingId,
    pub channel_id: String,
    pub message_ts: String,
    pub topic_id: Option<TopicId>,
    pub event_title: Option<String>,
    pub status: TrackingStatus,
    /// Append-only until the record reaches a terminal status.
    pub reactions: Vec<ReactionRecord>,
    pub calendar_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventTracking {
    pub fn new(
        channel_id: impl Into<String>,
        message_ts: impl Into<String>,
        topic_id: Option<TopicId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TrackingId::generate(),
            channel_id: channel_id.into(),
            message_ts: message_ts.into(),
            topic_id,
            event_title: None,
            status: TrackingStatus::CollectingReactions,
            reactions: Vec::new(),
            calendar_event_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_reaction(
        &mut self,
        user_id: impl Into<String>,
        user_email: impl Into<String>,
        reaction: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.reactions.push(ReactionRecord {
            user_id: user_id.into(),
            user_email: user_email.into(),
            reaction: reaction.into(),
            recorded_at: now,
        });
        self.updated_at = now;
    }

    /// Number of unique users who have reacted, regardless of how many
    /// reactions each contributed.
    pub fn distinct_reactor_count(&self) -> usize {
        let mut users: Vec<&str> =
            self.reactions.iter().map(|record| record.user_id.as_str()).collect();
        users.sort_unstable();
        users.dedup();
        users.len()
    }

    /// Deduplicated non-empty emails across all recorded reactions.
    pub fn participant_emails(&self) -> Vec<String> {
        let mut emails: Vec<String> = self
            .reactions
            .iter()
            .filter(|record| !record.user_email.is_empty())
            .map(|record| record.user_email.clone())
            .collect();
        emails.sort_unstable();
        emails.dedup();
        emails
    }

    /// Distinct user ids in first-reaction order, for completion mentions.
    pub fn reactor_user_ids(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for record in &self.reactions {
            if !seen.iter().any(|user: &String| user == &record.user_id) {
                seen.push(record.user_id.clone());
            }
        }
        seen
    }
}
