use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionId(pub String);

impl QuestionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Record of one question posed to a member. The asked-at history is what
/// spreads questions evenly across the channel over time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: QuestionId,
    pub user_id: String,
    pub asked_at: DateTime<Utc>,
    pub content: String,
    pub channel_id: String,
    pub message_ts: String,
    pub response_count: u32,
    pub reaction_count: u32,
}

impl QuestionRecord {
    pub fn new(
        user_id: impl Into<String>,
        content: impl Into<String>,
        channel_id: impl Into<String>,
        message_ts: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: QuestionId::generate(),
            user_id: user_id.into(),
            asked_at: now,
            content: content.into(),
            channel_id: channel_id.into(),
            message_ts: message_ts.into(),
            response_count: 0,
            reaction_count: 0,
        }
    }
}
