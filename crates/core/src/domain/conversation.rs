use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }
}

/// A retrospectively analyzed channel message kept as future topic material.
/// `is_used_for_topic` flips once the poster consumes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub channel_id: String,
    pub message_ts: String,
    pub keywords: Vec<String>,
    pub participants: Vec<String>,
    pub reaction_count: u32,
    pub sentiment: Sentiment,
    pub is_used_for_topic: bool,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(
        channel_id: impl Into<String>,
        message_ts: impl Into<String>,
        keywords: Vec<String>,
        participants: Vec<String>,
        reaction_count: u32,
        sentiment: Sentiment,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ConversationId::generate(),
            channel_id: channel_id.into(),
            message_ts: message_ts.into(),
            keywords,
            participants,
            reaction_count,
            sentiment,
            is_used_for_topic: false,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Sentiment;

    #[test]
    fn sentiment_round_trips_through_strings() {
        for sentiment in [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative] {
            assert_eq!(Sentiment::parse(sentiment.as_str()), Some(sentiment));
        }
        assert_eq!(Sentiment::parse("mixed"), None);
    }
}
