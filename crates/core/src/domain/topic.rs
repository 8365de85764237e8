use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicId(pub String);

impl TopicId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicCategory {
    Casual,
    Technical,
}

impl TopicCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Casual => "casual",
            Self::Technical => "technical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "casual" => Some(Self::Casual),
            "technical" => Some(Self::Technical),
            _ => None,
        }
    }
}

/// A reusable discussion prompt with usage statistics. Created when the
/// poster selects it; never deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub category: TopicCategory,
    pub content: String,
    pub reaction_emoji: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: u32,
    pub total_reactions: u32,
    pub average_reactions: f64,
    pub created_at: DateTime<Utc>,
}

impl Topic {
    pub fn new(
        category: TopicCategory,
        content: impl Into<String>,
        reaction_emoji: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TopicId::generate(),
            category,
            content: content.into(),
            reaction_emoji: reaction_emoji.into(),
            last_used_at: Some(now),
            usage_count: 1,
            total_reactions: 0,
            average_reactions: 0.0,
            created_at: now,
        }
    }

    /// Folds one posting's final reaction count into the usage statistics.
    pub fn record_usage(&mut self, reactions: u32, now: DateTime<Utc>) {
        self.last_used_at = Some(now);
        self.usage_count += 1;
        self.total_reactions += reactions;
        self.average_reactions = f64::from(self.total_reactions) / f64::from(self.usage_count);
    }

    /// Meeting title derived from the topic content. Long content is cut at
    /// 50 characters before the suffix is appended.
    pub fn meeting_title(&self) -> String {
        let truncated: String = self.content.chars().take(50).collect();
        format!("{truncated} - ミーティング")
    }
}

/// Title used when a tracked message has no associated topic.
pub const FALLBACK_MEETING_TITLE: &str = "チームミーティング";

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Topic, TopicCategory};

    #[test]
    fn meeting_title_appends_suffix() {
        let topic = Topic::new(TopicCategory::Casual, "好きな本について", "books", Utc::now());
        assert_eq!(topic.meeting_title(), "好きな本について - ミーティング");
    }

    #[test]
    fn meeting_title_truncates_at_fifty_chars() {
        let content = "あ".repeat(60);
        let topic = Topic::new(TopicCategory::Casual, content, "tada", Utc::now());
        let title = topic.meeting_title();
        assert!(title.starts_with(&"あ".repeat(50)));
        assert!(title.ends_with(" - ミーティング"));
        assert_eq!(title.chars().count(), 50 + " - ミーティング".chars().count());
    }

    #[test]
    fn record_usage_tracks_running_average() {
        let mut topic = Topic::new(TopicCategory::Technical, "Rustの話", "crab", Utc::now());
        topic.record_usage(4, Utc::now());
        topic.record_usage(8, Utc::now());

        assert_eq!(topic.usage_count, 3);
        assert_eq!(topic.total_reactions, 12);
        assert!((topic.average_reactions - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn category_round_trips_through_strings() {
        for category in [TopicCategory::Casual, TopicCategory::Technical] {
            assert_eq!(TopicCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(TopicCategory::parse("serious"), None);
    }
}
