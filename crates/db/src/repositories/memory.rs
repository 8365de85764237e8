use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use kindler_core::domain::conversation::{Conversation, ConversationId};
use kindler_core::domain::question::QuestionRecord;
use kindler_core::domain::topic::{Topic, TopicId};
use kindler_core::domain::tracking::{EventTracking, TrackingId};

use super::{
    ConversationRepository, QuestionRepository, RepositoryError, TopicRepository,
    TrackingRepository,
};

#[derive(Default)]
pub struct InMemoryTrackingRepository {
    records: RwLock<HashMap<String, EventTracking>>,
}

#[async_trait::async_trait]
impl TrackingRepository for InMemoryTrackingRepository {
    async fn find_by_id(&self, id: &TrackingId) -> Result<Option<EventTracking>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(&id.0).cloned())
    }

    async fn find_active_by_message(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<Option<EventTracking>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|tracking| {
                tracking.channel_id == channel_id
                    && tracking.message_ts == message_ts
                    && !tracking.status.is_terminal()
            })
            .cloned())
    }

    async fn save(&self, tracking: EventTracking) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        // At most one live tracked item per source message, matching the
        // partial unique index on event_tracking.
        if !tracking.status.is_terminal() {
            let conflicting = records.values().any(|existing| {
                existing.id != tracking.id
                    && existing.channel_id == tracking.channel_id
                    && existing.message_ts == tracking.message_ts
                    && !existing.status.is_terminal()
            });
            if conflicting {
                return Err(RepositoryError::Conflict(format!(
                    "active tracking already exists for {}:{}",
                    tracking.channel_id, tracking.message_ts
                )));
            }
        }
        records.insert(tracking.id.0.clone(), tracking);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTopicRepository {
    topics: RwLock<HashMap<String, Topic>>,
}

#[async_trait::async_trait]
impl TopicRepository for InMemoryTopicRepository {
    async fn find_by_id(&self, id: &TopicId) -> Result<Option<Topic>, RepositoryError> {
        let topics = self.topics.read().await;
        Ok(topics.get(&id.0).cloned())
    }

    async fn save(&self, topic: Topic) -> Result<(), RepositoryError> {
        let mut topics = self.topics.write().await;
        topics.insert(topic.id.0.clone(), topic);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryQuestionRepository {
    questions: RwLock<Vec<QuestionRecord>>,
}

#[async_trait::async_trait]
impl QuestionRepository for InMemoryQuestionRepository {
    async fn save(&self, question: QuestionRecord) -> Result<(), RepositoryError> {
        let mut questions = self.questions.write().await;
        questions.retain(|existing| existing.id != question.id);
        questions.push(question);
        Ok(())
    }

    async fn count_for_user_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let questions = self.questions.read().await;
        Ok(questions
            .iter()
            .filter(|question| question.user_id == user_id && question.asked_at >= since)
            .count())
    }
}

#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: RwLock<HashMap<String, Conversation>>,
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn save(&self, conversation: Conversation) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        conversations.insert(conversation.id.0.clone(), conversation);
        Ok(())
    }

    async fn find_unused(&self, limit: u32) -> Result<Vec<Conversation>, RepositoryError> {
        let conversations = self.conversations.read().await;
        let mut unused: Vec<Conversation> = conversations
            .values()
            .filter(|conversation| !conversation.is_used_for_topic)
            .cloned()
            .collect();
        unused.sort_by(|a, b| {
            b.reaction_count.cmp(&a.reaction_count).then(b.created_at.cmp(&a.created_at))
        });
        unused.truncate(limit as usize);
        Ok(unused)
    }

    async fn mark_used(&self, id: &ConversationId) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        if let Some(conversation) = conversations.get_mut(&id.0) {
            conversation.is_used_for_topic = true;
        }
        Ok(())
    }
}
