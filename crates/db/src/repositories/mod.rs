use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use kindler_core::domain::conversation::{Conversation, ConversationId};
use kindler_core::domain::question::QuestionRecord;
use kindler_core::domain::topic::{Topic, TopicId};
use kindler_core::domain::tracking::{EventTracking, TrackingId};

pub mod conversation;
pub mod memory;
pub mod question;
pub mod topic;
pub mod tracking;

pub use conversation::SqlConversationRepository;
pub use memory::{
    InMemoryConversationRepository, InMemoryQuestionRepository, InMemoryTopicRepository,
    InMemoryTrackingRepository,
};
pub use question::SqlQuestionRepository;
pub use topic::SqlTopicRepository;
pub use tracking::SqlTrackingRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait TrackingRepository: Send + Sync {
    async fn find_by_id(&self, id: &TrackingId) -> Result<Option<EventTracking>, RepositoryError>;

    /// Finds the non-terminal tracked item for a source message, if any.
    async fn find_active_by_message(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<Option<EventTracking>, RepositoryError>;

    async fn save(&self, tracking: EventTracking) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait TopicRepository: Send + Sync {
    async fn find_by_id(&self, id: &TopicId) -> Result<Option<Topic>, RepositoryError>;
    async fn save(&self, topic: Topic) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn save(&self, question: QuestionRecord) -> Result<(), RepositoryError>;

    /// Number of questions posed to a member since the given instant.
    async fn count_for_user_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, RepositoryError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn save(&self, conversation: Conversation) -> Result<(), RepositoryError>;

    /// Conversations not yet consumed as topic material, most-reacted first.
    async fn find_unused(&self, limit: u32) -> Result<Vec<Conversation>, RepositoryError>;

    async fn mark_used(&self, id: &ConversationId) -> Result<(), RepositoryError>;
}
