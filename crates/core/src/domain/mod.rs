pub mod conversation;
pub mod question;
pub mod topic;
pub mod tracking;

pub use conversation::{Conversation, ConversationId, Sentiment};
pub use question::{QuestionId, QuestionRecord};
pub use topic::{Topic, TopicCategory, TopicId, FALLBACK_MEETING_TITLE};
pub use tracking::{EventTracking, ReactionRecord, TrackingId, TrackingStatus};
