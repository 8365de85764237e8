pub mod config;
pub mod domain;
pub mod errors;
pub mod prompts;
pub mod schedule;
pub mod workflow;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::conversation::{Conversation, ConversationId, Sentiment};
pub use domain::question::{QuestionId, QuestionRecord};
pub use domain::topic::{Topic, TopicCategory, TopicId, FALLBACK_MEETING_TITLE};
pub use domain::tracking::{EventTracking, ReactionRecord, TrackingId, TrackingStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use prompts::{PostKind, TopicCatalog, TopicSeed};
pub use schedule::{Confidence, DEFAULT_DURATION_MINUTES};
pub use workflow::{
    TrackingAction, TrackingContext, TrackingEvent, TrackingFlow, TransitionError,
    TransitionOutcome, WorkflowEngine,
};
