use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use kindler_core::config::AppConfig;
use kindler_core::prompts::{
    choose_post_kind, question_text, select_question_target, PostKind, TopicCatalog,
};
use kindler_core::{ApplicationError, EventTracking, QuestionRecord, Topic, TopicCategory};
use kindler_db::repositories::{
    QuestionRepository, RepositoryError, TopicRepository, TrackingRepository,
};
use kindler_slack::blocks::{question_message, topic_message};
use kindler_slack::gateway::{ChatGateway, GatewayError};

/// Slack's own notification bot, never a question target.
const SLACKBOT_USER_ID: &str = "USLACKBOT";

#[derive(Debug, Error)]
pub enum PostingServiceError {
    #[error("repository failure: {0}")]
    Repository(#[from] RepositoryError),
    #[error("chat gateway failure: {0}")]
    Chat(#[from] GatewayError),
    #[error("topic catalog failed to load: {0}")]
    Catalog(#[from] serde_json::Error),
}

impl From<PostingServiceError> for ApplicationError {
    fn from(error: PostingServiceError) -> Self {
        match error {
            PostingServiceError::Repository(inner) => Self::Persistence(inner.to_string()),
            PostingServiceError::Chat(inner) => Self::Integration(inner.to_string()),
            PostingServiceError::Catalog(inner) => Self::Configuration(inner.to_string()),
        }
    }
}

/// Outcome of one scheduled posting run, serialized into the job response.
#[derive(Clone, Debug, Serialize)]
pub struct PostOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PostOutcome {
    fn topic(message_ts: String) -> Self {
        Self {
            success: true,
            kind: Some("topic"),
            message_ts: Some(message_ts),
            target_user_id: None,
            reason: None,
        }
    }

    fn question(message_ts: String, target_user_id: String) -> Self {
        Self {
            success: true,
            kind: Some("question"),
            message_ts: Some(message_ts),
            target_user_id: Some(target_user_id),
            reason: None,
        }
    }

    fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: None,
            message_ts: None,
            target_user_id: None,
            reason: Some(reason.into()),
        }
    }
}

/// Posts the scheduled conversation starter: a catalog topic most of the
/// time, a direct question to a member for the configured share of runs.
pub struct PostingService {
    tracking: Arc<dyn TrackingRepository>,
    topics: Arc<dyn TopicRepository>,
    questions: Arc<dyn QuestionRepository>,
    chat: Arc<dyn ChatGateway>,
    channel_id: String,
    question_weight: f64,
    question_window_days: u32,
}

impl PostingService {
    pub fn new(
        tracking: Arc<dyn TrackingRepository>,
        topics: Arc<dyn TopicRepository>,
        questions: Arc<dyn QuestionRepository>,
        chat: Arc<dyn ChatGateway>,
        config: &AppConfig,
    ) -> Self {
        Self {
            tracking,
            topics,
            questions,
            chat,
            channel_id: config.posting.channel_id.clone(),
            question_weight: config.posting.question_weight,
            question_window_days: config.analysis.days,
        }
    }

    pub async fn post_scheduled(&self) -> Result<PostOutcome, PostingServiceError> {
        let mut rng = StdRng::from_entropy();
        self.post_scheduled_with_rng(&mut rng).await
    }

    pub async fn post_scheduled_with_rng<R>(
        &self,
        rng: &mut R,
    ) -> Result<PostOutcome, PostingServiceError>
    where
        R: Rng + Send,
    {
        match choose_post_kind(rng, self.question_weight) {
            PostKind::Topic => self.post_topic(rng).await,
            PostKind::Question => self.post_question(rng).await,
        }
    }

    async fn post_topic<R>(&self, rng: &mut R) -> Result<PostOutcome, PostingServiceError>
    where
        R: Rng + Send,
    {
        let catalog = TopicCatalog::builtin()?;
        let Some((category, seed)) = catalog.pick(rng) else {
            return Ok(PostOutcome::failure("topic catalog is empty"));
        };

        let posted = self
            .chat
            .post_message(&self.channel_id, None, &topic_message(category, &seed.content))
            .await?;

        let now = Utc::now();
        let topic = Topic::new(category, seed.content.clone(), seed.reaction_emoji.clone(), now);
        let topic_id = topic.id.clone();
        self.topics.save(topic).await?;
        self.tracking
            .save(EventTracking::new(posted.channel, posted.ts.clone(), Some(topic_id), now))
            .await?;

        info!(
            event_name = "app.poster.topic_posted",
            correlation_id = "scheduled-post",
            category = category.as_str(),
            message_ts = %posted.ts,
            "topic posted and tracking opened"
        );
        Ok(PostOutcome::topic(posted.ts))
    }

    async fn post_question<R>(&self, rng: &mut R) -> Result<PostOutcome, PostingServiceError>
    where
        R: Rng + Send,
    {
        let members: Vec<_> = self
            .chat
            .list_active_users()
            .await?
            .into_iter()
            .filter(|user| user.id != SLACKBOT_USER_ID)
            .collect();
        if members.is_empty() {
            info!(
                event_name = "app.poster.no_question_target",
                correlation_id = "scheduled-post",
                "no eligible member found for a question"
            );
            return Ok(PostOutcome::failure("no eligible question target"));
        }

        let since = Utc::now() - Duration::days(i64::from(self.question_window_days));
        let mut candidates = Vec::with_capacity(members.len());
        for member in &members {
            let count = self.questions.count_for_user_since(&member.id, since).await?;
            candidates.push((member.id.clone(), count));
        }
        let Some(target) = select_question_target(rng, &candidates) else {
            return Ok(PostOutcome::failure("no eligible question target"));
        };

        let text = question_text(rng, &target);
        let posted =
            self.chat.post_message(&self.channel_id, None, &question_message(&text)).await?;

        let now = Utc::now();
        self.questions
            .save(QuestionRecord::new(
                target.clone(),
                text,
                posted.channel.clone(),
                posted.ts.clone(),
                now,
            ))
            .await?;
        self.tracking.save(EventTracking::new(posted.channel, posted.ts.clone(), None, now)).await?;

        info!(
            event_name = "app.poster.question_posted",
            correlation_id = "scheduled-post",
            target_user_id = %target,
            message_ts = %posted.ts,
            "question posted and tracking opened"
        );
        Ok(PostOutcome::question(posted.ts, target))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use kindler_core::config::AppConfig;
    use kindler_core::{QuestionRecord, TrackingStatus};
    use kindler_db::repositories::{
        InMemoryQuestionRepository, InMemoryTopicRepository, InMemoryTrackingRepository,
        QuestionRepository, TrackingRepository,
    };
    use kindler_slack::gateway::{RecordingChatGateway, SlackUser};

    use super::PostingService;

    fn config(question_weight: f64) -> AppConfig {
        let mut config = AppConfig::default();
        config.posting.channel_id = "C-dev".to_string();
        config.posting.question_weight = question_weight;
        config
    }

    fn member(id: &str) -> SlackUser {
        SlackUser {
            id: id.to_string(),
            name: id.to_string(),
            email: Some(format!("{}@example.com", id.to_lowercase())),
        }
    }

    struct Harness {
        service: PostingService,
        tracking: Arc<InMemoryTrackingRepository>,
        questions: Arc<InMemoryQuestionRepository>,
        chat: Arc<RecordingChatGateway>,
    }

    fn harness(question_weight: f64, users: Vec<SlackUser>) -> Harness {
        let tracking = Arc::new(InMemoryTrackingRepository::default());
        let topics = Arc::new(InMemoryTopicRepository::default());
        let questions = Arc::new(InMemoryQuestionRepository::default());
        let chat = Arc::new(RecordingChatGateway::with_users(users));
        let service = PostingService::new(
            tracking.clone(),
            topics,
            questions.clone(),
            chat.clone(),
            &config(question_weight),
        );
        Harness { service, tracking, questions, chat }
    }

    #[tokio::test]
    async fn topic_run_posts_to_the_channel_and_opens_tracking() {
        let harness = harness(0.0, Vec::new());
        let mut rng = StdRng::seed_from_u64(7);

        let outcome = harness
            .service
            .post_scheduled_with_rng(&mut rng)
            .await
            .expect("scheduled post");

        assert!(outcome.success);
        assert_eq!(outcome.kind, Some("topic"));
        let posts = harness.chat.posts().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].channel, "C-dev");
        assert!(posts[0].thread_ts.is_none());

        let ts = outcome.message_ts.expect("message ts");
        let tracking = harness
            .tracking
            .find_active_by_message("C-dev", &ts)
            .await
            .expect("lookup")
            .expect("tracking opened");
        assert_eq!(tracking.status, TrackingStatus::CollectingReactions);
        assert!(tracking.topic_id.is_some());
    }

    #[tokio::test]
    async fn question_run_prefers_the_least_recently_asked_member() {
        let harness =
            harness(1.0, vec![member("U_FRESH"), member("U_BUSY"), member("USLACKBOT")]);
        for _ in 0..5 {
            harness
                .questions
                .save(QuestionRecord::new(
                    "U_BUSY",
                    "q",
                    "C-dev",
                    "1730000000.000001",
                    Utc::now() - Duration::days(1),
                ))
                .await
                .expect("seed question history");
        }
        let mut rng = StdRng::seed_from_u64(7);

        let outcome = harness
            .service
            .post_scheduled_with_rng(&mut rng)
            .await
            .expect("scheduled post");

        assert!(outcome.success);
        assert_eq!(outcome.kind, Some("question"));
        // Both members rank inside the candidate pool, but Slackbot never does.
        let target = outcome.target_user_id.expect("target");
        assert_ne!(target, "USLACKBOT");

        let posts = harness.chat.posts().await;
        assert_eq!(posts.len(), 1);
        assert!(posts[0].message.fallback_text.contains(&format!("<@{target}>さん")));

        let ts = outcome.message_ts.expect("message ts");
        let tracking = harness
            .tracking
            .find_active_by_message("C-dev", &ts)
            .await
            .expect("lookup")
            .expect("tracking opened");
        assert!(tracking.topic_id.is_none());
    }

    #[tokio::test]
    async fn question_run_without_members_fails_without_posting() {
        let harness = harness(1.0, vec![member("USLACKBOT")]);
        let mut rng = StdRng::seed_from_u64(7);

        let outcome = harness
            .service
            .post_scheduled_with_rng(&mut rng)
            .await
            .expect("scheduled post");

        assert!(!outcome.success);
        assert_eq!(outcome.reason.as_deref(), Some("no eligible question target"));
        assert!(harness.chat.posts().await.is_empty());
    }
}
