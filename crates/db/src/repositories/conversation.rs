use sqlx::{sqlite::SqliteRow, Row};

use kindler_core::domain::conversation::{Conversation, ConversationId, Sentiment};

use super::tracking::{parse_timestamp, parse_u32};
use super::{ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn save(&self, conversation: Conversation) -> Result<(), RepositoryError> {
        let keywords_json = serde_json::to_string(&conversation.keywords)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let participants_json = serde_json::to_string(&conversation.participants)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO conversation (
                id,
                channel_id,
                message_ts,
                keywords_json,
                participants_json,
                reaction_count,
                sentiment,
                is_used_for_topic,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                keywords_json = excluded.keywords_json,
                participants_json = excluded.participants_json,
                reaction_count = excluded.reaction_count,
                sentiment = excluded.sentiment,
                is_used_for_topic = excluded.is_used_for_topic",
        )
        .bind(&conversation.id.0)
        .bind(&conversation.channel_id)
        .bind(&conversation.message_ts)
        .bind(keywords_json)
        .bind(participants_json)
        .bind(i64::from(conversation.reaction_count))
        .bind(conversation.sentiment.as_str())
        .bind(conversation.is_used_for_topic)
        .bind(conversation.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_unused(&self, limit: u32) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                id,
                channel_id,
                message_ts,
                keywords_json,
                participants_json,
                reaction_count,
                sentiment,
                is_used_for_topic,
                created_at
             FROM conversation
             WHERE is_used_for_topic = 0
             ORDER BY reaction_count DESC, created_at DESC
             LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(conversation_from_row).collect()
    }

    async fn mark_used(&self, id: &ConversationId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE conversation SET is_used_for_topic = 1 WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn conversation_from_row(row: SqliteRow) -> Result<Conversation, RepositoryError> {
    let sentiment_raw = row.try_get::<String, _>("sentiment")?;
    let sentiment = Sentiment::parse(&sentiment_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown sentiment `{sentiment_raw}`")))?;

    let keywords_json = row.try_get::<String, _>("keywords_json")?;
    let keywords: Vec<String> = serde_json::from_str(&keywords_json)
        .map_err(|error| RepositoryError::Decode(format!("invalid keywords_json: {error}")))?;

    let participants_json = row.try_get::<String, _>("participants_json")?;
    let participants: Vec<String> = serde_json::from_str(&participants_json)
        .map_err(|error| RepositoryError::Decode(format!("invalid participants_json: {error}")))?;

    Ok(Conversation {
        id: ConversationId(row.try_get("id")?),
        channel_id: row.try_get("channel_id")?,
        message_ts: row.try_get("message_ts")?,
        keywords,
        participants,
        reaction_count: parse_u32("reaction_count", row.try_get("reaction_count")?)?,
        sentiment,
        is_used_for_topic: row.try_get("is_used_for_topic")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use kindler_core::domain::conversation::{Conversation, Sentiment};

    use super::SqlConversationRepository;
    use crate::migrations;
    use crate::repositories::ConversationRepository;
    use crate::{connect_with_settings, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }

    fn sample(message_ts: &str, reactions: u32) -> Conversation {
        Conversation::new(
            "C0GENERAL",
            message_ts,
            vec!["Rust".to_string(), "非同期".to_string()],
            vec!["U1".to_string(), "U2".to_string()],
            reactions,
            Sentiment::Positive,
            parse_ts("2026-02-23T09:00:00Z"),
        )
    }

    #[tokio::test]
    async fn unused_lookup_orders_by_reactions_and_skips_consumed() {
        let pool = setup_pool().await;
        let repo = SqlConversationRepository::new(pool.clone());

        let quiet = sample("1730000000.000100", 2);
        let lively = sample("1730000000.000200", 9);
        repo.save(quiet.clone()).await.expect("save quiet");
        repo.save(lively.clone()).await.expect("save lively");

        let unused = repo.find_unused(10).await.expect("find unused");
        assert_eq!(unused, vec![lively.clone(), quiet.clone()]);

        repo.mark_used(&lively.id).await.expect("mark used");

        let unused = repo.find_unused(10).await.expect("find unused again");
        assert_eq!(unused, vec![quiet]);

        pool.close().await;
    }
}
