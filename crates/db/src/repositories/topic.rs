use sqlx::{sqlite::SqliteRow, Row};

use kindler_core::domain::topic::{Topic, TopicCategory, TopicId};

use super::tracking::{parse_optional_timestamp, parse_timestamp, parse_u32};
use super::{RepositoryError, TopicRepository};
use crate::DbPool;

pub struct SqlTopicRepository {
    pool: DbPool,
}

impl SqlTopicRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TopicRepository for SqlTopicRepository {
    async fn find_by_id(&self, id: &TopicId) -> Result<Option<Topic>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                id,
                category,
                content,
                reaction_emoji,
                last_used_at,
                usage_count,
                total_reactions,
                average_reactions,
                created_at
             FROM topic
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(topic_from_row).transpose()
    }

    async fn save(&self, topic: Topic) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO topic (
                id,
                category,
                content,
                reaction_emoji,
                last_used_at,
                usage_count,
                total_reactions,
                average_reactions,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                category = excluded.category,
                content = excluded.content,
                reaction_emoji = excluded.reaction_emoji,
                last_used_at = excluded.last_used_at,
                usage_count = excluded.usage_count,
                total_reactions = excluded.total_reactions,
                average_reactions = excluded.average_reactions",
        )
        .bind(&topic.id.0)
        .bind(topic.category.as_str())
        .bind(&topic.content)
        .bind(&topic.reaction_emoji)
        .bind(topic.last_used_at.map(|value| value.to_rfc3339()))
        .bind(i64::from(topic.usage_count))
        .bind(i64::from(topic.total_reactions))
        .bind(topic.average_reactions)
        .bind(topic.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn topic_from_row(row: SqliteRow) -> Result<Topic, RepositoryError> {
    let category_raw = row.try_get::<String, _>("category")?;
    let category = TopicCategory::parse(&category_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown topic category `{category_raw}`"))
    })?;

    Ok(Topic {
        id: TopicId(row.try_get("id")?),
        category,
        content: row.try_get("content")?,
        reaction_emoji: row.try_get("reaction_emoji")?,
        last_used_at: parse_optional_timestamp("last_used_at", row.try_get("last_used_at")?)?,
        usage_count: parse_u32("usage_count", row.try_get("usage_count")?)?,
        total_reactions: parse_u32("total_reactions", row.try_get("total_reactions")?)?,
        average_reactions: row.try_get("average_reactions")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
