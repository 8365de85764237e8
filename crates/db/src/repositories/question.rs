use chrono::{DateTime, Utc};
use sqlx::Row;

use kindler_core::domain::question::QuestionRecord;

use super::{QuestionRepository, RepositoryError};
use crate::DbPool;

pub struct SqlQuestionRepository {
    pool: DbPool,
}

impl SqlQuestionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl QuestionRepository for SqlQuestionRepository {
    async fn save(&self, question: QuestionRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO question (
                id,
                user_id,
                asked_at,
                content,
                channel_id,
                message_ts,
                response_count,
                reaction_count
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                response_count = excluded.response_count,
                reaction_count = excluded.reaction_count",
        )
        .bind(&question.id.0)
        .bind(&question.user_id)
        .bind(question.asked_at.to_rfc3339())
        .bind(&question.content)
        .bind(&question.channel_id)
        .bind(&question.message_ts)
        .bind(i64::from(question.response_count))
        .bind(i64::from(question.reaction_count))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_for_user_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let count = sqlx::query(
            "SELECT COUNT(*) AS count FROM question WHERE user_id = ? AND asked_at >= ?",
        )
        .bind(user_id)
        .bind(since.to_rfc3339())
        .fetch_one(&self.pool)
        .await?
        .get::<i64, _>("count");

        usize::try_from(count)
            .map_err(|_| RepositoryError::Decode(format!("negative question count: {count}")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use kindler_core::domain::question::QuestionRecord;

    use super::SqlQuestionRepository;
    use crate::migrations;
    use crate::repositories::QuestionRepository;
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

    #[tokio::test]
    async fn recent_count_respects_the_window() {
        let pool = setup_pool().await;
        let repo = SqlQuestionRepository::new(pool.clone());

        let now = parse_ts("2026-02-23T09:00:00Z");
        let recent =
            QuestionRecord::new("U1", "最近どうですか？", "C0GENERAL", "1730000000.000200", now);
        let stale = QuestionRecord::new(
            "U1",
            "前回の質問",
            "C0GENERAL",
            "1729000000.000100",
            now - Duration::days(30),
        );
        let other =
            QuestionRecord::new("U2", "お元気ですか？", "C0GENERAL", "1730000000.000300", now);

        repo.save(recent).await.expect("save recent");
        repo.save(stale).await.expect("save stale");
        repo.save(other).await.expect("save other");

        let window_start = now - Duration::days(7);
        assert_eq!(repo.count_for_user_since("U1", window_start).await.expect("count"), 1);
        assert_eq!(repo.count_for_user_since("U2", window_start).await.expect("count"), 1);
        assert_eq!(repo.count_for_user_since("U3", window_start).await.expect("count"), 0);

        pool.close().await;
    }
}
