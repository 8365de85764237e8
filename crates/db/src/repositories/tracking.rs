use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use kindler_core::domain::topic::TopicId;
use kindler_core::domain::tracking::{EventTracking, ReactionRecord, TrackingId, TrackingStatus};

use super::{RepositoryError, TrackingRepository};
use crate::DbPool;

pub struct SqlTrackingRepository {
    pool: DbPool,
}

impl SqlTrackingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_reactions(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<Vec<ReactionRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT user_id, user_email, reaction, recorded_at
             FROM tracking_reaction
             WHERE tracking_id = ?
             ORDER BY id ASC",
        )
        .bind(&tracking_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(reaction_from_row).collect()
    }

    async fn hydrate(&self, row: SqliteRow) -> Result<EventTracking, RepositoryError> {
        let mut tracking = tracking_from_row(row)?;
        tracking.reactions = self.load_reactions(&tracking.id).await?;
        Ok(tracking)
    }
}

#[async_trait::async_trait]
impl TrackingRepository for SqlTrackingRepository {
    async fn find_by_id(&self, id: &TrackingId) -> Result<Option<EventTracking>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                id,
                channel_id,
                message_ts,
                topic_id,
                event_title,
                status,
                calendar_event_id,
                created_at,
                updated_at
             FROM event_tracking
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_active_by_message(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<Option<EventTracking>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                id,
                channel_id,
                message_ts,
                topic_id,
                event_title,
                status,
                calendar_event_id,
                created_at,
                updated_at
             FROM event_tracking
             WHERE channel_id = ?
               AND message_ts = ?
               AND status IN ('collecting_reactions', 'scheduling')",
        )
        .bind(channel_id)
        .bind(message_ts)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn save(&self, tracking: EventTracking) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO event_tracking (
                id,
                channel_id,
                message_ts,
                topic_id,
                event_title,
                status,
                calendar_event_id,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                channel_id = excluded.channel_id,
                message_ts = excluded.message_ts,
                topic_id = excluded.topic_id,
                event_title = excluded.event_title,
                status = excluded.status,
                calendar_event_id = excluded.calendar_event_id,
                updated_at = excluded.updated_at",
        )
        .bind(&tracking.id.0)
        .bind(&tracking.channel_id)
        .bind(&tracking.message_ts)
        .bind(tracking.topic_id.as_ref().map(|id| id.0.as_str()))
        .bind(tracking.event_title.as_deref())
        .bind(tracking.status.as_str())
        .bind(tracking.calendar_event_id.as_deref())
        .bind(tracking.created_at.to_rfc3339())
        .bind(tracking.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        // The reaction list is replaced wholesale so the stored rows always
        // mirror the aggregate, insertion order included.
        sqlx::query("DELETE FROM tracking_reaction WHERE tracking_id = ?")
            .bind(&tracking.id.0)
            .execute(&mut *tx)
            .await?;

        for reaction in &tracking.reactions {
            sqlx::query(
                "INSERT INTO tracking_reaction (
                    tracking_id,
                    user_id,
                    user_email,
                    reaction,
                    recorded_at
                 ) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&tracking.id.0)
            .bind(&reaction.user_id)
            .bind(&reaction.user_email)
            .bind(&reaction.reaction)
            .bind(reaction.recorded_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn tracking_from_row(row: SqliteRow) -> Result<EventTracking, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = TrackingStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown tracking status `{status_raw}`"))
    })?;

    Ok(EventTracking {
        id: TrackingId(row.try_get("id")?),
        channel_id: row.try_get("channel_id")?,
        message_ts: row.try_get("message_ts")?,
        topic_id: row.try_get::<Option<String>, _>("topic_id")?.map(TopicId),
        event_title: row.try_get("event_title")?,
        status,
        reactions: Vec::new(),
        calendar_event_id: row.try_get("calendar_event_id")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn reaction_from_row(row: SqliteRow) -> Result<ReactionRecord, RepositoryError> {
    Ok(ReactionRecord {
        user_id: row.try_get("user_id")?,
        user_email: row.try_get("user_email")?,
        reaction: row.try_get("reaction")?,
        recorded_at: parse_timestamp("recorded_at", row.try_get("recorded_at")?)?,
    })
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: String,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}
