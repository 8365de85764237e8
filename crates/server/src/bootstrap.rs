use kindler_core::config::{AppConfig, ConfigError, LoadOptions};
use kindler_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    Ok(Application { config, db_pool })
}

#[cfg(test)]
mod tests {
    use kindler_core::config::{ConfigOverrides, LoadOptions};
    use kindler_core::workflow::{TrackingContext, TrackingEvent, WorkflowEngine};
    use kindler_core::TrackingStatus;

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_on_malformed_bot_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                slack_bot_token: Some("invalid-token".to_string()),
                calendar_api_token: Some("cal-test".to_string()),
                channel_id: Some("C123".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.bot_token"));
    }

    #[tokio::test]
    async fn integration_smoke_covers_startup_schema_and_tracking_checkpoints() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN \
             ('topic', 'event_tracking', 'tracking_reaction', 'question', 'conversation')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected baseline tables to be available after bootstrap");
        assert_eq!(table_count, 5, "bootstrap should expose the baseline tracking tables");

        let engine = WorkflowEngine::default();
        let context = TrackingContext { proposal_threshold: app.config.posting.threshold };

        let collecting = engine
            .apply(
                &engine.initial_status(),
                &TrackingEvent::ReactionRecorded { distinct_reactors: 1 },
                &context,
            )
            .expect("first reaction should be accepted");
        assert_eq!(collecting.to, TrackingStatus::CollectingReactions);

        let scheduling = engine
            .apply(
                &collecting.to,
                &TrackingEvent::ReactionRecorded {
                    distinct_reactors: app.config.posting.threshold,
                },
                &context,
            )
            .expect("threshold reaction should fire the proposal");
        assert_eq!(scheduling.to, TrackingStatus::Scheduling);

        let completed = engine
            .apply(&scheduling.to, &TrackingEvent::ScheduleParsed, &context)
            .expect("parsed schedule should complete the tracking");
        assert_eq!(completed.to, TrackingStatus::Completed);

        app.db_pool.close().await;
    }

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                slack_bot_token: Some("xoxb-test".to_string()),
                calendar_api_token: Some("cal-test".to_string()),
                channel_id: Some("C123".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }
}
