mod bootstrap;
mod health;
mod poster;
mod routes;
mod tracking;

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use kindler_calendar::HttpCalendarGateway;
use kindler_core::config::{AppConfig, LoadOptions};
use kindler_core::workflow::TrackingContext;
use kindler_db::repositories::{
    SqlQuestionRepository, SqlTopicRepository, SqlTrackingRepository,
};
use kindler_slack::gateway::HttpChatGateway;

use crate::poster::PostingService;
use crate::routes::AppState;
use crate::tracking::TrackingService;

fn init_logging(config: &AppConfig) {
    use kindler_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    // Now bootstrap using the same config we already loaded
    let app = bootstrap::bootstrap_with_config(config).await?;

    let tracking_repo = Arc::new(SqlTrackingRepository::new(app.db_pool.clone()));
    let topic_repo = Arc::new(SqlTopicRepository::new(app.db_pool.clone()));
    let question_repo = Arc::new(SqlQuestionRepository::new(app.db_pool.clone()));
    let chat = Arc::new(HttpChatGateway::new(app.config.slack.bot_token.clone()));
    let calendar = Arc::new(HttpCalendarGateway::new(
        app.config.calendar.api_token.clone(),
        app.config.calendar.calendar_id.clone(),
    ));

    let state = AppState {
        tracking: Arc::new(TrackingService::new(
            tracking_repo.clone(),
            topic_repo.clone(),
            chat.clone(),
            calendar,
            TrackingContext { proposal_threshold: app.config.posting.threshold },
        )),
        poster: Arc::new(PostingService::new(
            tracking_repo,
            topic_repo,
            question_repo,
            chat,
            &app.config,
        )),
    };
    let router = routes::router(state, app.db_pool.clone());

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "kindler-server started"
    );

    let shutdown_started = Arc::new(tokio::sync::Notify::new());
    let shutdown_signal = {
        let shutdown_started = shutdown_started.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                "shutdown signal received, draining in-flight requests"
            );
            shutdown_started.notify_one();
        }
    };
    let serve = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal).into_future();
    let deadline = app.config.server.graceful_shutdown_secs;

    tokio::select! {
        result = serve => {
            result?;
            tracing::info!(
                event_name = "system.server.stopped",
                correlation_id = "shutdown",
                "kindler-server stopped"
            );
        }
        _ = async {
            shutdown_started.notified().await;
            tokio::time::sleep(Duration::from_secs(deadline)).await;
        } => {
            tracing::warn!(
                event_name = "system.server.shutdown_deadline",
                correlation_id = "shutdown",
                deadline_secs = deadline,
                "graceful shutdown deadline exceeded, aborting in-flight requests"
            );
        }
    }

    Ok(())
}
