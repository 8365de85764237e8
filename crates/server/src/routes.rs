use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use tracing::{error, warn};
use uuid::Uuid;

use kindler_core::{ApplicationError, InterfaceError};
use kindler_db::DbPool;
use kindler_slack::events::{parse_envelope, EventContext, SlackEvent};

use crate::health;
use crate::poster::PostingService;
use crate::tracking::TrackingService;

#[derive(Clone)]
pub struct AppState {
    pub tracking: Arc<TrackingService>,
    pub poster: Arc<PostingService>,
}

pub fn router(state: AppState, db_pool: DbPool) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .route("/jobs/post", post(run_scheduled_post))
        .with_state(state)
        .merge(health::router(db_pool))
}

/// Events API endpoint. Answers the URL verification handshake directly and
/// feeds everything else through the tracking service.
async fn slack_events(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let ctx = EventContext { correlation_id: Uuid::new_v4().to_string() };

    let event = match parse_envelope(&body) {
        Ok(event) => event,
        Err(parse_error) => {
            warn!(
                event_name = "interface.slack.envelope_rejected",
                correlation_id = %ctx.correlation_id,
                error = %parse_error,
                "slack event envelope rejected"
            );
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "error": parse_error.to_string() })),
            );
        }
    };

    match event {
        SlackEvent::UrlVerification { challenge } => {
            (StatusCode::OK, Json(json!({ "challenge": challenge })))
        }
        SlackEvent::ReactionAdded(reaction) => {
            match state.tracking.record_reaction(&reaction, &ctx).await {
                Ok(outcome) => (StatusCode::OK, Json(json!({ "ok": true, "outcome": outcome }))),
                Err(service_error) => internal_error(&ctx, service_error.into()),
            }
        }
        SlackEvent::ThreadMessage(reply) => {
            match state.tracking.resolve_schedule(&reply, &ctx).await {
                Ok(outcome) => (StatusCode::OK, Json(json!({ "ok": true, "outcome": outcome }))),
                Err(service_error) => internal_error(&ctx, service_error.into()),
            }
        }
        SlackEvent::Unsupported { event_type } => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "outcome": { "success": true, "action": "ignored", "reason": event_type }
            })),
        ),
    }
}

/// Trigger for the scheduled conversation-starter post, called by the
/// external scheduler.
async fn run_scheduled_post(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let ctx = EventContext { correlation_id: Uuid::new_v4().to_string() };
    match state.poster.post_scheduled().await {
        Ok(outcome) => {
            (StatusCode::OK, Json(json!({ "ok": outcome.success, "outcome": outcome })))
        }
        Err(service_error) => internal_error(&ctx, service_error.into()),
    }
}

/// Logs the full error, then answers with the sanitized interface message so
/// internal details never reach the caller.
fn internal_error(ctx: &EventContext, app_error: ApplicationError) -> (StatusCode, Json<Value>) {
    error!(
        event_name = "interface.http.request_failed",
        correlation_id = %ctx.correlation_id,
        error = %app_error,
        "request processing failed"
    );
    let interface = app_error.into_interface(ctx.correlation_id.clone());
    let status = match interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({
            "ok": false,
            "error": interface.user_message(),
            "correlation_id": ctx.correlation_id,
        })),
    )
}
