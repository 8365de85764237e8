use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::blocks::MessageTemplate;

const DEFAULT_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("chat transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("chat api `{method}` rejected the call: {error}")]
    Api { method: &'static str, error: String },
    #[error("chat api `{method}` returned an unreadable response: {detail}")]
    MalformedResponse { method: &'static str, detail: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Posts to a channel, or into a thread when `thread_ts` is given.
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        message: &MessageTemplate,
    ) -> Result<PostedMessage, GatewayError>;

    async fn user_info(&self, user_id: &str) -> Result<SlackUser, GatewayError>;

    /// Active human members of the workspace; bots and deleted users are excluded.
    async fn list_active_users(&self) -> Result<Vec<SlackUser>, GatewayError>;
}

pub struct HttpChatGateway {
    client: reqwest::Client,
    bot_token: SecretString,
    api_base: String,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user: Option<UserPayload>,
}

#[derive(Deserialize)]
struct UsersListResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    members: Vec<UserPayload>,
}

#[derive(Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    is_bot: bool,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    profile: UserProfilePayload,
}

#[derive(Default, Deserialize)]
struct UserProfilePayload {
    #[serde(default)]
    email: Option<String>,
}

impl From<UserPayload> for SlackUser {
    fn from(payload: UserPayload) -> Self {
        let name = payload.real_name.unwrap_or(payload.name);
        let email = payload.profile.email.filter(|email| !email.is_empty());
        Self { id: payload.id, name, email }
    }
}

impl HttpChatGateway {
    pub fn new(bot_token: SecretString) -> Self {
        Self::with_api_base(bot_token, DEFAULT_API_BASE)
    }

    pub fn with_api_base(bot_token: SecretString, api_base: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), bot_token, api_base: api_base.into() }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }
}

#[async_trait]
impl ChatGateway for HttpChatGateway {
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        message: &MessageTemplate,
    ) -> Result<PostedMessage, GatewayError> {
        let mut body = json!({
            "channel": channel,
            "text": message.fallback_text,
        });
        if !message.blocks.is_empty() {
            body["blocks"] = serde_json::to_value(&message.blocks).map_err(|error| {
                GatewayError::MalformedResponse {
                    method: "chat.postMessage",
                    detail: error.to_string(),
                }
            })?;
        }
        if let Some(thread_ts) = thread_ts {
            body["thread_ts"] = json!(thread_ts);
        }

        let response: PostMessageResponse = self
            .client
            .post(self.endpoint("chat.postMessage"))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(GatewayError::Api {
                method: "chat.postMessage",
                error: response.error.unwrap_or_else(|| "unknown error".to_owned()),
            });
        }

        let ts = response.ts.ok_or(GatewayError::MalformedResponse {
            method: "chat.postMessage",
            detail: "ok response without ts".to_owned(),
        })?;
        let channel = response.channel.unwrap_or_else(|| channel.to_owned());
        debug!(%channel, %ts, "posted chat message");
        Ok(PostedMessage { channel, ts })
    }

    async fn user_info(&self, user_id: &str) -> Result<SlackUser, GatewayError> {
        let response: UserInfoResponse = self
            .client
            .get(self.endpoint("users.info"))
            .bearer_auth(self.bot_token.expose_secret())
            .query(&[("user", user_id)])
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(GatewayError::Api {
                method: "users.info",
                error: response.error.unwrap_or_else(|| "unknown error".to_owned()),
            });
        }

        response.user.map(SlackUser::from).ok_or(GatewayError::MalformedResponse {
            method: "users.info",
            detail: "ok response without user".to_owned(),
        })
    }

    async fn list_active_users(&self) -> Result<Vec<SlackUser>, GatewayError> {
        let response: UsersListResponse = self
            .client
            .get(self.endpoint("users.list"))
            .bearer_auth(self.bot_token.expose_secret())
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(GatewayError::Api {
                method: "users.list",
                error: response.error.unwrap_or_else(|| "unknown error".to_owned()),
            });
        }

        Ok(response
            .members
            .into_iter()
            .filter(|member| !member.is_bot && !member.deleted)
            .map(SlackUser::from)
            .collect())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedPost {
    pub channel: String,
    pub thread_ts: Option<String>,
    pub message: MessageTemplate,
    pub ts: String,
}

/// In-process stand-in for the chat API used by service tests.
pub struct RecordingChatGateway {
    state: Mutex<RecordingState>,
}

#[derive(Default)]
struct RecordingState {
    posts: Vec<RecordedPost>,
    users: Vec<SlackUser>,
    next_ts: u64,
}

impl Default for RecordingChatGateway {
    fn default() -> Self {
        Self { state: Mutex::new(RecordingState::default()) }
    }
}

impl RecordingChatGateway {
    pub fn with_users(users: Vec<SlackUser>) -> Self {
        Self { state: Mutex::new(RecordingState { users, ..RecordingState::default() }) }
    }

    pub async fn posts(&self) -> Vec<RecordedPost> {
        self.state.lock().await.posts.clone()
    }
}

#[async_trait]
impl ChatGateway for RecordingChatGateway {
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        message: &MessageTemplate,
    ) -> Result<PostedMessage, GatewayError> {
        let mut state = self.state.lock().await;
        state.next_ts += 1;
        let ts = format!("1730000000.{:06}", state.next_ts);
        state.posts.push(RecordedPost {
            channel: channel.to_owned(),
            thread_ts: thread_ts.map(str::to_owned),
            message: message.clone(),
            ts: ts.clone(),
        });
        Ok(PostedMessage { channel: channel.to_owned(), ts })
    }

    async fn user_info(&self, user_id: &str) -> Result<SlackUser, GatewayError> {
        let state = self.state.lock().await;
        state.users.iter().find(|user| user.id == user_id).cloned().ok_or(GatewayError::Api {
            method: "users.info",
            error: "user_not_found".to_owned(),
        })
    }

    async fn list_active_users(&self) -> Result<Vec<SlackUser>, GatewayError> {
        Ok(self.state.lock().await.users.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{ChatGateway, RecordingChatGateway, SlackUser};
    use crate::blocks::MessageTemplate;

    #[tokio::test]
    async fn recording_gateway_assigns_monotonic_timestamps() {
        let gateway = RecordingChatGateway::default();
        let first = gateway
            .post_message("C1", None, &MessageTemplate::plain("一件目"))
            .await
            .expect("post");
        let second = gateway
            .post_message("C1", Some(&first.ts), &MessageTemplate::plain("二件目"))
            .await
            .expect("post");
        assert!(second.ts > first.ts);

        let posts = gateway.posts().await;
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].thread_ts.as_deref(), Some(first.ts.as_str()));
    }

    #[tokio::test]
    async fn recording_gateway_resolves_scripted_users() {
        let gateway = RecordingChatGateway::with_users(vec![SlackUser {
            id: "U1".to_owned(),
            name: "Tanaka".to_owned(),
            email: Some("tanaka@example.com".to_owned()),
        }]);

        let user = gateway.user_info("U1").await.expect("lookup");
        assert_eq!(user.email.as_deref(), Some("tanaka@example.com"));
        assert!(gateway.user_info("U9").await.is_err());
    }
}
