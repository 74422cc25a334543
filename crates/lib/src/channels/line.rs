//! LINE Messaging API client: reply, profile lookup, and leaving groups/rooms.

use crate::channels::messages::Message;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_API_BASE: &str = "https://api.line.me";

#[derive(Debug, thiserror::Error)]
pub enum LineError {
    /// Reply tokens are single-use and required; an empty one is a caller bug.
    #[error("replyToken must not be empty")]
    EmptyReplyToken,
    #[error("line request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("line api error: {0} {1}")]
    Api(reqwest::StatusCode, String),
}

/// Bot-side operations against the messaging platform. The dispatcher works
/// against this trait so tests can substitute a recording client.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Send one or more messages against a reply token.
    async fn reply_message(&self, reply_token: &str, messages: Vec<Message>)
        -> Result<(), LineError>;
    /// Fetch a user's profile.
    async fn get_profile(&self, user_id: &str) -> Result<Profile, LineError>;
    /// Leave a group chat.
    async fn leave_group(&self, group_id: &str) -> Result<(), LineError>;
    /// Leave a room.
    async fn leave_room(&self, room_id: &str) -> Result<(), LineError>;
}

/// Profile API response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub display_name: String,
    /// Absent for users who never set one.
    #[serde(default)]
    pub status_message: String,
}

/// Client for the Messaging API, authenticated with the channel access token.
#[derive(Clone)]
pub struct LineClient {
    api_base: String,
    channel_access_token: String,
    client: reqwest::Client,
}

impl LineClient {
    /// `api_base` defaults to the production endpoint; override for tests.
    pub fn new(channel_access_token: impl Into<String>, api_base: Option<String>) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self {
            api_base,
            channel_access_token: channel_access_token.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn check(res: reqwest::Response) -> Result<reqwest::Response, LineError> {
        if res.status().is_success() {
            Ok(res)
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(LineError::Api(status, body))
        }
    }

    /// POST /v2/bot/message/reply — send messages against a reply token.
    pub async fn reply_message(
        &self,
        reply_token: &str,
        messages: Vec<Message>,
    ) -> Result<(), LineError> {
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let body = json!({ "replyToken": reply_token, "messages": messages });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.channel_access_token)
            .json(&body)
            .send()
            .await?;
        Self::check(res).await?;
        Ok(())
    }

    /// GET /v2/bot/profile/{userId}.
    pub async fn get_profile(&self, user_id: &str) -> Result<Profile, LineError> {
        let url = format!("{}/v2/bot/profile/{}", self.api_base, user_id);
        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.channel_access_token)
            .send()
            .await?;
        let res = Self::check(res).await?;
        let profile: Profile = res.json().await?;
        Ok(profile)
    }

    /// POST /v2/bot/group/{groupId}/leave.
    pub async fn leave_group(&self, group_id: &str) -> Result<(), LineError> {
        let url = format!("{}/v2/bot/group/{}/leave", self.api_base, group_id);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.channel_access_token)
            .send()
            .await?;
        Self::check(res).await?;
        Ok(())
    }

    /// POST /v2/bot/room/{roomId}/leave.
    pub async fn leave_room(&self, room_id: &str) -> Result<(), LineError> {
        let url = format!("{}/v2/bot/room/{}/leave", self.api_base, room_id);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.channel_access_token)
            .send()
            .await?;
        Self::check(res).await?;
        Ok(())
    }
}

#[async_trait]
impl MessagingClient for LineClient {
    async fn reply_message(
        &self,
        reply_token: &str,
        messages: Vec<Message>,
    ) -> Result<(), LineError> {
        LineClient::reply_message(self, reply_token, messages).await
    }

    async fn get_profile(&self, user_id: &str) -> Result<Profile, LineError> {
        LineClient::get_profile(self, user_id).await
    }

    async fn leave_group(&self, group_id: &str) -> Result<(), LineError> {
        LineClient::leave_group(self, group_id).await
    }

    async fn leave_room(&self, room_id: &str) -> Result<(), LineError> {
        LineClient::leave_room(self, room_id).await
    }
}
