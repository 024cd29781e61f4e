//! REST implementation of [`ProviderClient`].
//!
//! Talks to the third-party LinkedIn gateway over its JSON API. The
//! gateway multiplexes many sender accounts behind one API key; every
//! request carries the sender's `account_id`.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use async_trait::async_trait;

use crate::error::{ErrorCode, ProviderError};
use crate::traits::ProviderClient;
use crate::types::{Invitation, NetworkDistance, Post, ProviderProfile, ReactionType};

/// Error body shape the gateway returns on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    detail: String,
}

#[derive(Debug, Deserialize)]
struct PostsEnvelope {
    #[serde(default)]
    items: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct InvitationsEnvelope {
    #[serde(default)]
    items: Vec<Invitation>,
}

/// Thin HTTP client over the provider gateway.
pub struct RestProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body: ApiError = resp.json().await.unwrap_or(ApiError {
            code: String::new(),
            detail: String::new(),
        });
        let code = if body.code.is_empty() {
            match status {
                StatusCode::TOO_MANY_REQUESTS => ErrorCode::RateLimited,
                StatusCode::UNAUTHORIZED => ErrorCode::DisconnectedAccount,
                _ => ErrorCode::Unknown,
            }
        } else {
            ErrorCode::from_wire(&body.code)
        };
        let detail = if body.detail.is_empty() {
            format!("http status {status}")
        } else {
            body.detail
        };
        Err(ProviderError::new(code, detail))
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ProviderError> {
        let resp = self
            .http
            .get(self.url(path))
            .header("X-API-KEY", &self.api_key)
            .send()
            .await?;
        Self::check(resp).await
    }

    async fn send_json(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let resp = self
            .http
            .request(method, self.url(path))
            .header("X-API-KEY", &self.api_key)
            .json(body)
            .send()
            .await?;
        Self::check(resp).await
    }
}

#[async_trait]
impl ProviderClient for RestProvider {
    async fn visit_profile(
        &self,
        account_id: &str,
        identifier: &str,
        notify: bool,
    ) -> Result<ProviderProfile, ProviderError> {
        debug!(identifier, notify, "visiting profile");
        let resp = self
            .get(&format!(
                "/api/v1/users/{identifier}?account_id={account_id}&notify={notify}"
            ))
            .await?;
        Ok(resp.json().await?)
    }

    async fn send_invitation(
        &self,
        account_id: &str,
        provider_id: &str,
        message: &str,
    ) -> Result<(), ProviderError> {
        self.send_json(
            reqwest::Method::POST,
            "/api/v1/users/invite",
            &json!({
                "account_id": account_id,
                "provider_id": provider_id,
                "message": message,
            }),
        )
        .await?;
        Ok(())
    }

    async fn start_or_continue_chat(
        &self,
        account_id: &str,
        provider_ids: &[String],
        text: &str,
    ) -> Result<(), ProviderError> {
        self.send_json(
            reqwest::Method::POST,
            "/api/v1/chats",
            &json!({
                "account_id": account_id,
                "attendees_ids": provider_ids,
                "text": text,
            }),
        )
        .await?;
        Ok(())
    }

    async fn react_to_post(
        &self,
        account_id: &str,
        post_id: &str,
        reaction: ReactionType,
    ) -> Result<(), ProviderError> {
        self.send_json(
            reqwest::Method::POST,
            &format!("/api/v1/posts/{post_id}/reaction"),
            &json!({
                "account_id": account_id,
                "reaction_type": reaction.as_str(),
            }),
        )
        .await?;
        Ok(())
    }

    async fn comment_post(
        &self,
        account_id: &str,
        post_id: &str,
        text: &str,
    ) -> Result<(), ProviderError> {
        self.send_json(
            reqwest::Method::POST,
            &format!("/api/v1/posts/{post_id}/comments"),
            &json!({
                "account_id": account_id,
                "text": text,
            }),
        )
        .await?;
        Ok(())
    }

    async fn list_recent_posts(
        &self,
        account_id: &str,
        identifier: &str,
        last_days: u32,
        limit: u32,
    ) -> Result<Vec<Post>, ProviderError> {
        let resp = self
            .get(&format!(
                "/api/v1/users/{identifier}/posts?account_id={account_id}&last_days={last_days}&limit={limit}"
            ))
            .await?;
        let envelope: PostsEnvelope = resp.json().await?;
        Ok(envelope.items)
    }

    async fn list_invitations_sent(
        &self,
        account_id: &str,
    ) -> Result<Vec<Invitation>, ProviderError> {
        let resp = self
            .get(&format!("/api/v1/users/invite/sent?account_id={account_id}"))
            .await?;
        let envelope: InvitationsEnvelope = resp.json().await?;
        Ok(envelope.items)
    }

    async fn cancel_invitation(
        &self,
        account_id: &str,
        invitation_id: &str,
    ) -> Result<(), ProviderError> {
        let resp = self
            .http
            .delete(self.url(&format!(
                "/api/v1/users/invite/{invitation_id}?account_id={account_id}"
            )))
            .header("X-API-KEY", &self.api_key)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn is_connected(
        &self,
        account_id: &str,
        identifier: &str,
    ) -> Result<bool, ProviderError> {
        let profile = self.visit_profile(account_id, identifier, false).await?;
        Ok(profile.network_distance == Some(NetworkDistance::FirstDegree))
    }
}
