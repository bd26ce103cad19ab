//! Moltbook API client
//!
//! The local stores never talk HTTP themselves. Publishing drafts and
//! scheduled posts goes through the [`Poster`] trait, which
//! [`MoltbookClient`] implements against the real service and
//! [`mock::MockPoster`] implements for tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::error::{RemoteError, Result};
use crate::types::{Agent, FeedSort, NewPost, RemotePost};

// Mock poster is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Creates posts on the remote service
#[async_trait]
pub trait Poster: Send + Sync {
    /// Create a post and return its remote id
    ///
    /// # Errors
    ///
    /// Returns `MoltError::Remote` when the service rejects the post or
    /// cannot be reached.
    async fn create_post(&self, post: &NewPost) -> Result<String>;
}

/// Common response envelope of the Moltbook API
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    agent: Option<Agent>,
    #[serde(default)]
    post: Option<RemotePost>,
    #[serde(default)]
    posts: Option<Vec<RemotePost>>,
}

impl Envelope {
    fn ensure_success(self, status: StatusCode) -> Result<Self> {
        if self.success == Some(false) {
            let reason = self
                .error
                .clone()
                .unwrap_or_else(|| "request was not successful".to_string());
            return Err(RemoteError::new(Some(status.as_u16()), reason).into());
        }
        Ok(self)
    }
}

pub struct MoltbookClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    default_submolt: String,
}

impl MoltbookClient {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        timeout: Duration,
        default_submolt: &str,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("molt/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::new(None, format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            default_submolt: default_submolt.to_string(),
        })
    }

    /// Build a client from configuration, resolving the API key
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.api.base_url,
            config.api_key()?,
            Duration::from_secs(config.api.timeout_secs),
            &config.defaults.submolt,
        )
    }

    /// Profile of the authenticated agent
    pub async fn me(&self) -> Result<Agent> {
        let envelope = self.send(Method::GET, "/agents/me", &[], None).await?;
        Ok(envelope.agent.unwrap_or_default())
    }

    /// Recent posts
    pub async fn feed(&self, limit: u32, sort: FeedSort) -> Result<Vec<RemotePost>> {
        let limit = limit.to_string();
        let query = [("limit", limit.as_str()), ("sort", sort.as_str())];
        let envelope = self.send(Method::GET, "/posts", &query, None).await?;
        Ok(envelope.posts.unwrap_or_default())
    }

    /// A single post
    pub async fn get_post(&self, id: &str) -> Result<RemotePost> {
        let envelope = self
            .send(Method::GET, &format!("/posts/{}", id), &[], None)
            .await?;
        envelope
            .post
            .ok_or_else(|| RemoteError::new(None, format!("Response for post {} had no post", id)).into())
    }

    /// Create a post and return it as the service echoes it back
    pub async fn submit_post(&self, post: &NewPost) -> Result<RemotePost> {
        let submolt = post
            .submolt
            .clone()
            .unwrap_or_else(|| self.default_submolt.clone());
        let body = json!({
            "title": post.title,
            "content": post.content,
            "submolt": submolt,
        });

        let envelope = self.send(Method::POST, "/posts", &[], Some(body)).await?;
        let created = envelope
            .post
            .ok_or_else(|| RemoteError::new(None, "Response had no post"))?;
        tracing::info!(post_id = %created.id, "created post");
        Ok(created)
    }

    /// Upvote a post, returning the service's message
    pub async fn upvote(&self, id: &str) -> Result<String> {
        let envelope = self
            .send(Method::POST, &format!("/posts/{}/upvote", id), &[], None)
            .await?;
        Ok(envelope.message.unwrap_or_default())
    }

    /// Comment on a post, returning the service's message
    pub async fn comment(&self, id: &str, text: &str) -> Result<String> {
        let body = json!({ "content": text });
        let envelope = self
            .send(
                Method::POST,
                &format!("/posts/{}/comments", id),
                &[],
                Some(body),
            )
            .await?;
        Ok(envelope.message.unwrap_or_default())
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<Envelope> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(%method, %url, "api request");

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(self.api_key.expose_secret());
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::new(None, format!("Connection error: {}", e)))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::new(Some(status.as_u16()), format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "api request failed");
            return Err(RemoteError::new(Some(status.as_u16()), error_reason(&text)).into());
        }

        let envelope: Envelope = decode(status, &text)?;
        envelope.ensure_success(status)
    }
}

#[async_trait]
impl Poster for MoltbookClient {
    async fn create_post(&self, post: &NewPost) -> Result<String> {
        Ok(self.submit_post(post).await?.id)
    }
}

fn decode<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| {
        RemoteError::new(Some(status.as_u16()), format!("Invalid response: {}", e)).into()
    })
}

/// Prefer the `error` field of a JSON error body, fall back to the raw body
fn error_reason(body: &str) -> String {
    let parsed: Option<Envelope> = serde_json::from_str(body).ok();
    match parsed.and_then(|envelope| envelope.error) {
        Some(error) => error,
        None if body.trim().is_empty() => "empty response".to_string(),
        None => body.trim().to_string(),
    }
}
