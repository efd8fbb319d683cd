//! Recommendation service transport
//!
//! Issues authenticated JSON requests to the ranking service. A fresh bearer
//! token is fetched from the [`TokenProvider`] for every call; token issuance
//! and refresh belong to the identity provider, not to this crate.
//!
//! # Endpoints
//! - `POST /recs/start`          → create a session for a location
//! - `POST /recs/next`           → next page of candidates
//! - `POST /recs/feedback`       → record one swipe
//! - `POST /recs/finalize-match` → close the session with a winner
//!
//! # Status mapping
//! - 400 / 409 → [`RecsError::StaleSession`]
//! - 401 / 403 → [`RecsError::Auth`]
//! - other non-2xx → [`RecsError::Http`]

use crate::error::{RecsError, Result};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use twoeat_common::config::ApiConfig;
use twoeat_common::{Candidate, FeedbackAction};

pub const START_PATH: &str = "/recs/start";
pub const NEXT_PATH: &str = "/recs/next";
pub const FEEDBACK_PATH: &str = "/recs/feedback";
pub const FINALIZE_PATH: &str = "/recs/finalize-match";

/// Environment variable read by [`EnvTokenProvider`]
pub const ID_TOKEN_ENV: &str = "TWOEAT_ID_TOKEN";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub lat: f64,
    pub lng: f64,
    pub min_pool_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextPageRequest {
    pub session_id: String,
    pub lat: f64,
    pub lng: f64,
    pub limit: usize,
    pub exclude_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextPageResponse {
    #[serde(default)]
    pub items: Vec<Candidate>,

    #[serde(default)]
    pub session_completed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub session_id: String,
    pub candidate_id: String,
    pub action: FeedbackAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    #[serde(default = "default_ok")]
    pub ok: bool,

    #[serde(default)]
    pub should_suggest_match: Option<bool>,

    #[serde(default)]
    pub session_completed: Option<bool>,
}

impl Default for FeedbackResponse {
    fn default() -> Self {
        Self {
            ok: true,
            should_suggest_match: None,
            session_completed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub session_id: String,
    pub top3: Vec<String>,
    pub winner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superstar_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    #[serde(default = "default_ok")]
    pub ok: bool,

    #[serde(default)]
    pub winner: Option<Candidate>,
}

impl Default for FinalizeResponse {
    fn default() -> Self {
        Self {
            ok: true,
            winner: None,
        }
    }
}

fn default_ok() -> bool {
    true
}

// ============================================================================
// Seams
// ============================================================================

/// Remote ranking service
///
/// The controller only talks to the service through this trait so tests can
/// substitute a scripted implementation.
#[async_trait]
pub trait RecsApi: Send + Sync {
    async fn start_session(&self, req: &StartSessionRequest) -> Result<StartSessionResponse>;

    async fn next_page(&self, req: &NextPageRequest) -> Result<NextPageResponse>;

    async fn submit_feedback(&self, req: &FeedbackRequest) -> Result<FeedbackResponse>;

    async fn finalize_match(&self, req: &FinalizeRequest) -> Result<FinalizeResponse>;
}

/// Source of bearer tokens (identity provider collaborator)
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a currently valid token or [`RecsError::Auth`]
    async fn bearer_token(&self) -> Result<String>;
}

/// Fixed token, e.g. passed on the command line
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String> {
        if self.token.trim().is_empty() {
            return Err(RecsError::Auth("empty token".to_string()));
        }
        Ok(self.token.clone())
    }
}

/// Reads the token from an environment variable on every call
///
/// An external refresher can rotate the variable without restarting the client.
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self::new(ID_TOKEN_ENV)
    }
}

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn bearer_token(&self) -> Result<String> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(RecsError::Auth(format!("{} not set", self.var))),
        }
    }
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// reqwest-backed [`RecsApi`]
pub struct HttpRecsApi {
    http_client: Client,
    config: ApiConfig,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpRecsApi {
    /// Build a client with the configured timeout
    pub fn new(config: ApiConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("twoeat-recs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RecsError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
            tokens,
        })
    }

    /// POST `body` to `path` and decode the JSON response
    ///
    /// With `allow_empty`, a 2xx response with an empty body decodes to
    /// `Resp::default()`.
    async fn post_json<Req, Resp>(&self, path: &str, body: &Req, allow_empty: bool) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Default,
    {
        // Token first: no request goes out unauthenticated
        let token = self.tokens.bearer_token().await?;
        let url = self.config.endpoint(path);

        debug!(url = %url, "POST");

        let response = self
            .http_client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .json(body)
            .send()
            .await
            .map_err(|e| RecsError::Network(format!("{} request failed: {}", path, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RecsError::Network(format!("{} body read failed: {}", path, e)))?;

        if !status.is_success() {
            warn!(path, status = status.as_u16(), "Recommendation service error");
            return Err(classify_status(status, text));
        }

        if text.trim().is_empty() && allow_empty {
            return Ok(Resp::default());
        }

        serde_json::from_str(&text)
            .map_err(|e| RecsError::Decode(format!("{} response: {}", path, e)))
    }
}

#[async_trait]
impl RecsApi for HttpRecsApi {
    async fn start_session(&self, req: &StartSessionRequest) -> Result<StartSessionResponse> {
        #[derive(Deserialize, Default)]
        #[serde(rename_all = "camelCase")]
        struct Raw {
            #[serde(default)]
            session_id: Option<String>,
        }

        let raw: Raw = self.post_json(START_PATH, req, false).await?;
        match raw.session_id {
            Some(session_id) if !session_id.is_empty() => Ok(StartSessionResponse { session_id }),
            _ => Err(RecsError::Decode("start response missing sessionId".to_string())),
        }
    }

    async fn next_page(&self, req: &NextPageRequest) -> Result<NextPageResponse> {
        self.post_json(NEXT_PATH, req, false).await
    }

    async fn submit_feedback(&self, req: &FeedbackRequest) -> Result<FeedbackResponse> {
        self.post_json(FEEDBACK_PATH, req, true).await
    }

    async fn finalize_match(&self, req: &FinalizeRequest) -> Result<FinalizeResponse> {
        self.post_json(FINALIZE_PATH, req, true).await
    }
}

/// Map a non-2xx status onto the error taxonomy
pub fn classify_status(status: StatusCode, body: String) -> RecsError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT => RecsError::StaleSession {
            status: status.as_u16(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RecsError::Auth(format!("service returned HTTP {}", status.as_u16()))
        }
        _ => RecsError::Http {
            status: status.as_u16(),
            message: truncate(body, 200),
        },
    }
}

fn truncate(mut text: String, max_chars: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
    text
}
