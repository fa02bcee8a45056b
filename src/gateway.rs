//! Remote reasoning gateway
//!
//! One async call per request: the mode says what kind of answer is wanted,
//! the context payload says what the assistant may know. Responses carry
//! free text plus optional mode-specific fields. The gateway never retries;
//! callers decide what a failure means for them.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ContextPayload;
use crate::error::GatewayError;
use crate::types::GatewayConfig;

/// Conversation turns sent with one request, newest kept.
pub const MAX_HISTORY_TURNS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasoningMode {
    Chat,
    CheckIn,
    Briefing,
    DayPlan,
    Capture,
    Prep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningRequest {
    pub mode: ReasoningMode,
    pub context: ContextPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ChatTurn>,
    /// Detected mood forwarded to a plan generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood_hint: Option<String>,
    /// Triggering message forwarded to a plan generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_hint: Option<String>,
}

impl ReasoningRequest {
    pub fn new(mode: ReasoningMode, context: ContextPayload) -> Self {
        Self {
            mode,
            context,
            message: None,
            history: Vec::new(),
            mood_hint: None,
            message_hint: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach the most recent turns, at most `limit` and never more than
    /// [`MAX_HISTORY_TURNS`].
    pub fn with_history(mut self, history: &[ChatTurn], limit: usize) -> Self {
        let keep = limit.min(MAX_HISTORY_TURNS);
        let skip = history.len().saturating_sub(keep);
        self.history = history[skip..].to_vec();
        self
    }

    pub fn with_plan_hints(mut self, mood: Option<String>, message: Option<String>) -> Self {
        self.mood_hint = mood;
        self.message_hint = message;
        self
    }
}

/// Every field is optional on the wire; absent means empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningResponse {
    #[serde(default)]
    pub message: String,
    /// Raw action objects, parsed leniently by `actions::parse_actions`
    #[serde(default)]
    pub actions: Vec<Value>,
    /// Raw generated plan items (day-plan mode)
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Capture mode output, passed through untouched
    #[serde(default)]
    pub structured_notes: Option<Value>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub adjustments: Option<Vec<String>>,
}

/// The seam between the engine and whatever answers reasoning requests.
#[async_trait]
pub trait ReasoningGateway: Send + Sync {
    async fn invoke(&self, request: ReasoningRequest) -> Result<ReasoningResponse, GatewayError>;
}

/// JSON-over-HTTPS gateway with bearer auth.
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
}

impl HttpGateway {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let endpoint = config.endpoint.trim();
        if endpoint.is_empty() {
            return Err(GatewayError::NotConfigured("gateway.endpoint is empty".to_string()));
        }
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GatewayError::NotConfigured("gateway.apiKey is missing".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl ReasoningGateway for HttpGateway {
    async fn invoke(&self, request: ReasoningRequest) -> Result<ReasoningResponse, GatewayError> {
        log::debug!("Reasoning call ({:?}) to {}", request.mode, self.endpoint);

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.timeout_secs)
                } else {
                    GatewayError::from(e)
                }
            })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(GatewayError::RateLimited);
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(GatewayError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            log::warn!("Reasoning call failed with {}", status);
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout(self.timeout_secs)
            } else {
                GatewayError::from(e)
            }
        })?;
        serde_json::from_str(&text).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}
