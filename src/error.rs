//! Error types for the reasoning round-trip and the check-in flow
//!
//! Errors are classified by recoverability:
//! - Retryable: network issues, timeouts, rate limits
//! - NonRetryable: bad configuration, unreadable responses
//! - RequiresUserAction: missing gateway key, rejected credentials

use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a [`crate::gateway::ReasoningGateway`].
#[derive(Debug, Error)]
pub enum GatewayError {
    // Retryable errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Reasoning call timed out after {0} seconds")]
    Timeout(u64),

    #[error("Reasoning service rate limit exceeded")]
    RateLimited,

    #[error("Reasoning service returned {status}: {body}")]
    Http { status: u16, body: String },

    // Non-retryable errors
    #[error("Gateway not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to parse reasoning response: {0}")]
    InvalidResponse(String),

    // Requires user action
    #[error("Reasoning service rejected the API key")]
    Unauthorized,
}

impl GatewayError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network(_) | GatewayError::Timeout(_) | GatewayError::RateLimited => {
                true
            }
            GatewayError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if this error requires user action to resolve
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            GatewayError::Unauthorized | GatewayError::NotConfigured(_)
        )
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            GatewayError::Network(_) => "Check your internet connection and try again.",
            GatewayError::Timeout(_) => "The assistant took too long to answer. Try again.",
            GatewayError::RateLimited => "Wait a few minutes and try again.",
            GatewayError::Http { .. } => "The assistant is having trouble. Try again shortly.",
            GatewayError::NotConfigured(_) => {
                "Set gateway.endpoint and gateway.apiKey in ~/.dayflow/config.json"
            }
            GatewayError::InvalidResponse(_) => "The assistant sent an unreadable reply. Try again.",
            GatewayError::Unauthorized => "Update gateway.apiKey in ~/.dayflow/config.json",
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::InvalidResponse(err.to_string())
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

/// Errors from the file-backed store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("State file is not valid JSON: {0}")]
    Corrupt(String),
}

/// Errors from the check-in lifecycle.
#[derive(Debug, Error)]
pub enum CheckInError {
    #[error("Check-in cannot go from {from} on {event}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Serializable error representation for UI surfaces
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceError {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
    RequiresUserAction,
}

impl From<&GatewayError> for SurfaceError {
    fn from(err: &GatewayError) -> Self {
        let error_type = if err.requires_user_action() {
            ErrorType::RequiresUserAction
        } else if err.is_retryable() {
            ErrorType::Retryable
        } else {
            ErrorType::NonRetryable
        };

        SurfaceError {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}
