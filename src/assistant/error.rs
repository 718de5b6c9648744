//! Agent bridge error types

use thiserror::Error;

/// Bridge error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AssistantError {
    pub kind: AssistantErrorKind,
    pub message: String,
}

impl AssistantError {
    pub fn new(kind: AssistantErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AssistantErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(AssistantErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(AssistantErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(AssistantErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(AssistantErrorKind::InvalidRequest, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(AssistantErrorKind::Unknown, message)
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantErrorKind {
    /// Network issues, timeouts
    Network,
    /// Rate limited (429)
    RateLimit,
    /// Server error (5xx)
    ServerError,
    /// Authentication failed (401, 403)
    Auth,
    /// Bad request (400)
    InvalidRequest,
    /// Unknown error
    Unknown,
}

/// Map an HTTP status + body onto a classified error
pub fn classify_http_error(status: reqwest::StatusCode, body: &str) -> AssistantError {
    match status.as_u16() {
        401 | 403 => AssistantError::auth(format!("Authentication failed: {body}")),
        429 => AssistantError::rate_limit(format!("Rate limited: {body}")),
        400 => AssistantError::invalid_request(format!("Invalid request: {body}")),
        500..=599 => AssistantError::server_error(format!("Server error: {body}")),
        _ => AssistantError::unknown(format!("HTTP {status}: {body}")),
    }
}

/// Map a reqwest transport failure onto a classified error
pub fn classify_transport_error(e: &reqwest::Error) -> AssistantError {
    if e.is_timeout() {
        AssistantError::network(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        AssistantError::network(format!("Connection failed: {e}"))
    } else {
        AssistantError::unknown(format!("Request failed: {e}"))
    }
}
