//! Error types for the CRM live client.

use thiserror::Error;

use crate::domain::{IdError, SessionId, UserId};

/// REST call failure
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401 from the backend
    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    /// 403 from the backend
    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// 409 from the backend
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 400 / 422 from the backend
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Any other non-success status
    #[error("Server returned {status}: {detail}")]
    Status { status: u16, detail: String },

    /// Network, timeout or body decoding failure
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Build an error from a non-success HTTP status and the server's detail message.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        let detail = detail.unwrap_or_else(|| format!("HTTP {}", status));
        match status {
            400 | 422 => Self::BadRequest(detail),
            401 => Self::Unauthorized(detail),
            403 => Self::Forbidden(detail),
            404 => Self::NotFound(detail),
            409 => Self::Conflict(detail),
            _ => Self::Status { status, detail },
        }
    }

    /// Server-provided detail message, when there is one
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Unauthorized(detail)
            | Self::Forbidden(detail)
            | Self::NotFound(detail)
            | Self::Conflict(detail)
            | Self::BadRequest(detail)
            | Self::Status { detail, .. } => Some(detail),
            Self::Transport(_) | Self::InvalidRequest(_) => None,
        }
    }

    /// 401 and 403 responses; these are never retried.
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::Forbidden(_))
    }

    /// Text for a user-facing toast.
    pub fn toast_message(&self) -> String {
        match self {
            Self::Transport(_) => "Could not reach the server. Please try again.".to_string(),
            Self::InvalidRequest(reason) => reason.clone(),
            other => other.detail().unwrap_or("Request failed").to_string(),
        }
    }
}

/// Chat session selection / lifecycle failure
#[derive(Debug, Error)]
pub enum SessionError {
    /// The claim was rejected, typically because another agent got there first
    #[error("Session {session_id} could not be assigned: {detail}")]
    AssignmentConflict { session_id: SessionId, detail: String },

    /// The session already belongs to another agent
    #[error("Session {session_id} is assigned to agent {agent_id}")]
    NotOwner {
        session_id: SessionId,
        agent_id: UserId,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    pub fn toast_message(&self) -> String {
        match self {
            Self::Api(error) => error.toast_message(),
            other => other.to_string(),
        }
    }
}

/// Rejected outbound chat message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("Message is empty")]
    EmptyMessage,
}

/// Inbound frame or record that cannot be turned into a domain value
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid field: {0}")]
    InvalidField(#[from] IdError),
}

/// Invalid client configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error(transparent)]
    InvalidId(#[from] IdError),
}
