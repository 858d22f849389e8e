//! Client error model.
//!
//! Validation failures are local and never reach the network. Remote failures
//! carry a best-effort human-readable message taken from the response body.
//! Cancellation of superseded loads is not an error at all; see
//! [`crate::lifecycle::LoadOutcome`].

use serde_json::Value;
use thiserror::Error;

use lendora_core::DomainError;

/// Message shown when the remote authority gives nothing better.
pub const GENERIC_REMOTE_MESSAGE: &str = "Something went wrong. Please try again.";

const MAX_MESSAGE_LEN: usize = 300;

/// Failure talking to the remote authority.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The request never produced a response (connect, timeout, TLS...).
    #[error("network error: {0}")]
    Transport(String),

    /// The authority answered with a non-2xx status.
    #[error("{message} (status {status})")]
    Status { status: u16, message: String },

    /// The response body could not be understood.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Build a status error, extracting a message from the body when possible.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = extract_message(body)
            .unwrap_or_else(|| format!("Request failed with status {status}"));
        Self::Status { status, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text suitable for display next to the control that triggered the call.
    pub fn message(&self) -> String {
        match self {
            Self::Status { message, .. } => message.clone(),
            Self::Transport(_) | Self::Decode(_) => GENERIC_REMOTE_MESSAGE.to_string(),
        }
    }
}

/// Pull a readable message out of an error body.
///
/// Looks at `message`, `error` (string or `{message}`), `msg` and `detail`
/// in a JSON body, then falls back to short plain text. HTML pages are ignored.
pub fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
        return message_from_json(&json);
    }

    if trimmed.starts_with('<') {
        return None;
    }
    Some(truncate(trimmed))
}

fn message_from_json(json: &Value) -> Option<String> {
    let text = |v: &Value| {
        v.as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(truncate)
    };

    match json {
        Value::String(_) => text(json),
        Value::Object(map) => ["message", "error", "msg", "detail"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|value| text(value).or_else(|| value.get("message").and_then(text))),
        _ => None,
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_MESSAGE_LEN {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(MAX_MESSAGE_LEN).collect();
        out.push('…');
        out
    }
}

/// Error returned by store loads and mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Rejected locally before any network call; the store is untouched.
    #[error(transparent)]
    Validation(#[from] DomainError),

    /// The remote authority refused or could not be reached. Any optimistic
    /// change has already been rolled back.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl ClientError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Human-readable text for the UI layer.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => match err {
                DomainError::Validation(msg)
                | DomainError::InvariantViolation(msg)
                | DomainError::InvalidId(msg)
                | DomainError::Conflict(msg) => msg.clone(),
            },
            Self::Remote(err) => err.message(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
