//! Error Types

use thiserror::Error;

use crate::session::SessionState;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Recipient mailbox dropped its receiver
    #[error("Mailbox closed: {0}")]
    MailboxClosed(String),

    /// Recipient mailbox is at capacity and the sender would not wait
    #[error("Mailbox full: {0}")]
    MailboxFull(String),

    /// Agent did not reply within the allotted budget
    #[error("Agent {address} did not respond within {after_ms}ms")]
    Timeout { address: String, after_ms: u64 },

    /// Session event not allowed in the current lifecycle state
    #[error("Invalid session transition: {event} while {from}")]
    InvalidTransition {
        from: SessionState,
        event: &'static str,
    },

    /// Client payload rejected before dispatch
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::MailboxClosed(_) | Self::MailboxFull(_))
    }

    /// Stable machine-readable code, safe to expose in diagnostic fields
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "downstream_timeout",
            Self::MailboxClosed(_) => "agent_unavailable",
            Self::MailboxFull(_) => "agent_busy",
            Self::InvalidTransition { .. } | Self::Session(_) => "session_error",
            Self::MalformedRequest(_) | Self::Json(_) => "malformed_request",
            Self::Other(_) => "internal_error",
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout { .. } | Self::MailboxClosed(_) | Self::MailboxFull(_) => {
                "Sorry, I couldn't gather the information in time. Please try again in a moment.".into()
            }
            Self::MalformedRequest(_) | Self::Json(_) => {
                "Sorry, I couldn't read that request. Please send a text message.".into()
            }
            _ => "Sorry, something went wrong while processing your request.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_hide_detail() {
        let err = AgentError::Timeout {
            address: "agent://analyzer".into(),
            after_ms: 1500,
        };
        assert_eq!(err.code(), "downstream_timeout");
        assert!(err.is_retryable());
        assert!(!err.user_message().contains("agent://analyzer"));
    }

    #[test]
    fn test_malformed_request_code() {
        let err = AgentError::MalformedRequest("message must be a string".into());
        assert_eq!(err.code(), "malformed_request");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_full_mailbox_is_retryable() {
        let err = AgentError::MailboxFull("client://slow".into());
        assert_eq!(err.code(), "agent_busy");
        assert!(err.is_retryable());
        assert!(err.user_message().starts_with("Sorry"));
    }
}
