//! Broker-surface error types and wire-facing error codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors surfaced to the transport collaborator by `submit_turn` before a
/// turn enters the state machine. All other failure modes are recovered
/// internally and the turn still completes with assistant content.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Caller input malformed; nothing was mutated.
    #[error("invalid turn input: {0}")]
    Validation(String),

    /// A turn is already in flight for this user id; nothing was mutated.
    #[error("a session is already active for user '{user_id}'")]
    ConcurrentSession { user_id: String },
}

impl BrokerError {
    /// The wire-facing code for this error.
    pub fn code(&self) -> TurnErrorCode {
        match self {
            BrokerError::Validation(_) => TurnErrorCode::ProcessingError,
            BrokerError::ConcurrentSession { .. } => TurnErrorCode::ConcurrentSession,
        }
    }
}

/// Error codes delivered on the outbound event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnErrorCode {
    ProcessingError,
    StreamingError,
    ConcurrentSession,
    UnsupportedModel,
}

impl fmt::Display for TurnErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnErrorCode::ProcessingError => write!(f, "PROCESSING_ERROR"),
            TurnErrorCode::StreamingError => write!(f, "STREAMING_ERROR"),
            TurnErrorCode::ConcurrentSession => write!(f, "CONCURRENT_SESSION"),
            TurnErrorCode::UnsupportedModel => write!(f, "UNSUPPORTED_MODEL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serde() {
        let code = TurnErrorCode::ConcurrentSession;
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"CONCURRENT_SESSION\"");
        let parsed: TurnErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TurnErrorCode::ConcurrentSession);
    }

    #[test]
    fn test_broker_error_codes() {
        assert_eq!(
            BrokerError::Validation("empty".into()).code(),
            TurnErrorCode::ProcessingError
        );
        assert_eq!(
            BrokerError::ConcurrentSession {
                user_id: "alice".into()
            }
            .code(),
            TurnErrorCode::ConcurrentSession
        );
    }

    #[test]
    fn test_broker_error_display() {
        let err = BrokerError::ConcurrentSession {
            user_id: "alice".into(),
        };
        assert!(err.to_string().contains("alice"));
    }
}
