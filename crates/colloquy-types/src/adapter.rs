//! Model adapter value objects and error types.
//!
//! These types model the data shapes at the adapter boundary: generation
//! responses, streaming chunks, usage tracking, and the closed set of
//! supported model families.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TurnErrorCode;

/// The closed set of model families this broker can speak to.
///
/// Resolved exactly once from the configured model identifier when the
/// adapter is constructed; request paths dispatch on the enum, never on
/// the identifier string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    Claude,
    Llama,
    Titan,
}

impl ModelFamily {
    /// Resolve a model identifier to its family.
    ///
    /// Substring match, first match wins, in the order Claude, Llama,
    /// Titan. Unknown identifiers are a configuration error.
    pub fn resolve(model_id: &str) -> Result<Self, AdapterError> {
        let lower = model_id.to_lowercase();
        if lower.contains("claude") {
            Ok(ModelFamily::Claude)
        } else if lower.contains("llama") {
            Ok(ModelFamily::Llama)
        } else if lower.contains("titan") {
            Ok(ModelFamily::Titan)
        } else {
            Err(AdapterError::UnsupportedModel(model_id.to_string()))
        }
    }

    /// Whether the provider streams natively for this family.
    ///
    /// Families without native streaming are served by pseudo-streaming:
    /// one full generation segmented into paced word chunks.
    pub fn native_streaming(&self) -> bool {
        matches!(self, ModelFamily::Claude)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFamily::Claude => write!(f, "claude"),
            ModelFamily::Llama => write!(f, "llama"),
            ModelFamily::Titan => write!(f, "titan"),
        }
    }
}

/// Reason why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    Unknown,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::EndTurn => write!(f, "end_turn"),
            FinishReason::MaxTokens => write!(f, "max_tokens"),
            FinishReason::StopSequence => write!(f, "stop_sequence"),
            FinishReason::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for FinishReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "end_turn" => Ok(FinishReason::EndTurn),
            "max_tokens" => Ok(FinishReason::MaxTokens),
            "stop_sequence" => Ok(FinishReason::StopSequence),
            "unknown" => Ok(FinishReason::Unknown),
            other => Err(format!("invalid finish reason: '{other}'")),
        }
    }
}

/// Token usage for a generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Full response from a single-shot generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterResponse {
    pub content: String,
    pub usage: Usage,
    pub finish_reason: FinishReason,
}

/// One increment of a streamed generation.
///
/// A terminal chunk has `is_complete = true`, empty content, and carries
/// the final usage totals when the provider reported them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterChunk {
    pub content: String,
    pub is_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl AdapterChunk {
    /// An incremental text delta.
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_complete: false,
            usage: None,
        }
    }

    /// The terminal chunk closing a stream.
    pub fn terminal(usage: Option<Usage>) -> Self {
        Self {
            content: String::new(),
            is_complete: true,
            usage,
        }
    }
}

/// What a concrete adapter supports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterCapabilities {
    pub native_streaming: bool,
    pub max_output_tokens: u32,
}

/// Errors from model adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The configured model identifier matches no known family.
    #[error("unsupported model: '{0}'")]
    UnsupportedModel(String),

    /// Transport or provider failure on a call.
    #[error("upstream error: {message}")]
    Upstream { message: String },

    /// Failure mid-stream, after zero or more chunks were delivered.
    #[error("stream error: {0}")]
    Stream(String),

    /// Provider payload could not be decoded.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl AdapterError {
    /// The wire-facing error code for this failure.
    pub fn turn_error_code(&self) -> TurnErrorCode {
        match self {
            AdapterError::UnsupportedModel(_) => TurnErrorCode::UnsupportedModel,
            AdapterError::Stream(_) => TurnErrorCode::StreamingError,
            AdapterError::Upstream { .. } | AdapterError::Deserialization(_) => {
                TurnErrorCode::ProcessingError
            }
        }
    }
}
