//! Claude-family wire format for the Bedrock Runtime API.
//!
//! Claude models take a structured turn list plus a separate `system`
//! field. The `model` is not part of the request body -- Bedrock carries it
//! in the URL path -- and an `anthropic_version` field is required instead.

use serde::{Deserialize, Serialize};

use colloquy_types::adapter::{AdapterResponse, FinishReason, Usage};
use colloquy_types::config::ModelConfig;
use colloquy_types::message::Message;

/// The Anthropic API version Bedrock expects.
pub const API_VERSION: &str = "bedrock-2023-05-31";

/// Request body for Claude invoke / invoke-with-response-stream.
#[derive(Debug, Clone, Serialize)]
pub struct ClaudeRequest {
    pub anthropic_version: String,
    pub max_tokens: u32,
    pub messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

/// A single turn in a Claude conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ClaudeMessage {
    pub role: String,
    pub content: String,
}

/// Build a Claude request from the uniform message sequence.
///
/// A leading system message is extracted into the `system` field rather
/// than inlined; remaining turns map 1:1. Sampling parameters are assumed
/// to be range-gated by the caller.
pub fn build_request(
    messages: &[Message],
    config: &ModelConfig,
    temperature: Option<f64>,
    top_p: Option<f64>,
) -> ClaudeRequest {
    let system = messages
        .iter()
        .find(|m| m.is_system())
        .map(|m| m.content.clone());

    let turns = messages
        .iter()
        .filter(|m| !m.is_system())
        .map(|m| ClaudeMessage {
            role: m.role.to_string(),
            content: m.content.clone(),
        })
        .collect();

    ClaudeRequest {
        anthropic_version: API_VERSION.to_string(),
        max_tokens: config.max_tokens,
        messages: turns,
        system,
        temperature,
        top_p,
    }
}

/// A content block in a Claude response.
///
/// Modeled as kind + optional text instead of a closed enum so unknown
/// block kinds deserialize and are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

/// Token usage reported by Claude.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaudeUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// Non-streaming response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeResponse {
    pub content: Vec<ClaudeContentBlock>,
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: ClaudeUsage,
}

/// Map a Claude stop reason string onto the uniform finish reason.
pub fn map_stop_reason(stop_reason: Option<&str>) -> FinishReason {
    match stop_reason {
        Some("end_turn") => FinishReason::EndTurn,
        Some("max_tokens") => FinishReason::MaxTokens,
        Some("stop_sequence") => FinishReason::StopSequence,
        _ => FinishReason::Unknown,
    }
}

impl From<ClaudeResponse> for AdapterResponse {
    fn from(resp: ClaudeResponse) -> Self {
        let content = resp
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        AdapterResponse {
            content,
            finish_reason: map_stop_reason(resp.stop_reason.as_deref()),
            usage: Usage {
                input_tokens: resp.usage.input_tokens,
                output_tokens: resp.usage.output_tokens,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Streaming event payloads
//
// Bedrock wraps each streamed Claude event inside `{"bytes":"<base64>"}`;
// the decoded payload carries a `type` field naming the event. Payloads are
// deserialized into specific structs based on that string, not via a serde
// tag on an outer enum, so unknown event types can be skipped.
// ---------------------------------------------------------------------------

/// The `{"bytes": ...}` envelope around each streamed event.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEnvelope {
    pub bytes: String,
}

/// Payload for `message_start`: carries the initial usage (input tokens).
#[derive(Debug, Clone, Deserialize)]
pub struct MessageStartPayload {
    pub message: MessageStartInner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageStartInner {
    #[serde(default)]
    pub usage: ClaudeUsage,
}

/// Payload for `content_block_delta`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlockDeltaPayload {
    pub delta: DeltaPayload,
}

/// The delta inside a `content_block_delta` event. Unknown delta kinds
/// deserialize with empty text and are dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct DeltaPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

/// Payload for `message_delta`: carries the final usage (output tokens).
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDeltaPayload {
    #[serde(default)]
    pub usage: ClaudeUsage,
}

/// Payload for `error` events.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    pub error: ErrorInner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorInner {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_types::message::Message;

    fn config() -> ModelConfig {
        ModelConfig {
            model_id: "anthropic.claude-3-sonnet-20240229-v1:0".to_string(),
            max_tokens: 1024,
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_system_message_extracted_not_inlined() {
        let messages = vec![
            Message::system("Be helpful."),
            Message::user("Hello"),
            Message::assistant("Hi!"),
            Message::user("How are you?"),
        ];
        let req = build_request(&messages, &config(), Some(0.7), None);

        assert_eq!(req.system.as_deref(), Some("Be helpful."));
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.messages[0].role, "user");
        assert_eq!(req.messages[1].role, "assistant");
        assert!(req.messages.iter().all(|m| m.role != "system"));
    }

    #[test]
    fn test_request_serialization_shape() {
        let messages = vec![Message::user("Hello")];
        let req = build_request(&messages, &config(), None, Some(0.9));
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["anthropic_version"], API_VERSION);
        assert_eq!(json["max_tokens"], 1024);
        // model never rides in the body; it lives in the URL path
        assert!(json.get("model").is_none());
        // absent optionals are omitted entirely
        assert!(json.get("system").is_none());
        assert!(json.get("temperature").is_none());
        assert_eq!(json["top_p"], 0.9);
    }

    #[test]
    fn test_response_joins_text_blocks_and_skips_unknown() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "Hello"},
                {"type": "speculation", "text": ""},
                {"type": "text", "text": " world"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 5}
        }"#;
        let resp: ClaudeResponse = serde_json::from_str(json).unwrap();
        let adapter_resp: AdapterResponse = resp.into();

        assert_eq!(adapter_resp.content, "Hello world");
        assert_eq!(adapter_resp.finish_reason, FinishReason::EndTurn);
        assert_eq!(adapter_resp.usage.input_tokens, 12);
        assert_eq!(adapter_resp.usage.output_tokens, 5);
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(map_stop_reason(Some("end_turn")), FinishReason::EndTurn);
        assert_eq!(map_stop_reason(Some("max_tokens")), FinishReason::MaxTokens);
        assert_eq!(
            map_stop_reason(Some("stop_sequence")),
            FinishReason::StopSequence
        );
        assert_eq!(map_stop_reason(Some("novel_reason")), FinishReason::Unknown);
        assert_eq!(map_stop_reason(None), FinishReason::Unknown);
    }

    #[test]
    fn test_delta_payload_unknown_kind_has_empty_text() {
        let json = r#"{"delta": {"type": "signature_delta", "signature": "abc"}}"#;
        let payload: ContentBlockDeltaPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.delta.kind, "signature_delta");
        assert!(payload.delta.text.is_empty());
    }
}
