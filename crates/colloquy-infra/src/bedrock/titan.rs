//! Titan-family wire format for the Bedrock Runtime API.
//!
//! Titan models take a plain-text transcript: one `Human:`/`Assistant:`
//! paragraph per turn joined by blank lines, closed with a trailing
//! `Assistant:` cue to prompt the continuation. A system message has no
//! native slot and leads the transcript as a bare paragraph.

use serde::{Deserialize, Serialize};

use colloquy_types::adapter::{AdapterResponse, FinishReason, Usage};
use colloquy_types::config::ModelConfig;
use colloquy_types::message::{Message, MessageRole};

/// Request body for Titan invoke.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TitanRequest {
    pub input_text: String,
    pub text_generation_config: TitanGenerationConfig,
}

/// Generation parameters nested inside the Titan request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TitanGenerationConfig {
    pub max_token_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

/// Serialize the message sequence into a Titan transcript.
pub fn build_transcript(messages: &[Message]) -> String {
    let mut paragraphs: Vec<String> = Vec::with_capacity(messages.len() + 1);
    for msg in messages {
        match msg.role {
            MessageRole::System => paragraphs.push(msg.content.clone()),
            MessageRole::User => paragraphs.push(format!("Human: {}", msg.content)),
            MessageRole::Assistant => paragraphs.push(format!("Assistant: {}", msg.content)),
        }
    }
    paragraphs.push("Assistant:".to_string());
    paragraphs.join("\n\n")
}

/// Build a Titan request from the uniform message sequence.
pub fn build_request(
    messages: &[Message],
    config: &ModelConfig,
    temperature: Option<f64>,
    top_p: Option<f64>,
) -> TitanRequest {
    TitanRequest {
        input_text: build_transcript(messages),
        text_generation_config: TitanGenerationConfig {
            max_token_count: config.max_tokens,
            temperature,
            top_p,
        },
    }
}

/// Response body for Titan invoke.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitanResponse {
    #[serde(default)]
    pub input_text_token_count: u32,
    pub results: Vec<TitanResult>,
}

/// One generation result inside a Titan response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitanResult {
    #[serde(default)]
    pub token_count: u32,
    pub output_text: String,
    pub completion_reason: Option<String>,
}

impl From<TitanResponse> for AdapterResponse {
    fn from(resp: TitanResponse) -> Self {
        let (content, output_tokens, completion_reason) = resp
            .results
            .into_iter()
            .next()
            .map(|r| (r.output_text, r.token_count, r.completion_reason))
            .unwrap_or_default();

        let finish_reason = match completion_reason.as_deref() {
            Some("FINISH") => FinishReason::EndTurn,
            Some("LENGTH") => FinishReason::MaxTokens,
            _ => FinishReason::Unknown,
        };

        AdapterResponse {
            content,
            finish_reason,
            usage: Usage {
                input_tokens: resp.input_text_token_count,
                output_tokens,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_shape_and_trailing_cue() {
        let messages = vec![
            Message::user("Hello"),
            Message::assistant("Hi there"),
            Message::user("What time is it?"),
        ];
        assert_eq!(
            build_transcript(&messages),
            "Human: Hello\n\nAssistant: Hi there\n\nHuman: What time is it?\n\nAssistant:"
        );
    }

    #[test]
    fn test_transcript_system_leads_as_bare_paragraph() {
        let messages = vec![Message::system("Answer briefly."), Message::user("hi")];
        assert_eq!(
            build_transcript(&messages),
            "Answer briefly.\n\nHuman: hi\n\nAssistant:"
        );
    }

    #[test]
    fn test_request_serialization_camel_case() {
        let req = build_request(
            &[Message::user("hi")],
            &ModelConfig::default(),
            Some(0.3),
            None,
        );
        let json = serde_json::to_value(&req).unwrap();
        assert!(json["inputText"].as_str().unwrap().ends_with("Assistant:"));
        assert_eq!(json["textGenerationConfig"]["maxTokenCount"], 1024);
        assert_eq!(json["textGenerationConfig"]["temperature"], 0.3);
        assert!(json["textGenerationConfig"].get("topP").is_none());
    }

    #[test]
    fn test_response_mapping() {
        let json = r#"{
            "inputTextTokenCount": 25,
            "results": [
                {"tokenCount": 8, "outputText": " A reply.", "completionReason": "FINISH"}
            ]
        }"#;
        let resp: TitanResponse = serde_json::from_str(json).unwrap();
        let adapter_resp: AdapterResponse = resp.into();
        assert_eq!(adapter_resp.content, " A reply.");
        assert_eq!(adapter_resp.finish_reason, FinishReason::EndTurn);
        assert_eq!(adapter_resp.usage.input_tokens, 25);
        assert_eq!(adapter_resp.usage.output_tokens, 8);
    }

    #[test]
    fn test_response_without_results_is_empty() {
        let json = r#"{"inputTextTokenCount": 10, "results": []}"#;
        let resp: TitanResponse = serde_json::from_str(json).unwrap();
        let adapter_resp: AdapterResponse = resp.into();
        assert!(adapter_resp.content.is_empty());
        assert_eq!(adapter_resp.finish_reason, FinishReason::Unknown);
    }
}
