//! Llama-family wire format for the Bedrock Runtime API.
//!
//! Llama models take one instruction-tagged prompt string instead of a turn
//! list: user turns ride inside `[INST] ... [/INST]` delimiters, assistant
//! turns are appended as plain continuation text, and a system message is
//! folded into a `<<SYS>>` block. Turns are concatenated in order with no
//! separators beyond the delimiters.

use serde::{Deserialize, Serialize};

use colloquy_types::adapter::{AdapterResponse, FinishReason, Usage};
use colloquy_types::config::ModelConfig;
use colloquy_types::message::{Message, MessageRole};

/// Request body for Llama invoke.
#[derive(Debug, Clone, Serialize)]
pub struct LlamaRequest {
    pub prompt: String,
    pub max_gen_len: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

/// Serialize the message sequence into a Llama instruction prompt.
pub fn build_prompt(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for msg in messages {
        match msg.role {
            MessageRole::System => {
                prompt.push_str("<<SYS>>\n");
                prompt.push_str(&msg.content);
                prompt.push_str("\n<</SYS>>\n");
            }
            MessageRole::User => {
                prompt.push_str("[INST] ");
                prompt.push_str(&msg.content);
                prompt.push_str(" [/INST]");
            }
            MessageRole::Assistant => {
                prompt.push_str(&msg.content);
            }
        }
    }
    prompt
}

/// Build a Llama request from the uniform message sequence.
pub fn build_request(
    messages: &[Message],
    config: &ModelConfig,
    temperature: Option<f64>,
    top_p: Option<f64>,
) -> LlamaRequest {
    LlamaRequest {
        prompt: build_prompt(messages),
        max_gen_len: config.max_tokens,
        temperature,
        top_p,
    }
}

/// Response body for Llama invoke.
#[derive(Debug, Clone, Deserialize)]
pub struct LlamaResponse {
    pub generation: String,
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub generation_token_count: u32,
    pub stop_reason: Option<String>,
}

impl From<LlamaResponse> for AdapterResponse {
    fn from(resp: LlamaResponse) -> Self {
        let finish_reason = match resp.stop_reason.as_deref() {
            Some("stop") => FinishReason::EndTurn,
            Some("length") => FinishReason::MaxTokens,
            _ => FinishReason::Unknown,
        };
        AdapterResponse {
            content: resp.generation,
            finish_reason,
            usage: Usage {
                input_tokens: resp.prompt_token_count,
                output_tokens: resp.generation_token_count,
            },
        }
    }
}
