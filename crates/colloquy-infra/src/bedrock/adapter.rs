//! BedrockAdapter -- concrete [`ModelAdapter`] implementation for the AWS
//! Bedrock Runtime API.
//!
//! The model family is resolved once at construction; request paths
//! dispatch on the resolved enum. Claude models stream natively over the
//! AWS binary event protocol; Llama and Titan are served by pseudo-streaming
//! a single full generation.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::time::Duration;

use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use colloquy_core::adapter::ModelAdapter;
use colloquy_core::adapter::contract::ChunkStream;
use colloquy_core::adapter::pseudo::pseudo_stream;
use colloquy_types::adapter::{
    AdapterCapabilities, AdapterError, AdapterResponse, ModelFamily,
};
use colloquy_types::config::{BrokerConfig, ModelConfig};
use colloquy_types::message::Message;

use super::{claude, llama, titan};
use super::streaming::open_stream;

/// AWS Bedrock model adapter.
pub struct BedrockAdapter {
    client: reqwest::Client,
    api_key: SecretString,
    model: ModelConfig,
    family: ModelFamily,
    /// Range-gated sampling parameters; out-of-range config values are
    /// dropped here so no call ever fails on them.
    temperature: Option<f64>,
    top_p: Option<f64>,
    capabilities: AdapterCapabilities,
    pseudo_chunk_words: usize,
    pseudo_chunk_delay: Duration,
}

// BedrockAdapter intentionally does NOT derive Debug to prevent accidental
// exposure of internal state.

impl BedrockAdapter {
    /// Overall per-request timeout, generous enough for long generations.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

    /// Create a Bedrock adapter from broker configuration.
    ///
    /// Resolving the model family happens here, making `UnsupportedModel` a
    /// construction-time failure rather than a per-turn one.
    pub fn new(api_key: SecretString, config: &BrokerConfig) -> Result<Self, AdapterError> {
        let family = ModelFamily::resolve(&config.model.model_id)?;

        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AdapterError::Upstream {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        let capabilities = AdapterCapabilities {
            native_streaming: family.native_streaming(),
            max_output_tokens: config.model.max_tokens,
        };

        debug!(
            model_id = %config.model.model_id,
            family = %family,
            native_streaming = capabilities.native_streaming,
            "bedrock adapter configured"
        );

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            family,
            temperature: gate_sampling_param("temperature", config.model.temperature),
            top_p: gate_sampling_param("top_p", config.model.top_p),
            capabilities,
            pseudo_chunk_words: config.pseudo_chunk_words,
            pseudo_chunk_delay: Duration::from_millis(config.pseudo_chunk_delay_ms),
        })
    }

    /// Full Bedrock Runtime URL for a given action.
    fn url(&self, action: &str) -> String {
        format!(
            "https://bedrock-runtime.{}.amazonaws.com/model/{}/{}",
            self.model.region, self.model.model_id, action
        )
    }

    /// Serialize the family-specific request body.
    fn build_body(&self, messages: &[Message]) -> Result<serde_json::Value, AdapterError> {
        let body = match self.family {
            ModelFamily::Claude => serde_json::to_value(claude::build_request(
                messages,
                &self.model,
                self.temperature,
                self.top_p,
            )),
            ModelFamily::Llama => serde_json::to_value(llama::build_request(
                messages,
                &self.model,
                self.temperature,
                self.top_p,
            )),
            ModelFamily::Titan => serde_json::to_value(titan::build_request(
                messages,
                &self.model,
                self.temperature,
                self.top_p,
            )),
        };
        body.map_err(|e| AdapterError::Deserialization(format!("request body: {e}")))
    }
}

/// Keep a sampling parameter only when it is inside its valid range.
///
/// An out-of-range value is left at the provider default rather than
/// failing the call.
fn gate_sampling_param(name: &str, value: Option<f64>) -> Option<f64> {
    match value {
        Some(v) if (0.0..=1.0).contains(&v) => Some(v),
        Some(v) => {
            warn!(param = name, value = v, "sampling parameter outside [0, 1], using provider default");
            None
        }
        None => None,
    }
}

/// Execute one `invoke` call and map the family-specific response.
///
/// Free-standing over owned arguments so the pseudo-streaming path can run
/// it from inside a `'static` stream.
async fn invoke(
    client: reqwest::Client,
    url: String,
    bearer: String,
    body: serde_json::Value,
    family: ModelFamily,
) -> Result<AdapterResponse, AdapterError> {
    debug!(url = %url, family = %family, "Bedrock invoke request");

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {bearer}"))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| AdapterError::Upstream {
            message: format!("HTTP request failed: {e}"),
        })?;

    let status = response.status();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        warn!(status = %status, body = %error_body, url = %url, "Bedrock API error response");
        return Err(AdapterError::Upstream {
            message: format!("HTTP {status}: {error_body}"),
        });
    }

    let text = response.text().await.map_err(|e| AdapterError::Upstream {
        message: format!("response body read: {e}"),
    })?;

    parse_response(family, &text)
}

/// Deserialize a family-specific response body into the uniform shape.
fn parse_response(family: ModelFamily, body: &str) -> Result<AdapterResponse, AdapterError> {
    match family {
        ModelFamily::Claude => serde_json::from_str::<claude::ClaudeResponse>(body)
            .map(Into::into)
            .map_err(|e| AdapterError::Deserialization(format!("claude response: {e}"))),
        ModelFamily::Llama => serde_json::from_str::<llama::LlamaResponse>(body)
            .map(Into::into)
            .map_err(|e| AdapterError::Deserialization(format!("llama response: {e}"))),
        ModelFamily::Titan => serde_json::from_str::<titan::TitanResponse>(body)
            .map(Into::into)
            .map_err(|e| AdapterError::Deserialization(format!("titan response: {e}"))),
    }
}

impl ModelAdapter for BedrockAdapter {
    fn name(&self) -> &str {
        "bedrock"
    }

    fn model_id(&self) -> &str {
        &self.model.model_id
    }

    fn capabilities(&self) -> &AdapterCapabilities {
        &self.capabilities
    }

    async fn generate(&self, messages: &[Message]) -> Result<AdapterResponse, AdapterError> {
        let body = self.build_body(messages)?;
        invoke(
            self.client.clone(),
            self.url("invoke"),
            self.api_key.expose_secret().to_string(),
            body,
            self.family,
        )
        .await
    }

    fn stream(&self, messages: Vec<Message>) -> ChunkStream {
        let body = match self.build_body(&messages) {
            Ok(body) => body,
            Err(err) => {
                return Box::pin(futures_util::stream::once(async move { Err(err) }));
            }
        };

        if self.family.native_streaming() {
            return open_stream(
                &self.client,
                &self.url("invoke-with-response-stream"),
                body,
                &self.api_key,
            );
        }

        // Pseudo-streaming: one full generation, segmented into paced word
        // chunks. Behaviorally indistinguishable from a native stream to
        // the caller apart from true incrementality.
        let client = self.client.clone();
        let url = self.url("invoke");
        let bearer = self.api_key.expose_secret().to_string();
        let family = self.family;
        let chunk_words = self.pseudo_chunk_words;
        let delay = self.pseudo_chunk_delay;

        Box::pin(async_stream::try_stream! {
            let response = invoke(client, url, bearer, body, family).await?;
            let mut inner = pseudo_stream(response, chunk_words, delay);
            while let Some(chunk) = inner.next().await {
                yield chunk?;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker_config(model_id: &str) -> BrokerConfig {
        BrokerConfig {
            model: ModelConfig {
                model_id: model_id.to_string(),
                ..ModelConfig::default()
            },
            ..BrokerConfig::default()
        }
    }

    fn adapter_for(model_id: &str) -> BedrockAdapter {
        BedrockAdapter::new(
            SecretString::from("test-not-a-real-key"),
            &broker_config(model_id),
        )
        .unwrap()
    }

    #[test]
    fn test_unknown_model_rejected_at_construction() {
        let result = BedrockAdapter::new(
            SecretString::from("test-key"),
            &broker_config("mistral.mistral-7b-instruct-v0:2"),
        );
        assert!(matches!(result, Err(AdapterError::UnsupportedModel(_))));
    }

    #[test]
    fn test_url_construction() {
        let adapter = adapter_for("anthropic.claude-3-sonnet-20240229-v1:0");
        assert_eq!(
            adapter.url("invoke"),
            "https://bedrock-runtime.us-east-1.amazonaws.com/model/anthropic.claude-3-sonnet-20240229-v1:0/invoke"
        );
        assert_eq!(
            adapter.url("invoke-with-response-stream"),
            "https://bedrock-runtime.us-east-1.amazonaws.com/model/anthropic.claude-3-sonnet-20240229-v1:0/invoke-with-response-stream"
        );
    }

    #[test]
    fn test_capabilities_follow_family() {
        assert!(
            adapter_for("anthropic.claude-3-sonnet-20240229-v1:0")
                .capabilities()
                .native_streaming
        );
        assert!(!adapter_for("meta.llama3-70b-instruct-v1:0").capabilities().native_streaming);
        assert!(!adapter_for("amazon.titan-text-express-v1").capabilities().native_streaming);
    }

    #[test]
    fn test_gate_sampling_param_ranges() {
        assert_eq!(gate_sampling_param("temperature", Some(0.0)), Some(0.0));
        assert_eq!(gate_sampling_param("temperature", Some(1.0)), Some(1.0));
        assert_eq!(gate_sampling_param("temperature", Some(1.5)), None);
        assert_eq!(gate_sampling_param("top_p", Some(-0.1)), None);
        assert_eq!(gate_sampling_param("top_p", None), None);
    }

    #[test]
    fn test_out_of_range_param_does_not_fail_body_build() {
        let mut config = broker_config("anthropic.claude-3-sonnet-20240229-v1:0");
        config.model.temperature = Some(7.0);
        let adapter = BedrockAdapter::new(SecretString::from("test-key"), &config).unwrap();

        let body = adapter.build_body(&[Message::user("hi")]).unwrap();
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_body_shape_per_family() {
        let messages = vec![Message::system("sys"), Message::user("hi")];

        let claude_body = adapter_for("anthropic.claude-3-sonnet-20240229-v1:0")
            .build_body(&messages)
            .unwrap();
        assert_eq!(claude_body["system"], "sys");
        assert_eq!(claude_body["messages"][0]["role"], "user");

        let llama_body = adapter_for("meta.llama3-70b-instruct-v1:0")
            .build_body(&messages)
            .unwrap();
        assert!(llama_body["prompt"].as_str().unwrap().contains("[INST] hi [/INST]"));

        let titan_body = adapter_for("amazon.titan-text-express-v1")
            .build_body(&messages)
            .unwrap();
        assert!(titan_body["inputText"].as_str().unwrap().ends_with("Assistant:"));
    }

    #[test]
    fn test_parse_response_per_family() {
        let claude = r#"{"content":[{"type":"text","text":"a"}],"stop_reason":"end_turn","usage":{"input_tokens":1,"output_tokens":2}}"#;
        assert_eq!(parse_response(ModelFamily::Claude, claude).unwrap().content, "a");

        let llama = r#"{"generation":"b","stop_reason":"stop"}"#;
        assert_eq!(parse_response(ModelFamily::Llama, llama).unwrap().content, "b");

        let titan = r#"{"inputTextTokenCount":1,"results":[{"tokenCount":2,"outputText":"c","completionReason":"FINISH"}]}"#;
        assert_eq!(parse_response(ModelFamily::Titan, titan).unwrap().content, "c");

        let err = parse_response(ModelFamily::Claude, "not json").unwrap_err();
        assert!(matches!(err, AdapterError::Deserialization(_)));
    }
}
