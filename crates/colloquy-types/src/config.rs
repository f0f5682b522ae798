//! Broker configuration types.
//!
//! `BrokerConfig` is the top-level `config.toml` shape. All fields have
//! defaults so a missing or partial file still yields a working broker.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the conversation broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Maximum non-system messages retained per context window.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Maximum accepted user message length, in characters.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Hours of inactivity after which the sweeper evicts a context.
    #[serde(default = "default_context_max_age_hours")]
    pub context_max_age_hours: u32,

    /// Interval between sweeper runs, in hours.
    #[serde(default = "default_sweep_interval_hours")]
    pub sweep_interval_hours: u32,

    /// Override for the canonical system preamble injected into contexts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Words per chunk when pseudo-streaming a full response.
    #[serde(default = "default_pseudo_chunk_words")]
    pub pseudo_chunk_words: usize,

    /// Artificial delay between pseudo-streamed chunks, in milliseconds.
    #[serde(default = "default_pseudo_chunk_delay_ms")]
    pub pseudo_chunk_delay_ms: u64,

    /// Model backend configuration.
    #[serde(default)]
    pub model: ModelConfig,
}

fn default_window_size() -> usize {
    10
}

fn default_max_content_chars() -> usize {
    5000
}

fn default_context_max_age_hours() -> u32 {
    24
}

fn default_sweep_interval_hours() -> u32 {
    1
}

fn default_pseudo_chunk_words() -> usize {
    3
}

fn default_pseudo_chunk_delay_ms() -> u64 {
    50
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            max_content_chars: default_max_content_chars(),
            context_max_age_hours: default_context_max_age_hours(),
            sweep_interval_hours: default_sweep_interval_hours(),
            system_prompt: None,
            pseudo_chunk_words: default_pseudo_chunk_words(),
            pseudo_chunk_delay_ms: default_pseudo_chunk_delay_ms(),
            model: ModelConfig::default(),
        }
    }
}

/// Configuration for the model backend.
///
/// `temperature` and `top_p` are optional; out-of-range values are left at
/// the provider default by the adapter rather than failing the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider model identifier (e.g., "anthropic.claude-3-sonnet-20240229-v1:0").
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Provider region (e.g., "us-east-1").
    #[serde(default = "default_region")]
    pub region: String,

    /// Maximum output tokens per generation. Must be > 0.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Nucleus-sampling probability in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

fn default_model_id() -> String {
    "anthropic.claude-3-sonnet-20240229-v1:0".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            region: default_region(),
            max_tokens: default_max_tokens(),
            temperature: None,
            top_p: None,
        }
    }
}
