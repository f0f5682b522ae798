//! AWS Bedrock model adapter.
//!
//! Contains the concrete implementation of the [`ModelAdapter`] trait
//! defined in `colloquy-core`, covering the Claude, Llama, and Titan model
//! families behind one adapter, plus a factory ([`create_adapter`]) that
//! constructs it from broker configuration.
//!
//! [`ModelAdapter`]: colloquy_core::adapter::ModelAdapter

pub mod adapter;
pub mod claude;
pub mod llama;
pub mod streaming;
pub mod titan;

pub use adapter::BedrockAdapter;

use secrecy::SecretString;

use colloquy_core::adapter::BoxModelAdapter;
use colloquy_types::adapter::AdapterError;
use colloquy_types::config::BrokerConfig;

/// Create a [`BoxModelAdapter`] from broker configuration.
///
/// Resolves the model family from the configured model identifier; an
/// identifier matching no known family fails here, at configuration time,
/// with [`AdapterError::UnsupportedModel`].
///
/// # Arguments
///
/// * `config` - Broker configuration carrying the model settings
/// * `api_key` - The resolved bearer token (supplied by the embedding
///   application's credential resolution)
pub fn create_adapter(
    config: &BrokerConfig,
    api_key: SecretString,
) -> Result<BoxModelAdapter, AdapterError> {
    let adapter = BedrockAdapter::new(api_key, config)?;
    Ok(BoxModelAdapter::new(adapter))
}
