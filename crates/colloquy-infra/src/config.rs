//! Broker configuration loader.
//!
//! Reads `config.toml` from the data directory and deserializes it into
//! [`BrokerConfig`]. Falls back to defaults when the file is missing or
//! malformed; a broken config file must never keep the broker from
//! starting.

use std::path::Path;

use colloquy_types::config::BrokerConfig;

/// Load broker configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`BrokerConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the
///   default.
/// - If the file parses, returns the parsed config with invalid values
///   normalized (see [`normalize`]).
pub async fn load_config(data_dir: &Path) -> BrokerConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return BrokerConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return BrokerConfig::default();
        }
    };

    match toml::from_str::<BrokerConfig>(&content) {
        Ok(config) => normalize(config),
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            BrokerConfig::default()
        }
    }
}

/// Replace invalid values with their defaults rather than failing startup.
///
/// `max_tokens` must be positive and `window_size` must admit at least one
/// turn; zeros from a hand-edited file are corrected with a warning.
pub fn normalize(mut config: BrokerConfig) -> BrokerConfig {
    if config.model.max_tokens == 0 {
        tracing::warn!("model.max_tokens must be > 0, using default");
        config.model.max_tokens = BrokerConfig::default().model.max_tokens;
    }
    if config.window_size == 0 {
        tracing::warn!("window_size must be > 0, using default");
        config.window_size = BrokerConfig::default().window_size;
    }
    config
}
