use std::path::Path;

use reqwest::Url;

use crate::config::schema::{ChatProviderConfig, Config, StorageConfig};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(validation("worker_count must be at least 1"));
    }
    if config.queue_capacity == 0 {
        return Err(validation("queue_capacity must be at least 1"));
    }
    if config.sweep_interval_secs == 0 {
        return Err(validation("sweep_interval_secs must be at least 1"));
    }

    if !(0.0..=1.0).contains(&config.classifier.default_confidence) {
        return Err(validation("classifier.default_confidence must be within [0, 1]"));
    }
    if !(0.0..=1.0).contains(&config.compliance.confidence_threshold) {
        return Err(validation("compliance.confidence_threshold must be within [0, 1]"));
    }
    if config.transcription.max_poll_attempts == 0 {
        return Err(validation("transcription.max_poll_attempts must be at least 1"));
    }

    validate_chat_provider("vision", &config.vision)?;
    validate_chat_provider("language", &config.language)?;
    validate_endpoint("transcription", &config.transcription.endpoint)?;

    match &config.storage {
        StorageConfig::Filesystem {
            public_base_url, ..
        } => validate_endpoint("storage.public_base_url", public_base_url)?,
        StorageConfig::Http { base_url, .. } => validate_endpoint("storage.base_url", base_url)?,
    }

    Ok(())
}

fn validation(message: &str) -> ConfigError {
    ConfigError::Validation {
        message: message.to_string(),
    }
}

fn validate_chat_provider(name: &str, provider: &ChatProviderConfig) -> Result<(), ConfigError> {
    validate_endpoint(name, &provider.endpoint)?;
    if provider.model.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: format!("{}.model must not be empty", name),
        });
    }
    Ok(())
}

fn validate_endpoint(name: &str, endpoint: &str) -> Result<(), ConfigError> {
    let url = Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEndpoint {
            name: name.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(())
}
