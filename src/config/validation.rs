use crate::config::types::{HttpConfig, LoggingConfig, QueueConfig, WarmerConfig};
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use tracing_subscriber::EnvFilter;

/// Validates the entire configuration
pub fn validate(config: &WarmerConfig) -> Result<(), ConfigError> {
    validate_queue_config(&config.queue)?;
    validate_http_config(&config.http)?;
    validate_logging_config(&config.logging)?;

    // A claim younger than one request timeout may still be in flight
    if let Some(stale_after) = config.queue.stale_claim_after_secs {
        if stale_after <= config.http.timeout_secs {
            return Err(ConfigError::Validation(format!(
                "stale_claim_after_secs must exceed timeout_secs ({}), got {}",
                config.http.timeout_secs, stale_after
            )));
        }
    }

    Ok(())
}

fn validate_queue_config(config: &QueueConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.batch_size < 1 || config.batch_size > 1000 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and 1000, got {}",
            config.batch_size
        )));
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }
    HeaderValue::from_str(&config.user_agent)
        .map_err(|e| ConfigError::InvalidHeader(format!("user_agent: {}", e)))?;

    for (name, value) in &config.headers {
        HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| ConfigError::InvalidHeader(format!("'{}': {}", name, e)))?;
        HeaderValue::from_str(value.trim())
            .map_err(|e| ConfigError::InvalidHeader(format!("value of '{}': {}", name, e)))?;
    }

    Ok(())
}

fn validate_logging_config(config: &LoggingConfig) -> Result<(), ConfigError> {
    EnvFilter::try_new(&config.filter).map_err(|e| {
        ConfigError::Validation(format!("invalid log filter '{}': {}", config.filter, e))
    })?;
    Ok(())
}
