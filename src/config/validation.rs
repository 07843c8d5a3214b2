use crate::config::types::{ClientConfig, Config, HarvestConfig, OutputConfig, RetryConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_retry_config(&config.retry)?;
    validate_client_config(&config.client)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    let endpoint = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint: {}", e)))?;

    if endpoint.scheme() != "https" && endpoint.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "endpoint must use http or https, got '{}'",
            endpoint.scheme()
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    if config.reply_concurrency < 1 || config.reply_concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "reply_concurrency must be between 1 and 64, got {}",
            config.reply_concurrency
        )));
    }

    if config.max_reply_depth < 1 {
        return Err(ConfigError::Validation(
            "max_reply_depth must be >= 1".to_string(),
        ));
    }

    if let Some(key) = &config.api_key {
        if key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "api_key cannot be blank when present".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.initial_backoff_ms < 1 {
        return Err(ConfigError::Validation(
            "initial_backoff_ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_client_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.client_name.is_empty() {
        return Err(ConfigError::Validation(
            "client_name cannot be empty".to_string(),
        ));
    }

    if !config
        .client_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "client_name must contain only alphanumeric characters and underscores, got '{}'",
            config.client_name
        )));
    }

    if config.client_version.is_empty() {
        return Err(ConfigError::Validation(
            "client_version cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
