//! OpenAI client configuration with sensible defaults.

use crate::config::Settings;
use crate::error::{CloserError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Create an OpenAI client from settings.
///
/// Fails with a configuration error when no API key is available.
pub fn create_client(settings: &Settings) -> Result<Client<OpenAIConfig>> {
    let api_key = settings.api_key()?;
    create_client_with_timeout(&api_key, Duration::from_secs(settings.openai.timeout_seconds))
}

/// Create an OpenAI client with an explicit key and timeout.
pub fn create_client_with_timeout(api_key: &str, timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CloserError::Config(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Client::with_config(OpenAIConfig::new().with_api_key(api_key)).with_http_client(http_client))
}
