/*!
 * Anthropic messages-API translation backend.
 */

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::app_config::BackendEntry;
use crate::errors::{ConfigurationError, TranslationBackendError};
use crate::translation::prompts;
use crate::translation::TranslationBatch;

use super::{require_api_key, TranslationBackend};

/// Anthropic message request
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    /// The model to use
    model: String,
    /// The messages for the conversation
    messages: Vec<AnthropicMessage>,
    /// System prompt to guide the model
    system: String,
    /// Maximum number of tokens to generate
    max_tokens: u32,
    /// Temperature for generation
    temperature: f32,
}

/// Anthropic message format
#[derive(Debug, Serialize)]
struct AnthropicMessage {
    /// Role of the message sender (user, assistant)
    role: String,
    /// Content of the message
    content: String,
}

/// Anthropic response
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    /// The content blocks of the response
    content: Vec<AnthropicContent>,
}

/// Individual content block in an Anthropic response
#[derive(Debug, Deserialize)]
struct AnthropicContent {
    /// The type of content
    #[serde(rename = "type")]
    content_type: String,
    /// The actual text content
    text: String,
}

/// Anthropic client for subtitle batch translation
#[derive(Debug)]
pub struct AnthropicBackend {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API endpoint URL (optional, defaults to the public API)
    endpoint: String,
    /// Model name
    model: String,
    /// Per-request timeout enforced by the manager
    timeout: Duration,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

impl AnthropicBackend {
    /// Build a backend from its configuration entry.
    pub fn from_entry(entry: &BackendEntry) -> Result<Self, ConfigurationError> {
        let api_key = require_api_key(entry)?;
        if entry.model.trim().is_empty() {
            return Err(ConfigurationError::Missing(
                "translation.backends[anthropic].model".to_string(),
            ));
        }

        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(entry.timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key,
            endpoint: entry.endpoint.trim_end_matches('/').to_string(),
            model: entry.model.clone(),
            timeout: Duration::from_secs(entry.timeout_secs),
            max_retries: entry.retry_count,
            backoff_base_ms: entry.retry_backoff_ms,
        })
    }

    fn api_url(&self) -> String {
        if self.endpoint.is_empty() {
            "https://api.anthropic.com/v1/messages".to_string()
        } else {
            format!("{}/v1/messages", self.endpoint)
        }
    }

    async fn complete(&self, request: &AnthropicRequest) -> Result<String, TranslationBackendError> {
        let url = self.api_url();

        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.max_retries {
            match self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(request)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed = response.json::<AnthropicResponse>().await.map_err(|e| {
                            TranslationBackendError::ParseError(format!(
                                "Failed to parse Anthropic API response: {}",
                                e
                            ))
                        })?;
                        let text: String = parsed
                            .content
                            .iter()
                            .filter(|c| c.content_type == "text")
                            .map(|c| c.text.clone())
                            .collect();
                        return Ok(text);
                    } else if status.as_u16() == 429 || status.is_server_error() {
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Failed to get error response text".to_string());
                        warn!(
                            "Anthropic API error ({}): {} - attempt {}/{}",
                            status,
                            error_text,
                            attempt + 1,
                            self.max_retries + 1
                        );
                        last_error = Some(TranslationBackendError::ApiError {
                            status_code: status.as_u16(),
                            message: error_text,
                        });
                    } else {
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Failed to get error response text".to_string());
                        error!("Anthropic API error ({}): {}", status, error_text);
                        return Err(TranslationBackendError::ApiError {
                            status_code: status.as_u16(),
                            message: error_text,
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        "Anthropic API network error: {} - attempt {}/{}",
                        e,
                        attempt + 1,
                        self.max_retries + 1
                    );
                    last_error = Some(TranslationBackendError::RequestFailed(e.to_string()));
                }
            }

            attempt += 1;
            if attempt <= self.max_retries {
                let backoff_ms = self.backoff_base_ms * (1u64 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TranslationBackendError::RequestFailed(format!(
                "Anthropic API request failed after {} attempts",
                self.max_retries + 1
            ))
        }))
    }
}

#[async_trait]
impl TranslationBackend for AnthropicBackend {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn translate_batch(
        &self,
        batch: &TranslationBatch,
    ) -> Result<Vec<String>, TranslationBackendError> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompts::build_prompt(batch),
            }],
            system: prompts::system_prompt(batch),
            max_tokens: 4096,
            temperature: 0.3,
        };

        debug!(
            "Sending {} lines to Anthropic model {} (attempt {})",
            batch.lines.len(),
            self.model,
            batch.attempt
        );

        let text = self.complete(&request).await?;
        prompts::parse_numbered_lines(&text, batch.lines.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::BackendKind;

    fn entry(api_key: &str, endpoint: &str) -> BackendEntry {
        BackendEntry {
            kind: BackendKind::Anthropic,
            model: "claude-sonnet".to_string(),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            timeout_secs: 30,
            retry_count: 1,
            retry_backoff_ms: 100,
        }
    }

    #[test]
    fn test_fromEntry_withMissingApiKey_shouldFail() {
        assert!(AnthropicBackend::from_entry(&entry("", "")).is_err());
    }

    #[test]
    fn test_apiUrl_withEmptyEndpoint_shouldUsePublicApi() {
        let backend = AnthropicBackend::from_entry(&entry("key", "")).unwrap();
        assert_eq!(backend.api_url(), "https://api.anthropic.com/v1/messages");
    }
}
