/*!
 * OpenAI-compatible chat-completions translation backend.
 *
 * Works against the official OpenAI API and against any server exposing
 * the same /v1/chat/completions surface. Rate-limit responses are
 * retried with exponential backoff.
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

/// Chat message format
#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    role: String,
    /// Content of the message
    content: String,
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatRequest {
    /// The model to use
    model: String,
    /// The messages for the conversation
    messages: Vec<ChatMessage>,
    /// Temperature for generation
    temperature: f32,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    /// Completion choices, the first one carries the answer
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// OpenAI client for subtitle batch translation
#[derive(Debug)]
pub struct OpenAIBackend {
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

impl OpenAIBackend {
    /// Build a backend from its configuration entry.
    pub fn from_entry(entry: &BackendEntry) -> Result<Self, ConfigurationError> {
        let api_key = require_api_key(entry)?;
        if entry.model.trim().is_empty() {
            return Err(ConfigurationError::Missing(
                "translation.backends[openai].model".to_string(),
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
            "https://api.openai.com/v1/chat/completions".to_string()
        } else {
            format!("{}/v1/chat/completions", self.endpoint)
        }
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, TranslationBackendError> {
        let url = self.api_url();

        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.max_retries {
            match self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(request)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed = response.json::<ChatResponse>().await.map_err(|e| {
                            TranslationBackendError::ParseError(format!(
                                "Failed to parse OpenAI API response: {}",
                                e
                            ))
                        })?;
                        return match parsed.choices.into_iter().next() {
                            Some(choice) => Ok(choice.message.content),
                            None => Err(TranslationBackendError::ParseError(
                                "OpenAI API response contained no choices".to_string(),
                            )),
                        };
                    } else if status.as_u16() == 429 || status.is_server_error() {
                        // Rate limit or server error, retryable
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Failed to get error response text".to_string());
                        warn!(
                            "OpenAI API error ({}): {} - attempt {}/{}",
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
                        error!("OpenAI API error ({}): {}", status, error_text);
                        return Err(TranslationBackendError::ApiError {
                            status_code: status.as_u16(),
                            message: error_text,
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        "OpenAI API network error: {} - attempt {}/{}",
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
                "OpenAI API request failed after {} attempts",
                self.max_retries + 1
            ))
        }))
    }
}

#[async_trait]
impl TranslationBackend for OpenAIBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn translate_batch(
        &self,
        batch: &TranslationBatch,
    ) -> Result<Vec<String>, TranslationBackendError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompts::system_prompt(batch),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompts::build_prompt(batch),
                },
            ],
            temperature: 0.3,
        };

        debug!(
            "Sending {} lines to OpenAI model {} (attempt {})",
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
            kind: BackendKind::OpenAI,
            model: "gpt-4o-mini".to_string(),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            timeout_secs: 30,
            retry_count: 2,
            retry_backoff_ms: 100,
        }
    }

    #[test]
    fn test_fromEntry_withMissingApiKey_shouldFail() {
        assert!(OpenAIBackend::from_entry(&entry("", "")).is_err());
    }

    #[test]
    fn test_apiUrl_withEmptyEndpoint_shouldUsePublicApi() {
        let backend = OpenAIBackend::from_entry(&entry("sk-test", "")).unwrap();
        assert_eq!(backend.api_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_apiUrl_withCustomEndpoint_shouldAppendPath() {
        let backend = OpenAIBackend::from_entry(&entry("sk-test", "http://proxy:8080/")).unwrap();
        assert_eq!(backend.api_url(), "http://proxy:8080/v1/chat/completions");
    }
}
