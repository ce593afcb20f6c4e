/*!
 * Ollama translation backend.
 *
 * Talks to a local Ollama server through its /api/generate endpoint.
 * Server errors and network failures are retried with exponential
 * backoff; client errors fail the attempt immediately so the manager
 * can move on to the next backend in the chain.
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

use super::TranslationBackend;

/// Generate request for the Ollama API
#[derive(Debug, Serialize)]
struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// System message to guide the model
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Whether to stream the response
    stream: bool,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
}

#[derive(Debug, Serialize)]
struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Deserialize)]
struct GenerationResponse {
    /// Generated text
    response: String,
}

/// Ollama client for subtitle batch translation
#[derive(Debug)]
pub struct OllamaBackend {
    /// Base URL of the Ollama API
    base_url: String,
    /// Model name
    model: String,
    /// HTTP client for making requests
    client: Client,
    /// Per-request timeout enforced by the manager
    timeout: Duration,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

impl OllamaBackend {
    /// Build a backend from its configuration entry.
    pub fn from_entry(entry: &BackendEntry) -> Result<Self, ConfigurationError> {
        if entry.model.trim().is_empty() {
            return Err(ConfigurationError::Missing(
                "translation.backends[ollama].model".to_string(),
            ));
        }

        let base_url = if entry.endpoint.trim().is_empty() {
            "http://localhost:11434".to_string()
        } else {
            entry.endpoint.trim_end_matches('/').to_string()
        };

        Ok(Self {
            base_url,
            model: entry.model.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(entry.timeout_secs))
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_secs(entry.timeout_secs),
            max_retries: entry.retry_count,
            backoff_base_ms: entry.retry_backoff_ms,
        })
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, TranslationBackendError> {
        let url = format!("{}/api/generate", self.base_url);

        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.max_retries {
            match self.client.post(&url).json(request).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed = response
                            .json::<GenerationResponse>()
                            .await
                            .map_err(|e| {
                                TranslationBackendError::ParseError(format!(
                                    "Failed to parse Ollama API response: {}",
                                    e
                                ))
                            })?;
                        return Ok(parsed.response);
                    } else if status.is_server_error() {
                        // Server error, retryable
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Failed to get error response text".to_string());
                        warn!(
                            "Ollama API error ({}): {} - attempt {}/{}",
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
                        // Client error, not retryable
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Failed to get error response text".to_string());
                        error!("Ollama API error ({}): {}", status, error_text);
                        return Err(TranslationBackendError::ApiError {
                            status_code: status.as_u16(),
                            message: error_text,
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        "Ollama API network error: {} - attempt {}/{}",
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
                "Ollama API request failed after {} attempts",
                self.max_retries + 1
            ))
        }))
    }
}

#[async_trait]
impl TranslationBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn translate_batch(
        &self,
        batch: &TranslationBatch,
    ) -> Result<Vec<String>, TranslationBackendError> {
        let request = GenerationRequest {
            model: self.model.clone(),
            prompt: prompts::build_prompt(batch),
            system: Some(prompts::system_prompt(batch)),
            stream: false,
            options: Some(GenerationOptions { temperature: Some(0.3) }),
        };

        debug!(
            "Sending {} lines to Ollama model {} (attempt {})",
            batch.lines.len(),
            self.model,
            batch.attempt
        );

        let text = self.generate(&request).await?;
        prompts::parse_numbered_lines(&text, batch.lines.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::BackendKind;

    fn entry(model: &str, endpoint: &str) -> BackendEntry {
        BackendEntry {
            kind: BackendKind::Ollama,
            model: model.to_string(),
            endpoint: endpoint.to_string(),
            api_key: String::new(),
            timeout_secs: 30,
            retry_count: 2,
            retry_backoff_ms: 100,
        }
    }

    #[test]
    fn test_fromEntry_withMissingModel_shouldFail() {
        assert!(OllamaBackend::from_entry(&entry("", "")).is_err());
    }

    #[test]
    fn test_fromEntry_withEmptyEndpoint_shouldDefaultToLocalhost() {
        let backend = OllamaBackend::from_entry(&entry("llama3", "")).unwrap();
        assert_eq!(backend.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_fromEntry_shouldStripTrailingSlashFromEndpoint() {
        let backend = OllamaBackend::from_entry(&entry("llama3", "http://ollama:11434/")).unwrap();
        assert_eq!(backend.base_url, "http://ollama:11434");
    }
}
