/*!
 * Transcription backend trait and the Whisper HTTP client.
 *
 * The HTTP client targets whisper servers exposing an `/asr` endpoint that
 * accepts raw audio bytes and returns JSON with the recognized text, timed
 * segments and the detected language.
 */

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

use crate::app_config::TranscriptionConfig;
use crate::errors::TranscriptionError;

use super::{Transcript, TranscriptSegment};

/// Progress callback invoked with the completed fraction (0.0 to 1.0).
pub type ProgressFn = Arc<dyn Fn(f32) + Send + Sync>;

/// The single active speech-to-text backend.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Display name used in logs and the diagnostic trail
    fn name(&self) -> &str;

    /// Transcribe one audio file. `progress` is called as segments
    /// complete, where the backend can observe that.
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
        progress: ProgressFn,
    ) -> Result<Transcript, TranscriptionError>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> Result<(), TranscriptionError>;

    /// List the models the backend can serve.
    async fn list_available_models(&self) -> Result<Vec<String>, TranscriptionError>;
}

/// Whisper ASR response shape. Times are in seconds.
#[derive(Debug, Deserialize)]
struct AsrResponse {
    text: String,
    language: String,
    #[serde(default)]
    segments: Vec<AsrSegment>,
}

#[derive(Debug, Deserialize)]
struct AsrSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<String>,
}

/// HTTP client for a whisper ASR server.
#[derive(Debug)]
pub struct WhisperHttp {
    /// Server base URL
    endpoint: String,
    /// Model name requested per transcription
    model: String,
    /// HTTP client
    client: Client,
}

impl WhisperHttp {
    /// Build a client from the transcription configuration.
    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(config.job_timeout_secs))
                .build()
                .unwrap_or_default(),
        }
    }

    fn asr_url(&self, language_hint: Option<&str>) -> String {
        let mut url = format!(
            "{}/asr?task=transcribe&output=json&model={}",
            self.endpoint, self.model
        );
        if let Some(lang) = language_hint {
            url.push_str("&language=");
            url.push_str(lang);
        }
        url
    }
}

#[async_trait]
impl TranscriptionBackend for WhisperHttp {
    fn name(&self) -> &str {
        "whisper-http"
    }

    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
        progress: ProgressFn,
    ) -> Result<Transcript, TranscriptionError> {
        let bytes = tokio::fs::read(audio).await.map_err(|e| {
            TranscriptionError::AudioExtraction(format!(
                "Failed to read audio file {}: {}",
                audio.display(),
                e
            ))
        })?;

        debug!(
            "Sending {} bytes of audio to whisper model {} at {}",
            bytes.len(),
            self.model,
            self.endpoint
        );
        progress(0.0);

        let response = self
            .client
            .post(self.asr_url(language_hint))
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| TranscriptionError::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            return Err(TranscriptionError::Backend(format!(
                "ASR server error ({}): {}",
                status, error_text
            )));
        }

        let parsed = response
            .json::<AsrResponse>()
            .await
            .map_err(|e| TranscriptionError::Backend(format!("Invalid ASR response: {}", e)))?;

        progress(1.0);

        Ok(Transcript {
            text: parsed.text,
            segments: parsed
                .segments
                .into_iter()
                .map(|s| TranscriptSegment {
                    start_ms: (s.start * 1000.0) as u64,
                    end_ms: (s.end * 1000.0) as u64,
                    text: s.text.trim().to_string(),
                })
                .collect(),
            detected_language: parsed.language,
        })
    }

    async fn health_check(&self) -> Result<(), TranscriptionError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| TranscriptionError::Backend(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(TranscriptionError::Backend(format!(
                "ASR server health check returned {}",
                response.status()
            )))
        }
    }

    async fn list_available_models(&self) -> Result<Vec<String>, TranscriptionError> {
        let url = format!("{}/models", self.endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TranscriptionError::Backend(e.to_string()))?;

        // Older servers have no model listing; fall back to the one we use.
        if response.status().as_u16() == 404 {
            return Ok(vec![self.model.clone()]);
        }

        let parsed = response
            .json::<ModelsResponse>()
            .await
            .map_err(|e| TranscriptionError::Backend(format!("Invalid models response: {}", e)))?;

        Ok(parsed.models)
    }
}
