/*!
 * OpenSubtitles-compatible REST provider.
 *
 * Talks to an OpenSubtitles-style JSON API: a search endpoint returning
 * attributed candidates and a download endpoint resolving a file id to the
 * raw subtitle payload. Retries transient failures with exponential backoff.
 */

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::app_config::ProviderEntry;
use crate::errors::{ConfigurationError, ProviderError};

use super::{CandidateFlags, SubtitleCandidate, SubtitleProvider, SubtitleQuery};

const DEFAULT_ENDPOINT: &str = "https://api.opensubtitles.com/api/v1";
const REQUEST_TIMEOUT_SECS: u64 = 20;

/// OpenSubtitles REST client.
#[derive(Debug)]
pub struct OpenSubtitles {
    /// Base URL of the API
    base_url: String,

    /// API key sent with every request
    api_key: String,

    /// HTTP client for making requests
    client: Client,

    /// Tie-break priority
    priority: u32,

    /// Maximum number of retry attempts
    max_retries: u32,

    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

/// Search response envelope.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    attributes: SearchAttributes,
}

#[derive(Debug, Deserialize)]
struct SearchAttributes {
    language: Option<String>,
    release: Option<String>,
    #[serde(default)]
    hearing_impaired: bool,
    #[serde(default)]
    foreign_parts_only: bool,
    #[serde(default)]
    machine_translated: bool,
    #[serde(default)]
    ai_translated: bool,
    #[serde(default)]
    from_trusted: bool,
    #[serde(default)]
    files: Vec<SearchFile>,
}

#[derive(Debug, Deserialize)]
struct SearchFile {
    file_id: u64,
}

/// Download-link response.
#[derive(Debug, Deserialize)]
struct DownloadResponse {
    link: String,
}

impl OpenSubtitles {
    /// Create a client against a custom endpoint.
    pub fn new(endpoint: &str, api_key: &str, priority: u32) -> Self {
        Self {
            base_url: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            priority,
            max_retries: 2,
            backoff_base_ms: 500,
        }
    }

    /// Build from a config entry. Requires an `api_key` setting.
    pub fn from_entry(entry: &ProviderEntry) -> Result<Self, ConfigurationError> {
        let api_key = entry
            .settings
            .get("api_key")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigurationError::Missing("providers.opensubtitles.api_key".to_string()))?;

        let endpoint = entry
            .settings
            .get("endpoint")
            .map(String::as_str)
            .unwrap_or(DEFAULT_ENDPOINT);

        Ok(Self::new(endpoint, api_key, entry.priority))
    }

    /// Issue a GET with retry and exponential backoff on transient failures.
    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response, ProviderError> {
        let mut attempt = 0u32;

        loop {
            let result = self
                .client
                .get(url)
                .header("Api-Key", &self.api_key)
                .header("Accept", "application/json")
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();

                    if status.as_u16() == 429 {
                        if attempt < self.max_retries {
                            let backoff = self.backoff_base_ms * 2u64.pow(attempt);
                            warn!("OpenSubtitles rate limited, retrying in {} ms", backoff);
                            tokio::time::sleep(Duration::from_millis(backoff)).await;
                            attempt += 1;
                            continue;
                        }
                        return Err(ProviderError::RateLimitExceeded(status.to_string()));
                    }

                    if status.as_u16() == 401 || status.as_u16() == 403 {
                        return Err(ProviderError::AuthenticationError(status.to_string()));
                    }

                    let message = response.text().await.unwrap_or_default();
                    return Err(ProviderError::ApiError {
                        status_code: status.as_u16(),
                        message,
                    });
                }
                Err(e) if attempt < self.max_retries => {
                    let backoff = self.backoff_base_ms * 2u64.pow(attempt);
                    debug!("OpenSubtitles request failed ({}), retrying in {} ms", e, backoff);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                Err(e) => return Err(ProviderError::RequestFailed(e.to_string())),
            }
        }
    }

    fn search_url(&self, query: &SubtitleQuery) -> String {
        let mut url = format!(
            "{}/subtitles?query={}&languages={}",
            self.base_url,
            urlencode(&query.title),
            urlencode(&query.language)
        );

        if let Some(year) = query.year {
            url.push_str(&format!("&year={}", year));
        }
        if let Some(season) = query.season {
            url.push_str(&format!("&season_number={}", season));
        }
        if let Some(episode) = query.episode {
            url.push_str(&format!("&episode_number={}", episode));
        }

        url
    }
}

/// Percent-encode a query component.
fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[async_trait]
impl SubtitleProvider for OpenSubtitles {
    fn name(&self) -> &str {
        "opensubtitles"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn config_fields(&self) -> &'static [&'static str] {
        &["api_key", "endpoint"]
    }

    async fn search(&self, query: &SubtitleQuery) -> Result<Vec<SubtitleCandidate>, ProviderError> {
        let url = self.search_url(query);
        debug!("OpenSubtitles search: {}", url);

        let response = self.get_with_retry(&url).await?;
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let candidates = body
            .data
            .into_iter()
            .filter_map(|item| {
                let attrs = item.attributes;
                let file_id = attrs.files.first()?.file_id;

                Some(SubtitleCandidate {
                    provider: "opensubtitles".to_string(),
                    id: file_id.to_string(),
                    language: attrs.language.unwrap_or_default(),
                    format: "srt".to_string(),
                    release_name: attrs.release.unwrap_or_default(),
                    uploader_trusted: attrs.from_trusted,
                    machine_translated: attrs.machine_translated || attrs.ai_translated,
                    // The API only carries a boolean; flagged candidates get
                    // full confidence, unflagged ones none.
                    mt_confidence: if attrs.machine_translated || attrs.ai_translated {
                        100
                    } else {
                        0
                    },
                    flags: CandidateFlags {
                        forced: attrs.foreign_parts_only,
                        hearing_impaired: attrs.hearing_impaired,
                    },
                })
            })
            .collect();

        Ok(candidates)
    }

    async fn download(&self, candidate_id: &str) -> Result<Bytes, ProviderError> {
        // Resolve the file id to a temporary download link first.
        let url = format!("{}/download", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("Accept", "application/json")
            .json(&serde_json::json!({ "file_id": candidate_id }))
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::DownloadFailed {
                candidate_id: candidate_id.to_string(),
                message: format!("link request returned {}", response.status()),
            });
        }

        let link: DownloadResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let payload = self
            .get_with_retry(&link.link)
            .await?
            .bytes()
            .await
            .map_err(|e| ProviderError::DownloadFailed {
                candidate_id: candidate_id.to_string(),
                message: e.to_string(),
            })?;

        Ok(payload)
    }
}
