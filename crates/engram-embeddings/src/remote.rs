//! HTTP embedding provider for OpenAI-compatible endpoints.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use engram_types::EmbeddingSettings;

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingProvider};

/// Configuration for the HTTP embedder.
#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    /// Model to use (e.g., "text-embedding-3-small")
    pub model: String,

    /// API key
    pub api_key: SecretString,

    /// Expected embedding dimension
    pub dimension: usize,

    /// Request timeout
    pub timeout: Duration,

    /// Maximum retries on transient failure
    pub max_retries: u32,
}

impl HttpEmbedderConfig {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            dimension,
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }

    /// Build from loaded settings. The key comes from settings or, failing
    /// that, the ENGRAM_EMBEDDING_API_KEY environment variable.
    pub fn from_settings(
        settings: &EmbeddingSettings,
        dimension: usize,
    ) -> Result<Self, EmbeddingError> {
        let api_key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var("ENGRAM_EMBEDDING_API_KEY").ok())
            .ok_or_else(|| {
                EmbeddingError::Config("no embedding API key configured".to_string())
            })?;

        Ok(Self {
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            api_key: SecretString::from(api_key),
            dimension,
            timeout: Duration::from_secs(settings.timeout_secs),
            max_retries: settings.max_retries,
        })
    }
}

/// Embedding provider backed by an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    client: Client,
    config: HttpEmbedderConfig,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Call the API with retry logic.
    async fn call_api(&self, input: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, texts = input.len(), "Calling embedding API");

            match self.make_request(input).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempts >= self.config.max_retries {
                        error!(error = %e, "Max retries exceeded");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "Embedding call failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Make a single API request.
    async fn make_request(&self, input: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        #[derive(Serialize)]
        struct EmbeddingRequest<'a> {
            model: &'a str,
            input: &'a [&'a str],
        }

        #[derive(Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            index: usize,
            embedding: Vec<f32>,
        }

        let request = EmbeddingRequest {
            model: &self.config.model,
            input,
        };

        let url = format!("{}/embeddings", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        if response.status() == 429 {
            return Err(EmbeddingError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Provider(format!("HTTP {}: {}", status, body)));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Parse(e.to_string()))?;

        // The API may return entries out of order; restore input order.
        let mut data = body.data;
        data.sort_by_key(|d| d.index);

        if data.len() != input.len() {
            return Err(EmbeddingError::Parse(format!(
                "expected {} embeddings, got {}",
                input.len(),
                data.len()
            )));
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn check_dimension(&self, values: &[f32]) -> Result<(), EmbeddingError> {
        if values.len() != self.config.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.config.dimension,
                actual: values.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let vectors = self.call_api(&[text]).await?;
        let values = vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Parse("empty embedding response".to_string()))?;
        self.check_dimension(&values)?;
        Ok(Embedding::new(values))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.call_api(texts).await?;
        vectors
            .into_iter()
            .map(|values| {
                self.check_dimension(&values)?;
                Ok(Embedding::new(values))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings_requires_key() {
        let settings = EmbeddingSettings {
            api_key: None,
            ..Default::default()
        };
        // Only valid when the env var is also absent.
        if std::env::var("ENGRAM_EMBEDDING_API_KEY").is_err() {
            assert!(HttpEmbedderConfig::from_settings(&settings, 768).is_err());
        }
    }

    #[test]
    fn test_config_from_settings_with_key() {
        let settings = EmbeddingSettings {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let config = HttpEmbedderConfig::from_settings(&settings, 768).unwrap();
        assert_eq!(config.dimension, 768);
        assert!(config.base_url.contains("openai"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(EmbeddingError::RateLimitExceeded.is_transient());
        assert!(EmbeddingError::Request("timeout".to_string()).is_transient());
        assert!(!EmbeddingError::Provider("HTTP 400".to_string()).is_transient());
        assert!(!EmbeddingError::DimensionMismatch {
            expected: 768,
            actual: 384
        }
        .is_transient());
    }
}
