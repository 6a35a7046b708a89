//! HTTP embedding client for Ollama and OpenAI-compatible endpoints.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use kbase_types::{EmbeddingApi, EmbeddingSettings};

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

/// Configuration for the HTTP embedder.
#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    /// Wire format
    pub api: EmbeddingApi,

    /// API base URL (e.g., "http://localhost:11434")
    pub base_url: String,

    /// Model to use (e.g., "nomic-embed-text")
    pub model: String,

    /// Optional bearer token
    pub api_key: Option<SecretString>,

    /// Request timeout
    pub timeout: Duration,

    /// Maximum retries when rate limited
    pub max_retries: u32,
}

impl HttpEmbedderConfig {
    /// Create config for a local Ollama server.
    pub fn ollama(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api: EmbeddingApi::Ollama,
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }

    /// Create config for an OpenAI-compatible API.
    pub fn openai(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api: EmbeddingApi::Openai,
            base_url: base_url.into(),
            model: model.into(),
            api_key: Some(SecretString::from(api_key.into())),
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }

    /// Build from application settings.
    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        Self {
            api: settings.provider,
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().map(SecretString::from),
            timeout: Duration::from_secs(settings.timeout_secs),
            max_retries: settings.max_retries,
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
}

/// Remote embedder speaking HTTP/JSON.
pub struct HttpEmbedder {
    client: Client,
    config: HttpEmbedderConfig,
    info: ModelInfo,
}

impl HttpEmbedder {
    /// Create a new HTTP embedder.
    pub fn new(config: HttpEmbedderConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;

        let provider = match config.api {
            EmbeddingApi::Ollama => "ollama",
            EmbeddingApi::Openai => "openai",
        };
        let info = ModelInfo {
            name: config.model.clone(),
            provider: provider.to_string(),
        };

        Ok(Self {
            client,
            config,
            info,
        })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.api {
            EmbeddingApi::Ollama => format!("{}/api/embeddings", base),
            EmbeddingApi::Openai => format!("{}/embeddings", base),
        }
    }

    /// Call the API, retrying only when the service signals rate limiting.
    async fn call_api(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(250),
            max_elapsed_time: Some(self.config.timeout),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, "Calling embedding API");

            match self.make_request(text).await {
                Ok(values) => return Ok(values),
                Err(e) if e.is_rate_limited() && attempts <= self.config.max_retries => {
                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "Embedding API rate limited, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Make a single API request.
    async fn make_request(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = self.endpoint();
        let mut request = self.client.post(&url);

        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key.expose_secret()));
        }

        request = match self.config.api {
            EmbeddingApi::Ollama => request.json(&OllamaRequest {
                model: &self.config.model,
                prompt: text,
            }),
            EmbeddingApi::Openai => request.json(&OpenAIRequest {
                model: &self.config.model,
                input: text,
            }),
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EmbeddingError::Timeout(self.config.timeout)
            } else {
                EmbeddingError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let values = match self.config.api {
            EmbeddingApi::Ollama => {
                let parsed: OllamaResponse = response
                    .json()
                    .await
                    .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
                parsed.embedding
            }
            EmbeddingApi::Openai => {
                let parsed: OpenAIResponse = response
                    .json()
                    .await
                    .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
                parsed
                    .data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .ok_or_else(|| EmbeddingError::InvalidResponse("empty data array".into()))?
            }
        };

        if values.is_empty() {
            return Err(EmbeddingError::InvalidResponse(
                "embedding vector is empty".to_string(),
            ));
        }

        Ok(values)
    }
}

#[async_trait]
impl EmbeddingModel for HttpEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let values = self.call_api(text).await?;
        Ok(Embedding::new(values))
    }
}
