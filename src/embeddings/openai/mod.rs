
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{EmbeddingProvider, ensure_dimensions, normalize_input};
use crate::config::OpenAiConfig;
use crate::http::HttpClient;
use crate::{FolioError, Result};

/// Embeddings from the OpenAI `/embeddings` endpoint
///
/// The configured dimensionality is sent as `dimensions`, so models that
/// support shortened embeddings return vectors of exactly that length.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    api_url: Url,
    api_key: String,
    model: String,
    dimensions: usize,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: String,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// Fails with a configuration error when the API key variable is unset
    #[inline]
    pub fn new(config: &OpenAiConfig, http: HttpClient, dimensions: usize) -> Result<Self> {
        let api_url = config
            .api_url()
            .map_err(|e| FolioError::Config(e.to_string()))?;
        let api_key = config.api_key().ok_or_else(|| {
            FolioError::Config(format!(
                "Environment variable {} is not set",
                config.api_key_env
            ))
        })?;

        Ok(Self {
            api_url,
            api_key,
            model: config.embedding_model.clone(),
            dimensions,
            http,
        })
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn embed_blocking(&self, text: &str) -> Result<Vec<f32>> {
        debug!(
            "Requesting OpenAI embedding with model {} (text length: {})",
            self.model,
            text.len()
        );

        let url = self
            .api_url
            .join("embeddings")
            .map_err(|e| FolioError::Config(format!("Failed to build embeddings URL: {}", e)))?;
        let request = EmbeddingRequest {
            model: &self.model,
            input: normalize_input(text),
            dimensions: self.dimensions,
        };
        let body = serde_json::to_string(&request).map_err(|e| {
            FolioError::Provider(format!("Failed to serialize embedding request: {}", e))
        })?;

        let response_text = self.http.post_json(&url, Some(&self.api_key), &body)?;
        let response: EmbeddingResponse = serde_json::from_str(&response_text).map_err(|e| {
            FolioError::Provider(format!("Failed to parse embedding response: {}", e))
        })?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| FolioError::Provider("OpenAI returned no embeddings".to_string()))?;

        ensure_dimensions("openai", &embedding, self.dimensions)?;
        Ok(embedding)
    }

    /// Listing models is the cheapest authenticated call
    #[inline]
    pub fn check_access(&self) -> Result<()> {
        let url = self
            .api_url
            .join("models")
            .map_err(|e| FolioError::Config(format!("Failed to build models URL: {}", e)))?;
        self.http.get_text(&url, Some(&self.api_key))?;
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let client = self.clone();
        let text = text.to_string();

        tokio::task::spawn_blocking(move || client.embed_blocking(&text))
            .await
            .map_err(|e| FolioError::Provider(format!("Embedding task failed: {}", e)))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<()> {
        let client = self.clone();

        tokio::task::spawn_blocking(move || client.check_access())
            .await
            .map_err(|e| FolioError::Provider(format!("Health check task failed: {}", e)))?
    }
}
