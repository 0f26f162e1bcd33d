
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::{EmbeddingProvider, ensure_dimensions, normalize_input};
use crate::config::OllamaConfig;
use crate::http::HttpClient;
use crate::{FolioError, Result};

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: Url,
    model: String,
    dimensions: usize,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(config: &OllamaConfig, http: HttpClient, dimensions: usize) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .map_err(|e| FolioError::Config(e.to_string()))?;

        Ok(Self {
            base_url,
            model: config.embedding_model.clone(),
            dimensions,
            http,
        })
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self.endpoint("/api/tags")?;
        debug!("Pinging Ollama server at {}", url);

        self.http.get_text(&url, None)?;

        debug!("Server ping successful");
        Ok(())
    }

    /// List all models installed on the server
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;
        debug!("Fetching available models from {}", url);

        let response_text = self.http.get_text(&url, None)?;
        let models_response: ModelsResponse = serde_json::from_str(&response_text)
            .map_err(|e| FolioError::Provider(format!("Failed to parse models response: {}", e)))?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Validate that the configured model is installed
    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        let models = self.list_models()?;

        if models.iter().any(|m| model_matches(&m.name, &self.model)) {
            debug!("Model {} is available", self.model);
            return Ok(());
        }

        let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        warn!(
            "Model {} not found. Available models: {:?}",
            self.model, available
        );
        Err(FolioError::Provider(format!(
            "Model '{}' is not available. Available models: {:?}",
            self.model, available
        )))
    }

    /// Embed one text synchronously; callers on the async side go through [`EmbeddingProvider::embed`]
    #[inline]
    pub fn embed_blocking(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: &self.model,
            input: normalize_input(text),
        };
        let url = self.endpoint("/api/embed")?;
        let body = serde_json::to_string(&request).map_err(|e| {
            FolioError::Provider(format!("Failed to serialize embedding request: {}", e))
        })?;

        let response_text = self.http.post_json(&url, None, &body)?;
        let response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            FolioError::Provider(format!("Failed to parse embedding response: {}", e))
        })?;

        let embedding = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| FolioError::Provider("Ollama returned no embeddings".to_string()))?;

        ensure_dimensions("ollama", &embedding, self.dimensions)?;
        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| FolioError::Config(format!("Failed to build Ollama URL: {}", e)))
    }
}

/// Ollama lists models with an explicit tag, so `name` matches `name:latest`
fn model_matches(installed: &str, configured: &str) -> bool {
    installed == configured
        || (!configured.contains(':') && installed == format!("{}:latest", configured))
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
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
        "ollama"
    }

    async fn health_check(&self) -> Result<()> {
        let client = self.clone();

        tokio::task::spawn_blocking(move || {
            client.ping()?;
            client.validate_model()?;
            info!(
                "Health check passed for Ollama server at {} with model {}",
                client.base_url, client.model
            );
            Ok(())
        })
        .await
        .map_err(|e| FolioError::Provider(format!("Health check task failed: {}", e)))?
    }
}
