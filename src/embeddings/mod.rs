// Embeddings module
// Turns text into fixed-length vectors through a pluggable provider

pub mod hashing;
pub mod ollama;
pub mod openai;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, EmbeddingProviderKind};
use crate::http::HttpClient;
use crate::{FolioError, Result};

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;

/// Produces one embedding vector per input text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text. Implementations normalize newlines before submission.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this provider returns
    fn dimensions(&self) -> usize;

    /// Short provider name for logs and status output
    fn name(&self) -> &str;

    /// Verify the backing service is reachable and usable
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Replace newlines with spaces; embedding endpoints score flattened text better
#[inline]
pub fn normalize_input(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Reject provider output whose length differs from the configured dimensionality
#[inline]
pub fn ensure_dimensions(provider: &str, embedding: &[f32], expected: usize) -> Result<()> {
    if embedding.len() == expected {
        return Ok(());
    }

    Err(FolioError::Provider(format!(
        "{} returned a {}-dimensional embedding, expected {}",
        provider,
        embedding.len(),
        expected
    )))
}

/// Build the embedding provider selected in the configuration
#[inline]
pub fn build_embedding_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    let dimensions = config.dimensions();

    let provider: Arc<dyn EmbeddingProvider> = match config.embedding.provider {
        EmbeddingProviderKind::OpenAi => {
            let http = HttpClient::new(&config.http);
            Arc::new(OpenAiEmbedder::new(&config.openai, http, dimensions)?)
        }
        EmbeddingProviderKind::Ollama => {
            let http = HttpClient::new(&config.http);
            Arc::new(OllamaEmbedder::new(&config.ollama, http, dimensions)?)
        }
        EmbeddingProviderKind::Hashing => Arc::new(HashingEmbedder::new(dimensions)),
    };

    Ok(provider)
}
